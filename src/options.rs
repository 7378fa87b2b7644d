//! Game timing and round configuration.

use std::{env, fmt::Display, str::FromStr, time::Duration};

const ENV_VAR_HOLD_MS: &str = "SIMON_HOLD_MS";
const ENV_VAR_DEADLINE_MS: &str = "SIMON_DEADLINE_MS";
const ENV_VAR_ROUNDS: &str = "SIMON_ROUNDS";
const ENV_VAR_SEED: &str = "SIMON_SEED";

/// Timings and limits for a game.
#[derive(Debug, Clone)]
pub struct GameOptions {
    hold: Duration,
    tick: Duration,
    round_deadline: Duration,
    next_round_delay: Duration,
    rounds: u32,
    seed: Option<u64>,
}

impl GameOptions {
    /// How long the target gesture has to be held continuously.
    pub const DEFAULT_HOLD: Duration = Duration::from_millis(2000);

    /// Interval at which a running hold is checked for completion.
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

    /// Time a round may take before it is failed. Large enough to be practically unlimited.
    pub const DEFAULT_ROUND_DEADLINE: Duration = Duration::from_millis(111_111_000);

    /// Pause between an outcome and the next command.
    pub const DEFAULT_NEXT_ROUND_DELAY: Duration = Duration::from_millis(1000);

    /// Sets the hold duration required for approval.
    #[inline]
    pub fn hold(self, hold: Duration) -> Self {
        Self { hold, ..self }
    }

    /// Sets the polling interval of the hold timer.
    ///
    /// Approval is only noticed on a tick, so it can be reported up to one tick late.
    #[inline]
    pub fn tick(self, tick: Duration) -> Self {
        Self { tick, ..self }
    }

    #[inline]
    pub fn round_deadline(self, round_deadline: Duration) -> Self {
        Self {
            round_deadline,
            ..self
        }
    }

    #[inline]
    pub fn next_round_delay(self, next_round_delay: Duration) -> Self {
        Self {
            next_round_delay,
            ..self
        }
    }

    /// Sets the number of rounds to play before the game ends. Values below 1 are treated as 1.
    #[inline]
    pub fn rounds(self, rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
            ..self
        }
    }

    /// Seeds the command picker. Without a seed, commands are picked from a random seed.
    #[inline]
    pub fn seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    /// Applies overrides from the `SIMON_*` environment variables on top of `self`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn with_env_overrides(self) -> Self {
        let mut this = self;
        if let Some(ms) = env_override::<u64>(ENV_VAR_HOLD_MS) {
            this = this.hold(Duration::from_millis(ms));
        }
        if let Some(ms) = env_override::<u64>(ENV_VAR_DEADLINE_MS) {
            this = this.round_deadline(Duration::from_millis(ms));
        }
        if let Some(rounds) = env_override(ENV_VAR_ROUNDS) {
            this = this.rounds(rounds);
        }
        if let Some(seed) = env_override(ENV_VAR_SEED) {
            this = this.seed(seed);
        }
        this
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn round_deadline_duration(&self) -> Duration {
        self.round_deadline
    }

    pub fn next_round_delay_duration(&self) -> Duration {
        self.next_round_delay
    }

    pub fn round_count(&self) -> u32 {
        self.rounds
    }

    pub(crate) fn make_rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            hold: Self::DEFAULT_HOLD,
            tick: Self::DEFAULT_TICK,
            round_deadline: Self::DEFAULT_ROUND_DEADLINE,
            next_round_delay: Self::DEFAULT_NEXT_ROUND_DELAY,
            rounds: 1,
            seed: None,
        }
    }
}

fn env_override<T>(var: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let value = env::var(var).ok()?;
    match value.trim().parse() {
        Ok(parsed) => {
            log::debug!("option override: `{}` is set to '{}'", var, value);
            Some(parsed)
        }
        Err(e) => {
            log::warn!("ignoring `{}`: cannot parse '{}': {}", var, value, e);
            None
        }
    }
}
