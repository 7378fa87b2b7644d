//! Round bookkeeping: which command is active, how long it has been held, and when it runs out.
//!
//! [`Session`] is a plain state machine. It never reads the clock or starts timers itself: the
//! caller passes the current time along with every [`Event`] and carries out the returned
//! [`Directive`]s. Timer events are tagged with the [`RoundId`] they were armed for, so a timer that
//! fires after its round has ended is recognized and dropped.

use std::{
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::{
    catalog::CatalogEntry,
    gesture::{self, Gesture},
    landmark::HandLandmarks,
    options::GameOptions,
};

/// Identifies one round. Every new command starts a new round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundId(u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Input to [`Session::handle`].
#[derive(Debug, Clone)]
pub enum Event {
    /// A camera frame was processed. Contains every hand found in it, possibly none.
    FrameObserved(Vec<HandLandmarks>),
    /// The hold timer of the given round ticked.
    TickElapsed(RoundId),
    /// The deadline of the given round expired.
    DeadlineElapsed(RoundId),
    /// Start a new round with this command.
    NextRound(&'static CatalogEntry),
}

/// Timer operations requested by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Deliver [`Event::DeadlineElapsed`] for `round` once `after` has passed.
    ArmDeadline { round: RoundId, after: Duration },
    /// Deliver [`Event::TickElapsed`] for `round` every `every`, until stopped.
    StartTicker { round: RoundId, every: Duration },
    StopTicker,
    /// The round is over. Its deadline timer is no longer needed.
    EndRound { round: RoundId, outcome: Outcome },
    /// Deliver [`Event::NextRound`] once `after` has passed.
    ScheduleNextRound { after: Duration },
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Failed,
}

impl Outcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Approved => "User Approved!",
            Self::Failed => "User Failed to follow the command!",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Approved => Color::Green,
            Self::Failed => Color::Red,
        }
    }
}

/// Color an outcome message is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    Red,
}

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round has been started yet.
    Idle,
    /// A command is active, but the player is not showing it.
    AwaitingMatch,
    /// The player has been showing the command continuously since `since`.
    Matching { since: Instant },
    /// The last round was approved; waiting for the next one.
    Approved,
    /// The last round failed; waiting for the next one.
    Failed,
}

/// State of the game across rounds.
pub struct Session {
    hold: Duration,
    tick: Duration,
    round_deadline: Duration,
    next_round_delay: Duration,

    round: RoundId,
    target: Option<&'static CatalogEntry>,
    match_start: Option<Instant>,
    deadline: Option<Instant>,
    outcome: Option<Outcome>,

    detected: Option<Gesture>,
    hand_present: bool,
}

impl Session {
    pub fn new(options: &GameOptions) -> Self {
        Self {
            hold: options.hold_duration(),
            tick: options.tick_interval(),
            round_deadline: options.round_deadline_duration(),
            next_round_delay: options.next_round_delay_duration(),
            round: RoundId(0),
            target: None,
            match_start: None,
            deadline: None,
            outcome: None,
            detected: None,
            hand_present: false,
        }
    }

    /// Processes one event that happened at `now`, returning the timer operations to perform.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Directive> {
        match event {
            Event::FrameObserved(hands) => self.observe(&hands, now),
            Event::TickElapsed(round) => self.tick(round, now),
            Event::DeadlineElapsed(round) => self.deadline_elapsed(round, now),
            Event::NextRound(entry) => self.start_round(entry, now),
        }
    }

    fn start_round(&mut self, entry: &'static CatalogEntry, now: Instant) -> Vec<Directive> {
        if let Some(target) = self.target {
            log::debug!(
                "round {} ({}) still running, not starting a new one",
                self.round,
                target.name()
            );
            return Vec::new();
        }

        self.round = RoundId(self.round.0 + 1);
        self.target = Some(entry);
        self.match_start = None;
        // A deadline too far out to represent never expires.
        self.deadline = now.checked_add(self.round_deadline);
        self.outcome = None;
        log::debug!("round {}: command is {}", self.round, entry.name());

        let mut directives = vec![Directive::StopTicker];
        if self.deadline.is_some() {
            directives.push(Directive::ArmDeadline {
                round: self.round,
                after: self.round_deadline,
            });
        }
        directives
    }

    fn observe(&mut self, hands: &[HandLandmarks], now: Instant) -> Vec<Directive> {
        self.hand_present = !hands.is_empty();
        self.detected = gesture::first_recognized(hands);

        let Some(target) = self.target else {
            return Vec::new();
        };

        if self.detected == Some(target.gesture()) {
            if self.match_start.is_some() {
                return Vec::new();
            }
            log::debug!("round {}: {} shown, holding", self.round, target.name());
            self.match_start = Some(now);
            vec![Directive::StartTicker {
                round: self.round,
                every: self.tick,
            }]
        } else if let Some(since) = self.match_start.take() {
            log::debug!(
                "round {}: hold broken after {:?} (saw {})",
                self.round,
                now.saturating_duration_since(since),
                if self.hand_present {
                    gesture::label(self.detected)
                } else {
                    "no hand"
                },
            );
            vec![Directive::StopTicker]
        } else {
            Vec::new()
        }
    }

    fn tick(&mut self, round: RoundId, now: Instant) -> Vec<Directive> {
        if round != self.round || self.target.is_none() {
            log::trace!("ignoring stale tick for round {}", round);
            return Vec::new();
        }
        let Some(since) = self.match_start else {
            log::trace!("ignoring tick for round {}, not holding", round);
            return Vec::new();
        };

        if now.saturating_duration_since(since) >= self.hold {
            self.finish(Outcome::Approved)
        } else {
            Vec::new()
        }
    }

    fn deadline_elapsed(&mut self, round: RoundId, now: Instant) -> Vec<Directive> {
        if round != self.round || self.target.is_none() {
            log::trace!("ignoring stale deadline for round {}", round);
            return Vec::new();
        }
        let Some(deadline) = self.deadline else {
            log::trace!("ignoring deadline for round {}, it has none", round);
            return Vec::new();
        };
        if now < deadline {
            log::trace!(
                "ignoring early deadline for round {}, {:?} left",
                round,
                deadline - now
            );
            return Vec::new();
        }

        self.finish(Outcome::Failed)
    }

    fn finish(&mut self, outcome: Outcome) -> Vec<Directive> {
        let round = self.round;
        if let Some(target) = self.target.take() {
            log::info!("round {} ({}): {:?}", round, target.name(), outcome);
        }
        self.match_start = None;
        self.deadline = None;
        self.outcome = Some(outcome);

        vec![
            Directive::StopTicker,
            Directive::EndRound { round, outcome },
            Directive::ScheduleNextRound {
                after: self.next_round_delay,
            },
        ]
    }

    pub fn phase(&self) -> Phase {
        match (self.target, self.match_start, self.outcome) {
            (Some(_), Some(since), _) => Phase::Matching { since },
            (Some(_), None, _) => Phase::AwaitingMatch,
            (None, _, Some(Outcome::Approved)) => Phase::Approved,
            (None, _, Some(Outcome::Failed)) => Phase::Failed,
            (None, _, None) => Phase::Idle,
        }
    }

    /// The most recently started round.
    pub fn round(&self) -> RoundId {
        self.round
    }

    /// The active command, if a round is running.
    pub fn target(&self) -> Option<&'static CatalogEntry> {
        self.target
    }

    /// When the player started continuously showing the command, if they currently are.
    pub fn match_start(&self) -> Option<Instant> {
        self.match_start
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The gesture recognized in the most recent frame.
    pub fn detected(&self) -> Option<Gesture> {
        self.detected
    }

    /// Derives what should currently be shown to the player.
    pub fn view(&self) -> View {
        let matches = self.target.is_some() && self.target.map(|t| t.gesture()) == self.detected;
        View {
            command: self.target,
            detected: self.detected,
            hand_present: self.hand_present,
            attempt_percentage: if matches { 0 } else { 100 },
            outcome: self.outcome,
        }
    }
}

/// Snapshot of everything the player is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub command: Option<&'static CatalogEntry>,
    pub detected: Option<Gesture>,
    pub hand_present: bool,
    /// `0` while the current frame shows the command, `100` otherwise.
    pub attempt_percentage: u8,
    pub outcome: Option<Outcome>,
}

impl View {
    pub fn command_text(&self) -> String {
        format!("Command: {}", self.command.map_or("None", |c| c.name()))
    }

    pub fn gesture_text(&self) -> String {
        format!(
            "User Gesture: {}",
            self.detected.map_or("None", |g| g.name())
        )
    }

    pub fn attempt_text(&self) -> String {
        format!("Attempt Percentage: {}%", self.attempt_percentage)
    }

    /// Outcome message and its color, or an empty message while a round is running.
    pub fn message(&self) -> (&'static str, Option<Color>) {
        match self.outcome {
            Some(outcome) => (outcome.message(), Some(outcome.color())),
            None => ("", None),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (message, _) = self.message();
        let parts = [
            self.command_text(),
            self.gesture_text(),
            self.attempt_text(),
            message.to_string(),
        ];
        write!(
            f,
            "{}",
            parts.iter().filter(|part| !part.is_empty()).format(" | ")
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{catalog, gesture::testing::*};

    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn session(deadline: Duration) -> Session {
        Session::new(&GameOptions::default().round_deadline(deadline))
    }

    fn start(session: &mut Session, gesture: Gesture, now: Instant) -> RoundId {
        let entry = catalog::entry(gesture).unwrap();
        let directives = session.handle(Event::NextRound(entry), now);
        let round = session.round();
        assert!(directives.contains(&Directive::ArmDeadline {
            round,
            after: session.round_deadline,
        }));
        round
    }

    fn frame(gestures: &[Gesture]) -> Event {
        Event::FrameObserved(gestures.iter().map(|&g| hand(g)).collect())
    }

    #[test]
    fn starts_idle() {
        let session = session(Duration::from_secs(60));
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.target(), None);
        assert_eq!(session.view().command_text(), "Command: None");
    }

    #[test]
    fn approves_after_hold() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        let round = start(&mut session, Gesture::ClosedFist, t0);
        assert_eq!(session.phase(), Phase::AwaitingMatch);

        let mut approved_at = None;
        for i in 0..=20u32 {
            let now = t0 + 100 * i * MS;
            let directives = session.handle(frame(&[Gesture::ClosedFist]), now);
            if i == 0 {
                assert_eq!(
                    directives,
                    [Directive::StartTicker {
                        round,
                        every: Duration::from_millis(100)
                    }]
                );
                assert_eq!(session.phase(), Phase::Matching { since: t0 });
            } else {
                assert!(directives.is_empty());
            }

            let directives = session.handle(Event::TickElapsed(round), now + MS);
            if directives.contains(&Directive::EndRound {
                round,
                outcome: Outcome::Approved,
            }) {
                approved_at = Some(now + MS);
                break;
            }
        }

        let approved_at = approved_at.expect("round was not approved");
        let elapsed = approved_at - t0;
        assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(2100), "{elapsed:?}");
        assert_eq!(session.phase(), Phase::Approved);
        assert_eq!(session.target(), None);
        assert_eq!(session.view().message(), ("User Approved!", Some(Color::Green)));
    }

    #[test]
    fn fails_at_deadline_not_before() {
        let deadline = Duration::from_secs(5);
        let mut session = session(deadline);
        let t0 = Instant::now();
        let round = start(&mut session, Gesture::OpenHand, t0);
        assert_eq!(session.deadline(), Some(t0 + deadline));

        for i in 0..49u32 {
            session.handle(Event::FrameObserved(Vec::new()), t0 + 100 * i * MS);
        }

        assert!(session
            .handle(Event::DeadlineElapsed(round), t0 + deadline - MS)
            .is_empty());
        assert_eq!(session.phase(), Phase::AwaitingMatch);

        let directives = session.handle(Event::DeadlineElapsed(round), t0 + deadline);
        assert_eq!(
            directives,
            [
                Directive::StopTicker,
                Directive::EndRound {
                    round,
                    outcome: Outcome::Failed
                },
                Directive::ScheduleNextRound {
                    after: Duration::from_secs(1)
                },
            ]
        );
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.deadline(), None);
        assert_eq!(
            session.view().message(),
            ("User Failed to follow the command!", Some(Color::Red))
        );
    }

    #[test]
    fn unrepresentable_deadline_never_expires() {
        let mut session = session(Duration::MAX);
        let t0 = Instant::now();
        let entry = catalog::entry(Gesture::OpenHand).unwrap();
        let directives = session.handle(Event::NextRound(entry), t0);
        assert_eq!(directives, [Directive::StopTicker]);
        assert_eq!(session.deadline(), None);
        assert_eq!(session.phase(), Phase::AwaitingMatch);

        let round = session.round();
        assert!(session
            .handle(Event::DeadlineElapsed(round), t0 + Duration::from_secs(3600))
            .is_empty());
        assert_eq!(session.phase(), Phase::AwaitingMatch);
    }

    #[test]
    fn unknown_frame_restarts_hold() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        let round = start(&mut session, Gesture::TwoFingers, t0);

        session.handle(frame(&[Gesture::TwoFingers]), t0);
        session.handle(frame(&[Gesture::TwoFingers]), t0 + 1900 * MS);
        assert!(session
            .handle(Event::TickElapsed(round), t0 + 1900 * MS)
            .is_empty());
        assert_eq!(session.match_start(), Some(t0));

        let unknown = Event::FrameObserved(vec![neutral()]);
        let directives = session.handle(unknown, t0 + 1950 * MS);
        assert_eq!(directives, [Directive::StopTicker]);
        assert_eq!(session.match_start(), None);
        assert_eq!(session.phase(), Phase::AwaitingMatch);

        // A late tick from the stopped ticker does nothing.
        assert!(session
            .handle(Event::TickElapsed(round), t0 + 2000 * MS)
            .is_empty());

        let restart = t0 + 2000 * MS;
        session.handle(frame(&[Gesture::TwoFingers]), restart);
        assert_eq!(session.match_start(), Some(restart));
        assert!(session
            .handle(Event::TickElapsed(round), restart + 1999 * MS)
            .is_empty());
        assert_eq!(session.phase(), Phase::Matching { since: restart });

        let directives = session.handle(Event::TickElapsed(round), restart + 2000 * MS);
        assert!(directives.contains(&Directive::EndRound {
            round,
            outcome: Outcome::Approved
        }));
    }

    #[test]
    fn match_start_tracks_every_frame() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        start(&mut session, Gesture::ThreeFingers, t0);

        let mut rng = fastrand::Rng::with_seed(5);
        let mut matching_since = None;
        for i in 0..300u32 {
            let now = t0 + 33 * i * MS;
            let hands = match rng.u8(..4) {
                0 => Vec::new(),
                1 => vec![neutral()],
                2 => vec![hand(Gesture::OpenHand)],
                _ => vec![hand(Gesture::ThreeFingers)],
            };
            let matched = gesture::first_recognized(&hands) == Some(Gesture::ThreeFingers);
            session.handle(Event::FrameObserved(hands), now);

            if matched {
                matching_since.get_or_insert(now);
            } else {
                matching_since = None;
            }
            assert_eq!(session.match_start(), matching_since, "frame {i}");
        }
    }

    #[test]
    fn no_hand_breaks_hold() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        start(&mut session, Gesture::ThumbsUp, t0);

        session.handle(frame(&[Gesture::ThumbsUp]), t0);
        assert!(session.match_start().is_some());
        session.handle(Event::FrameObserved(Vec::new()), t0 + 50 * MS);
        assert_eq!(session.match_start(), None);
        assert_eq!(session.view().gesture_text(), "User Gesture: None");
    }

    #[test]
    fn first_recognized_hand_decides() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        start(&mut session, Gesture::ClosedFist, t0);

        session.handle(
            Event::FrameObserved(vec![neutral(), hand(Gesture::ClosedFist)]),
            t0,
        );
        assert_eq!(session.match_start(), Some(t0));

        session.handle(frame(&[Gesture::OpenHand, Gesture::ClosedFist]), t0 + MS);
        assert_eq!(session.match_start(), None);
    }

    #[test]
    fn stale_timers_are_ignored() {
        let deadline = Duration::from_secs(5);
        let mut session = session(deadline);
        let t0 = Instant::now();
        let first = start(&mut session, Gesture::OpenHand, t0);
        session.handle(Event::DeadlineElapsed(first), t0 + deadline);
        assert_eq!(session.phase(), Phase::Failed);

        let t1 = t0 + deadline + Duration::from_secs(1);
        let second = start(&mut session, Gesture::OpenHand, t1);
        assert!(second > first);
        session.handle(frame(&[Gesture::OpenHand]), t1);

        let late = t1 + Duration::from_secs(10);
        assert!(session.handle(Event::DeadlineElapsed(first), late).is_empty());
        assert!(session.handle(Event::TickElapsed(first), late).is_empty());
        assert_eq!(session.phase(), Phase::Matching { since: t1 });
        assert_eq!(session.round(), second);
    }

    #[test]
    fn next_round_while_running_is_ignored() {
        let mut session = session(Duration::from_secs(5));
        let t0 = Instant::now();
        let round = start(&mut session, Gesture::OpenHand, t0);
        let other = catalog::entry(Gesture::ThumbsUp).unwrap();
        assert!(session.handle(Event::NextRound(other), t0).is_empty());
        assert_eq!(session.round(), round);
        assert_eq!(session.target().unwrap().gesture(), Gesture::OpenHand);
    }

    #[test]
    fn timers_without_round_are_ignored() {
        let mut session = session(Duration::from_secs(5));
        let now = Instant::now();
        assert!(session
            .handle(Event::TickElapsed(session.round()), now)
            .is_empty());
        assert!(session
            .handle(Event::DeadlineElapsed(session.round()), now)
            .is_empty());
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn view_text() {
        let mut session = session(Duration::from_secs(60));
        let t0 = Instant::now();
        start(&mut session, Gesture::IndexFinger, t0);

        session.handle(frame(&[Gesture::OpenHand]), t0);
        let view = session.view();
        assert_eq!(view.attempt_percentage, 100);
        assert_eq!(
            view.to_string(),
            "Command: Index Finger | User Gesture: Open Hand | Attempt Percentage: 100%"
        );

        session.handle(frame(&[Gesture::IndexFinger]), t0 + MS);
        let view = session.view();
        assert_eq!(view.attempt_percentage, 0);
        assert_eq!(view.command.unwrap().image(), "Images/index_fingur.jpg");
        assert_eq!(view.message(), ("", None));
    }
}
