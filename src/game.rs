//! The game loop.
//!
//! Frames, hold ticks, round deadlines and the pause between rounds all arrive on their own
//! channels. [`Game::run`] waits on all of them at once and turns whichever fires first into one
//! [`Event`] for the [`Session`], so events are processed strictly one after another on a single
//! thread. Cancelling a timer means dropping its receiver; events that still slip through are
//! tagged with their round and ignored by the session.

use std::time::Instant;

use crossbeam::channel::{after, never, select, tick, Receiver};

use crate::{
    catalog,
    options::GameOptions,
    session::{Directive, Event, Outcome, RoundId, Session, View},
    source::{CaptureUnavailable, FramePump, LandmarkSource},
};

/// Receives what the player should currently be shown.
pub trait Presenter {
    /// Called after every processed event with the current state of the game.
    fn render(&mut self, view: &View);

    /// Called once if landmarks cannot be captured.
    fn capture_unavailable(&mut self, err: &CaptureUnavailable);
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn render(&mut self, view: &View) {
        (**self).render(view);
    }

    fn capture_unavailable(&mut self, err: &CaptureUnavailable) {
        (**self).capture_unavailable(err);
    }
}

/// A [`Presenter`] that logs every change of the displayed text.
#[derive(Default)]
pub struct LogPresenter {
    last: Option<String>,
}

impl Presenter for LogPresenter {
    fn render(&mut self, view: &View) {
        let text = view.to_string();
        if self.last.as_deref() != Some(text.as_str()) {
            if let Some(command) = view.command {
                log::debug!("showing {} for {}", command.image(), command.name());
            }
            log::info!("{}", text);
            self.last = Some(text);
        }
    }

    fn capture_unavailable(&mut self, err: &CaptureUnavailable) {
        log::error!("{}", err);
    }
}

/// Results of a finished game, one entry per completed round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    rounds: Vec<(RoundId, Outcome)>,
}

impl Summary {
    pub fn rounds(&self) -> &[(RoundId, Outcome)] {
        &self.rounds
    }

    pub fn approved(&self) -> usize {
        self.count(Outcome::Approved)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.rounds.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// A timer armed for a specific round.
struct Armed {
    round: RoundId,
    rx: Receiver<Instant>,
}

/// Plays rounds of the gesture game against a [`LandmarkSource`].
pub struct Game<P: Presenter> {
    options: GameOptions,
    session: Session,
    rng: fastrand::Rng,
    presenter: P,

    ticker: Option<Armed>,
    deadline: Option<Armed>,
    next_round: Option<Receiver<Instant>>,
    summary: Summary,
}

impl<P: Presenter> Game<P> {
    pub fn new(options: GameOptions, presenter: P) -> Self {
        Self {
            session: Session::new(&options),
            rng: options.make_rng(),
            options,
            presenter,
            ticker: None,
            deadline: None,
            next_round: None,
            summary: Summary::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Plays until the configured number of rounds is complete or `source` runs out of frames.
    ///
    /// The source runs on a separate thread. It is stopped once it hands over its next frame
    /// after the game is over, which may be after this returns. If the source fails, the error is passed to [`Presenter::capture_unavailable`] and returned.
    pub fn run<S>(&mut self, source: S) -> Result<Summary, CaptureUnavailable>
    where
        S: LandmarkSource + Send + 'static,
    {
        let pump = FramePump::spawn(source).map_err(|e| {
            let err = CaptureUnavailable::with_source("failed to start landmark source", e);
            self.presenter.capture_unavailable(&err);
            err
        })?;
        let frames = pump.frames();
        self.summary = Summary::default();

        let first = catalog::choose(&mut self.rng);
        self.dispatch(Event::NextRound(first));

        while !self.is_over() {
            let (tick_round, ticker) = armed_or_never(&self.ticker, self.session.round());
            let (deadline_round, deadline) = armed_or_never(&self.deadline, self.session.round());
            let next_round = self.next_round.clone().unwrap_or_else(never);

            let step = select! {
                recv(frames) -> msg => match msg {
                    Ok(Ok(frame)) => Ok(Some(Event::FrameObserved(frame.into_hands()))),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Ok(None),
                },
                recv(ticker) -> _ => Ok(Some(Event::TickElapsed(tick_round))),
                recv(deadline) -> _ => Ok(Some(Event::DeadlineElapsed(deadline_round))),
                recv(next_round) -> _ => {
                    self.next_round = None;
                    Ok(Some(Event::NextRound(catalog::choose(&mut self.rng))))
                },
            };

            match step {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) => {
                    if let Some(target) = self.session.target() {
                        log::info!(
                            "landmark stream ended during round {} ({})",
                            self.session.round(),
                            target.name()
                        );
                    }
                    break;
                }
                Err(e) => {
                    self.disarm();
                    self.presenter.capture_unavailable(&e);
                    return Err(e);
                }
            }
        }

        // The pump only shuts down once every receiver is gone. A source stuck in `next_frame` is
        // left behind and stopped when it next produces a frame.
        drop(frames);
        drop(pump);
        self.disarm();
        Ok(std::mem::take(&mut self.summary))
    }

    fn disarm(&mut self) {
        self.ticker = None;
        self.deadline = None;
        self.next_round = None;
    }

    fn is_over(&self) -> bool {
        self.summary.rounds.len() >= self.options.round_count() as usize
    }

    fn dispatch(&mut self, event: Event) {
        let directives = self.session.handle(event, Instant::now());
        for directive in directives {
            self.apply(directive);
        }
        self.presenter.render(&self.session.view());
    }

    fn apply(&mut self, directive: Directive) {
        log::trace!("{:?}", directive);
        match directive {
            Directive::ArmDeadline { round, after: d } => {
                self.deadline = Some(Armed {
                    round,
                    rx: after(d),
                });
            }
            Directive::StartTicker { round, every } => {
                self.ticker = Some(Armed {
                    round,
                    rx: tick(every),
                });
            }
            Directive::StopTicker => self.ticker = None,
            Directive::EndRound { round, outcome } => {
                if self.deadline.as_ref().map_or(false, |d| d.round == round) {
                    self.deadline = None;
                }
                self.summary.rounds.push((round, outcome));
            }
            Directive::ScheduleNextRound { after: d } => {
                if !self.is_over() {
                    self.next_round = Some(after(d));
                }
            }
        }
    }
}

fn armed_or_never(armed: &Option<Armed>, fallback: RoundId) -> (RoundId, Receiver<Instant>) {
    match armed {
        Some(armed) => (armed.round, armed.rx.clone()),
        None => (fallback, never()),
    }
}

#[cfg(test)]
mod tests {
    use crate::session::Color;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        views: Vec<View>,
        errors: Vec<String>,
    }

    impl Presenter for Recorder {
        fn render(&mut self, view: &View) {
            self.views.push(*view);
        }

        fn capture_unavailable(&mut self, err: &CaptureUnavailable) {
            self.errors.push(err.to_string());
        }
    }

    struct Broken;

    impl LandmarkSource for Broken {
        fn next_frame(&mut self) -> Result<Option<crate::source::Frame>, CaptureUnavailable> {
            Err(CaptureUnavailable::new("no camera"))
        }
    }

    #[test]
    fn capture_failure_is_reported_once() {
        let mut recorder = Recorder::default();
        let mut game = Game::new(GameOptions::default().seed(1), &mut recorder);
        let err = game.run(Broken).unwrap_err();
        assert_eq!(err.reason(), "no camera");
        drop(game);

        assert_eq!(recorder.errors, ["capture unavailable: no camera"]);
        // The first command was still shown before the failure arrived.
        assert!(recorder.views[0].command.is_some());
    }

    #[test]
    fn log_presenter_skips_repeats() {
        let entry = catalog::entry(crate::gesture::Gesture::OpenHand).unwrap();
        let view = View {
            command: Some(entry),
            detected: None,
            hand_present: false,
            attempt_percentage: 100,
            outcome: None,
        };
        let mut presenter = LogPresenter::default();
        presenter.render(&view);
        let first = presenter.last.clone();
        presenter.render(&view);
        assert_eq!(presenter.last, first);

        let failed = View {
            command: None,
            outcome: Some(Outcome::Failed),
            ..view
        };
        presenter.render(&failed);
        assert_eq!(failed.message().1, Some(Color::Red));
        assert_eq!(
            presenter.last.as_deref(),
            Some("Command: None | User Gesture: None | Attempt Percentage: 100% | User Failed to follow the command!")
        );
    }
}
