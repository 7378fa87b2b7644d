//! Hand gesture "Simon Says".
//!
//! A target gesture is picked at random from a fixed [`catalog`], every hand reported by a
//! [`source::LandmarkSource`] is classified with the geometric rules in [`gesture`], and the
//! [`session::Session`] decides whether the player held the target long enough before the round
//! deadline expired. [`game::Game`] ties the pieces together into a single-threaded event loop.
//!
//! # Coordinates
//!
//! Landmarks use normalized image coordinates: X points to the right, Y points *down*, and both
//! range from 0.0 to 1.0 across the camera image. This matches what MediaPipe Hands reports, and
//! the classifier relies on it ("above" means a smaller Y).
//!
//! # Environment Variables
//!
//! [`options::GameOptions::with_env_overrides`] lets some timings be overridden:
//!
//! * `SIMON_HOLD_MS`: how long the target gesture has to be held, in milliseconds.
//! * `SIMON_DEADLINE_MS`: how long a round may take before it is failed, in milliseconds.
//! * `SIMON_ROUNDS`: number of rounds to play before the game ends.
//! * `SIMON_SEED`: seed for the command picker, for reproducible games.

use log::LevelFilter;

pub mod catalog;
pub mod game;
pub mod gesture;
pub mod landmark;
pub mod options;
pub mod session;
pub mod source;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level. `RUST_LOG` takes precedence over both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
