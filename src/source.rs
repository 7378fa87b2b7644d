//! Landmark sources: where hand landmarks come from.
//!
//! A [`LandmarkSource`] produces one [`Frame`] per processed camera image. Detection itself
//! happens elsewhere; this crate only consumes its output. [`ReplaySource`] plays back landmark
//! streams recorded as JSON lines, which is also the easiest way to feed the game from an external
//! detector process.

use std::{
    error::Error,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{Receiver, Sender};
use serde::Deserialize;

use crate::landmark::{HandLandmarks, Landmark, WrongLandmarkCount};

/// Every hand found in one camera image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    hands: Vec<HandLandmarks>,
}

impl Frame {
    pub fn new(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }

    /// A frame in which no hand was detected.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hands(&self) -> &[HandLandmarks] {
        &self.hands
    }

    pub fn into_hands(self) -> Vec<HandLandmarks> {
        self.hands
    }
}

/// A stream of landmark frames.
pub trait LandmarkSource {
    /// Blocks until the next frame is available.
    ///
    /// Returns `Ok(None)` when the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureUnavailable>;

    /// Releases the underlying capture device. Called once, when no more frames are needed.
    fn stop(&mut self) {}
}

impl<S: LandmarkSource + ?Sized> LandmarkSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureUnavailable> {
        (**self).next_frame()
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// The landmark stream could not be opened or read.
#[derive(Debug)]
pub struct CaptureUnavailable {
    reason: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl CaptureUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        reason: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for CaptureUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture unavailable: {}", self.reason)
    }
}

impl Error for CaptureUnavailable {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Accepted spellings of a single landmark.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Xy([f32; 2]),
    Xyz([f32; 3]),
    Object {
        x: f32,
        y: f32,
        #[serde(default)]
        z: f32,
    },
}

impl From<RawPoint> for Landmark {
    fn from(raw: RawPoint) -> Self {
        match raw {
            RawPoint::Xy(xy) => xy.into(),
            RawPoint::Xyz(xyz) => xyz.into(),
            RawPoint::Object { x, y, z } => Landmark::new(x, y, z),
        }
    }
}

/// One line of a recording.
#[derive(Deserialize)]
struct RawFrame {
    /// Capture time relative to the start of the recording.
    #[serde(default)]
    t_ms: Option<u64>,
    #[serde(default)]
    hands: Vec<Vec<RawPoint>>,
}

/// A recording line that could not be turned into a [`Frame`].
#[derive(Debug)]
pub enum ReplayError {
    Json(serde_json::Error),
    Landmarks(WrongLandmarkCount),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Json(e) => write!(f, "malformed frame: {e}"),
            ReplayError::Landmarks(e) => write!(f, "malformed hand: {e}"),
        }
    }
}

impl Error for ReplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplayError::Json(e) => Some(e),
            ReplayError::Landmarks(e) => Some(e),
        }
    }
}

/// Parses one recording line, returning the frame and its timestamp (if any).
pub fn parse_frame(line: &str) -> Result<(Option<Duration>, Frame), ReplayError> {
    let raw: RawFrame = serde_json::from_str(line).map_err(ReplayError::Json)?;
    let hands = raw
        .hands
        .into_iter()
        .map(HandLandmarks::from_points)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ReplayError::Landmarks)?;
    Ok((raw.t_ms.map(Duration::from_millis), Frame::new(hands)))
}

/// Plays back a landmark recording.
///
/// The recording is a text file with one JSON object per line:
///
/// ```text
/// {"t_ms": 0, "hands": [[[0.51, 0.83, 0.0], [0.46, 0.79, -0.01], ...]]}
/// {"t_ms": 33, "hands": []}
/// ```
///
/// `hands` holds 21 points per hand, each either `[x, y]`, `[x, y, z]` or `{"x": .., "y": ..,
/// "z": ..}`. Blank lines are skipped. Malformed lines are logged and replayed as frames without
/// hands, the same way a detector that fails on a frame would behave.
///
/// When pacing is enabled (the default), frames are released at their `t_ms` offsets relative to
/// the first frame, so the game sees them at the speed they were captured at.
pub struct ReplaySource<R> {
    lines: io::Lines<R>,
    line_no: usize,
    pace: bool,
    start: Option<Instant>,
}

impl ReplaySource<BufReader<File>> {
    /// Opens a recording file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureUnavailable> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CaptureUnavailable::with_source(format!("cannot open {}", path.display()), e)
        })?;
        log::info!("replaying landmarks from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pace: true,
            start: None,
        }
    }

    /// Enables or disables real-time pacing.
    pub fn pace(self, pace: bool) -> Self {
        Self { pace, ..self }
    }

    fn wait_until(&mut self, offset: Duration) {
        if !self.pace {
            return;
        }
        let start = *self.start.get_or_insert_with(Instant::now);
        let due = start + offset;
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
}

impl<R: BufRead> LandmarkSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureUnavailable> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    return Err(CaptureUnavailable::with_source(
                        format!("failed to read recording at line {}", self.line_no + 1),
                        e,
                    ))
                }
                None => return Ok(None),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            return match parse_frame(&line) {
                Ok((offset, frame)) => {
                    if let Some(offset) = offset {
                        self.wait_until(offset);
                    }
                    Ok(Some(frame))
                }
                Err(e) => {
                    log::warn!("recording line {}: {}", self.line_no, e);
                    Ok(Some(Frame::empty()))
                }
            };
        }
    }
}

/// Logs frames per second and how often a hand was seen, once per second.
struct FrameRate {
    name: &'static str,
    frames: u32,
    with_hands: u32,
    start: Instant,
}

impl FrameRate {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            frames: 0,
            with_hands: 0,
            start: Instant::now(),
        }
    }

    fn tick(&mut self, frame: &Frame) {
        self.frames += 1;
        if !frame.hands().is_empty() {
            self.with_hands += 1;
        }
        if self.start.elapsed() > Duration::from_secs(1) {
            log::debug!(
                "{}: {} FPS, hand in {}%",
                self.name,
                self.frames,
                self.with_hands * 100 / self.frames,
            );

            self.frames = 0;
            self.with_hands = 0;
            self.start = Instant::now();
        }
    }
}

type FrameResult = Result<Frame, CaptureUnavailable>;

/// Runs a [`LandmarkSource`] on its own thread and forwards its frames over a channel.
///
/// When the pump is dropped, the channel closes and the thread stops the source after its next
/// frame. A thread that has already finished is joined. One still blocked in
/// [`LandmarkSource::next_frame`] is detached, so dropping the pump never waits on the source.
pub(crate) struct FramePump {
    frames: Option<Receiver<FrameResult>>,
    handle: Option<JoinHandle<()>>,
}

impl FramePump {
    const THREAD_NAME: &'static str = "landmark source";

    pub(crate) fn spawn<S>(source: S) -> io::Result<Self>
    where
        S: LandmarkSource + Send + 'static,
    {
        let (sender, recv) = crossbeam::channel::bounded(1);
        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.into())
            .spawn(move || pump(source, sender))?;

        Ok(Self {
            frames: Some(recv),
            handle: Some(handle),
        })
    }

    /// The receiving end of the frame channel. Disconnects when the source runs out of frames.
    pub(crate) fn frames(&self) -> Receiver<FrameResult> {
        match &self.frames {
            Some(frames) => frames.clone(),
            None => crossbeam::channel::never(),
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        drop(self.frames.take());

        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                log::debug!(
                    "'{}' thread is still waiting for a frame, detaching it",
                    Self::THREAD_NAME
                );
                return;
            }
            if handle.join().is_err() && !thread::panicking() {
                log::error!("'{}' thread panicked", Self::THREAD_NAME);
            }
        }
    }
}

fn pump<S: LandmarkSource>(mut source: S, sender: Sender<FrameResult>) {
    log::trace!("'{}' starting", FramePump::THREAD_NAME);
    let mut rate = FrameRate::new("frames");
    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                rate.tick(&frame);
                if sender.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                log::debug!("landmark stream ended");
                break;
            }
            Err(e) => {
                sender.send(Err(e)).ok();
                break;
            }
        }
    }
    source.stop();
    log::trace!("'{}' exiting", FramePump::THREAD_NAME);
}
