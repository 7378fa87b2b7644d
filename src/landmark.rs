//! Hand landmarks as reported by a landmark detector.

use std::{fmt, ops::Index};

/// Number of landmarks that make up one hand.
pub const NUM_LANDMARKS: usize = 21;

/// A single landmark in normalized image coordinates.
///
/// `x` and `y` range from 0.0 to 1.0 across the image, with Y pointing down. `z` is a relative
/// depth estimate and is 0.0 when the detector does not provide one.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 2]> for Landmark {
    fn from([x, y]: [f32; 2]) -> Self {
        Self::new(x, y, 0.0)
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// The 21 landmarks of one detected hand, indexable by [`LandmarkIdx`].
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    landmarks: [Landmark; NUM_LANDMARKS],
}

impl HandLandmarks {
    pub fn new(landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { landmarks }
    }

    /// Collects a hand from a sequence of points.
    ///
    /// Fails if the sequence does not contain exactly [`NUM_LANDMARKS`] points.
    pub fn from_points<P, I>(points: I) -> Result<Self, WrongLandmarkCount>
    where
        P: Into<Landmark>,
        I: IntoIterator<Item = P>,
    {
        let points = points.into_iter().map(Into::into).collect::<Vec<_>>();
        let found = points.len();
        let landmarks = points
            .try_into()
            .map_err(|_| WrongLandmarkCount { found })?;
        Ok(Self { landmarks })
    }

    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx as usize]
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.landmarks.iter().copied()
    }

    /// Returns a mutable reference to a single landmark.
    pub fn landmark_mut(&mut self, idx: LandmarkIdx) -> &mut Landmark {
        &mut self.landmarks[idx as usize]
    }
}

impl Index<LandmarkIdx> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, idx: LandmarkIdx) -> &Landmark {
        &self.landmarks[idx as usize]
    }
}

/// Error returned by [`HandLandmarks::from_points`] when given the wrong number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongLandmarkCount {
    found: usize,
}

impl WrongLandmarkCount {
    /// The number of points that were actually supplied.
    pub fn found(&self) -> usize {
        self.found
    }
}

impl fmt::Display for WrongLandmarkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} hand landmarks, got {}",
            NUM_LANDMARKS, self.found
        )
    }
}

impl std::error::Error for WrongLandmarkCount {}

/// Names for the hand landmarks, in detector output order.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **IP**: Interphalangeal joint of the thumb, between its MCP and the tip.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}
