//! Rule-based hand gesture classification.
//!
//! Every rule is a plain inequality between two landmark coordinates, without thresholds,
//! smoothing or confidence. The rules assume an upright hand with the palm facing the camera, and
//! several of them overlap, so they are checked in a fixed order and the first one that holds wins.

use std::fmt;

use crate::landmark::{HandLandmarks, LandmarkIdx};

/// The gestures the game knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    ThumbsUp,
    ClosedFist,
    OpenHand,
    IndexFinger,
    TwoFingers,
    ThreeFingers,
}

impl Gesture {
    /// Human readable name, as shown to the player.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ThumbsUp => "Thumbs Up",
            Self::ClosedFist => "Closed Fist",
            Self::OpenHand => "Open Hand",
            Self::IndexFinger => "Index Finger",
            Self::TwoFingers => "Two Fingers",
            Self::ThreeFingers => "Three Fingers",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Label for a classification result, with `None` shown as `Unknown`.
pub fn label(gesture: Option<Gesture>) -> &'static str {
    gesture.map_or("Unknown", |g| g.name())
}

#[derive(Clone, Copy)]
enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    fn tip(self) -> LandmarkIdx {
        match self {
            Self::Index => LandmarkIdx::IndexFingerTip,
            Self::Middle => LandmarkIdx::MiddleFingerTip,
            Self::Ring => LandmarkIdx::RingFingerTip,
            Self::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    fn pip(self) -> LandmarkIdx {
        match self {
            Self::Index => LandmarkIdx::IndexFingerPip,
            Self::Middle => LandmarkIdx::MiddleFingerPip,
            Self::Ring => LandmarkIdx::RingFingerPip,
            Self::Pinky => LandmarkIdx::PinkyPip,
        }
    }
}

/// Fingertip above its PIP joint.
fn extended(hand: &HandLandmarks, finger: Finger) -> bool {
    hand[finger.tip()].y < hand[finger.pip()].y
}

/// Fingertip below its PIP joint. A tip level with the joint is neither extended nor curled.
fn curled(hand: &HandLandmarks, finger: Finger) -> bool {
    hand[finger.tip()].y > hand[finger.pip()].y
}

/// Fingertip to the right of its PIP joint.
fn tip_right_of_pip(hand: &HandLandmarks, finger: Finger) -> bool {
    hand[finger.tip()].x > hand[finger.pip()].x
}

fn thumbs_up(hand: &HandLandmarks) -> bool {
    let tip = hand[LandmarkIdx::ThumbTip];
    let ip = hand[LandmarkIdx::ThumbIp];
    // Only the thumb is looked at; the other fingers may be in any pose.
    tip.y < hand[LandmarkIdx::IndexFingerTip].y && ip.x < tip.x && ip.y > tip.y
}

/// Classifies a single hand, returning `None` if no rule matches.
///
/// Rules are checked in this order: Thumbs Up, Open Hand, Closed Fist, Two Fingers, Three Fingers,
/// Index Finger.
pub fn classify(hand: &HandLandmarks) -> Option<Gesture> {
    use Finger::*;

    let ext = |finger| extended(hand, finger);
    let curl = |finger| curled(hand, finger);

    if thumbs_up(hand) {
        return Some(Gesture::ThumbsUp);
    }
    if ext(Index) && ext(Middle) && ext(Ring) && ext(Pinky) {
        return Some(Gesture::OpenHand);
    }
    if curl(Index) && curl(Middle) && curl(Ring) && curl(Pinky) {
        return Some(Gesture::ClosedFist);
    }
    if ext(Index) && ext(Middle) && curl(Ring) && curl(Pinky) {
        return Some(Gesture::TwoFingers);
    }
    if ext(Index) && ext(Middle) && ext(Ring) && curl(Pinky) {
        return Some(Gesture::ThreeFingers);
    }
    // Mixes X and Y comparisons, unlike the others. It is the loosest rule, so it goes last.
    if ext(Index)
        && tip_right_of_pip(hand, Middle)
        && tip_right_of_pip(hand, Ring)
        && curl(Pinky)
    {
        return Some(Gesture::IndexFinger);
    }

    None
}

/// Returns the first gesture recognized among `hands`, skipping hands that match no rule.
pub fn first_recognized<'a, I>(hands: I) -> Option<Gesture>
where
    I: IntoIterator<Item = &'a HandLandmarks>,
{
    hands.into_iter().find_map(classify)
}
