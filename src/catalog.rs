//! The fixed list of commands the game can give.

use crate::gesture::Gesture;

/// A command the player can be asked to perform, with a reference picture of the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    gesture: Gesture,
    image: &'static str,
}

impl CatalogEntry {
    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// Path of the reference image, relative to the asset directory.
    pub fn image(&self) -> &'static str {
        self.image
    }

    pub fn name(&self) -> &'static str {
        self.gesture.name()
    }
}

pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        gesture: Gesture::ThumbsUp,
        image: "Images/thumb_UP.jpg",
    },
    CatalogEntry {
        gesture: Gesture::ClosedFist,
        image: "Images/close_fist.jpg",
    },
    CatalogEntry {
        gesture: Gesture::OpenHand,
        image: "Images/Open_Hand.jpg",
    },
    CatalogEntry {
        gesture: Gesture::IndexFinger,
        image: "Images/index_fingur.jpg",
    },
    CatalogEntry {
        gesture: Gesture::TwoFingers,
        image: "Images/2_Fingur.jpg",
    },
    CatalogEntry {
        gesture: Gesture::ThreeFingers,
        image: "Images/3_Fingur.png",
    },
];

/// Picks a catalog entry uniformly at random. Draws are independent, so repeats are possible.
pub fn choose(rng: &mut fastrand::Rng) -> &'static CatalogEntry {
    &CATALOG[rng.usize(..CATALOG.len())]
}

/// Looks up the entry for `gesture`.
pub fn entry(gesture: Gesture) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.gesture == gesture)
}
