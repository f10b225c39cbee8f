//! Recall quality on the six-point SM-2 scale.
//!
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but the answer was recognised once shown
//! - 2: Incorrect, but the answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchedulerError;

/// Ratings below this value are lapses.
pub const PASSING_QUALITY: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const RECOGNISED: Quality = Quality(1);
    pub const FAMILIAR: Quality = Quality(2);
    pub const DIFFICULT: Quality = Quality(3);
    pub const HESITANT: Quality = Quality(4);
    pub const PERFECT: Quality = Quality(5);

    /// All six ratings in ascending order.
    pub const ALL: [Quality; 6] = [
        Self::BLACKOUT,
        Self::RECOGNISED,
        Self::FAMILIAR,
        Self::DIFFICULT,
        Self::HESITANT,
        Self::PERFECT,
    ];

    /// Fails with [`SchedulerError::InvalidQuality`] outside `0..=5`.
    pub fn new(value: i32) -> Result<Self, SchedulerError> {
        match u8::try_from(value) {
            Ok(q) if q <= 5 => Ok(Self(q)),
            _ => Err(SchedulerError::InvalidQuality(value)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_lapse(self) -> bool {
        self.0 < PASSING_QUALITY
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Total blackout",
            1 => "Wrong, recognised answer",
            2 => "Wrong, answer felt easy",
            3 => "Correct, serious difficulty",
            4 => "Correct after hesitation",
            _ => "Perfect recall",
        }
    }
}

impl TryFrom<i32> for Quality {
    type Error = SchedulerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
