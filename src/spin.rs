//! Spin values: the quantized result of spinning the board one or more times.

use std::fmt;

/// All scores are stored as multiples of this unit.
///
/// 1400 and 1500 are both stored as 1500, which collapses the number of
/// distinct outcomes after repeated spins.
pub const MIN_SCORE_UNIT: u16 = 250;

/// Scores saturate here. Must be a multiple of `MIN_SCORE_UNIT`.
pub const MAX_SCORE: u16 = 20000;

/// Result of one or more spins: score won, extra spins earned, spins taken.
///
/// A zero score is a whammy. Keeping `taken` lets repeated spins be
/// precomposed into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpinValue {
    score: u16,
    earned: u8,
    taken: u8,
}

impl SpinValue {
    /// A single spin worth `score` (quantized) plus `earned` extra spins.
    ///
    /// A score that rounds to zero is a whammy and earns nothing.
    pub fn new(score: i32, earned: u8) -> Self {
        let value = Self::with_taken(score, earned, 1);
        if value.is_whammy() {
            Self::whammy()
        } else {
            value
        }
    }

    pub fn with_taken(score: i32, earned: u8, taken: u8) -> Self {
        SpinValue {
            score: quantize(score),
            earned,
            taken,
        }
    }

    /// A single whammy.
    pub fn whammy() -> Self {
        SpinValue {
            score: 0,
            earned: 0,
            taken: 1,
        }
    }

    pub fn score(&self) -> u16 {
        self.score
    }

    pub fn earned(&self) -> u8 {
        self.earned
    }

    pub fn taken(&self) -> u8 {
        self.taken
    }

    pub fn is_whammy(&self) -> bool {
        self.score == 0
    }

    /// The combined value of spinning `earlier` and then `self`.
    ///
    /// A whammy ends a batch: anything after an earlier whammy is dropped.
    /// A later whammy zeroes the score but keeps the spins earned and taken
    /// along the way. Without whammies the parts simply add.
    pub fn after(self, earlier: SpinValue) -> SpinValue {
        if earlier.is_whammy() {
            earlier
        } else if self.is_whammy() {
            SpinValue {
                score: 0,
                earned: self.earned.saturating_add(earlier.earned),
                taken: self.taken.saturating_add(earlier.taken),
            }
        } else {
            SpinValue {
                score: self.score.saturating_add(earlier.score).min(MAX_SCORE),
                earned: self.earned.saturating_add(earlier.earned),
                taken: self.taken.saturating_add(earlier.taken),
            }
        }
    }
}

/// Round to the nearest `MIN_SCORE_UNIT` (halves round up), clamped to `0..=MAX_SCORE`.
pub fn quantize(score: i32) -> u16 {
    let unit = MIN_SCORE_UNIT as i32;
    let clamped = score.clamp(0, MAX_SCORE as i32);
    (((clamped + unit / 2) / unit) * unit) as u16
}

impl fmt::Display for SpinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}+{}+{})", self.score, self.earned, self.taken)
    }
}
