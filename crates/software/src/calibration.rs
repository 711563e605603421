//! Pure functions converting raw sensor units into musical units: the fret under the performer's finger, the volume
//! implied by the pressure on a string, and the pitch deviation of the finger within its fret.
//!
//! Every calibration is built through a `const fn` constructor which validates its tables, so a preset evaluated in a
//! `const` item fails the build rather than misbehaving on stage.

mod fret_map;
pub use fret_map::*;

mod pitch_bend;
pub use pitch_bend::*;

mod volume;
pub use volume::*;

use core::fmt;

/// Reasons a set of calibration constants is rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// A [`FretMap`] needs at least two boundaries to describe a single fret zone.
    TooFewBoundaries,
    /// Fret boundaries must be strictly increasing; the boundary at `index` is not greater than its predecessor.
    BoundaryNotIncreasing {
        /// Position of the offending boundary in the table.
        index: usize,
    },
    /// The softpot's maximum position lies below the first fret boundary.
    MaxPositionBelowFirstBoundary,
    /// The force reading yielding the loudest volume must be lower than the one yielding the quietest.
    ForceThresholdsInverted,
    /// Volumes must satisfy `min <= max <= 127`.
    VolumeBoundsInvalid,
    /// The pitch-bend deviation cap must be positive.
    DeviationCapNotPositive,
    /// The pitch-bend range cannot exceed the distance from the 14-bit center to either end (8191).
    PitchBendRangeTooWide,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewBoundaries => write!(f, "a fret map needs at least two boundaries"),
            Self::BoundaryNotIncreasing { index } => {
                write!(f, "fret boundary {index} is not greater than the one before it")
            }
            Self::MaxPositionBelowFirstBoundary => {
                write!(f, "softpot maximum position is below the first fret boundary")
            }
            Self::ForceThresholdsInverted => {
                write!(f, "minimum force threshold must be below the maximum")
            }
            Self::VolumeBoundsInvalid => write!(f, "volume bounds must satisfy min <= max <= 127"),
            Self::DeviationCapNotPositive => write!(f, "pitch-bend deviation cap must be positive"),
            Self::PitchBendRangeTooWide => write!(f, "pitch-bend range must not exceed 8191"),
        }
    }
}
