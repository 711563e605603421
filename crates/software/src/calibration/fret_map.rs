use super::CalibrationError;

/// Index of a fret zone along the fingerboard. Fret 0 is the open string.
pub type Fret = u8;

/// Ascending raw softpot positions partitioning the fingerboard into discrete fret zones.
///
/// Fret `i` occupies the half-open interval `[boundaries[i], boundaries[i + 1])`, so a table of `F + 2` boundaries
/// describes frets `0..=F`. Readings below the first boundary are treated as the open string, and readings at or
/// beyond the last boundary clamp to the highest fret.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FretMap {
    boundaries: &'static [i16],
    max_position: i16,
}

impl FretMap {
    /// Constructs a [`FretMap`], checking that the boundaries are strictly increasing.
    ///
    /// `max_position` is the largest reading the softpot is trusted to produce; anything above is clamped to it.
    pub const fn new(
        boundaries: &'static [i16],
        max_position: i16,
    ) -> Result<Self, CalibrationError> {
        if boundaries.len() < 2 {
            return Err(CalibrationError::TooFewBoundaries);
        }
        let mut index = 1;
        while index < boundaries.len() {
            if boundaries[index] <= boundaries[index - 1] {
                return Err(CalibrationError::BoundaryNotIncreasing { index });
            }
            index += 1;
        }
        if max_position < boundaries[0] {
            return Err(CalibrationError::MaxPositionBelowFirstBoundary);
        }
        Ok(Self {
            boundaries,
            max_position,
        })
    }

    /// The highest fret this map can report.
    pub fn highest_fret(&self) -> Fret {
        (self.boundaries.len() - 2) as Fret
    }

    /// Returns the fret zone containing `position`.
    ///
    /// Negative readings indicate a sensor fault or no contact at all and map to the open string.
    pub fn fret_of(&self, position: i16) -> Fret {
        let position = position.clamp(0, self.max_position);
        if position < self.boundaries[0] {
            return 0;
        }

        self.boundaries
            .windows(2)
            .position(|zone| zone[0] <= position && position < zone[1])
            .map_or(self.highest_fret(), |fret| fret as Fret)
    }

    /// Returns the raw bounds `(lower, upper)` of a fret zone, or `None` if the fret is beyond this map.
    pub fn zone(&self, fret: Fret) -> Option<(i16, i16)> {
        let fret = usize::from(fret);
        match (self.boundaries.get(fret), self.boundaries.get(fret + 1)) {
            (Some(&lower), Some(&upper)) => Some((lower, upper)),
            _ => None,
        }
    }
}
