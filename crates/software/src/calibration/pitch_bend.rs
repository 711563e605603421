use super::{CalibrationError, Fret, FretMap};
use wmidi::U14;

/// The 14-bit pitch-bend value meaning "no bend".
pub const PITCH_BEND_CENTER: u16 = 8192;

const PITCH_BEND_MAX: i32 = 16383;

/// Linear mapping from the finger's deviation within its fret zone to a MIDI pitch bend.
///
/// The center of each zone plays in tune; sliding toward either edge bends the note by up to `range` 14-bit units,
/// reached once the deviation hits `max_deviation` raw softpot units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PitchBendCurve {
    max_deviation: i16,
    range: u16,
}

impl PitchBendCurve {
    /// Constructs a [`PitchBendCurve`].
    pub const fn new(max_deviation: i16, range: u16) -> Result<Self, CalibrationError> {
        if max_deviation <= 0 {
            return Err(CalibrationError::DeviationCapNotPositive);
        }
        if range > 8191 {
            return Err(CalibrationError::PitchBendRangeTooWide);
        }
        Ok(Self {
            max_deviation,
            range,
        })
    }

    /// Returns the pitch bend for a finger at `position` within `fret`.
    ///
    /// Open strings, frets the map does not know and negative readings (no contact) report the centered value.
    pub fn pitch_bend_of(&self, position: i16, fret: Fret, frets: &FretMap) -> U14 {
        if fret == 0 || position < 0 {
            return U14::from_u16_lossy(PITCH_BEND_CENTER);
        }
        let Some((lower, upper)) = frets.zone(fret) else {
            return U14::from_u16_lossy(PITCH_BEND_CENTER);
        };

        let center = (i32::from(lower) + i32::from(upper)) / 2;
        let max_deviation = i32::from(self.max_deviation);
        let deviation = (i32::from(position) - center).clamp(-max_deviation, max_deviation);
        let bend = i32::from(PITCH_BEND_CENTER) + deviation * i32::from(self.range) / max_deviation;

        U14::from_u16_lossy(bend.clamp(0, PITCH_BEND_MAX) as u16)
    }
}
