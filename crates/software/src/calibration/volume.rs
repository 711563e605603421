use super::CalibrationError;
use wmidi::U7;

/// Piecewise-linear, inverted mapping from a force-sensitive resistor reading to a MIDI volume.
///
/// The FSRs are wired so that their reading falls as pressure rises: readings at or below `fsr_min` yield
/// `volume_max`, readings at or above `fsr_max` yield `volume_min`, and readings in between interpolate linearly.
/// The floor is deliberately above zero so a lightly bowed string never produces an inaudible note.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeCurve {
    fsr_min: i16,
    fsr_max: i16,
    volume_min: u8,
    volume_max: u8,
}

impl VolumeCurve {
    /// Constructs a [`VolumeCurve`].
    pub const fn new(
        fsr_min: i16,
        fsr_max: i16,
        volume_min: u8,
        volume_max: u8,
    ) -> Result<Self, CalibrationError> {
        if fsr_min >= fsr_max {
            return Err(CalibrationError::ForceThresholdsInverted);
        }
        if volume_min > volume_max || volume_max > 127 {
            return Err(CalibrationError::VolumeBoundsInvalid);
        }
        Ok(Self {
            fsr_min,
            fsr_max,
            volume_min,
            volume_max,
        })
    }

    /// Returns the volume for a force reading, always within `[volume_min, volume_max]`.
    pub fn volume_of(&self, reading: i16) -> U7 {
        let volume = if reading <= self.fsr_min {
            self.volume_max
        } else if reading >= self.fsr_max {
            self.volume_min
        } else {
            let travel = i32::from(reading) - i32::from(self.fsr_min);
            let span = i32::from(self.fsr_max) - i32::from(self.fsr_min);
            let swing = i32::from(self.volume_max) - i32::from(self.volume_min);
            (i32::from(self.volume_max) - travel * swing / span) as u8
        };
        U7::from_u8_lossy(volume)
    }
}
