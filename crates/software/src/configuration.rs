//! This module describes an instrument: how its sensors are wired, how their readings are calibrated, and which
//! expressive controls it supports. Calibrations are compile-time constants; see [`violin`] for the presets.

pub mod violin;

use crate::{
    calibration::{Fret, FretMap, PitchBendCurve, VolumeCurve},
    sensor_frame::SensorChannel,
};
use wmidi::{Note, U7};

/// The most strings an instrument may have; bounds the number of MIDI events a single cycle can produce.
pub const MAX_STRINGS: usize = 6;

/// Everything the [`PerformanceState`](crate::performance::PerformanceState) needs to know about an instrument
/// with `N` strings.
///
/// Instrument variants differ only in their calibration constants and in whether they derive volume and pitch bend
/// from their sensors, so a single engine serves all of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentConfig<const N: usize> {
    /// The note each string sounds when no fret is stopped.
    pub open_notes: [Note; N],
    /// Calibration of the fingerboard.
    pub fret_map: FretMap,
    /// The channel carrying the fingerboard softpot.
    pub softpot: SensorChannel,
    /// The channel carrying each string's force-sensitive resistor.
    pub force: [SensorChannel; N],
    /// Derives a Channel Volume controller from string pressure when present.
    pub volume: Option<VolumeCurve>,
    /// Derives Pitch Bend from the finger's position within its fret when present.
    pub pitch_bend: Option<PitchBendCurve>,
    /// Number of consecutive identical fret readings required before a new fret is accepted.
    pub fret_stability: u8,
}

impl<const N: usize> InstrumentConfig<N> {
    /// Returns the [`Note`] a string sounds when stopped at `fret`, saturating at the top of the MIDI range.
    pub fn note(&self, string: usize, fret: Fret) -> Note {
        let note = u8::from(self.open_notes[string]).saturating_add(fret).min(127);
        Note::from(U7::from_u8_lossy(note))
    }
}
