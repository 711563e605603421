//! Calibrations for the four-string violin layout of the SDX, tuned G3 D4 A4 E5.
//!
//! The boundary tables were measured on the prototype fingerboard, whose softpot reads roughly 0 to 26000 over its
//! length. Because every preset is a `const`, an invalid table is a compile error.

use super::InstrumentConfig;
use crate::{
    calibration::{FretMap, PitchBendCurve, VolumeCurve},
    sensor_frame::{AdcChip, AdcInput, SensorChannel},
};
use wmidi::Note;

/// Number of strings on the violin.
pub const STRINGS: usize = 4;

/// G3, D4, A4, E5
pub const OPEN_NOTES: [Note; STRINGS] = [Note::G3, Note::D4, Note::A4, Note::E5];

/// Largest softpot reading trusted to be a real touch.
pub const SOFTPOT_MAX_POSITION: i16 = 26000;

/// Measured boundaries of the 16 fret zones (the open string plus 15 semitones).
pub const FRET_BOUNDARIES: [i16; 17] = [
    0,     // open string
    9000,  // 1st fret
    13200, // 2nd fret
    14000, // 3rd fret
    14650, // 4th fret
    15350, // 5th fret
    16150, // 6th fret
    16800, // 7th fret
    17630, // 8th fret
    18550, // 9th fret
    19300, // 10th fret
    20220, // 11th fret
    21100, // 12th fret
    21950, // 13th fret
    22850, // 14th fret
    24000, // 15th fret
    24950, // end of the 15th fret
];

/// Evenly spaced boundaries from 9000 to 26000, preceded by an open-string zone. Used by the early fingerboard
/// whose softpot is wired to the last input of the second converter.
pub const EVEN_FRET_BOUNDARIES: [i16; 18] = [
    0, 9000, 10062, 11125, 12187, 13250, 14312, 15375, 16437, 17500, 18562, 19625, 20687, 21750,
    22812, 23875, 24937, 26000,
];

/// Force reading at or below which a string plays at full volume.
pub const FSR_MIN_VALUE: i16 = 2000;
/// Force reading at or above which a string plays at [`VOLUME_MIN`].
pub const FSR_MAX_VALUE: i16 = 22000;
/// Quietest volume a sounding string produces.
pub const VOLUME_MIN: u8 = 13;
/// Loudest volume a sounding string produces.
pub const VOLUME_MAX: u8 = 127;

/// Deviation from a fret's center, in raw softpot units, at which pitch bend saturates.
pub const PITCH_BEND_MAX_DEVIATION: i16 = 400;
/// Pitch-bend swing at saturation; a quarter of the 14-bit range, i.e. a semitone with the common ±2 setting.
pub const PITCH_BEND_RANGE: u16 = 2048;

/// Consecutive identical fret readings required to accept a new fret.
pub const FRET_STABILITY: u8 = 3;

const SOFTPOT: SensorChannel = SensorChannel::new(AdcChip::B, AdcInput::Ain0);

const FORCE: [SensorChannel; STRINGS] = [
    SensorChannel::new(AdcChip::A, AdcInput::Ain0),
    SensorChannel::new(AdcChip::A, AdcInput::Ain1),
    SensorChannel::new(AdcChip::A, AdcInput::Ain2),
    SensorChannel::new(AdcChip::A, AdcInput::Ain3),
];

const fn fret_map(boundaries: &'static [i16]) -> FretMap {
    match FretMap::new(boundaries, SOFTPOT_MAX_POSITION) {
        Ok(map) => map,
        Err(_) => panic!("fret boundaries must be strictly increasing"),
    }
}

const VOLUME: VolumeCurve = match VolumeCurve::new(FSR_MIN_VALUE, FSR_MAX_VALUE, VOLUME_MIN, VOLUME_MAX)
{
    Ok(curve) => curve,
    Err(_) => panic!("invalid volume calibration"),
};

const PITCH_BEND: PitchBendCurve = match PitchBendCurve::new(PITCH_BEND_MAX_DEVIATION, PITCH_BEND_RANGE)
{
    Ok(curve) => curve,
    Err(_) => panic!("invalid pitch-bend calibration"),
};

/// Fretted notes only; velocity is fixed and no expressive controllers are sent.
pub const FRETTED: InstrumentConfig<STRINGS> = InstrumentConfig {
    open_notes: OPEN_NOTES,
    fret_map: fret_map(&FRET_BOUNDARIES),
    softpot: SOFTPOT,
    force: FORCE,
    volume: None,
    pitch_bend: None,
    fret_stability: FRET_STABILITY,
};

/// Fretted notes with volume from string pressure and pitch bend from the finger's position within its fret.
pub const EXPRESSIVE: InstrumentConfig<STRINGS> = InstrumentConfig {
    volume: Some(VOLUME),
    pitch_bend: Some(PITCH_BEND),
    ..FRETTED
};

/// The early fingerboard: evenly spaced frets, softpot on the last input of the second converter.
pub const EVENLY_FRETTED: InstrumentConfig<STRINGS> = InstrumentConfig {
    fret_map: fret_map(&EVEN_FRET_BOUNDARIES),
    softpot: SensorChannel::new(AdcChip::B, AdcInput::Ain3),
    ..FRETTED
};

/// Every press sounds its open string, whatever the fingerboard reads.
pub const OPEN_STRINGS: InstrumentConfig<STRINGS> = InstrumentConfig {
    fret_map: fret_map(&[0, SOFTPOT_MAX_POSITION]),
    ..FRETTED
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fretted_spans_fifteen_semitones() {
        assert_eq!(15, FRETTED.fret_map.highest_fret(), "Expected left but got right");
    }

    #[test]
    fn evenly_fretted_spans_sixteen_semitones() {
        let map = EVENLY_FRETTED.fret_map;
        assert_eq!(16, map.highest_fret(), "Expected left but got right");
        assert_eq!(0, map.fret_of(8999), "Expected left but got right");
        assert_eq!(1, map.fret_of(9000), "Expected left but got right");
        assert_eq!(16, map.fret_of(26000), "Expected left but got right");
    }

    #[test]
    fn open_strings_never_fret() {
        let map = OPEN_STRINGS.fret_map;
        assert_eq!(0, map.fret_of(0), "Expected left but got right");
        assert_eq!(0, map.fret_of(20000), "Expected left but got right");
        assert_eq!(0, map.fret_of(i16::MAX), "Expected left but got right");
    }

    #[test]
    fn only_expressive_derives_controllers() {
        assert!(FRETTED.volume.is_none() && FRETTED.pitch_bend.is_none());
        assert!(EXPRESSIVE.volume.is_some() && EXPRESSIVE.pitch_bend.is_some());
    }
}
