//! Structures used to pass one sampling cycle's worth of sensor data from the acquisition layer to the
//! [`PerformanceState`](crate::performance::PerformanceState).
//!
//! Frames are only ever built whole: the acquisition layer scans every analog input before handing over an
//! [`AdcReadings`], so a partially updated set of channels is never visible to the state machine.

use crate::configuration::InstrumentConfig;

/// Number of single-ended inputs on each analog-to-digital converter.
pub const INPUTS_PER_CHIP: usize = 4;

/// One of the two analog-to-digital converters sharing the sensor bus.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChip {
    /// The converter strapped to the lower bus address.
    A,
    /// The converter strapped to the higher bus address.
    B,
}

/// A single-ended input of an analog-to-digital converter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcInput {
    /// AIN0
    Ain0,
    /// AIN1
    Ain1,
    /// AIN2
    Ain2,
    /// AIN3
    Ain3,
}

impl AdcInput {
    /// Every input, in scanning order.
    pub const ALL: [AdcInput; INPUTS_PER_CHIP] = [Self::Ain0, Self::Ain1, Self::Ain2, Self::Ain3];

    /// Position of this input within a chip's readings.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Identifies which wire a sensor is soldered to.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorChannel {
    /// The converter digitizing the sensor.
    pub chip: AdcChip,
    /// The converter input the sensor is wired to.
    pub input: AdcInput,
}

impl SensorChannel {
    /// Constructs a [`SensorChannel`].
    pub const fn new(chip: AdcChip, input: AdcInput) -> Self {
        Self { chip, input }
    }
}

/// A complete scan of both converters' inputs, in raw converter units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcReadings {
    /// Readings of [`AdcChip::A`], indexed by [`AdcInput::index`].
    pub a: [i16; INPUTS_PER_CHIP],
    /// Readings of [`AdcChip::B`], indexed by [`AdcInput::index`].
    pub b: [i16; INPUTS_PER_CHIP],
}

impl AdcReadings {
    /// Returns the reading of a single channel.
    pub fn get(&self, channel: SensorChannel) -> i16 {
        let readings = match channel.chip {
            AdcChip::A => &self.a,
            AdcChip::B => &self.b,
        };
        readings[channel.input.index()]
    }
}

/// One sampling cycle's inputs for an instrument with `N` strings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorFrame<const N: usize> {
    /// Whether each string's button is held down.
    pub buttons: [bool; N],
    /// Raw force reading of each string, used for volume.
    pub force: [i16; N],
    /// Raw fingerboard position, used for fret and pitch.
    pub softpot: i16,
}

impl<const N: usize> SensorFrame<N> {
    /// Assembles a frame from the button states and a scan of the converters, picking out the channels the
    /// instrument's sensors are wired to.
    pub fn new(buttons: [bool; N], readings: &AdcReadings, config: &InstrumentConfig<N>) -> Self {
        Self {
            buttons,
            force: config.force.map(|channel| readings.get(channel)),
            softpot: readings.get(config.softpot),
        }
    }

    /// A frame in which nothing is touched.
    pub const fn idle() -> Self {
        Self {
            buttons: [false; N],
            force: [0; N],
            softpot: 0,
        }
    }
}
