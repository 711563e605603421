//! Minimal driver for the two ADS1115 converters that digitize the force sensors and the fingerboard.
//!
//! Both chips run continuously at 860 samples per second with a ±4.096 V range. Reading an input means pointing the
//! multiplexer at it, waiting [`settle_time`] for a fresh conversion, then fetching the conversion register. The bus
//! is borrowed per call so the two chips can share it without a bus manager.

use crate::sensor_frame::{AdcChip, AdcInput, INPUTS_PER_CHIP};
use embassy_time::Duration;
use embedded_hal::i2c::I2c;

/// Bus address of [`AdcChip::A`] (ADDR pin tied to ground).
pub const ADDRESS_A: u8 = 0x48;
/// Bus address of [`AdcChip::B`] (ADDR pin tied to supply).
pub const ADDRESS_B: u8 = 0x49;

const CONVERSION_REGISTER: u8 = 0x00;
const CONFIG_REGISTER: u8 = 0x01;

const OS_START: u16 = 1 << 15;
const MUX_SINGLE_ENDED: u16 = 0b100;
const MUX_SHIFT: u16 = 12;
const PGA_4_096V: u16 = 0b001 << 9;
const MODE_CONTINUOUS: u16 = 0 << 8;
const DATA_RATE_860_SPS: u16 = 0b111 << 5;
const COMPARATOR_DISABLED: u16 = 0b11;

/// Interval between sensor scans; must exceed [`scan_time`].
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(12);

/// Bus time of one [`Ads1115::select`] plus one [`Ads1115::read`] at 400 kHz, rounded up.
pub const INPUT_BUS_TIME: Duration = Duration::from_micros(250);

/// Time between changing the multiplexer and the first conversion of the new input being available: one conversion
/// period at 860 samples per second, rounded up to whole timer ticks.
pub const fn settle_time() -> Duration {
    Duration::from_micros(1200)
}

/// Worst-case duration of a scan of every input of both converters.
pub const fn scan_time() -> Duration {
    let per_input = settle_time().as_ticks() + INPUT_BUS_TIME.as_ticks();
    Duration::from_ticks(per_input * (2 * INPUTS_PER_CHIP) as u64)
}

/// Returns the configuration word that measures `input` against ground.
pub fn config_word(input: AdcInput) -> u16 {
    let mux = (MUX_SINGLE_ENDED | input as u16) << MUX_SHIFT;
    OS_START | mux | PGA_4_096V | MODE_CONTINUOUS | DATA_RATE_860_SPS | COMPARATOR_DISABLED
}

/// One ADS1115 on the sensor bus.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ads1115 {
    address: u8,
}

impl Ads1115 {
    /// Constructs a driver for the chip at `address`.
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// Constructs a driver for one of the instrument's two converters.
    pub const fn for_chip(chip: AdcChip) -> Self {
        match chip {
            AdcChip::A => Self::new(ADDRESS_A),
            AdcChip::B => Self::new(ADDRESS_B),
        }
    }

    /// The chip's bus address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Points the multiplexer at `input`. Conversions of the previous input keep arriving for [`settle_time`].
    pub fn select<I2C: I2c>(&self, i2c: &mut I2C, input: AdcInput) -> Result<(), I2C::Error> {
        let [msb, lsb] = config_word(input).to_be_bytes();
        i2c.write(self.address, &[CONFIG_REGISTER, msb, lsb])
    }

    /// Fetches the most recent conversion.
    pub fn read<I2C: I2c>(&self, i2c: &mut I2C) -> Result<i16, I2C::Error> {
        let mut buffer = [0_u8; 2];
        i2c.write_read(self.address, &[CONVERSION_REGISTER], &mut buffer)?;
        Ok(i16::from_be_bytes(buffer))
    }
}
