//! Sensor acquisition: the per-string buttons plus a full scan of both converters.

use embassy_stm32::{
    gpio::Input,
    i2c::{self, I2c},
    mode::Blocking,
};
use embassy_time::Timer;
use sdx_lib::{
    acquisition::{Ads1115, settle_time},
    configuration::InstrumentConfig,
    sensor_frame::{AdcChip, AdcInput, AdcReadings, SensorFrame},
};

/// The hardware one sampling cycle reads from.
pub struct Sensors<const N: usize> {
    i2c: I2c<'static, Blocking>,
    buttons: [Input<'static>; N],
}

impl<const N: usize> Sensors<N> {
    pub fn new(i2c: I2c<'static, Blocking>, buttons: [Input<'static>; N]) -> Self {
        Self { i2c, buttons }
    }

    /// Reads every sensor once. The buttons are sampled first; the converters are then scanned input by input,
    /// waiting for each to settle after the multiplexer moves.
    pub async fn scan(&mut self, config: &InstrumentConfig<N>) -> Result<SensorFrame<N>, i2c::Error> {
        let buttons = core::array::from_fn(|string| self.buttons[string].is_high());

        let mut readings = AdcReadings::default();
        for (chip, values) in [(AdcChip::A, &mut readings.a), (AdcChip::B, &mut readings.b)] {
            let adc = Ads1115::for_chip(chip);
            for input in AdcInput::ALL {
                adc.select(&mut self.i2c, input)?;
                Timer::after(settle_time()).await;
                values[input.index()] = adc.read(&mut self.i2c)?;
            }
        }

        Ok(SensorFrame::new(buttons, &readings, config))
    }
}
