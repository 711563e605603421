//! SDX is [Embassy](https://embassy.dev)-based firmware for a fretless string controller. It reads a softpot
//! fingerboard, one force-sensitive resistor per string and one button per string, and plays what it senses to a
//! USB host as a class-compliant MIDI device. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series
//! STM32 microcontroller.
//!
//! The work is split across four tasks:
//! - `acquisition_task` scans the sensors every 12 ms and publishes complete [`SensorFrame`]s;
//! - `performance_task` runs each frame through the [`PerformanceState`] and emits the resulting events;
//! - `midi_task` forwards those events to the host while one is connected;
//! - `usb_task` runs the USB stack.

#![no_std]
#![no_main]

mod sensors;
mod usb_midi;

use crate::{
    sensors::Sensors,
    usb_midi::{LinkWatcher, UsbMidiSink},
};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts,
    gpio::{Input, Pull},
    i2c::{self, I2c},
    peripherals,
    time::Hertz,
    usb,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::Ticker;
use embassy_usb::{Builder, UsbDevice, class::midi::MidiClass};
use sdx_lib::{
    acquisition::SAMPLE_PERIOD,
    configuration::{InstrumentConfig, violin},
    emitter::emit,
    performance::PerformanceState,
    sensor_frame::SensorFrame,
};
use static_cell::StaticCell;

use defmt_rtt as _;
#[cfg(not(feature = "panic-probe"))]
use panic_halt as _;
#[cfg(feature = "panic-probe")]
use panic_probe as _;

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

const STRINGS: usize = violin::STRINGS;

/// The instrument this firmware plays.
const INSTRUMENT: InstrumentConfig<STRINGS> = violin::EXPRESSIVE;

/// The most recent complete frame. A frame not yet consumed is overwritten by the next one, so the performance task
/// always works from the latest state of the sensors.
static FRAMES: Signal<CriticalSectionRawMutex, SensorFrame<STRINGS>> = Signal::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing SDX");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // USB OTG FS needs 48MHz, which only the PLL's Q output can provide
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // both converters share I2C1 on the Arduino header's SCL/SDA pins
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(400_000);
    let i2c = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, i2c_config);

    // one button per string, wired to 3.3V
    let buttons = [
        Input::new(p.PF12, Pull::Down),
        Input::new(p.PF13, Pull::Down),
        Input::new(p.PF14, Pull::Down),
        Input::new(p.PF15, Pull::Down),
    ];

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // The Nucleo's user USB port cannot power the board, so the device is self-powered and must watch VBUS to
    // notice being unplugged.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // pid.codes vendor ID with one of its test product IDs
    let vendor_id = 0x1209;
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("SDX Instruments");
    config.product = Some("SDX");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
    static LINK_WATCHER: StaticCell<LinkWatcher> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );
    builder.handler(LINK_WATCHER.init(LinkWatcher));

    // one jack in either direction; nothing is done with what the host sends
    let class = MidiClass::new(&mut builder, 1, 1, 64);
    let usb = builder.build();

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(midi_task(class)));
    unwrap!(spawner.spawn(performance_task()));
    unwrap!(spawner.spawn(acquisition_task(Sensors::new(i2c, buttons))));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

#[embassy_executor::task]
async fn midi_task(mut class: MidiClass<'static, UsbDriver>) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB connected");
        usb_midi::set_connected(true);
        let _ = usb_midi::forward(&mut class).await;
        usb_midi::set_connected(false);
        info!("USB disconnected");
    }
}

/// Samples every sensor once per [`SAMPLE_PERIOD`] and publishes the result.
///
/// A scan interrupted by a bus error is discarded; only whole frames reach the performance.
#[embassy_executor::task]
async fn acquisition_task(mut sensors: Sensors<STRINGS>) -> ! {
    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    loop {
        ticker.next().await;
        match sensors.scan(&INSTRUMENT).await {
            Ok(frame) => FRAMES.signal(frame),
            Err(err) => warn!("Discarding sensor scan: {}", Debug2Format(&err)),
        }
    }
}

/// Owns the [`PerformanceState`], turning each frame into MIDI.
#[embassy_executor::task]
async fn performance_task() -> ! {
    let mut state = PerformanceState::<STRINGS>::new();
    let mut sink = UsbMidiSink;
    loop {
        let frame = FRAMES.wait().await;
        if usb_midi::take_reconnected() {
            state.resync();
        }
        let events = state.step(&INSTRUMENT, &frame);
        if !events.is_empty() {
            let sent = emit(&events, &mut sink);
            trace!("Sent {} of {} events", sent, events.len());
        }
    }
}
