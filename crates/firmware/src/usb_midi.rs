//! Outbound USB-MIDI: a bounded queue between the performance and the USB endpoint.
//!
//! Nothing is queued while the host is away, and whatever was queued when it left is thrown out, so a reconnecting
//! host never receives stale notes.

use core::sync::atomic::{AtomicBool, Ordering};
use defmt::{panic, *};
use embassy_futures::select::{Either, select};
use embassy_stm32::usb;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_usb::{Handler, class::midi::MidiClass, driver::EndpointError};
use sdx_lib::emitter::{MidiSink, SinkError, usb_midi_packet};

/// Virtual cable every message is sent on.
const CABLE: u8 = 0;

/// Packets fit in one full-speed bulk transfer.
const MAX_TRANSFER: usize = 64;

const OUTBOX_DEPTH: usize = 64;

static CONNECTED: AtomicBool = AtomicBool::new(false);

/// Set on every connection until the performance takes it.
static RECONNECTED: AtomicBool = AtomicBool::new(false);

/// Raised by the USB stack when the host goes away, even while nothing is being written.
static LINK_LOST: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static OUTBOX: Channel<CriticalSectionRawMutex, [u8; 4], OUTBOX_DEPTH> = Channel::new();

/// Records whether a host is listening; losing it also discards anything still queued.
pub fn set_connected(connected: bool) {
    if connected {
        LINK_LOST.reset();
        RECONNECTED.store(true, Ordering::Relaxed);
    } else {
        OUTBOX.clear();
    }
    CONNECTED.store(connected, Ordering::Relaxed);
}

/// Returns `true` once per connection, so the performance can re-send its steady state to the new host.
pub fn take_reconnected() -> bool {
    RECONNECTED.swap(false, Ordering::Relaxed)
}

/// Notices the host leaving from the USB stack's own state changes.
pub struct LinkWatcher;

impl LinkWatcher {
    fn lost(&self) {
        if CONNECTED.swap(false, Ordering::Relaxed) {
            LINK_LOST.signal(());
        }
    }
}

impl Handler for LinkWatcher {
    fn enabled(&mut self, enabled: bool) {
        if !enabled {
            self.lost();
        }
    }

    fn reset(&mut self) {
        self.lost();
    }

    fn configured(&mut self, configured: bool) {
        if !configured {
            self.lost();
        }
    }
}

/// Hands messages to [`forward`] without waiting on the USB endpoint.
pub struct UsbMidiSink;

impl MidiSink for UsbMidiSink {
    fn send(&mut self, message: [u8; 3]) -> Result<(), SinkError> {
        if !CONNECTED.load(Ordering::Relaxed) {
            return Err(SinkError::Disconnected);
        }
        OUTBOX
            .try_send(usb_midi_packet(CABLE, message))
            .map_err(|_| SinkError::Full)
    }
}

#[doc(hidden)]
pub struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Writes queued packets to the host until it goes away, batching whatever is waiting into a single transfer.
pub async fn forward<'d, T: usb::Instance + 'd>(
    class: &mut MidiClass<'d, usb::Driver<'d, T>>,
) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_TRANSFER];
    loop {
        let packet = match select(OUTBOX.receive(), LINK_LOST.wait()).await {
            Either::First(packet) => packet,
            Either::Second(()) => return Err(Disconnected {}),
        };
        buf[..4].copy_from_slice(&packet);
        let mut len = 4;

        while len < MAX_TRANSFER {
            match OUTBOX.try_receive() {
                Ok(packet) => {
                    buf[len..len + 4].copy_from_slice(&packet);
                    len += 4;
                }
                Err(_) => break,
            }
        }

        trace!("Writing {} bytes of MIDI", len);
        class.write_packet(&buf[..len]).await?;
    }
}
