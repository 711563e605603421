use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7, U14};

/// Every message is sent on the first channel; multi-channel routing is left to the host.
pub const CHANNEL: Channel = Channel::Ch1;

/// Velocity of every Note On; dynamics are carried by the Channel Volume controller instead.
pub const VELOCITY: U7 = U7::from_u8_lossy(127);

/// A change to the performance, produced by the [`PerformanceState`](crate::performance::PerformanceState) and
/// consumed immediately by [`emit`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MidiEvent {
    /// Start sounding `note`.
    NoteOn {
        /// The note to sound.
        note: Note,
        /// Strike velocity.
        velocity: U7,
    },
    /// Stop sounding `note`.
    NoteOff {
        /// The note to silence.
        note: Note,
    },
    /// Set a controller; the engine only ever sends [`ControlFunction::CHANNEL_VOLUME`] (CC 7).
    ControlChange {
        /// The controller being set.
        controller: ControlFunction,
        /// Its new value.
        value: U7,
    },
    /// Bend the sounding note; 8192 is in tune.
    PitchBend {
        /// The 14-bit bend.
        value: U14,
    },
}

/// [`tinyvec`] requires that items implement [`Default`]; the value itself is never observed.
impl Default for MidiEvent {
    fn default() -> Self {
        Self::NoteOff {
            note: Note::from(U7::from_u8_lossy(0)),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MidiEvent {
    fn format(&self, fmt: defmt::Formatter) {
        match *self {
            Self::NoteOn { note, velocity } => defmt::write!(
                fmt,
                "NoteOn {{ note: {} ({}), velocity: {} }}",
                note.to_str(),
                u8::from(note),
                u8::from(velocity)
            ),
            Self::NoteOff { note } => {
                defmt::write!(fmt, "NoteOff {{ note: {} ({}) }}", note.to_str(), u8::from(note))
            }
            Self::ControlChange { controller, value } => defmt::write!(
                fmt,
                "ControlChange {{ controller: {}, value: {} }}",
                u8::from(controller),
                u8::from(value)
            ),
            Self::PitchBend { value } => {
                defmt::write!(fmt, "PitchBend {{ value: {} }}", u16::from(value))
            }
        }
    }
}

impl MidiEvent {
    /// Returns the event as a [`MidiMessage`] on [`CHANNEL`].
    pub fn to_message(self) -> MidiMessage<'static> {
        match self {
            Self::NoteOn { note, velocity } => MidiMessage::NoteOn(CHANNEL, note, velocity),
            Self::NoteOff { note } => MidiMessage::NoteOff(CHANNEL, note, U7::from_u8_lossy(0)),
            Self::ControlChange { controller, value } => {
                MidiMessage::ControlChange(CHANNEL, controller, value)
            }
            Self::PitchBend { value } => MidiMessage::PitchBendChange(CHANNEL, value),
        }
    }

    /// Returns the event's wire form: status byte followed by two data bytes.
    pub fn to_bytes(self) -> [u8; 3] {
        let mut bytes = [0_u8; 3];
        self.to_message()
            .copy_to_slice(&mut bytes)
            .expect("channel voice messages are three bytes long");
        bytes
    }
}

/// Reasons a [`MidiSink`] refuses a message.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// No host is listening.
    Disconnected,
    /// The transport cannot accept another message right now.
    Full,
}

/// A transport capable of delivering three-byte MIDI messages to a host.
pub trait MidiSink {
    /// Hands a message to the transport without waiting for it to be delivered.
    fn send(&mut self, message: [u8; 3]) -> Result<(), SinkError>;
}

/// Sends each event to `sink`, in order, returning how many were accepted.
///
/// Refused events are dropped rather than queued or retried; a stale message would only be noise. Once the sink can
/// deliver again, [`PerformanceState::resync`](crate::performance::PerformanceState::resync) makes the next cycle
/// re-send the steady state.
pub fn emit<S: MidiSink + ?Sized>(events: &[MidiEvent], sink: &mut S) -> usize {
    let mut sent = 0;
    for &event in events {
        match sink.send(event.to_bytes()) {
            Ok(()) => {
                debug!("Sent {}", event);
                sent += 1;
            }
            Err(err) => {
                debug!("Dropped {}: {}", event, err);
            }
        }
    }
    sent
}

/// Wraps a message in a USB-MIDI Event Packet on the given virtual cable.
///
/// The header's high nibble is the cable number; its low nibble is the Code Index Number, which for channel voice
/// messages equals the high nibble of the status byte.
pub fn usb_midi_packet(cable: u8, message: [u8; 3]) -> [u8; 4] {
    [
        (cable << 4) | (message[0] >> 4),
        message[0],
        message[1],
        message[2],
    ]
}
