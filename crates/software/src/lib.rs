//! This crate contains architecture-agnostic logic for the SDX, a fretless string controller which turns the readings
//! of its sensors (a linear [softpot](https://en.wikipedia.org/wiki/Potentiometer#Membrane_potentiometers) fingerboard,
//! one force-sensitive resistor and one button per string) into a live [MIDI](https://midi.org/midi-1-0) performance.
//!
//! Each sampling cycle flows leaf-first through three layers:
//! 1. [`calibration`] converts raw sensor units into musical units (fret, volume, pitch bend);
//! 2. [`performance::PerformanceState`] decides which note sounds and produces the MIDI events describing the
//!    change since the previous cycle;
//! 3. [`emitter`] serializes those events and hands them to a [`emitter::MidiSink`].

#![deny(missing_docs)]
#![no_std]

// must come first so the logging macros are visible to the modules below
#[macro_use]
mod fmt;

/// Register-level access to the analog-to-digital converters that digitize the analog sensors.
pub mod acquisition;

pub mod calibration;

pub mod configuration;

/// Serialization of [`emitter::MidiEvent`]s onto the wire.
pub mod emitter;

/// The state machine deciding, cycle by cycle, which note sounds.
pub mod performance;

pub mod sensor_frame;
