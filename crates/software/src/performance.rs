use crate::{
    calibration::Fret,
    configuration::{InstrumentConfig, MAX_STRINGS},
    emitter::{MidiEvent, VELOCITY},
    sensor_frame::SensorFrame,
};
use tinyvec::ArrayVec;
use wmidi::{ControlFunction, Note, U7, U14};

mod fret_debounce;
pub use fret_debounce::*;

mod note_stack;
pub use note_stack::*;

/// Capacity of the event buffer returned by a single [`PerformanceState::step`].
///
/// A cycle emits at most two events to retune, two per press, two per release, one per string plus one during the
/// consistency sweep, and two expressive controllers: `4 * MAX_STRINGS + 5`.
pub const MAX_EVENTS: usize = 32;

/// The MIDI events produced by one cycle, in the order they must be sent.
pub type Events = ArrayVec<[MidiEvent; MAX_EVENTS]>;

/// Everything the instrument remembers between sampling cycles.
///
/// One instance lives for the controller's whole run. Each cycle, [`step`](Self::step) consumes a [`SensorFrame`] and
/// returns only the events describing what changed since the previous cycle:
/// 1. the raw fret is debounced;
/// 2. a change of fret retunes the sounding string without touching the stack;
/// 3. presses silence whatever sounds and push the pressed string;
/// 4. releases pop the string and, if the next most recent press is still held, sound it again;
/// 5. a consistency sweep forces the sounding note to agree with the buttons, repairing missed transitions;
/// 6. volume and pitch bend are sent when they differ from what was last sent.
///
/// Priority is always last-pressed-wins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceState<const N: usize> {
    /// Held strings in press order; the top one is the one allowed to sound.
    note_stack: NoteStack<N>,
    /// The note each string is currently sounding, if any. At most one is `Some` once a step completes.
    voices: [Option<Note>; N],
    fret: FretDebounce,
    previous_buttons: [bool; N],
    /// Last Channel Volume sent; `None` until the first one.
    volume: Option<U7>,
    /// Last Pitch Bend sent; `None` until the first one.
    pitch_bend: Option<U14>,
}

impl<const N: usize> Default for PerformanceState<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PerformanceState<N> {
    /// Construct a silent `PerformanceState` with nothing held.
    pub fn new() -> Self {
        const { assert!(N <= MAX_STRINGS, "too many strings for the event buffer") };
        Self {
            note_stack: NoteStack::new(),
            voices: [None; N],
            fret: FretDebounce::default(),
            previous_buttons: [false; N],
            volume: None,
            pitch_bend: None,
        }
    }

    /// Held strings, in press order.
    pub fn note_stack(&self) -> &NoteStack<N> {
        &self.note_stack
    }

    /// The string currently sounding, if any.
    pub fn sounding_string(&self) -> Option<usize> {
        self.voices.iter().position(Option::is_some)
    }

    /// The note currently sounding, if any.
    pub fn sounding_note(&self) -> Option<Note> {
        self.voices.iter().find_map(|&voice| voice)
    }

    /// The fret accepted by the debounce.
    pub fn current_fret(&self) -> Fret {
        self.fret.current()
    }

    /// The last Channel Volume sent.
    pub fn sounding_volume(&self) -> Option<U7> {
        self.volume
    }

    /// The last Pitch Bend sent.
    pub fn sounding_pitch_bend(&self) -> Option<U14> {
        self.pitch_bend
    }

    /// Forgets what the host was told while keeping the note stack and the accepted fret.
    ///
    /// Call when the host may have missed events, e.g. after it reconnects. The next [`step`](Self::step) re-sends
    /// the sounding note, volume and pitch bend as though they were new.
    pub fn resync(&mut self) {
        debug!("Resynchronizing with host");
        self.voices = [None; N];
        self.volume = None;
        self.pitch_bend = None;
    }

    /// Runs one sampling cycle and returns the events realizing it.
    pub fn step(&mut self, config: &InstrumentConfig<N>, frame: &SensorFrame<N>) -> Events {
        let mut events = Events::new();

        let previous_fret = self.fret.current();
        let raw_fret = config.fret_map.fret_of(frame.softpot);
        let fret = self.fret.update(raw_fret, config.fret_stability);

        // retune rather than re-trigger: neither the stack nor the volume changes
        if fret != previous_fret {
            trace!("Fret changed from {} to {}", previous_fret, fret);
            if let Some(string) = self.note_stack.top() {
                if self.voices[string].is_some() {
                    self.note_off(string, &mut events);
                    self.note_on(string, fret, config, &mut events);
                }
            }
        }

        for string in 0..N {
            if frame.buttons[string] && !self.previous_buttons[string] {
                debug!("String {} pressed at fret {}", string, fret);
                for voiced in 0..N {
                    self.note_off(voiced, &mut events);
                }
                self.note_stack.push(string);
                self.note_on(string, fret, config, &mut events);
            }
        }

        for string in 0..N {
            if !frame.buttons[string] && self.previous_buttons[string] {
                debug!("String {} released", string);
                self.note_off(string, &mut events);
                self.note_stack.remove(string);
                if let Some(next) = self.note_stack.top() {
                    // a string released in this same frame may still be on the stack
                    if frame.buttons[next] {
                        self.note_on(next, fret, config, &mut events);
                    }
                }
            }
        }

        self.reconcile(config, &frame.buttons, &mut events);
        self.update_expression(config, frame, &mut events);

        self.previous_buttons = frame.buttons;
        events
    }

    /// Forces the sounding note to agree with the buttons: released strings are silenced and dropped from the stack,
    /// then exactly the top of the stack sounds (if its button is held) and everything else is silenced.
    ///
    /// Runs on every [`step`](Self::step), whether or not a transition occurred, so a dropped or reordered frame
    /// converges on the next one. Running it twice in a row emits nothing the second time.
    pub fn reconcile(
        &mut self,
        config: &InstrumentConfig<N>,
        buttons: &[bool; N],
        events: &mut Events,
    ) {
        let fret = self.fret.current();

        for string in 0..N {
            if !buttons[string] && self.voices[string].is_some() {
                warn!("String {} sounding while released; silencing", string);
                self.note_off(string, events);
                self.note_stack.remove(string);
            }
        }

        match self.note_stack.top() {
            Some(top) => {
                for string in 0..N {
                    if string != top {
                        self.note_off(string, events);
                    } else if buttons[string] {
                        self.note_on(string, fret, config, events);
                    }
                }
            }
            None => {
                for string in 0..N {
                    self.note_off(string, events);
                }
            }
        }
    }

    /// Sends Channel Volume and Pitch Bend for the sounding string, but only when they changed.
    fn update_expression(
        &mut self,
        config: &InstrumentConfig<N>,
        frame: &SensorFrame<N>,
        events: &mut Events,
    ) {
        let Some(string) = self.sounding_string() else {
            return;
        };

        if let Some(curve) = config.volume {
            let volume = curve.volume_of(frame.force[string]);
            if self.volume != Some(volume) {
                push(
                    events,
                    MidiEvent::ControlChange {
                        controller: ControlFunction::CHANNEL_VOLUME,
                        value: volume,
                    },
                );
                self.volume = Some(volume);
            }
        }

        if let Some(curve) = config.pitch_bend {
            let bend = curve.pitch_bend_of(frame.softpot, self.fret.current(), &config.fret_map);
            if self.pitch_bend != Some(bend) {
                push(events, MidiEvent::PitchBend { value: bend });
                self.pitch_bend = Some(bend);
            }
        }
    }

    /// Sounds a string at `fret` unless it already sounds.
    fn note_on(
        &mut self,
        string: usize,
        fret: Fret,
        config: &InstrumentConfig<N>,
        events: &mut Events,
    ) {
        if self.voices[string].is_none() {
            let note = config.note(string, fret);
            push(
                events,
                MidiEvent::NoteOn {
                    note,
                    velocity: VELOCITY,
                },
            );
            self.voices[string] = Some(note);
        }
    }

    /// Silences a string if it sounds, using the note it was started with.
    fn note_off(&mut self, string: usize, events: &mut Events) {
        if let Some(note) = self.voices[string].take() {
            push(events, MidiEvent::NoteOff { note });
        }
    }
}

fn push(events: &mut Events, event: MidiEvent) {
    if events.try_push(event).is_some() {
        error!("Event buffer full; dropping {}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::violin::{self, STRINGS};

    type State = PerformanceState<STRINGS>;

    fn frame(buttons: [bool; STRINGS], softpot: i16) -> SensorFrame<STRINGS> {
        SensorFrame {
            buttons,
            force: [violin::FSR_MIN_VALUE; STRINGS],
            softpot,
        }
    }

    fn on(note: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            note: Note::from(U7::from_u8_lossy(note)),
            velocity: VELOCITY,
        }
    }

    fn off(note: u8) -> MidiEvent {
        MidiEvent::NoteOff {
            note: Note::from(U7::from_u8_lossy(note)),
        }
    }

    fn volume(value: u8) -> MidiEvent {
        MidiEvent::ControlChange {
            controller: ControlFunction::CHANNEL_VOLUME,
            value: U7::from_u8_lossy(value),
        }
    }

    fn bend(value: u16) -> MidiEvent {
        MidiEvent::PitchBend {
            value: U14::from_u16_lossy(value),
        }
    }

    /// Steps with the fretted violin and returns the emitted events.
    fn step(state: &mut State, buttons: [bool; STRINGS], softpot: i16) -> Events {
        state.step(&violin::FRETTED, &frame(buttons, softpot))
    }

    #[test]
    fn press_switch_and_return() {
        let mut state = State::new();

        let events = step(&mut state, [false; 4], 0);
        assert!(events.is_empty(), "Idle cycle should be silent");

        let events = step(&mut state, [true, false, false, false], 0);
        assert_eq!([on(55)], events.as_slice(), "Expected left but got right");

        let events = step(&mut state, [true, true, false, false], 0);
        assert_eq!([off(55), on(62)], events.as_slice(), "Expected left but got right");

        let events = step(&mut state, [true, false, false, false], 0);
        assert_eq!([off(62), on(55)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn release_reveals_most_recent_press() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        step(&mut state, [true, true, false, false], 0);
        step(&mut state, [true, true, true, false], 0);
        assert_eq!(Some(Note::A4), state.sounding_note(), "Expected left but got right");

        let events = step(&mut state, [true, true, false, false], 0);
        assert_eq!([off(69), on(62)], events.as_slice(), "Should re-sound B, not A");

        let events = step(&mut state, [true, false, false, false], 0);
        assert_eq!([off(62), on(55)], events.as_slice(), "Should re-sound A");

        let events = step(&mut state, [false; 4], 0);
        assert_eq!([off(55)], events.as_slice(), "Expected left but got right");
        assert!(state.note_stack().is_empty());
        assert_eq!(None, state.sounding_note());
    }

    #[test]
    fn higher_index_does_not_outrank_recency() {
        let mut state = State::new();
        step(&mut state, [false, false, false, true], 0);
        step(&mut state, [true, false, false, true], 0);
        assert_eq!(Some(0), state.sounding_string(), "Last press should sound");

        let events = step(&mut state, [false, false, false, true], 0);
        assert_eq!([off(55), on(76)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn releasing_a_silent_string_changes_nothing_audible() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        step(&mut state, [true, true, false, false], 0);

        let events = step(&mut state, [false, true, false, false], 0);
        assert!(events.is_empty(), "Expected no events but got {:?}", events);
        assert_eq!(Some(Note::D4), state.sounding_note());
        assert_eq!(1, state.note_stack().len());
    }

    #[test]
    fn simultaneous_presses_sound_the_highest_index() {
        let mut state = State::new();
        let events = step(&mut state, [true, false, true, false], 0);
        assert_eq!([on(55), off(55), on(69)], events.as_slice(), "Expected left but got right");
        assert_eq!(2, state.note_stack().len(), "Expected left but got right");
        assert_eq!(Some(2), state.note_stack().top(), "Expected left but got right");
    }

    #[test]
    fn simultaneous_release_of_everything() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        step(&mut state, [true, true, false, false], 0);

        let events = step(&mut state, [false; 4], 0);
        assert_eq!([off(62)], events.as_slice(), "Expected left but got right");
        assert!(state.note_stack().is_empty());
    }

    #[test]
    fn press_and_release_in_one_frame() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);

        let events = step(&mut state, [false, true, false, false], 0);
        assert_eq!([off(55), on(62)], events.as_slice(), "Expected left but got right");
        assert_eq!(Some(1), state.note_stack().top());
        assert_eq!(1, state.note_stack().len());
    }

    #[test]
    fn fret_change_retunes_sounding_string() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);

        // the 1st fret spans [9000, 13200)
        assert!(step(&mut state, [true, false, false, false], 9500).is_empty());
        assert!(step(&mut state, [true, false, false, false], 9500).is_empty());
        let events = step(&mut state, [true, false, false, false], 9500);
        assert_eq!([off(55), on(56)], events.as_slice(), "Expected left but got right");
        assert_eq!(1, state.current_fret());
        assert_eq!(1, state.note_stack().len(), "Retuning must not touch the stack");
    }

    #[test]
    fn jittery_fingerboard_does_not_retune() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        for softpot in [9500, 8900, 9500, 9500, 8900, 9500, 8900, 8900, 9500] {
            let events = step(&mut state, [true, false, false, false], softpot);
            assert!(events.is_empty(), "Retuned on softpot {softpot}");
        }
        assert_eq!(0, state.current_fret());
    }

    #[test]
    fn fret_change_without_sound_is_silent() {
        let mut state = State::new();
        for _ in 0..3 {
            assert!(step(&mut state, [false; 4], 14300).is_empty());
        }
        assert_eq!(3, state.current_fret());

        let events = step(&mut state, [false, true, false, false], 14300);
        assert_eq!([on(65)], events.as_slice(), "Press should use the accepted fret");
    }

    #[test]
    fn press_uses_accepted_fret_not_raw_fret() {
        let mut state = State::new();
        step(&mut state, [false; 4], 0);
        let events = step(&mut state, [true, false, false, false], 14300);
        assert_eq!([on(55)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn negative_softpot_is_open_string() {
        let mut state = State::new();
        for _ in 0..3 {
            step(&mut state, [false; 4], -250);
        }
        let events = step(&mut state, [true, false, false, false], -250);
        assert_eq!([on(55)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn sweep_repairs_missed_release() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        // the frame carrying the release was lost and so was the one before this
        state.previous_buttons = [false; 4];

        let events = step(&mut state, [false; 4], 0);
        assert_eq!([off(55)], events.as_slice(), "Expected left but got right");
        assert!(state.note_stack().is_empty());
    }

    #[test]
    fn sweep_silences_everything_but_the_top() {
        let mut state = State::new();
        state.note_stack.push(1);
        state.note_stack.push(2);
        state.voices = [None, Some(Note::D4), Some(Note::A4), None];

        let mut events = Events::new();
        state.reconcile(&violin::FRETTED, &[false, true, true, false], &mut events);
        assert_eq!([off(62)], events.as_slice(), "Expected left but got right");
        assert_eq!(Some(2), state.sounding_string());
    }

    #[test]
    fn sweep_sounds_a_silent_top() {
        let mut state = State::new();
        state.note_stack.push(3);

        let mut events = Events::new();
        state.reconcile(&violin::FRETTED, &[false, false, false, true], &mut events);
        assert_eq!([on(76)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn sweep_is_idempotent() {
        let mut state = State::new();
        state.note_stack.push(0);
        state.note_stack.push(3);
        state.voices = [Some(Note::G3), None, Some(Note::A4), None];
        let buttons = [true, false, false, true];

        let mut events = Events::new();
        state.reconcile(&violin::FRETTED, &buttons, &mut events);
        assert_eq!([off(69), off(55), on(76)], events.as_slice(), "Expected left but got right");

        let mut events = Events::new();
        state.reconcile(&violin::FRETTED, &buttons, &mut events);
        assert!(events.is_empty(), "Expected no events but got {:?}", events);
    }

    #[test]
    fn at_most_one_note_sounds() {
        let mut state = State::new();
        // deterministic pseudo-random button mashing and sliding
        let mut seed: u32 = 0x5D5_1234;
        for cycle in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let bits = (seed >> 16) as u8;
            let buttons = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0];
            let softpot = ((seed >> 8) % 27_000) as i16 - 500;

            step(&mut state, buttons, softpot);

            let sounding = state.voices.iter().filter(|voice| voice.is_some()).count();
            assert!(sounding <= 1, "{sounding} notes sounding after cycle {cycle}");
            match state.sounding_string() {
                Some(string) => {
                    assert!(buttons[string], "Released string sounding after cycle {cycle}");
                    assert_eq!(Some(string), state.note_stack().top(), "Cycle {cycle}");
                }
                None => assert!(
                    buttons.iter().all(|&held| !held),
                    "Silent while held after cycle {cycle}"
                ),
            }
        }
    }

    #[test]
    fn expression_is_sent_with_the_first_note() {
        let mut state = State::new();
        let events = state.step(&violin::EXPRESSIVE, &frame([true, false, false, false], 0));
        assert_eq!(
            [on(55), volume(127), bend(8192)],
            events.as_slice(),
            "Expected left but got right"
        );
    }

    #[test]
    fn expression_is_edge_triggered() {
        let mut state = State::new();
        let mut frame = frame([true, false, false, false], 0);
        state.step(&violin::EXPRESSIVE, &frame);

        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert!(events.is_empty(), "Unchanged expression should be silent");

        frame.force[0] = 12000;
        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert_eq!([volume(70)], events.as_slice(), "Expected left but got right");
        assert_eq!(Some(U7::from_u8_lossy(70)), state.sounding_volume());

        // pressure on a string that is not sounding is ignored
        frame.force[1] = violin::FSR_MAX_VALUE;
        assert!(state.step(&violin::EXPRESSIVE, &frame).is_empty());
    }

    #[test]
    fn volume_follows_the_sounding_string() {
        let mut state = State::new();
        let mut frame = frame([true, false, false, false], 0);
        state.step(&violin::EXPRESSIVE, &frame);

        frame.buttons[1] = true;
        frame.force[1] = violin::FSR_MAX_VALUE;
        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert_eq!([off(55), on(62), volume(13)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn pitch_bend_follows_position_within_fret() {
        let mut state = State::new();
        // 2nd fret spans [13200, 14000), centered on 13600
        let mut frame = frame([false; 4], 13600);
        for _ in 0..3 {
            state.step(&violin::EXPRESSIVE, &frame);
        }

        frame.buttons[2] = true;
        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert_eq!(
            [on(71), volume(127), bend(8192)],
            events.as_slice(),
            "Expected left but got right"
        );

        frame.softpot = 13800;
        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert_eq!([bend(8192 + 1024)], events.as_slice(), "Expected left but got right");
        assert_eq!(Some(U14::from_u16_lossy(9216)), state.sounding_pitch_bend());
    }

    #[test]
    fn no_expression_while_silent() {
        let mut state = State::new();
        for softpot in [0, 13800, 20000] {
            let events = state.step(&violin::EXPRESSIVE, &frame([false; 4], softpot));
            assert!(events.is_empty(), "Expected no events but got {:?}", events);
        }
        assert_eq!(None, state.sounding_volume());
    }

    #[test]
    fn open_strings_ignore_the_fingerboard() {
        let mut state = State::new();
        let config = violin::OPEN_STRINGS;
        state.step(&config, &frame([false; 4], 20000));
        state.step(&config, &frame([false; 4], 20000));
        let events = state.step(&config, &frame([false, false, false, true], 20000));
        assert_eq!([on(76)], events.as_slice(), "Expected left but got right");
    }

    #[test]
    fn resync_resends_what_a_missing_host_lost() {
        let mut state = State::new();
        let mut frame = frame([true, false, false, false], 13800);
        frame.force[0] = 12000;
        // the host was away for these, so they were lost
        for _ in 0..4 {
            state.step(&violin::EXPRESSIVE, &frame);
        }
        assert!(state.step(&violin::EXPRESSIVE, &frame).is_empty());

        state.resync();
        let events = state.step(&violin::EXPRESSIVE, &frame);
        assert_eq!(
            [on(57), volume(70), bend(8192 + 1024)],
            events.as_slice(),
            "Expected left but got right"
        );
        assert_eq!(1, state.note_stack().len(), "Resync must not touch the stack");
        assert!(state.step(&violin::EXPRESSIVE, &frame).is_empty());
    }

    #[test]
    fn resync_while_silent_sends_nothing() {
        let mut state = State::new();
        step(&mut state, [true, false, false, false], 0);
        step(&mut state, [false; 4], 0);

        state.resync();
        let events = step(&mut state, [false; 4], 0);
        assert!(events.is_empty(), "Expected no events but got {:?}", events);
    }

    #[test]
    fn worst_case_cycle_fits_the_buffer() {
        let mut state = PerformanceState::<MAX_STRINGS>::new();
        let config = InstrumentConfig {
            open_notes: [Note::C4; MAX_STRINGS],
            fret_map: violin::EXPRESSIVE.fret_map,
            softpot: violin::EXPRESSIVE.softpot,
            force: [violin::EXPRESSIVE.force[0]; MAX_STRINGS],
            volume: violin::EXPRESSIVE.volume,
            pitch_bend: violin::EXPRESSIVE.pitch_bend,
            fret_stability: 1,
        };
        let idle = SensorFrame::<MAX_STRINGS>::idle();
        let mut held = idle;
        held.buttons = [true; MAX_STRINGS];
        held.force = [violin::FSR_MAX_VALUE; MAX_STRINGS];

        // a full buffer may have dropped events, so every cycle must leave room to spare
        for softpot in [9500, 14300, 20000, 24500] {
            held.softpot = softpot;
            let events = state.step(&config, &held);
            assert_eq!(Some(MAX_STRINGS - 1), state.sounding_string());
            assert_eq!(config.fret_map.fret_of(softpot), state.current_fret());
            assert!(events.len() < MAX_EVENTS, "{} events may have overflowed", events.len());

            held.softpot = softpot + 700;
            let events = state.step(&config, &held);
            assert_eq!(config.fret_map.fret_of(softpot + 700), state.current_fret());
            assert!(events.len() < MAX_EVENTS, "{} events may have overflowed", events.len());

            let events = state.step(&config, &idle);
            assert_eq!(None, state.sounding_string());
            assert!(events.len() < MAX_EVENTS, "{} events may have overflowed", events.len());
        }
    }
}
