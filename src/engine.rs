//! The top-level polyphonic synthesizer: owns one voice per MIDI note
//! number and the per-block controller timelines, and renders one
//! audio block at a time from a flat list of already-framed MIDI
//! events. Since every note number has its own permanently assigned
//! voice, there is never a need to allocate or steal one.

use crate::midi::{self, CC_EXPRESSION, CC_MOD_WHEEL, CC_SUSTAIN};
use crate::oscillator::SampleData;
use crate::timeline::Timeline;
use crate::voice::Voice;

pub use crate::midi::MidiEvent;

const NUM_VOICES: usize = 128;

/// Full-scale bend deflection (`bend == ±1`) is one octave either way.
fn bend_to_freq_ratio(bend: f32) -> f32 {
    2f32.powf(bend)
}

pub struct Engine {
    sample_rate: f32,
    buffer_size: usize,
    global_frame: i64,

    voices: Vec<Voice>,

    bend: Timeline,
    mod_wheel: Timeline,
    expression: Timeline,
    aftertouch: Timeline,
    sustain: Timeline,

    bend_scratch: Vec<f32>,
    bend_freq_scratch: Vec<f32>,
    mod_wheel_scratch: Vec<f32>,
    expression_scratch: Vec<f32>,
    aftertouch_scratch: Vec<f32>,
    sustain_scratch: Vec<f32>,
}

impl Engine {
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        Self::with_sample(sample_rate, buffer_size, None)
    }

    pub fn with_sample(sample_rate: f32, buffer_size: usize, sample: Option<SampleData>) -> Self {
        let voices = (0..NUM_VOICES)
            .map(|note| Voice::new(note as u8, sample_rate, buffer_size, sample.clone()))
            .collect();

        Self {
            sample_rate,
            buffer_size,
            global_frame: 0,
            voices,
            bend: Timeline::new(0.0),
            mod_wheel: Timeline::new(0.0),
            expression: Timeline::new(1.0),
            aftertouch: Timeline::new(0.0),
            sustain: Timeline::new(0.0),
            bend_scratch: vec![0.0; buffer_size],
            bend_freq_scratch: vec![1.0; buffer_size],
            mod_wheel_scratch: vec![0.0; buffer_size],
            expression_scratch: vec![1.0; buffer_size],
            aftertouch_scratch: vec![0.0; buffer_size],
            sustain_scratch: vec![0.0; buffer_size],
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for v in &mut self.voices {
            v.set_sample_rate(sample_rate);
        }
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size;
        for v in &mut self.voices {
            v.set_buffer_size(buffer_size);
        }
        self.bend_scratch.resize(buffer_size, 0.0);
        self.bend_freq_scratch.resize(buffer_size, 1.0);
        self.mod_wheel_scratch.resize(buffer_size, 0.0);
        self.expression_scratch.resize(buffer_size, 1.0);
        self.aftertouch_scratch.resize(buffer_size, 0.0);
        self.sustain_scratch.resize(buffer_size, 0.0);
    }

    fn dispatch(&mut self, event: &MidiEvent) {
        let Some(msg) = midi::decode(event) else {
            return;
        };
        let frame = self.global_frame + event.frame_offset;

        match msg {
            midi::Message::NoteOn { note, velocity: 0 } => self.note_off(note),
            midi::Message::NoteOn { note, velocity } => {
                self.voices[note as usize].trigger(velocity as f32 / 127.0, frame);
            }
            midi::Message::NoteOff { note } => self.note_off(note),
            midi::Message::ControlChange { controller, value } => {
                let v = value as f32 / 127.0;
                match controller {
                    CC_MOD_WHEEL => self.mod_wheel.append(frame, v),
                    CC_EXPRESSION => self.expression.append(frame, v),
                    CC_SUSTAIN => self.sustain.append(frame, if value >= 64 { 1.0 } else { 0.0 }),
                    _ => {}
                }
            }
            midi::Message::Aftertouch { pressure } => {
                self.aftertouch.append(frame, pressure as f32 / 127.0);
            }
            midi::Message::PitchBend { raw14 } => {
                self.bend.append(frame, midi::bend_to_unit(raw14));
            }
            midi::Message::Ignored => {}
        }
    }

    fn note_off(&mut self, note: u8) {
        self.voices[note as usize].release();
    }

    /// Renders one block of `out.len()` frames, dispatching `midi_events`
    /// (whose `frame_offset`s are relative to this block's start) at
    /// their sample-accurate positions first.
    pub fn process(&mut self, midi_events: &[MidiEvent], out: &mut [f32]) {
        let n = out.len();
        out.fill(0.0);

        for event in midi_events {
            self.dispatch(event);
        }

        self.bend.materialize(&mut self.bend_scratch[..n]);
        self.mod_wheel.materialize(&mut self.mod_wheel_scratch[..n]);
        self.expression
            .materialize(&mut self.expression_scratch[..n]);
        self.aftertouch
            .materialize(&mut self.aftertouch_scratch[..n]);
        self.sustain.materialize(&mut self.sustain_scratch[..n]);

        for f in 0..n {
            self.bend_freq_scratch[f] = bend_to_freq_ratio(self.bend_scratch[f]);
        }

        for voice in &mut self.voices {
            if !voice.is_sounding() {
                continue;
            }
            voice.update(
                &self.mod_wheel_scratch[..n],
                &self.aftertouch_scratch[..n],
                &self.sustain_scratch[..n],
            );
            voice.render(
                out,
                self.global_frame,
                &self.bend_freq_scratch[..n],
                &self.expression_scratch[..n],
                &self.aftertouch_scratch[..n],
            );
        }

        for s in out.iter_mut() {
            *s = (*s).tanh() / (std::f32::consts::FRAC_PI_2);
        }

        let n = n as i64;
        self.bend.cycle(n);
        self.mod_wheel.cycle(n);
        self.expression.cycle(n);
        self.aftertouch.cycle(n);
        self.sustain.cycle(n);
        self.global_frame += n;
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(note: u8, velocity: u8) -> MidiEvent {
        MidiEvent::new(0, vec![0x90, note, velocity])
    }

    fn note_off(note: u8) -> MidiEvent {
        MidiEvent::new(0, vec![0x80, note, 0])
    }

    #[test]
    fn silent_engine_produces_silence() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        engine.process(&[], &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn note_on_produces_sound_within_a_block() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        engine.process(&[note_on(60, 100)], &mut out);
        assert!(out.iter().any(|&s| s != 0.0));
        assert!(out.iter().all(|&s| s.abs() <= 1.0));
    }

    #[test]
    fn note_off_eventually_silences_the_voice() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        engine.process(&[note_on(60, 100)], &mut out);
        engine.process(&[note_off(60)], &mut out);
        for _ in 0..100 {
            engine.process(&[], &mut out);
        }
        assert!(out.iter().all(|&s| s.abs() < 1e-3));
    }

    #[test]
    fn velocity_zero_note_on_behaves_as_note_off() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        engine.process(&[note_on(60, 100)], &mut out);
        engine.process(&[note_on(60, 0)], &mut out);
        for _ in 0..100 {
            engine.process(&[], &mut out);
        }
        assert!(out.iter().all(|&s| s.abs() < 1e-3));
    }

    #[test]
    fn every_note_number_sounds_independently() {
        let mut engine = Engine::new(48_000.0, 64);
        let mut out = vec![0.0; 64];
        let events: Vec<MidiEvent> = (0..128).map(|n| note_on(n as u8, 100)).collect();
        engine.process(&events, &mut out);
        assert!(out.iter().all(|&s| s.is_finite()));
    }

    #[test]
    fn retriggering_a_sounding_note_restarts_its_own_voice() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        engine.process(&[note_on(60, 100)], &mut out);
        // Same note re-triggered before release: must reuse note 60's
        // voice, not steal a different one.
        engine.process(&[note_on(60, 80)], &mut out);
        assert!(out.iter().any(|&s| s != 0.0));
        engine.process(&[note_off(60)], &mut out);
        for _ in 0..100 {
            engine.process(&[], &mut out);
        }
        assert!(out.iter().all(|&s| s.abs() < 1e-3));
    }

    #[test]
    fn set_buffer_size_resizes_scratch_buffers() {
        let mut engine = Engine::new(48_000.0, 256);
        engine.set_buffer_size(128);
        let mut out = vec![0.0; 128];
        engine.process(&[note_on(60, 100)], &mut out);
        assert!(out.iter().all(|&s| s.is_finite()));
    }

    #[test]
    fn full_scale_bend_is_one_octave() {
        assert!((bend_to_freq_ratio(1.0) - 2.0).abs() < 1e-6);
        assert!((bend_to_freq_ratio(-1.0) - 0.5).abs() < 1e-6);
        assert_eq!(bend_to_freq_ratio(0.0), 1.0);
    }

    #[test]
    fn pitch_bend_event_is_applied_within_the_block() {
        let mut engine = Engine::new(48_000.0, 256);
        let mut out = vec![0.0; 256];
        // Full positive bend (raw=16383) applied at the start of the block.
        let bend = MidiEvent::new(0, vec![0xE0, 0x7F, 0x7F]);
        engine.process(&[note_on(69, 100), bend], &mut out);
        assert!(out.iter().any(|&s| s != 0.0));
        assert!(out.iter().all(|&s| s.abs() <= 1.0));
    }
}
