//! A small built-in arpeggio, used by `src/bin/synth.rs` to drive the
//! engine over the native audio host without requiring a real MIDI
//! input device.

use crate::engine::{Engine, MidiEvent};
use crate::host::AudioRenderer;

/// A minor arpeggio: A3, C4, E4, A4, E4, C4.
const PATTERN: [u8; 6] = [57, 60, 64, 69, 64, 60];

pub struct ArpeggioPlayer {
    engine: Engine,
    mono: Vec<f32>,
    pattern_index: usize,
    current_note: Option<u8>,
    frame_in_step: i64,
    frames_per_step: i64,
}

impl ArpeggioPlayer {
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        Self {
            engine: Engine::new(sample_rate, buffer_size),
            mono: vec![0.0; buffer_size],
            pattern_index: 0,
            current_note: None,
            frame_in_step: 0,
            frames_per_step: (sample_rate * 0.35) as i64,
        }
    }

    fn step_events(&mut self) -> Vec<MidiEvent> {
        let mut events = Vec::new();
        if let Some(prev) = self.current_note.take() {
            events.push(MidiEvent::new(0, vec![0x80, prev, 0]));
        }
        let note = PATTERN[self.pattern_index];
        events.push(MidiEvent::new(0, vec![0x90, note, 100]));
        self.current_note = Some(note);
        self.pattern_index = (self.pattern_index + 1) % PATTERN.len();
        events
    }
}

impl AudioRenderer for ArpeggioPlayer {
    fn process_block(&mut self, output: &mut [f32]) {
        let n = output.len();
        if self.mono.len() != n {
            self.mono.resize(n, 0.0);
        }

        let events = if self.frame_in_step == 0 {
            self.step_events()
        } else {
            Vec::new()
        };

        self.engine.process(&events, &mut self.mono[..n]);
        output.copy_from_slice(&self.mono[..n]);

        self.frame_in_step += n as i64;
        if self.frame_in_step >= self.frames_per_step {
            self.frame_in_step = 0;
        }
    }
}
