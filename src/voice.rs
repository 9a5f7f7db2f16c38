//! One synthesis voice per sounding MIDI note.
//!
//! A `Voice` owns a master envelope, a fixed list of
//! oscillator+envelope+mix triplets (the compiled-in patch), and a
//! filter chain. It renders additively into a pre-allocated scratch
//! buffer, runs that through the filter chain, soft-clips, and
//! accumulates into the block output.

use crate::envelope::{Envelope, LadsrParams};
use crate::filter::{Delay, Filter, Pass, PassMode};
use crate::oscillator::{Oscillator, Pitched, SampleData, SamplePlayer, Waveform};

/// One (oscillator, envelope, mix gain) triplet summed by a `Voice`.
#[derive(Debug, Clone)]
pub struct OscEnvMix {
    pub osc: Oscillator,
    pub env: Envelope,
    pub mix: f32,
}

fn pitched_ladsr(waveform: Waveform, tune: f32, mix: f32, ladsr: LadsrParams) -> OscEnvMix {
    OscEnvMix {
        osc: Oscillator::Pitched(Pitched::new(waveform, tune)),
        env: Envelope::ladsr(ladsr),
        mix,
    }
}

fn default_ladsr() -> LadsrParams {
    LadsrParams {
        delay: 0.0,
        attack: 0.01,
        decay: 0.15,
        sustain: 0.7,
        release: 0.25,
    }
}

/// Builds the canonical compiled-in patch: an optional looped sample
/// layer, sub-octave sine, sub-fifth triangle, main sine, fifth sine,
/// octave sine, and octave-2 pulse, each with its own LADSR, followed
/// by a low-pass `Pass` and a feedback `Delay`.
fn build_patch(sample: Option<SampleData>, sample_rate: f32) -> (Vec<OscEnvMix>, Vec<Filter>) {
    let mut mixes = Vec::with_capacity(7);

    if let Some(data) = sample {
        mixes.push(OscEnvMix {
            osc: Oscillator::Sample(SamplePlayer::new(data)),
            env: Envelope::ladsr(default_ladsr()),
            mix: 0.3,
        });
    }

    mixes.push(pitched_ladsr(Waveform::Sine, -1.0, 0.22, default_ladsr())); // sub-octave
    mixes.push(pitched_ladsr(
        Waveform::Triangle,
        -7.0 / 12.0,
        0.12,
        default_ladsr(),
    )); // sub-fifth
    mixes.push(pitched_ladsr(Waveform::Sine, 0.0, 0.5, default_ladsr())); // main
    mixes.push(pitched_ladsr(
        Waveform::Sine,
        7.0 / 12.0,
        0.1,
        default_ladsr(),
    )); // fifth
    mixes.push(pitched_ladsr(Waveform::Sine, 1.0, 0.08, default_ladsr())); // octave
    mixes.push(pitched_ladsr(Waveform::Pulse, 2.0, 0.04, default_ladsr())); // octave-2

    let filters = vec![
        Filter::Pass(Pass::new(PassMode::LowPass, 4)),
        Filter::Delay(Delay::new(sample_rate, 0.18, 0.3)),
    ];

    (mixes, filters)
}

fn pitch_hz_for_note(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

pub struct Voice {
    /// The MIDI note number this voice is permanently bound to; set once
    /// at construction and never reassigned.
    pub note: u8,
    pitch_hz: f32,
    velocity: f32,
    trigger_frame: i64,
    sample_rate: f32,

    master: Envelope,
    mixes: Vec<OscEnvMix>,
    filters: Vec<Filter>,
    scratch: Vec<f32>,
}

impl Voice {
    pub fn new(note: u8, sample_rate: f32, buffer_size: usize, sample: Option<SampleData>) -> Self {
        let (mixes, filters) = build_patch(sample, sample_rate);
        Self {
            note,
            pitch_hz: pitch_hz_for_note(note),
            velocity: 0.0,
            trigger_frame: 0,
            sample_rate,
            master: Envelope::ladsr(LadsrParams {
                delay: 0.0,
                attack: 0.005,
                decay: 0.1,
                sustain: 1.0,
                release: 0.2,
            }),
            mixes,
            filters,
            scratch: vec![0.0; buffer_size],
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for f in &mut self.filters {
            f.set_sample_rate(sample_rate);
        }
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.scratch.resize(buffer_size, 0.0);
    }

    pub fn trigger(&mut self, velocity: f32, first_frame: i64) {
        self.velocity = velocity;
        self.trigger_frame = first_frame;
        self.master.push_down();
        for mix in &mut self.mixes {
            mix.env.push_down();
            mix.osc.reset();
        }
        for filter in &mut self.filters {
            if let Filter::Pass(p) = filter {
                p.reset();
            }
        }
    }

    pub fn release(&mut self) {
        self.master.lift_up();
        for mix in &mut self.mixes {
            mix.env.lift_up();
        }
    }

    /// Binds the block's half-block controller snapshots to the pedal
    /// latch, pulse-width, and filter-cutoff parameter updates.
    pub fn update(&mut self, mod_wheel: &[f32], aftertouch: &[f32], sustain: &[f32]) {
        let mid = mod_wheel.len() / 2;
        let pedal = sustain.get(mid).copied().unwrap_or(0.0) > 0.5;
        let pulse_centre = 0.5 + 0.5 * mod_wheel.get(mid).copied().unwrap_or(0.0);
        let at = aftertouch.get(mid).copied().unwrap_or(0.0);

        self.master.set_pedal(pedal);
        for mix in &mut self.mixes {
            mix.env.set_pedal(pedal);
            mix.osc.set_pulse_centre(pulse_centre);
        }
        for filter in &mut self.filters {
            if let Filter::Pass(p) = filter {
                p.set_params(1.0 - at, at);
            }
        }
    }

    /// Additively renders this voice's block into `out`, which is
    /// assumed to already hold the accumulated output of
    /// previously-rendered voices; it is not zeroed here.
    pub fn render(
        &mut self,
        out: &mut [f32],
        global_frame_at_block_start: i64,
        bend_freq: &[f32],
        expression: &[f32],
        aftertouch: &[f32],
    ) {
        let n = out.len();
        self.scratch[..n].fill(0.0);

        for f in 0..n {
            let freq = bend_freq[f] * self.pitch_hz / self.sample_rate;
            let t = (f as i64 + global_frame_at_block_start - self.trigger_frame) as f32
                / self.sample_rate;
            let master_w = expression[f] * self.velocity * self.master.weight(t);

            let mut sample = 0.0;
            for mix in &mut self.mixes {
                sample += master_w
                    * mix.mix
                    * (1.0 + aftertouch[f])
                    * mix.env.weight(t)
                    * mix.osc.amplitude(freq);
            }
            self.scratch[f] = sample;
        }

        for filter in &mut self.filters {
            for f in 0..n {
                self.scratch[f] = filter.process(self.scratch[f]);
            }
        }

        for f in 0..n {
            out[f] += self.scratch[f].tanh();
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.master.is_sounding() || self.mixes.iter().any(|m| m.env.is_sounding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_hz_matches_a440_tuning() {
        assert!((pitch_hz_for_note(69) - 440.0).abs() < 1e-3);
        assert!((pitch_hz_for_note(60) - 261.626).abs() < 0.01);
    }

    #[test]
    fn silent_before_trigger() {
        let mut v = Voice::new(60, 48_000.0, 64, None);
        let mut out = vec![0.0; 64];
        let bend_freq = vec![1.0; 64];
        let expr = vec![1.0; 64];
        let at = vec![0.0; 64];
        v.update(&vec![0.0; 64], &at, &vec![0.0; 64]);
        v.render(&mut out, 0, &bend_freq, &expr, &at);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(!v.is_sounding());
    }

    #[test]
    fn triggered_voice_is_sounding_and_nonzero() {
        let mut v = Voice::new(60, 48_000.0, 64, None);
        v.trigger(1.0, 0);
        assert!(v.is_sounding());

        let mut out = vec![0.0; 64];
        let bend_freq = vec![1.0; 64];
        let expr = vec![1.0; 64];
        let at = vec![0.0; 64];
        let mw = vec![0.0; 64];
        let sustain = vec![0.0; 64];
        v.update(&mw, &at, &sustain);
        v.render(&mut out, 0, &bend_freq, &expr, &at);
        assert!(out.iter().any(|&s| s != 0.0));
        assert!(out.iter().all(|&s| s.abs() <= 1.0));
    }

    #[test]
    fn release_eventually_silences_voice() {
        let mut v = Voice::new(60, 48_000.0, 512, None);
        v.trigger(1.0, 0);
        v.release();

        let bend_freq = vec![1.0; 512];
        let expr = vec![1.0; 512];
        let at = vec![0.0; 512];
        let mw = vec![0.0; 512];
        let sustain = vec![0.0; 512];

        let mut frame = 0i64;
        for _ in 0..200 {
            let mut out = vec![0.0; 512];
            v.update(&mw, &at, &sustain);
            v.render(&mut out, frame, &bend_freq, &expr, &at);
            frame += 512;
        }
        assert!(!v.is_sounding());
    }
}
