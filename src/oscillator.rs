//! Stateful phase-accumulating signal sources.
//!
//! Each variant exposes `amplitude(phase_step) -> f32` in `[-1, 1]` and
//! `reset()`. `phase_step` is the fractional phase advance per output
//! sample (`frequency_hz / sample_rate`); pitched oscillators multiply
//! it by their own `tuning` before accumulating phase.

use std::f32::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Pulse,
    Triangle,
    Saw,
    ReverseSaw,
}

/// A phase-accumulating pitched oscillator: sine, pulse, triangle, saw
/// or reverse-saw, with an optional pulse-width warp.
#[derive(Debug, Clone)]
pub struct Pitched {
    waveform: Waveform,
    offset: f32,
    tuning: f32,
    pulse_centre: f32,
}

impl Pitched {
    pub fn new(waveform: Waveform, tune_semitones_or_octaves: f32) -> Self {
        Self {
            waveform,
            offset: 0.0,
            tuning: 2f32.powf(tune_semitones_or_octaves),
            pulse_centre: 0.5,
        }
    }

    pub const PULSE_CENTRE_MIN: f32 = 0.01;
    pub const PULSE_CENTRE_MAX: f32 = 0.99;

    pub fn set_pulse_centre(&mut self, v: f32) {
        self.pulse_centre = v.clamp(Self::PULSE_CENTRE_MIN, Self::PULSE_CENTRE_MAX);
    }

    fn warp(&self, o: f32) -> f32 {
        let c = self.pulse_centre;
        if o < c {
            0.5 * o / c
        } else {
            0.5 + 0.5 * (o - c) / (1.0 - c)
        }
    }

    fn shape(&self, p: f32) -> f32 {
        match self.waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Pulse => {
                if p < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            Waveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            Waveform::Saw => 2.0 * p - 1.0,
            Waveform::ReverseSaw => 1.0 - 2.0 * p,
        }
    }

    pub fn amplitude(&mut self, phase_step: f32) -> f32 {
        let p = self.warp(self.offset);
        self.offset = (self.offset + phase_step * self.tuning).rem_euclid(1.0);
        self.shape(p).clamp(-1.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
    }
}

/// Uniform white noise; ignores `phase_step` entirely. Owns its own
/// seeded RNG rather than drawing from the global thread RNG, so a
/// voice's noise layer is reproducible given the same trigger seed.
#[derive(Debug, Clone)]
pub struct Noise {
    rng: StdRng,
}

impl Noise {
    /// Seeds from a fixed constant, matching the default-constructed
    /// (but process-deterministic) generator the original engine used.
    pub fn new() -> Self {
        Self::with_seed(0x5eed_5eed)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn amplitude(&mut self, _phase_step: f32) -> f32 {
        self.rng.random_range(-1.0..=1.0)
    }

    pub fn reset(&mut self) {}
}

impl Default for Noise {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only, shared mono PCM buffer for sample playback.
pub type SampleData = Arc<Vec<f32>>;

/// Loops a shared mono PCM buffer at its native rate; `phase_step` is
/// currently unused since pitch is the file's own sample rate.
#[derive(Debug, Clone)]
pub struct SamplePlayer {
    audio: SampleData,
    cursor: usize,
}

impl SamplePlayer {
    pub fn new(audio: SampleData) -> Self {
        Self { audio, cursor: 0 }
    }

    pub fn amplitude(&mut self, _phase_step: f32) -> f32 {
        if self.audio.is_empty() {
            return 0.0;
        }
        let sample = self.audio[self.cursor];
        self.cursor = (self.cursor + 1) % self.audio.len();
        sample
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// A tagged-variant oscillator: one of the pitched waveforms, noise,
/// or a looped sample.
#[derive(Debug, Clone)]
pub enum Oscillator {
    Pitched(Pitched),
    Noise(Noise),
    Sample(SamplePlayer),
}

impl Oscillator {
    pub fn amplitude(&mut self, phase_step: f32) -> f32 {
        match self {
            Oscillator::Pitched(o) => o.amplitude(phase_step),
            Oscillator::Noise(n) => n.amplitude(phase_step),
            Oscillator::Sample(s) => s.amplitude(phase_step),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Oscillator::Pitched(o) => o.reset(),
            Oscillator::Noise(n) => n.reset(),
            Oscillator::Sample(s) => s.reset(),
        }
    }

    /// Sets the pulse-width centre on pitched oscillators; a no-op on
    /// noise and sample playback.
    pub fn set_pulse_centre(&mut self, v: f32) {
        if let Oscillator::Pitched(o) = self {
            o.set_pulse_centre(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_amplitude_is_bounded() {
        let mut osc = Pitched::new(Waveform::Sine, 0.0);
        for _ in 0..1000 {
            let a = osc.amplitude(440.0 / 48_000.0);
            assert!((-1.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn pulse_symmetric_at_default_centre() {
        let mut osc = Pitched::new(Waveform::Pulse, 0.0);
        let n = 1000;
        let mut low = 0;
        for _ in 0..n {
            if osc.amplitude(1.0 / n as f32) < 0.0 {
                low += 1;
            }
        }
        assert_eq!(low, n / 2);
    }

    #[test]
    fn noise_is_bounded() {
        let mut n = Noise::new();
        for _ in 0..1000 {
            let a = n.amplitude(0.0);
            assert!((-1.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn noise_with_same_seed_reproduces_the_same_sequence() {
        let mut a = Noise::with_seed(42);
        let mut b = Noise::with_seed(42);
        for _ in 0..64 {
            assert_eq!(a.amplitude(0.0), b.amplitude(0.0));
        }
    }

    #[test]
    fn sample_player_loops_and_resets() {
        let data: SampleData = Arc::new(vec![1.0, 2.0, 3.0]);
        let mut p = SamplePlayer::new(data);
        assert_eq!(p.amplitude(0.0), 1.0);
        assert_eq!(p.amplitude(0.0), 2.0);
        assert_eq!(p.amplitude(0.0), 3.0);
        assert_eq!(p.amplitude(0.0), 1.0);
        p.reset();
        assert_eq!(p.amplitude(0.0), 1.0);
    }

    #[test]
    fn reset_returns_phase_to_zero() {
        let mut osc = Pitched::new(Waveform::Saw, 0.0);
        osc.amplitude(0.3);
        osc.reset();
        assert_eq!(osc.offset, 0.0);
    }
}
