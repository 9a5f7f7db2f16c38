//! Per-sample stateful filters used in a voice's filter chain.
//!
//! `Pass` is a resonant multimode (LP/HP/BP/Notch) Nth-order cascaded
//! one-pole filter; `Delay` is a fixed-feedback delay line. Both clamp
//! their parameters at the setter so the audio loop itself never has
//! to branch on out-of-range input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

/// Resonant multimode filter built from `order` cascaded one-pole
/// stages sharing a single feedback path.
#[derive(Debug, Clone)]
pub struct Pass {
    mode: PassMode,
    cutoff: f32,
    resonance: f32,
    feedback: f32,
    state: Vec<f32>,
}

impl Pass {
    pub fn new(mode: PassMode, order: usize) -> Self {
        assert!(order >= 2, "Pass filter order must be >= 2");
        let mut f = Self {
            mode,
            cutoff: 0.5,
            resonance: 0.0,
            feedback: 0.0,
            state: vec![0.0; order],
        };
        f.recompute_feedback();
        f
    }

    /// Clamps `cutoff`/`resonance` to [0.01, 0.99] and recomputes the
    /// shared feedback coefficient.
    pub fn set_params(&mut self, cutoff: f32, resonance: f32) {
        self.cutoff = cutoff.clamp(0.01, 0.99);
        self.resonance = resonance.clamp(0.01, 0.99);
        self.recompute_feedback();
    }

    fn recompute_feedback(&mut self) {
        self.feedback = self.resonance + self.resonance / (1.0 - self.cutoff);
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Processes one sample in place.
    pub fn process(&mut self, x: f32) -> f32 {
        let b0_prev = self.state[0];
        let b1_prev = self.state[1];
        self.state[0] += self.cutoff * (x - b0_prev + self.feedback * (b0_prev - b1_prev));
        for i in 1..self.state.len() {
            let prev = self.state[i - 1];
            self.state[i] += self.cutoff * (prev - self.state[i]);
        }
        let last = *self.state.last().unwrap();
        match self.mode {
            PassMode::LowPass => last,
            PassMode::HighPass => x - last,
            PassMode::BandPass => self.state[0] - last,
            PassMode::Notch => x - self.state[0] + last,
        }
    }
}

/// Fixed-feedback delay line: a ring buffer read-then-written every
/// sample, sized from `delay_seconds * sample_rate`.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    delay_seconds: f32,
    sample_rate: f32,
}

impl Delay {
    pub fn new(sample_rate: f32, delay_seconds: f32, feedback: f32) -> Self {
        let len = Self::len_for(sample_rate, delay_seconds);
        Self {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            feedback: feedback.clamp(0.0, 1.0),
            delay_seconds,
            sample_rate,
        }
    }

    fn len_for(sample_rate: f32, delay_seconds: f32) -> usize {
        (delay_seconds * sample_rate).floor() as usize
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 1.0);
    }

    /// Reallocates the ring only if the sample-rate/delay-time change
    /// actually changes the buffer length. Call outside the audio
    /// block, never from `process`.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.resize_if_needed();
    }

    pub fn set_delay_seconds(&mut self, delay_seconds: f32) {
        self.delay_seconds = delay_seconds;
        self.resize_if_needed();
    }

    fn resize_if_needed(&mut self) {
        let len = Self::len_for(self.sample_rate, self.delay_seconds).max(1);
        if len != self.buffer.len() {
            self.buffer = vec![0.0; len];
            self.index = 0;
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let i = self.index % self.buffer.len();
        let y = x + self.buffer[i] * self.feedback;
        self.buffer[i] = y;
        self.index = i + 1;
        y
    }
}

/// One stage in a voice's filter chain.
#[derive(Debug, Clone)]
pub enum Filter {
    Pass(Pass),
    Delay(Delay),
}

impl Filter {
    pub fn process(&mut self, x: f32) -> f32 {
        match self {
            Filter::Pass(p) => p.process(x),
            Filter::Delay(d) => d.process(x),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if let Filter::Delay(d) = self {
            d.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_dc_converges_to_input() {
        let mut f = Pass::new(PassMode::LowPass, 4);
        f.set_params(0.5, 0.1);
        let mut y = 0.0;
        for _ in 0..500 {
            y = f.process(1.0);
        }
        assert!((y - 1.0).abs() < 0.05);
    }

    #[test]
    fn highpass_dc_converges_to_zero() {
        let mut f = Pass::new(PassMode::HighPass, 4);
        f.set_params(0.5, 0.1);
        let mut y = 0.0;
        for _ in 0..500 {
            y = f.process(1.0);
        }
        assert!(y.abs() < 0.05);
    }

    #[test]
    fn params_are_clamped() {
        let mut f = Pass::new(PassMode::LowPass, 2);
        f.set_params(5.0, -2.0);
        // Should not panic and should behave as if clamped to 0.99/0.01.
        let _ = f.process(0.0);
    }

    #[test]
    fn delay_len_matches_sample_rate_times_seconds() {
        let d = Delay::new(48_000.0, 0.5, 0.3);
        assert_eq!(d.buffer.len(), 24_000);
    }

    #[test]
    fn delay_feeds_back_after_one_period() {
        let mut d = Delay::new(10.0, 0.4, 0.5);
        let len = d.buffer.len();
        assert_eq!(len, 4);
        let first = d.process(1.0);
        assert_eq!(first, 1.0);
        for _ in 0..(len - 1) {
            d.process(0.0);
        }
        let after_one_loop = d.process(0.0);
        assert_eq!(after_one_loop, 0.5);
    }

    #[test]
    fn delay_resize_only_on_change() {
        let mut d = Delay::new(48_000.0, 0.1, 0.0);
        let before_ptr = d.buffer.as_ptr();
        d.set_feedback(0.9); // unrelated param, no resize
        assert_eq!(d.buffer.as_ptr(), before_ptr);
    }
}
