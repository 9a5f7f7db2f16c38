//! Time-keyed amplitude envelopes.
//!
//! All three shapes share the same down/pedal/sounding bookkeeping;
//! only the segment math in `weight` differs, and LAD additionally
//! decays on its own even while held (it has no sustain segment).
//! Time is always seconds since the owning voice's `trigger_frame`;
//! envelopes never store absolute time themselves.

/// (t, weight) captured at the instant a release-style segment begins,
/// so that segment can interpolate from wherever the envelope actually
/// was (handles release during attack).
#[derive(Debug, Clone, Copy, Default)]
struct ReleaseAnchor {
    active: bool,
    time: f32,
    weight: f32,
}

/// down/pedal bookkeeping shared by every envelope shape.
#[derive(Debug, Clone, Copy, Default)]
struct Gate {
    down: bool,
    pedal: bool,
    sounding: bool,
}

impl Gate {
    fn push_down(&mut self) {
        self.down = true;
        self.sounding = true;
    }

    fn lift_up(&mut self) {
        self.down = false;
    }

    fn set_pedal(&mut self, pedal: bool) {
        self.pedal = pedal;
    }

    fn held(&self) -> bool {
        self.down || self.pedal
    }
}

#[derive(Debug, Clone)]
pub struct LadParams {
    pub delay: f32,
    pub attack: f32,
    pub decay: f32,
}

#[derive(Debug, Clone)]
pub struct LadsrParams {
    pub delay: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// Four-level, four-rate envelope: `levels[3]` is the pre-delay floor
/// and release target; `levels[0..3]` / `rates[0..3]` are the three
/// segments run in sequence while held, `levels[2]` is the sustain
/// level reached once they complete; `rates[3]` is the release time.
#[derive(Debug, Clone)]
pub struct Dl4r4Params {
    pub levels: [f32; 4],
    pub rates: [f32; 4],
    pub delay: f32,
}

#[derive(Debug)]
enum Shape {
    Lad(LadParams),
    Ladsr(LadsrParams),
    Dl4r4(Dl4r4Params),
}

/// A tagged-variant envelope: LAD, LADSR, or DL4R4.
#[derive(Debug, Clone)]
pub struct Envelope {
    gate: Gate,
    anchor: ReleaseAnchor,
    shape: Shape,
}

impl Envelope {
    pub fn lad(params: LadParams) -> Self {
        Self {
            gate: Gate::default(),
            anchor: ReleaseAnchor::default(),
            shape: Shape::Lad(params),
        }
    }

    pub fn ladsr(params: LadsrParams) -> Self {
        Self {
            gate: Gate::default(),
            anchor: ReleaseAnchor::default(),
            shape: Shape::Ladsr(params),
        }
    }

    pub fn dl4r4(params: Dl4r4Params) -> Self {
        Self {
            gate: Gate::default(),
            anchor: ReleaseAnchor::default(),
            shape: Shape::Dl4r4(params),
        }
    }

    pub fn push_down(&mut self) {
        self.gate.push_down();
        self.anchor = ReleaseAnchor::default();
    }

    pub fn lift_up(&mut self) {
        self.gate.lift_up();
    }

    pub fn set_pedal(&mut self, pedal: bool) {
        self.gate.set_pedal(pedal);
    }

    pub fn is_sounding(&self) -> bool {
        self.gate.sounding
    }

    /// Weight at time `t` seconds since the voice was triggered.
    /// Always non-negative.
    pub fn weight(&mut self, t: f32) -> f32 {
        let w = match self.shape.clone() {
            Shape::Lad(p) => self.weight_lad(t, &p),
            Shape::Ladsr(p) => self.weight_ladsr(t, &p),
            Shape::Dl4r4(p) => self.weight_dl4r4(t, &p),
        };
        let w = w.max(0.0);
        if w <= 0.0 && self.anchor.active {
            self.gate.sounding = false;
        }
        w
    }

    fn weight_lad(&mut self, t: f32, p: &LadParams) -> f32 {
        let attack_end = p.delay + p.attack;
        let attack_value = if t < p.delay {
            0.0
        } else if t < attack_end {
            (t - p.delay) / p.attack.max(1e-6)
        } else {
            1.0
        };

        let released = !self.gate.held();
        if !self.anchor.active && (released || t >= attack_end) {
            // Anchor at the earlier of "now" (an explicit release) and
            // the natural decay start, whichever condition triggered it.
            let anchor_time = if t >= attack_end { attack_end } else { t };
            self.anchor = ReleaseAnchor {
                active: true,
                time: anchor_time,
                weight: attack_value,
            };
        }

        if self.anchor.active {
            let elapsed = t - self.anchor.time;
            let pos = (elapsed / p.decay.max(1e-6)).clamp(0.0, 1.0);
            self.anchor.weight + pos * (0.0 - self.anchor.weight)
        } else {
            attack_value
        }
    }

    /// Once release begins (`anchor` goes active) it stays active until
    /// the next `push_down`, even if the sustain pedal is pressed again
    /// mid-release — re-engaging the pedal must not resume sustain.
    fn weight_ladsr(&mut self, t: f32, p: &LadsrParams) -> f32 {
        if !self.anchor.active && self.gate.held() {
            return Self::ladsr_held_trajectory(t, p);
        }
        if !self.anchor.active {
            self.anchor = ReleaseAnchor {
                active: true,
                time: t,
                weight: Self::ladsr_held_trajectory(t, p),
            };
        }
        let elapsed = t - self.anchor.time;
        let pos = (elapsed / p.release.max(1e-6)).clamp(0.0, 1.0);
        self.anchor.weight + pos * (0.0 - self.anchor.weight)
    }

    fn ladsr_held_trajectory(t: f32, p: &LadsrParams) -> f32 {
        if t < p.delay {
            0.0
        } else if t < p.delay + p.attack {
            (t - p.delay) / p.attack.max(1e-6)
        } else if t < p.delay + p.attack + p.decay {
            let pos = (t - p.delay - p.attack) / p.decay.max(1e-6);
            1.0 + pos.clamp(0.0, 1.0) * (p.sustain - 1.0)
        } else {
            p.sustain
        }
    }

    /// Same latch rule as `weight_ladsr`: once release begins it runs to
    /// completion regardless of later pedal presses.
    fn weight_dl4r4(&mut self, t: f32, p: &Dl4r4Params) -> f32 {
        if !self.anchor.active && self.gate.held() {
            return Self::dl4r4_held_trajectory(t, p);
        }
        if !self.anchor.active {
            self.anchor = ReleaseAnchor {
                active: true,
                time: t,
                weight: Self::dl4r4_held_trajectory(t, p),
            };
        }
        let elapsed = t - self.anchor.time;
        let pos = (elapsed / p.rates[3].max(1e-6)).clamp(0.0, 1.0);
        self.anchor.weight + pos * (p.levels[3] - self.anchor.weight)
    }

    fn dl4r4_held_trajectory(t: f32, p: &Dl4r4Params) -> f32 {
        if t < p.delay {
            return p.levels[3];
        }
        let mut seg_start = p.delay;
        let mut from = p.levels[3];
        for k in 0..3 {
            let seg_end = seg_start + p.rates[k];
            if t < seg_end {
                let pos = (t - seg_start) / p.rates[k].max(1e-6);
                return from + pos.clamp(0.0, 1.0) * (p.levels[k] - from);
            }
            from = p.levels[k];
            seg_start = seg_end;
        }
        p.levels[2]
    }
}

impl Clone for Shape {
    fn clone(&self) -> Self {
        match self {
            Shape::Lad(p) => Shape::Lad(p.clone()),
            Shape::Ladsr(p) => Shape::Ladsr(p.clone()),
            Shape::Dl4r4(p) => Shape::Dl4r4(p.clone()),
        }
    }
}
