//! `Envelope{ADSR}` (§4.A). Grounded on the teacher crate's `Adsr`.

use crate::param::Parameter;
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use libm::Libm;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Classic four-stage envelope generator. `gate` drives attack/release;
/// `retrig` forces a fresh attack without waiting for a gate edge.
#[derive(Clone)]
pub struct Adsr {
    stage: Stage,
    level: f64,
    sample_rate: f64,
    last_gate: f64,
    last_retrig: f64,
}

impl Adsr {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            last_gate: 0.0,
            last_retrig: 0.0,
        }
    }

    fn cv_to_time(cv: f64) -> f64 {
        // 0-1 CV mapped exponentially to 1ms - 10s.
        0.001 * Libm::<f64>::pow(10000.0, cv.clamp(0.0, 1.0))
    }

    /// Whether this voice's envelope has fully decayed to silence, used by
    /// the VoiceManager to reap a releasing voice (§4.D).
    pub fn is_done(&self) -> bool {
        self.stage == Stage::Idle
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for Adsr {
    fn class_name(&self) -> &'static str {
        "envelope.adsr"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "gate", SignalKind::Gate),
                PortDef::new(1, "retrig", SignalKind::Trigger),
                PortDef::new(2, "attack", SignalKind::CvUnipolar).with_default(0.1),
                PortDef::new(3, "decay", SignalKind::CvUnipolar).with_default(0.3),
                PortDef::new(4, "sustain", SignalKind::CvUnipolar).with_default(0.7),
                PortDef::new(5, "release", SignalKind::CvUnipolar).with_default(0.4),
            ],
            vec![
                PortDef::new(10, "env", SignalKind::CvUnipolar),
                PortDef::new(11, "inv", SignalKind::CvUnipolar),
                PortDef::new(12, "eoc", SignalKind::Trigger),
            ],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let gate = inputs[0][k];
            let retrig = inputs[1][k];
            let attack_time = Self::cv_to_time(inputs[2][k]);
            let decay_time = Self::cv_to_time(inputs[3][k]);
            let sustain_level = inputs[4][k].clamp(0.0, 1.0);
            let release_time = Self::cv_to_time(inputs[5][k]);

            let gate_high = gate > 2.5;
            let gate_rising = gate_high && self.last_gate <= 2.5;
            let gate_falling = !gate_high && self.last_gate > 2.5;
            let retrig_rising = retrig > 2.5 && self.last_retrig <= 2.5;

            if gate_rising || (retrig_rising && gate_high) {
                self.stage = Stage::Attack;
            } else if gate_falling && self.stage != Stage::Idle {
                self.stage = Stage::Release;
            }

            let attack_rate = 1.0 / (attack_time * self.sample_rate);
            let decay_rate = 1.0 / (decay_time * self.sample_rate);
            let release_rate = 1.0 / (release_time * self.sample_rate);

            let mut eoc = 0.0;
            match self.stage {
                Stage::Idle => self.level = 0.0,
                Stage::Attack => {
                    self.level += attack_rate;
                    if self.level >= 1.0 {
                        self.level = 1.0;
                        self.stage = Stage::Decay;
                    }
                }
                Stage::Decay => {
                    self.level -= decay_rate;
                    if self.level <= sustain_level {
                        self.level = sustain_level;
                        self.stage = Stage::Sustain;
                    }
                }
                Stage::Sustain => self.level = sustain_level,
                Stage::Release => {
                    self.level -= release_rate;
                    if self.level <= 0.0 {
                        self.level = 0.0;
                        self.stage = Stage::Idle;
                        eoc = 5.0;
                    }
                }
            }

            outputs[0][k] = self.level;
            outputs[1][k] = 1.0 - self.level;
            outputs[2][k] = eoc;

            self.last_gate = gate;
            self.last_retrig = retrig;
        }
    }

    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.last_gate = 0.0;
        self.last_retrig = 0.0;
    }

    fn on_fs_change(&mut self, fs: f64) {
        self.sample_rate = fs;
    }

    fn on_note_off(&mut self, _note: u8, _vel: u8) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitContext;

    #[test]
    fn attack_ramps_from_zero_on_gate_rise() {
        let mut env = Adsr::new(1000.0);
        let ctx = UnitContext { sample_rate: 1000.0, tempo: 120.0, buffer_size: 1 };
        let gate = [5.0];
        let retrig = [0.0];
        let attack = [0.001]; // ~1ms -> fast-ish
        let decay = [0.01];
        let sustain = [0.5];
        let release = [0.01];
        let mut env_out = [0.0];
        let mut inv_out = [0.0];
        let mut eoc_out = [0.0];
        let inputs: [&[f64]; 6] = [&gate, &retrig, &attack, &decay, &sustain, &release];
        let mut outputs: [&mut [f64]; 3] = [&mut env_out, &mut inv_out, &mut eoc_out];
        env.process(&ctx, &inputs, &mut outputs, &[]);
        assert!(env.stage == Stage::Attack || env.stage == Stage::Decay);
        assert!(env_out[0] > 0.0);
    }

    #[test]
    fn idle_is_done() {
        let env = Adsr::new(44100.0);
        assert!(env.is_done());
    }
}
