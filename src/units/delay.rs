//! `Delay{OneSample|Variable}` (§4.A, §9 design note).

use crate::param::{ParamDef, Parameter};
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// The implicit feedback-edge delay of §4.B made an explicit, ordinary unit:
/// holds the last sample of the previous buffer and emits it as the first
/// sample, shifting everything else by one sample within the buffer.
#[derive(Clone, Default)]
pub struct OneSampleDelay {
    held: f64,
}

impl UnitImpl for OneSampleDelay {
    fn class_name(&self) -> &'static str {
        "delay.one_sample"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::Audio)],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        let mut prev = self.held;
        for k in 0..n {
            outputs[0][k] = prev;
            prev = inputs[0][k];
        }
        self.held = prev;
    }

    fn reset(&mut self) {
        self.held = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Fractional delay line with linear interpolation, for chorus/flanger-style
/// patches. Grounded on VOSIMLib's delay-line usage inside its effects
/// units; sized for up to ~1 second at a nominal 192kHz ceiling.
#[derive(Clone)]
pub struct VariableDelay {
    buffer: Vec<f64>,
    write_pos: usize,
    sample_rate: f64,
}

const MAX_DELAY_SAMPLES: usize = 192_000;

impl VariableDelay {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            buffer: vec![0.0; MAX_DELAY_SAMPLES],
            write_pos: 0,
            sample_rate,
        }
    }
}

impl Default for VariableDelay {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for VariableDelay {
    fn class_name(&self) -> &'static str {
        "delay.variable"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "in", SignalKind::Audio),
                PortDef::new(1, "time", SignalKind::CvUnipolar).with_default(0.1),
                PortDef::new(2, "feedback", SignalKind::CvUnipolar).with_default(0.0),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "max_time_s", 0.001, 1.0, 1.0)]
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        let len = self.buffer.len();
        for k in 0..n {
            let delay_s = inputs[1][k].clamp(0.0, 1.0);
            let feedback = inputs[2][k].clamp(0.0, 0.98);
            let delay_samples = (delay_s * self.sample_rate).clamp(1.0, (len - 1) as f64);

            let read_pos = (self.write_pos as f64 - delay_samples).rem_euclid(len as f64);
            let i0 = read_pos.floor() as usize % len;
            let i1 = (i0 + 1) % len;
            let frac = read_pos.fract();
            let delayed = self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac;

            self.buffer[self.write_pos] = inputs[0][k] + delayed * feedback;
            outputs[0][k] = delayed;

            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn on_fs_change(&mut self, fs: f64) {
        self.sample_rate = fs;
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
    fn one_sample_delay_shifts_by_exactly_one_sample() {
        let mut d = OneSampleDelay::default();
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 4 };
        let input = [1.0, 2.0, 3.0, 4.0];
        let mut out = [0.0; 4];
        let inputs: [&[f64]; 1] = [&input];
        let mut outputs: [&mut [f64]; 1] = [&mut out];
        d.process(&ctx, &inputs, &mut outputs, &[]);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(d.held, 4.0);
    }
}
