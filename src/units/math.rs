//! `Math{Summer|Gain|Lerp|Tanh|Rectifier|Quantizer|Pan|Switch|Constant}`
//! (§4.A). Grounded on `original_source/VOSIMLib/units/include/MathUnits.h`;
//! `Tanh` and `Quantizer` have no direct original counterpart and are
//! written fresh in the same small-stateless-arithmetic idiom as their
//! siblings.

use crate::param::{ParamDef, Parameter};
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use libm::Libm;

/// Sums an arbitrary number of audio inputs (fixed at four ports; unused
/// inputs read their zero default). Grounded on `SummerUnit`.
#[derive(Clone, Default)]
pub struct Summer;

impl UnitImpl for Summer {
    fn class_name(&self) -> &'static str {
        "math.summer"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "in1", SignalKind::Audio),
                PortDef::new(1, "in2", SignalKind::Audio),
                PortDef::new(2, "in3", SignalKind::Audio),
                PortDef::new(3, "in4", SignalKind::Audio),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = inputs[0][k] + inputs[1][k] + inputs[2][k] + inputs[3][k];
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Scales an input by a modulatable `gain` parameter. Grounded on
/// `GainUnit`.
#[derive(Clone, Default)]
pub struct Gain;

impl UnitImpl for Gain {
    fn class_name(&self) -> &'static str {
        "math.gain"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::Audio)],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "gain", 0.0, 4.0, 1.0)]
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let gain = params.first().map(|p| p.value()).unwrap_or(1.0);
        for k in 0..ctx.buffer_size {
            outputs[0][k] = inputs[0][k] * gain;
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Linear interpolation between two inputs by a `mix` CV (0 = a, 1 = b).
/// Grounded on `LerpUnit`.
#[derive(Clone, Default)]
pub struct Lerp;

impl UnitImpl for Lerp {
    fn class_name(&self) -> &'static str {
        "math.lerp"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "a", SignalKind::Audio),
                PortDef::new(1, "b", SignalKind::Audio),
                PortDef::new(2, "mix", SignalKind::CvUnipolar).with_default(0.5),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            let mix = inputs[2][k].clamp(0.0, 1.0);
            outputs[0][k] = inputs[0][k] * (1.0 - mix) + inputs[1][k] * mix;
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Hyperbolic-tangent soft clipper with a `drive` parameter.
#[derive(Clone, Default)]
pub struct Tanh;

impl UnitImpl for Tanh {
    fn class_name(&self) -> &'static str {
        "math.tanh"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::Audio)],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "drive", 0.1, 10.0, 1.0)]
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let drive = params.first().map(|p| p.value()).unwrap_or(1.0);
        for k in 0..ctx.buffer_size {
            outputs[0][k] = Libm::<f64>::tanh(inputs[0][k] * drive);
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Full-wave rectifier. Grounded on `RectifierUnit`.
#[derive(Clone, Default)]
pub struct Rectifier;

impl UnitImpl for Rectifier {
    fn class_name(&self) -> &'static str {
        "math.rectifier"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::Audio)],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = Libm::<f64>::fabs(inputs[0][k]);
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Snaps the input to the nearest multiple of `1/steps` (integer staircase,
/// e.g. for scale quantization when `steps` is set to a V/Oct semitone
/// count). Added because the spec enumerates `Quantizer` with no 1:1
/// original unit.
#[derive(Clone, Default)]
pub struct Quantizer;

impl UnitImpl for Quantizer {
    fn class_name(&self) -> &'static str {
        "math.quantizer"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::VoltPerOctave)],
            vec![PortDef::new(10, "out", SignalKind::VoltPerOctave)],
        )
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "steps", 1.0, 48.0, 12.0)]
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let steps = params.first().map(|p| p.value()).unwrap_or(12.0).max(1.0);
        for k in 0..ctx.buffer_size {
            outputs[0][k] = Libm::<f64>::round(inputs[0][k] * steps) / steps;
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Equal-power-ish stereo panner. Grounded on `PanningUnit`.
#[derive(Clone, Default)]
pub struct Pan;

impl UnitImpl for Pan {
    fn class_name(&self) -> &'static str {
        "math.pan"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "in", SignalKind::Audio),
                PortDef::new(1, "pan", SignalKind::CvBipolar).with_default(0.0),
            ],
            vec![
                PortDef::new(10, "left", SignalKind::Audio),
                PortDef::new(11, "right", SignalKind::Audio),
            ],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            let pan = inputs[1][k].clamp(-1.0, 1.0);
            let theta = (pan + 1.0) * 0.25 * core::f64::consts::PI;
            outputs[0][k] = inputs[0][k] * Libm::<f64>::cos(theta);
            outputs[1][k] = inputs[0][k] * Libm::<f64>::sin(theta);
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Binary crossfade-free switch: outputs `a` when `select < 2.5`V, else `b`.
#[derive(Clone, Default)]
pub struct Switch;

impl UnitImpl for Switch {
    fn class_name(&self) -> &'static str {
        "math.switch"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "a", SignalKind::Audio),
                PortDef::new(1, "b", SignalKind::Audio),
                PortDef::new(2, "select", SignalKind::Gate),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = if inputs[2][k] > 2.5 { inputs[1][k] } else { inputs[0][k] };
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Emits a fixed value, modulatable like any other parameter. Grounded on
/// `ConstantUnit`.
#[derive(Clone, Default)]
pub struct Constant;

impl UnitImpl for Constant {
    fn class_name(&self) -> &'static str {
        "math.constant"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "out", SignalKind::CvBipolar)])
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "value", -10.0, 10.0, 0.0)]
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let value = params.first().map(|p| p.value()).unwrap_or(0.0);
        for k in 0..ctx.buffer_size {
            outputs[0][k] = value;
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
    fn constant_emits_parameter_value() {
        let mut c = Constant;
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 4 };
        let mut out = [0.0; 4];
        let mut outputs: [&mut [f64]; 1] = [&mut out];
        let p = Parameter::new(ParamDef::numeric(0, "value", -10.0, 10.0, 2.5));
        c.process(&ctx, &[], &mut outputs, core::slice::from_ref(&p));
        assert_eq!(out, [2.5; 4]);
    }

    #[test]
    fn summer_adds_all_four_inputs() {
        let mut s = Summer;
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 1 };
        let a = [1.0];
        let b = [2.0];
        let c = [3.0];
        let d = [4.0];
        let mut out = [0.0];
        let inputs: [&[f64]; 4] = [&a, &b, &c, &d];
        let mut outputs: [&mut [f64]; 1] = [&mut out];
        s.process(&ctx, &inputs, &mut outputs, &[]);
        assert_eq!(out[0], 10.0);
    }
}
