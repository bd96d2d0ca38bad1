//! `Filter{SVF|TrapSVF|LadderA|LadderB|OnePoleLP|DCRemover|Follower}` (§4.A).
//!
//! `Svf` and `LadderA` are grounded on the teacher crate's `Svf` and
//! `DiodeLadderFilter`; `TrapSvf`, `LadderB`, `OnePoleLp`, `DcRemover` and
//! `Follower` are grounded on `original_source/VOSIMLib/units/include/{Follower.h,MathUnits.h}`.

use crate::param::Parameter;
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use core::f64::consts::PI;
use libm::Libm;

fn cutoff_hz(cutoff_cv: f64, keytrack_voct: f64, keytrack_amt: f64) -> f64 {
    let base = 20.0 * Libm::<f64>::pow(1000.0, cutoff_cv.clamp(0.0, 1.0));
    let keytrack_mult = Libm::<f64>::pow(2.0, keytrack_voct * keytrack_amt);
    (base * keytrack_mult).clamp(20.0, 20000.0)
}

fn svf_ports() -> PortSpec {
    PortSpec::new(
        vec![
            PortDef::new(0, "in", SignalKind::Audio),
            PortDef::new(1, "cutoff", SignalKind::CvUnipolar).with_default(0.5),
            PortDef::new(2, "res", SignalKind::CvUnipolar).with_default(0.0),
            PortDef::new(3, "fm", SignalKind::CvBipolar),
            PortDef::new(4, "keytrack", SignalKind::VoltPerOctave),
            PortDef::new(5, "keytrack_amt", SignalKind::CvUnipolar).with_default(0.0),
        ],
        vec![
            PortDef::new(10, "lp", SignalKind::Audio),
            PortDef::new(11, "bp", SignalKind::Audio),
            PortDef::new(12, "hp", SignalKind::Audio),
            PortDef::new(13, "notch", SignalKind::Audio),
        ],
    )
}

/// State-variable filter with self-oscillation above `res = 0.95` and
/// soft-clipped band output. Grounded on the teacher crate's `Svf`.
#[derive(Clone)]
pub struct Svf {
    low: f64,
    band: f64,
    sample_rate: f64,
}

impl Svf {
    pub fn new(sample_rate: f64) -> Self {
        Self { low: 0.0, band: 0.0, sample_rate }
    }
}

impl Default for Svf {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for Svf {
    fn class_name(&self) -> &'static str {
        "filter.svf"
    }

    fn port_spec(&self) -> PortSpec {
        svf_ports()
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let input = inputs[0][k];
            let cutoff_cv = inputs[1][k] + inputs[3][k];
            let res = inputs[2][k].clamp(0.0, 1.0);
            let keytrack_voct = inputs[4][k];
            let keytrack_amt = inputs[5][k].clamp(0.0, 1.0);

            let hz = cutoff_hz(cutoff_cv, keytrack_voct, keytrack_amt);
            let f = Libm::<f64>::fmin(2.0 * Libm::<f64>::sin(PI * hz / self.sample_rate), 0.99);

            let q = if res > 0.95 {
                let osc_amount = (res - 0.95) / 0.05;
                0.1 - osc_amount * 0.15
            } else {
                1.0 - res * 0.9
            };

            let high = input - self.low - q * self.band;
            self.band += f * high;
            self.low += f * self.band;
            let notch = high + self.low;

            let band_out = if res > 0.95 {
                Libm::<f64>::tanh(self.band * 0.5) * 2.0
            } else {
                self.band
            };

            outputs[0][k] = self.low;
            outputs[1][k] = band_out;
            outputs[2][k] = high;
            outputs[3][k] = notch;
        }
    }

    fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
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

/// Zero-delay-feedback (trapezoidal integrator) state-variable filter:
/// the same topology as [`Svf`] but with the one-sample integrator delay
/// removed via an implicit-solve per Vadim Zavalishin's "The Art of VA
/// Filter Design", avoiding the cutoff-dependent phase error of the naive
/// topology at high cutoff settings.
#[derive(Clone)]
pub struct TrapSvf {
    low: f64,
    band: f64,
    sample_rate: f64,
}

impl TrapSvf {
    pub fn new(sample_rate: f64) -> Self {
        Self { low: 0.0, band: 0.0, sample_rate }
    }
}

impl Default for TrapSvf {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for TrapSvf {
    fn class_name(&self) -> &'static str {
        "filter.trap_svf"
    }

    fn port_spec(&self) -> PortSpec {
        svf_ports()
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let input = inputs[0][k];
            let cutoff_cv = inputs[1][k] + inputs[3][k];
            let res = inputs[2][k].clamp(0.0, 1.0);
            let keytrack_voct = inputs[4][k];
            let keytrack_amt = inputs[5][k].clamp(0.0, 1.0);

            let hz = cutoff_hz(cutoff_cv, keytrack_voct, keytrack_amt);
            let g = Libm::<f64>::tan(PI * hz / self.sample_rate);
            let k_damp = 2.0 - 1.8 * res.min(0.99);
            let denom = 1.0 + g * (g + k_damp);

            let high = (input - (k_damp + g) * self.band - self.low) / denom;
            let band = g * high + self.band;
            let low = g * band + self.low;
            self.band = band + g * high;
            self.low = low + g * band;
            let notch = high + low;

            outputs[0][k] = low;
            outputs[1][k] = band;
            outputs[2][k] = high;
            outputs[3][k] = notch;
        }
    }

    fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
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

fn ladder_ports() -> PortSpec {
    PortSpec::new(
        vec![
            PortDef::new(0, "in", SignalKind::Audio),
            PortDef::new(1, "cutoff", SignalKind::CvUnipolar).with_default(0.5),
            PortDef::new(2, "res", SignalKind::CvUnipolar).with_default(0.0),
            PortDef::new(3, "fm", SignalKind::CvBipolar),
            PortDef::new(4, "keytrack", SignalKind::VoltPerOctave),
            PortDef::new(5, "keytrack_amt", SignalKind::CvUnipolar).with_default(0.0),
            PortDef::new(6, "drive", SignalKind::CvUnipolar).with_default(0.0),
        ],
        vec![
            PortDef::new(10, "out", SignalKind::Audio),
            PortDef::new(11, "pole1", SignalKind::Audio),
            PortDef::new(12, "pole2", SignalKind::Audio),
            PortDef::new(13, "pole3", SignalKind::Audio),
        ],
    )
}

/// 24dB/oct diode-ladder lowpass (TB-303 / Moog-style). Grounded on the
/// teacher crate's `DiodeLadderFilter`.
#[derive(Clone)]
pub struct LadderA {
    stages: [f64; 4],
    feedback: f64,
    sample_rate: f64,
}

impl LadderA {
    pub fn new(sample_rate: f64) -> Self {
        Self { stages: [0.0; 4], feedback: 0.0, sample_rate }
    }

    #[inline]
    fn diode_sat(x: f64) -> f64 {
        if x >= 0.0 {
            Libm::<f64>::tanh(x * 1.2)
        } else {
            Libm::<f64>::tanh(x * 0.8)
        }
    }
}

impl Default for LadderA {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for LadderA {
    fn class_name(&self) -> &'static str {
        "filter.ladder_a"
    }

    fn port_spec(&self) -> PortSpec {
        ladder_ports()
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let input = inputs[0][k];
            let cutoff_cv = inputs[1][k] + inputs[3][k];
            let res = inputs[2][k].clamp(0.0, 1.0);
            let keytrack_voct = inputs[4][k];
            let keytrack_amt = inputs[5][k].clamp(0.0, 1.0);
            let drive = inputs[6][k].clamp(0.0, 1.0);

            let hz = cutoff_hz(cutoff_cv, keytrack_voct, keytrack_amt);
            let g = Libm::<f64>::tan(PI * hz / self.sample_rate);
            let g1 = g / (1.0 + g);

            let kq = res * 4.0;
            let drive_gain = 1.0 + drive * 3.0;
            let input_driven = Self::diode_sat(input / 5.0 * drive_gain) * 5.0;
            let fb = Self::diode_sat(self.feedback * kq);
            let u = input_driven - fb * 5.0;

            let s1 = self.stages[0] + g1 * (Self::diode_sat(u / 5.0) * 5.0 - self.stages[0]);
            let s2 = self.stages[1] + g1 * (Self::diode_sat(s1 / 5.0) * 5.0 - self.stages[1]);
            let s3 = self.stages[2] + g1 * (Self::diode_sat(s2 / 5.0) * 5.0 - self.stages[2]);
            let s4 = self.stages[3] + g1 * (Self::diode_sat(s3 / 5.0) * 5.0 - self.stages[3]);

            self.stages = [s1, s2, s3, s4];
            self.feedback = s4 / 5.0;

            outputs[0][k] = s4;
            outputs[1][k] = s1;
            outputs[2][k] = s2;
            outputs[3][k] = s3;
        }
    }

    fn reset(&mut self) {
        self.stages = [0.0; 4];
        self.feedback = 0.0;
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

/// 24dB/oct transistor-ladder lowpass: the same cascaded-one-pole topology
/// as [`LadderA`] but with symmetric `tanh` saturation per stage (no diode
/// asymmetry), matching VOSIMLib's second ladder variant.
#[derive(Clone)]
pub struct LadderB {
    stages: [f64; 4],
    feedback: f64,
    sample_rate: f64,
}

impl LadderB {
    pub fn new(sample_rate: f64) -> Self {
        Self { stages: [0.0; 4], feedback: 0.0, sample_rate }
    }
}

impl Default for LadderB {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for LadderB {
    fn class_name(&self) -> &'static str {
        "filter.ladder_b"
    }

    fn port_spec(&self) -> PortSpec {
        ladder_ports()
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let input = inputs[0][k];
            let cutoff_cv = inputs[1][k] + inputs[3][k];
            let res = inputs[2][k].clamp(0.0, 1.0);
            let keytrack_voct = inputs[4][k];
            let keytrack_amt = inputs[5][k].clamp(0.0, 1.0);
            let drive = inputs[6][k].clamp(0.0, 1.0);

            let hz = cutoff_hz(cutoff_cv, keytrack_voct, keytrack_amt);
            let g = Libm::<f64>::tan(PI * hz / self.sample_rate);
            let g1 = g / (1.0 + g);

            let kq = res * 4.0;
            let drive_gain = 1.0 + drive * 3.0;
            let input_driven = Libm::<f64>::tanh(input / 5.0 * drive_gain) * 5.0;
            let fb = Libm::<f64>::tanh(self.feedback * kq);
            let u = input_driven - fb * 5.0;

            let s1 = self.stages[0] + g1 * (Libm::<f64>::tanh(u / 5.0) * 5.0 - self.stages[0]);
            let s2 = self.stages[1] + g1 * (Libm::<f64>::tanh(s1 / 5.0) * 5.0 - self.stages[1]);
            let s3 = self.stages[2] + g1 * (Libm::<f64>::tanh(s2 / 5.0) * 5.0 - self.stages[2]);
            let s4 = self.stages[3] + g1 * (Libm::<f64>::tanh(s3 / 5.0) * 5.0 - self.stages[3]);

            self.stages = [s1, s2, s3, s4];
            self.feedback = s4 / 5.0;

            outputs[0][k] = s4;
            outputs[1][k] = s1;
            outputs[2][k] = s2;
            outputs[3][k] = s3;
        }
    }

    fn reset(&mut self) {
        self.stages = [0.0; 4];
        self.feedback = 0.0;
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

/// Single-pole lowpass. Grounded on `VOSIMLib/units/include/MathUnits.h`'s
/// utility filter blocks.
#[derive(Clone)]
pub struct OnePoleLp {
    state: f64,
    sample_rate: f64,
}

impl OnePoleLp {
    pub fn new(sample_rate: f64) -> Self {
        Self { state: 0.0, sample_rate }
    }
}

impl Default for OnePoleLp {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for OnePoleLp {
    fn class_name(&self) -> &'static str {
        "filter.one_pole_lp"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "in", SignalKind::Audio),
                PortDef::new(1, "cutoff", SignalKind::CvUnipolar).with_default(0.5),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let hz = cutoff_hz(inputs[1][k], 0.0, 0.0);
            let a = Libm::<f64>::exp(-2.0 * PI * hz / self.sample_rate);
            self.state = (1.0 - a) * inputs[0][k] + a * self.state;
            outputs[0][k] = self.state;
        }
    }

    fn reset(&mut self) {
        self.state = 0.0;
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

/// DC-blocking one-pole highpass (`y[n] = x[n] - x[n-1] + R*y[n-1]`).
/// Grounded on `original_source/VOSIMLib/units/include/MathUnits.h`'s
/// `DCRemoverUnit`.
#[derive(Clone)]
pub struct DcRemover {
    last_in: f64,
    last_out: f64,
}

impl DcRemover {
    const R: f64 = 0.995;

    pub fn new() -> Self {
        Self { last_in: 0.0, last_out: 0.0 }
    }
}

impl Default for DcRemover {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitImpl for DcRemover {
    fn class_name(&self) -> &'static str {
        "filter.dc_remover"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "in", SignalKind::Audio)],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let x = inputs[0][k];
            let y = x - self.last_in + Self::R * self.last_out;
            self.last_in = x;
            self.last_out = y;
            outputs[0][k] = y;
        }
    }

    fn reset(&mut self) {
        self.last_in = 0.0;
        self.last_out = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Envelope follower: a one-pole smoother with independent attack/release
/// time constants, tracking the rectified input's amplitude. Grounded on
/// `original_source/VOSIMLib/units/include/Follower.h`.
#[derive(Clone)]
pub struct Follower {
    level: f64,
    sample_rate: f64,
}

impl Follower {
    pub fn new(sample_rate: f64) -> Self {
        Self { level: 0.0, sample_rate }
    }
}

impl Default for Follower {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for Follower {
    fn class_name(&self) -> &'static str {
        "filter.follower"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "in", SignalKind::Audio),
                PortDef::new(1, "attack", SignalKind::CvUnipolar).with_default(0.01),
                PortDef::new(2, "release", SignalKind::CvUnipolar).with_default(0.2),
            ],
            vec![PortDef::new(10, "out", SignalKind::CvUnipolar)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let rectified = Libm::<f64>::fabs(inputs[0][k]);
            let attack_time = inputs[1][k].max(0.0001);
            let release_time = inputs[2][k].max(0.0001);
            let coeff_time = if rectified > self.level { attack_time } else { release_time };
            let a = Libm::<f64>::exp(-1.0 / (coeff_time * self.sample_rate));
            self.level = rectified + a * (self.level - rectified);
            outputs[0][k] = self.level;
        }
    }

    fn reset(&mut self) {
        self.level = 0.0;
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
    fn svf_lowpass_attenuates_high_frequency_impulse() {
        let mut svf = Svf::new(44100.0);
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 1 };
        let input = [1.0];
        let cutoff = [0.1];
        let res = [0.0];
        let fm = [0.0];
        let keytrack = [0.0];
        let keytrack_amt = [0.0];
        let mut lp = [0.0];
        let mut bp = [0.0];
        let mut hp = [0.0];
        let mut notch = [0.0];
        let inputs: [&[f64]; 6] = [&input, &cutoff, &res, &fm, &keytrack, &keytrack_amt];
        let mut outputs: [&mut [f64]; 4] = [&mut lp, &mut bp, &mut hp, &mut notch];
        svf.process(&ctx, &inputs, &mut outputs, &[]);
        assert!(lp[0].abs() < 1.0);
    }

    #[test]
    fn dc_remover_blocks_constant_offset() {
        let mut dc = DcRemover::new();
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 256 };
        let input = [1.0; 256];
        let mut out = [0.0; 256];
        let inputs: [&[f64]; 1] = [&input];
        let mut outputs: [&mut [f64]; 1] = [&mut out];
        dc.process(&ctx, &inputs, &mut outputs, &[]);
        assert!(out[255].abs() < 0.1);
    }
}
