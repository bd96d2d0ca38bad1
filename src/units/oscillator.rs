//! `Oscillator{basic|vosim|formant|noise}` (§4.A, §4.A.1).

use crate::param::{ParamDef, ParamHint, Parameter};
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use libm::Libm;

const C4_HZ: f64 = 261.63;

fn voct_to_freq(voct: f64) -> f64 {
    C4_HZ * Libm::<f64>::pow(2.0, voct)
}

/// Multi-waveform core: one phase accumulator driving simultaneous
/// sine/triangle/saw/square outputs, with FM and hard sync inputs.
/// Grounded on the teacher crate's `Vco`.
#[derive(Clone)]
pub struct BasicOscillator {
    phase: f64,
    sample_rate: f64,
    last_sync: f64,
}

impl BasicOscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
            last_sync: 0.0,
        }
    }
}

impl Default for BasicOscillator {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for BasicOscillator {
    fn class_name(&self) -> &'static str {
        "oscillator.basic"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "voct", SignalKind::VoltPerOctave),
                PortDef::new(1, "fm", SignalKind::CvBipolar),
                PortDef::new(2, "pw", SignalKind::CvUnipolar).with_default(0.5),
                PortDef::new(3, "sync", SignalKind::Trigger),
            ],
            vec![
                PortDef::new(10, "sin", SignalKind::Audio),
                PortDef::new(11, "tri", SignalKind::Audio),
                PortDef::new(12, "saw", SignalKind::Audio),
                PortDef::new(13, "sqr", SignalKind::Audio),
            ],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let voct = inputs[0][k];
            let fm = inputs[1][k];
            let pw = inputs[2][k].clamp(0.01, 0.99);
            let sync = inputs[3][k];

            if sync > 2.5 && self.last_sync <= 2.5 {
                self.phase = 0.0;
            }
            self.last_sync = sync;

            let freq = voct_to_freq(voct + fm);
            let inc = freq / self.sample_rate;

            let p = self.phase;
            outputs[0][k] = Libm::<f64>::sin(2.0 * core::f64::consts::PI * p);
            outputs[1][k] = if p < 0.5 { 4.0 * p - 1.0 } else { 3.0 - 4.0 * p };
            outputs[2][k] = 2.0 * p - 1.0;
            outputs[3][k] = if p < pw { 1.0 } else { -1.0 };

            self.phase += inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.last_sync = 0.0;
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

/// A single glottal-pulse VOSIM oscillator: a formant sinusoid shaped by a
/// decaying envelope, re-triggered each pitch period. The namesake oscillator
/// of VOSIMSynth (restored from `original_source/`; has no counterpart in the
/// teacher crate).
#[derive(Clone)]
pub struct VosimOscillator {
    phase: f64,
    pulse_phase: f64,
    sample_rate: f64,
}

impl VosimOscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            pulse_phase: 0.0,
            sample_rate,
        }
    }
}

impl Default for VosimOscillator {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for VosimOscillator {
    fn class_name(&self) -> &'static str {
        "oscillator.vosim"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "voct", SignalKind::VoltPerOctave),
                PortDef::new(1, "formant_voct", SignalKind::VoltPerOctave).with_default(2.0),
                PortDef::new(2, "decay", SignalKind::CvUnipolar).with_default(0.5),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            let pitch_freq = voct_to_freq(inputs[0][k]).max(1.0);
            let formant_freq = voct_to_freq(inputs[1][k]).max(pitch_freq);
            let decay = inputs[2][k].clamp(0.0, 1.0);

            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.pulse_phase = 0.0;
            }

            let envelope = Libm::<f64>::exp(-decay * 8.0 * self.pulse_phase);
            let carrier = Libm::<f64>::sin(2.0 * core::f64::consts::PI * formant_freq * self.pulse_phase / self.sample_rate);
            outputs[0][k] = carrier * envelope;

            self.pulse_phase += 1.0 / self.sample_rate;
            self.phase += pitch_freq / self.sample_rate;
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.pulse_phase = 0.0;
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

/// Two independently tuned [`VosimOscillator`]-style formants summed
/// together, matching VOSIMSynth's `FormantOscillator` decomposition.
#[derive(Clone)]
pub struct FormantOscillator {
    formant1: VosimOscillator,
    formant2: VosimOscillator,
}

impl FormantOscillator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            formant1: VosimOscillator::new(sample_rate),
            formant2: VosimOscillator::new(sample_rate),
        }
    }
}

impl Default for FormantOscillator {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl UnitImpl for FormantOscillator {
    fn class_name(&self) -> &'static str {
        "oscillator.formant"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![
                PortDef::new(0, "voct", SignalKind::VoltPerOctave),
                PortDef::new(1, "formant1_voct", SignalKind::VoltPerOctave).with_default(2.0),
                PortDef::new(2, "formant2_voct", SignalKind::VoltPerOctave).with_default(3.5),
                PortDef::new(3, "decay", SignalKind::CvUnipolar).with_default(0.5),
            ],
            vec![PortDef::new(10, "out", SignalKind::Audio)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        let mut buf1 = vec![0.0f64; n];
        let mut buf2 = vec![0.0f64; n];
        let voct: &[f64] = inputs[0];
        let decay: &[f64] = inputs[3];
        {
            let f1_inputs: [&[f64]; 3] = [voct, inputs[1], decay];
            let mut f1_outputs: [&mut [f64]; 1] = [&mut buf1];
            self.formant1.process(ctx, &f1_inputs, &mut f1_outputs, params);
        }
        {
            let f2_inputs: [&[f64]; 3] = [voct, inputs[2], decay];
            let mut f2_outputs: [&mut [f64]; 1] = [&mut buf2];
            self.formant2.process(ctx, &f2_inputs, &mut f2_outputs, params);
        }
        for k in 0..n {
            outputs[0][k] = 0.5 * (buf1[k] + buf2[k]);
        }
    }

    fn reset(&mut self) {
        self.formant1.reset();
        self.formant2.reset();
    }

    fn on_fs_change(&mut self, fs: f64) {
        self.formant1.on_fs_change(fs);
        self.formant2.on_fs_change(fs);
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// White-noise source; no voct input (§4.A.1).
#[derive(Clone)]
pub struct NoiseOscillator {
    rng: crate::rng::Rng,
}

impl NoiseOscillator {
    pub fn new() -> Self {
        Self {
            rng: crate::rng::Rng::from_seed(0x5eed),
        }
    }

    fn next_sample(&mut self) -> f64 {
        self.rng.next_f64_bipolar()
    }
}

impl Default for NoiseOscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitImpl for NoiseOscillator {
    fn class_name(&self) -> &'static str {
        "oscillator.noise"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "out", SignalKind::Audio)])
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "level", 0.0, 1.0, 1.0).with_hint(ParamHint::Bounded)]
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]) {
        let level = params.first().map(|p| p.value()).unwrap_or(1.0);
        for k in 0..ctx.buffer_size {
            outputs[0][k] = self.next_sample() * level;
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}
