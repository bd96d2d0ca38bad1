//! `Converter{PitchToFreq|FreqToPitch}` (§4.A.1).
//!
//! Factored out of the oscillators' inline V/Oct math so patches can route
//! pitch CV through other units (e.g. quantizers, math units) before it
//! reaches an oscillator, or can derive a V/Oct CV back from a frequency
//! CV (e.g. for display or further CV math).

use crate::param::Parameter;
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use libm::Libm;

const C4_HZ: f64 = 261.63;

fn voct_to_freq(voct: f64) -> f64 {
    C4_HZ * Libm::<f64>::pow(2.0, voct)
}

fn freq_to_voct(freq: f64) -> f64 {
    Libm::<f64>::log2((freq / C4_HZ).max(1e-9))
}

/// V/Oct pitch CV to linear frequency (Hz), exponential 1V/octave.
#[derive(Clone, Default)]
pub struct PitchToFreq;

impl UnitImpl for PitchToFreq {
    fn class_name(&self) -> &'static str {
        "converter.pitch_to_freq"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "voct", SignalKind::VoltPerOctave)],
            vec![PortDef::new(10, "freq", SignalKind::CvUnipolar)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            outputs[0][k] = voct_to_freq(inputs[0][k]);
        }
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Linear frequency (Hz) to V/Oct pitch CV, the inverse of [`PitchToFreq`].
#[derive(Clone, Default)]
pub struct FreqToPitch;

impl UnitImpl for FreqToPitch {
    fn class_name(&self) -> &'static str {
        "converter.freq_to_pitch"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![PortDef::new(0, "freq", SignalKind::CvUnipolar)],
            vec![PortDef::new(10, "voct", SignalKind::VoltPerOctave)],
        )
    }

    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = ctx.buffer_size.min(inputs[0].len());
        for k in 0..n {
            outputs[0][k] = freq_to_voct(inputs[0][k]);
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
    fn pitch_to_freq_zero_volt_is_c4() {
        let mut u = PitchToFreq;
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 1 };
        let voct = [0.0];
        let mut out = [0.0];
        let inputs: [&[f64]; 1] = [&voct];
        let mut outputs: [&mut [f64]; 1] = [&mut out];
        u.process(&ctx, &inputs, &mut outputs, &[]);
        assert!((out[0] - 261.63).abs() < 1e-6);
    }

    #[test]
    fn round_trip_through_both_converters() {
        let mut p2f = PitchToFreq;
        let mut f2p = FreqToPitch;
        let ctx = UnitContext { sample_rate: 44100.0, tempo: 120.0, buffer_size: 1 };
        let voct_in = [1.0];
        let mut freq = [0.0];
        {
            let inputs: [&[f64]; 1] = [&voct_in];
            let mut outputs: [&mut [f64]; 1] = [&mut freq];
            p2f.process(&ctx, &inputs, &mut outputs, &[]);
        }
        let mut voct_out = [0.0];
        {
            let inputs: [&[f64]; 1] = [&freq];
            let mut outputs: [&mut [f64]; 1] = [&mut voct_out];
            f2p.process(&ctx, &inputs, &mut outputs, &[]);
        }
        assert!((voct_out[0] - 1.0).abs() < 1e-6);
    }
}
