//! `Meta{Input|Output}` (§3): externally-visible pseudo-units marking a
//! [`crate::circuit::Circuit`]'s boundary, so a circuit can itself be
//! addressed as a unit (composability, §3's "Circuit" entry).

use crate::param::Parameter;
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// A circuit's externally-visible input: the circuit owner copies
/// caller-supplied buffers into this unit's output ports, which downstream
/// connections read from like any other unit's output.
#[derive(Clone)]
pub struct InputUnit {
    channels: usize,
}

impl InputUnit {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl Default for InputUnit {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UnitImpl for InputUnit {
    fn class_name(&self) -> &'static str {
        "meta.input"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            vec![],
            (0..self.channels)
                .map(|i| PortDef::new(10 + i as u32, "out", SignalKind::Audio))
                .collect::<Vec<_>>(),
        )
    }

    fn process(&mut self, _ctx: &UnitContext, _inputs: &[&[f64]], _outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        // The circuit owner writes directly into this unit's output buffers
        // before the scheduled tick runs; there is nothing to compute here.
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// A circuit's externally-visible output: its input ports are read by the
/// circuit owner after the scheduled tick runs to produce the circuit's
/// final output buffers.
#[derive(Clone)]
pub struct OutputUnit {
    channels: usize,
}

impl OutputUnit {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl Default for OutputUnit {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UnitImpl for OutputUnit {
    fn class_name(&self) -> &'static str {
        "meta.output"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(
            (0..self.channels)
                .map(|i| PortDef::new(i as u32, "in", SignalKind::Audio))
                .collect::<Vec<_>>(),
            vec![],
        )
    }

    fn process(&mut self, _ctx: &UnitContext, _inputs: &[&[f64]], _outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        // The circuit owner reads this unit's input scratch buffers directly
        // after the tick completes; there is nothing to compute here.
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

    #[test]
    fn input_unit_exposes_one_output_per_channel() {
        let u = InputUnit::new(2);
        assert_eq!(u.port_spec().outputs.len(), 2);
        assert!(u.port_spec().inputs.is_empty());
    }

    #[test]
    fn output_unit_exposes_one_input_per_channel() {
        let u = OutputUnit::new(2);
        assert_eq!(u.port_spec().inputs.len(), 2);
        assert!(u.port_spec().outputs.is_empty());
    }
}
