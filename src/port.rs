//! Signal conventions and buffer-based ports.
//!
//! A [`Circuit`](crate::circuit::Circuit) drives its child units one buffer at a
//! time; ports therefore own (or reference) a full buffer rather than a single
//! sample, matching the audio-callback contract of §6.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Unique identifier for a port within a unit.
pub type PortId = u32;

/// Unique identifier for a parameter within a unit.
pub type ParamId = u32;

/// Semantic signal classification following hardware modular conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Audio signal, AC-coupled, typically ±5V peak.
    Audio,
    /// Bipolar control voltage, ±5V (LFO, pitch bend, modulation).
    CvBipolar,
    /// Unipolar control voltage, 0–10V (envelope, velocity, expression).
    CvUnipolar,
    /// Pitch CV following 1V/octave standard. 0V = C4 (261.63 Hz).
    VoltPerOctave,
    /// Gate signal, binary state: 0V (low) or +5V (high).
    Gate,
    /// Trigger signal, short pulse (~1-10ms) at +5V.
    Trigger,
    /// Clock signal, regular trigger pulses at tempo.
    Clock,
}

impl SignalKind {
    /// Threshold voltage for high/low detection.
    pub fn gate_threshold(&self) -> Option<f64> {
        match self {
            SignalKind::Gate | SignalKind::Trigger | SignalKind::Clock => Some(2.5),
            _ => None,
        }
    }
}

/// Definition of a single port (input or output), assigned a dense id at
/// construction time (§3 invariant: ids are dense from 0, insertion order
/// preserved).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    pub id: PortId,
    pub name: String,
    pub kind: SignalKind,
    /// Scalar value read when an input has no connected source.
    pub default: f64,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            default: 0.0,
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }
}

/// Specification of all ports for a unit kind. By-id and by-name lookups are
/// indexed once at construction (§3 invariant: both are O(1)), since port ids
/// are not guaranteed to equal their position in `inputs`/`outputs` (outputs
/// conventionally start at id 10 to keep them visually distinct from inputs).
#[derive(Debug, Clone, Default)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    input_id_index: BTreeMap<PortId, usize>,
    output_id_index: BTreeMap<PortId, usize>,
    input_name_index: BTreeMap<String, usize>,
    output_name_index: BTreeMap<String, usize>,
}

impl PortSpec {
    pub fn new(inputs: Vec<PortDef>, outputs: Vec<PortDef>) -> Self {
        let input_id_index = inputs.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let output_id_index = outputs.iter().enumerate().map(|(i, p)| (p.id, i)).collect();
        let input_name_index = inputs.iter().enumerate().map(|(i, p)| (p.name.clone(), i)).collect();
        let output_name_index = outputs.iter().enumerate().map(|(i, p)| (p.name.clone(), i)).collect();
        Self {
            inputs,
            outputs,
            input_id_index,
            output_id_index,
            input_name_index,
            output_name_index,
        }
    }

    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.input_name_index.get(name).map(|&i| &self.inputs[i])
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.output_name_index.get(name).map(|&i| &self.outputs[i])
    }

    pub fn input_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.input_id_index.get(&id).map(|&i| &self.inputs[i])
    }

    pub fn output_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.output_id_index.get(&id).map(|&i| &self.outputs[i])
    }
}

/// A single input port's runtime state: a default scalar plus a preallocated
/// scratch buffer the owning [`Circuit`](crate::circuit::Circuit) fills from
/// the connected source (or from `default` when unconnected) each tick.
///
/// "Connected" tracks whether a source is wired; `scratch` always holds
/// buffer-sized data so reads never branch on connection state mid-tick.
#[derive(Debug, Clone)]
pub struct InputPort {
    pub def: PortDef,
    connected: bool,
    scratch: Vec<f64>,
}

impl InputPort {
    pub fn new(def: PortDef) -> Self {
        Self {
            def,
            connected: false,
            scratch: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Resize the scratch buffer for a new block size, filling with the
    /// default value. Only called between buffers (see §5 allocation
    /// discipline), never mid-tick.
    pub fn resize(&mut self, n: usize) {
        self.scratch.resize(n, self.def.default);
    }

    /// Mutable access to the scratch buffer so the owning circuit can copy
    /// source data (or the default) into it before `process` runs.
    pub fn scratch_mut(&mut self) -> &mut [f64] {
        &mut self.scratch
    }

    pub fn fill_default(&mut self) {
        self.scratch.fill(self.def.default);
    }

    #[inline]
    pub fn read(&self, offset: usize) -> f64 {
        if self.connected {
            self.scratch[offset]
        } else {
            self.def.default
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.scratch
    }
}

/// A single output port's runtime state: a contiguous buffer reallocated
/// only on buffer-size change (§3).
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub def: PortDef,
    buffer: Vec<f64>,
}

impl OutputPort {
    pub fn new(def: PortDef) -> Self {
        Self {
            def,
            buffer: Vec::new(),
        }
    }

    pub fn resize(&mut self, n: usize) {
        self.buffer.resize(n, 0.0);
    }

    #[inline]
    pub fn write(&mut self, offset: usize, value: f64) {
        self.buffer[offset] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.buffer
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_threshold_only_on_pulse_kinds() {
        assert_eq!(SignalKind::Gate.gate_threshold(), Some(2.5));
        assert_eq!(SignalKind::Trigger.gate_threshold(), Some(2.5));
        assert_eq!(SignalKind::Clock.gate_threshold(), Some(2.5));
        assert_eq!(SignalKind::Audio.gate_threshold(), None);
    }

    #[test]
    fn port_spec_lookup() {
        let spec = PortSpec::new(
            alloc::vec![PortDef::new(0, "in", SignalKind::Audio)],
            alloc::vec![PortDef::new(10, "out", SignalKind::Audio)],
        );
        assert!(spec.input_by_name("in").is_some());
        assert!(spec.input_by_id(0).is_some());
        assert!(spec.output_by_name("out").is_some());
        assert!(spec.output_by_id(10).is_some());
        assert!(spec.input_by_name("nope").is_none());
    }

    #[test]
    fn input_port_reads_default_when_unconnected() {
        let def = PortDef::new(0, "in", SignalKind::CvUnipolar).with_default(3.0);
        let mut port = InputPort::new(def);
        port.resize(4);
        assert_eq!(port.read(0), 3.0);

        port.set_connected(true);
        port.scratch_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(port.read(1), 2.0);
    }

    #[test]
    fn output_port_resize_preserves_write_semantics() {
        let def = PortDef::new(0, "out", SignalKind::Audio);
        let mut port = OutputPort::new(def);
        port.resize(3);
        port.write(1, 5.0);
        assert_eq!(port.as_slice(), &[0.0, 5.0, 0.0]);
    }
}
