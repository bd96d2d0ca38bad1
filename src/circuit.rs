//! `Circuit` (§3, §4.B, §9): a Unit that contains child Units plus internal
//! wires, topologically orders and drives its children per buffer.
//!
//! Grounded on the teacher crate's `graph.rs` (`Patch`/`Cable`/topological
//! compile step), generalized from per-sample single-output patching to the
//! buffer-based, multi-port, arena-owned Unit model of §3's "Cyclic ownership
//! in graphs" redesign note: the Circuit owns its child Units in a `SlotMap`
//! arena; a Unit's reference to its parent is never stored (callers address
//! children through the Circuit, not the reverse).

use crate::error::{EngineError, Result};
use crate::factory::UnitFactory;
use crate::param::Parameter;
use crate::port::{ParamId, PortDef, PortId, PortSpec, SignalKind};
use crate::unit::{Unit, UnitContext, UnitId, UnitImpl};
use crate::units::meta::{InputUnit, OutputUnit};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use slotmap::SlotMap;

/// Whether a [`Connection`] is scheduled in-order or deliberately excluded
/// from topological ordering and read one buffer stale (§4.B, §9 resolved
/// feedback-edge semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Forward,
    Feedback,
}

/// A single wire: `(source_unit, source_output, target_unit, target_input)`.
/// At most one connection may target a given `(dst, dst_input)` pair;
/// sources may fan out freely (§3).
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    pub src: UnitId,
    pub src_out: PortId,
    pub dst: UnitId,
    pub dst_in: PortId,
    pub kind: EdgeKind,
}

/// A Unit that contains child Units and internal wires (§3 "Circuit"),
/// composable as an ordinary Unit via [`CircuitUnit`].
pub struct Circuit {
    units: SlotMap<UnitId, Unit>,
    connections: Vec<Connection>,
    sink: Option<UnitId>,
    input_unit: UnitId,
    output_unit: UnitId,
    order: Vec<UnitId>,
    dirty: bool,
    buffer_size: usize,
    high_water: usize,
    ctx: UnitContext,
    /// Previous tick's output snapshot per unit, read by feedback-edge
    /// targets instead of the in-progress current-tick buffer (§4.B, §8
    /// scenario "Feedback edge delays by one buffer").
    prev_outputs: alloc::collections::BTreeMap<(UnitId, PortId), Vec<f64>>,
    /// Single reusable scratch buffer for copying a source's output into a
    /// destination's input scratch, sized to `high_water` (§5 "Allocation
    /// discipline", §8 invariant 6). Avoids `Rc<RefCell<_>>`/`Arc<Mutex<_>>`
    /// buffer sharing, which would either break `Send` or add per-tick lock
    /// overhead for what is, in the common case, a single writer and a
    /// single reader.
    copy_scratch: Vec<f64>,
}

impl Circuit {
    pub fn new(sample_rate: f64, tempo: f64, buffer_size: usize) -> Self {
        let mut units = SlotMap::with_key();
        let input_unit = units.insert_with_key(|id| Unit::new(id, "input".into(), 0, Box::new(InputUnit::new(1))));
        let output_unit = units.insert_with_key(|id| Unit::new(id, "output".into(), 0, Box::new(OutputUnit::new(2))));
        let ctx = UnitContext { sample_rate, tempo, buffer_size };
        let mut circuit = Self {
            units,
            connections: Vec::new(),
            sink: Some(output_unit),
            input_unit,
            output_unit,
            order: Vec::new(),
            dirty: true,
            buffer_size,
            high_water: buffer_size,
            prev_outputs: alloc::collections::BTreeMap::new(),
            copy_scratch: vec![0.0; buffer_size],
        };
        circuit.resize_unit_buffers(input_unit);
        circuit.resize_unit_buffers(output_unit);
        circuit
    }

    pub fn input_unit(&self) -> UnitId {
        self.input_unit
    }

    pub fn output_unit(&self) -> UnitId {
        self.output_unit
    }

    pub fn sink(&self) -> Option<UnitId> {
        self.sink
    }

    pub fn set_sink(&mut self, id: UnitId) -> Result<()> {
        if !self.units.contains_key(id) {
            return Err(EngineError::UnknownUnit(id));
        }
        self.sink = Some(id);
        self.dirty = true;
        Ok(())
    }

    pub fn units(&self) -> &SlotMap<UnitId, Unit> {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn resize_unit_buffers(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(id) {
            unit.resize_buffers(self.high_water);
        }
    }

    /// Adds a child unit built from `imp`, growing its buffers to the
    /// circuit's current high-water buffer size.
    pub fn add_unit(&mut self, name: impl Into<alloc::string::String>, class_id: u32, imp: Box<dyn UnitImpl>) -> UnitId {
        let id = self.units.insert_with_key(|id| Unit::new(id, name.into(), class_id, imp));
        self.resize_unit_buffers(id);
        self.dirty = true;
        id
    }

    /// Adds a child unit created through `factory` by class id (§4.C).
    pub fn add_unit_from_factory(&mut self, factory: &UnitFactory, class_id: u32) -> Result<UnitId> {
        let id = factory.create_by_class_id(class_id, &mut self.units)?;
        self.resize_unit_buffers(id);
        self.dirty = true;
        Ok(id)
    }

    pub fn remove_unit(&mut self, id: UnitId) -> Result<()> {
        if !self.units.contains_key(id) {
            return Err(EngineError::UnknownUnit(id));
        }
        self.units.remove(id);
        self.connections.retain(|c| c.src != id && c.dst != id);
        self.prev_outputs.retain(|(u, _), _| *u != id);
        if self.sink == Some(id) {
            self.sink = None;
        }
        self.dirty = true;
        Ok(())
    }

    fn would_form_cycle(&self, src: UnitId, dst: UnitId) -> bool {
        // Forward edges only; a feedback edge is explicitly excluded from
        // the acyclicity check (§4.B: "treated as if the edge did not
        // exist for ordering purposes").
        if src == dst {
            return true;
        }
        let mut stack = vec![src];
        let mut visited = alloc::collections::BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == dst {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            for c in &self.connections {
                if c.kind == EdgeKind::Forward && c.dst == node {
                    stack.push(c.src);
                }
            }
        }
        false
    }

    /// Wires `src.src_out -> dst.dst_in`. §4.B mutation API: fails with
    /// `CycleWouldForm`, `PortTypeMismatch`, or `AlreadyConnected`.
    pub fn connect(&mut self, src: UnitId, src_out: PortId, dst: UnitId, dst_in: PortId, kind: EdgeKind) -> Result<()> {
        let src_unit = self.units.get(src).ok_or(EngineError::UnknownUnit(src))?;
        let src_len = src_unit
            .outputs()
            .iter()
            .find(|p| p.def.id == src_out)
            .ok_or(EngineError::UnknownPort { unit: src, port: src_out })?
            .as_slice()
            .len();
        let dst_unit = self.units.get(dst).ok_or(EngineError::UnknownUnit(dst))?;
        let dst_len = dst_unit
            .inputs()
            .iter()
            .find(|p| p.def.id == dst_in)
            .ok_or(EngineError::UnknownPort { unit: dst, port: dst_in })?
            .as_slice()
            .len();

        if self.connections.iter().any(|c| c.dst == dst && c.dst_in == dst_in) {
            return Err(EngineError::AlreadyConnected { dst, dst_input: dst_in });
        }
        // Both ports should already sit at the circuit's high-water buffer
        // size (units are resized on add); a mismatch means one side was
        // constructed outside this circuit's buffer-size discipline.
        if src_len != dst_len {
            return Err(EngineError::PortTypeMismatch { expected: dst_len, got: src_len });
        }
        if kind == EdgeKind::Forward && self.would_form_cycle(src, dst) {
            return Err(EngineError::CycleWouldForm { dst, dst_input: dst_in });
        }

        self.connections.push(Connection { src, src_out, dst, dst_in, kind });
        if let Some(unit) = self.units.get_mut(dst) {
            unit.mark_input_connected(dst_in, true);
        }
        self.dirty = true;
        Ok(())
    }

    /// Disconnect is a no-op if no such connection exists (§4.B).
    pub fn disconnect(&mut self, dst: UnitId, dst_in: PortId) {
        let before = self.connections.len();
        self.connections.retain(|c| !(c.dst == dst && c.dst_in == dst_in));
        if self.connections.len() != before {
            if let Some(unit) = self.units.get_mut(dst) {
                unit.mark_input_connected(dst_in, false);
            }
            self.dirty = true;
        }
    }

    /// Recomputes the topological processing order via backward DFS from
    /// the sink, excluding feedback edges (§4.B).
    fn recompute_order(&mut self) {
        let Some(sink) = self.sink else {
            self.order.clear();
            self.dirty = false;
            return;
        };
        let mut order = Vec::new();
        let mut visited = alloc::collections::BTreeSet::new();
        self.visit_backward(sink, &mut visited, &mut order);
        self.order = order;
        self.dirty = false;
        log::debug!("circuit recompute: {} units in processing order", self.order.len());
    }

    fn visit_backward(&self, node: UnitId, visited: &mut alloc::collections::BTreeSet<UnitId>, order: &mut Vec<UnitId>) {
        if !visited.insert(node) {
            return;
        }
        for c in &self.connections {
            if c.kind == EdgeKind::Forward && c.dst == node {
                self.visit_backward(c.src, visited, order);
            }
        }
        order.push(node);
    }

    /// Grows every unit's buffers to `n` if `n` exceeds the current
    /// high-water mark. Must be called between ticks, never mid-buffer (§5
    /// "Allocation discipline").
    pub fn ensure_capacity(&mut self, n: usize) {
        if n > self.high_water {
            self.high_water = n;
            self.copy_scratch.resize(n, 0.0);
            let ids: Vec<UnitId> = self.units.keys().collect();
            for id in ids {
                self.resize_unit_buffers(id);
            }
        }
    }

    pub fn on_fs_change(&mut self, fs: f64) {
        self.ctx.sample_rate = fs;
        for (_, unit) in self.units.iter_mut() {
            unit.on_fs_change(fs);
        }
    }

    pub fn on_tempo_change(&mut self, tempo: f64) {
        self.ctx.tempo = tempo;
        for (_, unit) in self.units.iter_mut() {
            unit.on_tempo_change(tempo);
        }
    }

    /// Writes `n` buffered samples into the circuit's `InputUnit` output
    /// ports (the externally-visible input pseudo-unit of §3).
    pub fn write_input(&mut self, channel: usize, samples: &[f64]) {
        if let Some(unit) = self.units.get_mut(self.input_unit) {
            if let Some(out) = unit.outputs_mut().get_mut(channel) {
                let n = samples.len().min(out.as_slice().len());
                out.as_mut_slice()[..n].copy_from_slice(&samples[..n]);
            }
        }
    }

    /// Reads `n` buffered samples out of the circuit's `OutputUnit` input
    /// ports after a tick.
    pub fn read_output(&self, channel: usize) -> &[f64] {
        self.units
            .get(self.output_unit)
            .and_then(|u| u.inputs().get(channel))
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    /// Drives every unit in `n` in topological order, copying source output
    /// buffers into destination input scratch between ticks (§4.B "Tick").
    pub fn tick(&mut self, n: usize) {
        self.ensure_capacity(n);
        if self.dirty {
            self.recompute_order();
        }
        self.buffer_size = n;
        let ctx = UnitContext { sample_rate: self.ctx.sample_rate, tempo: self.ctx.tempo, buffer_size: n };

        for &id in &self.order {
            self.fill_inputs(id, n);
            if let Some(unit) = self.units.get_mut(id) {
                unit.tick(&ctx, n);
            }
            self.snapshot_outputs(id, n);
        }
    }

    fn fill_inputs(&mut self, dst: UnitId, n: usize) {
        let dst_conns: Vec<Connection> = self.connections.iter().copied().filter(|c| c.dst == dst).collect();
        for c in dst_conns {
            let source_slice: Option<&[f64]> = match c.kind {
                EdgeKind::Forward => self
                    .units
                    .get(c.src)
                    .and_then(|u| u.outputs().iter().find(|p| p.def.id == c.src_out))
                    .map(|p| p.as_slice()),
                EdgeKind::Feedback => self.prev_outputs.get(&(c.src, c.src_out)).map(|v| v.as_slice()),
            };
            if let Some(src) = source_slice {
                let len = src.len().min(n).min(self.copy_scratch.len());
                self.copy_scratch[..len].copy_from_slice(&src[..len]);
            }
            let len = n.min(self.copy_scratch.len());
            if let Some(unit) = self.units.get_mut(dst) {
                if let Some(idx) = unit.input_index_by_id(c.dst_in) {
                    unit.inputs_mut()[idx].scratch_mut()[..len].copy_from_slice(&self.copy_scratch[..len]);
                }
            }
        }
    }

    fn snapshot_outputs(&mut self, id: UnitId, n: usize) {
        if let Some(unit) = self.units.get(id) {
            for out in unit.outputs() {
                let entry = self.prev_outputs.entry((id, out.def.id)).or_insert_with(|| vec![0.0; n]);
                entry.resize(n, 0.0);
                let len = n.min(out.as_slice().len());
                entry[..len].copy_from_slice(&out.as_slice()[..len]);
            }
        }
    }

    pub fn reset(&mut self) {
        for (_, unit) in self.units.iter_mut() {
            unit.reset();
        }
        self.prev_outputs.clear();
    }

    pub fn note_on(&mut self, note: u8, vel: u8) {
        for (_, unit) in self.units.iter_mut() {
            unit.note_on(note, vel);
        }
    }

    pub fn note_off(&mut self, note: u8, vel: u8) {
        for (_, unit) in self.units.iter_mut() {
            unit.note_off(note, vel);
        }
    }
}

impl Clone for Circuit {
    fn clone(&self) -> Self {
        Self {
            units: self.units.clone(),
            connections: self.connections.clone(),
            sink: self.sink,
            input_unit: self.input_unit,
            output_unit: self.output_unit,
            order: self.order.clone(),
            dirty: self.dirty,
            buffer_size: self.buffer_size,
            high_water: self.high_water,
            prev_outputs: self.prev_outputs.clone(),
            copy_scratch: self.copy_scratch.clone(),
        }
    }
}

/// Adapter so a [`Circuit`] itself satisfies [`UnitImpl`] (`Meta::Circuit`,
/// §3/§4.A), making circuits composable as children of other circuits.
pub struct CircuitUnit {
    inner: Circuit,
}

impl CircuitUnit {
    pub fn new(inner: Circuit) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Circuit {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Circuit {
        &mut self.inner
    }
}

impl Clone for CircuitUnit {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl UnitImpl for CircuitUnit {
    fn class_name(&self) -> &'static str {
        "meta.circuit"
    }

    fn port_spec(&self) -> PortSpec {
        let channels = self.inner.units.get(self.inner.input_unit).map(|u| u.outputs().len()).unwrap_or(1);
        let out_channels = self.inner.units.get(self.inner.output_unit).map(|u| u.inputs().len()).unwrap_or(2);
        PortSpec::new(
            (0..channels).map(|i| PortDef::new(i as PortId, "in", SignalKind::Audio)).collect(),
            (0..out_channels).map(|i| PortDef::new(10 + i as PortId, "out", SignalKind::Audio)).collect(),
        )
    }

    fn process(&mut self, _ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let n = outputs.first().map(|o| o.len()).unwrap_or(0);
        for (ch, input) in inputs.iter().enumerate() {
            self.inner.write_input(ch, input);
        }
        self.inner.tick(n);
        for (ch, output) in outputs.iter_mut().enumerate() {
            let src = self.inner.read_output(ch);
            let len = src.len().min(output.len());
            output[..len].copy_from_slice(&src[..len]);
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn on_fs_change(&mut self, fs: f64) {
        self.inner.on_fs_change(fs);
    }

    fn on_tempo_change(&mut self, tempo: f64) {
        self.inner.on_tempo_change(tempo);
    }

    fn on_note_on(&mut self, note: u8, vel: u8) {
        self.inner.note_on(note, vel);
    }

    fn on_note_off(&mut self, note: u8, vel: u8) {
        self.inner.note_off(note, vel);
    }

    fn on_param_change(&mut self, _id: ParamId) {}

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
    use crate::units::math::{Constant, Summer};

    #[test]
    fn silent_default_circuit_produces_zero_output() {
        let mut c = Circuit::new(44100.0, 120.0, 128);
        c.connect(c.input_unit(), 0, c.output_unit(), 0, EdgeKind::Forward).unwrap();
        c.tick(128);
        assert!(c.read_output(0).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn connect_rejects_duplicate_target() {
        let mut c = Circuit::new(44100.0, 120.0, 64);
        let a = c.add_unit("const_a", 1, Box::new(Constant::default()));
        let b = c.add_unit("const_b", 2, Box::new(Constant::default()));
        c.connect(a, 10, c.output_unit(), 0, EdgeKind::Forward).unwrap();
        let result = c.connect(b, 10, c.output_unit(), 0, EdgeKind::Forward);
        assert!(matches!(result, Err(EngineError::AlreadyConnected { .. })));
    }

    #[test]
    fn connect_rejects_cycle() {
        let mut c = Circuit::new(44100.0, 120.0, 64);
        let a = c.add_unit("a", 1, Box::new(Summer::default()));
        let b = c.add_unit("b", 2, Box::new(Summer::default()));
        c.connect(a, 10, b, 0, EdgeKind::Forward).unwrap();
        let result = c.connect(b, 10, a, 0, EdgeKind::Forward);
        assert!(matches!(result, Err(EngineError::CycleWouldForm { .. })));
    }

    #[test]
    fn feedback_edge_delays_by_one_buffer() {
        // A -> B -> A(feedback), A is a passthrough summer of its external
        // input and the feedback loopback (§8 scenario).
        let mut c = Circuit::new(44100.0, 120.0, 4);
        let a = c.add_unit("a", 1, Box::new(Summer::default()));
        let b = c.add_unit("b", 2, Box::new(Summer::default()));
        c.connect(c.input_unit(), 0, a, 0, EdgeKind::Forward).unwrap();
        c.connect(a, 10, b, 0, EdgeKind::Forward).unwrap();
        c.connect(b, 10, c.output_unit(), 0, EdgeKind::Forward).unwrap();
        c.connect(b, 10, a, 1, EdgeKind::Feedback).unwrap();

        c.write_input(0, &[1.0, 0.0, 0.0, 0.0]);
        c.tick(4);
        let out0 = c.read_output(0).to_vec();
        assert_eq!(out0, alloc::vec![1.0, 0.0, 0.0, 0.0]);

        c.write_input(0, &[0.0, 0.0, 0.0, 0.0]);
        c.tick(4);
        let out1 = c.read_output(0).to_vec();
        assert_eq!(out1[0], 1.0);
    }
}
