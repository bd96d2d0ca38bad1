//! Unit: a single processing node (§3, §4.A).
//!
//! `Unit` is the common envelope (id, name, class id, parameter table, port
//! tables, audio config, last MIDI note) around a boxed [`UnitImpl`], which
//! supplies the concrete DSP behavior for one of the kinds enumerated in
//! §4.A. Built-in kinds live under [`crate::units`]; user kinds implement
//! `UnitImpl` directly and register through the [`crate::factory::UnitFactory`].

use crate::param::{ParamDef, Parameter};
use crate::port::{InputPort, OutputPort, ParamId, PortDef, PortId, PortSpec};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use slotmap::new_key_type;

new_key_type! {
    /// Stable, small-integer-backed identifier for a Unit within its parent
    /// Circuit's arena.
    pub struct UnitId;
}

/// Read-only audio configuration handed to units on lifecycle hooks and
/// during `process`.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext {
    pub sample_rate: f64,
    pub tempo: f64,
    pub buffer_size: usize,
}

/// The polymorphic operation set of §4.A: `{process, clone, on_*, class_id,
/// class_name}`. Built-in kinds (§4.A.1) and user-pluggable kinds alike
/// implement this trait; [`Unit`] supplies the rest of the Unit contract
/// (ports, parameters, ids) uniformly around it.
pub trait UnitImpl: Send {
    /// Canonical class name, hashed by the factory to produce `class_id`.
    /// Must be stable across refactors (§4.C).
    fn class_name(&self) -> &'static str;

    fn port_spec(&self) -> PortSpec;

    fn param_defs(&self) -> Vec<ParamDef> {
        Vec::new()
    }

    /// Process `n` samples. Inputs/outputs are supplied as slices indexed by
    /// the unit's own port order (not by `PortId`); implementations read
    /// `inputs[i][k]` / write `outputs[j][k]` for offset `k` in `0..n`.
    fn process(&mut self, ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], params: &[Parameter]);

    fn reset(&mut self) {}
    fn on_fs_change(&mut self, _fs: f64) {}
    fn on_tempo_change(&mut self, _tempo: f64) {}
    fn on_note_on(&mut self, _note: u8, _vel: u8) {}
    fn on_note_off(&mut self, _note: u8, _vel: u8) {}
    fn on_param_change(&mut self, _id: ParamId) {}
    fn on_input_connect(&mut self, _id: PortId) {}
    fn on_input_disconnect(&mut self, _id: PortId) {}

    fn clone_box(&self) -> Box<dyn UnitImpl>;

    /// Downcast support for the handful of unit kinds (the `Midi::*` family)
    /// that the VoiceManager addresses directly for CC/pitch-bend/voice-index
    /// dispatch outside the fixed lifecycle-hook set.
    fn as_any_mut(&mut self) -> &mut dyn core::any::Any;
}

impl Clone for Box<dyn UnitImpl> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}

/// A single processing node owning its parameters and typed ports, wrapping
/// a concrete [`UnitImpl`] (§3 "Unit").
pub struct Unit {
    id: UnitId,
    name: String,
    class_id: u32,
    class_name: &'static str,
    params: Vec<Parameter>,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    input_id_index: BTreeMap<PortId, usize>,
    output_id_index: BTreeMap<PortId, usize>,
    param_id_index: BTreeMap<ParamId, usize>,
    last_note: Option<(u8, u8)>,
    note_on: bool,
    imp: Box<dyn UnitImpl>,
}

impl Unit {
    pub(crate) fn new(id: UnitId, name: String, class_id: u32, imp: Box<dyn UnitImpl>) -> Self {
        let spec = imp.port_spec();
        let class_name = imp.class_name();
        let params: Vec<Parameter> = imp.param_defs().into_iter().map(Parameter::new).collect();
        let inputs: Vec<InputPort> = spec.inputs.into_iter().map(InputPort::new).collect();
        let outputs: Vec<OutputPort> = spec.outputs.into_iter().map(OutputPort::new).collect();
        let input_id_index = inputs.iter().enumerate().map(|(i, p)| (p.def.id, i)).collect();
        let output_id_index = outputs.iter().enumerate().map(|(i, p)| (p.def.id, i)).collect();
        let param_id_index = params.iter().enumerate().map(|(i, p)| (p.def().id, i)).collect();
        Self {
            id,
            name,
            class_id,
            class_name,
            params,
            inputs,
            outputs,
            input_id_index,
            output_id_index,
            param_id_index,
            last_note: None,
            note_on: false,
            imp,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut [InputPort] {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut [OutputPort] {
        &mut self.outputs
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn input_index_by_id(&self, id: PortId) -> Option<usize> {
        self.input_id_index.get(&id).copied()
    }

    pub fn output_index_by_id(&self, id: PortId) -> Option<usize> {
        self.output_id_index.get(&id).copied()
    }

    pub fn param_index_by_id(&self, id: ParamId) -> Option<usize> {
        self.param_id_index.get(&id).copied()
    }

    pub fn resize_buffers(&mut self, n: usize) {
        for input in &mut self.inputs {
            input.resize(n);
        }
        for output in &mut self.outputs {
            output.resize(n);
        }
    }

    pub fn set_param_value(&mut self, id: ParamId, value: f64) -> bool {
        if let Some(idx) = self.param_index_by_id(id) {
            self.params[idx].set_base(value);
            self.imp.on_param_change(id);
            true
        } else {
            false
        }
    }

    pub fn set_param_normalized(&mut self, id: ParamId, norm: f64) -> bool {
        if let Some(idx) = self.param_index_by_id(id) {
            self.params[idx].set_normalized(norm);
            self.imp.on_param_change(id);
            true
        } else {
            false
        }
    }

    /// Run `process` for `n` samples. Inputs must already have been filled
    /// by the owning Circuit (from connected sources or defaults).
    pub(crate) fn tick(&mut self, ctx: &UnitContext, n: usize) {
        for p in &mut self.params {
            p.recompute();
        }
        let input_slices: Vec<&[f64]> = self.inputs.iter().map(|p| &p.as_slice()[..n]).collect();
        let mut output_slices: Vec<&mut [f64]> = self
            .outputs
            .iter_mut()
            .map(|p| &mut p.as_mut_slice()[..n])
            .collect();
        self.imp.process(ctx, &input_slices, &mut output_slices, &self.params);
        for p in &mut self.params {
            p.reset_modulation();
        }
    }

    pub fn on_fs_change(&mut self, fs: f64) {
        self.imp.on_fs_change(fs);
    }

    pub fn on_tempo_change(&mut self, tempo: f64) {
        self.imp.on_tempo_change(tempo);
    }

    pub fn note_on(&mut self, note: u8, vel: u8) {
        self.last_note = Some((note, vel));
        self.note_on = true;
        self.imp.on_note_on(note, vel);
    }

    pub fn note_off(&mut self, note: u8, vel: u8) {
        self.note_on = false;
        self.imp.on_note_off(note, vel);
    }

    pub fn last_note(&self) -> Option<(u8, u8)> {
        self.last_note
    }

    pub fn reset(&mut self) {
        self.imp.reset();
    }

    pub fn mark_input_connected(&mut self, id: PortId, connected: bool) {
        if let Some(idx) = self.input_index_by_id(id) {
            self.inputs[idx].set_connected(connected);
            if connected {
                self.imp.on_input_connect(id);
            } else {
                self.imp.on_input_disconnect(id);
            }
        }
    }

    pub fn imp(&self) -> &dyn UnitImpl {
        self.imp.as_ref()
    }

    pub fn imp_mut(&mut self) -> &mut dyn UnitImpl {
        self.imp.as_mut()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.imp.as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for Unit {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            class_id: self.class_id,
            class_name: self.class_name,
            params: self.params.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            input_id_index: self.input_id_index.clone(),
            output_id_index: self.output_id_index.clone(),
            param_id_index: self.param_id_index.clone(),
            last_note: self.last_note,
            note_on: self.note_on,
            imp: self.imp.clone_box(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SignalKind;

    struct PassThrough;

    impl UnitImpl for PassThrough {
        fn class_name(&self) -> &'static str {
            "test.pass_through"
        }

        fn port_spec(&self) -> PortSpec {
            PortSpec::new(
                alloc::vec![PortDef::new(0, "in", SignalKind::Audio)],
                alloc::vec![PortDef::new(0, "out", SignalKind::Audio)],
            )
        }

        fn process(&mut self, _ctx: &UnitContext, inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
            outputs[0].copy_from_slice(inputs[0]);
        }

        fn clone_box(&self) -> Box<dyn UnitImpl> {
            Box::new(PassThrough)
        }

        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn tick_resets_param_accumulators() {
        let mut sm: slotmap::SlotMap<UnitId, ()> = slotmap::SlotMap::with_key();
        let id = sm.insert(());
        let mut unit = Unit::new(id, "u".into(), 0, Box::new(PassThrough));
        unit.resize_buffers(4);
        let ctx = UnitContext {
            sample_rate: 44100.0,
            tempo: 120.0,
            buffer_size: 4,
        };
        unit.inputs_mut()[0].set_connected(true);
        unit.inputs_mut()[0].scratch_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        unit.tick(&ctx, 4);
        assert_eq!(unit.outputs()[0].as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(unit.params().iter().all(|p| p.is_modulation_clean()));
    }
}
