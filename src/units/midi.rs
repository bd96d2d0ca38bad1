//! `Midi{Gate|Pitch|Velocity|CC|VoiceIndex}` (§4.A, §2.A).
//!
//! Grounded on `original_source/VOSIMLib/units/include/MidiUnits.h`. Each
//! kind stores its own MIDI-derived state, populated through the fixed
//! lifecycle hooks (`on_note_on`/`on_note_off`) for note/velocity/gate, and
//! through a downcast dispatch (see [`crate::unit::Unit::downcast_mut`]) for
//! CC and pitch-bend, which are not part of the polymorphic hook set.

use crate::param::{ParamDef, Parameter};
use crate::port::{PortDef, PortSpec, SignalKind};
use crate::unit::{UnitContext, UnitImpl};
use alloc::boxed::Box;
use alloc::vec;

fn note_to_voct(note: u8) -> f64 {
    (note as f64 - 60.0) / 12.0
}

/// Emits a gate signal (0V/5V) following `on_note_on`/`on_note_off`.
#[derive(Clone, Default)]
pub struct MidiGate {
    gate: f64,
}

impl UnitImpl for MidiGate {
    fn class_name(&self) -> &'static str {
        "midi.gate"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "gate", SignalKind::Gate)])
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = self.gate;
        }
    }

    fn on_note_on(&mut self, _note: u8, _vel: u8) {
        self.gate = 5.0;
    }

    fn on_note_off(&mut self, _note: u8, _vel: u8) {
        self.gate = 0.0;
    }

    fn reset(&mut self) {
        self.gate = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Converts the last MIDI note into a V/Oct CV, summed with a bipolar pitch
/// bend CV set by `set_bend` (dispatched by the VoiceManager's
/// `pitch_bend()` broadcast, §2.A).
#[derive(Clone, Default)]
pub struct MidiPitch {
    voct: f64,
    bend: f64,
}

impl MidiPitch {
    /// Bend range in semitones, applied as `bend * bend_range / 12`.
    pub const BEND_RANGE_SEMITONES: f64 = 2.0;

    /// Called by the VoiceManager when a `pitch_bend` message arrives
    /// (`value` normalized to `[-1, 1]`).
    pub fn set_bend(&mut self, value: f64) {
        self.bend = value.clamp(-1.0, 1.0);
    }
}

impl UnitImpl for MidiPitch {
    fn class_name(&self) -> &'static str {
        "midi.pitch"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "voct", SignalKind::VoltPerOctave)])
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        let value = self.voct + self.bend * Self::BEND_RANGE_SEMITONES / 12.0;
        for k in 0..ctx.buffer_size {
            outputs[0][k] = value;
        }
    }

    fn on_note_on(&mut self, note: u8, _vel: u8) {
        self.voct = note_to_voct(note);
    }

    fn reset(&mut self) {
        self.voct = 0.0;
        self.bend = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Emits the last note-on velocity as a unipolar CV (0-10V).
#[derive(Clone, Default)]
pub struct MidiVelocity {
    level: f64,
}

impl UnitImpl for MidiVelocity {
    fn class_name(&self) -> &'static str {
        "midi.velocity"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "out", SignalKind::CvUnipolar)])
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = self.level;
        }
    }

    fn on_note_on(&mut self, _note: u8, vel: u8) {
        self.level = (vel as f64 / 127.0) * 10.0;
    }

    fn reset(&mut self) {
        self.level = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Subscribes to a single MIDI CC controller number and emits its last
/// value as a unipolar CV. Supports `learn` mode: the next CC dispatched to
/// the owning circuit rebinds `controller` instead of being compared against
/// it. Grounded on `MidiCCUnit::setIsLearning`.
#[derive(Clone)]
pub struct MidiCc {
    controller: u8,
    value: f64,
    learning: bool,
}

impl MidiCc {
    pub fn new(controller: u8) -> Self {
        Self {
            controller,
            value: 0.0,
            learning: false,
        }
    }

    pub fn learn(&mut self) {
        self.learning = true;
    }

    pub fn controller(&self) -> u8 {
        self.controller
    }

    /// Called by the VoiceManager's `cc()` broadcast for every received CC
    /// message. Rebinds the subscription while in `learn` mode; otherwise
    /// updates `value` only on a matching controller number.
    pub fn handle_cc(&mut self, controller: u8, value: f64) {
        if self.learning {
            self.controller = controller;
            self.learning = false;
            self.value = value.clamp(0.0, 1.0) * 10.0;
        } else if controller == self.controller {
            self.value = value.clamp(0.0, 1.0) * 10.0;
        }
    }
}

impl Default for MidiCc {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UnitImpl for MidiCc {
    fn class_name(&self) -> &'static str {
        "midi.cc"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "out", SignalKind::CvUnipolar)])
    }

    fn param_defs(&self) -> alloc::vec::Vec<ParamDef> {
        vec![ParamDef::numeric(0, "controller", 0.0, 127.0, self.controller as f64)]
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = self.value;
        }
    }

    fn reset(&mut self) {
        self.value = 0.0;
    }

    fn clone_box(&self) -> Box<dyn UnitImpl> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Emits this voice's pool index as a constant CV, set once by the
/// VoiceManager when the voice is cloned into the pool.
#[derive(Clone, Default)]
pub struct MidiVoiceIndex {
    index: f64,
}

impl MidiVoiceIndex {
    pub fn set_voice_index(&mut self, idx: usize) {
        self.index = idx as f64;
    }
}

impl UnitImpl for MidiVoiceIndex {
    fn class_name(&self) -> &'static str {
        "midi.voice_index"
    }

    fn port_spec(&self) -> PortSpec {
        PortSpec::new(vec![], vec![PortDef::new(10, "out", SignalKind::CvUnipolar)])
    }

    fn process(&mut self, ctx: &UnitContext, _inputs: &[&[f64]], outputs: &mut [&mut [f64]], _params: &[Parameter]) {
        for k in 0..ctx.buffer_size {
            outputs[0][k] = self.index;
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

    #[test]
    fn midi_cc_learn_rebinds_controller() {
        let mut cc = MidiCc::new(1);
        cc.learn();
        cc.handle_cc(74, 0.5);
        assert_eq!(cc.controller(), 74);
        assert!((cc.value - 5.0).abs() < 1e-9);

        cc.handle_cc(1, 1.0); // no longer subscribed to 1
        assert!((cc.value - 5.0).abs() < 1e-9);

        cc.handle_cc(74, 1.0);
        assert!((cc.value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn midi_gate_tracks_note_on_off() {
        let mut gate = MidiGate::default();
        gate.on_note_on(60, 100);
        assert_eq!(gate.gate, 5.0);
        gate.on_note_off(60, 0);
        assert_eq!(gate.gate, 0.0);
    }

    #[test]
    fn midi_pitch_converts_middle_c() {
        let mut pitch = MidiPitch::default();
        pitch.on_note_on(60, 100);
        assert_eq!(pitch.voct, 0.0);
        pitch.on_note_on(72, 100);
        assert!((pitch.voct - 1.0).abs() < 1e-9);
    }
}
