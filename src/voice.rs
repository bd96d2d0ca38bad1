//! `Voice` and `VoiceManager` (§3, §4.D): polyphonic allocation, stealing,
//! and per-buffer summing.
//!
//! Grounded on the teacher crate's `polyphony.rs` (`VoiceAllocator`,
//! `AllocationMode::Steal`), generalized from the fixed per-sample
//! `PolyPatch` model to arbitrary cloned [`Circuit`]s driven buffer-at-a-time.

use crate::circuit::Circuit;
use crate::command::{Command, CommandQueue, Notification};
use crate::factory::UnitFactory;
use crate::unit::UnitId;
use crate::units::midi::{MidiCc, MidiGate, MidiPitch, MidiVelocity, MidiVoiceIndex};
use alloc::vec;
use alloc::vec::Vec;

/// A per-note clone of the prototype circuit plus its MIDI/envelope state
/// and an age counter for the oldest-voice stealing policy (§3 "Voice").
pub struct Voice {
    circuit: Circuit,
    note: Option<u8>,
    velocity: u8,
    age: u64,
    /// Unit ids of every `MidiGate`-bearing unit in this voice's circuit, so
    /// `is_done` can consult the gate/envelope state without a generic
    /// "done" hook on every unit kind.
    gate_units: Vec<UnitId>,
}

impl Voice {
    fn new(circuit: Circuit, gate_units: Vec<UnitId>) -> Self {
        Self { circuit, note: None, velocity: 0, age: 0, gate_units }
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn note(&self) -> Option<u8> {
        self.note
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    /// A voice is done releasing once every ADSR in its circuit has decayed
    /// to idle; approximated here by reading the `env` output's last
    /// snapshot rather than requiring a dedicated lifecycle hook.
    fn is_done(&self) -> bool {
        for (_, unit) in self.circuit.units().iter() {
            if unit.class_name() == "envelope.adsr" {
                if let Some(out) = unit.outputs().first() {
                    if out.as_slice().iter().any(|&v| v.abs() > 1e-6) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn trigger(&mut self, note: u8, vel: u8, age: u64) {
        self.note = Some(note);
        self.velocity = vel;
        self.age = age;
        self.circuit.note_on(note, vel);
    }

    fn release(&mut self, note: u8, vel: u8) {
        if self.note == Some(note) {
            self.circuit.note_off(note, vel);
        }
    }
}

/// Owns the voice pool, dispatches MIDI, ticks active voices, and fans
/// structural/parameter edits out to every voice plus the prototype (§4.D).
pub struct VoiceManager {
    prototype: Circuit,
    voices: Vec<Voice>,
    idle: Vec<usize>,
    active: Vec<usize>,
    note_map: alloc::collections::BTreeMap<u8, Vec<usize>>,
    tick_counter: u64,
    max_voices: usize,
}

fn gate_unit_ids(circuit: &Circuit) -> Vec<UnitId> {
    circuit
        .units()
        .iter()
        .filter(|(_, u)| u.class_name() == "midi.gate")
        .map(|(id, _)| id)
        .collect()
}

impl VoiceManager {
    /// Builds a pool of `max_voices` clones of `prototype`, each tagged with
    /// its pool index via any `midi.voice_index` units it contains.
    pub fn new(prototype: Circuit, max_voices: usize) -> Self {
        let mut voices = Vec::with_capacity(max_voices);
        for idx in 0..max_voices {
            let mut circuit = prototype.clone();
            tag_voice_index(&mut circuit, idx);
            let gate_units = gate_unit_ids(&circuit);
            voices.push(Voice::new(circuit, gate_units));
        }
        Self {
            prototype,
            voices,
            idle: (0..max_voices).collect(),
            active: Vec::new(),
            note_map: alloc::collections::BTreeMap::new(),
            tick_counter: 0,
            max_voices,
        }
    }

    pub fn prototype(&self) -> &Circuit {
        &self.prototype
    }

    pub fn prototype_mut(&mut self) -> &mut Circuit {
        &mut self.prototype
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// §4.D voice allocation on note-on: idle voice if one exists, else
    /// steal the oldest active voice.
    pub fn note_on(&mut self, note: u8, vel: u8) {
        let idx = if let Some(idx) = self.idle.pop() {
            idx
        } else {
            let stolen = self.active.remove(0);
            log::debug!("voice steal: reassigning voice {stolen} to note {note}");
            self.remove_from_note_map(stolen);
            stolen
        };
        self.remove_from_note_map(idx);
        self.tick_counter += 1;
        self.voices[idx].trigger(note, vel, self.tick_counter);
        self.active.push(idx);
        self.note_map.entry(note).or_default().push(idx);
        log::debug!("voice allocate: voice {idx} -> note {note}");
    }

    pub fn note_off(&mut self, note: u8, vel: u8) {
        if let Some(indices) = self.note_map.get(&note).cloned() {
            for idx in indices {
                self.voices[idx].release(note, vel);
            }
        }
    }

    fn remove_from_note_map(&mut self, idx: usize) {
        for bucket in self.note_map.values_mut() {
            bucket.retain(|&i| i != idx);
        }
    }

    /// Broadcasts a CC message to every active voice's `midi.cc` units
    /// (§4.D "CC and pitch-bend dispatch").
    pub fn cc(&mut self, controller: u8, value: f64) {
        for &idx in &self.active {
            let ids: Vec<UnitId> = self.voices[idx].circuit().units().keys().collect();
            for id in ids {
                if let Some(unit) = self.voices[idx].circuit_mut().unit_mut(id) {
                    if let Some(cc) = unit.downcast_mut::<MidiCc>() {
                        cc.handle_cc(controller, value);
                    }
                }
            }
        }
    }

    /// Broadcasts a pitch-bend value to every active voice's `midi.pitch`
    /// units.
    pub fn pitch_bend(&mut self, value: f64) {
        for &idx in &self.active {
            let ids: Vec<UnitId> = self.voices[idx].circuit().units().keys().collect();
            for id in ids {
                if let Some(unit) = self.voices[idx].circuit_mut().unit_mut(id) {
                    if let Some(pitch) = unit.downcast_mut::<MidiPitch>() {
                        pitch.set_bend(value);
                    }
                }
            }
        }
    }

    /// Heavy structural rebuild: drops the idle stack, terminates active
    /// voices, re-clones the prototype `n` times (§4.D "Max-voices change").
    /// Must only run between buffers, never from inside a tick.
    pub fn set_max_voices(&mut self, n: usize) {
        self.voices.clear();
        self.idle.clear();
        self.active.clear();
        self.note_map.clear();
        self.max_voices = n;
        for idx in 0..n {
            let mut circuit = self.prototype.clone();
            tag_voice_index(&mut circuit, idx);
            let gate_units = gate_unit_ids(&circuit);
            self.voices.push(Voice::new(circuit, gate_units));
            self.idle.push(idx);
        }
    }

    /// Fans a parameter edit out to the prototype and every voice's
    /// corresponding unit (§4.D "Parameter edits").
    pub fn modify_param(&mut self, unit: UnitId, param: crate::port::ParamId, value: f64) {
        if let Some(u) = self.prototype.unit_mut(unit) {
            u.set_param_value(param, value);
        }
        for voice in &mut self.voices {
            if let Some(u) = voice.circuit_mut().unit_mut(unit) {
                u.set_param_value(param, value);
            }
        }
    }

    pub fn modify_param_norm(&mut self, unit: UnitId, param: crate::port::ParamId, norm: f64) {
        if let Some(u) = self.prototype.unit_mut(unit) {
            u.set_param_normalized(param, norm);
        }
        for voice in &mut self.voices {
            if let Some(u) = voice.circuit_mut().unit_mut(unit) {
                u.set_param_normalized(param, norm);
            }
        }
    }

    /// §4.D "Per-buffer tick": drain commands, tick active voices summing
    /// into stereo accumulators scaled by `1/max_voices`, reap done voices.
    pub fn tick(&mut self, queue: &CommandQueue, factory: &UnitFactory, n: usize, out_left: &mut [f64], out_right: &mut [f64]) {
        out_left[..n].fill(0.0);
        out_right[..n].fill(0.0);

        for cmd in queue.drain() {
            self.apply_command(cmd, queue, factory);
        }

        let scale = 1.0 / self.max_voices.max(1) as f64;
        let mut reaped = Vec::new();
        for &idx in &self.active {
            self.voices[idx].circuit_mut().tick(n);
            let left_src = self.voices[idx].circuit().read_output(0).to_vec();
            let right_src = self.voices[idx].circuit().read_output(1).to_vec();
            for k in 0..n.min(left_src.len()) {
                out_left[k] += left_src[k] * scale;
            }
            for k in 0..n.min(right_src.len()) {
                out_right[k] += right_src[k] * scale;
            }
            if self.voices[idx].is_done() {
                reaped.push(idx);
            }
        }

        for idx in reaped {
            self.active.retain(|&i| i != idx);
            self.remove_from_note_map(idx);
            self.idle.push(idx);
        }

        self.tick_counter += 1;
    }

    fn apply_command(&mut self, cmd: Command, queue: &CommandQueue, factory: &UnitFactory) {
        match cmd {
            Command::NoteOn { note, vel } => self.note_on(note, vel),
            Command::NoteOff { note, vel } => self.note_off(note, vel),
            Command::Cc { controller, value } => self.cc(controller, value),
            Command::PitchBend { value } => self.pitch_bend(value),
            Command::ModifyParam { unit, param, value } => self.modify_param(unit, param, value),
            Command::ModifyParamNorm { unit, param, norm } => self.modify_param_norm(unit, param, norm),
            Command::SetMaxVoices { n } => self.set_max_voices(n),
            Command::SetTempo { bpm } => {
                self.prototype.on_tempo_change(bpm);
                for voice in &mut self.voices {
                    voice.circuit_mut().on_tempo_change(bpm);
                }
            }
            Command::SetFs { sample_rate } => {
                self.prototype.on_fs_change(sample_rate);
                for voice in &mut self.voices {
                    voice.circuit_mut().on_fs_change(sample_rate);
                }
            }
            Command::Connect { src, src_out, dst, dst_in } => {
                if let Err(e) = self.prototype.connect(src, src_out, dst, dst_in, crate::circuit::EdgeKind::Forward) {
                    log::warn!("dropping Connect command: {e}");
                    queue.notify(Notification::CommandDropped);
                }
            }
            Command::Disconnect { dst, dst_in } => {
                self.prototype.disconnect(dst, dst_in);
            }
            Command::AddUnit { class_id } => {
                if let Err(e) = self.prototype.add_unit_from_factory(factory, class_id) {
                    log::warn!("dropping AddUnit command: {e}");
                    queue.notify(Notification::CommandDropped);
                }
            }
            Command::DeleteUnit { unit } => {
                if let Err(e) = self.prototype.remove_unit(unit) {
                    log::warn!("dropping DeleteUnit command: {e}");
                    queue.notify(Notification::CommandDropped);
                }
            }
        }
    }
}

fn tag_voice_index(circuit: &mut Circuit, idx: usize) {
    let ids: Vec<UnitId> = circuit.units().keys().collect();
    for id in ids {
        if let Some(unit) = circuit.unit_mut(id) {
            if let Some(vi) = unit.downcast_mut::<MidiVoiceIndex>() {
                vi.set_voice_index(idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::EdgeKind;
    use crate::units::envelope::Adsr;

    fn sine_voice_prototype() -> Circuit {
        let mut c = Circuit::new(44100.0, 120.0, 64);
        let env = c.add_unit("env", 1, alloc::boxed::Box::new(Adsr::new(44100.0)));
        let _ = env;
        c
    }

    #[test]
    fn note_on_allocates_idle_voice_before_stealing() {
        let mgr = VoiceManager::new(sine_voice_prototype(), 2);
        assert_eq!(mgr.idle_count(), 2);
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn voice_stealing_picks_oldest_active() {
        let mut mgr = VoiceManager::new(sine_voice_prototype(), 2);
        mgr.note_on(60, 127);
        mgr.note_on(62, 127);
        assert_eq!(mgr.idle_count(), 0);
        mgr.note_on(64, 127);
        assert_eq!(mgr.active_count(), 2);
        let notes: Vec<Option<u8>> = mgr.active.iter().map(|&i| mgr.voices[i].note()).collect();
        assert!(!notes.contains(&Some(60)));
        assert!(notes.contains(&Some(62)));
        assert!(notes.contains(&Some(64)));
    }

    #[test]
    fn pool_size_invariant_holds_after_allocation() {
        let mut mgr = VoiceManager::new(sine_voice_prototype(), 4);
        mgr.note_on(60, 100);
        mgr.note_on(62, 100);
        assert_eq!(mgr.active_count() + mgr.idle_count(), mgr.max_voices());
    }
}
