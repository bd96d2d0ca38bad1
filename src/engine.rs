//! `EngineConfig` and `Synth`: the host-facing surface (§2.A, §6).
//!
//! `Synth` owns a `VoiceManager`, a `CommandQueue` pair, a `UnitFactory`
//! reference, and the oscilloscope tap, and is the one type a host embeds.
//! Grounded on the teacher crate's top-level `lib.rs` doc example (a single
//! owning struct driving `process` each buffer) and on VOSIMSynth's
//! `VoiceManager`-owning synth object described in §2.A.

use crate::circuit::Circuit;
use crate::command::{Command, CommandQueue};
use crate::error::Result;
use crate::factory::{builtin_factory, UnitFactory};
use crate::oscilloscope::Oscilloscope;
use crate::persistence::Preset;
use crate::voice::VoiceManager;
use alloc::string::String;

/// Runtime configuration a host supplies at construction (§1.A, §6 Config
/// table). There is no file-based configuration layer; hosts pass these in
/// directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub buffer_size: usize,
    pub max_voices: usize,
    pub oversampling_factor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            buffer_size: 128,
            max_voices: 8,
            oversampling_factor: 1,
        }
    }
}

/// Default oscilloscope display-buffer length before any trigger has synced.
const DEFAULT_SCOPE_CAPACITY: usize = 2048;

/// The engine entry point a host embeds. Owns everything needed to answer
/// `process` each buffer and to accept MIDI/control messages concurrently
/// via its `CommandQueue`.
pub struct Synth {
    config: EngineConfig,
    factory: UnitFactory,
    voices: VoiceManager,
    queue: CommandQueue,
    scope: Oscilloscope,
    tempo: f64,
}

impl Synth {
    /// Builds a `Synth` with the built-in unit factory and an empty
    /// prototype circuit (an unpatched `InputUnit` -> `OutputUnit` pair).
    pub fn new(config: EngineConfig) -> Self {
        Self::with_prototype(config, Circuit::new(config.sample_rate, 120.0, config.buffer_size))
    }

    /// Builds a `Synth` around a caller-supplied prototype circuit, e.g. one
    /// restored from a preset.
    pub fn with_prototype(config: EngineConfig, prototype: Circuit) -> Self {
        let factory = builtin_factory(config.sample_rate);
        let voices = VoiceManager::new(prototype, config.max_voices);
        Self {
            config,
            factory,
            voices,
            queue: CommandQueue::new(),
            scope: Oscilloscope::new(DEFAULT_SCOPE_CAPACITY),
            tempo: 120.0,
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn factory(&self) -> &UnitFactory {
        &self.factory
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoiceManager {
        &mut self.voices
    }

    /// Non-blocking; submits onto the command queue so callers off the
    /// audio thread never touch the voice pool directly.
    pub fn command_queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn oscilloscope(&self) -> &Oscilloscope {
        &self.scope
    }

    pub fn oscilloscope_mut(&mut self) -> &mut Oscilloscope {
        &mut self.scope
    }

    /// Audio callback entry point. Drains the command queue, ticks every
    /// active voice, sums into `out_left`/`out_right`, and feeds the
    /// oscilloscope tap from the summed left channel.
    pub fn process(&mut self, out_left: &mut [f64], out_right: &mut [f64]) {
        let n = out_left.len().min(out_right.len());
        self.voices.tick(&self.queue, &self.factory, n, out_left, out_right);
        self.scope.write(&out_left[..n]);
        self.scope.sync();
    }

    pub fn note_on(&mut self, note: wmidi::Note, vel: wmidi::U7) {
        let _ = self.queue.submit(Command::NoteOn { note: u8::from(note), vel: u8::from(vel) });
    }

    pub fn note_off(&mut self, note: wmidi::Note, vel: wmidi::U7) {
        let _ = self.queue.submit(Command::NoteOff { note: u8::from(note), vel: u8::from(vel) });
    }

    /// `value` is normalized to `[0, 1]` per §6; `controller` is the CC
    /// index the caller decoded from the raw MIDI byte.
    pub fn cc(&mut self, controller: wmidi::ControlFunction, value: f64) {
        let controller = controller.0.into();
        let _ = self.queue.submit(Command::Cc { controller, value: value.clamp(0.0, 1.0) });
    }

    /// `value` is normalized to `[-1, 1]` per §6.
    pub fn pitch_bend(&mut self, value: f64) {
        let _ = self.queue.submit(Command::PitchBend { value: value.clamp(-1.0, 1.0) });
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo = bpm;
        let _ = self.queue.submit(Command::SetTempo { bpm });
    }

    pub fn set_max_voices(&mut self, n: usize) {
        let _ = self.queue.submit(Command::SetMaxVoices { n });
    }

    /// Replaces the running prototype circuit and voice pool with one
    /// restored from `json` (§6 "Persistence"). Must be called off the
    /// audio thread; swaps the whole `VoiceManager` rather than mutating it
    /// through the command queue.
    pub fn load_preset(&mut self, json: &str) -> Result<()> {
        let preset = Preset::from_json(json)?;
        let prototype = preset.synth_circuit.restore(&self.factory, self.config.sample_rate, self.tempo, self.config.buffer_size)?;
        self.voices = VoiceManager::new(prototype, self.config.max_voices);
        Ok(())
    }

    pub fn save_preset(&self, name: impl Into<String>) -> Result<String> {
        let synth_circuit = crate::persistence::CircuitPreset::capture(self.voices.prototype(), name, &self.factory);
        let preset = Preset { synth_circuit, gui: serde_json::Value::Null };
        preset.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_table() {
        let config = EngineConfig::default();
        assert_eq!(config.max_voices, 8);
        assert_eq!(config.oversampling_factor, 1);
    }

    #[test]
    fn silent_synth_produces_zero_output() {
        let mut synth = Synth::new(EngineConfig::default());
        let mut left = [1.0f64; 64];
        let mut right = [1.0f64; 64];
        synth.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.0));
        assert!(right.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn note_on_then_process_does_not_panic_with_empty_prototype() {
        let mut synth = Synth::new(EngineConfig::default());
        synth.note_on(wmidi::Note::C4, wmidi::U7::from_u8_lossy(100));
        let mut left = [0.0f64; 32];
        let mut right = [0.0f64; 32];
        synth.process(&mut left, &mut right);
    }

    #[test]
    fn save_then_load_preset_round_trips() {
        let mut synth = Synth::new(EngineConfig::default());
        let json = synth.save_preset("roundtrip").unwrap();
        synth.load_preset(&json).unwrap();
    }
}
