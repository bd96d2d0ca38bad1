//! `UnitFactory` (§4.C): registry of prototype Units keyed by a stable class
//! identifier, cloned to produce instances.

use crate::error::{EngineError, Result};
use crate::unit::{Unit, UnitId, UnitImpl};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use slotmap::SlotMap;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit, over the UTF-8 bytes of a class's canonical name (§4.C
/// resolved open question). Deterministic across builds, targets, and Rust
/// versions, unlike the platform default hasher.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

struct Prototype {
    group: String,
    name: String,
    class_id: u32,
    imp: Box<dyn UnitImpl>,
}

/// Write-once-at-init, read-only-thereafter registry of prototype Units
/// (§4.C, §9 "Global state"). Held by value by whichever owner needs it
/// (a `Synth`, a test harness) rather than as a true global singleton, to
/// keep registration and lookups easy to test in isolation.
#[derive(Default)]
pub struct UnitFactory {
    by_class_id: BTreeMap<u32, usize>,
    by_name: BTreeMap<String, usize>,
    prototypes: Vec<Prototype>,
    group_order: Vec<String>,
}

impl UnitFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prototype under `group`/`name`. `class_id` is derived from
    /// `name`, which must therefore stay stable across refactors for presets
    /// to keep resolving.
    pub fn register<T: UnitImpl + 'static>(&mut self, group: impl Into<String>, name: impl Into<String>, prototype: T) -> u32 {
        let group = group.into();
        let name = name.into();
        let class_id = fnv1a_32(name.as_bytes());
        let idx = self.prototypes.len();
        if !self.group_order.contains(&group) {
            self.group_order.push(group.clone());
        }
        self.by_class_id.insert(class_id, idx);
        self.by_name.insert(name.clone(), idx);
        self.prototypes.push(Prototype {
            group,
            name,
            class_id,
            imp: Box::new(prototype),
        });
        class_id
    }

    fn instantiate(&self, idx: usize, units: &mut SlotMap<UnitId, Unit>) -> UnitId {
        let proto = &self.prototypes[idx];
        let instance_name = alloc::format!("{}_{}", proto.name, units.len());
        let imp = proto.imp.clone_box();
        let class_id = proto.class_id;
        units.insert_with_key(|id| Unit::new(id, instance_name, class_id, imp))
    }

    /// Clones the prototype registered under `class_id` into `units`,
    /// returning the new Unit's id.
    pub fn create_by_class_id(&self, class_id: u32, units: &mut SlotMap<UnitId, Unit>) -> Result<UnitId> {
        let idx = *self
            .by_class_id
            .get(&class_id)
            .ok_or(EngineError::UnknownClassId(class_id))?;
        Ok(self.instantiate(idx, units))
    }

    /// Clones the prototype registered under `name`, returning the new
    /// Unit's id.
    pub fn create_by_name(&self, name: &str, units: &mut SlotMap<UnitId, Unit>) -> Result<UnitId> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| EngineError::BadPreset(alloc::format!("unknown unit class '{name}'")))?;
        Ok(self.instantiate(idx, units))
    }

    pub fn class_id_for_name(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&idx| self.prototypes[idx].class_id)
    }

    pub fn groups(&self) -> &[String] {
        &self.group_order
    }

    pub fn prototypes_in(&self, group: &str) -> Vec<&str> {
        self.prototypes
            .iter()
            .filter(|p| p.group == group)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn contains_class_id(&self, class_id: u32) -> bool {
        self.by_class_id.contains_key(&class_id)
    }
}

/// Registers every built-in kind named in §4.A under its natural group.
/// Returns the populated factory; called once at engine construction.
pub fn builtin_factory(sample_rate: f64) -> UnitFactory {
    use crate::units::*;

    let mut f = UnitFactory::new();

    f.register("oscillator", "oscillator.basic", BasicOscillator::new(sample_rate));
    f.register("oscillator", "oscillator.vosim", VosimOscillator::new(sample_rate));
    f.register("oscillator", "oscillator.formant", FormantOscillator::new(sample_rate));
    f.register("oscillator", "oscillator.noise", NoiseOscillator::new());

    f.register("envelope", "envelope.adsr", Adsr::new(sample_rate));

    f.register("filter", "filter.svf", Svf::new(sample_rate));
    f.register("filter", "filter.trap_svf", TrapSvf::new(sample_rate));
    f.register("filter", "filter.ladder_a", LadderA::new(sample_rate));
    f.register("filter", "filter.ladder_b", LadderB::new(sample_rate));
    f.register("filter", "filter.one_pole_lp", OnePoleLp::new(sample_rate));
    f.register("filter", "filter.dc_remover", DcRemover::new());
    f.register("filter", "filter.follower", Follower::new(sample_rate));

    f.register("math", "math.summer", Summer::default());
    f.register("math", "math.gain", Gain::default());
    f.register("math", "math.lerp", Lerp::default());
    f.register("math", "math.tanh", Tanh);
    f.register("math", "math.rectifier", Rectifier::default());
    f.register("math", "math.quantizer", Quantizer::default());
    f.register("math", "math.pan", Pan::default());
    f.register("math", "math.switch", Switch::default());
    f.register("math", "math.constant", Constant::default());

    f.register("delay", "delay.one_sample", OneSampleDelay::default());
    f.register("delay", "delay.variable", VariableDelay::new(sample_rate));

    f.register("midi", "midi.gate", MidiGate::default());
    f.register("midi", "midi.pitch", MidiPitch::default());
    f.register("midi", "midi.velocity", MidiVelocity::default());
    f.register("midi", "midi.cc", MidiCc::default());
    f.register("midi", "midi.voice_index", MidiVoiceIndex::default());

    f.register("converter", "converter.pitch_to_freq", PitchToFreq);
    f.register("converter", "converter.freq_to_pitch", FreqToPitch);

    f.register("meta", "meta.input", InputUnit::new(1));
    f.register("meta", "meta.output", OutputUnit::new(1));

    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Constant;

    #[test]
    fn fnv1a_matches_known_vector() {
        // FNV-1a 32-bit of the empty string is the offset basis itself.
        assert_eq!(fnv1a_32(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn register_and_create_by_name_and_class_id() {
        let mut f = UnitFactory::new();
        let class_id = f.register("math", "math.constant", Constant::default());
        let mut units = SlotMap::with_key();
        let id1 = f.create_by_name("math.constant", &mut units).unwrap();
        let id2 = f.create_by_class_id(class_id, &mut units).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn unknown_class_id_errors() {
        let f = UnitFactory::new();
        let mut units = SlotMap::with_key();
        let err = f.create_by_class_id(0xdead_beef, &mut units).unwrap_err();
        assert!(matches!(err, EngineError::UnknownClassId(_)));
    }

    #[test]
    fn builtin_factory_registers_every_group() {
        let f = builtin_factory(44100.0);
        let groups = f.groups();
        for expected in ["oscillator", "envelope", "filter", "math", "delay", "midi", "converter", "meta"] {
            assert!(groups.iter().any(|g| g == expected), "missing group {expected}");
        }
    }
}
