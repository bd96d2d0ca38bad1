//! Preset persistence (§6 "Persistence").
//!
//! A preset is a JSON document with two top-level objects: `synth.circuit`
//! (the prototype circuit: units, their parameters by id, and connections)
//! and an opaque `gui` blob the core never interprets. Grounded on the
//! teacher crate's `serialize.rs` (`PatchDef::to_json`/`from_json` via
//! `serde_json::to_string_pretty`/`from_str`), reworked from the teacher's
//! module/cable naming to the new unit/connection model.

use crate::circuit::{Circuit, EdgeKind};
use crate::error::{EngineError, Result};
use crate::factory::UnitFactory;
use crate::port::ParamId;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// One serialized unit instance: its factory class, its assigned id (stable
/// within this preset only), and its parameter values by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDef {
    pub class_id: u32,
    pub id: u32,
    pub name: String,
    pub parameters: BTreeMap<ParamId, f64>,
}

/// One serialized connection, naming endpoints by the `id` field of
/// [`UnitDef`], not the runtime `UnitId` (which is not stable across loads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDef {
    pub src: u32,
    pub src_out: u32,
    pub dst: u32,
    pub dst_in: u32,
    #[serde(default)]
    pub feedback: bool,
}

/// The `synth.circuit` object: everything needed to reconstruct a prototype
/// `Circuit` via a `UnitFactory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitPreset {
    pub name: String,
    pub units: Vec<UnitDef>,
    pub connections: Vec<ConnectionDef>,
}

impl CircuitPreset {
    /// Captures every non-pseudo unit of `circuit` (the `InputUnit`/
    /// `OutputUnit` pair is recreated by `Circuit::new` on load and is not
    /// serialized).
    pub fn capture(circuit: &Circuit, name: impl Into<String>, factory: &UnitFactory) -> Self {
        let input_id = circuit.input_unit();
        let output_id = circuit.output_unit();

        let mut runtime_to_serial = BTreeMap::new();
        let mut units = Vec::new();
        let mut next_id = 0u32;
        for (id, unit) in circuit.units().iter() {
            if id == input_id || id == output_id {
                continue;
            }
            let class_id = factory.class_id_for_name(unit.class_name()).unwrap_or(0);
            let parameters = unit.params().iter().map(|p| (p.def().id, p.base())).collect();
            units.push(UnitDef {
                class_id,
                id: next_id,
                name: unit.name().into(),
                parameters,
            });
            runtime_to_serial.insert(id, next_id);
            next_id += 1;
        }

        let connections = circuit
            .connections()
            .iter()
            .filter_map(|c| {
                let src = *runtime_to_serial.get(&c.src)?;
                let dst = *runtime_to_serial.get(&c.dst)?;
                Some(ConnectionDef {
                    src,
                    src_out: c.src_out,
                    dst,
                    dst_in: c.dst_in,
                    feedback: matches!(c.kind, EdgeKind::Feedback),
                })
            })
            .collect();

        Self { name: name.into(), units, connections }
    }

    /// Rebuilds a `Circuit`, in the order: construct units from `class_id`,
    /// load parameters by id (missing ids skipped), install connections in
    /// the order given, then reset.
    pub fn restore(&self, factory: &UnitFactory, sample_rate: f64, tempo: f64, buffer_size: usize) -> Result<Circuit> {
        let mut circuit = Circuit::new(sample_rate, tempo, buffer_size);
        let mut serial_to_runtime = BTreeMap::new();

        for unit_def in &self.units {
            if !factory.contains_class_id(unit_def.class_id) {
                return Err(EngineError::UnknownClassId(unit_def.class_id));
            }
            let runtime_id = circuit.add_unit_from_factory(factory, unit_def.class_id)?;
            if let Some(unit) = circuit.unit_mut(runtime_id) {
                unit.set_name(unit_def.name.clone());
                for (&param_id, &value) in &unit_def.parameters {
                    // Missing parameter ids (renamed/removed params) are skipped.
                    let _ = unit.set_param_value(param_id, value);
                }
            }
            serial_to_runtime.insert(unit_def.id, runtime_id);
        }

        for conn in &self.connections {
            let src = *serial_to_runtime
                .get(&conn.src)
                .ok_or_else(|| EngineError::BadPreset(format!("connection references unknown unit id {}", conn.src)))?;
            let dst = *serial_to_runtime
                .get(&conn.dst)
                .ok_or_else(|| EngineError::BadPreset(format!("connection references unknown unit id {}", conn.dst)))?;
            let kind = if conn.feedback { EdgeKind::Feedback } else { EdgeKind::Forward };
            circuit.connect(src, conn.src_out, dst, conn.dst_in, kind)?;
        }

        circuit.reset();
        Ok(circuit)
    }
}

/// The full preset document: the core-owned circuit plus an opaque GUI blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    #[serde(rename = "synth.circuit")]
    pub synth_circuit: CircuitPreset,
    /// Never interpreted by the core; round-tripped for whichever GUI wrote it.
    #[serde(default)]
    pub gui: serde_json::Value,
}

impl Preset {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::MalformedJson(format!("{e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::MalformedJson(format!("{e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::builtin_factory;

    #[test]
    fn capture_then_restore_round_trips_units_and_connections() {
        let factory = builtin_factory(44100.0);
        let mut circuit = Circuit::new(44100.0, 120.0, 64);
        let osc = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("oscillator.basic").unwrap()).unwrap();
        let gain = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("math.gain").unwrap()).unwrap();
        circuit.connect(osc, 0, gain, 0, EdgeKind::Forward).unwrap();

        let preset = CircuitPreset::capture(&circuit, "test", &factory);
        assert_eq!(preset.units.len(), 2);
        assert_eq!(preset.connections.len(), 1);

        let restored = preset.restore(&factory, 44100.0, 120.0, 64).unwrap();
        assert_eq!(restored.connections().len(), 1);
    }

    #[test]
    fn unknown_class_id_aborts_load() {
        let factory = builtin_factory(44100.0);
        let preset = CircuitPreset {
            name: "bad".into(),
            units: alloc::vec![UnitDef {
                class_id: 0xdead_beef,
                id: 0,
                name: "x".into(),
                parameters: BTreeMap::new(),
            }],
            connections: Vec::new(),
        };
        let err = preset.restore(&factory, 44100.0, 120.0, 64).unwrap_err();
        assert!(matches!(err, EngineError::UnknownClassId(_)));
    }

    #[test]
    fn missing_parameter_ids_are_skipped_not_fatal() {
        let factory = builtin_factory(44100.0);
        let mut parameters = BTreeMap::new();
        parameters.insert(9999, 1.0);
        let preset = CircuitPreset {
            name: "test".into(),
            units: alloc::vec![UnitDef {
                class_id: factory.class_id_for_name("math.gain").unwrap(),
                id: 0,
                name: "gain_0".into(),
                parameters,
            }],
            connections: Vec::new(),
        };
        let restored = preset.restore(&factory, 44100.0, 120.0, 64);
        assert!(restored.is_ok());
    }

    #[test]
    fn preset_json_round_trips() {
        let factory = builtin_factory(44100.0);
        let circuit = Circuit::new(44100.0, 120.0, 64);
        let preset = Preset {
            synth_circuit: CircuitPreset::capture(&circuit, "empty", &factory),
            gui: serde_json::json!({ "zoom": 1.0 }),
        };
        let json = preset.to_json().unwrap();
        let parsed = Preset::from_json(&json).unwrap();
        assert_eq!(parsed.synth_circuit.name, "empty");
    }
}
