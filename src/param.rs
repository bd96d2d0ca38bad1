//! Parameter model: the three-accumulator modulation arithmetic of §4.F.
//!
//! A [`Parameter`] caches a `current` value recomputed once per tick from its
//! base value plus whatever `SET`/`ADD`/`SCALE` modulations were queued for
//! that tick. Accumulators reset to their identity (`0` for add, `1` for
//! scale, `None` for the override) immediately after the value is read.

use crate::port::ParamId;
use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Value domain of a parameter, used for normalization and UI binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParamKind {
    /// A bounded or unbounded real number.
    Numeric,
    /// Stored as 0.0 or 1.0.
    Bool,
    /// Stored as an integer index into `variants`, serialized by name (§9
    /// resolved open question) so presets survive enum reordering.
    Enum { variants: Vec<String> },
}

/// UI/control hint distinguishing how a numeric parameter should be displayed
/// and mapped from a normalized `[0,1]` knob position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamHint {
    Bounded,
    Unbounded,
    Frequency,
    Time,
}

/// Static description of a parameter, declared once at unit construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub hint: ParamHint,
}

impl ParamDef {
    pub fn numeric(id: ParamId, name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ParamKind::Numeric,
            min,
            max,
            default,
            hint: ParamHint::Bounded,
        }
    }

    pub fn with_hint(mut self, hint: ParamHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn boolean(id: ParamId, name: impl Into<String>, default: bool) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ParamKind::Bool,
            min: 0.0,
            max: 1.0,
            default: if default { 1.0 } else { 0.0 },
            hint: ParamHint::Bounded,
        }
    }

    pub fn enumerated(id: ParamId, name: impl Into<String>, variants: &[&str], default: usize) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ParamKind::Enum {
                variants: variants.iter().map(|s| String::from(*s)).collect(),
            },
            min: 0.0,
            max: (variants.len().saturating_sub(1)) as f64,
            default: default as f64,
            hint: ParamHint::Bounded,
        }
    }
}

/// A live parameter instance: the def plus the per-tick modulation state of
/// §4.F.
#[derive(Debug, Clone)]
pub struct Parameter {
    def: ParamDef,
    base: f64,
    add_accum: f64,
    scale_accum: f64,
    set_override: Option<f64>,
    current: f64,
}

impl Parameter {
    pub fn new(def: ParamDef) -> Self {
        let base = def.default;
        Self {
            def,
            base,
            add_accum: 0.0,
            scale_accum: 1.0,
            set_override: None,
            current: base,
        }
    }

    pub fn def(&self) -> &ParamDef {
        &self.def
    }

    /// Effective value for the tick just processed.
    #[inline]
    pub fn value(&self) -> f64 {
        self.current
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    /// Direct (non-modulated) set of the base/knob value, as done by
    /// `ModifyParam` command handling.
    pub fn set_base(&mut self, value: f64) {
        self.base = value.clamp(self.def.min, self.def.max);
    }

    pub fn normalized(&self) -> f64 {
        if (self.def.max - self.def.min).abs() < f64::EPSILON {
            0.0
        } else {
            (self.base - self.def.min) / (self.def.max - self.def.min)
        }
    }

    /// Sets the base value from a normalized `[0,1]` position, as done by
    /// `ModifyParamNorm` command handling.
    pub fn set_normalized(&mut self, norm: f64) {
        let norm = norm.clamp(0.0, 1.0);
        self.base = self.def.min + norm * (self.def.max - self.def.min);
    }

    /// `SET`: overwrite the effective value for this tick, replacing any
    /// prior `SET` this tick.
    pub fn modulate_set(&mut self, value: f64) {
        self.set_override = Some(value);
    }

    /// `ADD`: accumulate into the tick's additive modulation sum.
    pub fn modulate_add(&mut self, value: f64) {
        self.add_accum += value;
    }

    /// `SCALE`: accumulate into the tick's multiplicative modulation
    /// product.
    pub fn modulate_scale(&mut self, value: f64) {
        self.scale_accum *= value;
    }

    /// Recompute `current` from this tick's accumulators, per §4.F:
    /// `current = SET.unwrap_or(base + ADD) * SCALE`.
    pub fn recompute(&mut self) {
        let pre_scale = self.set_override.unwrap_or(self.base + self.add_accum);
        self.current = pre_scale * self.scale_accum;
        if matches!(self.def.hint, ParamHint::Bounded) {
            self.current = self.current.clamp(self.def.min, self.def.max);
        }
    }

    /// Reset the per-tick accumulators to their identities. Called by the
    /// owning Circuit immediately after `recompute` has cached `current`
    /// for this tick (invariant 2 of §8: accumulators are zero after tick).
    pub fn reset_modulation(&mut self) {
        self.add_accum = 0.0;
        self.scale_accum = 1.0;
        self.set_override = None;
    }

    pub fn is_modulation_clean(&self) -> bool {
        self.add_accum == 0.0 && self.scale_accum == 1.0 && self.set_override.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_value_round_trips() {
        let p = Parameter::new(ParamDef::numeric(0, "gain", 0.0, 2.0, 1.0));
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn add_then_scale_then_reset() {
        let mut p = Parameter::new(ParamDef::numeric(0, "cutoff", 0.0, 10.0, 2.0));
        p.modulate_add(3.0);
        p.modulate_scale(2.0);
        p.recompute();
        assert_eq!(p.value(), 10.0); // (2+3)*2 = 10, clamped to max 10

        p.reset_modulation();
        assert!(p.is_modulation_clean());
        p.recompute();
        assert_eq!(p.value(), 2.0);
    }

    #[test]
    fn set_override_wins_over_add() {
        let mut p = Parameter::new(ParamDef::numeric(0, "x", -10.0, 10.0, 0.0));
        p.modulate_add(100.0);
        p.modulate_set(5.0);
        p.recompute();
        assert_eq!(p.value(), 5.0);
    }

    #[test]
    fn normalized_round_trip() {
        let mut p = Parameter::new(ParamDef::numeric(0, "freq", 20.0, 20020.0, 20.0));
        p.set_normalized(0.5);
        assert!((p.base() - 10020.0).abs() < 1e-9);
        assert!((p.normalized() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unbounded_hint_skips_clamp() {
        let mut p = Parameter::new(
            ParamDef::numeric(0, "phase", -1.0, 1.0, 0.0).with_hint(ParamHint::Unbounded),
        );
        p.modulate_add(50.0);
        p.recompute();
        assert_eq!(p.value(), 50.0);
    }
}
