//! Error taxonomy for the synth engine's non-audio-thread APIs.
//!
//! Audio-thread code never returns `Result` during steady-state ticking; the
//! one synchronous fallible boundary on that side is [`crate::command::QueueFull`].
//! Everything else funnels through [`EngineError`].

use crate::port::{ParamId, PortId};
use crate::unit::UnitId;
use alloc::string::String;
use thiserror::Error;

/// Structural, allocation, and persistence failures (spec §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("connecting to input {dst_input} of unit {dst:?} would form a cycle")]
    CycleWouldForm { dst: UnitId, dst_input: PortId },

    #[error("input {dst_input} of unit {dst:?} already has a source")]
    AlreadyConnected { dst: UnitId, dst_input: PortId },

    #[error("unknown unit {0:?}")]
    UnknownUnit(UnitId),

    #[error("unknown port {port} on unit {unit:?}")]
    UnknownPort { unit: UnitId, port: PortId },

    #[error("unknown parameter {param} on unit {unit:?}")]
    UnknownParameter { unit: UnitId, param: ParamId },

    #[error("buffer length mismatch: expected {expected}, got {got}")]
    PortTypeMismatch { expected: usize, got: usize },

    #[error("command queue is full")]
    QueueFull,

    #[error("voice pool exhausted")]
    PoolExhausted,

    #[error("malformed preset JSON: {0}")]
    MalformedJson(String),

    #[error("preset references unknown class id {0:#010x}")]
    UnknownClassId(u32),

    #[error("bad preset: {0}")]
    BadPreset(String),
}

pub type Result<T> = core::result::Result<T, EngineError>;
