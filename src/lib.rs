//! # A polyphonic modular synthesis engine.
//!
//! Users assemble a directed graph of processing nodes ([`units`]: oscillators,
//! envelopes, filters, mixers, math) into a [`circuit::Circuit`]; the engine
//! replicates that circuit across a pool of voices ([`voice`]), each
//! responding to its own note, and sums voice outputs into a stereo audio
//! stream. The engine runs inside a real-time audio host callback
//! (buffer-based, fixed sample rate) and accepts MIDI input concurrently
//! through a lock-free command channel ([`command`]).
//!
//! ## Component layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Synth (engine)                              │  host-facing surface
//! │  - note_on/note_off/cc/pitch_bend             │  "the plugin's brain"
//! │  - process(out_left, out_right)               │
//! ├──────────────────────────────────────────────┤
//! │  VoiceManager                                 │  polyphony
//! │  - allocation, stealing, CC/bend fan-out      │
//! ├──────────────────────────────────────────────┤
//! │  Circuit (a Unit containing Units)            │  dataflow scheduler
//! │  - topological order, feedback-edge delay     │
//! ├──────────────────────────────────────────────┤
//! │  Unit (oscillator, filter, envelope, ...)     │  DSP leaves
//! │  - typed ports, three-accumulator parameters  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Signal conventions (Eurorack-inspired)
//!
//! | Signal Type | Range | Description |
//! |-------------|-------|-------------|
//! | Audio | ±5V | AC-coupled audio signals |
//! | CV Unipolar | 0-10V | Filter cutoff, LFO rate |
//! | CV Bipolar | ±5V | Pan, FM depth |
//! | V/Oct | ±10V | Pitch (0V = C4 = 261.63 Hz) |
//! | Gate | 0V or 5V | Sustained on/off |
//! | Trigger | 0V or 5V | Brief pulse (1-10ms) |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use voxwright::prelude::*;
//!
//! let config = EngineConfig::default();
//! let mut synth = Synth::new(config);
//!
//! synth.note_on(wmidi::Note::C4, wmidi::U7::from_u8_lossy(100));
//!
//! let mut left = [0.0f64; 128];
//! let mut right = [0.0f64; 128];
//! synth.process(&mut left, &mut right);
//! ```

extern crate alloc;

pub mod circuit;
pub mod command;
pub mod engine;
pub mod error;
pub mod factory;
pub mod oscilloscope;
pub mod param;
pub mod persistence;
pub mod port;
pub mod unit;
pub mod units;
pub mod voice;

mod rng;

/// Convenient glob import for assembling and driving a [`engine::Synth`].
pub mod prelude {
    pub use crate::circuit::{Circuit, Connection, EdgeKind};
    pub use crate::command::{Command, CommandQueue, Notification};
    pub use crate::engine::{EngineConfig, Synth};
    pub use crate::error::{EngineError, Result};
    pub use crate::factory::{builtin_factory, UnitFactory};
    pub use crate::oscilloscope::Oscilloscope;
    pub use crate::param::{ParamDef, ParamHint, ParamKind, Parameter};
    pub use crate::persistence::{CircuitPreset, Preset};
    pub use crate::port::{InputPort, OutputPort, ParamId, PortDef, PortId, PortSpec, SignalKind};
    pub use crate::unit::{Unit, UnitContext, UnitId, UnitImpl};
    pub use crate::units::*;
    pub use crate::voice::{Voice, VoiceManager};

    pub use wmidi;
}
