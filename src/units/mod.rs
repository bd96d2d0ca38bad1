//! Built-in unit kinds (§4.A): `Oscillator`, `Envelope`, `Filter`, `Math`,
//! `Delay`, `Midi`, `Converter`, `Meta`. Each submodule holds the kinds named
//! in the same bucket of §4.A's polymorphism list. `Meta::Circuit` is
//! [`crate::circuit::Circuit`] itself (a Circuit is a Unit); `Meta::Input`
//! and `Meta::Output` live in [`meta`].

pub mod converter;
pub mod delay;
pub mod envelope;
pub mod filter;
pub mod math;
pub mod meta;
pub mod midi;
pub mod oscillator;

pub use converter::{FreqToPitch, PitchToFreq};
pub use delay::{OneSampleDelay, VariableDelay};
pub use envelope::Adsr;
pub use filter::{DcRemover, Follower, LadderA, LadderB, OnePoleLp, Svf, TrapSvf};
pub use math::{Constant, Gain, Lerp, Pan, Quantizer, Rectifier, Summer, Switch, Tanh};
pub use meta::{InputUnit, OutputUnit};
pub use midi::{MidiCc, MidiGate, MidiPitch, MidiVelocity, MidiVoiceIndex};
pub use oscillator::{BasicOscillator, FormantOscillator, NoiseOscillator, VosimOscillator};
