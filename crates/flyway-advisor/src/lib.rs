//! Intervention advice.
//!
//! Maps an inferred transmission network onto prioritized
//! surveillance and control actions. The mapping is a fixed rule
//! table over the pattern
//! assessment, with escalations for wide geographic spread and rapid
//! case succession. Recommendations are advisory output for human
//! responders; nothing here feeds back into detection or inference.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod recommend;

pub use recommend::{
    advise, advise_with_signals, Action, ActionKind, Priority, Recommendation,
};
