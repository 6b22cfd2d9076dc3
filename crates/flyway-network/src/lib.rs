//! Transmission network inference.
//!
//! Given the confirmed case set, the engine proposes directed
//! source-to-target links wherever the temporal, spatial, and (when
//! sequenced) genetic signals all fall inside their thresholds, scores
//! each link's plausibility, and derives clusters, index-case and
//! super-spreader candidates, and a qualitative pattern assessment.
//!
//! Inference is a pure function of the case set: rerunning it on the
//! same input yields the same edges, and a run never mutates a
//! previously returned network.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod candidate;
pub mod distance;
pub mod engine;
pub mod graph;
pub mod pattern;

pub use engine::{CancelFlag, DecayKind, InferenceConfig, NetworkInference};
