//! # Flyway Core
//!
//! Canonical data model and shared infrastructure for the Flyway
//! surveillance engine.
//!
//! This crate provides:
//! - Case records and their lifecycle (`case`)
//! - Geographic partitioning and distance math (`geo`)
//! - Per-cell surveillance state (`surveillance`)
//! - Detection signal events (`signal`)
//! - Transmission network types (`network`)
//! - The error taxonomy (`error`) and configuration loading (`config`)
//!
//! All downstream crates (`flyway-detection`, `flyway-sampling`,
//! `flyway-network`, ...) depend on these types; none of them redefine
//! wire-visible structures.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod case;
pub mod config;
pub mod error;
pub mod geo;
pub mod network;
pub mod signal;
pub mod surveillance;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::case::{Case, CaseId, CaseStatus, GeneticSequence, SpeciesCategory, VirusSubtype};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::geo::{haversine_km, CellId, GeoLocation, GridPartition};
    pub use crate::network::{
        GeographicFocus, NetworkKind, PatternAssessment, PatternType, TemporalPattern,
        TransmissionLink, TransmissionNetwork,
    };
    pub use crate::signal::{BoundaryType, DetectionSignal, SignalStatus};
    pub use crate::surveillance::CellSurveillanceState;
}
