//! Sequential outbreak detection.
//!
//! Each geographic cell runs its own open-ended hypothesis test
//! against a Poisson baseline. Three boundary families are supported:
//!
//! - [`sprt`]: Wald's sequential probability ratio test, the fastest
//!   to decide in either direction;
//! - [`group_sequential`]: alpha-spending boundaries (O'Brien-Fleming
//!   or Pocock) with a hard family-wise Type-I guarantee over the
//!   whole monitoring window;
//! - [`cusum`]: a standardized CUSUM chart for persistent small
//!   shifts, with no early dismissal.
//!
//! The per-look transition is the pure function [`engine::observe`];
//! [`engine::DetectionEngine`] drives it over all cells in a cycle.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod baseline;
pub mod cusum;
pub mod engine;
pub mod group_sequential;
pub mod sprt;
pub mod stats;

pub use baseline::{periods_from_batch, BaselineEstimator, BatchPeriods};
pub use engine::{observe, DetectionEngine, DetectorConfig};
