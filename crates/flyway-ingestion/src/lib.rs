//! Case report ingestion.
//!
//! Upstream reporting systems (state labs, field apps, batch files)
//! are abstracted behind the [`feed::CaseFeed`] trait; every raw
//! report passes through [`normalize::CaseNormalizer`], which owns all
//! validation and the derivation of grid cells, before anything
//! reaches detection or storage.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod feed;
pub mod normalize;

pub use feed::{CaseFeed, InMemoryFeed, RawCaseReport};
pub use normalize::CaseNormalizer;
