//! Adaptive allocation of the per-cycle surveillance budget.
//!
//! Each cell carries a Beta-Bernoulli posterior over "sampling here
//! yields detections". Once per cycle the allocator draws from every
//! posterior (Thompson sampling), ranks the draws, and apportions the
//! budget so that better-ranked cells get more effort while every
//! cell keeps a minimum floor whenever capacity allows.

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod allocator;
pub mod reward;

pub use allocator::{
    AllocationPlan, AllocatorConfig, CellAllocation, CoverageMode, ThompsonAllocator,
};
pub use reward::{detection_reward, update_posterior};
