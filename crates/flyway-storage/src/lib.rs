//! Persistence layer for the surveillance engine.
//!
//! Backends implement [`Storage`]; the bundled [`MemoryStorage`] keeps
//! everything in process and is the default for single-node
//! deployments and tests. Durable backends plug in behind the same
//! trait.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flyway_advisor::Recommendation;
use flyway_core::signal::DetectionSignal;
use flyway_core::surveillance::CellSurveillanceState;
use flyway_core::network::TransmissionNetwork;
use flyway_core::Result;
use flyway_sampling::AllocationPlan;
use uuid::Uuid;

pub use memory::MemoryStorage;

/// Trait for storage backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert or replace one cell's surveillance state.
    async fn upsert_cell_state(&self, state: &CellSurveillanceState) -> Result<()>;

    /// Load the states of every monitored cell.
    async fn load_cell_states(&self) -> Result<Vec<CellSurveillanceState>>;

    /// Append a detection signal to the immutable signal log.
    async fn append_signal(&self, signal: &DetectionSignal) -> Result<()>;

    /// Signals emitted at or after `since`, oldest first.
    async fn signals_since(&self, since: DateTime<Utc>) -> Result<Vec<DetectionSignal>>;

    /// Store an inferred network.
    async fn put_network(&self, network: &TransmissionNetwork) -> Result<()>;

    /// Fetch a stored network by id.
    async fn get_network(&self, network_id: Uuid) -> Result<Option<TransmissionNetwork>>;

    /// Store the recommendation derived from a network.
    async fn put_recommendation(&self, recommendation: &Recommendation) -> Result<()>;

    /// Fetch the recommendation for a network, if one was derived.
    async fn recommendation_for(&self, network_id: Uuid) -> Result<Option<Recommendation>>;

    /// Store one cycle's allocation plan.
    async fn put_allocation(&self, plan: &AllocationPlan) -> Result<()>;

    /// Fetch the plan for a specific cycle.
    async fn get_allocation(&self, cycle: u64) -> Result<Option<AllocationPlan>>;

    /// Fetch the most recent plan.
    async fn latest_allocation(&self) -> Result<Option<AllocationPlan>>;

    /// Health check.
    async fn health_check(&self) -> Result<()>;
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{MemoryStorage, Storage};
}
