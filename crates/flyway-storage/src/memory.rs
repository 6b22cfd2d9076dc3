//! In-process storage backend.

use crate::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flyway_advisor::Recommendation;
use flyway_core::geo::CellId;
use flyway_core::network::TransmissionNetwork;
use flyway_core::signal::DetectionSignal;
use flyway_core::surveillance::CellSurveillanceState;
use flyway_core::{Error, Result};
use flyway_sampling::AllocationPlan;
use std::sync::RwLock;
use uuid::Uuid;

/// Storage backend holding everything in process memory.
///
/// Cell states, networks, and plans live in concurrent maps; the
/// signal log is an append-only vector behind a lock, preserving
/// emission order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cells: DashMap<CellId, CellSurveillanceState>,
    signals: RwLock<Vec<DetectionSignal>>,
    networks: DashMap<Uuid, TransmissionNetwork>,
    recommendations: DashMap<Uuid, Recommendation>,
    allocations: DashMap<u64, AllocationPlan>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> Error {
    Error::Storage(format!("{what} lock poisoned"))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_cell_state(&self, state: &CellSurveillanceState) -> Result<()> {
        self.cells.insert(state.cell_id.clone(), state.clone());
        Ok(())
    }

    async fn load_cell_states(&self) -> Result<Vec<CellSurveillanceState>> {
        let mut states: Vec<CellSurveillanceState> =
            self.cells.iter().map(|e| e.value().clone()).collect();
        states.sort_by(|a, b| a.cell_id.cmp(&b.cell_id));
        Ok(states)
    }

    async fn append_signal(&self, signal: &DetectionSignal) -> Result<()> {
        self.signals
            .write()
            .map_err(|_| poisoned("signal log"))?
            .push(signal.clone());
        Ok(())
    }

    async fn signals_since(&self, since: DateTime<Utc>) -> Result<Vec<DetectionSignal>> {
        let log = self.signals.read().map_err(|_| poisoned("signal log"))?;
        Ok(log
            .iter()
            .filter(|s| s.emitted_at >= since)
            .cloned()
            .collect())
    }

    async fn put_network(&self, network: &TransmissionNetwork) -> Result<()> {
        self.networks.insert(network.network_id, network.clone());
        Ok(())
    }

    async fn get_network(&self, network_id: Uuid) -> Result<Option<TransmissionNetwork>> {
        Ok(self.networks.get(&network_id).map(|e| e.value().clone()))
    }

    async fn put_recommendation(&self, recommendation: &Recommendation) -> Result<()> {
        self.recommendations
            .insert(recommendation.network_id, recommendation.clone());
        Ok(())
    }

    async fn recommendation_for(&self, network_id: Uuid) -> Result<Option<Recommendation>> {
        Ok(self
            .recommendations
            .get(&network_id)
            .map(|e| e.value().clone()))
    }

    async fn put_allocation(&self, plan: &AllocationPlan) -> Result<()> {
        self.allocations.insert(plan.cycle, plan.clone());
        Ok(())
    }

    async fn get_allocation(&self, cycle: u64) -> Result<Option<AllocationPlan>> {
        Ok(self.allocations.get(&cycle).map(|e| e.value().clone()))
    }

    async fn latest_allocation(&self) -> Result<Option<AllocationPlan>> {
        let latest = self
            .allocations
            .iter()
            .map(|e| *e.key())
            .max();
        Ok(latest.and_then(|cycle| self.allocations.get(&cycle).map(|e| e.value().clone())))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
