//! Feed abstraction over upstream case reporting systems.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flyway_core::case::{CaseStatus, SpeciesCategory, VirusSubtype};
use flyway_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A case report as received from an upstream system, before any
/// validation. Field names follow the reporting wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCaseReport {
    /// Upstream identifier; a fresh id is minted when absent.
    pub case_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub report_time: DateTime<Utc>,
    pub confirm_time: Option<DateTime<Utc>>,
    pub status: CaseStatus,
    pub species_category: SpeciesCategory,
    /// Raw nucleotide string; case-insensitive on the wire.
    pub sequence: Option<String>,
    pub subtype: Option<VirusSubtype>,
    /// Id of an earlier report this one corrects.
    pub supersedes: Option<Uuid>,
}

/// A source of raw case reports.
///
/// Implementations poll an upstream system and drain whatever arrived
/// since the previous poll. Feeds do not validate; that is the
/// normalizer's job.
#[async_trait]
pub trait CaseFeed: Send + Sync {
    /// Stable feed name for logs and metrics.
    fn name(&self) -> &str;

    /// Drain reports accumulated since the last poll.
    async fn poll(&mut self) -> Result<Vec<RawCaseReport>>;
}

/// Feed backed by a pre-loaded queue. Used in tests and for replaying
/// exported report batches.
#[derive(Debug, Default)]
pub struct InMemoryFeed {
    name: String,
    queue: VecDeque<RawCaseReport>,
}

impl InMemoryFeed {
    pub fn new(name: impl Into<String>, reports: Vec<RawCaseReport>) -> Self {
        Self {
            name: name.into(),
            queue: reports.into(),
        }
    }

    pub fn push(&mut self, report: RawCaseReport) {
        self.queue.push_back(report);
    }
}

#[async_trait]
impl CaseFeed for InMemoryFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Result<Vec<RawCaseReport>> {
        Ok(self.queue.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RawCaseReport {
        RawCaseReport {
            case_id: None,
            latitude: 42.0,
            longitude: -93.0,
            report_time: Utc::now(),
            confirm_time: None,
            status: CaseStatus::Suspected,
            species_category: SpeciesCategory::WildWaterfowl,
            sequence: None,
            subtype: None,
            supersedes: None,
        }
    }

    #[tokio::test]
    async fn in_memory_feed_drains_on_poll() {
        let mut feed = InMemoryFeed::new("replay", vec![report(), report()]);
        assert_eq!(feed.poll().await.unwrap().len(), 2);
        assert!(feed.poll().await.unwrap().is_empty());

        feed.push(report());
        assert_eq!(feed.poll().await.unwrap().len(), 1);
    }

    #[test]
    fn raw_report_deserializes_from_wire_json() {
        let json = r#"{
            "case_id": null,
            "latitude": 42.1,
            "longitude": -93.4,
            "report_time": "2025-03-01T08:00:00Z",
            "confirm_time": "2025-03-03T12:00:00Z",
            "status": "confirmed",
            "species_category": "domestic_poultry",
            "sequence": "atcgatcg",
            "subtype": "h5n1",
            "supersedes": null
        }"#;
        let report: RawCaseReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.status, CaseStatus::Confirmed);
        assert_eq!(report.subtype, Some(VirusSubtype::H5N1));
    }
}
