//! Case records: a single reported or confirmed incident.
//!
//! Cases are created on ingestion and immutable once confirmed.
//! Corrections never mutate in place: they create a new version with a
//! `supersedes` back-reference, preserving the auditability of
//! detection decisions already made from the old value.

use crate::geo::{CellId, GeoLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Globally unique, immutable case identifier.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(Uuid);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Suspected,
    Confirmed,
    RuledOut,
}

/// Common avian influenza virus subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirusSubtype {
    H5N1,
    H5N2,
    H5N8,
    H7N3,
    H7N9,
    H9N2,
    Other,
    Unknown,
}

/// Host species category for a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesCategory {
    DomesticPoultry,
    DomesticWaterfowl,
    WildWaterfowl,
    WildGallinaceous,
    WildOther,
    CaptiveWild,
    Other,
}

/// Genetic sequence attached to a lab-confirmed case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneticSequence {
    /// Nucleotide string over the IUPAC alphabet, uppercased.
    pub sequence: String,
    pub subtype: VirusSubtype,
}

/// A single reported/confirmed incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub case_id: CaseId,
    pub location: GeoLocation,
    /// Geographic partition cell derived from `location`.
    pub cell_id: CellId,
    pub report_time: DateTime<Utc>,
    /// Set on lab confirmation; `None` until then.
    pub confirm_time: Option<DateTime<Utc>>,
    pub status: CaseStatus,
    pub species_category: SpeciesCategory,
    /// Optional genetic sequence, present only for sequenced cases.
    pub sequence: Option<GeneticSequence>,
    /// Back-reference set when this record corrects an earlier version.
    pub supersedes: Option<CaseId>,
}

impl Case {
    /// Whether the case has been lab-confirmed. Only confirmed cases
    /// enter transmission network inference.
    pub fn is_confirmed(&self) -> bool {
        self.status == CaseStatus::Confirmed && self.confirm_time.is_some()
    }

    /// The confirmation timestamp, if confirmed.
    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        if self.status == CaseStatus::Confirmed {
            self.confirm_time
        } else {
            None
        }
    }

    /// Create a corrected version of this case. The original is left
    /// untouched; the returned record carries a fresh id and a
    /// `supersedes` back-reference.
    pub fn correct_with(&self, f: impl FnOnce(&mut Case)) -> Case {
        let mut corrected = self.clone();
        corrected.case_id = CaseId::new();
        corrected.supersedes = Some(self.case_id);
        f(&mut corrected);
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GridPartition;
    use chrono::TimeZone;

    fn sample_case() -> Case {
        let location = GeoLocation::new(42.0, -93.5).unwrap();
        let grid = GridPartition::default();
        Case {
            case_id: CaseId::new(),
            cell_id: grid.cell_for(location),
            location,
            report_time: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            confirm_time: Some(Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()),
            status: CaseStatus::Confirmed,
            species_category: SpeciesCategory::DomesticPoultry,
            sequence: None,
            supersedes: None,
        }
    }

    #[test]
    fn confirmed_requires_status_and_timestamp() {
        let mut case = sample_case();
        assert!(case.is_confirmed());

        case.confirm_time = None;
        assert!(!case.is_confirmed());

        case.confirm_time = Some(Utc::now());
        case.status = CaseStatus::Suspected;
        assert!(!case.is_confirmed());
        assert!(case.confirmed_at().is_none());
    }

    #[test]
    fn correction_creates_new_version() {
        let original = sample_case();
        let corrected = original.correct_with(|c| {
            c.species_category = SpeciesCategory::WildWaterfowl;
        });

        assert_ne!(corrected.case_id, original.case_id);
        assert_eq!(corrected.supersedes, Some(original.case_id));
        assert_eq!(corrected.species_category, SpeciesCategory::WildWaterfowl);
        // original untouched
        assert_eq!(original.species_category, SpeciesCategory::DomesticPoultry);
        assert!(original.supersedes.is_none());
    }

    #[test]
    fn case_round_trips_through_json() {
        let case = sample_case();
        let json = serde_json::to_string(&case).unwrap();
        let back: Case = serde_json::from_str(&json).unwrap();
        assert_eq!(back.case_id, case.case_id);
        assert_eq!(back.cell_id, case.cell_id);
        assert_eq!(back.status, case.status);
    }
}
