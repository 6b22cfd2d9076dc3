//! Validation and normalization of raw reports.

use crate::feed::RawCaseReport;
use flyway_core::case::{Case, CaseId, CaseStatus, GeneticSequence, VirusSubtype};
use flyway_core::geo::{GeoLocation, GridPartition};
use flyway_core::{Error, Result};
use tracing::debug;

/// IUPAC nucleotide codes accepted in sequences.
const IUPAC: &[u8] = b"ACGTURYSWKMBDHVN";

/// Turns raw reports into canonical cases.
///
/// All validation lives here: coordinate ranges, status/timestamp
/// consistency, and sequence alphabet. The normalizer also derives the
/// grid cell, so nothing downstream ever re-derives it differently.
#[derive(Debug, Clone)]
pub struct CaseNormalizer {
    grid: GridPartition,
}

impl CaseNormalizer {
    pub fn new(grid: GridPartition) -> Self {
        Self { grid }
    }

    pub fn normalize(&self, raw: RawCaseReport) -> Result<Case> {
        let location = GeoLocation::new(raw.latitude, raw.longitude)?;

        if raw.status == CaseStatus::Confirmed && raw.confirm_time.is_none() {
            return Err(Error::InvalidCase(
                "confirmed report without a confirmation time".to_string(),
            ));
        }
        if let Some(confirm) = raw.confirm_time {
            if confirm < raw.report_time {
                return Err(Error::InvalidCase(format!(
                    "confirmation {confirm} precedes report {}",
                    raw.report_time
                )));
            }
        }

        let sequence = match raw.sequence {
            Some(s) if !s.trim().is_empty() => {
                let upper = s.trim().to_ascii_uppercase();
                if let Some(bad) = upper.bytes().find(|b| !IUPAC.contains(b)) {
                    return Err(Error::InvalidCase(format!(
                        "sequence contains non-IUPAC byte 0x{bad:02x}"
                    )));
                }
                Some(GeneticSequence {
                    sequence: upper,
                    subtype: raw.subtype.unwrap_or(VirusSubtype::Unknown),
                })
            }
            _ => None,
        };

        let case = Case {
            case_id: raw.case_id.map(CaseId::from_uuid).unwrap_or_default(),
            cell_id: self.grid.cell_for(location),
            location,
            report_time: raw.report_time,
            confirm_time: raw.confirm_time,
            status: raw.status,
            species_category: raw.species_category,
            sequence,
            supersedes: raw.supersedes.map(CaseId::from_uuid),
        };
        debug!(case_id = %case.case_id, cell_id = %case.cell_id, "report normalized");
        metrics::counter!("flyway_ingestion_cases_total").increment(1);
        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use flyway_core::case::SpeciesCategory;

    fn normalizer() -> CaseNormalizer {
        CaseNormalizer::new(GridPartition::default())
    }

    fn raw() -> RawCaseReport {
        let now = Utc::now();
        RawCaseReport {
            case_id: None,
            latitude: 42.0,
            longitude: -93.0,
            report_time: now - Duration::days(2),
            confirm_time: Some(now),
            status: CaseStatus::Confirmed,
            species_category: SpeciesCategory::DomesticPoultry,
            sequence: Some("atcgatcg".to_string()),
            subtype: Some(VirusSubtype::H5N1),
            supersedes: None,
        }
    }

    #[test]
    fn normalization_derives_cell_and_uppercases_sequence() {
        let case = normalizer().normalize(raw()).unwrap();
        assert!(case.is_confirmed());
        assert_eq!(case.cell_id, GridPartition::default().cell_for(case.location));
        let seq = case.sequence.unwrap();
        assert_eq!(seq.sequence, "ATCGATCG");
        assert_eq!(seq.subtype, VirusSubtype::H5N1);
    }

    #[test]
    fn confirmed_without_timestamp_is_rejected() {
        let mut report = raw();
        report.confirm_time = None;
        let err = normalizer().normalize(report).unwrap_err();
        assert!(matches!(err, Error::InvalidCase(_)));
    }

    #[test]
    fn confirmation_before_report_is_rejected() {
        let mut report = raw();
        report.confirm_time = Some(report.report_time - Duration::days(1));
        assert!(normalizer().normalize(report).is_err());
    }

    #[test]
    fn bad_coordinates_are_rejected() {
        let mut report = raw();
        report.latitude = 95.0;
        assert!(normalizer().normalize(report).is_err());
    }

    #[test]
    fn non_iupac_sequence_is_rejected() {
        let mut report = raw();
        report.sequence = Some("ATCGX9".to_string());
        assert!(normalizer().normalize(report).is_err());
    }

    #[test]
    fn blank_sequence_becomes_none() {
        let mut report = raw();
        report.sequence = Some("   ".to_string());
        let case = normalizer().normalize(report).unwrap();
        assert!(case.sequence.is_none());
    }

    #[test]
    fn missing_subtype_defaults_to_unknown() {
        let mut report = raw();
        report.subtype = None;
        let case = normalizer().normalize(report).unwrap();
        assert_eq!(case.sequence.unwrap().subtype, VirusSubtype::Unknown);
    }

    #[test]
    fn supersedes_reference_is_preserved() {
        let prior = uuid::Uuid::new_v4();
        let mut report = raw();
        report.supersedes = Some(prior);
        let case = normalizer().normalize(report).unwrap();
        assert_eq!(case.supersedes, Some(CaseId::from_uuid(prior)));
    }
}
