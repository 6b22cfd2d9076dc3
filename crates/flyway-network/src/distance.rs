//! Pairwise distance measures between cases.

use chrono::{DateTime, Utc};
use flyway_core::case::Case;
use flyway_core::geo::haversine_km;

/// Normalized Hamming distance between two nucleotide strings.
///
/// Compared over the shared prefix (sequences from partial runs often
/// differ in length); the mismatch count is divided by the overlap
/// length. Returns `None` when either sequence is empty, since "no
/// data" must stay distinguishable from "identical".
pub fn normalized_hamming(a: &str, b: &str) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let overlap = a.len().min(b.len());
    let mismatches = a
        .bytes()
        .zip(b.bytes())
        .filter(|(x, y)| x != y)
        .count();
    Some(mismatches as f64 / overlap as f64)
}

/// Genetic distance between two cases, when both carry sequences.
pub fn genetic_distance(a: &Case, b: &Case) -> Option<f64> {
    let sa = a.sequence.as_ref()?;
    let sb = b.sequence.as_ref()?;
    normalized_hamming(&sa.sequence, &sb.sequence)
}

/// Spatial distance between two cases in kilometers.
pub fn spatial_distance_km(a: &Case, b: &Case) -> f64 {
    haversine_km(a.location, b.location)
}

/// Confirmation-time gap in fractional days, `later - earlier`.
pub fn temporal_gap_days(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / 86_400.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identical_sequences_have_zero_distance() {
        assert_eq!(normalized_hamming("ATCG", "ATCG"), Some(0.0));
    }

    #[test]
    fn distance_is_mismatch_fraction() {
        // one mismatch over four positions
        assert_eq!(normalized_hamming("ATCG", "ATCA"), Some(0.25));
        assert_eq!(normalized_hamming("AAAA", "TTTT"), Some(1.0));
    }

    #[test]
    fn truncated_sequences_compare_over_the_overlap() {
        let d = normalized_hamming("ATCGATCG", "ATCG").unwrap();
        assert_eq!(d, 0.0);
        let d = normalized_hamming("ATCGATCG", "ATCA").unwrap();
        assert_eq!(d, 0.25);
    }

    #[test]
    fn empty_sequence_is_no_data() {
        assert_eq!(normalized_hamming("", "ATCG"), None);
        assert_eq!(normalized_hamming("ATCG", ""), None);
    }

    #[test]
    fn temporal_gap_handles_fractional_days() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        assert!((temporal_gap_days(a, b) - 1.5).abs() < 1e-9);
    }
}
