//! Qualitative pattern classification.
//!
//! Purely a function of the already-computed graph shape; thresholds
//! follow the field heuristics used by the response advisor
//! downstream.

use flyway_core::network::{
    GeographicFocus, NetworkMetrics, PatternAssessment, PatternType, TemporalPattern,
    TransmissionIntensity,
};

/// Spatial spread above which an outbreak is no longer regional, km.
const WIDESPREAD_LINK_KM: f64 = 300.0;
const REGIONAL_LINK_KM: f64 = 100.0;
const REGIONAL_MEAN_KM: f64 = 50.0;

/// Temporal gaps separating rapid, moderate, and extended spread, days.
const RAPID_GAP_DAYS: f64 = 14.0;
const MODERATE_GAP_DAYS: f64 = 30.0;

/// Classify the transmission pattern.
///
/// `multi_component_count` counts clusters of two or more linked
/// cases; `star_dominance` is the share of all edges carried by the
/// single highest-out-degree node (zero when there are no edges).
pub fn classify(
    metrics: &NetworkMetrics,
    multi_component_count: usize,
    star_dominance: f64,
    superspreading_evidence: bool,
) -> PatternAssessment {
    let pattern_type = if multi_component_count >= 2 {
        PatternType::MultipleIntroductions
    } else if multi_component_count == 1 && star_dominance >= 0.5 {
        PatternType::CommonSource
    } else if (0.75..=1.25).contains(&metrics.average_in_degree) {
        PatternType::SustainedTransmission
    } else {
        PatternType::Sporadic
    };

    let geographic_focus = if metrics.edge_count == 0 {
        GeographicFocus::Local
    } else if metrics.max_link_distance_km > WIDESPREAD_LINK_KM {
        GeographicFocus::Widespread
    } else if metrics.max_link_distance_km > REGIONAL_LINK_KM
        || metrics.mean_link_distance_km > REGIONAL_MEAN_KM
    {
        GeographicFocus::Regional
    } else {
        GeographicFocus::Local
    };

    let temporal_pattern = if metrics.edge_count == 0 {
        TemporalPattern::Unknown
    } else if metrics.max_temporal_gap_days < RAPID_GAP_DAYS {
        TemporalPattern::Rapid
    } else if metrics.max_temporal_gap_days < MODERATE_GAP_DAYS {
        TemporalPattern::Moderate
    } else {
        TemporalPattern::Extended
    };

    let links_per_case = if metrics.node_count == 0 {
        0.0
    } else {
        metrics.edge_count as f64 / metrics.node_count as f64
    };
    let transmission_intensity = if links_per_case < 0.5 {
        TransmissionIntensity::Low
    } else if links_per_case < 1.0 {
        TransmissionIntensity::Moderate
    } else {
        TransmissionIntensity::High
    };

    PatternAssessment {
        pattern_type,
        geographic_focus,
        temporal_pattern,
        transmission_intensity,
        superspreading_evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(nodes: usize, edges: usize, avg_in: f64, max_km: f64, max_gap: f64) -> NetworkMetrics {
        NetworkMetrics {
            node_count: nodes,
            edge_count: edges,
            component_count: 1,
            largest_component_size: nodes,
            average_in_degree: avg_in,
            max_link_distance_km: max_km,
            mean_link_distance_km: max_km / 2.0,
            max_temporal_gap_days: max_gap,
        }
    }

    #[test]
    fn two_clusters_mean_multiple_introductions() {
        let a = classify(&metrics(50, 40, 0.8, 20.0, 5.0), 2, 0.2, false);
        assert_eq!(a.pattern_type, PatternType::MultipleIntroductions);
    }

    #[test]
    fn dominant_hub_means_common_source() {
        // one node carries most of the edges
        let a = classify(&metrics(3, 3, 1.0, 1.0, 2.0), 1, 0.67, true);
        assert_eq!(a.pattern_type, PatternType::CommonSource);
        assert!(a.superspreading_evidence);
    }

    #[test]
    fn chain_like_graph_means_sustained_transmission() {
        let a = classify(&metrics(10, 9, 0.9, 30.0, 10.0), 1, 0.11, false);
        assert_eq!(a.pattern_type, PatternType::SustainedTransmission);
    }

    #[test]
    fn disconnected_cases_are_sporadic() {
        let a = classify(&metrics(5, 0, 0.0, 0.0, 0.0), 0, 0.0, false);
        assert_eq!(a.pattern_type, PatternType::Sporadic);
        assert_eq!(a.temporal_pattern, TemporalPattern::Unknown);
        assert_eq!(a.geographic_focus, GeographicFocus::Local);
        assert_eq!(a.transmission_intensity, TransmissionIntensity::Low);
    }

    #[test]
    fn geographic_focus_scales_with_link_distance() {
        let local = classify(&metrics(4, 3, 0.75, 40.0, 5.0), 1, 0.3, false);
        assert_eq!(local.geographic_focus, GeographicFocus::Local);
        let regional = classify(&metrics(4, 3, 0.75, 150.0, 5.0), 1, 0.3, false);
        assert_eq!(regional.geographic_focus, GeographicFocus::Regional);
        let wide = classify(&metrics(4, 3, 0.75, 400.0, 5.0), 1, 0.3, false);
        assert_eq!(wide.geographic_focus, GeographicFocus::Widespread);
    }

    #[test]
    fn temporal_pattern_scales_with_gaps() {
        let rapid = classify(&metrics(4, 3, 0.75, 10.0, 3.0), 1, 0.3, false);
        assert_eq!(rapid.temporal_pattern, TemporalPattern::Rapid);
        let moderate = classify(&metrics(4, 3, 0.75, 10.0, 20.0), 1, 0.3, false);
        assert_eq!(moderate.temporal_pattern, TemporalPattern::Moderate);
        let extended = classify(&metrics(4, 3, 0.75, 10.0, 45.0), 1, 0.3, false);
        assert_eq!(extended.temporal_pattern, TemporalPattern::Extended);
    }
}
