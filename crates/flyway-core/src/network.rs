//! Transmission network types.
//!
//! A `TransmissionNetwork` is the immutable result of one inference
//! run. It is owned by the caller; a new run always produces a new
//! network object, never an update in place.

use crate::case::CaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed edge candidate between two confirmed cases.
///
/// Invariant: `source` was confirmed no later than `target`, and every
/// distance present passed its caller-supplied threshold; otherwise
/// the edge is never materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionLink {
    pub source_case_id: CaseId,
    pub target_case_id: CaseId,
    pub temporal_distance_days: f64,
    pub spatial_distance_km: f64,
    /// `None` when either case lacks a sequence.
    pub genetic_distance: Option<f64>,
    /// Combined plausibility score in [0, 1].
    pub likelihood: f64,
}

/// A weakly connected component of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub component_id: u32,
    pub case_ids: Vec<CaseId>,
    pub edge_count: usize,
}

impl Component {
    pub fn size(&self) -> usize {
        self.case_ids.len()
    }
}

/// A ranked index-case candidate: a plausible origin of its cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCase {
    pub case_id: CaseId,
    pub component_id: u32,
    /// Onward links out of this case.
    pub outbreak_size: usize,
    pub index_score: f64,
}

/// A ranked super-spreader candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Superspreader {
    pub case_id: CaseId,
    pub component_id: u32,
    pub outgoing_link_count: usize,
    /// Nodes transitively reachable within the configured horizon.
    pub downstream_reach: usize,
    pub superspreader_score: f64,
}

/// Aggregate graph metrics feeding pattern classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub largest_component_size: usize,
    pub average_in_degree: f64,
    /// Maximum spatial distance across materialized links, km.
    pub max_link_distance_km: f64,
    pub mean_link_distance_km: f64,
    /// Maximum temporal gap across materialized links, days.
    pub max_temporal_gap_days: f64,
}

/// Qualitative transmission pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    CommonSource,
    MultipleIntroductions,
    SustainedTransmission,
    Sporadic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographicFocus {
    Local,
    Regional,
    Widespread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPattern {
    Rapid,
    Moderate,
    Extended,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionIntensity {
    Low,
    Moderate,
    High,
}

/// Deterministic classification of the overall transmission pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAssessment {
    pub pattern_type: PatternType,
    pub geographic_focus: GeographicFocus,
    pub temporal_pattern: TemporalPattern,
    pub transmission_intensity: TransmissionIntensity,
    pub superspreading_evidence: bool,
}

/// Whether a run produced a real graph or hit the explicit empty
/// terminal state (fewer than two confirmed cases).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Inferred,
    Empty,
}

/// The aggregate graph for one analysis run. Immutable after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionNetwork {
    pub network_id: Uuid,
    pub kind: NetworkKind,
    pub inferred_at: DateTime<Utc>,
    pub nodes: Vec<CaseId>,
    pub edges: Vec<TransmissionLink>,
    pub components: Vec<Component>,
    pub index_cases: Vec<IndexCase>,
    pub superspreaders: Vec<Superspreader>,
    pub metrics: NetworkMetrics,
    pub assessment: PatternAssessment,
}

impl TransmissionNetwork {
    /// The explicit empty result for 0 or 1 confirmed cases.
    pub fn empty(nodes: Vec<CaseId>) -> Self {
        Self {
            network_id: Uuid::new_v4(),
            kind: NetworkKind::Empty,
            inferred_at: Utc::now(),
            metrics: NetworkMetrics {
                node_count: nodes.len(),
                ..NetworkMetrics::default()
            },
            nodes,
            edges: Vec::new(),
            components: Vec::new(),
            index_cases: Vec::new(),
            superspreaders: Vec::new(),
            assessment: PatternAssessment {
                pattern_type: PatternType::Sporadic,
                geographic_focus: GeographicFocus::Local,
                temporal_pattern: TemporalPattern::Unknown,
                transmission_intensity: TransmissionIntensity::Low,
                superspreading_evidence: false,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == NetworkKind::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_network_is_terminal_not_error() {
        let net = TransmissionNetwork::empty(vec![CaseId::new()]);
        assert!(net.is_empty());
        assert_eq!(net.metrics.node_count, 1);
        assert!(net.edges.is_empty());
        assert_eq!(net.assessment.pattern_type, PatternType::Sporadic);
    }

    #[test]
    fn network_serializes_with_snake_case_enums() {
        let net = TransmissionNetwork::empty(Vec::new());
        let json = serde_json::to_value(&net).unwrap();
        assert_eq!(json["kind"], "empty");
        assert_eq!(json["assessment"]["temporal_pattern"], "unknown");
    }
}
