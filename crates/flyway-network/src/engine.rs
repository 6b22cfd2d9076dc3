//! The inference pipeline.
//!
//! Stages: select confirmed cases, generate candidate pairs, apply the
//! conjunctive threshold filter and score surviving links, then derive
//! components, index cases, super-spreaders, metrics, and the pattern
//! assessment. A cooperative cancellation flag is checked between
//! stages; a cancelled run returns an error and leaks no partial
//! state.

use crate::candidate;
use crate::distance;
use crate::graph::{Adjacency, DisjointSet};
use crate::pattern;
use chrono::{DateTime, Utc};
use flyway_core::case::{Case, CaseId};
use flyway_core::config::InferenceSection;
use flyway_core::network::{
    Component, IndexCase, NetworkKind, NetworkMetrics, Superspreader, TransmissionLink,
    TransmissionNetwork,
};
use flyway_core::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared cooperative cancellation flag for long inference runs.
pub type CancelFlag = Arc<AtomicBool>;

/// Shape of the within-threshold likelihood decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayKind {
    /// `1 - d / threshold`.
    Linear,
    /// `exp(-3 d / threshold)`, roughly 0.05 at the threshold.
    Exponential,
}

/// Runtime inference settings.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub temporal_window_days: f64,
    pub spatial_threshold_km: f64,
    pub genetic_threshold: f64,
    pub temporal_weight: f64,
    pub spatial_weight: f64,
    pub genetic_weight: f64,
    pub decay: DecayKind,
    pub superspreader_multiple: f64,
    pub reach_horizon: usize,
    pub bucket_activation_threshold: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            temporal_window_days: 30.0,
            spatial_threshold_km: 100.0,
            genetic_threshold: 0.05,
            temporal_weight: 0.3,
            spatial_weight: 0.3,
            genetic_weight: 0.4,
            decay: DecayKind::Linear,
            superspreader_multiple: 2.0,
            reach_horizon: 4,
            bucket_activation_threshold: 256,
        }
    }
}

impl InferenceConfig {
    pub fn from_section(section: &InferenceSection) -> Result<Self> {
        let decay = match section.decay.as_str() {
            "linear" => DecayKind::Linear,
            "exponential" => DecayKind::Exponential,
            other => {
                return Err(Error::ThresholdConfiguration(format!(
                    "unknown decay shape '{other}'"
                )))
            }
        };
        let weights = [
            section.temporal_weight,
            section.spatial_weight,
            section.genetic_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
            || section.temporal_weight + section.spatial_weight <= 0.0
        {
            return Err(Error::ThresholdConfiguration(format!(
                "likelihood weights must be non-negative with a positive temporal+spatial sum, got {weights:?}"
            )));
        }
        validate_thresholds(
            section.temporal_window_days,
            section.spatial_threshold_km,
            section.genetic_threshold,
        )?;
        Ok(Self {
            temporal_window_days: section.temporal_window_days,
            spatial_threshold_km: section.spatial_threshold_km,
            genetic_threshold: section.genetic_threshold,
            temporal_weight: section.temporal_weight,
            spatial_weight: section.spatial_weight,
            genetic_weight: section.genetic_weight,
            decay,
            superspreader_multiple: section.superspreader_multiple,
            reach_horizon: section.reach_horizon,
            bucket_activation_threshold: section.bucket_activation_threshold,
        })
    }

    /// Derive a per-run configuration with caller-supplied thresholds;
    /// whichever are omitted keep this configuration's values.
    pub fn with_thresholds(
        &self,
        temporal_window_days: Option<f64>,
        spatial_threshold_km: Option<f64>,
        genetic_threshold: Option<f64>,
    ) -> Result<Self> {
        let mut config = self.clone();
        if let Some(days) = temporal_window_days {
            config.temporal_window_days = days;
        }
        if let Some(km) = spatial_threshold_km {
            config.spatial_threshold_km = km;
        }
        if let Some(distance) = genetic_threshold {
            config.genetic_threshold = distance;
        }
        validate_thresholds(
            config.temporal_window_days,
            config.spatial_threshold_km,
            config.genetic_threshold,
        )?;
        Ok(config)
    }
}

fn validate_thresholds(
    temporal_window_days: f64,
    spatial_threshold_km: f64,
    genetic_threshold: f64,
) -> Result<()> {
    for (name, value) in [
        ("temporal_window_days", temporal_window_days),
        ("spatial_threshold_km", spatial_threshold_km),
        ("genetic_threshold", genetic_threshold),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::ThresholdConfiguration(format!(
                "{name} must be finite and non-negative, got {value}"
            )));
        }
    }
    Ok(())
}

/// Days after the first confirmation during which an early case keeps
/// extra index-candidate priority.
const INDEX_PRIORITY_SPAN_DAYS: f64 = 30.0;

/// Transmission network inference over a case set.
#[derive(Debug, Clone)]
pub struct NetworkInference {
    config: InferenceConfig,
}

impl NetworkInference {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Infer a network without a cancellation path.
    pub fn infer(&self, cases: &[Case]) -> Result<TransmissionNetwork> {
        self.infer_cancellable(cases, &AtomicBool::new(false))
    }

    /// Infer a network, aborting with an error if `cancel` is raised
    /// between stages. The aborted run exposes no partial result.
    pub fn infer_cancellable(
        &self,
        cases: &[Case],
        cancel: &AtomicBool,
    ) -> Result<TransmissionNetwork> {
        let run_id = Uuid::new_v4();
        let check = |stage: &str| -> Result<()> {
            if cancel.load(Ordering::Relaxed) {
                debug!(%run_id, stage, "inference run cancelled");
                return Err(Error::StaleInput { run_id });
            }
            Ok(())
        };

        let sorted = select_confirmed(cases);
        if sorted.len() < 2 {
            let nodes = sorted.iter().map(|c| c.case_id).collect();
            return Ok(TransmissionNetwork::empty(nodes));
        }
        let times: Vec<DateTime<Utc>> = sorted
            .iter()
            .filter_map(|c| c.confirmed_at())
            .collect();
        check("candidates")?;

        let pairs = if sorted.len() > self.config.bucket_activation_threshold {
            candidate::bucketed_pairs(
                &sorted,
                &times,
                self.config.temporal_window_days,
                self.config.spatial_threshold_km,
            )
        } else {
            candidate::naive_pairs(&times, self.config.temporal_window_days)
        };

        let mut edges: Vec<TransmissionLink> = Vec::new();
        let mut edge_indices: Vec<(usize, usize)> = Vec::new();
        for (i, j) in pairs {
            if let Some(link) = self.link_for(&sorted[i], &sorted[j], times[j] - times[i]) {
                edges.push(link);
                edge_indices.push((i, j));
            }
        }
        check("graph analysis")?;

        let mut ds = DisjointSet::new(sorted.len());
        for &(i, j) in &edge_indices {
            ds.union(i, j);
        }
        let adjacency = Adjacency::from_edges(&edge_indices);

        let mut components = Vec::new();
        let mut index_cases = Vec::new();
        let mut superspreaders = Vec::new();
        for group in ds.components(sorted.len()) {
            if group.len() < 2 {
                continue;
            }
            let component_id = components.len() as u32;
            let group_set: HashSet<usize> = group.iter().copied().collect();
            let component_edges = edge_indices
                .iter()
                .filter(|(i, _)| group_set.contains(i))
                .count();
            let mean_out_degree = component_edges as f64 / group.len() as f64;
            // priority decays from this component's own outbreak start,
            // not the globally earliest confirmation
            let first_confirm = group
                .iter()
                .map(|&n| times[n])
                .min()
                .unwrap_or(times[0]);

            for &node in &group {
                let out = adjacency.out_degree(node);
                let inc = adjacency.in_degree(node);
                if inc == 0 && out > 0 {
                    let days_in = distance::temporal_gap_days(first_confirm, times[node]);
                    let priority = (1.0 - days_in / INDEX_PRIORITY_SPAN_DAYS).max(0.1);
                    index_cases.push(IndexCase {
                        case_id: sorted[node].case_id,
                        component_id,
                        outbreak_size: out,
                        index_score: out as f64 * 0.7 + priority * 0.3,
                    });
                }
                if out as f64 > self.config.superspreader_multiple * mean_out_degree {
                    let reach = adjacency.downstream_reach(node, self.config.reach_horizon);
                    superspreaders.push(Superspreader {
                        case_id: sorted[node].case_id,
                        component_id,
                        outgoing_link_count: out,
                        downstream_reach: reach,
                        superspreader_score: 0.7 * out as f64 + 0.3 * reach as f64,
                    });
                }
            }

            components.push(Component {
                component_id,
                case_ids: group.iter().map(|&n| sorted[n].case_id).collect(),
                edge_count: component_edges,
            });
        }
        index_cases.sort_by(|a, b| {
            b.index_score
                .total_cmp(&a.index_score)
                .then_with(|| a.case_id.cmp(&b.case_id))
        });
        superspreaders.sort_by(|a, b| {
            b.superspreader_score
                .total_cmp(&a.superspreader_score)
                .then_with(|| a.case_id.cmp(&b.case_id))
        });
        check("assessment")?;

        let metrics = network_metrics(&sorted, &edges, &components);
        let star_dominance = if edges.is_empty() {
            0.0
        } else {
            let max_out = (0..sorted.len())
                .map(|n| adjacency.out_degree(n))
                .max()
                .unwrap_or(0);
            max_out as f64 / edges.len() as f64
        };
        let assessment = pattern::classify(
            &metrics,
            components.len(),
            star_dominance,
            !superspreaders.is_empty(),
        );

        info!(
            %run_id,
            nodes = metrics.node_count,
            edges = metrics.edge_count,
            components = metrics.component_count,
            pattern = ?assessment.pattern_type,
            "transmission network inferred"
        );
        metrics::counter!("flyway_network_inferences_total").increment(1);
        metrics::gauge!("flyway_network_last_edge_count").set(metrics.edge_count as f64);

        Ok(TransmissionNetwork {
            network_id: run_id,
            kind: NetworkKind::Inferred,
            inferred_at: Utc::now(),
            nodes: sorted.iter().map(|c| c.case_id).collect(),
            edges,
            components,
            index_cases,
            superspreaders,
            metrics,
            assessment,
        })
    }

    /// Apply the conjunctive filter to one forward-in-time pair and
    /// score the surviving link.
    fn link_for(
        &self,
        source: &Case,
        target: &Case,
        gap: chrono::Duration,
    ) -> Option<TransmissionLink> {
        let temporal = gap.num_seconds() as f64 / 86_400.0;
        if temporal > self.config.temporal_window_days {
            return None;
        }
        let spatial = distance::spatial_distance_km(source, target);
        if spatial > self.config.spatial_threshold_km {
            return None;
        }
        let genetic = distance::genetic_distance(source, target);
        if let Some(g) = genetic {
            if g > self.config.genetic_threshold {
                return None;
            }
        }

        let dt = self.decay(temporal, self.config.temporal_window_days);
        let dsp = self.decay(spatial, self.config.spatial_threshold_km);
        let likelihood = match genetic {
            Some(g) => {
                let dg = self.decay(g, self.config.genetic_threshold);
                let sum = self.config.temporal_weight
                    + self.config.spatial_weight
                    + self.config.genetic_weight;
                (self.config.temporal_weight * dt
                    + self.config.spatial_weight * dsp
                    + self.config.genetic_weight * dg)
                    / sum
            }
            None => {
                let sum = self.config.temporal_weight + self.config.spatial_weight;
                (self.config.temporal_weight * dt + self.config.spatial_weight * dsp) / sum
            }
        };

        Some(TransmissionLink {
            source_case_id: source.case_id,
            target_case_id: target.case_id,
            temporal_distance_days: temporal,
            spatial_distance_km: spatial,
            genetic_distance: genetic,
            likelihood: likelihood.clamp(0.0, 1.0),
        })
    }

    fn decay(&self, d: f64, threshold: f64) -> f64 {
        if threshold <= 0.0 {
            return if d <= 0.0 { 1.0 } else { 0.0 };
        }
        match self.config.decay {
            DecayKind::Linear => (1.0 - d / threshold).clamp(0.0, 1.0),
            DecayKind::Exponential => (-3.0 * d / threshold).exp(),
        }
    }
}

/// Confirmed, non-superseded cases sorted by confirmation time with
/// ties broken on case id.
fn select_confirmed(cases: &[Case]) -> Vec<Case> {
    let superseded: HashSet<CaseId> = cases.iter().filter_map(|c| c.supersedes).collect();
    let mut selected: Vec<Case> = cases
        .iter()
        .filter(|c| c.is_confirmed() && !superseded.contains(&c.case_id))
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        a.confirm_time
            .cmp(&b.confirm_time)
            .then_with(|| a.case_id.cmp(&b.case_id))
    });
    selected
}

fn network_metrics(
    sorted: &[Case],
    edges: &[TransmissionLink],
    components: &[Component],
) -> NetworkMetrics {
    let node_count = sorted.len();
    let edge_count = edges.len();
    let max_link_distance_km = edges
        .iter()
        .map(|e| e.spatial_distance_km)
        .fold(0.0f64, f64::max);
    let mean_link_distance_km = if edge_count == 0 {
        0.0
    } else {
        edges.iter().map(|e| e.spatial_distance_km).sum::<f64>() / edge_count as f64
    };
    let max_temporal_gap_days = edges
        .iter()
        .map(|e| e.temporal_distance_days)
        .fold(0.0f64, f64::max);
    NetworkMetrics {
        node_count,
        edge_count,
        component_count: components.len(),
        largest_component_size: components
            .iter()
            .map(Component::size)
            .max()
            .unwrap_or(usize::from(node_count > 0)),
        average_in_degree: if node_count == 0 {
            0.0
        } else {
            edge_count as f64 / node_count as f64
        },
        max_link_distance_km,
        mean_link_distance_km,
        max_temporal_gap_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flyway_core::config::InferenceSection;

    #[test]
    fn linear_decay_hits_zero_at_threshold() {
        let engine = NetworkInference::new(InferenceConfig::default());
        assert_eq!(engine.decay(0.0, 100.0), 1.0);
        assert_eq!(engine.decay(100.0, 100.0), 0.0);
        assert!((engine.decay(50.0, 100.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn exponential_decay_stays_positive() {
        let engine = NetworkInference::new(InferenceConfig {
            decay: DecayKind::Exponential,
            ..InferenceConfig::default()
        });
        let at_threshold = engine.decay(100.0, 100.0);
        assert!(at_threshold > 0.0 && at_threshold < 0.06);
    }

    #[test]
    fn unknown_decay_name_is_rejected() {
        let section = InferenceSection {
            decay: "logistic".to_string(),
            ..InferenceSection::default()
        };
        assert!(InferenceConfig::from_section(&section).is_err());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let section = InferenceSection {
            spatial_weight: -0.1,
            ..InferenceSection::default()
        };
        assert!(InferenceConfig::from_section(&section).is_err());
    }

    #[test]
    fn non_finite_threshold_is_rejected_at_resolution() {
        for section in [
            InferenceSection {
                spatial_threshold_km: -5.0,
                ..InferenceSection::default()
            },
            InferenceSection {
                genetic_threshold: f64::NAN,
                ..InferenceSection::default()
            },
        ] {
            assert!(matches!(
                InferenceConfig::from_section(&section),
                Err(Error::ThresholdConfiguration(_))
            ));
        }
    }

    #[test]
    fn threshold_overrides_apply_and_validate() {
        let base = InferenceConfig::default();
        let tight = base.with_thresholds(Some(7.0), None, Some(0.01)).unwrap();
        assert_eq!(tight.temporal_window_days, 7.0);
        assert_eq!(tight.spatial_threshold_km, base.spatial_threshold_km);
        assert_eq!(tight.genetic_threshold, 0.01);

        assert!(matches!(
            base.with_thresholds(None, Some(-1.0), None),
            Err(Error::ThresholdConfiguration(_))
        ));
        assert!(matches!(
            base.with_thresholds(Some(f64::INFINITY), None, None),
            Err(Error::ThresholdConfiguration(_))
        ));
    }
}
