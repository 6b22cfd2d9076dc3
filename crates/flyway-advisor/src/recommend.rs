//! The rule table.

use chrono::{DateTime, Utc};
use flyway_core::network::{
    GeographicFocus, PatternType, TemporalPattern, TransmissionNetwork,
};
use flyway_core::signal::DetectionSignal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Response urgency, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Standard,
    Elevated,
    High,
    VeryHigh,
}

impl Priority {
    fn escalate(self) -> Self {
        match self {
            Priority::Standard => Priority::Elevated,
            Priority::Elevated => Priority::High,
            Priority::High | Priority::VeryHigh => Priority::VeryHigh,
        }
    }
}

/// Category of a recommended field action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SourceInvestigation,
    EnvironmentalSampling,
    WildBirdSurveillance,
    BorderBiosecurity,
    ContactTracing,
    MovementRestriction,
    RoutineSurveillance,
    ExpandedSurveillanceRadius,
    AcceleratedResponse,
    PremisesBiosecurityAudit,
}

impl ActionKind {
    /// Whether this action gathers information or restricts spread.
    fn is_surveillance(self) -> bool {
        matches!(
            self,
            ActionKind::SourceInvestigation
                | ActionKind::EnvironmentalSampling
                | ActionKind::WildBirdSurveillance
                | ActionKind::ContactTracing
                | ActionKind::RoutineSurveillance
                | ActionKind::ExpandedSurveillanceRadius
        )
    }
}

/// One recommended action with its field guidance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub description: String,
}

impl Action {
    fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }
}

/// The advisory output for one inferred network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_id: Uuid,
    /// The network this advice was derived from.
    pub network_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub pattern_type: PatternType,
    pub priority: Priority,
    /// Information-gathering actions.
    pub surveillance: Vec<Action>,
    /// Spread-restricting actions.
    pub control: Vec<Action>,
    /// Highest confidence among the recent ALARM signals this advice
    /// was generated alongside, when any were supplied. Lets
    /// consumers tell advice backed by a boundary crossing from
    /// advice derived from network structure alone.
    pub alarm_confidence: Option<f64>,
    pub rationale: String,
}

/// Derive the intervention recommendation for an inferred network.
pub fn advise(network: &TransmissionNetwork) -> Recommendation {
    advise_with_signals(network, &[])
}

/// Derive the recommendation, attaching provenance from the detector's
/// recent signals.
pub fn advise_with_signals(
    network: &TransmissionNetwork,
    recent_signals: &[DetectionSignal],
) -> Recommendation {
    let assessment = &network.assessment;

    let (mut priority, mut actions, mut rationale) = match assessment.pattern_type {
        PatternType::CommonSource => (
            Priority::High,
            vec![
                Action::new(
                    ActionKind::SourceInvestigation,
                    "Trace the shared exposure behind the dominant cluster hub",
                ),
                Action::new(
                    ActionKind::EnvironmentalSampling,
                    "Sample water, feed, and equipment at and around the suspected source premises",
                ),
            ],
            "Cluster structure is hub-dominated, consistent with a single shared source"
                .to_string(),
        ),
        PatternType::MultipleIntroductions => (
            Priority::High,
            vec![
                Action::new(
                    ActionKind::WildBirdSurveillance,
                    "Increase wild bird sampling along the flyway corridors feeding the affected areas",
                ),
                Action::new(
                    ActionKind::BorderBiosecurity,
                    "Tighten entry controls and carcass disposal at premises near the separate clusters",
                ),
            ],
            "Multiple unlinked clusters indicate independent introductions rather than local spread"
                .to_string(),
        ),
        PatternType::SustainedTransmission => (
            Priority::VeryHigh,
            vec![
                Action::new(
                    ActionKind::ContactTracing,
                    "Trace personnel, vehicle, and equipment movement between linked premises",
                ),
                Action::new(
                    ActionKind::MovementRestriction,
                    "Restrict live bird and product movement inside the affected zone",
                ),
            ],
            "Chain-like link structure indicates ongoing premises-to-premises transmission"
                .to_string(),
        ),
        PatternType::Sporadic => (
            Priority::Standard,
            vec![Action::new(
                ActionKind::RoutineSurveillance,
                "Maintain routine surveillance; no linked spread detected",
            )],
            "Cases show no plausible transmission links".to_string(),
        ),
    };

    if assessment.geographic_focus == GeographicFocus::Widespread {
        priority = priority.escalate();
        actions.push(Action::new(
            ActionKind::ExpandedSurveillanceRadius,
            "Extend active surveillance beyond the current control zones; links span long distances",
        ));
        rationale.push_str("; spread is geographically widespread");
    }
    if assessment.temporal_pattern == TemporalPattern::Rapid {
        priority = priority.escalate();
        actions.push(Action::new(
            ActionKind::AcceleratedResponse,
            "Compress response timelines; cases are succeeding each other within days",
        ));
        rationale.push_str("; case succession is rapid");
    }
    if assessment.superspreading_evidence {
        actions.push(Action::new(
            ActionKind::PremisesBiosecurityAudit,
            "Audit biosecurity at high-out-degree premises identified as amplification points",
        ));
    }

    let alarm_confidence = recent_signals
        .iter()
        .filter(|s| s.is_alarm())
        .map(|s| s.confidence)
        .fold(None, |best: Option<f64>, c| {
            Some(best.map_or(c, |b| b.max(c)))
        });

    let (surveillance, control): (Vec<Action>, Vec<Action>) =
        actions.into_iter().partition(|a| a.kind.is_surveillance());

    let recommendation = Recommendation {
        recommendation_id: Uuid::new_v4(),
        network_id: network.network_id,
        generated_at: Utc::now(),
        pattern_type: assessment.pattern_type,
        priority,
        surveillance,
        control,
        alarm_confidence,
        rationale,
    };
    info!(
        network_id = %network.network_id,
        pattern = ?recommendation.pattern_type,
        priority = ?recommendation.priority,
        surveillance = recommendation.surveillance.len(),
        control = recommendation.control.len(),
        "intervention recommendation generated"
    );
    recommendation
}
