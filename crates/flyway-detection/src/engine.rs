//! Per-look detection transition and the cycle engine.
//!
//! [`observe`] is pure: it takes a cell's state plus the latest period
//! count and returns the successor state and, at a boundary crossing
//! or timeout, the emitted signal. [`DetectionEngine`] drives it over
//! every monitored cell once per cycle, reopening windows that ended
//! in a terminal phase on the previous cycle.

use crate::cusum;
use crate::group_sequential::{self, SpendingFunction};
use crate::sprt;
use flyway_core::config::DetectionSection;
use flyway_core::geo::CellId;
use flyway_core::signal::{BoundaryType, DetectionSignal, SignalStatus};
use flyway_core::surveillance::{CellSurveillanceState, MonitorPhase};
use flyway_core::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Runtime detector settings, resolved from the serialized
/// configuration section.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub boundary: BoundaryType,
    pub alpha: f64,
    pub beta: f64,
    pub elevation_ratio: f64,
    pub max_looks: u32,
    pub min_baseline_periods: u32,
    pub cusum_k: f64,
    pub cusum_h: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryType::OBrienFleming,
            alpha: 0.05,
            beta: 0.2,
            elevation_ratio: 3.0,
            max_looks: 20,
            min_baseline_periods: 14,
            cusum_k: 0.5,
            cusum_h: 5.0,
        }
    }
}

impl DetectorConfig {
    /// Resolve the serialized section, rejecting unknown boundary
    /// names and values that would void the error guarantees.
    pub fn from_section(section: &DetectionSection) -> Result<Self> {
        let boundary = match section.boundary.as_str() {
            "sprt" => BoundaryType::Sprt,
            "obrien_fleming" => BoundaryType::OBrienFleming,
            "pocock" => BoundaryType::Pocock,
            "cusum" => BoundaryType::Cusum,
            other => {
                return Err(Error::ThresholdConfiguration(format!(
                    "unknown boundary family '{other}'"
                )))
            }
        };
        if !(0.0 < section.alpha && section.alpha < 1.0)
            || !(0.0 < section.beta && section.beta < 1.0)
        {
            return Err(Error::ThresholdConfiguration(format!(
                "error rates must be in (0, 1): alpha={}, beta={}",
                section.alpha, section.beta
            )));
        }
        if section.elevation_ratio <= 1.0 {
            return Err(Error::ThresholdConfiguration(
                "elevation_ratio must exceed 1.0".to_string(),
            ));
        }
        if section.max_looks == 0 {
            return Err(Error::ThresholdConfiguration(
                "max_looks must be positive".to_string(),
            ));
        }
        Ok(Self {
            boundary,
            alpha: section.alpha,
            beta: section.beta,
            elevation_ratio: section.elevation_ratio,
            max_looks: section.max_looks,
            min_baseline_periods: section.min_baseline_periods,
            cusum_k: section.cusum_k,
            cusum_h: section.cusum_h,
        })
    }
}

enum Decision {
    Alarm,
    /// SPRT lower boundary: the null was accepted outright.
    AcceptNull,
    Continue,
}

/// Apply one look to a cell.
///
/// Errors when the cell's baseline is too short to test. A state
/// already in a terminal phase is returned unchanged; the caller
/// decides when to reopen the window.
pub fn observe(
    state: &CellSurveillanceState,
    count: u64,
    config: &DetectorConfig,
) -> Result<(CellSurveillanceState, Option<DetectionSignal>)> {
    if state.baseline_periods < config.min_baseline_periods {
        return Err(Error::InsufficientBaseline {
            cell_id: state.cell_id.clone(),
            periods: state.baseline_periods,
            required: config.min_baseline_periods,
        });
    }
    if state.is_terminal() {
        return Ok((state.clone(), None));
    }

    let mut next = state.clone();
    next.looks_so_far += 1;
    next.cumulative_count += count;

    let decision = match config.boundary {
        BoundaryType::Sprt => {
            let bounds = sprt::bounds(config.alpha, config.beta)?;
            next.cumulative_statistic +=
                sprt::increment(count, next.baseline_rate, config.elevation_ratio);
            if next.cumulative_statistic >= bounds.upper {
                Decision::Alarm
            } else if next.cumulative_statistic <= bounds.lower {
                Decision::AcceptNull
            } else {
                Decision::Continue
            }
        }
        BoundaryType::OBrienFleming => {
            step_group(&mut next, SpendingFunction::OBrienFleming, config)?
        }
        BoundaryType::Pocock => step_group(&mut next, SpendingFunction::Pocock, config)?,
        BoundaryType::Cusum => {
            next.cumulative_statistic = cusum::step(
                next.cumulative_statistic,
                count,
                next.baseline_rate,
                config.cusum_k,
            )?;
            if next.cumulative_statistic >= config.cusum_h {
                Decision::Alarm
            } else {
                Decision::Continue
            }
        }
    };

    // Alpha reported on a signal: the spending families carry their
    // realized cumulative spend; SPRT and CUSUM carry the design rate.
    let signal_alpha = match config.boundary {
        BoundaryType::OBrienFleming | BoundaryType::Pocock => next.alpha_spent,
        BoundaryType::Sprt | BoundaryType::Cusum => config.alpha,
    };

    let signal = match decision {
        Decision::Alarm => {
            next.phase = MonitorPhase::Alarm;
            next.boundary_crossed = true;
            Some(DetectionSignal::new(
                next.cell_id.clone(),
                SignalStatus::Alarm,
                config.boundary,
                next.cumulative_statistic,
                signal_alpha,
                next.looks_so_far,
            ))
        }
        Decision::AcceptNull => {
            next.phase = MonitorPhase::Cleared;
            next.boundary_crossed = true;
            Some(DetectionSignal::new(
                next.cell_id.clone(),
                SignalStatus::Cleared,
                config.boundary,
                next.cumulative_statistic,
                signal_alpha,
                next.looks_so_far,
            ))
        }
        Decision::Continue if next.looks_so_far >= config.max_looks => {
            // Window exhausted without evidence: timeout to CLEARED.
            next.phase = MonitorPhase::Cleared;
            Some(DetectionSignal::new(
                next.cell_id.clone(),
                SignalStatus::Cleared,
                config.boundary,
                next.cumulative_statistic,
                signal_alpha,
                next.looks_so_far,
            ))
        }
        Decision::Continue => {
            next.phase = MonitorPhase::Continue;
            None
        }
    };

    Ok((next, signal))
}

fn step_group(
    next: &mut CellSurveillanceState,
    function: SpendingFunction,
    config: &DetectorConfig,
) -> Result<Decision> {
    let tau = f64::from(next.looks_so_far) / f64::from(config.max_looks);
    let spent =
        group_sequential::cumulative_spend(function, config.alpha, tau).clamp(0.0, config.alpha);
    let delta = (spent - next.alpha_spent).max(0.0);
    let bound = group_sequential::look_boundary(delta);
    let z = group_sequential::z_statistic(
        next.cumulative_count,
        next.looks_so_far,
        next.baseline_rate,
    )?;
    next.cumulative_statistic = z;
    next.alpha_spent = spent;
    if z >= bound {
        Ok(Decision::Alarm)
    } else {
        Ok(Decision::Continue)
    }
}

/// Drives all monitored cells through one detection cycle.
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    config: DetectorConfig,
}

impl DetectionEngine {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Apply the latest period counts to every cell. Cells absent from
    /// `counts` observed zero cases this period, which is evidence
    /// too. Windows that ended in a terminal phase last cycle are
    /// reopened before their look. Cells with insufficient baselines
    /// are skipped with a warning; they are a data problem, not a
    /// cycle failure.
    pub fn run_cycle(
        &self,
        states: &mut HashMap<CellId, CellSurveillanceState>,
        counts: &HashMap<CellId, u64>,
    ) -> Result<Vec<DetectionSignal>> {
        let mut cell_ids: Vec<CellId> = states.keys().cloned().collect();
        cell_ids.sort();

        let mut signals = Vec::new();
        for cell_id in cell_ids {
            let Some(state) = states.get(&cell_id) else {
                continue;
            };
            let working = if state.is_terminal() {
                state.reset_window()
            } else {
                state.clone()
            };
            let count = counts.get(&cell_id).copied().unwrap_or(0);

            match observe(&working, count, &self.config) {
                Ok((next, signal)) => {
                    if let Some(signal) = &signal {
                        info!(
                            cell_id = %cell_id,
                            status = ?signal.status,
                            boundary = signal.boundary_type.as_str(),
                            statistic = signal.test_statistic,
                            looks = signal.looks_used,
                            "detection boundary decision"
                        );
                        metrics::counter!(
                            "flyway_detection_signals_total",
                            "boundary" => signal.boundary_type.as_str(),
                            "status" => if signal.is_alarm() { "alarm" } else { "cleared" }
                        )
                        .increment(1);
                        signals.push(signal.clone());
                    } else {
                        debug!(
                            cell_id = %cell_id,
                            statistic = next.cumulative_statistic,
                            looks = next.looks_so_far,
                            "monitoring continues"
                        );
                    }
                    states.insert(cell_id, next);
                }
                Err(Error::InsufficientBaseline {
                    periods, required, ..
                }) => {
                    warn!(
                        cell_id = %cell_id,
                        periods,
                        required,
                        "cell skipped: baseline history too short"
                    );
                }
                Err(other) => return Err(other),
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rate: f64) -> CellSurveillanceState {
        CellSurveillanceState::new(CellId::new("g10_20"), rate, 30)
    }

    fn config(boundary: BoundaryType) -> DetectorConfig {
        DetectorConfig {
            boundary,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn short_baseline_is_an_error_not_a_pass() {
        let mut s = state(2.0);
        s.baseline_periods = 3;
        let err = observe(&s, 5, &config(BoundaryType::Sprt)).unwrap_err();
        assert!(matches!(err, Error::InsufficientBaseline { .. }));
    }

    #[test]
    fn sprt_alarms_on_a_burst() {
        let cfg = config(BoundaryType::Sprt);
        let mut s = state(2.0);
        let mut alarm = None;
        for _ in 0..5 {
            let (next, signal) = observe(&s, 10, &cfg).unwrap();
            s = next;
            if signal.is_some() {
                alarm = signal;
                break;
            }
        }
        let alarm = alarm.expect("burst should cross the upper bound");
        assert_eq!(alarm.status, SignalStatus::Alarm);
        assert_eq!(alarm.boundary_type, BoundaryType::Sprt);
        assert!(s.boundary_crossed);
        assert_eq!(s.phase, MonitorPhase::Alarm);
    }

    #[test]
    fn sprt_accepts_null_on_quiet_cells() {
        let cfg = config(BoundaryType::Sprt);
        let mut s = state(2.0);
        let mut cleared = None;
        for _ in 0..cfg.max_looks {
            let (next, signal) = observe(&s, 2, &cfg).unwrap();
            s = next;
            if signal.is_some() {
                cleared = signal;
                break;
            }
        }
        let cleared = cleared.expect("baseline counts should accept the null");
        assert_eq!(cleared.status, SignalStatus::Cleared);
        // crossed the lower bound, not a timeout
        assert!(s.boundary_crossed);
        assert!(cleared.looks_used < cfg.max_looks);
    }

    #[test]
    fn group_sequential_times_out_to_cleared() {
        let cfg = config(BoundaryType::OBrienFleming);
        let mut s = state(2.0);
        let mut last_signal = None;
        for look in 1..=cfg.max_looks {
            let (next, signal) = observe(&s, 2, &cfg).unwrap();
            s = next;
            if let Some(sig) = signal {
                assert_eq!(look, cfg.max_looks, "exact-baseline counts must not alarm");
                last_signal = Some(sig);
            }
        }
        let timeout = last_signal.expect("window must close at max looks");
        assert_eq!(timeout.status, SignalStatus::Cleared);
        assert_eq!(timeout.looks_used, cfg.max_looks);
        assert!(!s.boundary_crossed);
        assert!(s.alpha_spent <= cfg.alpha + 1e-12);
    }

    #[test]
    fn alpha_spent_is_monotone_and_capped() {
        let cfg = config(BoundaryType::Pocock);
        let mut s = state(2.0);
        let mut previous = 0.0;
        for _ in 0..cfg.max_looks {
            let (next, _) = observe(&s, 2, &cfg).unwrap();
            assert!(next.alpha_spent >= previous - 1e-12);
            assert!(next.alpha_spent <= cfg.alpha + 1e-12);
            previous = next.alpha_spent;
            s = next;
        }
    }

    #[test]
    fn group_sequential_alarms_on_sustained_elevation() {
        let cfg = config(BoundaryType::OBrienFleming);
        let mut s = state(2.0);
        let mut alarm = None;
        for _ in 0..cfg.max_looks {
            let (next, signal) = observe(&s, 10, &cfg).unwrap();
            s = next;
            if let Some(sig) = signal {
                alarm = Some(sig);
                break;
            }
        }
        let alarm = alarm.expect("5x elevation must alarm within the window");
        assert_eq!(alarm.status, SignalStatus::Alarm);
        assert!((alarm.confidence - (1.0 - alarm.alpha_spent)).abs() < 1e-12);
        assert!(alarm.alpha_spent <= cfg.alpha + 1e-12);
    }

    #[test]
    fn cusum_never_clears_early() {
        let cfg = config(BoundaryType::Cusum);
        let mut s = state(2.0);
        for look in 1..=cfg.max_looks {
            let (next, signal) = observe(&s, 2, &cfg).unwrap();
            s = next;
            match signal {
                Some(sig) => {
                    assert_eq!(sig.status, SignalStatus::Cleared);
                    assert_eq!(look, cfg.max_looks, "cusum may only clear via timeout");
                }
                None => assert!(look < cfg.max_looks),
            }
        }
    }

    #[test]
    fn cusum_alarms_on_sustained_small_shift() {
        let cfg = DetectorConfig {
            boundary: BoundaryType::Cusum,
            max_looks: 40,
            ..DetectorConfig::default()
        };
        // 4 vs baseline 2: z ~ 1.41 per look, net drift ~ 0.91.
        let mut s = state(2.0);
        let mut alarm = None;
        for _ in 0..cfg.max_looks {
            let (next, signal) = observe(&s, 4, &cfg).unwrap();
            s = next;
            if let Some(sig) = signal {
                alarm = Some(sig);
                break;
            }
        }
        assert_eq!(alarm.expect("shift must accumulate past h").status, SignalStatus::Alarm);
    }

    #[test]
    fn terminal_state_is_left_untouched() {
        let cfg = config(BoundaryType::Sprt);
        let mut s = state(2.0);
        s.phase = MonitorPhase::Alarm;
        s.cumulative_statistic = 9.9;
        let (next, signal) = observe(&s, 10, &cfg).unwrap();
        assert!(signal.is_none());
        assert_eq!(next.cumulative_statistic, 9.9);
        assert_eq!(next.looks_so_far, s.looks_so_far);
    }

    #[test]
    fn cycle_reopens_terminal_windows() {
        let engine = DetectionEngine::new(config(BoundaryType::Sprt));
        let cell = CellId::new("g5_5");
        let mut terminal = CellSurveillanceState::new(cell.clone(), 2.0, 30);
        terminal.phase = MonitorPhase::Alarm;
        terminal.cumulative_statistic = 5.0;
        terminal.looks_so_far = 4;
        let mut states = HashMap::from([(cell.clone(), terminal)]);

        let counts = HashMap::from([(cell.clone(), 2u64)]);
        let signals = engine.run_cycle(&mut states, &counts).unwrap();
        assert!(signals.is_empty());

        let reopened = &states[&cell];
        assert_eq!(reopened.looks_so_far, 1);
        assert_eq!(reopened.phase, MonitorPhase::Continue);
    }

    #[test]
    fn cycle_treats_missing_counts_as_zero() {
        let engine = DetectionEngine::new(config(BoundaryType::Sprt));
        let cell = CellId::new("g5_6");
        let mut states = HashMap::from([(
            cell.clone(),
            CellSurveillanceState::new(cell.clone(), 2.0, 30),
        )]);
        engine.run_cycle(&mut states, &HashMap::new()).unwrap();
        assert_eq!(states[&cell].looks_so_far, 1);
        // zero observed against baseline 2 is null evidence
        assert!(states[&cell].cumulative_statistic < 0.0);
    }

    #[test]
    fn cycle_skips_short_baseline_cells() {
        let engine = DetectionEngine::new(config(BoundaryType::Sprt));
        let cell = CellId::new("g5_7");
        let mut states = HashMap::from([(
            cell.clone(),
            CellSurveillanceState::new(cell.clone(), 2.0, 3),
        )]);
        let signals = engine
            .run_cycle(&mut states, &HashMap::from([(cell.clone(), 50u64)]))
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(states[&cell].looks_so_far, 0);
    }

    #[test]
    fn unknown_boundary_name_is_rejected() {
        let section = DetectionSection {
            boundary: "bonferroni".to_string(),
            ..DetectionSection::default()
        };
        assert!(matches!(
            DetectorConfig::from_section(&section),
            Err(Error::ThresholdConfiguration(_))
        ));
    }

    #[test]
    fn section_round_trip_resolves_all_families() {
        for (name, expected) in [
            ("sprt", BoundaryType::Sprt),
            ("obrien_fleming", BoundaryType::OBrienFleming),
            ("pocock", BoundaryType::Pocock),
            ("cusum", BoundaryType::Cusum),
        ] {
            let section = DetectionSection {
                boundary: name.to_string(),
                ..DetectionSection::default()
            };
            let cfg = DetectorConfig::from_section(&section).unwrap();
            assert_eq!(cfg.boundary, expected);
        }
    }
}
