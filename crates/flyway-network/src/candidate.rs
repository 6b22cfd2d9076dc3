//! Candidate pair generation.
//!
//! Input cases are sorted by confirmation time (ties on case id), so a
//! pair `(i, j)` with `i < j` always points from the earlier case to
//! the later one. The naive generator walks all in-window pairs; the
//! bucketed generator hashes cases into time/latitude/longitude
//! buckets at least as wide as the matching thresholds, so scanning a
//! case's own bucket plus the adjacent ones can never miss a pair that
//! would pass both the temporal and spatial filters.

use chrono::{DateTime, Utc};
use flyway_core::case::Case;
use flyway_core::geo::GeoLocation;
use std::collections::HashMap;

const KM_PER_DEG_LAT: f64 = 110.574;
const KM_PER_DEG_LON_EQ: f64 = 111.320;

/// All pairs within the temporal window, quadratic scan.
pub fn naive_pairs(times: &[DateTime<Utc>], window_days: f64) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for j in 1..times.len() {
        // walking backwards lets us stop at the first out-of-window gap
        for i in (0..j).rev() {
            let gap = (times[j] - times[i]).num_seconds() as f64 / 86_400.0;
            if gap > window_days {
                break;
            }
            pairs.push((i, j));
        }
    }
    pairs.sort_unstable();
    pairs
}

/// In-window pairs via spatial/temporal bucketing.
///
/// May omit pairs that are farther apart than `spatial_threshold_km`
/// (the conjunctive filter would drop those anyway) but never omits a
/// pair inside both thresholds.
pub fn bucketed_pairs(
    cases: &[Case],
    times: &[DateTime<Utc>],
    window_days: f64,
    spatial_threshold_km: f64,
) -> Vec<(usize, usize)> {
    let time_step = window_days.max(1e-6);
    let lat_step = (spatial_threshold_km / KM_PER_DEG_LAT).max(1e-9);
    // longitude degrees shrink with latitude; size buckets for the
    // worst case in this dataset, clamped away from the poles
    let max_abs_lat = cases
        .iter()
        .map(|c| c.location.latitude.abs())
        .fold(0.0f64, f64::max);
    let cos_lat = max_abs_lat.to_radians().cos().max(0.1);
    let lon_step_raw = (spatial_threshold_km / (KM_PER_DEG_LON_EQ * cos_lat)).max(1e-9);
    // longitude wraps at the antimeridian: tile the full circle with
    // buckets at least as wide as the raw step so wrapped neighbor
    // lookup stays a plain +/-1 scan
    let lon_bucket_count = ((360.0 / lon_step_raw).floor() as i64).max(1);
    let lon_step = 360.0 / lon_bucket_count as f64;

    let bucket_of = |loc: GeoLocation, t: DateTime<Utc>| -> (i64, i64, i64) {
        let days = t.timestamp() as f64 / 86_400.0;
        (
            (days / time_step).floor() as i64,
            (loc.latitude / lat_step).floor() as i64,
            (((loc.longitude + 180.0) / lon_step).floor() as i64).rem_euclid(lon_bucket_count),
        )
    };

    let mut buckets: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (idx, case) in cases.iter().enumerate() {
        buckets
            .entry(bucket_of(case.location, times[idx]))
            .or_default()
            .push(idx);
    }

    let mut pairs = Vec::new();
    for (j, case) in cases.iter().enumerate() {
        let (bt, blat, blon) = bucket_of(case.location, times[j]);
        // dedupe so a one- or two-bucket circle is not scanned twice
        let mut lon_neighbors = vec![
            (blon - 1).rem_euclid(lon_bucket_count),
            blon,
            (blon + 1).rem_euclid(lon_bucket_count),
        ];
        lon_neighbors.sort_unstable();
        lon_neighbors.dedup();
        for dt in -1..=1 {
            for dlat in -1..=1 {
                for &nlon in &lon_neighbors {
                    let Some(members) = buckets.get(&(bt + dt, blat + dlat, nlon)) else {
                        continue;
                    };
                    for &i in members {
                        if i >= j {
                            continue;
                        }
                        let gap = (times[j] - times[i]).num_seconds() as f64 / 86_400.0;
                        if gap <= window_days {
                            pairs.push((i, j));
                        }
                    }
                }
            }
        }
    }
    pairs.sort_unstable();
    pairs
}
