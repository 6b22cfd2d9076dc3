//! Geographic primitives: locations, great-circle distance, and the
//! grid partition that maps locations onto surveillance cells.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude.
const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometers per degree of longitude at the equator.
const KM_PER_DEG_LON_EQ: f64 = 111.320;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Create a location, validating coordinate ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidCase(format!("latitude out of range: {latitude}")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidCase(format!("longitude out of range: {longitude}")));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: GeoLocation, b: GeoLocation) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Identifier of a geographic surveillance cell.
///
/// Cells are the unit of work for the detector and the allocator.
/// Grid-derived ids look like `g12_-34`; administrative cell ids from
/// upstream systems pass through unchanged.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed grid over latitude/longitude used to derive `CellId`s from
/// case locations. Cell edges are approximately `cell_size_km` at the
/// equator; cells shrink in east-west extent toward the poles, which
/// is acceptable for partitioning (cells only need to be stable and
/// many-to-one from locations).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridPartition {
    pub cell_size_km: f64,
}

impl Default for GridPartition {
    fn default() -> Self {
        Self { cell_size_km: 25.0 }
    }
}

impl GridPartition {
    pub fn new(cell_size_km: f64) -> Result<Self> {
        if !cell_size_km.is_finite() || cell_size_km <= 0.0 {
            return Err(Error::Config(format!(
                "grid cell size must be positive, got {cell_size_km}"
            )));
        }
        Ok(Self { cell_size_km })
    }

    /// Derive the cell for a location.
    pub fn cell_for(&self, location: GeoLocation) -> CellId {
        let lat_step = self.cell_size_km / KM_PER_DEG_LAT;
        let lon_step = self.cell_size_km / KM_PER_DEG_LON_EQ;
        let row = (location.latitude / lat_step).floor() as i64;
        let col = (location.longitude / lon_step).floor() as i64;
        CellId(format!("g{row}_{col}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Des Moines to Minneapolis, roughly 375 km
        let a = GeoLocation::new(41.59, -93.62).unwrap();
        let b = GeoLocation::new(44.98, -93.27).unwrap();
        let d = haversine_km(a, b);
        assert!((370.0..385.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = GeoLocation::new(40.0, -90.0).unwrap();
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn location_validation() {
        assert!(GeoLocation::new(91.0, 0.0).is_err());
        assert!(GeoLocation::new(0.0, 181.0).is_err());
        assert!(GeoLocation::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn grid_is_stable_and_many_to_one() {
        let grid = GridPartition::default();
        let a = GeoLocation::new(42.001, -93.001).unwrap();
        let b = GeoLocation::new(42.002, -93.002).unwrap();
        assert_eq!(grid.cell_for(a), grid.cell_for(a));
        assert_eq!(grid.cell_for(a), grid.cell_for(b));

        let far = GeoLocation::new(45.0, -80.0).unwrap();
        assert_ne!(grid.cell_for(a), grid.cell_for(far));
    }
}
