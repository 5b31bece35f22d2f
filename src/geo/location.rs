//! Immutable point types used throughout the spatial substrate.

use serde::{Deserialize, Serialize};

/// A point given as (latitude, longitude) in degrees.
///
/// `PolarLocation` only ever serves as an immutable origin marker in this
/// crate — polar↔Cartesian projection is an external collaborator's job
/// (see spec.md §1 Non-goals), so no trigonometry lives here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl PolarLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A point in a Cartesian frame, in meters, relative to a fixed origin.
///
/// Carries an optional `location_type` tag used when the point represents
/// a map feature (e.g. `"primary"`, `"operator"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartesianLocation {
    pub east: f64,
    pub north: f64,
    pub location_type: Option<String>,
}

impl CartesianLocation {
    pub fn new(east: f64, north: f64) -> Self {
        Self { east, north, location_type: None }
    }

    pub fn with_type(east: f64, north: f64, location_type: impl Into<String>) -> Self {
        Self { east, north, location_type: Some(location_type.into()) }
    }

    #[inline]
    pub fn as_array(&self) -> [f64; 2] {
        [self.east, self.north]
    }

    /// Euclidean distance to another Cartesian point.
    #[inline]
    pub fn distance(&self, other: &CartesianLocation) -> f64 {
        let de = self.east - other.east;
        let dn = self.north - other.north;
        (de * de + dn * dn).sqrt()
    }
}
