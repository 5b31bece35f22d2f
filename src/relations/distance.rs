//! Distance: Euclidean distance from a point to the nearest feature of one
//! location type, as a Gaussian relation.

use crate::geo::{CartesianMap, SpatialIndex};

use super::registry::{KernelFailure, KernelResult, RelationDefinition, RelationKind};
use super::EmptyMapDefaults;

#[derive(Debug, Clone, Copy)]
pub struct Distance;

impl RelationDefinition for Distance {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn arity(&self) -> usize {
        2
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Scalar
    }

    fn empty_map_parameters(&self, defaults: &EmptyMapDefaults) -> (f64, f64) {
        (defaults.distance_mean, defaults.distance_variance)
    }

    fn filter_map(&self, map: &CartesianMap, location_type: Option<&str>) -> CartesianMap {
        let location_type = location_type.expect("distance is arity-2, always filters by type");
        map.filter(location_type)
    }

    fn evaluate(&self, point: [f64; 2], index: &SpatialIndex) -> KernelResult {
        index
            .distance(point)
            .filter(|d| d.is_finite())
            .ok_or_else(|| KernelFailure::new("no feature to measure distance to"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Geometry;

    #[test]
    fn evaluate_measures_distance_to_nearest() {
        let index = SpatialIndex::build(vec![Geometry::Point([0.0, 0.0])]);
        let distance = Distance.evaluate([3.0, 4.0], &index).unwrap();
        assert_eq!(distance, 5.0);
    }

    #[test]
    fn evaluate_fails_on_empty_index() {
        let index = SpatialIndex::build(Vec::new());
        assert!(Distance.evaluate([0.0, 0.0], &index).is_err());
    }

    #[test]
    fn empty_map_parameters_match_configured_defaults() {
        let defaults = EmptyMapDefaults::default();
        assert_eq!(Distance.empty_map_parameters(&defaults), (1e9, 1e-3));
    }
}
