//! Depth: a scalar relation keyed under `None`, evaluated over the whole UAM
//! restricted to a fixed set of relevant feature types (spec.md §4.2, §9).
//!
//! What "depth" concretely measures is left opaque by the specification;
//! this crate implements it as nearest-neighbour distance to the relevant
//! features, reusing distance's kernel mechanics under a different filter.

use crate::geo::{CartesianMap, SpatialIndex};

use super::registry::{KernelFailure, KernelResult, RelationDefinition, RelationKind};
use super::EmptyMapDefaults;

/// Feature types depth-relevant kernels restrict the UAM to. Fixed by
/// convention, not a configuration knob (spec.md §4.2 treats this as given).
pub const RELEVANT_LOCATION_TYPES: &[&str] = &["seabed", "obstruction"];

#[derive(Debug, Clone, Copy)]
pub struct Depth;

impl RelationDefinition for Depth {
    fn name(&self) -> &'static str {
        "depth"
    }

    fn arity(&self) -> usize {
        1
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Scalar
    }

    fn empty_map_parameters(&self, _defaults: &EmptyMapDefaults) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn filter_map(&self, map: &CartesianMap, _location_type: Option<&str>) -> CartesianMap {
        let features = map
            .features()
            .iter()
            .filter(|f| RELEVANT_LOCATION_TYPES.contains(&f.location_type.as_str()))
            .cloned()
            .collect();
        CartesianMap::new(map.origin(), features)
    }

    fn evaluate(&self, point: [f64; 2], index: &SpatialIndex) -> KernelResult {
        index
            .distance(point)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| KernelFailure::new("no relevant feature to derive depth from"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{CartesianFeature, Geometry, PolarLocation};

    #[test]
    fn filter_map_keeps_only_relevant_types() {
        let map = CartesianMap::new(
            PolarLocation::new(0.0, 0.0),
            vec![
                CartesianFeature::new(Geometry::Point([0.0, 0.0]), "seabed"),
                CartesianFeature::new(Geometry::Point([1.0, 1.0]), "primary"),
            ],
        );

        let filtered = Depth.filter_map(&map, None);
        assert_eq!(filtered.features().len(), 1);
        assert_eq!(filtered.features()[0].location_type, "seabed");
    }

    #[test]
    fn depth_is_nonnegative() {
        let index = SpatialIndex::build(vec![Geometry::Point([0.0, 0.0])]);
        let value = Depth.evaluate([3.0, 4.0], &index).unwrap();
        assert!(value >= 0.0);
    }
}
