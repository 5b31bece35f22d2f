//! Over: whether a point falls within the nearest feature of one location
//! type, as a Bernoulli relation.

use crate::geo::{CartesianMap, SpatialIndex};

use super::registry::{KernelFailure, KernelResult, RelationDefinition, RelationKind};
use super::EmptyMapDefaults;

#[derive(Debug, Clone, Copy)]
pub struct Over;

impl RelationDefinition for Over {
    fn name(&self) -> &'static str {
        "over"
    }

    fn arity(&self) -> usize {
        2
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Bernoulli
    }

    fn empty_map_parameters(&self, _defaults: &EmptyMapDefaults) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn filter_map(&self, map: &CartesianMap, location_type: Option<&str>) -> CartesianMap {
        let location_type = location_type.expect("over is arity-2, always filters by type");
        map.filter(location_type)
    }

    fn evaluate(&self, point: [f64; 2], index: &SpatialIndex) -> KernelResult {
        let geometry = index
            .nearest_geometry(point)
            .ok_or_else(|| KernelFailure::new("no feature to test containment against"))?;
        Ok(if geometry.contains(point) { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Geometry;

    #[test]
    fn evaluate_detects_containment() {
        let square = Geometry::Polygon(vec![
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ]);
        let index = SpatialIndex::build(vec![square]);

        assert_eq!(Over.evaluate([0.0, 0.0], &index).unwrap(), 1.0);
        assert_eq!(Over.evaluate([5.0, 5.0], &index).unwrap(), 0.0);
    }
}
