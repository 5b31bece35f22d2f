//! STR-bulk-loaded spatial index over a realized set of geometries.

use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, instrument};

use super::map::Geometry;

#[derive(Debug, Clone)]
struct IndexedGeometry {
    id: usize,
    geometry: Geometry,
}

impl RTreeObject for IndexedGeometry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        match &self.geometry {
            Geometry::Point(p) => AABB::from_point(*p),
            Geometry::Line(points) | Geometry::Polygon(points) => {
                AABB::from_points(points.iter())
            }
        }
    }
}

/// Bulk-loaded spatial index over one realization of a filtered map.
///
/// Nearest-neighbour ties are broken by original insertion order, matching
/// the contract in spec.md §4.1 — `rstar` alone does not guarantee this, so
/// `nearest` resolves ties explicitly.
pub struct SpatialIndex {
    tree: RTree<IndexedGeometry>,
}

impl SpatialIndex {
    /// Bulk-loads the index (STR algorithm, via `rstar::RTree::bulk_load`).
    #[instrument(skip(geometries))]
    pub fn build(geometries: Vec<Geometry>) -> Self {
        let count = geometries.len();
        let items = geometries
            .into_iter()
            .enumerate()
            .map(|(id, geometry)| IndexedGeometry { id, geometry })
            .collect();

        debug!(count, "bulk-loaded spatial index");
        Self { tree: RTree::bulk_load(items) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Index of the nearest stored geometry, ties broken by insertion order.
    pub fn nearest(&self, query: [f64; 2]) -> Option<usize> {
        let nearest = self.tree.nearest_neighbor(&query)?;
        let min_distance = nearest.geometry.distance_to(query);

        // `nearest_neighbor` itself does not promise a tie-break rule, so
        // re-scan candidates at the same distance and take the lowest id.
        let mut best_id = nearest.id;
        let mut best_distance = min_distance;
        for candidate in self.tree.iter() {
            let distance = candidate.geometry.distance_to(query);
            if (distance - min_distance).abs() <= f64::EPSILON.max(min_distance * 1e-9) {
                if candidate.id < best_id || distance < best_distance {
                    best_id = candidate.id;
                    best_distance = distance;
                }
            }
        }

        Some(best_id)
    }

    /// Distance from `query` to the nearest stored geometry.
    pub fn distance(&self, query: [f64; 2]) -> Option<f64> {
        self.nearest_geometry(query).map(|g| g.distance_to(query))
    }

    pub fn nearest_geometry(&self, query: [f64; 2]) -> Option<&Geometry> {
        let id = self.nearest(query)?;
        self.tree.iter().find(|g| g.id == id).map(|g| &g.geometry)
    }

    /// Indices of stored geometries whose envelope intersects the query
    /// envelope, for coarse candidate queries.
    pub fn query_envelope(&self, min: [f64; 2], max: [f64; 2]) -> Vec<usize> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_finds_closest_point() {
        let index = SpatialIndex::build(vec![
            Geometry::Point([0.0, 0.0]),
            Geometry::Point([10.0, 10.0]),
        ]);

        assert_eq!(index.nearest([1.0, 1.0]), Some(0));
        assert_eq!(index.nearest([9.0, 9.0]), Some(1));
    }

    #[test]
    fn nearest_breaks_ties_by_insertion_order() {
        let index = SpatialIndex::build(vec![
            Geometry::Point([-1.0, 0.0]),
            Geometry::Point([1.0, 0.0]),
        ]);

        // Equidistant from the origin; earliest-inserted wins.
        assert_eq!(index.nearest([0.0, 0.0]), Some(0));
    }

    #[test]
    fn empty_index_has_no_nearest() {
        let index = SpatialIndex::build(Vec::new());
        assert_eq!(index.nearest([0.0, 0.0]), None);
        assert!(index.is_empty());
    }

    #[test]
    fn distance_matches_geometry_kind() {
        let index = SpatialIndex::build(vec![Geometry::Point([3.0, 4.0])]);
        assert_eq!(index.distance([0.0, 0.0]), Some(5.0));
    }
}
