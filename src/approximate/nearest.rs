//! Nearest-neighbour scattered-data interpolation.

use rstar::{RTree, RTreeObject, AABB};

use super::Approximator;

#[derive(Debug, Clone)]
struct IndexedPoint {
    id: usize,
    coordinate: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coordinate)
    }
}

pub struct NearestApproximator {
    tree: RTree<IndexedPoint>,
    values: Vec<Vec<f64>>,
}

impl NearestApproximator {
    pub fn fit(coordinates: &[[f64; 2]], values: &[Vec<f64>]) -> Self {
        let items = coordinates
            .iter()
            .enumerate()
            .map(|(id, &coordinate)| IndexedPoint { id, coordinate })
            .collect();

        Self { tree: RTree::bulk_load(items), values: values.to_vec() }
    }
}

impl Approximator for NearestApproximator {
    fn predict(&self, coordinates: &[[f64; 2]]) -> Vec<Vec<f64>> {
        coordinates
            .iter()
            .map(|q| {
                let nearest = self
                    .tree
                    .nearest_neighbor(q)
                    .expect("fit() rejects empty support, so the tree is never empty");
                self.values[nearest.id].clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_value_of_closest_support_point() {
        let approximator = NearestApproximator::fit(
            &[[0.0, 0.0], [10.0, 10.0]],
            &[vec![1.0], vec![2.0]],
        );

        assert_eq!(approximator.predict(&[[1.0, 1.0]]), vec![vec![1.0]]);
        assert_eq!(approximator.predict(&[[9.0, 9.0]]), vec![vec![2.0]]);
    }
}
