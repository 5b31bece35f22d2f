//! Monte-Carlo moments estimator (spec.md §4.3): realize a filtered map K
//! times, evaluate a relation kernel at every support point against each
//! realization, and reduce to per-point (mean, variance).

use rand::Rng;
use tracing::warn;

use crate::geo::{CartesianCollection, CartesianMap, SpatialIndex};
use crate::relations::registry::RelationDefinition;

/// Computes (mean, variance) of `definition`'s kernel at every point in
/// `support`, given `filtered` (already restricted to the features the
/// relation depends on) and `samples` Monte-Carlo realizations.
///
/// Empty maps and kernel failures are handled locally per spec.md §7: both
/// substitute `definition.empty_map_parameters()` for every support point
/// and never escape as an error.
pub fn estimate_moments(
    definition: &dyn RelationDefinition,
    filtered: &CartesianMap,
    support: &[[f64; 2]],
    samples: usize,
    rng: &mut impl Rng,
    empty_map_defaults: &crate::relations::EmptyMapDefaults,
) -> Vec<(f64, f64)> {
    let sentinel = definition.empty_map_parameters(empty_map_defaults);

    if filtered.is_empty() {
        return vec![sentinel; support.len()];
    }

    let indices: Vec<SpatialIndex> = (0..samples)
        .map(|_| SpatialIndex::build(filtered.sample(rng)))
        .collect();

    let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(indices.len()); support.len()];

    for index in &indices {
        for (point_idx, &point) in support.iter().enumerate() {
            match definition.evaluate(point, index) {
                Ok(value) => draws[point_idx].push(value),
                Err(reason) => {
                    warn!(
                        relation = definition.name(),
                        %reason,
                        "kernel evaluation failed, reverting slot to empty-map sentinel"
                    );
                    return vec![sentinel; support.len()];
                }
            }
        }
    }

    draws
        .into_iter()
        .map(|values| {
            let k = values.len() as f64;
            let mean = values.iter().sum::<f64>() / k;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / k;
            (mean, variance)
        })
        .collect()
}

/// Appends `(mean, variance)` pairs for `locations` into a D=2 collection.
pub fn append_moments(
    collection: &mut CartesianCollection,
    locations: &[crate::geo::CartesianLocation],
    moments: &[(f64, f64)],
) -> Result<(), crate::geo::CollectionError> {
    let values: Vec<Vec<f64>> = moments.iter().map(|(m, v)| vec![*m, *v]).collect();
    collection.append(locations, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{CartesianFeature, Gaussian2D, Geometry, PolarLocation};
    use crate::relations::{Distance, EmptyMapDefaults};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn empty_map_yields_sentinel_everywhere() {
        let map = CartesianMap::new(PolarLocation::new(0.0, 0.0), Vec::new());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let defaults = EmptyMapDefaults::default();

        let moments =
            estimate_moments(&Distance, &map, &[[0.0, 0.0], [1.0, 1.0]], 10, &mut rng, &defaults);

        assert_eq!(moments, vec![(1e9, 1e-3), (1e9, 1e-3)]);
    }

    #[test]
    fn zero_variance_feature_has_zero_variance_at_its_location() {
        let map = CartesianMap::new(
            PolarLocation::new(0.0, 0.0),
            vec![CartesianFeature::new(Geometry::Point([0.0, 0.0]), "operator")],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let defaults = EmptyMapDefaults::default();

        let moments = estimate_moments(&Distance, &map, &[[0.0, 0.0]], 20, &mut rng, &defaults);

        assert_eq!(moments[0].0, 0.0);
        assert_eq!(moments[0].1, 0.0);
    }

    #[test]
    fn noisy_feature_produces_positive_variance() {
        let map = CartesianMap::new(
            PolarLocation::new(0.0, 0.0),
            vec![CartesianFeature::new(Geometry::Point([0.0, 0.0]), "operator")
                .with_distribution(Gaussian2D::isotropic(9.0))],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let defaults = EmptyMapDefaults::default();

        let moments = estimate_moments(&Distance, &map, &[[5.0, 0.0]], 200, &mut rng, &defaults);

        assert!(moments[0].1 > 0.0);
    }
}
