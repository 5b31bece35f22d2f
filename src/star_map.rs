//! The StaR Map (spec.md §4.4): the central store mapping each
//! `(relation, location_type)` pair to its support points and fitted
//! approximator, and the operations (`fit`, `get`, `prune`, `auto_improve`)
//! that keep it current against a target.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::approximate::{self, ApproximateError, FittedApproximator, Method};
use crate::config::Settings;
use crate::geo::{
    CartesianCollection, CartesianLocation, CartesianMap, CartesianRasterBand, CollectionError,
    PolarLocation,
};
use crate::relations::registry::{self, RelationDefinition};
use crate::relations::{BernoulliRelation, Relation, RelationKind, ScalarRelation};
use crate::sampling;
use crate::scanner::{self, ScannerError};

#[derive(Debug, Error)]
pub enum StarMapError {
    #[error("StaR Map target and UAM must share an origin but were {target:?} and {uam:?}")]
    OriginMismatch { target: PolarLocation, uam: PolarLocation },
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),
    #[error("relation '{relation}'/{location_type:?} has not been fitted yet")]
    NotFitted { relation: String, location_type: Option<String> },
    #[error("{0}")]
    UnsupportedMethod(String),
    #[error("auto_improve requires a RasterBand target")]
    NotARaster,
    #[error("failed to persist StaR Map: {0}")]
    Persistence(String),
    #[error(transparent)]
    Scanner(#[from] ScannerError),
    #[error(transparent)]
    Approximate(#[from] ApproximateError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// What a ProMis problem is solved at: either an arbitrary set of points or
/// a regular raster (the only shape `auto_improve` can work with).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Target {
    Collection(CartesianCollection),
    Raster(CartesianRasterBand),
}

impl Target {
    pub fn origin(&self) -> PolarLocation {
        self.collection().origin()
    }

    pub fn collection(&self) -> &CartesianCollection {
        match self {
            Target::Collection(collection) => collection,
            Target::Raster(raster) => raster.collection(),
        }
    }

    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.collection().coordinates()
    }

    pub fn as_raster(&self) -> Result<&CartesianRasterBand, StarMapError> {
        match self {
            Target::Raster(raster) => Ok(raster),
            Target::Collection(_) => Err(StarMapError::NotARaster),
        }
    }
}

/// One relation's support points (mean, variance per point) and the
/// approximator fitted over them, if any.
#[derive(Debug, Clone)]
struct Slot {
    support: CartesianCollection,
    approximator: Option<FittedApproximator>,
}

/// A map of `(relation, location_type) -> (support points, approximator)`,
/// fitted against an uncertainty-annotated map and queried at a target.
pub struct StarMap {
    uam: CartesianMap,
    target: Target,
    method: Method,
    settings: Settings,
    relations: HashMap<String, HashMap<Option<String>, Slot>>,
}

impl StarMap {
    #[instrument(skip(uam, target, settings))]
    pub fn new(
        target: Target,
        uam: CartesianMap,
        method: Method,
        settings: Settings,
    ) -> Result<Self, StarMapError> {
        if target.origin() != uam.origin() {
            return Err(StarMapError::OriginMismatch { target: target.origin(), uam: uam.origin() });
        }

        Ok(Self { uam, target, method, settings, relations: HashMap::new() })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_fitted(&self) -> bool {
        self.relations.values().flat_map(|entries| entries.values()).all(|slot| slot.approximator.is_some())
    }

    pub fn clear_relations(&mut self) {
        self.relations.clear();
    }

    pub fn set_target(&mut self, target: Target) -> Result<(), StarMapError> {
        if target.origin() != self.uam.origin() {
            return Err(StarMapError::OriginMismatch { target: target.origin(), uam: self.uam.origin() });
        }

        self.target = target;
        if self.is_fitted() {
            self.fit(None)?;
        }
        Ok(())
    }

    pub fn set_method(&mut self, method: Method) -> Result<(), StarMapError> {
        self.method = method;
        if self.is_fitted() {
            self.fit(None)?;
        }
        Ok(())
    }

    fn relation_and_location_types(&self) -> HashMap<String, Vec<Option<String>>> {
        self.relations
            .iter()
            .map(|(relation, entries)| (relation.clone(), entries.keys().cloned().collect()))
            .collect()
    }

    fn slot_mut<'a>(
        relations: &'a mut HashMap<String, HashMap<Option<String>, Slot>>,
        origin: PolarLocation,
        relation: &str,
        location_type: Option<&str>,
    ) -> Result<&'a mut Slot, StarMapError> {
        if registry::lookup(relation).is_none() {
            return Err(StarMapError::UnknownRelation(relation.to_string()));
        }

        let entries = relations.entry(relation.to_string()).or_default();
        Ok(entries.entry(location_type.map(String::from)).or_insert_with(|| Slot {
            support: CartesianCollection::new(origin, 2),
            approximator: None,
        }))
    }

    /// Scans `logic` for the relations it mentions and computes support
    /// points for exactly those, at `support`.
    #[instrument(skip(self, support, logic))]
    pub fn initialize(
        &mut self,
        support: &CartesianCollection,
        number_of_random_maps: usize,
        logic: &str,
    ) -> Result<(), StarMapError> {
        let mut what: HashMap<String, Vec<Option<String>>> = HashMap::new();
        for (relation, location_type) in scanner::scan(logic)? {
            what.entry(relation).or_default().push(location_type);
        }

        self.add_support_points(support, number_of_random_maps, Some(&what))
    }

    /// Computes (mean, variance) for `what` (a mapping of relation name to
    /// the location types to compute it for) at every point in `support`,
    /// via `number_of_random_maps` Monte-Carlo realizations, then refits.
    #[instrument(skip(self, support, what))]
    pub fn add_support_points(
        &mut self,
        support: &CartesianCollection,
        number_of_random_maps: usize,
        what: Option<&HashMap<String, Vec<Option<String>>>>,
    ) -> Result<(), StarMapError> {
        let what = match what {
            Some(what) => what.clone(),
            None => self.relation_and_location_types(),
        };

        let target_origin = self.target.origin();
        let defaults = self.settings.empty_map_defaults();
        let locations = support.to_cartesian_locations();
        let coordinates = support.coordinates();

        for (relation, location_types) in &what {
            let definition = registry::lookup(relation)
                .ok_or_else(|| StarMapError::UnknownRelation(relation.clone()))?;

            for location_type in location_types {
                let filtered_map = definition.filter_map(&self.uam, location_type.as_deref());
                let mut rng =
                    seeded_rng(self.settings.master_seed, relation, location_type.as_deref());

                let moments = sampling::estimate_moments(
                    definition,
                    &filtered_map,
                    &coordinates,
                    number_of_random_maps,
                    &mut rng,
                    &defaults,
                );

                let slot = Self::slot_mut(
                    &mut self.relations,
                    target_origin,
                    relation,
                    location_type.as_deref(),
                )?;
                sampling::append_moments(&mut slot.support, &locations, &moments)?;
            }
        }

        self.fit(Some(&what))
    }

    /// Refits the approximator for every `(relation, location_type)` named
    /// in `what`, or every currently-populated slot when `what` is `None`.
    #[instrument(skip(self, what))]
    pub fn fit(
        &mut self,
        what: Option<&HashMap<String, Vec<Option<String>>>>,
    ) -> Result<(), StarMapError> {
        let what = match what {
            Some(what) => what.clone(),
            None => self.relation_and_location_types(),
        };

        for (relation, location_types) in &what {
            let Some(entries) = self.relations.get_mut(relation) else { continue };

            for location_type in location_types {
                let Some(slot) = entries.get_mut(location_type) else { continue };
                if slot.support.is_empty() {
                    continue;
                }

                let coordinates = slot.support.coordinates();
                let values = collection_rows(&slot.support);
                slot.approximator = Some(approximate::fit(self.method, &coordinates, &values)?);
            }
        }

        Ok(())
    }

    /// Evaluates one relation's approximator at the target, returning its
    /// probabilistic-logic representation.
    #[instrument(skip(self))]
    pub fn get(&self, relation: &str, location_type: Option<&str>) -> Result<Box<dyn Relation>, StarMapError> {
        let definition = registry::lookup(relation)
            .ok_or_else(|| StarMapError::UnknownRelation(relation.to_string()))?;

        let not_fitted = || StarMapError::NotFitted {
            relation: relation.to_string(),
            location_type: location_type.map(String::from),
        };

        let slot = self
            .relations
            .get(relation)
            .and_then(|entries| entries.get(&location_type.map(String::from)))
            .ok_or_else(not_fitted)?;
        let approximator = slot.approximator.as_ref().ok_or_else(not_fitted)?;

        let coordinates = self.target.coordinates();
        let predicted = approximator.predict(&coordinates);
        let v0: Vec<f64> = predicted.iter().map(|row| row[0]).collect();
        let v1: Vec<f64> = predicted.iter().map(|row| row[1]).collect();
        let parameters = self.target.collection().with_values(vec![v0, v1]);

        Ok(match definition.kind() {
            RelationKind::Scalar => Box::new(ScalarRelation::new(
                relation.to_string(),
                location_type.map(String::from),
                parameters,
                self.settings.epsilon_variance,
            )) as Box<dyn Relation>,
            RelationKind::Bernoulli => Box::new(BernoulliRelation::new(
                relation.to_string(),
                location_type.map(String::from),
                parameters,
            )) as Box<dyn Relation>,
        })
    }

    /// Every relation, for every location type it has been computed for.
    pub fn get_all(&self) -> Result<Vec<Box<dyn Relation>>, StarMapError> {
        let mut relations = Vec::new();
        for (relation, entries) in &self.relations {
            for location_type in entries.keys() {
                relations.push(self.get(relation, location_type.as_deref())?);
            }
        }
        Ok(relations)
    }

    /// Only the relations `logic` mentions, in first-mentioned order.
    #[instrument(skip(self, logic))]
    pub fn get_from_logic(&self, logic: &str) -> Result<Vec<Box<dyn Relation>>, StarMapError> {
        let mut seen = HashSet::new();
        let mut relations = Vec::new();

        for (relation, location_type) in scanner::scan(logic)? {
            if seen.insert((relation.clone(), location_type.clone())) {
                relations.push(self.get(&relation, location_type.as_deref())?);
            }
        }

        Ok(relations)
    }

    /// Samples new support points where the Gaussian process is least
    /// confident, weighted by predictive standard deviation, and refits.
    /// Requires a `Target::Raster` and the `gaussian_process` method.
    #[instrument(skip(self, targets))]
    pub fn auto_improve(
        &mut self,
        number_of_random_maps: usize,
        number_of_improvement_points: usize,
        targets: &[(String, Option<String>)],
    ) -> Result<(), StarMapError> {
        let raster = self.target.as_raster()?.clone();
        let origin = raster.collection().origin();
        let coordinates = raster.collection().coordinates();

        for (relation, location_type) in targets {
            let not_fitted = || StarMapError::NotFitted {
                relation: relation.clone(),
                location_type: location_type.clone(),
            };

            let slot = self
                .relations
                .get(relation)
                .ok_or_else(|| StarMapError::UnknownRelation(relation.clone()))?
                .get(location_type)
                .ok_or_else(not_fitted)?;
            let approximator = slot.approximator.as_ref().ok_or_else(not_fitted)?;

            let std = approximator.predictive_std(&coordinates).ok_or_else(|| {
                StarMapError::UnsupportedMethod(
                    "auto_improve requires the gaussian_process method".to_string(),
                )
            })?;

            let mut rng =
                seeded_rng(self.settings.master_seed, relation, location_type.as_deref());
            let chosen = weighted_sample_without_replacement(
                &std,
                number_of_improvement_points,
                &mut rng,
            );

            let east = raster.collection().east();
            let north = raster.collection().north();
            let locations: Vec<CartesianLocation> =
                chosen.iter().map(|&i| CartesianLocation::new(east[i], north[i])).collect();

            let mut improvement_collection = CartesianCollection::new(origin, 1);
            improvement_collection.append_with_default(&locations, &[0.0])?;

            let mut what = HashMap::new();
            what.insert(relation.clone(), vec![location_type.clone()]);
            self.add_support_points(&improvement_collection, number_of_random_maps, Some(&what))?;
        }

        Ok(())
    }

    /// Collapses support points closer than `threshold` into one (the
    /// earliest-added of each cluster), then refits.
    #[instrument(skip(self, targets))]
    pub fn prune(&mut self, threshold: f64, targets: &[(String, Option<String>)]) -> Result<(), StarMapError> {
        let mut what: HashMap<String, Vec<Option<String>>> = HashMap::new();

        for (relation, location_type) in targets {
            let not_fitted = || StarMapError::NotFitted {
                relation: relation.clone(),
                location_type: location_type.clone(),
            };

            let entries = self
                .relations
                .get_mut(relation)
                .ok_or_else(|| StarMapError::UnknownRelation(relation.clone()))?;
            let slot = entries.get_mut(location_type).ok_or_else(not_fitted)?;

            let coordinates = slot.support.coordinates();
            let labels = single_linkage_clusters(&coordinates, threshold);

            let mut first_index_for_label: HashMap<usize, usize> = HashMap::new();
            for (index, &label) in labels.iter().enumerate() {
                first_index_for_label.entry(label).or_insert(index);
            }
            let mut keep: Vec<usize> = first_index_for_label.into_values().collect();
            keep.sort_unstable();

            let locations = slot.support.to_cartesian_locations();
            let pruned_locations: Vec<CartesianLocation> =
                keep.iter().map(|&i| locations[i].clone()).collect();
            let pruned_values: Vec<Vec<f64>> = keep
                .iter()
                .map(|&i| vec![slot.support.value(0)[i], slot.support.value(1)[i]])
                .collect();

            slot.support.clear();
            slot.support.append(&pruned_locations, &pruned_values)?;

            what.entry(relation.clone()).or_default().push(location_type.clone());
        }

        self.fit(Some(&what))
    }

    #[instrument(skip(self, path))]
    pub fn save(&self, path: &Path) -> Result<(), StarMapError> {
        let support = self
            .relations
            .iter()
            .map(|(relation, entries)| {
                let inner: HashMap<Option<String>, CartesianCollection> =
                    entries.iter().map(|(t, slot)| (t.clone(), slot.support.clone())).collect();
                (relation.clone(), inner)
            })
            .collect();

        let persisted = PersistedStarMap {
            uam: self.uam.clone(),
            target: self.target.clone(),
            method: self.method,
            settings: self.settings.clone(),
            support,
        };

        let bytes = bincode::serde::encode_to_vec(&persisted, bincode::config::standard())
            .map_err(|error| StarMapError::Persistence(error.to_string()))?;
        std::fs::write(path, bytes).map_err(|error| StarMapError::Persistence(error.to_string()))
    }

    /// Restores support points (and the UAM, target, method and settings
    /// they were computed against), then refits — fitted approximator
    /// state itself is not persisted, since not every method's state
    /// (e.g. a Cholesky factor) is durably serializable.
    #[instrument(skip(path))]
    pub fn load(path: &Path) -> Result<Self, StarMapError> {
        let bytes =
            std::fs::read(path).map_err(|error| StarMapError::Persistence(error.to_string()))?;
        let (persisted, _): (PersistedStarMap, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|error| StarMapError::Persistence(error.to_string()))?;

        let relations = persisted
            .support
            .into_iter()
            .map(|(relation, entries)| {
                let inner = entries
                    .into_iter()
                    .map(|(location_type, support)| {
                        (location_type, Slot { support, approximator: None })
                    })
                    .collect();
                (relation, inner)
            })
            .collect();

        let mut star_map = Self {
            uam: persisted.uam,
            target: persisted.target,
            method: persisted.method,
            settings: persisted.settings,
            relations,
        };
        star_map.fit(None)?;
        Ok(star_map)
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedStarMap {
    uam: CartesianMap,
    target: Target,
    method: Method,
    settings: Settings,
    support: HashMap<String, HashMap<Option<String>, CartesianCollection>>,
}

fn collection_rows(collection: &CartesianCollection) -> Vec<Vec<f64>> {
    collection.value(0).iter().zip(collection.value(1)).map(|(&m, &v)| vec![m, v]).collect()
}

/// A deterministic per-`(relation, location_type)` RNG stream, derived from
/// the configured master seed so repeated runs reproduce identical support
/// data (spec.md §5).
fn seeded_rng(master_seed: u64, relation: &str, location_type: Option<&str>) -> ChaCha8Rng {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    master_seed.hash(&mut hasher);
    relation.hash(&mut hasher);
    location_type.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}

/// Efraimidis-Spirakis weighted sampling without replacement: each item's
/// key is `ln(u) / weight` for `u ~ Uniform(0,1)`; the `k` largest keys are
/// the sample. Non-positive weights are floored so every point remains
/// reachable (used when predictive std is numerically zero).
fn weighted_sample_without_replacement(weights: &[f64], k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let k = k.min(weights.len());
    let mut keyed: Vec<(f64, usize)> = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| {
            let weight = weight.max(1e-12);
            let u: f64 = rng.gen_range(1e-12_f64..1.0);
            (u.ln() / weight, index)
        })
        .collect();

    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    keyed.into_iter().take(k).map(|(_, index)| index).collect()
}

/// Single-linkage clustering by threshold distance, via union-find. Returns
/// one cluster label per point (the label is that cluster's root index,
/// not a compact 0..k id).
fn single_linkage_clusters(points: &[[f64; 2]], threshold: f64) -> Vec<usize> {
    let n = points.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], i: usize) -> usize {
        if parent[i] != i {
            parent[i] = find(parent, parent[i]);
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = points[i][0] - points[j][0];
            let dy = points[i][1] - points[j][1];
            if (dx * dx + dy * dy).sqrt() <= threshold {
                let root_i = find(&mut parent, i);
                let root_j = find(&mut parent, j);
                if root_i != root_j {
                    parent[root_i] = root_j;
                }
            }
        }
    }

    (0..n).map(|i| find(&mut parent, i)).collect()
}
