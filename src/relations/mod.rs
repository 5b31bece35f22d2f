//! Relations: probabilistic abstractions of geometric predicates, and the
//! registry that maps a relation name to its kernel and arity.
//!
//! Resolves the cyclic-dependency concern between relation classes and the
//! StaR Map by having relations know nothing about the map store; the store
//! only ever talks to relations through [`RelationDefinition`] and
//! [`registry::lookup`].

mod depth;
mod distance;
mod over;
pub mod registry;

pub use depth::Depth;
pub use distance::Distance;
pub use over::Over;
pub use registry::{lookup, RelationDefinition, RelationKind};

use statrs::distribution::{ContinuousCDF, Normal};

use crate::geo::{CartesianCollection, CollectionError};

/// Sentinel (mean, variance) values substituted when a relation's filtered
/// map has no features of the requested type. A configuration knob per
/// spec.md §9 ("do not guess"): distance needs a defensible large mean and
/// tiny variance so downstream normal-CDF evaluation stays well-defined.
#[derive(Debug, Clone, Copy)]
pub struct EmptyMapDefaults {
    pub distance_mean: f64,
    pub distance_variance: f64,
}

impl Default for EmptyMapDefaults {
    fn default() -> Self {
        Self { distance_mean: 1e9, distance_variance: 1e-3 }
    }
}

/// Common behaviour shared by every relation: identity, emitted clause
/// syntax, and opaque persistence of its parameters.
pub trait Relation {
    fn name(&self) -> &str;
    fn location_type(&self) -> Option<&str>;
    fn parameters(&self) -> &CartesianCollection;

    /// Renders the clause for one target point index (spec.md §4.6).
    fn clause_at(&self, index: usize) -> String;

    /// Renders every point's clause, in index order.
    fn to_plp(&self) -> String {
        let mut text = String::new();
        for index in 0..self.parameters().len() {
            text.push_str(&self.clause_at(index));
        }
        text
    }
}

/// A relation whose value at each point is Gaussian `N(mean, variance)`.
#[derive(Debug, Clone)]
pub struct ScalarRelation {
    name: String,
    location_type: Option<String>,
    parameters: CartesianCollection,
}

impl ScalarRelation {
    /// Constructs from (mean, variance) parameters, clipping variance to
    /// `enforced_min_variance` as spec.md §3's invariant requires.
    pub fn new(
        name: impl Into<String>,
        location_type: Option<String>,
        mut parameters: CartesianCollection,
        enforced_min_variance: f64,
    ) -> Self {
        parameters.clip_min(1, enforced_min_variance);
        Self { name: name.into(), location_type, parameters }
    }

    /// `P(relation < value)` at every point, via the normal CDF.
    pub fn less_than(&self, value: f64) -> Result<CartesianCollection, CollectionError> {
        let means = self.parameters.value(0);
        let variances = self.parameters.value(1);

        let mut probabilities = Vec::with_capacity(means.len());
        for (&mean, &variance) in means.iter().zip(variances) {
            let normal = Normal::new(mean, variance.sqrt())
                .expect("variance is enforced positive at construction");
            probabilities.push(vec![normal.cdf(value)]);
        }

        let mut result = CartesianCollection::new(self.parameters.origin(), 1);
        result.append(&self.parameters.to_cartesian_locations(), &probabilities)?;
        Ok(result)
    }

    /// `P(relation > value) = 1 - P(relation < value)`.
    pub fn greater_than(&self, value: f64) -> Result<CartesianCollection, CollectionError> {
        let below = self.less_than(value)?;
        let complemented: Vec<f64> = below.value(0).iter().map(|p| 1.0 - p).collect();
        Ok(below.with_values(vec![complemented]))
    }
}

impl Relation for ScalarRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn location_type(&self) -> Option<&str> {
        self.location_type.as_deref()
    }

    fn parameters(&self) -> &CartesianCollection {
        &self.parameters
    }

    fn clause_at(&self, index: usize) -> String {
        let mean = self.parameters.value(0)[index];
        let variance = self.parameters.value(1)[index];
        match &self.location_type {
            Some(location_type) => format!(
                "{}(x_{}, {}) ~ normal({}, {}).\n",
                self.name, index, location_type, mean, variance
            ),
            None => format!("{}(x_{}) ~ normal({}, {}).\n", self.name, index, mean, variance),
        }
    }
}

/// A relation whose value at each point is `Bernoulli(p = mean)`.
#[derive(Debug, Clone)]
pub struct BernoulliRelation {
    name: String,
    location_type: Option<String>,
    parameters: CartesianCollection,
}

impl BernoulliRelation {
    pub fn new(
        name: impl Into<String>,
        location_type: Option<String>,
        parameters: CartesianCollection,
    ) -> Self {
        Self { name: name.into(), location_type, parameters }
    }
}

impl Relation for BernoulliRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn location_type(&self) -> Option<&str> {
        self.location_type.as_deref()
    }

    fn parameters(&self) -> &CartesianCollection {
        &self.parameters
    }

    fn clause_at(&self, index: usize) -> String {
        let probability = self.parameters.value(0)[index];
        match &self.location_type {
            Some(location_type) => {
                format!("{}::{}(x_{}, {}).\n", probability, self.name, index, location_type)
            }
            None => format!("{}::{}(x_{}).\n", probability, self.name, index),
        }
    }
}
