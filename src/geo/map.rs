//! Map features with optional positional uncertainty, and perturbed sampling.

use nalgebra::Matrix2;
use rand::Rng;
use rand_distr::{Distribution as _, StandardNormal};
use serde::{Deserialize, Serialize};

use super::location::PolarLocation;

/// The nominal shape of a map feature, in the map's Cartesian frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point([f64; 2]),
    Line(Vec<[f64; 2]>),
    Polygon(Vec<[f64; 2]>),
}

impl Geometry {
    /// Euclidean distance from `query` to the nearest part of this geometry.
    pub fn distance_to(&self, query: [f64; 2]) -> f64 {
        match self {
            Geometry::Point(p) => euclidean(query, *p),
            Geometry::Line(points) => distance_to_polyline(query, points, false),
            Geometry::Polygon(points) => distance_to_polyline(query, points, true),
        }
    }

    /// Point-in-polygon test via ray casting. Points and lines have no
    /// interior, so they never contain anything.
    pub fn contains(&self, query: [f64; 2]) -> bool {
        match self {
            Geometry::Point(_) | Geometry::Line(_) => false,
            Geometry::Polygon(points) => point_in_polygon(query, points),
        }
    }

    fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            Geometry::Point([x, y]) => Geometry::Point([x + dx, y + dy]),
            Geometry::Line(points) => {
                Geometry::Line(points.iter().map(|[x, y]| [x + dx, y + dy]).collect())
            }
            Geometry::Polygon(points) => {
                Geometry::Polygon(points.iter().map(|[x, y]| [x + dx, y + dy]).collect())
            }
        }
    }
}

fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

fn distance_to_segment(query: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let abx = b[0] - a[0];
    let aby = b[1] - a[1];
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return euclidean(query, a);
    }
    let t = (((query[0] - a[0]) * abx) + ((query[1] - a[1]) * aby)) / len2;
    let t = t.clamp(0.0, 1.0);
    let projection = [a[0] + t * abx, a[1] + t * aby];
    euclidean(query, projection)
}

fn distance_to_polyline(query: [f64; 2], points: &[[f64; 2]], closed: bool) -> f64 {
    if points.is_empty() {
        return f64::INFINITY;
    }
    if points.len() == 1 {
        return euclidean(query, points[0]);
    }

    let mut min = f64::INFINITY;
    for window in points.windows(2) {
        min = min.min(distance_to_segment(query, window[0], window[1]));
    }
    if closed {
        min = min.min(distance_to_segment(query, points[points.len() - 1], points[0]));
    }
    min
}

fn point_in_polygon(query: [f64; 2], points: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[i][0], points[i][1]);
        let (xj, yj) = (points[j][0], points[j][1]);

        let intersects = (yi > query[1]) != (yj > query[1])
            && query[0] < (xj - xi) * (query[1] - yi) / (yj - yi) + xi;
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A 2-D Gaussian over positional offsets, used as a feature's noise model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gaussian2D {
    pub covariance: Matrix2<f64>,
}

impl Gaussian2D {
    pub fn new(covariance: Matrix2<f64>) -> Self {
        Self { covariance }
    }

    pub fn isotropic(variance: f64) -> Self {
        Self::new(Matrix2::new(variance, 0.0, 0.0, variance))
    }

    /// Draws one (dx, dy) offset. Degenerate (non positive-definite)
    /// covariance — e.g. all zero — yields no offset.
    pub fn sample(&self, rng: &mut impl Rng) -> (f64, f64) {
        let Some(cholesky) = self.covariance.cholesky() else {
            return (0.0, 0.0);
        };
        let z = nalgebra::Vector2::new(
            StandardNormal.sample(rng),
            StandardNormal.sample(rng),
        );
        let offset = cholesky.l() * z;
        (offset.x, offset.y)
    }
}

/// A single map feature: a nominal geometry, its opaque location-type tag,
/// and an optional positional distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianFeature {
    pub geometry: Geometry,
    pub location_type: String,
    pub distribution: Option<Gaussian2D>,
}

impl CartesianFeature {
    pub fn new(geometry: Geometry, location_type: impl Into<String>) -> Self {
        Self { geometry, location_type: location_type.into(), distribution: None }
    }

    pub fn with_distribution(mut self, distribution: Gaussian2D) -> Self {
        self.distribution = Some(distribution);
        self
    }

    /// Draws one realization: nominal geometry translated by a single
    /// (dx, dy) draw, applied uniformly to every vertex.
    pub fn sample(&self, rng: &mut impl Rng) -> Geometry {
        match &self.distribution {
            Some(distribution) => {
                let (dx, dy) = distribution.sample(rng);
                self.geometry.translated(dx, dy)
            }
            None => self.geometry.clone(),
        }
    }
}

/// An uncertainty-annotated map: a set of features sharing one Cartesian origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianMap {
    origin: PolarLocation,
    features: Vec<CartesianFeature>,
}

impl CartesianMap {
    pub fn new(origin: PolarLocation, features: Vec<CartesianFeature>) -> Self {
        Self { origin, features }
    }

    pub fn origin(&self) -> PolarLocation {
        self.origin
    }

    pub fn features(&self) -> &[CartesianFeature] {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Restricts to features of one location type.
    pub fn filter(&self, location_type: &str) -> CartesianMap {
        CartesianMap {
            origin: self.origin,
            features: self
                .features
                .iter()
                .filter(|f| f.location_type == location_type)
                .cloned()
                .collect(),
        }
    }

    /// Draws one realized map: every feature perturbed independently by its
    /// own distribution (or left nominal if it has none).
    pub fn sample(&self, rng: &mut impl Rng) -> Vec<Geometry> {
        self.features.iter().map(|f| f.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn origin() -> PolarLocation {
        PolarLocation::new(49.0, 8.0)
    }

    #[test]
    fn point_distance_is_euclidean() {
        let geometry = Geometry::Point([3.0, 4.0]);
        assert_eq!(geometry.distance_to([0.0, 0.0]), 5.0);
    }

    #[test]
    fn polygon_contains_interior_point() {
        let square = Geometry::Polygon(vec![
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ]);
        assert!(square.contains([0.0, 0.0]));
        assert!(!square.contains([5.0, 5.0]));
    }

    #[test]
    fn zero_covariance_feature_samples_nominal_geometry() {
        let feature = CartesianFeature::new(Geometry::Point([1.0, 2.0]), "operator")
            .with_distribution(Gaussian2D::isotropic(0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let realization = feature.sample(&mut rng);
        assert_eq!(realization, Geometry::Point([1.0, 2.0]));
    }

    #[test]
    fn filter_restricts_by_location_type() {
        let map = CartesianMap::new(
            origin(),
            vec![
                CartesianFeature::new(Geometry::Point([0.0, 0.0]), "operator"),
                CartesianFeature::new(Geometry::Point([1.0, 1.0]), "primary"),
            ],
        );

        let filtered = map.filter("operator");
        assert_eq!(filtered.features().len(), 1);
        assert_eq!(filtered.features()[0].location_type, "operator");
    }

    #[test]
    fn sample_perturbs_each_feature_independently() {
        let map = CartesianMap::new(
            origin(),
            vec![CartesianFeature::new(Geometry::Point([0.0, 0.0]), "operator")
                .with_distribution(Gaussian2D::isotropic(4.0))],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let realization = map.sample(&mut rng);
        assert_eq!(realization.len(), 1);
    }
}
