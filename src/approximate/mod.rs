//! Scattered-data approximators fitted over support points and evaluated at
//! arbitrary target coordinates (spec.md §4.4's approximator contracts).

mod gaussian_process;
mod linear;
mod nearest;

pub use gaussian_process::GaussianProcessApproximator;
pub use linear::LinearApproximator;
pub use nearest::NearestApproximator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApproximateError {
    #[error("cannot fit an approximator with no support points")]
    NoSupportPoints,
    #[error("gaussian process fit failed to converge: {reason}")]
    FitFailed { reason: String },
}

/// A fitted scattered-data interpolator: `(N,2)` coordinates in, `(N,D)`
/// values out.
pub trait Approximator: Send + Sync {
    fn predict(&self, coordinates: &[[f64; 2]]) -> Vec<Vec<f64>>;
}

/// A fitted approximator, keeping the Gaussian process variant concrete so
/// `auto_improve` (spec.md §4.4) can query its predictive standard
/// deviation — a capability only that method has.
pub enum FittedApproximator {
    Nearest(NearestApproximator),
    Linear(LinearApproximator),
    GaussianProcess(GaussianProcessApproximator),
}

impl FittedApproximator {
    pub fn predict(&self, coordinates: &[[f64; 2]]) -> Vec<Vec<f64>> {
        match self {
            FittedApproximator::Nearest(a) => a.predict(coordinates),
            FittedApproximator::Linear(a) => a.predict(coordinates),
            FittedApproximator::GaussianProcess(a) => a.predict(coordinates),
        }
    }

    /// Predictive standard deviation, available only for the Gaussian
    /// process method.
    pub fn predictive_std(&self, coordinates: &[[f64; 2]]) -> Option<Vec<f64>> {
        match self {
            FittedApproximator::GaussianProcess(a) => Some(a.predictive_std(coordinates)),
            _ => None,
        }
    }
}

/// The interpolation method a StaR Map slot is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Linear,
    Nearest,
    GaussianProcess,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Method::Linear),
            "nearest" => Some(Method::Nearest),
            "gaussian_process" => Some(Method::GaussianProcess),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Linear => "linear",
            Method::Nearest => "nearest",
            Method::GaussianProcess => "gaussian_process",
        }
    }
}

/// Fits the approximator named by `method` over `coordinates`/`values`.
pub fn fit(
    method: Method,
    coordinates: &[[f64; 2]],
    values: &[Vec<f64>],
) -> Result<FittedApproximator, ApproximateError> {
    if coordinates.is_empty() {
        return Err(ApproximateError::NoSupportPoints);
    }

    Ok(match method {
        Method::Nearest => FittedApproximator::Nearest(NearestApproximator::fit(coordinates, values)),
        Method::Linear => FittedApproximator::Linear(LinearApproximator::fit(coordinates, values)),
        Method::GaussianProcess => {
            FittedApproximator::GaussianProcess(GaussianProcessApproximator::fit(coordinates, values)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_round_trips_known_names() {
        for name in ["linear", "nearest", "gaussian_process"] {
            assert_eq!(Method::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn method_parse_rejects_unknown() {
        assert!(Method::parse("cubic").is_none());
    }

    #[test]
    fn fit_rejects_empty_support() {
        let result = fit(Method::Nearest, &[], &[]);
        assert!(matches!(result, Err(ApproximateError::NoSupportPoints)));
    }
}
