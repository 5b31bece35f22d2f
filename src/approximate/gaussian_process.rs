//! Hand-rolled Gaussian process regression: `kernel = c * RBF(l=(1,1)) +
//! WhiteNoise`, fitted by restart-optimised marginal likelihood (spec.md
//! §4.4). No crate in this corpus offers GP regression, so this follows the
//! same "hand-rolled kernel over nalgebra" shape used for Bayesian models
//! elsewhere in the examples pack.

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{Approximator, ApproximateError};

/// Fixed length scale per spec.md §4.4's literal kernel text (`ℓ=(1,1)`).
const LENGTH_SCALE: f64 = 1.0;
const RESTARTS: usize = 5;
const ITERATIONS_PER_RESTART: usize = 40;

pub struct GaussianProcessApproximator {
    coordinate_mean: [f64; 2],
    coordinate_std: [f64; 2],
    support_coordinates: Vec<[f64; 2]>,
    y_mean: Vec<f64>,
    y_std: Vec<f64>,
    /// `K^-1 y` per output dimension, y already standardised.
    alpha: Vec<DVector<f64>>,
    cholesky: Cholesky<f64, nalgebra::Dynamic>,
    signal_variance: f64,
}

impl GaussianProcessApproximator {
    pub fn fit(coordinates: &[[f64; 2]], values: &[Vec<f64>]) -> Result<Self, ApproximateError> {
        let n = coordinates.len();
        let dimensions = values[0].len();

        let (coordinate_mean, coordinate_std) = standardize_stats(coordinates);
        let standardized_coords: Vec<[f64; 2]> = coordinates
            .iter()
            .map(|p| {
                [
                    (p[0] - coordinate_mean[0]) / coordinate_std[0],
                    (p[1] - coordinate_mean[1]) / coordinate_std[1],
                ]
            })
            .collect();

        let correlation = rbf_matrix(&standardized_coords, &standardized_coords);

        let mut y_mean = vec![0.0; dimensions];
        let mut y_std = vec![1.0; dimensions];
        let mut standardized_y: Vec<DVector<f64>> = Vec::with_capacity(dimensions);
        for d in 0..dimensions {
            let column: Vec<f64> = values.iter().map(|v| v[d]).collect();
            let mean = column.iter().sum::<f64>() / n as f64;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let std = variance.sqrt().max(1e-6);
            y_mean[d] = mean;
            y_std[d] = std;
            standardized_y.push(DVector::from_vec(
                column.iter().map(|v| (v - mean) / std).collect(),
            ));
        }

        // Only one output dimension drives the hyperparameter search (the
        // kernel is shared across dimensions); the others reuse its fit.
        let (signal_variance, noise_variance) =
            optimize_hyperparameters(&correlation, &standardized_y[0]);

        let k = correlation.clone() * signal_variance + DMatrix::identity(n, n) * noise_variance;
        let cholesky = k.clone().cholesky().ok_or_else(|| ApproximateError::FitFailed {
            reason: "kernel matrix is not positive definite at the optimised hyperparameters"
                .into(),
        })?;

        let alpha = standardized_y.iter().map(|y| cholesky.solve(y)).collect();

        Ok(Self {
            coordinate_mean,
            coordinate_std,
            support_coordinates: standardized_coords,
            y_mean,
            y_std,
            alpha,
            cholesky,
            signal_variance,
        })
    }

    fn standardize_query(&self, coordinates: &[[f64; 2]]) -> Vec<[f64; 2]> {
        coordinates
            .iter()
            .map(|p| {
                [
                    (p[0] - self.coordinate_mean[0]) / self.coordinate_std[0],
                    (p[1] - self.coordinate_mean[1]) / self.coordinate_std[1],
                ]
            })
            .collect()
    }

    pub fn predictive_std(&self, coordinates: &[[f64; 2]]) -> Vec<f64> {
        let queries = self.standardize_query(coordinates);
        let cross = rbf_matrix(&queries, &self.support_coordinates) * self.signal_variance;

        (0..queries.len())
            .map(|i| {
                let k_star = cross.row(i).transpose();
                let v = self.cholesky.l().solve_lower_triangular(&k_star).unwrap_or_else(|| {
                    DVector::zeros(self.support_coordinates.len())
                });
                (self.signal_variance - v.dot(&v)).max(0.0).sqrt()
            })
            .collect()
    }
}

impl Approximator for GaussianProcessApproximator {
    fn predict(&self, coordinates: &[[f64; 2]]) -> Vec<Vec<f64>> {
        let queries = self.standardize_query(coordinates);
        let cross = rbf_matrix(&queries, &self.support_coordinates) * self.signal_variance;

        (0..queries.len())
            .map(|i| {
                let k_star = cross.row(i).transpose();
                self.alpha
                    .iter()
                    .enumerate()
                    .map(|(d, alpha_d)| k_star.dot(alpha_d) * self.y_std[d] + self.y_mean[d])
                    .collect()
            })
            .collect()
    }
}

fn standardize_stats(coordinates: &[[f64; 2]]) -> ([f64; 2], [f64; 2]) {
    let n = coordinates.len() as f64;
    let mean_x = coordinates.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = coordinates.iter().map(|p| p[1]).sum::<f64>() / n;
    let var_x = coordinates.iter().map(|p| (p[0] - mean_x).powi(2)).sum::<f64>() / n;
    let var_y = coordinates.iter().map(|p| (p[1] - mean_y).powi(2)).sum::<f64>() / n;

    ([mean_x, mean_y], [var_x.sqrt().max(1e-6), var_y.sqrt().max(1e-6)])
}

fn rbf_matrix(queries: &[[f64; 2]], support: &[[f64; 2]]) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(queries.len(), support.len());
    for (i, q) in queries.iter().enumerate() {
        for (j, s) in support.iter().enumerate() {
            let dx = (q[0] - s[0]) / LENGTH_SCALE;
            let dy = (q[1] - s[1]) / LENGTH_SCALE;
            matrix[(i, j)] = (-0.5 * (dx * dx + dy * dy)).exp();
        }
    }
    matrix
}

fn negative_log_marginal_likelihood(
    correlation: &DMatrix<f64>,
    y: &DVector<f64>,
    signal_variance: f64,
    noise_variance: f64,
) -> Option<f64> {
    let n = y.len();
    let k = correlation.clone() * signal_variance + DMatrix::identity(n, n) * noise_variance;
    let cholesky = k.cholesky()?;
    let alpha = cholesky.solve(y);

    let log_det: f64 = cholesky.l().diagonal().iter().map(|v| v.ln()).sum::<f64>() * 2.0;
    let data_fit = y.dot(&alpha);

    Some(0.5 * data_fit + 0.5 * log_det + 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln())
}

/// Multi-restart coordinate-descent search over `(signal_variance,
/// noise_variance)` in log-space, minimising negative log marginal
/// likelihood. Restarts guard against the search settling in a poor local
/// optimum from a single starting point.
fn optimize_hyperparameters(correlation: &DMatrix<f64>, y: &DVector<f64>) -> (f64, f64) {
    let mut rng = ChaCha8Rng::seed_from_u64(0xA5A5_1234);
    let mut best = (1.0_f64, 1e-2_f64);
    let mut best_score = negative_log_marginal_likelihood(correlation, y, best.0, best.1)
        .unwrap_or(f64::INFINITY);

    for _ in 0..RESTARTS {
        let mut log_signal = rng.gen_range(-2.0_f64..2.0);
        let mut log_noise = rng.gen_range(-6.0_f64..0.0);
        let mut step = 1.0_f64;

        for _ in 0..ITERATIONS_PER_RESTART {
            let mut improved = false;
            for (dlog_signal, dlog_noise) in
                [(step, 0.0), (-step, 0.0), (0.0, step), (0.0, -step)]
            {
                let candidate_signal = (log_signal + dlog_signal).exp();
                let candidate_noise = (log_noise + dlog_noise).exp();
                if let Some(score) = negative_log_marginal_likelihood(
                    correlation,
                    y,
                    candidate_signal,
                    candidate_noise,
                ) {
                    if score < best_score {
                        best_score = score;
                        best = (candidate_signal, candidate_noise);
                        log_signal += dlog_signal;
                        log_noise += dlog_noise;
                        improved = true;
                    }
                }
            }
            if !improved {
                step *= 0.5;
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_and_predicts_support_points_closely() {
        let coordinates = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, 0.5]];
        let values: Vec<Vec<f64>> =
            coordinates.iter().map(|p| vec![p[0] + p[1]]).collect();

        let gp = GaussianProcessApproximator::fit(&coordinates, &values).unwrap();
        let prediction = gp.predict(&coordinates);

        for (predicted, actual) in prediction.iter().zip(&values) {
            assert!((predicted[0] - actual[0]).abs() < 0.5);
        }
    }

    #[test]
    fn predictive_std_is_nonnegative() {
        let coordinates = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]];
        let values = vec![vec![1.0], vec![2.0], vec![1.5]];

        let gp = GaussianProcessApproximator::fit(&coordinates, &values).unwrap();
        let std = gp.predictive_std(&[[0.5, 0.5], [10.0, 10.0]]);

        assert!(std.iter().all(|&s| s >= 0.0));
    }
}
