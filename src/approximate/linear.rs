//! Linear scattered-data interpolation: a grid-specialised bilinear
//! interpolator when support forms a regular grid (the common case, since
//! [`crate::geo::CartesianRasterBand`] support is always a grid), falling
//! back to inverse-distance weighting over genuinely scattered support.

use std::collections::HashMap;

use super::Approximator;

const EPSILON: f64 = 1e-9;

enum Strategy {
    Grid { rows: Vec<f64>, cols: Vec<f64>, values: HashMap<(usize, usize), Vec<f64>> },
    InverseDistanceWeighted { coordinates: Vec<[f64; 2]>, values: Vec<Vec<f64>> },
}

pub struct LinearApproximator {
    strategy: Strategy,
}

impl LinearApproximator {
    pub fn fit(coordinates: &[[f64; 2]], values: &[Vec<f64>]) -> Self {
        let strategy = detect_grid(coordinates)
            .map(|(rows, cols)| {
                let mut grid = HashMap::with_capacity(coordinates.len());
                for (point, value) in coordinates.iter().zip(values) {
                    let row = index_of(&rows, point[1]);
                    let col = index_of(&cols, point[0]);
                    grid.insert((row, col), value.clone());
                }
                Strategy::Grid { rows, cols, values: grid }
            })
            .unwrap_or_else(|| Strategy::InverseDistanceWeighted {
                coordinates: coordinates.to_vec(),
                values: values.to_vec(),
            });

        Self { strategy }
    }
}

impl Approximator for LinearApproximator {
    fn predict(&self, coordinates: &[[f64; 2]]) -> Vec<Vec<f64>> {
        match &self.strategy {
            Strategy::Grid { rows, cols, values } => {
                coordinates.iter().map(|q| bilinear(rows, cols, values, *q)).collect()
            }
            Strategy::InverseDistanceWeighted { coordinates: support, values } => {
                coordinates.iter().map(|q| inverse_distance_weighted(support, values, *q)).collect()
            }
        }
    }
}

/// Detects a regular axis-aligned grid: every distinct east and north value
/// co-occurs with every other, i.e. `rows.len() * cols.len() == N`.
fn detect_grid(coordinates: &[[f64; 2]]) -> Option<(Vec<f64>, Vec<f64>)> {
    let mut rows = sorted_unique(coordinates.iter().map(|p| p[1]));
    let mut cols = sorted_unique(coordinates.iter().map(|p| p[0]));
    rows.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    cols.dedup_by(|a, b| (*a - *b).abs() < EPSILON);

    if rows.len() * cols.len() != coordinates.len() || rows.len() < 2 || cols.len() < 2 {
        return None;
    }

    let mut seen = vec![vec![false; cols.len()]; rows.len()];
    for point in coordinates {
        let row = index_of(&rows, point[1]);
        let col = index_of(&cols, point[0]);
        seen[row][col] = true;
    }
    if seen.iter().all(|row| row.iter().all(|&present| present)) {
        Some((rows, cols))
    } else {
        None
    }
}

fn sorted_unique(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    v
}

fn index_of(sorted: &[f64], value: f64) -> usize {
    sorted
        .iter()
        .position(|&v| (v - value).abs() < EPSILON)
        .expect("value was drawn from this axis's own unique set")
}

fn bilinear(
    rows: &[f64],
    cols: &[f64],
    values: &HashMap<(usize, usize), Vec<f64>>,
    query: [f64; 2],
) -> Vec<f64> {
    let (east, north) = (query[0], query[1]);

    let col_hi = cols.iter().position(|&c| c >= east).unwrap_or(cols.len() - 1).max(1);
    let col_lo = col_hi - 1;
    let row_hi = rows.iter().position(|&r| r >= north).unwrap_or(rows.len() - 1).max(1);
    let row_lo = row_hi - 1;

    let tx = ((east - cols[col_lo]) / (cols[col_hi] - cols[col_lo]).max(EPSILON)).clamp(0.0, 1.0);
    let ty = ((north - rows[row_lo]) / (rows[row_hi] - rows[row_lo]).max(EPSILON)).clamp(0.0, 1.0);

    let v00 = &values[&(row_lo, col_lo)];
    let v10 = &values[&(row_lo, col_hi)];
    let v01 = &values[&(row_hi, col_lo)];
    let v11 = &values[&(row_hi, col_hi)];

    (0..v00.len())
        .map(|d| {
            let bottom = v00[d] * (1.0 - tx) + v10[d] * tx;
            let top = v01[d] * (1.0 - tx) + v11[d] * tx;
            bottom * (1.0 - ty) + top * ty
        })
        .collect()
}

fn inverse_distance_weighted(
    support: &[[f64; 2]],
    values: &[Vec<f64>],
    query: [f64; 2],
) -> Vec<f64> {
    for (point, value) in support.iter().zip(values) {
        let d2 = (point[0] - query[0]).powi(2) + (point[1] - query[1]).powi(2);
        if d2 < EPSILON {
            return value.clone();
        }
    }

    let dimensions = values[0].len();
    let mut weighted = vec![0.0; dimensions];
    let mut weight_sum = 0.0;

    for (point, value) in support.iter().zip(values) {
        let d2 = (point[0] - query[0]).powi(2) + (point[1] - query[1]).powi(2);
        let weight = 1.0 / d2;
        weight_sum += weight;
        for d in 0..dimensions {
            weighted[d] += weight * value[d];
        }
    }

    weighted.iter().map(|v| v / weight_sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_center_of_unit_square() {
        let coordinates =
            vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let values = vec![vec![0.0], vec![1.0], vec![1.0], vec![2.0]];
        let approximator = LinearApproximator::fit(&coordinates, &values);

        let prediction = approximator.predict(&[[0.5, 0.5]]);
        assert!((prediction[0][0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bilinear_reproduces_support_points_exactly() {
        let coordinates = vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [2.0, 2.0]];
        let values = vec![vec![5.0], vec![6.0], vec![7.0], vec![8.0]];
        let approximator = LinearApproximator::fit(&coordinates, &values);

        let prediction = approximator.predict(&[[0.0, 0.0], [2.0, 2.0]]);
        assert_eq!(prediction[0][0], 5.0);
        assert_eq!(prediction[1][0], 8.0);
    }

    #[test]
    fn scattered_support_falls_back_to_idw() {
        let coordinates = vec![[0.0, 0.0], [5.0, 3.0], [2.0, 7.0]];
        let values = vec![vec![1.0], vec![2.0], vec![3.0]];
        let approximator = LinearApproximator::fit(&coordinates, &values);

        let prediction = approximator.predict(&[[0.0, 0.0]]);
        assert!((prediction[0][0] - 1.0).abs() < 1e-6);
    }
}
