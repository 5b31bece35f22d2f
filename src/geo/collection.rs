//! Columnar collections of Cartesian points carrying per-point value vectors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::location::{CartesianLocation, PolarLocation};

/// Errors raised by [`CartesianCollection`] mutation.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("value vector has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("locations and values must have the same length, got {locations} and {values}")]
    LengthMismatch { locations: usize, values: usize },
}

/// An ordered sequence of Cartesian points sharing one origin, each carrying
/// a fixed-dimensionality value vector (D=1 for scalars, D=2 for Gaussian
/// (mean, variance) pairs).
///
/// Columnar access (`east`, `north`, `value(d)`) keeps per-dimension
/// operations (e.g. clipping variance) allocation-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianCollection {
    origin: PolarLocation,
    dimensions: usize,
    east: Vec<f64>,
    north: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl CartesianCollection {
    pub fn new(origin: PolarLocation, dimensions: usize) -> Self {
        Self {
            origin,
            dimensions,
            east: Vec::new(),
            north: Vec::new(),
            values: vec![Vec::new(); dimensions],
        }
    }

    pub fn origin(&self) -> PolarLocation {
        self.origin
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.east.len()
    }

    pub fn is_empty(&self) -> bool {
        self.east.is_empty()
    }

    pub fn east(&self) -> &[f64] {
        &self.east
    }

    pub fn north(&self) -> &[f64] {
        &self.north
    }

    /// Columnar access to the d-th value dimension (`v{d}[i]`).
    pub fn value(&self, dimension: usize) -> &[f64] {
        &self.values[dimension]
    }

    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.east.iter().zip(&self.north).map(|(&e, &n)| [e, n]).collect()
    }

    pub fn to_cartesian_locations(&self) -> Vec<CartesianLocation> {
        self.east
            .iter()
            .zip(&self.north)
            .map(|(&east, &north)| CartesianLocation::new(east, north))
            .collect()
    }

    /// Appends points with explicit per-point value vectors.
    pub fn append(
        &mut self,
        locations: &[CartesianLocation],
        values: &[Vec<f64>],
    ) -> Result<(), CollectionError> {
        if locations.len() != values.len() {
            return Err(CollectionError::LengthMismatch {
                locations: locations.len(),
                values: values.len(),
            });
        }

        for value in values {
            if value.len() != self.dimensions {
                return Err(CollectionError::DimensionMismatch {
                    expected: self.dimensions,
                    got: value.len(),
                });
            }
        }

        for (location, value) in locations.iter().zip(values) {
            self.east.push(location.east);
            self.north.push(location.north);
            for (dimension, component) in value.iter().enumerate() {
                self.values[dimension].push(*component);
            }
        }

        Ok(())
    }

    /// Appends points, repeating a single sentinel value vector for each.
    pub fn append_with_default(
        &mut self,
        locations: &[CartesianLocation],
        default: &[f64],
    ) -> Result<(), CollectionError> {
        let values = vec![default.to_vec(); locations.len()];
        self.append(locations, &values)
    }

    pub fn clear(&mut self) {
        self.east.clear();
        self.north.clear();
        for column in &mut self.values {
            column.clear();
        }
    }

    /// Clips every value in a dimension to a minimum, in place.
    pub fn clip_min(&mut self, dimension: usize, minimum: f64) {
        for v in &mut self.values[dimension] {
            if *v < minimum {
                *v = minimum;
            }
        }
    }

    /// Produces a collection with the same geometry but replaced value
    /// columns — the shape used by `StaRMap::get` to write fitted
    /// (mean, variance) pairs over a copy of the target grid.
    pub fn with_values(&self, values: Vec<Vec<f64>>) -> Self {
        Self {
            origin: self.origin,
            dimensions: values.len(),
            east: self.east.clone(),
            north: self.north.clone(),
            values,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map(|(v, _)| v)
    }
}

/// A [`CartesianCollection`] whose points form a regular `rows × cols` grid
/// covering `width × height` meters, centered on the origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianRasterBand {
    collection: CartesianCollection,
    rows: usize,
    cols: usize,
    width: f64,
    height: f64,
}

impl CartesianRasterBand {
    /// Builds the regular grid eagerly; row-major so that point `i`
    /// corresponds to `image[row, col]` with `row = i / cols`, `col = i % cols`.
    pub fn new(origin: PolarLocation, shape: (usize, usize), width: f64, height: f64) -> Self {
        let (rows, cols) = shape;
        let mut collection = CartesianCollection::new(origin, 1);

        let east_values = linspace(-width / 2.0, width / 2.0, cols);
        let north_values = linspace(-height / 2.0, height / 2.0, rows);

        let mut locations = Vec::with_capacity(rows * cols);
        for &north in &north_values {
            for &east in &east_values {
                locations.push(CartesianLocation::new(east, north));
            }
        }

        collection
            .append_with_default(&locations, &[0.0])
            .expect("grid points and sentinel value always match dimensionality");

        Self { collection, rows, cols, width, height }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn collection(&self) -> &CartesianCollection {
        &self.collection
    }

    /// Reshapes one value dimension into a row-major `(rows, cols)` image.
    pub fn as_image(&self, dimension: usize) -> Vec<Vec<f64>> {
        let values = self.collection.value(dimension);
        let mut image = Vec::with_capacity(self.rows);
        for row in 0..self.rows {
            let start = row * self.cols;
            image.push(values[start..start + self.cols].to_vec());
        }
        image
    }

    pub fn with_values(&self, values: Vec<Vec<f64>>) -> Self {
        Self {
            collection: self.collection.with_values(values),
            rows: self.rows,
            cols: self.cols,
            width: self.width,
            height: self.height,
        }
    }
}

fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![(start + stop) / 2.0];
    }

    let step = (stop - start) / (count - 1) as f64;
    (0..count).map(|i| start + step * i as f64).collect()
}
