//! Geometry substrate: points, columnar collections, rasters, maps, and the
//! spatial index relation kernels query against.

mod collection;
mod index;
mod location;
mod map;

pub use collection::{CartesianCollection, CartesianRasterBand, CollectionError};
pub use index::SpatialIndex;
pub use location::{CartesianLocation, PolarLocation};
pub use map::{CartesianFeature, CartesianMap, Gaussian2D, Geometry};
