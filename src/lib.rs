//! ProMis: builds a Probabilistic Mission Landscape over uncertainty-annotated
//! maps. An uncertainty-annotated map (`geo`) is sampled into per-location
//! relation moments (`sampling`), stored and fitted by the StaR Map
//! (`star_map`), and evaluated over a target by the engine (`engine`) through
//! a pluggable hybrid-logic solver (`solver`).

pub mod approximate;
pub mod config;
pub mod engine;
pub mod geo;
pub mod relations;
pub mod sampling;
pub mod scanner;
pub mod solver;
pub mod star_map;

pub use config::{Settings, SolverSettings};
pub use engine::{EngineError, ProMis};
pub use geo::{
    CartesianCollection, CartesianFeature, CartesianLocation, CartesianMap, CartesianRasterBand,
    Gaussian2D, Geometry, PolarLocation, SpatialIndex,
};
pub use relations::{BernoulliRelation, Relation, ScalarRelation};
pub use solver::{ExternalProcessSolver, SolverBackend, SolverError};
pub use star_map::{StarMap, StarMapError, Target};
