use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::relations::EmptyMapDefaults;

const DEFAULT_EPSILON_VARIANCE: f64 = 1e-3;
const DEFAULT_EMPTY_MAP_DISTANCE_MEAN: f64 = 1e9;
const DEFAULT_EMPTY_MAP_DISTANCE_VARIANCE: f64 = 1e-3;
const DEFAULT_MASTER_SEED: u64 = 0;
const DEFAULT_N_SAMPLES: usize = 50;
const DEFAULT_N_JOBS: usize = 4;
const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for the external solver process (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    pub command: String,
    pub n_samples: usize,
    pub dtype: String,
    pub device: String,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            command: "promis-solver".to_string(),
            n_samples: DEFAULT_N_SAMPLES,
            dtype: "float32".to_string(),
            device: "cpu".to_string(),
        }
    }
}

/// Runtime configuration for a ProMis pipeline: epsilon floors, empty-map
/// sentinels, the Monte-Carlo master seed, solver backend settings, and
/// default worker-pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub epsilon_variance: f64,
    pub empty_map_distance_mean: f64,
    pub empty_map_distance_variance: f64,
    pub master_seed: u64,
    pub solver: SolverSettings,
    pub n_jobs: usize,
    pub default_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            epsilon_variance: DEFAULT_EPSILON_VARIANCE,
            empty_map_distance_mean: DEFAULT_EMPTY_MAP_DISTANCE_MEAN,
            empty_map_distance_variance: DEFAULT_EMPTY_MAP_DISTANCE_VARIANCE,
            master_seed: DEFAULT_MASTER_SEED,
            solver: SolverSettings::default(),
            n_jobs: DEFAULT_N_JOBS,
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    pub fn empty_map_defaults(&self) -> EmptyMapDefaults {
        EmptyMapDefaults {
            distance_mean: self.empty_map_distance_mean,
            distance_variance: self.empty_map_distance_variance,
        }
    }

    /// Builder method to set and validate the variance floor.
    #[instrument]
    pub fn with_variance_floor(mut self, epsilon_variance: f64) -> Result<Self, ConfigError> {
        if epsilon_variance <= 0.0 {
            return Err(ConfigError::Message(
                "epsilon_variance must be strictly positive".to_string(),
            ));
        }
        self.epsilon_variance = epsilon_variance;
        debug!("variance floor configured: epsilon={}", epsilon_variance);
        Ok(self)
    }

    #[instrument]
    pub fn with_empty_map_distance(mut self, mean: f64, variance: f64) -> Result<Self, ConfigError> {
        if variance <= 0.0 {
            return Err(ConfigError::Message(
                "empty_map_distance_variance must be strictly positive".to_string(),
            ));
        }
        self.empty_map_distance_mean = mean;
        self.empty_map_distance_variance = variance;
        Ok(self)
    }

    #[instrument]
    pub fn with_worker_pool(
        mut self,
        n_jobs: usize,
        default_batch_size: usize,
    ) -> Result<Self, ConfigError> {
        if n_jobs == 0 {
            return Err(ConfigError::Message("n_jobs must be at least 1".to_string()));
        }
        if default_batch_size == 0 {
            return Err(ConfigError::Message("default_batch_size must be at least 1".to_string()));
        }
        self.n_jobs = n_jobs;
        self.default_batch_size = default_batch_size;
        Ok(self)
    }
}

/// Loads configuration, layering an optional `config/promis` file over
/// `PROMIS_`-prefixed environment variables.
#[instrument]
pub fn load_config() -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    let builder = Config::builder()
        .add_source(File::with_name("config/promis").required(false))
        .add_source(Environment::with_prefix("PROMIS").separator("__"));

    match builder.build() {
        Ok(config) => {
            if let Ok(val) = config.get_float("epsilon_variance") {
                settings = settings.with_variance_floor(val)?;
            }
            if let Ok(mean) = config.get_float("empty_map_distance_mean") {
                let variance = config
                    .get_float("empty_map_distance_variance")
                    .unwrap_or(settings.empty_map_distance_variance);
                settings = settings.with_empty_map_distance(mean, variance)?;
            }
            if let Ok(val) = config.get_int("master_seed") {
                settings.master_seed = val as u64;
            }
            if let Ok(val) = config.get_int("n_jobs") {
                settings = settings.with_worker_pool(val as usize, settings.default_batch_size)?;
            }
            if let Ok(val) = config.get_int("default_batch_size") {
                settings = settings.with_worker_pool(settings.n_jobs, val as usize)?;
            }
            if let Ok(val) = config.get_string("solver.command") {
                settings.solver.command = val;
            }
        }
        Err(e) => {
            error!("failed to load configuration: {}", e);
            return Err(e);
        }
    }

    validate_settings(&settings)?;
    info!("configuration loaded: n_jobs={}, master_seed={}", settings.n_jobs, settings.master_seed);
    Ok(settings)
}

#[instrument]
fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.epsilon_variance <= 0.0 {
        return Err(ConfigError::Message("epsilon_variance must be strictly positive".to_string()));
    }
    if settings.empty_map_distance_variance <= 0.0 {
        return Err(ConfigError::Message(
            "empty_map_distance_variance must be strictly positive".to_string(),
        ));
    }
    if settings.n_jobs == 0 {
        return Err(ConfigError::Message("n_jobs must be at least 1".to_string()));
    }
    if settings.default_batch_size == 0 {
        return Err(ConfigError::Message("default_batch_size must be at least 1".to_string()));
    }

    debug!("configuration validation successful");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_spec_sentinels() {
        let settings = Settings::default();
        assert_eq!(settings.epsilon_variance, 1e-3);
        assert_eq!(settings.empty_map_distance_mean, 1e9);
        assert_eq!(settings.empty_map_distance_variance, 1e-3);
    }

    #[test]
    fn rejects_nonpositive_variance_floor() {
        assert!(Settings::default().with_variance_floor(0.0).is_err());
    }

    #[test]
    fn rejects_zero_worker_pool_size() {
        assert!(Settings::default().with_worker_pool(0, 10).is_err());
    }
}
