use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Heuristic constants used by the geometry and quantity stages.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EstimatorConfig {
    /// Storey height in metres. Default: 3.5.
    #[serde(default = "default_floor_height")]
    pub default_floor_height: f64,
    /// Share of the facade that is glazing. Default: 0.2.
    #[serde(default = "default_window_wall_ratio")]
    pub window_wall_ratio: f64,
    /// Plan elongation factor applied to the square-plan perimeter. Default: 1.2.
    #[serde(default = "default_space_efficiency")]
    pub space_efficiency: f64,
    /// Seed for archetype draws; runs are not reproducible without one.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Subcomponent whose bill of materials is used for every building's glazing.
    #[serde(default = "default_window_subcomponent")]
    pub window_subcomponent: String,
}

fn default_floor_height() -> f64 {
    3.5
}
fn default_window_wall_ratio() -> f64 {
    0.2
}
fn default_space_efficiency() -> f64 {
    1.2
}
fn default_window_subcomponent() -> String {
    "Window - iBuildGreen".into()
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_floor_height: default_floor_height(),
            window_wall_ratio: default_window_wall_ratio(),
            space_efficiency: default_space_efficiency(),
            seed: None,
            window_subcomponent: default_window_subcomponent(),
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.default_floor_height > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "default_floor_height must be positive, got {}",
                self.default_floor_height
            )));
        }
        if !(self.space_efficiency > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "space_efficiency must be positive, got {}",
                self.space_efficiency
            )));
        }
        if !(0.0..=1.0).contains(&self.window_wall_ratio) {
            return Err(Error::InvalidConfig(format!(
                "window_wall_ratio must lie in [0, 1], got {}",
                self.window_wall_ratio
            )));
        }
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

fn default_database() -> PathBuf {
    PathBuf::from("stockmass.db")
}

impl AppConfig {
    /// Layer defaults, the optional config file and `STOCKMASS__*` variables.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("STOCKMASS_CONFIG").unwrap_or_else(|_| "config/stockmass".to_string());

        let s = Config::builder()
            .set_default("database", "stockmass.db")?
            .set_default("estimator.default_floor_height", default_floor_height())?
            .set_default("estimator.window_wall_ratio", default_window_wall_ratio())?
            .set_default("estimator.space_efficiency", default_space_efficiency())?
            .set_default("estimator.window_subcomponent", default_window_subcomponent())?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("STOCKMASS").separator("__"))
            .build()?;

        let app: AppConfig = s.try_deserialize()?;
        app.estimator.validate()?;
        Ok(app)
    }
}
