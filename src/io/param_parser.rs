use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json;

use super::{IoError, IoResult};
use crate::solver::{FishingGround, SolverParameters};

pub const DEFAULT_LOG_NAME: &str = "logfile";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub n_steps: usize,
    pub t_end: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Geometry {
    pub mesh_name: String,
    /// `[[x_min, x_max], [y_min, y_max]]`
    pub borders: [[f64; 2]; 2],
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IoSettings {
    #[serde(default = "default_log_name")]
    pub log_name: String,
    #[serde(default)]
    pub write_frequency: Option<usize>,
}
impl Default for IoSettings {
    fn default() -> Self {
        Self {
            log_name: default_log_name(),
            write_frequency: None,
        }
    }
}
fn default_log_name() -> String {
    DEFAULT_LOG_NAME.to_string()
}

/// One simulation run as read from a JSON configuration file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub settings: Settings,
    pub geometry: Geometry,
    #[serde(default)]
    pub io: IoSettings,
    #[serde(skip)]
    pub source: PathBuf,
}
impl RunConfig {
    pub fn parse(file_path: impl AsRef<Path>) -> IoResult<Self> {
        let file_path = file_path.as_ref();
        if !file_path.is_file() {
            return Err(IoError::Config {
                path: file_path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
        let file_content =
            fs::read_to_string(file_path).map_err(|e| IoError::io(file_path, e))?;
        let mut config = Self::from_json(&file_content).map_err(|reason| IoError::Config {
            path: file_path.to_path_buf(),
            reason,
        })?;
        config.source = file_path.to_path_buf();
        Ok(config)
    }
    /// Parses and validates without touching the filesystem.
    pub fn from_json(content: &str) -> Result<Self, String> {
        let config: RunConfig = serde_json::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }
    fn validate(&self) -> Result<(), String> {
        if self.settings.n_steps == 0 {
            return Err("'n_steps' must be a positive integer".to_string());
        }
        if !(self.settings.t_end > 0.0) || !self.settings.t_end.is_finite() {
            return Err("'t_end' must be a positive number".to_string());
        }
        if self.geometry.mesh_name.is_empty() {
            return Err("'mesh_name' must be a non-empty string".to_string());
        }
        let [[x_min, x_max], [y_min, y_max]] = self.geometry.borders;
        if !(x_min < x_max) || !(y_min < y_max) {
            return Err(format!(
                "borders [[{x_min}, {x_max}], [{y_min}, {y_max}]] do not span a rectangle"
            ));
        }
        if self.io.write_frequency == Some(0) {
            return Err("'write_frequency' must be a positive integer".to_string());
        }
        Ok(())
    }
    pub fn delta_t(&self) -> f64 {
        self.solver_parameters().delta_t()
    }
    pub fn solver_parameters(&self) -> SolverParameters {
        SolverParameters {
            final_time: self.settings.t_end,
            final_step: self.settings.n_steps,
        }
    }
    pub fn fishing_ground(&self) -> FishingGround {
        FishingGround::from_borders(self.geometry.borders)
    }
    /// Mesh location; relative names resolve against the configuration's
    /// directory.
    pub fn mesh_path(&self) -> PathBuf {
        let mesh = Path::new(&self.geometry.mesh_name);
        if mesh.is_absolute() {
            return mesh.to_path_buf();
        }
        match self.source.parent() {
            Some(dir) => dir.join(mesh),
            None => mesh.to_path_buf(),
        }
    }
    /// File stem of the configuration, used to name the results folder.
    pub fn name(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string())
    }
}
