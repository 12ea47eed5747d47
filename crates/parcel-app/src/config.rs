//! Configuration management for parcel-check
//!
//! Config stored at: ~/.config/parcel-check/config.json

use parcel_domain::model::StaffSession;
use parcel_types::{ConfigError, Error, OutputFormat, Result};
use parcel_vision::{MarkerSpec, DEFAULT_CHANGE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "parcel-check";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Condition store and photo blob directory override
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Printed calibration marker width (mm)
    #[serde(default = "default_marker_width")]
    pub marker_width_mm: f64,

    /// Printed calibration marker height (mm)
    #[serde(default = "default_marker_height")]
    pub marker_height_mm: f64,

    /// Use the measurement engine; when false every measurement is estimated
    #[serde(default = "default_true")]
    pub vision_enabled: bool,

    /// How long to wait for the measurement engine before estimating
    #[serde(default = "default_vision_ready_timeout_ms")]
    pub vision_ready_timeout_ms: u64,

    /// Region similarity below which a handover change is reported
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f64,

    /// Order book (TOML)
    #[serde(default)]
    pub orders_file: Option<PathBuf>,

    #[serde(default)]
    pub staff_id: Option<String>,

    #[serde(default)]
    pub warehouse_id: Option<String>,

    /// Default output format (json, table)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_marker_width() -> f64 {
    MarkerSpec::default().width_mm
}

fn default_marker_height() -> f64 {
    MarkerSpec::default().height_mm
}

fn default_true() -> bool {
    true
}

fn default_vision_ready_timeout_ms() -> u64 {
    2000
}

fn default_change_threshold() -> f64 {
    DEFAULT_CHANGE_THRESHOLD
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            marker_width_mm: default_marker_width(),
            marker_height_mm: default_marker_height(),
            vision_enabled: true,
            vision_ready_timeout_ms: default_vision_ready_timeout_ms(),
            change_threshold: default_change_threshold(),
            orders_file: None,
            staff_id: None,
            warehouse_id: None,
            output_format: default_output_format(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join(APP_DIR);
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the store directory path
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }

        let store_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join(APP_DIR);
        Ok(store_dir)
    }

    /// Photo blobs live next to the condition store
    pub fn blob_dir(&self) -> Result<PathBuf> {
        Ok(self.store_dir()?.join("photos"))
    }

    pub fn marker(&self) -> Result<MarkerSpec> {
        MarkerSpec::new(self.marker_width_mm, self.marker_height_mm).map_err(|e| {
            ConfigError::InvalidValue(format!("marker size: {}", e)).into()
        })
    }

    pub fn vision_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.vision_ready_timeout_ms)
    }

    /// Operator identity; both ids must be configured or given on the command line
    pub fn staff_session(&self) -> Result<StaffSession> {
        match (self.staff_id.as_deref(), self.warehouse_id.as_deref()) {
            (Some(staff), Some(warehouse)) if !staff.is_empty() && !warehouse.is_empty() => {
                Ok(StaffSession::new(staff, warehouse))
            }
            _ => Err(Error::Validation(
                "staff_id and warehouse_id must be set (see `parcel-check config`)".to_string(),
            )),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.marker()?;
        if !(0.0..=1.0).contains(&self.change_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "change_threshold must be within 0..=1, got {}",
                self.change_threshold
            ))
            .into());
        }
        Ok(())
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Parcel Check Configuration")?;
        writeln!(f, "==========================")?;
        writeln!(f)?;
        writeln!(
            f,
            "Store dir:        {}",
            self.store_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        )?;
        writeln!(
            f,
            "Marker:           {} x {} mm",
            self.marker_width_mm, self.marker_height_mm
        )?;
        writeln!(f, "Vision enabled:   {}", self.vision_enabled)?;
        writeln!(f, "Vision timeout:   {} ms", self.vision_ready_timeout_ms)?;
        writeln!(f, "Change threshold: {:.2}", self.change_threshold)?;
        writeln!(
            f,
            "Orders file:      {}",
            self.orders_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        )?;
        writeln!(
            f,
            "Staff:            {}",
            self.staff_id.as_deref().unwrap_or("(unset)")
        )?;
        writeln!(
            f,
            "Warehouse:        {}",
            self.warehouse_id.as_deref().unwrap_or("(unset)")
        )?;
        writeln!(f, "Output format:    {}", self.output_format)?;
        writeln!(f, "Log level:        {}", self.log_level)?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:      {}", path.display())?;
        }

        Ok(())
    }
}
