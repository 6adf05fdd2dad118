//! Export configuration
//!
//! Process-wide settings for a batch run, loaded from a RON file. Every field
//! has a default so a partial file is enough.

use std::path::{Path, PathBuf};

use dxport_kernel::ClosePolicy;
use serde::{Deserialize, Serialize};

/// Part attribute keys read as metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttributeKeys {
    /// Job number attribute
    pub job: String,
    /// Mark / piece identifier attribute
    pub mark: String,
    /// Drawing number attribute
    pub drawing: String,
}

impl Default for AttributeKeys {
    fn default() -> Self {
        Self {
            job: "JobNo".to_string(),
            mark: "Mark".to_string(),
            drawing: "DrawingNo".to_string(),
        }
    }
}

/// Placement and formatting of the per-body note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoteConfig {
    /// General text size
    pub text_size: f64,
    /// Distance from the body's lower-left extent to the note origin
    pub offset: f64,
    /// Decimal places of the thickness value
    pub thickness_precision: usize,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            text_size: 5.0,
            offset: 20.0,
            thickness_precision: 6,
        }
    }
}

/// Configuration of an export run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Settings file handed to the exporter
    pub settings_file: PathBuf,
    /// Directory receiving the output files
    pub output_dir: PathBuf,
    /// Output file extension, without the dot
    pub extension: String,
    /// Sketches whose name contains this tag are exported with every body
    pub sketch_marker: String,
    /// License capability held for the whole run
    pub license_capability: String,
    pub attributes: AttributeKeys,
    pub note: NoteConfig,
    /// How parts are closed after export
    pub close_policy: ClosePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("dxfdwg.def"),
            output_dir: PathBuf::from("dxf"),
            extension: "dxf".to_string(),
            sketch_marker: "ZINC".to_string(),
            license_capability: "solid_modeling".to_string(),
            attributes: AttributeKeys::default(),
            note: NoteConfig::default(),
            close_policy: ClosePolicy::default(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse configuration from RON text and validate it
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig =
            ron::from_str(content).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Check values that would produce unusable output names
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() {
            return Err(ConfigError::Invalid("extension is empty".into()));
        }
        if self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension '{}' must not start with a dot",
                self.extension
            )));
        }
        if self.sketch_marker.is_empty() {
            return Err(ConfigError::Invalid("sketch marker is empty".into()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
