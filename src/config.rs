//! Inference configuration
//!
//! Settings for the driver, loadable from a JSON file. Every field has a
//! default, so a config file only needs the values it overrides:
//!
//! ```json
//! { "seq_len": 8, "max_d_model": 1024 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{FastlmError, Result},
    model::LoaderLimits,
};

/// Driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Rows in the generated input matrix
    pub seq_len: usize,
    /// Value every input element is set to
    pub fill_value: f32,
    /// Largest `d_model` accepted from a model header
    pub max_d_model: usize,
    /// Largest layer count accepted from a model header
    pub max_layers: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        let limits = LoaderLimits::default();
        Self {
            seq_len: 3,
            fill_value: 0.5,
            max_d_model: limits.max_d_model,
            max_layers: limits.max_layers,
        }
    }
}

impl InferenceConfig {
    /// Parse a JSON config
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for malformed JSON or invalid values
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FastlmError::InvalidConfiguration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read, `InvalidConfiguration`
    /// if it does not parse or validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FastlmError::IoError {
            message: format!("Failed to read config {}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if a size is zero or the fill value is
    /// not finite
    pub fn validate(&self) -> Result<()> {
        if self.seq_len == 0 {
            return Err(FastlmError::InvalidConfiguration(
                "seq_len must be > 0".to_string(),
            ));
        }
        if self.max_d_model == 0 || self.max_layers == 0 {
            return Err(FastlmError::InvalidConfiguration(
                "max_d_model and max_layers must be > 0".to_string(),
            ));
        }
        if !self.fill_value.is_finite() {
            return Err(FastlmError::InvalidConfiguration(format!(
                "fill_value must be finite, got {}",
                self.fill_value
            )));
        }
        Ok(())
    }

    /// Set the sequence length
    #[must_use]
    pub fn with_seq_len(mut self, seq_len: usize) -> Self {
        self.seq_len = seq_len;
        self
    }

    /// Set the input fill value
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = fill_value;
        self
    }

    /// Header bounds for the loader
    #[must_use]
    pub fn loader_limits(&self) -> LoaderLimits {
        LoaderLimits {
            max_d_model: self.max_d_model,
            max_layers: self.max_layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InferenceConfig::default();
        assert_eq!(config.seq_len, 3);
        assert_eq!(config.fill_value, 0.5);
        assert_eq!(config.loader_limits(), LoaderLimits::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = InferenceConfig::from_json(r#"{"seq_len": 8}"#).unwrap();
        assert_eq!(config.seq_len, 8);
        assert_eq!(config.fill_value, 0.5);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = InferenceConfig::from_json(r#"{"seq_length": 8}"#).unwrap_err();
        assert!(matches!(err, FastlmError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_seq_len_rejected() {
        assert!(InferenceConfig::from_json(r#"{"seq_len": 0}"#).is_err());
        assert!(InferenceConfig::default().with_seq_len(0).validate().is_err());
    }

    #[test]
    fn test_non_finite_fill_rejected() {
        let config = InferenceConfig::default().with_fill_value(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = InferenceConfig::default()
            .with_seq_len(5)
            .with_fill_value(1.5);
        assert_eq!(config.seq_len, 5);
        assert_eq!(config.fill_value, 1.5);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fill_value": 0.25, "max_layers": 4}"#).unwrap();
        let config = InferenceConfig::from_file(&path).unwrap();
        assert_eq!(config.fill_value, 0.25);
        assert_eq!(config.loader_limits().max_layers, 4);
    }

    #[test]
    fn test_from_missing_file() {
        let err = InferenceConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, FastlmError::IoError { .. }));
    }
}
