//! Attribute configuration
//!
//! Loaded from a JSON file. Every optional field has an explicit default so
//! a minimal file only names the attribute:
//!
//! ```json
//! { "name": "in_stock" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{AttributeError, AttributeResult};

/// Bits per storage word.
pub const WORD_BITS: u32 = 64;

/// Capacity planning for reallocating growth of the bit storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowStrategy {
    /// Capacity reserved when the attribute is created
    #[serde(default = "default_initial_docs")]
    pub initial_docs: u32,

    /// Relative growth applied on reallocation
    #[serde(default = "default_grow_factor")]
    pub grow_factor: f64,

    /// Absolute growth added on reallocation
    #[serde(default)]
    pub grow_delta: u32,
}

fn default_initial_docs() -> u32 {
    1024
}
fn default_grow_factor() -> f64 {
    0.5
}

impl Default for GrowStrategy {
    fn default() -> Self {
        Self {
            initial_docs: default_initial_docs(),
            grow_factor: default_grow_factor(),
            grow_delta: 0,
        }
    }
}

impl GrowStrategy {
    /// Create a grow strategy
    pub fn new(initial_docs: u32, grow_factor: f64, grow_delta: u32) -> Self {
        Self {
            initial_docs,
            grow_factor,
            grow_delta,
        }
    }

    /// Capacity (in bits) to allocate when `current` bits are not enough to
    /// hold `required` bits. Always a whole number of words.
    pub fn calc_new_capacity(&self, current: u32, required: u32) -> u32 {
        let grown = current as f64 + current as f64 * self.grow_factor + self.grow_delta as f64;
        let grown = grown.min(u32::MAX as f64) as u32;
        round_up_to_word(grown.max(required).max(self.initial_docs))
    }
}

/// Rounds a bit count up to a whole number of storage words.
pub fn round_up_to_word(bits: u32) -> u32 {
    let words = (bits as u64 + WORD_BITS as u64 - 1) / WORD_BITS as u64;
    (words * WORD_BITS as u64).min(u32::MAX as u64 / WORD_BITS as u64 * WORD_BITS as u64) as u32
}

/// Attribute configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Attribute name, also the persisted file stem
    pub name: String,

    /// Basic value type (only "bool" is served by this crate)
    #[serde(default = "default_basic_type")]
    pub basic_type: String,

    /// Collection type (only "single" is served by this crate)
    #[serde(default = "default_collection_type")]
    pub collection_type: String,

    /// Dictionary-enumerated encoding. Booleans never use it.
    #[serde(default)]
    pub enumerated: bool,

    #[serde(default)]
    pub grow_strategy: GrowStrategy,
}

fn default_basic_type() -> String {
    "bool".to_string()
}
fn default_collection_type() -> String {
    "single".to_string()
}

impl AttributeConfig {
    /// Configuration for a single-value boolean attribute with default growth
    pub fn single_bool(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            basic_type: default_basic_type(),
            collection_type: default_collection_type(),
            enumerated: false,
            grow_strategy: GrowStrategy::default(),
        }
    }

    /// Replace the grow strategy
    pub fn with_grow_strategy(mut self, grow_strategy: GrowStrategy) -> Self {
        self.grow_strategy = grow_strategy;
        self
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> AttributeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AttributeError::config_invalid(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(content: &str) -> AttributeResult<Self> {
        let config: AttributeConfig = serde_json::from_str(content)
            .map_err(|e| AttributeError::config_invalid(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> AttributeResult<()> {
        if self.name.is_empty() {
            return Err(AttributeError::config_invalid("name must not be empty"));
        }

        if self.name.contains(['/', '\\']) {
            return Err(AttributeError::config_invalid(format!(
                "name '{}' must not contain path separators",
                self.name
            )));
        }

        if self.basic_type != "bool" {
            return Err(AttributeError::config_invalid(format!(
                "Invalid basic_type: '{}'. Only 'bool' is supported.",
                self.basic_type
            )));
        }

        if self.collection_type != "single" {
            return Err(AttributeError::config_invalid(format!(
                "Invalid collection_type: '{}'. Only 'single' is supported.",
                self.collection_type
            )));
        }

        if self.enumerated {
            return Err(AttributeError::config_invalid(
                "boolean attributes cannot be enumerated",
            ));
        }

        let grow = &self.grow_strategy;
        if !grow.grow_factor.is_finite() || grow.grow_factor < 0.0 {
            return Err(AttributeError::config_invalid(format!(
                "grow_factor must be a non-negative number, got {}",
                grow.grow_factor
            )));
        }

        if grow.grow_factor == 0.0 && grow.grow_delta == 0 {
            return Err(AttributeError::config_invalid(
                "grow_factor and grow_delta cannot both be zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = AttributeConfig::from_json(r#"{"name": "in_stock"}"#).unwrap();
        assert_eq!(config.name, "in_stock");
        assert_eq!(config.basic_type, "bool");
        assert_eq!(config.collection_type, "single");
        assert!(!config.enumerated);
        assert_eq!(config.grow_strategy, GrowStrategy::default());
    }

    #[test]
    fn test_rejects_non_bool_type() {
        let err = AttributeConfig::from_json(r#"{"name": "a", "basic_type": "int32"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("basic_type"));
    }

    #[test]
    fn test_rejects_enumerated() {
        let err =
            AttributeConfig::from_json(r#"{"name": "a", "enumerated": true}"#).unwrap_err();
        assert!(err.to_string().contains("enumerated"));
    }

    #[test]
    fn test_rejects_stalled_growth() {
        let json = r#"{"name": "a", "grow_strategy": {"grow_factor": 0.0, "grow_delta": 0}}"#;
        assert!(AttributeConfig::from_json(json).is_err());
    }

    #[test]
    fn test_rejects_path_in_name() {
        assert!(AttributeConfig::from_json(r#"{"name": "../etc"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("attr.json");
        fs::write(
            &path,
            r#"{"name": "flag", "grow_strategy": {"initial_docs": 64, "grow_factor": 1.0}}"#,
        )
        .unwrap();

        let config = AttributeConfig::load(&path).unwrap();
        assert_eq!(config.grow_strategy.initial_docs, 64);
        assert_eq!(config.grow_strategy.grow_factor, 1.0);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(AttributeConfig::load(&temp_dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_capacity_rounds_to_words() {
        let grow = GrowStrategy::new(0, 0.5, 0);
        assert_eq!(grow.calc_new_capacity(0, 1), 64);
        assert_eq!(grow.calc_new_capacity(64, 65), 128);
        assert_eq!(grow.calc_new_capacity(128, 129), 192);
    }

    #[test]
    fn test_capacity_honours_initial_docs_and_delta() {
        let grow = GrowStrategy::new(1000, 0.0, 100);
        assert_eq!(grow.calc_new_capacity(0, 1), 1024);
        assert_eq!(grow.calc_new_capacity(1024, 1025), 1152);
    }
}
