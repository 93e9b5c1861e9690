//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```
//! use keel_core::{KeelConfig, Priority};
//!
//! let config = KeelConfig::from_toml_str(r#"
//!     [solver]
//!     max_pivots = 500
//!
//!     [intrinsic]
//!     content_hugging = "required"
//! "#).unwrap();
//!
//! assert_eq!(config.solver.max_pivots, 500);
//! assert_eq!(config.intrinsic.content_hugging, Priority::Required);
//! assert_eq!(config.intrinsic.compression_resistance, Priority::HIGH);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::Priority;

/// Main engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KeelConfig {
    /// Tableau solver settings.
    pub solver: SolverConfig,

    /// Default intrinsic-size priorities for newly managed entities.
    pub intrinsic: IntrinsicDefaults,
}

impl KeelConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solver.max_pivots == 0 {
            return Err(ConfigError::Invalid(
                "solver.max_pivots must be greater than zero".to_string(),
            ));
        }
        for (name, priority) in [
            ("intrinsic.content_hugging", self.intrinsic.content_hugging),
            (
                "intrinsic.compression_resistance",
                self.intrinsic.compression_resistance,
            ),
        ] {
            if let Priority::Preferred(weight) = priority {
                if !weight.is_finite() || weight <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be a positive finite weight, got {}",
                        name, weight
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Tableau solver settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SolverConfig {
    /// Upper bound on pivots performed by a single optimisation pass.
    pub max_pivots: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_pivots: 10_000 }
    }
}

/// Intrinsic-size priorities applied to entities when they become managed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct IntrinsicDefaults {
    /// Resistance to growing beyond the measured size.
    pub content_hugging: Priority,

    /// Resistance to shrinking below the measured size.
    pub compression_resistance: Priority,
}

impl Default for IntrinsicDefaults {
    fn default() -> Self {
        Self {
            content_hugging: Priority::LOW,
            compression_resistance: Priority::HIGH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = KeelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KeelConfig::default());
        assert_eq!(config.solver.max_pivots, 10_000);
    }

    #[test]
    fn test_preferred_priority_table() {
        let config = KeelConfig::from_toml_str(
            r#"
            [intrinsic]
            content_hugging = { preferred = 10.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.intrinsic.content_hugging, Priority::Preferred(10.0));
    }

    #[test]
    fn test_zero_pivots_rejected() {
        let err = KeelConfig::from_toml_str("[solver]\nmax_pivots = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = KeelConfig::from_toml_str(
            "[intrinsic]\ncompression_resistance = { preferred = -1.0 }",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = KeelConfig::load("/nonexistent/keel.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
