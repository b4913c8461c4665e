//! Engine configuration with builder pattern
//!
//! Provides the settings that are deployment concerns rather than schema
//! concerns: how numbers are written back, how carry-over treats manual
//! edits, and bounds on formula size.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::formula::NumberFormat;
use crate::rules::CarryPolicy;

const ENV_DECIMAL_SEPARATOR: &str = "ACTIVITY_ENGINE_DECIMAL_SEPARATOR";
const ENV_FRACTION_DIGITS: &str = "ACTIVITY_ENGINE_FRACTION_DIGITS";
const ENV_CARRY_POLICY: &str = "ACTIVITY_ENGINE_CARRY_POLICY";

/// Global engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub number_format: NumberFormat,
    pub carry_policy: CarryPolicy,
    /// Longest formula accepted, in characters
    pub max_formula_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            number_format: NumberFormat::default(),
            carry_policy: CarryPolicy::PreserveManual,
            max_formula_length: 1024,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for EngineConfig
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Comma decimal separator, two digits (the reference deployment)
    pub fn italian() -> Self {
        Self::default()
    }

    /// Dot decimal separator, two digits
    pub fn international() -> Self {
        Self {
            number_format: NumberFormat::new('.', 2),
            ..Self::default()
        }
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-engine")
            .join("config.toml")
    }

    /// Load the config file (if present) and apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific file, falling back to defaults when it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!("Loading engine config from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from environment-style lookups
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_DECIMAL_SEPARATOR) {
            let mut chars = value.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c @ (',' | '.')), None) => self.number_format.decimal_separator = c,
                _ => anyhow::bail!("{} must be ',' or '.', got '{}'", ENV_DECIMAL_SEPARATOR, value),
            }
        }

        if let Some(value) = lookup(ENV_FRACTION_DIGITS) {
            let digits: u32 = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number", ENV_FRACTION_DIGITS))?;
            if digits > 10 {
                anyhow::bail!("{} must be at most 10, got {}", ENV_FRACTION_DIGITS, digits);
            }
            self.number_format.fraction_digits = digits;
        }

        if let Some(value) = lookup(ENV_CARRY_POLICY) {
            self.carry_policy = value.parse().map_err(anyhow::Error::msg)?;
        }

        Ok(())
    }
}

/// Builder for EngineConfig
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.config.number_format.decimal_separator = separator;
        self
    }

    pub fn fraction_digits(mut self, digits: u32) -> Self {
        self.config.number_format.fraction_digits = digits;
        self
    }

    pub fn carry_policy(mut self, policy: CarryPolicy) -> Self {
        self.config.carry_policy = policy;
        self
    }

    pub fn max_formula_length(mut self, length: usize) -> Self {
        self.config.max_formula_length = length;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .decimal_separator('.')
            .fraction_digits(3)
            .carry_policy(CarryPolicy::Overwrite)
            .max_formula_length(80)
            .build();
        assert_eq!(config.number_format, NumberFormat::new('.', 3));
        assert_eq!(config.carry_policy, CarryPolicy::Overwrite);
        assert_eq!(config.max_formula_length, 80);
    }

    #[test]
    fn test_presets() {
        assert_eq!(EngineConfig::italian().number_format.decimal_separator, ',');
        assert_eq!(EngineConfig::international().number_format.decimal_separator, '.');
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            carry_policy = "overwrite"

            [number_format]
            decimal_separator = "."
            fraction_digits = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.carry_policy, CarryPolicy::Overwrite);
        assert_eq!(config.number_format, NumberFormat::new('.', 4));
        assert_eq!(config.max_formula_length, 1024);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (ENV_DECIMAL_SEPARATOR, "."),
            (ENV_FRACTION_DIGITS, "0"),
            (ENV_CARRY_POLICY, "overwrite"),
        ]);
        let mut config = EngineConfig::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.number_format, NumberFormat::new('.', 0));
        assert_eq!(config.carry_policy, CarryPolicy::Overwrite);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let vars = env(&[(ENV_DECIMAL_SEPARATOR, ";")]);
        assert!(EngineConfig::default().apply_env(|k| vars.get(k).cloned()).is_err());

        let vars = env(&[(ENV_FRACTION_DIGITS, "many")]);
        assert!(EngineConfig::default().apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("activity-engine-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "max_formula_length = 200\n").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.max_formula_length, 200);

        std::fs::write(&path, "max_formula_length = \"lots\"\n").unwrap();
        assert!(EngineConfig::load_from(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
