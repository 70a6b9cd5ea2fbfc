//! Configuration loading and persistence.

use super::Config;
use crate::env::{get_var, vars};
use crate::error::ConfigError;
use crate::paths;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// `TEAMID.identifier` or `group.identifier`.
static ACCESS_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Z0-9]{10}|group)\.[A-Za-z0-9][A-Za-z0-9.\-]*$").expect("invalid regex")
});

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `KEYSMITH_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(group) = get_var(vars::KEYSMITH_ACCESS_GROUP) {
            tracing::debug!(access_group = %group, "access group overridden from environment");
            self.store.access_group = Some(group);
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Access group shape
        if let Some(group) = &self.store.access_group {
            if !ACCESS_GROUP.is_match(group) {
                errors.push(format!(
                    "Invalid access group '{}', expected 'TEAMID.identifier' or 'group.identifier'",
                    group
                ));
            }
        }

        // 2. Default policy must be a combination a backend can build
        for conflict in self.store.default_policy.conflicts() {
            errors.push(format!("Default policy: {}", conflict));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
