// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Result;

use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::scribe_home().join("settings.json")
    }

    /// Load settings from the default path, apply environment overrides and
    /// validate the result.
    pub fn load() -> Result<Self> {
        Self::load_with_env(&Self::default_path())
    }

    /// Load from `path`, then apply `AGENT_*` overrides from the process
    /// environment and validate.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut settings = Self::load_from(path)?;
        apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the scribe home directory (~/.scribe or $SCRIBE_HOME).
    pub fn scribe_home() -> PathBuf {
        if let Ok(home) = std::env::var("SCRIBE_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".scribe")
    }
}

/// Apply `AGENT_*` overrides read through `lookup`.
///
/// Durations are given in minutes. Values that fail to parse are ignored with
/// a warning and the configured value is kept.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let agent = &mut settings.agent;

    if let Some(value) = parse_var::<usize, _>(&lookup, "AGENT_MAX_CONCURRENT") {
        agent.max_concurrent = value;
    }
    if let Some(minutes) = parse_var::<u64, _>(&lookup, "AGENT_REQUEST_TIMEOUT") {
        agent.request_timeout_secs = minutes * 60;
    }
    if let Some(value) = parse_var::<usize, _>(&lookup, "AGENT_CHANNEL_BUFFER") {
        agent.channel_buffer = value;
    }
    if let Some(minutes) = parse_var::<u64, _>(&lookup, "AGENT_CLEANUP_DELAY") {
        agent.cleanup_delay_secs = minutes * 60;
    }
    if let Some(model) = lookup("AGENT_DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
        agent.default_model = model;
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.agent.max_iterations = 7;
        settings.search.num_results = 3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_from_invalid_json_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_use_minutes_for_durations() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            lookup_from(&[
                ("AGENT_MAX_CONCURRENT", "4"),
                ("AGENT_REQUEST_TIMEOUT", "2"),
                ("AGENT_CHANNEL_BUFFER", "8"),
                ("AGENT_CLEANUP_DELAY", "1"),
                ("AGENT_DEFAULT_MODEL", "claude-test"),
            ]),
        );
        assert_eq!(settings.agent.max_concurrent, 4);
        assert_eq!(settings.agent.request_timeout_secs, 120);
        assert_eq!(settings.agent.channel_buffer, 8);
        assert_eq!(settings.agent.cleanup_delay_secs, 60);
        assert_eq!(settings.agent.default_model, "claude-test");
    }

    #[test]
    fn test_env_overrides_ignore_garbage() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            lookup_from(&[("AGENT_CHANNEL_BUFFER", "lots"), ("AGENT_DEFAULT_MODEL", "  ")]),
        );
        assert_eq!(settings.agent.channel_buffer, 100);
        assert_eq!(settings.agent.default_model, "gpt-4o");
    }
}
