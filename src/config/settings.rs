// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Scribe
//!
//! Settings come from ~/.scribe/settings.json (when present) and are then
//! overridden by `AGENT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod io;
mod validation;

pub use io::apply_env_overrides;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Task manager and agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,
}

/// Settings for the async task manager and the tool-calling loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Maximum number of in-flight requests (0 = unlimited)
    #[serde(default)]
    pub max_concurrent: usize,

    /// Hard deadline for a single request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of each request's output queue
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// How long a finished request stays subscribable, in seconds
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,

    /// Interval between progress checks, in seconds
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum number of model round trips per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Number of prior messages loaded as history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Maximum tokens for a model response
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retries for rate-limited model calls
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,

    /// Base for exponential backoff between retries, in seconds
    #[serde(default = "default_base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,
}

/// Settings for the Exa web search client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Environment variable holding the API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the search API
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Number of results requested per search
    #[serde(default = "default_search_num_results")]
    pub num_results: u32,

    /// HTTP timeout, in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            request_timeout_secs: default_request_timeout_secs(),
            channel_buffer: default_channel_buffer(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
            progress_interval_secs: default_progress_interval_secs(),
            default_model: default_model(),
            max_iterations: default_max_iterations(),
            history_limit: default_history_limit(),
            max_response_tokens: default_max_response_tokens(),
            temperature: default_temperature(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            base_retry_delay_secs: default_base_retry_delay_secs(),
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_api_key_env(),
            api_key: None,
            base_url: default_search_base_url(),
            num_results: default_search_num_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl SearchConfig {
    /// Get the API key, checking the env var first.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

fn default_request_timeout_secs() -> u64 {
    10 * 60
}

fn default_channel_buffer() -> usize {
    100
}

fn default_cleanup_delay_secs() -> u64 {
    15 * 60
}

fn default_progress_interval_secs() -> u64 {
    15
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_iterations() -> u32 {
    25
}

fn default_history_limit() -> usize {
    12
}

fn default_max_response_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_rate_limit_retries() -> u32 {
    3
}

fn default_base_retry_delay_secs() -> u64 {
    2
}

fn default_search_api_key_env() -> String {
    "EXA_API_KEY".to_string()
}

fn default_search_base_url() -> String {
    "https://api.exa.ai".to_string()
}

fn default_search_num_results() -> u32 {
    5
}

fn default_search_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_concurrent, 0);
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
        assert_eq!(config.channel_buffer, 100);
        assert_eq!(config.cleanup_delay(), Duration::from_secs(900));
        assert_eq!(config.progress_interval(), Duration::from_secs(15));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.history_limit, 12);
    }

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.api_key_env, "EXA_API_KEY");
        assert_eq!(config.base_url, "https://api.exa.ai");
        assert_eq!(config.num_results, 5);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_settings_deserialize_empty_object() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_deserialize_partial_section() {
        let json = r#"{"agent": {"max_iterations": 5, "default_model": "mock-model"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.agent.max_iterations, 5);
        assert_eq!(settings.agent.default_model, "mock-model");
        assert_eq!(settings.agent.channel_buffer, 100);
        assert_eq!(settings.search, SearchConfig::default());
    }

    #[test]
    fn test_settings_serialize_skips_missing_api_key() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(!json.contains("api_key\":"));
        assert!(json.contains("api_key_env"));
    }

    #[test]
    fn test_resolve_api_key_falls_back_to_stored_key() {
        let config = SearchConfig {
            api_key_env: "SCRIBE_TEST_UNSET_SEARCH_KEY".to_string(),
            api_key: Some("stored".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("stored"));
    }
}
