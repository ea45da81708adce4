// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, ScribeError};

use super::Settings;

impl Settings {
    /// Reject settings the task manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;

        if agent.channel_buffer == 0 {
            return Err(ScribeError::Config(
                "agent.channel_buffer must be at least 1".to_string(),
            ));
        }
        if agent.request_timeout_secs == 0 {
            return Err(ScribeError::Config(
                "agent.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if agent.max_iterations == 0 {
            return Err(ScribeError::Config(
                "agent.max_iterations must be greater than 0".to_string(),
            ));
        }
        if agent.progress_interval_secs == 0 {
            return Err(ScribeError::Config(
                "agent.progress_interval_secs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&agent.temperature) {
            return Err(ScribeError::Config(format!(
                "agent.temperature must be between 0 and 2, got {}",
                agent.temperature
            )));
        }
        if self.search.base_url.trim().is_empty() {
            return Err(ScribeError::Config("search.base_url is empty".to_string()));
        }

        Ok(())
    }
}
