// Copyright 2024, The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serializers;

/// The configuration section read by [ReproviderConfig::load_from].
pub const CONFIG_SECTION: &str = "content_provider";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load the content provider configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid value for `{field}`: {message}")]
    InvalidValue { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReproviderConfig {
    /// Time between sweeps that copy every tracked id into the queue, in milliseconds. The first sweep happens one
    /// interval after the reprovider starts. Zero disables the timer, leaving only triggered sweeps.
    /// Default: 12 hours
    #[serde(with = "serializers::milliseconds")]
    pub sweep_interval: Duration,
    /// Minimum time between consecutive announcements, in milliseconds. Zero announces as fast as the router
    /// accepts them.
    /// Default: 100ms
    #[serde(with = "serializers::milliseconds")]
    pub drain_interval: Duration,
    /// Delay in milliseconds before retrying after the first store failure. Doubles with every consecutive failure.
    /// Default: 1s
    #[serde(with = "serializers::milliseconds")]
    pub store_failure_backoff: Duration,
    /// Upper bound for the store failure retry delay, in milliseconds.
    /// Default: 60s
    #[serde(with = "serializers::milliseconds")]
    pub max_store_failure_backoff: Duration,
    /// Number of consecutive store failures after which a task gives up and the reprovider is degraded.
    /// Default: 10
    pub max_store_failures: usize,
    /// Number of trigger requests that may wait for the scheduler.
    /// Default: 1
    pub trigger_buffer_size: usize,
    /// Capacity of the event broadcast channel. Slow subscribers miss events beyond this.
    /// Default: 100
    pub event_buffer_size: usize,
}

impl ReproviderConfig {
    /// A default config with the given sweep and drain intervals.
    pub fn with_intervals(sweep_interval: Duration, drain_interval: Duration) -> Self {
        Self {
            sweep_interval,
            drain_interval,
            ..Default::default()
        }
    }

    /// Read the `content_provider` section of `config`. Keys that are absent keep their default values. A missing
    /// section yields the default config.
    pub fn load_from(config: &config::Config) -> Result<Self, ConfigError> {
        let loaded = match config.get::<Self>(CONFIG_SECTION) {
            Ok(loaded) => loaded,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(err) => return Err(err.into()),
        };
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_buffer_size == 0 {
            return Err(invalid("trigger_buffer_size", "must be greater than zero"));
        }
        if self.event_buffer_size == 0 {
            return Err(invalid("event_buffer_size", "must be greater than zero"));
        }
        if self.max_store_failures == 0 {
            return Err(invalid("max_store_failures", "must be greater than zero"));
        }
        if self.store_failure_backoff > self.max_store_failure_backoff {
            return Err(invalid(
                "store_failure_backoff",
                "must not be greater than max_store_failure_backoff",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_string(),
    }
}

impl Default for ReproviderConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(12 * 60 * 60),
            drain_interval: Duration::from_millis(100),
            store_failure_backoff: Duration::from_secs(1),
            max_store_failure_backoff: Duration::from_secs(60),
            max_store_failures: 10,
            trigger_buffer_size: 1,
            event_buffer_size: 100,
        }
    }
}
