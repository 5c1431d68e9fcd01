use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::workflow::DEFAULT_PROCESS_KEY;

// ============================================================================
// Configuration
// ============================================================================
//
// Read from the environment:
//
//   RESTBUCKS_ENGINE               memory | rest            (default: memory)
//   RESTBUCKS_ENGINE_URL           Camunda REST base URL    (default: http://localhost:8080/engine-rest)
//   RESTBUCKS_PROCESS_KEY          process definition key   (default: order)
//   RESTBUCKS_ENGINE_TIMEOUT_SECS  per-request timeout      (default: 5)
//
// ============================================================================

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:8080/engine-rest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Memory,
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineKind,
    pub engine_url: String,
    pub process_key: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineKind::Memory,
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            process_key: DEFAULT_PROCESS_KEY.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(engine) = lookup("RESTBUCKS_ENGINE") {
            config.engine = match engine.trim().to_ascii_lowercase().as_str() {
                "memory" => EngineKind::Memory,
                "rest" => EngineKind::Rest,
                other => bail!("Unknown RESTBUCKS_ENGINE value: {other} (expected memory or rest)"),
            };
        }
        if let Some(url) = lookup("RESTBUCKS_ENGINE_URL") {
            config.engine_url = url;
        }
        if let Some(key) = lookup("RESTBUCKS_PROCESS_KEY") {
            config.process_key = key;
        }
        if let Some(secs) = lookup("RESTBUCKS_ENGINE_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid RESTBUCKS_ENGINE_TIMEOUT_SECS: {secs}"))?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
