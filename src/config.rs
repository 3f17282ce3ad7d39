//! Application configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional YAML
//! file, then `TASKPILOT__SECTION__KEY` environment variables. Secrets also
//! come from their conventional variables (`TASKPILOT_API_KEY`,
//! `OPENAI_API_KEY`, `GEMINI_API_KEY`) when the file leaves them unset.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use action_primitives::ExecutorSettings;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

pub const ENV_PREFIX: &str = "TASKPILOT";
const REDACTED: &str = "***";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub browser: BrowserConfig,
    pub reasoning: ReasoningConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared secret expected in `x-api-key`. Unset leaves `/v1` open.
    pub api_key: Option<String>,
    /// Upper bound on concurrently open remote executor sessions.
    pub max_sessions: usize,
    /// Remote executor sessions unused this long are closed. 0 keeps them.
    pub session_idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            api_key: None,
            max_sessions: 8,
            session_idle_timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserDriver {
    #[default]
    Chromium,
    /// Delegate every action to a remote executor over HTTP.
    Remote,
    /// No browser; every task fails at launch.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub driver: BrowserDriver,
    pub headless: bool,
    pub capture_screenshots: bool,
    pub navigation_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub extract_max_chars: usize,
    pub default_wait_ms: u64,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let settings = ExecutorSettings::default();
        Self {
            driver: BrowserDriver::default(),
            headless: true,
            capture_screenshots: settings.capture_screenshots,
            navigation_timeout_ms: settings.navigation_timeout.as_millis() as u64,
            selector_timeout_ms: settings.selector_timeout.as_millis() as u64,
            extract_max_chars: settings.extract_max_chars,
            default_wait_ms: settings.default_wait_ms,
            remote_url: None,
            remote_api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.session_idle_timeout_ms)
    }
}

impl BrowserConfig {
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            selector_timeout: Duration::from_millis(self.selector_timeout_ms),
            extract_max_chars: self.extract_max_chars,
            default_wait_ms: self.default_wait_ms,
            capture_screenshots: self.capture_screenshots,
            ..ExecutorSettings::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReasoningProvider {
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    #[default]
    #[serde(rename = "gemini")]
    Gemini,
    /// Deterministic offline client.
    #[serde(rename = "mock")]
    Mock,
}

impl ReasoningProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningProvider::OpenAi => "openai",
            ReasoningProvider::Gemini => "gemini",
            ReasoningProvider::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub provider: ReasoningProvider,
    /// Provider default when unset.
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: ReasoningProvider::default(),
            model: None,
            api_base: None,
            api_key: None,
            temperature: 0.2,
            timeout_ms: 60_000,
        }
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Run the engine in-process.
    #[default]
    Local,
    /// Forward tasks to a remote engine's `/v1/execute`.
    Remote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub dispatch: DispatchMode,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed task store. In-memory when unset.
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build the effective configuration. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default()).context("Failed to seed default config")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let layered = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: AppConfig = layered
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.apply_env_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_steps == 0 {
            bail!("engine.max_steps must be at least 1");
        }
        if self.engine.step_timeout_ms == 0 || self.engine.reasoning_timeout_ms == 0 {
            bail!("engine timeouts must be greater than zero");
        }
        if self.browser.extract_max_chars == 0 {
            bail!("browser.extract_max_chars must be at least 1");
        }
        Ok(())
    }

    fn apply_env_secrets(&mut self) {
        fill_from_env(&mut self.server.api_key, "TASKPILOT_API_KEY");
        let provider_key = match self.reasoning.provider {
            ReasoningProvider::OpenAi => Some("OPENAI_API_KEY"),
            ReasoningProvider::Gemini => Some("GEMINI_API_KEY"),
            ReasoningProvider::Mock => None,
        };
        if let Some(var) = provider_key {
            fill_from_env(&mut self.reasoning.api_key, var);
        }
    }

    /// Copy with every secret replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.server.api_key,
            &mut copy.browser.remote_api_key,
            &mut copy.reasoning.api_key,
            &mut copy.gateway.remote_api_key,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = env::var(var).ok().filter(|value| !value.trim().is_empty());
    }
}
