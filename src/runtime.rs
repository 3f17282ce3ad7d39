//! Builds the engine, executors, store and gateway from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{
    ActionExecutor, BrowserActionExecutor, ExecutorError, ExecutorSettings, RemoteActionExecutor,
    RemoteExecutorConfig, SessionFactory,
};
use agent_core::{
    GeminiBackend, GeminiConfig, LlmReasoningClient, MockReasoningClient, OpenAiBackend,
    OpenAiConfig, ReasoningClient,
};
use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use url::Url;

use crate::config::{
    AppConfig, BrowserConfig, BrowserDriver, DispatchMode, ReasoningConfig, ReasoningProvider,
    StorageConfig,
};
use crate::engine::{EngineConfig, TaskEngine};
use crate::gateway::{LocalTaskRunner, RemoteRunnerConfig, RemoteTaskRunner, TaskGateway, TaskRunner};
use crate::store::{FileTaskStore, InMemoryTaskStore, TaskStore};

/// Hands out one fresh, unlaunched executor per task or session.
pub trait ExecutorProvider: Send + Sync {
    fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError>;

    fn name(&self) -> &str;
}

pub struct LocalExecutorProvider {
    factory: Arc<dyn SessionFactory>,
    settings: ExecutorSettings,
}

impl LocalExecutorProvider {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: ExecutorSettings) -> Self {
        Self { factory, settings }
    }
}

impl ExecutorProvider for LocalExecutorProvider {
    fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError> {
        Ok(Box::new(BrowserActionExecutor::new(
            self.factory.clone(),
            self.settings.clone(),
        )))
    }

    fn name(&self) -> &str {
        self.factory.name()
    }
}

pub struct RemoteExecutorProvider {
    config: RemoteExecutorConfig,
}

impl RemoteExecutorProvider {
    pub fn new(config: RemoteExecutorConfig) -> Self {
        Self { config }
    }
}

impl ExecutorProvider for RemoteExecutorProvider {
    fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError> {
        Ok(Box::new(RemoteActionExecutor::new(self.config.clone())?))
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Used when no browser driver is available; every task fails up front.
pub struct UnavailableExecutorProvider {
    reason: String,
}

impl UnavailableExecutorProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ExecutorProvider for UnavailableExecutorProvider {
    fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError> {
        Err(ExecutorError::SessionStartup(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "none"
    }
}

pub fn build_reasoning_client(config: &ReasoningConfig) -> Result<Arc<dyn ReasoningClient>> {
    let client: Arc<dyn ReasoningClient> = match config.provider {
        ReasoningProvider::Mock => Arc::new(MockReasoningClient),
        ReasoningProvider::OpenAi => {
            let mut openai = OpenAiConfig {
                api_keys: config
                    .api_key
                    .iter()
                    .flat_map(|keys| keys.split(','))
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect(),
                temperature: config.temperature,
                timeout: config.timeout(),
                ..OpenAiConfig::default()
            };
            if let Some(model) = &config.model {
                openai.model = model.clone();
            }
            if let Some(base) = &config.api_base {
                openai.api_base = base.clone();
            }
            let backend = OpenAiBackend::new(openai).context("OpenAI provider misconfigured")?;
            Arc::new(LlmReasoningClient::new(Arc::new(backend)))
        }
        ReasoningProvider::Gemini => {
            let mut gemini = GeminiConfig {
                api_key: config.api_key.clone().unwrap_or_default(),
                temperature: config.temperature,
                timeout: config.timeout(),
                ..GeminiConfig::default()
            };
            if let Some(model) = &config.model {
                gemini.model = model.clone();
            }
            if let Some(base) = &config.api_base {
                gemini.endpoint = base.clone();
            }
            let backend = GeminiBackend::new(gemini).context("Gemini provider misconfigured")?;
            Arc::new(LlmReasoningClient::new(Arc::new(backend)))
        }
    };
    info!(provider = config.provider.as_str(), "reasoning client ready");
    Ok(client)
}

#[cfg(feature = "chromium")]
fn chromium_factory(config: &BrowserConfig) -> Option<Arc<dyn SessionFactory>> {
    use action_primitives::{ChromiumSessionFactory, ChromiumSettings};

    Some(Arc::new(ChromiumSessionFactory::new(ChromiumSettings {
        headless: config.headless,
        ..ChromiumSettings::default()
    })))
}

#[cfg(not(feature = "chromium"))]
fn chromium_factory(_config: &BrowserConfig) -> Option<Arc<dyn SessionFactory>> {
    None
}

pub fn build_executor_provider(config: &BrowserConfig) -> Result<Arc<dyn ExecutorProvider>> {
    let provider: Arc<dyn ExecutorProvider> = match config.driver {
        BrowserDriver::Chromium => match chromium_factory(config) {
            Some(factory) => Arc::new(LocalExecutorProvider::new(
                factory,
                config.executor_settings(),
            )),
            None => Arc::new(UnavailableExecutorProvider::new(
                "chromium driver requested but this build lacks the `chromium` feature",
            )),
        },
        BrowserDriver::Remote => {
            let base_url = remote_url(config.remote_url.as_deref(), "browser.remote_url")?;
            let settings = config.executor_settings();
            Arc::new(RemoteExecutorProvider::new(RemoteExecutorConfig {
                base_url,
                api_key: config.remote_api_key.clone(),
                timeout: settings.navigation_timeout + settings.selector_timeout
                    + Duration::from_secs(10),
            }))
        }
        BrowserDriver::None => Arc::new(UnavailableExecutorProvider::new(
            "no browser driver configured",
        )),
    };
    info!(driver = provider.name(), "executor provider ready");
    Ok(provider)
}

pub fn build_store(config: &StorageConfig) -> Arc<dyn TaskStore> {
    match &config.dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using file task store");
            Arc::new(FileTaskStore::new(dir.clone()))
        }
        None => Arc::new(InMemoryTaskStore::new()),
    }
}

/// Engine with `engine` overrides applied on top of the loaded config.
pub fn build_engine(config: &AppConfig, engine: EngineConfig) -> Result<Arc<TaskEngine>> {
    let reasoning = build_reasoning_client(&config.reasoning)?;
    Ok(Arc::new(TaskEngine::new(reasoning, engine)))
}

pub fn build_gateway(
    config: &AppConfig,
    store: Arc<dyn TaskStore>,
    executors: Arc<dyn ExecutorProvider>,
) -> Result<TaskGateway> {
    let runner: Arc<dyn TaskRunner> = match config.gateway.dispatch {
        DispatchMode::Local => {
            let engine = build_engine(config, config.engine.clone())?;
            Arc::new(LocalTaskRunner::new(engine, executors, store.clone()))
        }
        DispatchMode::Remote => {
            let base_url = remote_url(config.gateway.remote_url.as_deref(), "gateway.remote_url")?;
            let per_task = config.engine.step_timeout() + config.engine.reasoning_timeout();
            let remote = RemoteRunnerConfig {
                base_url,
                api_key: config.gateway.remote_api_key.clone(),
                timeout: per_task * (config.engine.max_steps + 1),
            };
            let runner =
                RemoteTaskRunner::new(remote, store.clone()).map_err(|err| anyhow!(err))?;
            Arc::new(runner)
        }
    };
    Ok(TaskGateway::new(store, runner))
}

fn remote_url(raw: Option<&str>, key: &str) -> Result<String> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        bail!("`{key}` is required for remote dispatch");
    };
    let parsed = Url::parse(raw).with_context(|| format!("`{key}` is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("`{key}` must be an http(s) URL");
    }
    Ok(raw.trim_end_matches('/').to_string())
}
