//! Action executor lifecycle: `launch`, then any number of `execute`, then
//! exactly one `close`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use taskpilot_core_types::{ActionResult, Observation};
use tracing::{debug, info, warn};

use crate::errors::{ActionError, ExecutorError};
use crate::primitives;
use crate::session::{BrowserSession, SessionFactory};
use crate::types::{ActionOutcome, BrowserAction, ExecutorSettings};

/// Executes browser actions for a single task.
///
/// Action failures come back as `Ok` with `result.success == false`; `Err`
/// is reserved for lifecycle violations and transport failures.
#[async_trait]
pub trait ActionExecutor: Send {
    async fn launch(&mut self) -> Result<(), ExecutorError>;

    async fn execute(&mut self, action: &str, params: &Value) -> Result<ActionOutcome, ExecutorError>;

    async fn close(&mut self) -> Result<(), ExecutorError>;
}

enum Lifecycle {
    Idle,
    /// Launched; the session is opened on the first action that needs it.
    Launched(Option<Box<dyn BrowserSession>>),
    Closed,
}

/// Local executor driving a [`BrowserSession`] from a [`SessionFactory`].
pub struct BrowserActionExecutor {
    factory: Arc<dyn SessionFactory>,
    settings: ExecutorSettings,
    state: Lifecycle,
    last_observation: Observation,
}

impl BrowserActionExecutor {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: ExecutorSettings) -> Self {
        Self {
            factory,
            settings,
            state: Lifecycle::Idle,
            last_observation: Observation::default(),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn has_session(&self) -> bool {
        matches!(self.state, Lifecycle::Launched(Some(_)))
    }

    fn failed(&self, err: ActionError) -> ActionOutcome {
        ActionOutcome {
            result: ActionResult::failure(err.to_string()),
            observation: self.last_observation.clone(),
        }
    }
}

#[async_trait]
impl ActionExecutor for BrowserActionExecutor {
    async fn launch(&mut self) -> Result<(), ExecutorError> {
        match self.state {
            Lifecycle::Idle => {
                debug!(driver = self.factory.name(), "executor launched");
                self.state = Lifecycle::Launched(None);
                Ok(())
            }
            // Idempotent while live.
            Lifecycle::Launched(_) => Ok(()),
            Lifecycle::Closed => Err(ExecutorError::Closed),
        }
    }

    async fn execute(&mut self, action: &str, params: &Value) -> Result<ActionOutcome, ExecutorError> {
        let slot = match &mut self.state {
            Lifecycle::Idle => return Err(ExecutorError::NotLaunched),
            Lifecycle::Closed => return Err(ExecutorError::Closed),
            Lifecycle::Launched(slot) => slot,
        };

        // Validation happens before the session is touched.
        let normalized = match BrowserAction::normalize(action, params, self.settings.default_wait_ms) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(action = %action, error = %err, "rejected action");
                return Ok(self.failed(err));
            }
        };

        if slot.is_none() {
            info!(driver = self.factory.name(), "opening browser session");
            let session = self
                .factory
                .open()
                .await
                .map_err(|err| ExecutorError::SessionStartup(err.to_string()))?;
            *slot = Some(session);
        }
        let Some(session) = slot.as_mut() else {
            return Err(ExecutorError::NotLaunched);
        };

        let started = Instant::now();
        let result = match primitives::dispatch(session.as_mut(), &self.settings, &normalized).await {
            Ok(result) => result,
            Err(err) => {
                warn!(action = %normalized.kind(), error = %err, "action failed");
                ActionResult::failure(err.to_string())
            }
        };
        debug!(
            action = %normalized.kind(),
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "action finished"
        );

        let observation = match session.observe(self.settings.capture_screenshots).await {
            Ok(observation) => observation,
            Err(err) => {
                warn!(error = %err, "observation failed; reusing previous snapshot");
                self.last_observation.clone()
            }
        };
        self.last_observation = Observation {
            screenshot: None,
            ..observation.clone()
        };

        Ok(ActionOutcome {
            result,
            observation,
        })
    }

    async fn close(&mut self) -> Result<(), ExecutorError> {
        match std::mem::replace(&mut self.state, Lifecycle::Closed) {
            Lifecycle::Closed => Err(ExecutorError::Closed),
            Lifecycle::Idle => Ok(()),
            Lifecycle::Launched(None) => Ok(()),
            Lifecycle::Launched(Some(mut session)) => {
                info!(driver = self.factory.name(), "closing browser session");
                if let Err(err) = session.shutdown().await {
                    warn!(error = %err, "browser session shutdown reported an error");
                }
                Ok(())
            }
        }
    }
}
