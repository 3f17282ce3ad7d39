//! Remote executor sessions: one launched executor per session id.
//!
//! Sessions idle for longer than the configured timeout are closed by a
//! background sweep, so a client that disappears without `DELETE` does not
//! hold a browser forever.

use std::sync::{Arc, Weak};
use std::time::Duration;

use action_primitives::{
    ActionExecutor, ExecuteActionRequest, ExecuteActionResponse, ExecutorError,
    OpenSessionRequest, OpenSessionResponse,
};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::metrics;
use crate::runtime::ExecutorProvider;

use super::state::AppState;

const MAX_SESSION_ID_LEN: usize = 64;

struct Session {
    executor: Mutex<Box<dyn ActionExecutor>>,
    last_used: parking_lot::Mutex<Instant>,
}

impl Session {
    fn new(executor: Box<dyn ActionExecutor>) -> Self {
        Self {
            executor: Mutex::new(executor),
            last_used: parking_lot::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }
}

pub struct SessionRegistry {
    executors: Arc<dyn ExecutorProvider>,
    sessions: DashMap<String, Arc<Session>>,
    max_sessions: usize,
    idle_timeout: Option<Duration>,
    reaper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl SessionRegistry {
    pub fn new(executors: Arc<dyn ExecutorProvider>, max_sessions: usize) -> Self {
        Self {
            executors,
            sessions: DashMap::new(),
            max_sessions: max_sessions.max(1),
            idle_timeout: None,
            reaper: parking_lot::Mutex::new(None),
        }
    }

    /// Close sessions unused for `timeout`. Zero disables eviction.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Open a session, under `requested` when the client picked the id.
    ///
    /// Reopening a live id returns it unchanged, so a client whose first
    /// open was cut short can retry without leaking the session.
    pub async fn open(&self, requested: Option<String>) -> Result<String, ApiError> {
        if let Some(id) = &requested {
            validate_session_id(id)?;
            if let Some(existing) = self.sessions.get(id) {
                existing.touch();
                return Ok(id.clone());
            }
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(ApiError::Unavailable(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }
        let mut executor = self.executors.create().map_err(executor_error)?;
        executor.launch().await.map_err(executor_error)?;

        let session_id = requested.unwrap_or_else(|| Uuid::new_v4().to_string());
        let duplicate = match self.sessions.entry(session_id.clone()) {
            // Lost a race with a concurrent open of the same id.
            Entry::Occupied(_) => Some(executor),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Session::new(executor)));
                None
            }
        };
        if let Some(mut executor) = duplicate {
            if let Err(err) = executor.close().await {
                warn!(session = %session_id, %err, "failed to close duplicate executor");
            }
            return Ok(session_id);
        }
        metrics::set_active_sessions(self.sessions.len());
        info!(session = %session_id, "executor session opened");
        Ok(session_id)
    }

    pub async fn execute(
        &self,
        session_id: &str,
        request: ExecuteActionRequest,
    ) -> Result<ExecuteActionResponse, ApiError> {
        let session = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;
        session.touch();
        let outcome = {
            let mut executor = session.executor.lock().await;
            executor.execute(&request.action, &request.params).await
        };
        session.touch();
        Ok(outcome.map_err(executor_error)?.into())
    }

    pub async fn close(&self, session_id: &str) -> Result<(), ApiError> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| ApiError::NotFound(format!("session {session_id} not found")))?;
        metrics::set_active_sessions(self.sessions.len());
        let result = session.executor.lock().await.close().await;
        info!(session = %session_id, "executor session closed");
        result.map_err(executor_error)
    }

    pub async fn close_all(&self) {
        if let Some(handle) = self.reaper.lock().take() {
            handle.abort();
        }
        let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            if let Err(err) = self.close(&id).await {
                warn!(session = %id, %err, "failed to close session on shutdown");
            }
        }
    }

    /// Close every session idle past the timeout. Returns how many closed.
    pub async fn evict_idle(&self) -> usize {
        let Some(timeout) = self.idle_timeout else {
            return 0;
        };
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.idle_for() >= timeout)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for id in stale {
            // Re-checked under the map lock; an action may have touched it since.
            let Some((_, session)) = self
                .sessions
                .remove_if(&id, |_, session| session.idle_for() >= timeout)
            else {
                continue;
            };
            evicted += 1;
            if let Err(err) = session.executor.lock().await.close().await {
                warn!(session = %id, %err, "idle session close reported an error");
            }
            info!(session = %id, idle_ms = timeout.as_millis() as u64, "idle executor session evicted");
        }
        if evicted > 0 {
            metrics::set_active_sessions(self.sessions.len());
        }
        evicted
    }

    /// Start the background idle sweep. No-op without an idle timeout or
    /// when already running. Stops once the registry is dropped.
    pub fn start_reaper(self: &Arc<Self>) {
        let Some(timeout) = self.idle_timeout else {
            return;
        };
        let mut guard = self.reaper.lock();
        if guard.is_some() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = (timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(60));
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "session sweep finished");
                }
            }
        });
        *guard = Some(handle);
    }
}

fn validate_session_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid session id: {id}")))
    }
}

fn executor_error(err: ExecutorError) -> ApiError {
    match err {
        ExecutorError::Transport(_) | ExecutorError::Remote { .. } => {
            ApiError::BadGateway(err.to_string())
        }
        other => ApiError::Unavailable(other.to_string()),
    }
}

pub(super) async fn open_session_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<OpenSessionResponse>), ApiError> {
    let request: OpenSessionRequest = if body.is_empty() {
        OpenSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::BadRequest(format!("invalid session request: {err}")))?
    };
    let session_id = state.sessions.open(request.session_id).await?;
    Ok((StatusCode::CREATED, Json(OpenSessionResponse { session_id })))
}

pub(super) async fn execute_action_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<ExecuteActionRequest>, JsonRejection>,
) -> Result<Json<ExecuteActionResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    Ok(Json(state.sessions.execute(&session_id, request).await?))
}

pub(super) async fn close_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.close(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use action_primitives::ActionOutcome;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use taskpilot_core_types::{ActionResult, Observation};

    use super::*;

    struct CountingExecutor {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionExecutor for CountingExecutor {
        async fn launch(&mut self) -> Result<(), ExecutorError> {
            Ok(())
        }

        async fn execute(&mut self, action: &str, _params: &Value) -> Result<ActionOutcome, ExecutorError> {
            Ok(ActionOutcome {
                result: ActionResult::ok(format!("{action} done")),
                observation: Observation::default(),
            })
        }

        async fn close(&mut self) -> Result<(), ExecutorError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        closes: Arc<AtomicUsize>,
    }

    impl ExecutorProvider for CountingProvider {
        fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError> {
            Ok(Box::new(CountingExecutor {
                closes: self.closes.clone(),
            }))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn registry(idle: Duration) -> (Arc<SessionRegistry>, Arc<AtomicUsize>) {
        let provider = CountingProvider::default();
        let closes = provider.closes.clone();
        let registry = SessionRegistry::new(Arc::new(provider), 2).with_idle_timeout(idle);
        (Arc::new(registry), closes)
    }

    fn wait_request() -> ExecuteActionRequest {
        ExecuteActionRequest {
            action: "wait".into(),
            params: json!(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted_and_closed() {
        let (registry, closes) = registry(Duration::from_secs(60));
        let busy = registry.open(None).await.unwrap();
        registry.open(None).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        registry.execute(&busy, wait_request()).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(registry.execute(&busy, wait_request()).await.is_ok());

        // A freed slot can be reused.
        registry.open(None).await.unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_frees_abandoned_sessions() {
        let (registry, closes) = registry(Duration::from_secs(60));
        registry.start_reaper();
        registry.open(None).await.unwrap();
        registry.open(None).await.unwrap();
        assert!(registry.open(None).await.is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(registry.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_timeout_disables_eviction() {
        let (registry, _) = registry(Duration::ZERO);
        registry.open(None).await.unwrap();
        assert_eq!(registry.evict_idle().await, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn reopening_a_client_chosen_id_is_idempotent() {
        let (registry, closes) = registry(Duration::ZERO);
        let first = registry.open(Some("client-1".into())).await.unwrap();
        let again = registry.open(Some("client-1".into())).await.unwrap();
        assert_eq!(first, "client-1");
        assert_eq!(again, "client-1");
        assert_eq!(registry.len(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        let err = registry.open(Some("../bad".into())).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
