#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_primitives::{
    ActionExecutor, ActionOutcome, BrowserSession, DriverError, ExecutorError, SessionFactory,
};
use agent_core::{ActionFeedback, Plan, PlanStep, PlannerError, ReasoningClient, StepDecision};
use async_trait::async_trait;
use serde_json::{json, Value};
use taskpilot::engine::StepSink;
use taskpilot::runtime::ExecutorProvider;
use taskpilot_core_types::{ActionResult, Observation, StepRecord};

/// Reasoning client that replays canned answers.
#[derive(Default)]
pub struct ScriptedReasoningClient {
    plan: Mutex<Option<Result<Plan, PlannerError>>>,
    decisions: Mutex<VecDeque<Result<StepDecision, PlannerError>>>,
    seen: Mutex<Vec<Option<ActionFeedback>>>,
}

impl ScriptedReasoningClient {
    pub fn with_plan(goal: &str, steps: Vec<(&str, Value)>) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, (action, params))| PlanStep {
                id: index as u32 + 1,
                instruction: format!("do {action}"),
                action: action.to_string(),
                params,
            })
            .collect();
        let client = Self::default();
        *client.plan.lock().unwrap() = Some(Ok(Plan {
            goal: goal.to_string(),
            steps,
        }));
        client
    }

    pub fn with_plan_error(err: PlannerError) -> Self {
        let client = Self::default();
        *client.plan.lock().unwrap() = Some(Err(err));
        client
    }

    pub fn with_decisions(decisions: Vec<Result<StepDecision, PlannerError>>) -> Self {
        let client = Self::default();
        *client.decisions.lock().unwrap() = decisions.into_iter().collect();
        client
    }

    /// History argument of every `decide` call, in order.
    pub fn seen(&self) -> Vec<Option<ActionFeedback>> {
        self.seen.lock().unwrap().clone()
    }
}

pub fn decision(action: &str, params: Value, is_done: bool) -> Result<StepDecision, PlannerError> {
    Ok(StepDecision {
        thought: format!("next: {action}"),
        action: action.to_string(),
        params,
        is_done,
    })
}

#[async_trait]
impl ReasoningClient for ScriptedReasoningClient {
    async fn plan(&self, _goal: &str) -> Result<Plan, PlannerError> {
        self.plan
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(PlannerError::parse("no scripted plan")))
    }

    async fn decide(
        &self,
        _goal: &str,
        history: Option<&ActionFeedback>,
    ) -> Result<StepDecision, PlannerError> {
        self.seen.lock().unwrap().push(history.cloned());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| decision("wait", json!(1), false))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Counters shared between a test and the executors it hands out.
#[derive(Default)]
pub struct Probe {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub actions: Mutex<Vec<String>>,
}

impl Probe {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

/// Executor double: every action succeeds unless listed as failing,
/// hanging, erroring or panicking.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    pub probe: Arc<Probe>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    erroring: HashSet<String>,
    panicking: HashSet<String>,
    launched: bool,
    url: String,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, action: &str) -> Self {
        self.failing.insert(action.to_string());
        self
    }

    pub fn hanging(mut self, action: &str) -> Self {
        self.hanging.insert(action.to_string());
        self
    }

    pub fn erroring(mut self, action: &str) -> Self {
        self.erroring.insert(action.to_string());
        self
    }

    pub fn panicking(mut self, action: &str) -> Self {
        self.panicking.insert(action.to_string());
        self
    }

    pub fn boxed(&self) -> Box<dyn ActionExecutor> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn launch(&mut self) -> Result<(), ExecutorError> {
        self.probe.launches.fetch_add(1, Ordering::SeqCst);
        self.launched = true;
        Ok(())
    }

    async fn execute(&mut self, action: &str, params: &Value) -> Result<ActionOutcome, ExecutorError> {
        if !self.launched {
            return Err(ExecutorError::NotLaunched);
        }
        self.probe.actions.lock().unwrap().push(action.to_string());
        if self.panicking.contains(action) {
            panic!("executor exploded on {action}");
        }
        if self.hanging.contains(action) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.erroring.contains(action) {
            return Err(ExecutorError::Transport("connection reset".into()));
        }

        let result = if self.failing.contains(action) {
            ActionResult::failure(format!("{action} could not complete"))
        } else {
            match action {
                "navigate" => {
                    self.url = params.as_str().unwrap_or_default().to_string();
                    ActionResult::ok(format!("Navigated to {}", self.url))
                }
                "extract" => ActionResult::ok("Extracted page content")
                    .with_data(json!({ "text": "Example Domain", "truncated": false })),
                other => ActionResult::ok(format!("{other} done")),
            }
        };
        Ok(ActionOutcome {
            result,
            observation: Observation {
                url: self.url.clone(),
                title: "Example Domain".into(),
                screenshot: None,
            },
        })
    }

    async fn close(&mut self) -> Result<(), ExecutorError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.launched = false;
        Ok(())
    }
}

/// Hands out clones of one [`RecordingExecutor`] so tests can inspect the probe.
pub struct RecordingProvider {
    pub template: RecordingExecutor,
}

impl ExecutorProvider for RecordingProvider {
    fn create(&self) -> Result<Box<dyn ActionExecutor>, ExecutorError> {
        Ok(self.template.boxed())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Sink whose every call fails.
pub struct BrokenSink;

#[async_trait]
impl StepSink for BrokenSink {
    async fn on_step(&self, _record: &StepRecord) -> anyhow::Result<()> {
        anyhow::bail!("sink offline")
    }
}

/// Static page used with the real local executor.
pub struct StaticPageFactory {
    pub body: String,
}

struct StaticPage {
    body: String,
    url: String,
}

#[async_trait]
impl BrowserSession for StaticPage {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.url = url.to_string();
        Ok(())
    }

    async fn click(&mut self, selector: &str, _wait: Duration) -> Result<(), DriverError> {
        Err(DriverError::TargetNotFound(selector.to_string()))
    }

    async fn fill(&mut self, selector: &str, _text: &str, _wait: Duration) -> Result<(), DriverError> {
        Err(DriverError::TargetNotFound(selector.to_string()))
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        Ok(self.body.clone())
    }

    async fn observe(&mut self, _capture_screenshot: bool) -> Result<Observation, DriverError> {
        Ok(Observation {
            url: self.url.clone(),
            title: "Example Domain".into(),
            screenshot: None,
        })
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for StaticPageFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        Ok(Box::new(StaticPage {
            body: self.body.clone(),
            url: "about:blank".into(),
        }))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Page whose navigation never completes. Counts shutdowns.
#[derive(Default)]
pub struct StalledPageFactory {
    pub shutdowns: Arc<AtomicUsize>,
}

struct StalledPage {
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for StalledPage {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn click(&mut self, selector: &str, _wait: Duration) -> Result<(), DriverError> {
        Err(DriverError::TargetNotFound(selector.to_string()))
    }

    async fn fill(&mut self, selector: &str, _text: &str, _wait: Duration) -> Result<(), DriverError> {
        Err(DriverError::TargetNotFound(selector.to_string()))
    }

    async fn page_text(&mut self) -> Result<String, DriverError> {
        Ok(String::new())
    }

    async fn observe(&mut self, _capture_screenshot: bool) -> Result<Observation, DriverError> {
        Ok(Observation {
            url: "about:blank".into(),
            title: String::new(),
            screenshot: None,
        })
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for StalledPageFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        Ok(Box::new(StalledPage {
            shutdowns: self.shutdowns.clone(),
        }))
    }

    fn name(&self) -> &str {
        "stalled"
    }
}
