//! TaskPilot library
//!
//! Goal-driven browser automation: the task engine, task store, gateway and
//! HTTP surface. Reasoning clients live in `agent-core`, browser actions in
//! `action-primitives`.

pub mod auth;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod metrics;
pub mod runtime;
pub mod server;
pub mod store;

pub use config::AppConfig;
pub use engine::{EngineConfig, EngineMode, FailurePolicy, StepSink, TaskEngine, TaskOutcome};
pub use errors::{ApiError, GatewayError, StoreError};
pub use gateway::{TaskGateway, TaskRunner};
pub use store::{FileTaskStore, InMemoryTaskStore, TaskStore};
