//! Action executor for TaskPilot.
//!
//! Executes one concrete browser operation at a time against a browser
//! session owned by a single task:
//! - 5 primitives: navigate, click, type, extract, wait
//! - explicit normalization of loosely shaped parameters into [`BrowserAction`]
//! - `launch` / `execute` / `close` lifecycle with a lazily opened session
//! - a remote executor speaking the same contract over HTTP

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod errors;
pub mod executor;
mod primitives;
pub mod remote;
pub mod session;
pub mod types;

pub use errors::*;
pub use executor::*;
pub use remote::*;
pub use session::*;
pub use types::*;

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumSessionFactory, ChromiumSettings};
