use clap::Subcommand;

use super::config::ConfigArgs;
use super::plan::PlanArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Serve the HTTP API (task gateway, engine boundary, executor sessions)
    Serve(ServeArgs),

    /// Run one goal to completion and print the outcome
    Run(RunArgs),

    /// Ask the reasoning client for a plan without executing it
    Plan(PlanArgs),

    /// Inspect TaskPilot configuration
    Config(ConfigArgs),

    /// Show build and configuration information
    Info,
}
