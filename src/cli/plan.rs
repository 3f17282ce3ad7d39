use anyhow::{anyhow, Context, Result};
use clap::Args;
use taskpilot::{runtime, AppConfig};

use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// Natural-language goal
    #[arg(short, long)]
    pub goal: String,
}

pub async fn cmd_plan(args: PlanArgs, config: &AppConfig, output: OutputFormat) -> Result<()> {
    let reasoning = runtime::build_reasoning_client(&config.reasoning)?;
    let plan = tokio::time::timeout(config.engine.reasoning_timeout(), reasoning.plan(&args.goal))
        .await
        .map_err(|_| anyhow!("Reasoning timed out"))?
        .context("Planning failed")?;

    output.emit(&plan, || {
        println!("Plan for: {}", plan.goal);
        for step in &plan.steps {
            println!("  {:>2}. {} {}", step.id, step.action, step.params);
            if !step.instruction.is_empty() {
                println!("      {}", step.instruction);
            }
        }
    })
}
