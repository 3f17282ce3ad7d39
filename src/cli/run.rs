use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use taskpilot::{runtime, AppConfig, EngineMode, TaskOutcome};
use taskpilot_core_types::StepRecord;

use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Natural-language goal
    #[arg(short, long)]
    pub goal: String,

    /// User the task is recorded for
    #[arg(short, long)]
    pub user: Option<String>,

    /// Engine mode (plan or step), overriding `engine.mode`
    #[arg(short, long)]
    pub mode: Option<EngineMode>,

    /// Step budget, overriding `engine.max_steps`
    #[arg(long)]
    pub max_steps: Option<u32>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    outcome: &'a TaskOutcome,
    steps: &'a [StepRecord],
}

pub async fn cmd_run(args: RunArgs, config: &AppConfig, output: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.engine.mode = mode;
    }
    if let Some(max_steps) = args.max_steps {
        config.engine = config.engine.with_max_steps(max_steps);
    }

    let store = runtime::build_store(&config.storage);
    let executors = runtime::build_executor_provider(&config.browser)?;
    let gateway = runtime::build_gateway(&config, store.clone(), executors)?;

    let outcome = gateway.submit_and_wait(&args.goal, args.user).await?;
    let steps = store.steps(&outcome.task_id).await?;

    output.emit(
        &RunReport {
            outcome: &outcome,
            steps: &steps,
        },
        || print_human(&outcome, &steps),
    )?;

    if !outcome.success {
        bail!("Mission failed: {}", outcome.message);
    }
    Ok(())
}

fn print_human(outcome: &TaskOutcome, steps: &[StepRecord]) {
    println!("Task {}", outcome.task_id);
    for step in steps {
        let mark = if step.success { "ok" } else { "FAILED" };
        println!("  {:>2}. [{mark}] {} {}", step.sequence, step.action, step.params);
        println!("      {}", preview(&step.result));
    }
    println!();
    println!("{}", outcome.message);
    if let Some(output) = &outcome.output {
        println!();
        match output.get("text").and_then(|text| text.as_str()) {
            Some(text) => println!("{text}"),
            None => println!("{output}"),
        }
    }
}

/// First line of a step result, capped for terminal output.
fn preview(result: &str) -> String {
    const MAX_CHARS: usize = 160;
    let line = result.lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS || line.len() < result.trim_end().len() {
        let head: String = line.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}
