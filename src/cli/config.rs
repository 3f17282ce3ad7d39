use anyhow::Result;
use clap::{Args, Subcommand};
use taskpilot::runtime;

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration with secrets redacted
    Show,

    /// Check that the reasoning client and executor can be built
    Validate,
}

pub fn cmd_config(args: ConfigArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let redacted = ctx.config().redacted();
            let format = match output {
                OutputFormat::Human => OutputFormat::Yaml,
                other => other,
            };
            if let (OutputFormat::Human, Some(path)) = (output, ctx.config_path()) {
                println!("# Loaded from {}", path.display());
            }
            format.emit(&redacted, || {})
        }
        ConfigAction::Validate => {
            let config = ctx.config();
            runtime::build_reasoning_client(&config.reasoning)?;
            runtime::build_executor_provider(&config.browser)?;
            println!("Configuration is valid");
            Ok(())
        }
    }
}
