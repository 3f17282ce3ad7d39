use anyhow::Result;

use super::commands::Commands;
use super::config::cmd_config;
use super::context::CliContext;
use super::env::CliArgs;
use super::info::cmd_info;
use super::plan::cmd_plan;
use super::run::cmd_run;
use super::serve::cmd_serve;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, ctx.config().clone()).await,
        Commands::Run(args) => cmd_run(args, ctx.config(), cli.output).await,
        Commands::Plan(args) => cmd_plan(args, ctx.config(), cli.output).await,
        Commands::Config(args) => cmd_config(args, ctx, cli.output),
        Commands::Info => cmd_info(ctx, cli.output),
    }
}
