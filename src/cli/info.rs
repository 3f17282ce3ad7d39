use anyhow::Result;
use serde_json::json;

use super::context::CliContext;
use super::output::OutputFormat;

pub fn cmd_info(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let config_path = ctx
        .config_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());
    let storage = config
        .storage
        .dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| "memory".to_string());
    let chromium = cfg!(feature = "chromium");

    let report = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildDate": env!("BUILD_DATE"),
        "gitHash": env!("GIT_HASH"),
        "gitBranch": env!("GIT_BRANCH"),
        "config": config_path,
        "engineMode": config.engine.mode.as_str(),
        "maxSteps": config.engine.max_steps,
        "reasoningProvider": config.reasoning.provider.as_str(),
        "browserDriver": config.browser.driver,
        "chromiumSupport": chromium,
        "dispatch": config.gateway.dispatch,
        "storage": storage,
    });

    output.emit(&report, || {
        println!("TaskPilot System Information");
        println!("===========================");
        println!("Version: {}", env!("CARGO_PKG_VERSION"));
        println!("Build Date: {}", env!("BUILD_DATE"));
        println!("Git Commit: {} ({})", env!("GIT_HASH"), env!("GIT_BRANCH"));
        println!();
        println!("Configuration: {config_path}");
        println!("- Engine Mode: {}", config.engine.mode);
        println!("- Max Steps: {}", config.engine.max_steps);
        println!("- Reasoning Provider: {}", config.reasoning.provider.as_str());
        println!("- Browser Driver: {:?}", config.browser.driver);
        println!("- Chromium Support: {}", if chromium { "yes" } else { "no" });
        println!("- Dispatch: {:?}", config.gateway.dispatch);
        println!("- Storage: {storage}");
    })
}
