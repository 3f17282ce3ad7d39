use anyhow::Result;
use clap::Args;
use taskpilot::{server, AppConfig};

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Address to bind, overriding `server.bind`
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

pub async fn cmd_serve(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    server::serve(config).await
}
