use clap::Parser;

use jsonpoll::app::AppContext;
use jsonpoll::cli::{commands, Cli, Commands};
use jsonpoll::config::Config;
use jsonpoll::logging::{self, LoggingMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mode = if cli.verbose {
        LoggingMode::Debug
    } else {
        LoggingMode::Development
    };
    logging::init(mode)?;

    match cli.command {
        Commands::ConfigPath => {
            println!("{}", Config::default_config_path()?.display());
        }
        Commands::Watch { paths, every, etag } => {
            let mut config = Config::load()?;
            if let Some(base) = cli.base {
                config.session.base_url = base;
            }
            if let Some(token) = cli.token {
                config.session.token = token;
            }

            let ctx = AppContext::new(config)?;
            commands::watch(&ctx, &paths, every, etag).await?;
        }
    }

    Ok(())
}
