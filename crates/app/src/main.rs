#![forbid(unsafe_code)]

mod cli;
mod conformance;
mod serve;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command};

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info,tower_http=warn,sqlx=warn",
        1 => "debug,sqlx=warn",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Command::Serve(args) => serve::run(args).await,
        Command::Conformance(args) => conformance::run(args).await,
    }
}
