use std::path::Path;

use anyhow::{Context, bail};
use api::{AdminGate, ApiConfig, AppState};
use axum::http::HeaderName;
use course_core::pagination::PagingConfig;
use services::{AppServices, Clock};
use tracing::info;

use crate::cli::ServeArgs;

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let paging = PagingConfig::new(args.default_page_size, args.max_page_size)
        .context("invalid page size settings")?;
    let config = api_config(&args)?;

    let clock = Clock::default_clock();
    let services = if args.in_memory() {
        info!("using in-memory storage");
        AppServices::in_memory(clock, paging)
    } else {
        prepare_database_dir(&args.db)?;
        info!(db = %args.db, "opening sqlite storage");
        AppServices::sqlite(&args.db, clock, paging)
            .await
            .with_context(|| format!("failed to open {}", args.db))?
    };

    let app = api::router(AppState::new(services, config));
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %args.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shut down");
    Ok(())
}

fn api_config(args: &ServeArgs) -> anyhow::Result<ApiConfig> {
    let learner_header = HeaderName::try_from(args.learner_header.as_str())
        .with_context(|| format!("invalid learner header `{}`", args.learner_header))?;
    let admin_header = args
        .admin_header
        .as_deref()
        .map(HeaderName::try_from)
        .transpose()
        .context("invalid admin header")?;
    if admin_header.is_some() != args.admin_secret.is_some() {
        bail!("--admin-header and --admin-secret must be set together");
    }

    Ok(ApiConfig {
        learner_header,
        admin: AdminGate::new(
            admin_header,
            args.admin_secret.clone(),
            args.admin_only.iter().copied(),
        ),
    })
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn prepare_database_dir(db_url: &str) -> anyhow::Result<()> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("database url `{db_url}` names no file");
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received");
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["course-server", "serve"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(args) => args,
            Command::Conformance(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn admin_header_requires_a_secret() {
        let args = serve_args(&["--admin-header", "x-admin"]);
        assert!(api_config(&args).is_err());
    }

    #[test]
    fn config_uses_the_learner_header() {
        let args = serve_args(&["--learner-header", "x-user"]);
        let config = api_config(&args).unwrap();
        assert_eq!(config.learner_header.as_str(), "x-user");
    }

    #[test]
    fn database_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("course-server-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}/nested/db.sqlite3?mode=rwc", dir.display());
        prepare_database_dir(&url).unwrap();
        assert!(dir.join("nested").is_dir());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
