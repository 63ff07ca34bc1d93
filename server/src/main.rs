mod error;
mod logging;
mod routes;
mod services;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;

use medialib::audit::JsonlAuditSink;
use medialib::config::Config;
use medialib::status::StatusLedger;
use medialib::store::ArtifactStore;
use medialib::JobCoordinator;

use services::jobs::AppState;

#[derive(Parser)]
#[command(about = "Media job orchestration server")]
struct Args {
    /// Configuration file, shared with the worker processes it spawns.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        Config::from_file(&args.config)
            .with_context(|| format!("loading config from {}", args.config.display()))?
    } else {
        tracing::warn!(path = %args.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let ledger = StatusLedger::open(&config.storage.status_root)?;
    let store = ArtifactStore::open(
        &config.storage.processing_root,
        &config.storage.results_root,
    )?;
    let audit = Arc::new(JsonlAuditSink::new(&config.storage.audit_log));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        addr = %bind_addr,
        max_concurrent = config.jobs.max_concurrent,
        worker = %config.jobs.worker_bin.display(),
        "starting media job server"
    );

    let coordinator = JobCoordinator::spawn(
        config,
        args.config.clone(),
        ledger.clone(),
        store.clone(),
        audit,
        64,
    );
    let state = web::Data::new(AppState {
        coordinator,
        ledger,
        store,
    });

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}
