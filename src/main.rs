//! # PHP application server
//!
//! Deploys the applications listed in the deployment file, registers their
//! references in per-application naming directories and serves lookups
//! against those directories over HTTP until interrupted.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use php_appserver::config::AppConfig;
use php_appserver::deployment::{deploy_all, DeploymentFile};
use php_appserver::server::{Applications, HttpServer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_logging(&config)?;

    // Stop flag flipped by the signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    println!("🚀 Starting PHP application server...");

    let deployment_file = DeploymentFile::load(&config.deployment.descriptor_path)?;
    let deployments = deploy_all(&deployment_file)?;

    let applications: Applications = deployments
        .into_iter()
        .map(|deployment| (deployment.application.name().to_string(), deployment))
        .collect::<BTreeMap<_, _>>();
    let applications = Arc::new(applications);
    println!("✅ {} application(s) deployed", applications.len());

    let server = HttpServer::new(config.server.clone(), applications.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            error!("HTTP server failed: {:#}", e);
            std::process::exit(1);
        }
    });

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(config.shutdown_check_interval).await;
    }

    info!("🛑 Shutdown requested, undeploying applications...");
    for deployment in applications.values() {
        if let Err(e) = deployment.undeploy() {
            warn!("Failed to undeploy {}: {}", deployment.application.name(), e);
        }
    }

    server_handle.abort();
    let _ = server_handle.await;

    Ok(())
}

/// Initialises logging to stderr and to `<LOG_DIR>/server.log`.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `LOG_LEVEL`.
fn init_logging(config: &AppConfig) -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    let log_dir = &config.logging.directory;
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(log_dir).join("server.log"))?;

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("php_appserver={},hyper=info", config.logging.level))
        })
    };

    let file_layer = fmt::layer()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(env_filter());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_line_number(true)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}
