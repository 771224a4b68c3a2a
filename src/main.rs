//! HTTP gateway for an ESP32-class camera: captures frames on request and
//! manages the resulting image gallery.
//!
//! Usage:
//!   capture-gateway                               # defaults + environment
//!   capture-gateway -c /etc/capture-gateway.conf
//!   capture-gateway -c gateway.conf --stderr      # log to stderr

mod cam;
mod config;
mod error;
mod gallery;
mod naming;
mod notify;
mod web;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};

use crate::cam::CameraClient;
use crate::gallery::Gallery;
use crate::notify::Notifier;
use crate::web::AppState;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "capture-gateway", version, about = "Camera capture and gallery gateway")]
struct Cli {
    /// Path to the configuration file.  Without it, built-in defaults and
    /// CAPTURE_GATEWAY_* environment variables are used.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log to stderr even when syslog is configured.
    #[arg(long)]
    stderr: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("capture-gateway: config error: {e}");
                process::exit(1);
            }
        },
        None => config::GatewayConfig::default(),
    };
    let cfg = config::apply_env(cfg, |k| std::env::var(k).ok());
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("capture-gateway: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    if let Err(e) = setup_logging(use_syslog) {
        eprintln!("capture-gateway: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cfg).await {
        log::error!("{e:#}");
        process::exit(1);
    }
}

async fn run(cfg: config::GatewayConfig) -> anyhow::Result<()> {
    let camera = CameraClient::new(cfg.camera_url(), cfg.camera_host.clone(), cfg.camera_timeout())?;
    let notifier = Notifier::new(
        cfg.workflow_webhook.clone(),
        cfg.workflow_user.clone(),
        cfg.workflow_password.clone(),
        cfg.workflow_timeout(),
    )?;
    let gallery = Gallery::new(cfg.capture_dir.clone());

    info!("capture-gateway {} starting ({})", env!("CARGO_PKG_VERSION"), cfg.environment);
    info!("camera: {} (timeout {:?})", cfg.camera_url(), camera.timeout());
    info!("capture directory: {}", gallery.dir().display());
    if notifier.is_enabled() {
        info!("workflow notifications enabled");
    } else {
        warn!("workflow_webhook not set; captures will not be announced");
    }

    let state = Arc::new(AppState {
        gallery,
        camera,
        notifier,
        environment: cfg.environment.clone(),
    });
    web::start(state, cfg.listen_addr, &cfg.cors_origins).await
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process:  "capture-gateway".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
    }
    Ok(())
}
