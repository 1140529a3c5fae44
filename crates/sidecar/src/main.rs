use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use clap::Parser;
use eyre::{bail, WrapErr};
use prometheus_client::registry::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vrf_sidecar::{
    config::is_loopback_listen_addr,
    drand, metrics_server,
    process::{DrandProcess, DrandProcessConfig},
    server::{ServerConfig, SidecarServer},
    SidecarConfig, SidecarMetrics,
};

use crate::opts::SidecarOpts;

mod opts;

/// How long the startup loop retries fetcher construction while drand
/// finishes its cold start.
const STARTUP_RETRY_WINDOW: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = SidecarOpts::parse();

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    if !opts.allow_public_bind && !is_loopback_listen_addr(&opts.listen_addr) {
        error!(
            addr = %opts.listen_addr,
            "refusing to bind sidecar to non-loopback address without --vrf-allow-public-bind"
        );
        bail!("non-loopback listen address requires --vrf-allow-public-bind");
    }

    if opts.metrics_enabled && !opts.allow_public_bind && !is_loopback_listen_addr(&opts.metrics_addr)
    {
        error!(
            addr = %opts.metrics_addr,
            "refusing to bind metrics to non-loopback address without --vrf-allow-public-bind"
        );
        bail!("non-loopback metrics address requires --vrf-allow-public-bind");
    }

    let metrics = if opts.metrics_enabled {
        let mut registry = Registry::with_prefix("app");
        let metrics = SidecarMetrics::new(&opts.chain_id, &mut registry);

        let listener = tokio::net::TcpListener::bind(&opts.metrics_addr)
            .await
            .wrap_err_with(|| format!("binding metrics address {}", opts.metrics_addr))?;

        let registry = Arc::new(registry);
        let metrics_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = metrics_server::serve(listener, registry, metrics_cancel).await {
                error!(%err, "metrics server exited with error");
            }
        });

        metrics
    } else {
        SidecarMetrics::nop()
    };

    let cfg = build_sidecar_config(&opts)?;

    let process = if cfg.supervise {
        if cfg.data_dir.trim().is_empty() {
            bail!("--drand-data-dir is required when --drand-supervise=true");
        }

        let process = DrandProcess::start(
            &cancel,
            DrandProcessConfig {
                binary_path: cfg.binary_path.clone(),
                data_dir: cfg.data_dir.clone(),
                private_listen: cfg.private_listen.clone(),
                public_listen: cfg.public_listen.clone(),
                control_listen: cfg.control_listen.clone(),
                extra_args: Vec::new(),
            },
            metrics.clone(),
        )
        .wrap_err("failed to start drand subprocess")?;
        Some(process)
    } else {
        None
    };

    let result = run_server(&opts, cfg, metrics, &cancel).await;

    if let Some(process) = &process {
        process.stop().await;
    }

    match result {
        Ok(()) => {
            info!("sidecar shut down cleanly");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn run_server(
    opts: &SidecarOpts,
    cfg: SidecarConfig,
    metrics: SidecarMetrics,
    cancel: &CancellationToken,
) -> eyre::Result<()> {
    let svc = drand::new_with_retry(cfg, metrics, STARTUP_RETRY_WINDOW, cancel)
        .await
        .wrap_err("failed to create drand service")?;

    let server = SidecarServer::new(Arc::new(svc), ServerConfig::default());
    server
        .serve(&opts.listen_addr, cancel.clone())
        .await
        .wrap_err("sidecar server exited with error")?;
    Ok(())
}

fn build_sidecar_config(opts: &SidecarOpts) -> eyre::Result<SidecarConfig> {
    let mut cfg = SidecarConfig {
        supervise: opts.drand_supervise,
        drand_http: opts.drand_http.trim().to_string(),
        binary_path: opts.drand_binary.clone(),
        expected_binary_version: opts.drand_expected_version.clone(),
        data_dir: opts.drand_data_dir.clone(),
        public_listen: opts.drand_public_addr.clone(),
        private_listen: opts.drand_private_addr.clone(),
        control_listen: opts.drand_control_addr.clone(),
        ..SidecarConfig::default()
    };

    if cfg.drand_http.is_empty() {
        cfg.drand_http = format!("http://{}", cfg.public_listen);
    }

    if !opts.drand_chain_hash.is_empty() {
        cfg.chain_hash = const_hex::decode(opts.drand_chain_hash.trim())
            .wrap_err("invalid drand chain hash; must be hex")?;
    }

    if !opts.drand_public_key.is_empty() {
        cfg.public_key = base64::engine::general_purpose::STANDARD
            .decode(opts.drand_public_key.trim())
            .wrap_err("invalid drand public key; must be base64")?;
    }

    cfg.period_seconds = opts.drand_period_seconds;
    cfg.genesis_unix_sec = opts.drand_genesis_unix;

    Ok(cfg)
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    error!(%err, "failed to install SIGTERM handler");
                    return;
                }
            };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT; shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM; shutting down"),
        }

        cancel.cancel();
    });
}
