use tfo_admission::{AdmissionController, Scheme, UnmatchedPolicy};

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::anyhow;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, crate_authors, crate_description, crate_version};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustls::ServerConfig;
use rustls::crypto::aws_lc_rs::default_provider;
use rustls::pki_types::CertificateDer;
use tokio::signal::unix::{SignalKind, signal};

mod handlers;
mod state;
mod telemetry;

use state::WebhookState;

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

fn load_tls_config(cert_path: &Path, key_path: &Path) -> anyhow::Result<ServerConfig> {
    let cert_file = File::open(cert_path)?;
    let key_file = File::open(key_path)?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);

    let certs: Vec<CertificateDer> =
        rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;

    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("No private key found in key file"))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

async fn watch_tls_files(cert_path: PathBuf, key_path: PathBuf, rustls_config: RustlsConfig) {
    let (tx, mut rx) = tokio::sync::mpsc::channel(1);

    let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                // a full channel already holds a pending reload
                let _ = tx.try_send(());
            }
        }
    });
    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!("Failed to create TLS file watcher, certificates will not be reloaded: {}", e);
            return std::future::pending().await;
        }
    };

    // Watch the parent directories to catch symlink updates (common in K8s)
    let cert_dir = cert_path.parent();
    let key_dir = key_path.parent();
    for dir in [cert_dir, key_dir.filter(|dir| Some(*dir) != cert_dir)]
        .into_iter()
        .flatten()
    {
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            tracing::warn!("Failed to watch {}: {}", dir.display(), e);
        }
    }

    // Reload TLS config when file changes are detected
    while rx.recv().await.is_some() {
        // Add a small delay to ensure all files are written
        tokio::time::sleep(Duration::from_secs(5)).await;

        match load_tls_config(&cert_path, &key_path) {
            Ok(new_config) => {
                rustls_config.reload_from_config(Arc::new(new_config));
                tracing::info!("Successfully reloaded TLS certificates");
            }
            Err(e) => {
                tracing::error!("Failed to load new TLS config: {}", e);
            }
        }
    }
}

fn parse_webhook_path(path: &str) -> Result<String, String> {
    if !path.starts_with('/') {
        return Err(format!("webhook path must start with '/', got {path:?}"));
    }
    if handlers::HEALTH_PATHS.contains(&path) {
        return Err(format!("webhook path {path:?} is reserved for health checks"));
    }
    Ok(path.to_string())
}

#[derive(Parser, Debug)]
#[command(
    name = "tfo-webhook",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Listen address (use "::" for IPv6, "0.0.0.0" for IPv4)
    #[arg(long, default_value = "0.0.0.0", env)]
    listen_address: String,

    /// Listen on given port
    #[arg(short, long, default_value_t = 8443, env)]
    port: u16,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`. Example: "info,tfo_admission=debug"
    #[arg(short, long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = telemetry::LogFormat::Text, env)]
    log_format: telemetry::LogFormat,

    /// Path to TLS certificate file
    #[arg(long, env, required = true)]
    tls_cert: PathBuf,

    /// Path to TLS private key file
    #[arg(long, env, required = true)]
    tls_key: PathBuf,

    /// URI path the mutating webhook is served on
    #[arg(long, default_value = "/mutate", env, value_parser = parse_webhook_path)]
    webhook_path: String,

    /// Name of this service, written to the `mutation.galleybytes.com/mutated-by` annotation of
    /// every admitted Terraform resource
    #[arg(long, env, required = true)]
    service_name: String,

    /// Answer requests for other resources with `allowed=true` instead of no response.
    ///
    /// By default such requests are ignored, relying on the webhook configuration to only send
    /// Terraform resources.
    #[arg(long, env)]
    allow_unmatched: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let unmatched = if args.allow_unmatched {
        UnmatchedPolicy::Allow
    } else {
        UnmatchedPolicy::Skip
    };
    let scheme = Arc::new(Scheme::terraform());
    tracing::info!(
        target_resource = %scheme.target(),
        service_name = %args.service_name,
        ?unmatched,
        "Admission controller configured"
    );
    let controller =
        AdmissionController::new(scheme, args.service_name).with_unmatched_policy(unmatched);
    let state = WebhookState::new(controller);
    let ready = state.ready.clone();

    let app = handlers::router(state, &args.webhook_path);

    let addr = format!("{}:{}", args.listen_address, args.port);
    let socket_addr: SocketAddr = addr.parse()?;

    tracing::info!("Starting HTTPS server on {}{}", socket_addr, args.webhook_path);
    let tls_config = load_tls_config(&args.tls_cert, &args.tls_key)?;
    let rustls_config = RustlsConfig::from_config(Arc::new(tls_config));

    let handle: Handle = Handle::new();
    let shutdown_handle = handle.clone();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        ready.store(false, Ordering::Relaxed);
        tracing::info!("Received shutdown signal, starting graceful shutdown");
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
    });

    let tls_watcher = watch_tls_files(
        args.tls_cert.clone(),
        args.tls_key.clone(),
        rustls_config.clone(),
    );

    let server = axum_server::bind_rustls(socket_addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service());

    tokio::select! {
        result = server => { result?; },
        _ = tls_watcher => {},
    }

    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!("Failed to install SIGTERM signal handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}
