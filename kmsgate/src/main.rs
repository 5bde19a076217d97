//! kmsgate - HTTP gateway for Cloud KMS and Secret Manager
//!
//! Encrypts and decrypts payloads with Cloud KMS keys and stores or reads
//! secrets in Secret Manager, optionally encrypting them on the way in.

mod config;
mod router;

use clap::Parser;
use kmsgate_core::TokenSource;
use kmsgate_kms::{CloudKms, KeyService, KmsState};
use kmsgate_secrets::{CloudSecretManager, SecretService, SecretsState};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "kmsgate")]
#[command(about = "HTTP gateway for Cloud KMS and Secret Manager", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "KMSGATE_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "KMSGATE_HOST")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "KMSGATE_LOG_LEVEL")]
    log_level: String,

    /// Seconds to wait for in-flight requests after a shutdown signal
    #[arg(long, default_value = "10", env = "KMSGATE_SHUTDOWN_GRACE_SECS")]
    shutdown_grace_secs: u64,

    /// Configuration file name, without extension
    #[arg(long, default_value = "kmsgate", env = "KMSGATE_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config);

    let level = match &config {
        Ok(config) if config.debug_enabled() => "debug",
        _ => args.log_level.as_str(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("kmsgate={},tower_http=debug", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    let names = match config.resource_names() {
        Ok(names) => Arc::new(names),
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    info!("Starting kmsgate...");
    info!("  Symmetric key: {}", names.symmetric_key());
    info!(
        "  Asymmetric key: {}",
        names.asymmetric_key_version().unwrap_or("not configured")
    );

    // Build clients
    let http = reqwest::Client::new();
    let tokens = Arc::new(match config.access_token() {
        Some(token) => TokenSource::fixed(token),
        None => TokenSource::metadata(http.clone()),
    });
    info!(tokens = ?tokens, "Access token source selected");

    let keys = Arc::new(KeyService::new(Arc::new(CloudKms::new(
        http.clone(),
        tokens.clone(),
        config.kms_endpoint(),
    ))));
    let secrets = Arc::new(SecretService::new(Arc::new(CloudSecretManager::new(
        http,
        tokens,
        config.secret_manager_endpoint(),
    ))));

    // Create router
    let app = router::create_router(
        Arc::new(KmsState {
            keys: keys.clone(),
            names: names.clone(),
        }),
        Arc::new(SecretsState {
            secrets: secrets.clone(),
            keys: keys.clone(),
            names,
        }),
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let stop = stop.clone();
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => result??,
        _ = shutdown_signal() => {
            let grace = Duration::from_secs(args.shutdown_grace_secs);
            info!(grace_secs = args.shutdown_grace_secs, "Shutdown signal received, draining connections");
            stop.notify_one();

            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result??,
                Err(_) => {
                    warn!("Grace period expired, abandoning in-flight requests");
                    server.abort();
                }
            }
        }
    }

    keys.close();
    secrets.close();
    info!("Server exited");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "Failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(?err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
