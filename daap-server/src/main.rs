//! Process entry point: load configuration, init logging, scan the
//! library, start the HTTP server and the Zeroconf advertiser, wait for
//! a shutdown signal, shut down gracefully.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use daap_core::{Config, Provider};
use daap_server::http::{build_router, AppState};
use daap_server::{library, zeroconf, LocalFileProvider};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "daap-server", about = "A DAAP (Digital Audio Access Protocol) media server")]
struct Cli {
    /// Path to a config file (TOML/YAML/JSON, resolved by the `config` crate).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `library.root` from the config file.
    #[arg(short, long)]
    library_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(root) = cli.library_root {
        config.library.root = root;
    }
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("configuration error: {error}");
        }
        anyhow::bail!("invalid configuration ({} error(s))", errors.len());
    }

    daap_core::logging::init_logging(&config.logging)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        library_root = %config.library.root.display(),
        "daap-server starting"
    );

    let server_persistent_id = rand::random::<u64>();
    let library = library::scan(&config.server.name, server_persistent_id, &config.library.root)
        .context("failed to scan library root")?;
    info!(
        items = library.items(1).len().unwrap_or(0) as u64,
        "library scan complete"
    );

    let media = Arc::new(LocalFileProvider::new(config.library.root.clone()));
    let capabilities = daap_core::response::Capabilities {
        supports_persistent_id: true,
        supports_artwork: true,
    };
    let provider = Provider::new(Arc::new(library), media, capabilities);

    let config = Arc::new(config);
    let state = AppState::new(provider, config.clone());
    let router = build_router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(address = %bind_addr, "listening");

    let advertiser = if config.zeroconf.enabled {
        let advertise_ip = resolve_advertise_ip(bind_addr.ip());
        match zeroconf::Advertiser::start(&config, advertise_ip, server_persistent_id) {
            Ok(advertiser) => {
                info!(ip = %advertise_ip, "zeroconf advertising started");
                Some(advertiser)
            }
            Err(err) => {
                warn!(error = %err, "failed to start zeroconf advertising, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(err) = result {
        error!(error = %err, "HTTP server error");
    }

    if let Some(advertiser) = advertiser {
        advertiser.shutdown();
    }

    info!("daap-server shut down gracefully");
    Ok(())
}

/// `0.0.0.0` isn't a usable address for an mDNS TXT record; resolve the
/// machine's actual LAN-facing address instead.
fn resolve_advertise_ip(configured: IpAddr) -> IpAddr {
    if !configured.is_unspecified() {
        return configured;
    }
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| socket.connect("8.8.8.8:80").map(|()| socket))
        .and_then(|socket| socket.local_addr())
        .map(|addr| addr.ip())
        .unwrap_or(configured)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("received SIGTERM, shutting down");
        }
    }
}
