//! Operator tool that answers the plugin's negotiation requests, either
//! locally or, with `serve`, over QUIC.
//!
//! Configuration comes from the same `CSI_*` environment variables the
//! plugin reads; see [`libcsiext::config`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libcsiext::catalog::{self, ProtectionGroupState};
use libcsiext::transport::server::CsiServer;
use libcsiext::transport::tls;
use libcsiext::{CsiIdentity, CsiReplication, IdentityService, PluginConfig, TcpHealthCheck};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Inspect CSI identity, capabilities, readiness and replication support.
#[derive(Parser)]
#[command(name = "csi-negotiator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show plugin name, version and manifest.
    Info,
    /// Show advertised plugin capabilities.
    Capabilities,
    /// Show advertised replication RPCs and actions.
    Replication,
    /// Probe every configured backend cluster.
    Probe,
    /// List lifecycle operations legal from a protection group state.
    Actions {
        /// Current protection group state, e.g. `Synced`.
        #[arg(long)]
        state: ProtectionGroupState,
    },
    /// Answer negotiation requests over QUIC until interrupted.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:9443")]
        listen: SocketAddr,
        /// PEM certificate chain presented to clients.
        #[arg(long)]
        cert: PathBuf,
        /// PEM private key for `--cert`.
        #[arg(long)]
        key: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => {
            let service = load_service()?;
            let info = service.get_plugin_info().await?;
            let default_cluster = service.clusters().default_cluster();
            print(cli.json, &info, || {
                let mut out = format!("{} {}", info.name, info.vendor_version);
                for (k, v) in &info.manifest {
                    out.push_str(&format!("\n  {k}: {v}"));
                }
                if let Some(cluster) = default_cluster {
                    out.push_str(&format!("\ndefault cluster: {} ({})", cluster.id, cluster.endpoint));
                }
                out
            })
        }
        Commands::Capabilities => {
            let caps = load_service()?.get_plugin_capabilities().await?;
            print(cli.json, &caps, || {
                caps.iter()
                    .map(|c| format!("{c:?}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Replication => {
            let caps = load_service()?.get_replication_capabilities().await?;
            print(cli.json, &caps, || {
                format!("rpcs: {:?}\nactions: {:?}", caps.capabilities, caps.actions)
            })
        }
        Commands::Probe => {
            let report = load_service()?.probe().await?;
            print(cli.json, &report, || format!("ready: {}", report.ready))?;
            report.into_result()?;
            Ok(())
        }
        Commands::Actions { state } => {
            let ops: Vec<String> = catalog::legal_operations(state)
                .into_iter()
                .map(|op| op.to_string())
                .collect();
            print(cli.json, &ops, || ops.join("\n"))
        }
        Commands::Serve { listen, cert, key } => {
            let tls_config = tls::server_config(tls::load_certs(&cert)?, tls::load_key(&key)?)?;
            let server = CsiServer::new(listen, tls_config, Arc::new(load_service()?))?;

            let shutdown = CancellationToken::new();
            {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("interrupt received, shutting down"),
                        Err(e) => warn!(error = %e, "cannot watch for interrupts, shutting down"),
                    }
                    shutdown.cancel();
                });
            }
            server.serve(shutdown).await?;
            Ok(())
        }
    }
}

fn load_service() -> Result<IdentityService> {
    let config = PluginConfig::from_env().context("loading plugin configuration")?;
    let service = IdentityService::from_config(&config, Arc::new(TcpHealthCheck));
    info!(
        mode = %config.mode,
        clusters = service.clusters().len(),
        default_cluster = service.clusters().default_cluster().map(|c| c.id.to_string()),
        "service ready"
    );
    Ok(service)
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
