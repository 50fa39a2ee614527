//! endpointd-cli - Command-line interface for endpointd
//!
//! Runs one request per invocation over mutually authenticated TLS.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use endpointd_client::{Client, ClientError, ConnectionConfig, TlsClientConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "endpointd-cli")]
#[command(about = "Command-line interface for the endpointd record service")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "ENDPOINTD_SERVER", default_value = "127.0.0.1:13800")]
    server: SocketAddr,

    /// Path to CA certificate for server verification
    #[arg(long, env = "ENDPOINTD_CA_CERT")]
    ca_cert: PathBuf,

    /// Path to client certificate
    #[arg(long, env = "ENDPOINTD_CLIENT_CERT")]
    client_cert: PathBuf,

    /// Path to client private key
    #[arg(long, env = "ENDPOINTD_CLIENT_KEY")]
    client_key: PathBuf,

    /// Server name for TLS verification (defaults to the server IP)
    #[arg(long)]
    server_name: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List every endpoint
    Index,

    /// Fetch one endpoint by id
    Read {
        /// Endpoint id
        id: String,
    },

    /// Create an endpoint
    New {
        /// Owning organization id
        #[arg(short, long)]
        org: String,

        /// Endpoint URL
        #[arg(short, long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut tls = TlsClientConfig::new(&cli.ca_cert, &cli.client_cert, &cli.client_key);
    if let Some(name) = cli.server_name {
        tls = tls.with_server_name(name);
    }
    let config = ConnectionConfig::new(cli.server, tls)
        .with_request_timeout(Duration::from_secs(cli.timeout));

    let client = match Client::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(&client, cli.command, cli.json).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            let transient = e
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_retryable);
            if transient {
                eprintln!("{}", "The failure looks transient; retrying may succeed.".dimmed());
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
