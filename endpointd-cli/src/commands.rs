//! Command execution.

use crate::Commands;
use colored::Colorize;
use endpointd_client::Client;
use endpointd_protocol::Endpoint;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    cmd: Commands,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Index => {
            tracing::debug!("Listing endpoints from {}", client.config().addr);
            let mut endpoints = client.index().await?;
            tracing::debug!("Received {} endpoints", endpoints.len());
            endpoints.sort_by(|a, b| a.id.cmp(&b.id));
            if json {
                return Ok(serde_json::to_string_pretty(&endpoints)?);
            }
            Ok(format_table(&endpoints))
        }

        Commands::Read { id } => {
            tracing::debug!("Reading endpoint {} from {}", id, client.config().addr);
            let endpoint = client.read(&id).await?;
            if json {
                return Ok(serde_json::to_string_pretty(&endpoint)?);
            }
            Ok(format_endpoint(&endpoint))
        }

        Commands::New { org, url } => {
            tracing::debug!("Creating endpoint for {} at {}", org, client.config().addr);
            let endpoint = client.create(&org, &url).await?;
            if json {
                return Ok(serde_json::to_string_pretty(&endpoint)?);
            }
            Ok(format!(
                "{} endpoint {} for {} -> {}",
                "Created".green(),
                endpoint.id.cyan(),
                endpoint.organization_id,
                endpoint.url
            ))
        }
    }
}

/// Formats a single endpoint as labelled lines.
fn format_endpoint(endpoint: &Endpoint) -> String {
    let mut out = format!(
        "{}  {}\n{}  {}\n{}  {}",
        "id:".bold(),
        endpoint.id.cyan(),
        "organization:".bold(),
        endpoint.organization_id,
        "url:".bold(),
        endpoint.url
    );
    if !endpoint.schema.is_empty() {
        out.push_str(&format!("\n{}  {}", "schema:".bold(), endpoint.schema));
    }
    out
}

/// Formats endpoints as one row each.
fn format_table(endpoints: &[Endpoint]) -> String {
    if endpoints.is_empty() {
        return "No endpoints".dimmed().to_string();
    }

    let id_width = endpoints.iter().map(|e| e.id.len()).max().unwrap_or(0);
    let org_width = endpoints
        .iter()
        .map(|e| e.organization_id.len())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = endpoints
        .iter()
        .map(|e| {
            format!(
                "{:id_width$}  {:org_width$}  {}",
                e.id, e.organization_id, e.url
            )
        })
        .collect();
    lines.push(format!("({} endpoints)", endpoints.len()).dimmed().to_string());
    lines.join("\n")
}
