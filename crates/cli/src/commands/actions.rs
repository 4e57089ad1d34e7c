//! Avoidance action listing command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ActionSummary, ApiClient};
use crate::output::{format_cooldown, print_warning, OutputFormat};

/// Row for the actions table
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cooldown")]
    cooldown: String,
    #[tabled(rename = "Throttle")]
    throttle: String,
    #[tabled(rename = "Eviction")]
    eviction: String,
    #[tabled(rename = "Grace Ticks")]
    grace_ticks: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// List configured avoidance actions
pub async fn show_actions(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let actions: Vec<ActionSummary> = client.get("actions").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&actions)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Avoidance Actions".bold());
            println!("{}", "=".repeat(60));

            if actions.is_empty() {
                print_warning("No avoidance actions configured");
                return Ok(());
            }

            let rows: Vec<ActionRow> = actions
                .iter()
                .map(|a| ActionRow {
                    name: a.name.clone(),
                    cooldown: format_cooldown(a.cool_down_seconds),
                    throttle: if a.throttle.is_some() { "yes" } else { "-" }.to_string(),
                    eviction: if a.eviction.is_some() { "yes" } else { "-" }.to_string(),
                    grace_ticks: a
                        .escalation_grace_ticks
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    description: a.description.clone(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
