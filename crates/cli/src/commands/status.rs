//! Objective status command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, ObjectiveStatusRow};
use crate::output::{color_phase, format_timestamp, print_warning, OutputFormat};

/// Row for the objective status table
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Policy")]
    policy: String,
    #[tabled(rename = "Objective")]
    objective: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Raising")]
    raising: u32,
    #[tabled(rename = "Lowering")]
    lowering: u32,
    #[tabled(rename = "Pending")]
    pending: String,
    #[tabled(rename = "Last Enactment")]
    last_enactment: String,
}

/// Show per-objective engine state
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let rows: Vec<ObjectiveStatusRow> = client.get("status").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Objective Status".bold());
            println!("{}", "=".repeat(60));

            if rows.is_empty() {
                print_warning("No objectives tracked; is a policy bundle loaded?");
                return Ok(());
            }

            let triggered = rows.iter().filter(|r| r.phase == "triggered").count();
            let table_rows: Vec<StatusRow> = rows
                .iter()
                .map(|r| StatusRow {
                    policy: r.policy.clone(),
                    objective: r.objective.clone(),
                    phase: color_phase(&r.phase),
                    raising: r.raising_count,
                    lowering: r.lowering_count,
                    pending: if r.pending_action { "yes".to_string() } else { "-".to_string() },
                    last_enactment: r
                        .last_enactment
                        .as_deref()
                        .map(format_timestamp)
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();

            let table = tabled::Table::new(table_rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} objectives, {} triggered", rows.len(), triggered);
        }
    }

    Ok(())
}
