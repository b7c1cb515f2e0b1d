//! CLI output helpers

use anyhow::Result;
use colored::Colorize;

use meshroute::{ApplyOutcome, Change, Settings};

/// Output format for CLI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_outcome(outcome: &ApplyOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        OutputFormat::Text => {
            let marker = match outcome.change {
                Change::Unchanged | Change::AlreadyExists => "•".yellow(),
                _ => "✔".green(),
            };
            println!(
                "{} {} applied to {} {}",
                marker,
                outcome.action.as_str().cyan().bold(),
                outcome.kind,
                outcome.resource.yellow()
            );
            println!("  {}", outcome.change.describe());
            if let Some(count) = outcome.rule_count {
                println!("  {}", format!("{} rule(s) in resource", count).dimmed());
            }
        }
    }
    Ok(())
}

pub fn print_settings(settings: &Settings, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        OutputFormat::Text => {
            println!("{}", "Resolved settings".cyan().bold());
            println!("{}", "=".repeat(40));
            let value = serde_json::to_value(settings)?;
            if let Some(map) = value.as_object() {
                for (key, value) in map {
                    let rendered = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    println!("  {:<28} {}", key.green(), rendered);
                }
            }
        }
    }
    Ok(())
}
