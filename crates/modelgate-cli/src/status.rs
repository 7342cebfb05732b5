//! `modelgate status` — show configuration and provider status.
//!
//! - Shows config path, default provider identifier, model, parameters
//! - Loads and configures the default provider, waits for its first
//!   discovery pass, then prints the live `ServiceStatus`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use modelgate_core::config::Config;
use modelgate_providers::{ProviderPhase, ProviderRegistry};

use crate::helpers::check_mark;

/// Run the status command.
pub async fn run(registry: &ProviderRegistry, config: &Config, config_path: &Path) -> Result<()> {
    println!();
    println!("{}", "Modelgate Status".cyan().bold());
    println!();

    // Config
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );
    println!("  {:<18} {}", "Provider:".bold(), config.defaults.provider);
    println!("  {:<18} {}", "Model:".bold(), config.defaults.model);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.defaults.temperature).dimmed(),
        format!("{}", config.defaults.max_tokens).dimmed(),
    );

    let (provider, task) = crate::connect(registry, config).await?;
    if let Some(task) = task {
        crate::await_discovery(task).await;
    }
    let status = provider.service_status().await;

    println!();
    println!("  {}", status.provider.bold());

    let phase = match status.phase {
        ProviderPhase::Configured => format!("{} (generation {})", "configured".green(), status.generation),
        ProviderPhase::Unconfigured => format!(
            "{} (set provider.apiKey or {})",
            "· not configured".dimmed(),
            provider.spec().env_key
        ),
    };
    println!("    {:<16} {}", "State:", phase);

    let available = match &status.reason {
        None => check_mark(status.available),
        Some(reason) => format!("{} {}", check_mark(status.available), reason.dimmed()),
    };
    println!("    {:<16} {}", "Available:", available);

    let capabilities: Vec<&str> = status.capabilities.iter().map(|tag| tag.as_str()).collect();
    println!("    {:<16} {}", "Capabilities:", capabilities.join(", "));
    println!(
        "    {:<16} {} ({} free)",
        "Models:",
        status.models,
        status.free_models
    );

    if let Some(report) = &status.last_discovery {
        let when = report.finished_at.format("%Y-%m-%d %H:%M:%S UTC");
        let line = match &report.error {
            None => format!("{} {}", "✓".green(), when),
            Some(error) => format!("{} {} {}", "✗".red(), when, error.dimmed()),
        };
        println!("    {:<16} {}", "Last discovery:", line);
    }

    println!();
    Ok(())
}
