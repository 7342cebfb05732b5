//! Modelgate CLI — entry point.
//!
//! # Commands
//!
//! - `modelgate status` — configuration plus a live provider status report
//! - `modelgate models [--free] [--json]` — list discovered models
//! - `modelgate generate [-m MODEL] PROMPT` — one generation against a model

mod helpers;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info, warn};

use modelgate_core::config::{get_config_path, load_config, Config};
use modelgate_core::types::{CapabilityTag, GenerationOptions};
use modelgate_providers::{DiscoveryOutcome, DiscoveryTask, Provider, ProviderRegistry};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Modelgate — capability-indexed access to a unified LLM API
#[derive(Parser)]
#[command(name = "modelgate", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.modelgate/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration and provider status
    Status,

    /// List models discovered from the upstream
    Models {
        /// Only models with zero input and output cost
        #[arg(long, default_value_t = false)]
        free: bool,

        /// Capability to filter on
        #[arg(long, default_value = "TEXT_TO_TEXT")]
        capability: CapabilityTag,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run one generation
    Generate {
        /// Model id (defaults to `defaults.model`)
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Maximum tokens to generate (defaults to `defaults.maxTokens`)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature (defaults to `defaults.temperature`)
        #[arg(long)]
        temperature: Option<f64>,

        /// Print the full result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Prompt text
        prompt: String,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs);

    let config_path = cli.config.unwrap_or_else(get_config_path);
    let config = load_config(Some(&config_path));
    let registry = ProviderRegistry::with_builtins();

    match cli.command {
        Commands::Status => status::run(&registry, &config, &config_path).await,
        Commands::Models {
            free,
            capability,
            json,
        } => run_models(&registry, &config, capability, free, json).await,
        Commands::Generate {
            model,
            system,
            max_tokens,
            temperature,
            json,
            prompt,
        } => {
            let options = GenerationOptions {
                system_prompt: system,
                max_tokens: Some(max_tokens.unwrap_or(config.defaults.max_tokens)),
                temperature: Some(temperature.unwrap_or(config.defaults.temperature)),
                top_p: None,
            };
            let model = model.unwrap_or_else(|| config.defaults.model.clone());
            run_generate(&registry, &config, &model, &prompt, &options, json).await
        }
    }
}

// ─────────────────────────────────────────────
// Provider setup
// ─────────────────────────────────────────────

/// Resolve the default provider and configure it.
///
/// Credentials come from the config file first, then the provider's own env
/// var. `Ok((provider, None))` means no credentials were found anywhere.
pub(crate) async fn connect(
    registry: &ProviderRegistry,
    config: &Config,
) -> Result<(Arc<Provider>, Option<DiscoveryTask>)> {
    let identifier = &config.defaults.provider;
    let provider = registry
        .get_provider(identifier)
        .await
        .with_context(|| format!("failed to load provider '{identifier}'"))?;

    let task = if config.provider.is_configured() {
        Some(provider.configure(config.provider.clone())?)
    } else {
        provider.configure_from_env()?
    };

    if task.is_none() {
        debug!(provider = provider.name(), "No credentials available");
    }
    Ok((provider, task))
}

/// Like [`connect`], but missing credentials are an error.
async fn connect_configured(
    registry: &ProviderRegistry,
    config: &Config,
) -> Result<(Arc<Provider>, DiscoveryTask)> {
    match connect(registry, config).await? {
        (provider, Some(task)) => Ok((provider, task)),
        (provider, None) => bail!(
            "no API key for {}: set provider.apiKey in the config file or export {}",
            provider.name(),
            provider.spec().env_key
        ),
    }
}

/// Wait for a discovery pass and report anything but a commit.
pub(crate) async fn await_discovery(task: DiscoveryTask) -> DiscoveryOutcome {
    let outcome = task.finished().await;
    match &outcome {
        DiscoveryOutcome::Committed { models, .. } => info!(models, "Discovery finished"),
        DiscoveryOutcome::Failed { error, .. } => warn!(error = %error, "Discovery failed"),
        DiscoveryOutcome::Superseded { .. } => debug!("Discovery superseded"),
    }
    outcome
}

// ─────────────────────────────────────────────
// Models command
// ─────────────────────────────────────────────

async fn run_models(
    registry: &ProviderRegistry,
    config: &Config,
    capability: CapabilityTag,
    free_only: bool,
    json: bool,
) -> Result<()> {
    let (provider, task) = connect_configured(registry, config).await?;

    if let DiscoveryOutcome::Failed { error, .. } = await_discovery(task).await {
        bail!("model discovery failed: {error}");
    }

    let models: Vec<_> = provider
        .get_models_for_capability(capability)
        .into_iter()
        .filter(|model| !free_only || model.is_free())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!("{}", "(no models)".dimmed());
        return Ok(());
    }

    for model in &models {
        helpers::print_model_row(model);
    }
    println!();
    println!(
        "{}",
        format!("{} model(s) from {}", models.len(), provider.name()).dimmed()
    );
    Ok(())
}

// ─────────────────────────────────────────────
// Generate command
// ─────────────────────────────────────────────

async fn run_generate(
    registry: &ProviderRegistry,
    config: &Config,
    model: &str,
    prompt: &str,
    options: &GenerationOptions,
    json: bool,
) -> Result<()> {
    // Discovery keeps running in the background; generation does not need it.
    let (provider, _discovery) = connect_configured(registry, config).await?;

    let handle = provider.get_model(model)?;
    info!(model = %model, "Generating");
    let generation = handle
        .generate(prompt, options)
        .await
        .with_context(|| format!("generation with '{model}' failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&generation)?);
    } else {
        helpers::print_generation(&generation);
    }
    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("modelgate=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
