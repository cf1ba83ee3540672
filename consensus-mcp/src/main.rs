//! MCP server for multi-model chat and consensus
//!
//! Exposes two tools over stdio:
//! - `chat`: talk to one model, with multi-turn continuation
//! - `consensus`: ask several models in parallel, then let each refine its
//!   answer after reading the others
//!
//! # Usage
//!
//! ```bash
//! # Standard MCP mode, providers taken from the environment
//! GEMINI_API_KEY=... OPENAI_API_KEY=... consensus-mcp
//!
//! # Provider settings and limits from a TOML file
//! consensus-mcp --config ./consensus.toml
//!
//! # Custom OpenAI-compatible endpoint (Ollama, vLLM, ...)
//! CUSTOM_API_URL=http://localhost:11434/v1 CUSTOM_MODEL_NAME=llama3.2 consensus-mcp
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use consensus_mcp::{
    continuation::{spawn_cleanup_task, InMemoryStore},
    providers::catalog,
    ConsensusServer, ProviderRegistry, ServerConfig, ToolContext,
};
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML file with provider keys and limits (applied over the environment)
    #[arg(long, env = "CONSENSUS_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Model used by `chat` when none is given (overrides DEFAULT_MODEL)
    #[arg(long)]
    default_model: Option<String>,

    /// Log level for this crate: error, warn, info, debug or trace
    /// (overrides LOG_LEVEL and the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the models each configured provider accepts, then exit
    #[arg(long, default_value_t = false)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env();
    if let Some(path) = &args.config {
        config
            .merge_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    }

    // stdout carries the MCP protocol, so logs go to stderr
    let level = config.effective_log_level(args.log_level.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("consensus_mcp={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    if let Some(path) = &args.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    if let Some(model) = args.default_model {
        config.default_model = model;
    }

    let registry = ProviderRegistry::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?
        .shared();

    if args.list_models {
        for provider in registry.available() {
            let kind = provider.kind();
            println!("{} (default: {})", kind.friendly_name(), provider.default_model());
            for model in catalog::models_for(kind) {
                if model.aliases.is_empty() {
                    println!("  {}", model.name);
                } else {
                    println!("  {} (aliases: {})", model.name, model.aliases.join(", "));
                }
            }
            if provider.accepts_any_model() {
                println!("  any model name is passed through");
            }
        }
        return Ok(());
    }

    let available = registry.available_kinds();
    if available.is_empty() {
        tracing::warn!("No model provider configured; tool calls will fail until an API key is set");
    } else {
        tracing::info!(
            "Starting consensus MCP server with providers: {}",
            available
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let store = InMemoryStore::with_ttl(config.conversation_timeout).shared();
    let _sweeper = spawn_cleanup_task(
        store.clone(),
        config.conversation_timeout,
        config.cleanup_interval(),
    );

    let ctx = ToolContext::new(config, registry, store).shared();
    let server = ConsensusServer::new(ctx);

    let transport = (stdin(), stdout());
    let service = server.serve(transport).await?;

    service.waiting().await?;

    Ok(())
}
