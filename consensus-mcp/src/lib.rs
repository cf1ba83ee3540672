//! Multi-model consensus MCP library
//!
//! This library provides:
//! - Provider adapters for Gemini, OpenAI, Anthropic, X.AI, OpenRouter and any
//!   OpenAI-compatible endpoint, behind one `ModelProvider` trait
//! - Model name/alias resolution across the configured providers
//! - A two-phase consensus engine (parallel answers, then cross-feedback)
//! - A TTL-bounded continuation store for multi-turn conversations
//!
//! # Tools
//!
//! - `chat`: one model, multi-turn
//! - `consensus`: several models in parallel, with an optional refinement round
//!
//! # Usage
//!
//! ```bash
//! # Serve over stdio with whatever API keys are in the environment
//! GEMINI_API_KEY=... OPENAI_API_KEY=... consensus-mcp
//!
//! # Load provider settings from a TOML file
//! consensus-mcp --config ./consensus.toml
//!
//! # Show which models each configured provider accepts
//! consensus-mcp --list-models
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod consensus;
pub mod context;
pub mod continuation;
pub mod error;
pub mod invocation;
pub mod prompts;
pub mod providers;
pub mod resolver;
pub mod server;
pub mod tools;

// Re-export key configuration types
pub use config::{ProviderConfig, ServerConfig};
pub use error::{ConfigError, ProviderError, ResolveError, ToolError, ToolResult};

// Re-export key provider types
pub use providers::{
    Message, ModelInfo, ModelProvider, ProviderKind, ProviderRegistry, ProviderResponse, Role,
    SharedProviderRegistry,
};
pub use resolver::{ModelResolver, ResolvedModel};

// Re-export key consensus types
pub use consensus::{
    ConsensusOrchestrator, ConsensusRequest, ConsensusResult, ConsensusState, FailedModel, Phase,
    RefinedResult, SharedConsensusOrchestrator,
};
pub use invocation::{CallOptions, InvocationResult, InvocationStatus, Invoker, ModelSpec};

// Re-export key continuation types
pub use continuation::{
    ContinuationStore, Conversation, InMemoryStore, ModelResponseRecord, SharedContinuationStore,
};

// Re-export server and tool types
pub use server::ConsensusServer;
pub use tools::{ChatArgs, ConsensusArgs, ContinuationInfo, SharedToolContext, ToolContext, ToolResponse};
