//! Model resolution
//!
//! Turns a user token (`auto`, a canonical name, an alias, or anything else)
//! into a concrete provider plus model name.

use std::time::Duration;

use tracing::debug;

use crate::error::ResolveError;
use crate::providers::{ProviderKind, SharedProviderRegistry};

/// OpenRouter slug suffixes that are part of the model name, not an option
const OPENROUTER_SUFFIXES: [&str; 3] = ["free", "beta", "preview"];

/// A model token resolved against the registry
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub provider: ProviderKind,
    pub model: String,
    /// Suffix from a `model:option` token
    pub option: Option<String>,
    /// Catalog timeout for this model, if it has one
    pub timeout: Option<Duration>,
}

/// Split `name:option`, leaving URLs and OpenRouter `:free`-style slugs intact
pub fn parse_model_option(token: &str) -> (String, Option<String>) {
    let token = token.trim();
    if !token.contains(':') || token.starts_with("http") {
        return (token.to_string(), None);
    }

    if token.contains('/') && token.matches(':').count() == 1 {
        if let Some((_, suffix)) = token.split_once(':') {
            let suffix = suffix.trim().to_ascii_lowercase();
            if OPENROUTER_SUFFIXES.contains(&suffix.as_str()) {
                return (token.to_string(), None);
            }
        }
    }

    match token.split_once(':') {
        Some((name, option)) => {
            let option = option.trim();
            (
                name.trim().to_string(),
                (!option.is_empty()).then(|| option.to_string()),
            )
        }
        None => (token.to_string(), None),
    }
}

#[derive(Clone)]
pub struct ModelResolver {
    registry: SharedProviderRegistry,
}

impl ModelResolver {
    pub fn new(registry: SharedProviderRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, token: &str) -> Result<ResolvedModel, ResolveError> {
        let available = self.registry.available();
        let first = available.first().ok_or(ResolveError::NoProviderAvailable)?;

        let (name, option) = parse_model_option(token);

        if name.is_empty() || name.eq_ignore_ascii_case("auto") {
            let model = first.default_model();
            debug!("Resolved auto to {}/{}", first.kind(), model);
            return Ok(ResolvedModel {
                provider: first.kind(),
                timeout: first.model_info(&model).and_then(|m| m.timeout()),
                model,
                option,
            });
        }

        // Exact canonical name across every provider before any alias
        for provider in &available {
            if let Some(info) = provider.models().iter().find(|m| m.name == name) {
                return Ok(ResolvedModel {
                    provider: provider.kind(),
                    model: info.name.to_string(),
                    option,
                    timeout: info.timeout(),
                });
            }
        }

        for provider in &available {
            if let Some(info) = provider.models().iter().find(|m| m.matches_alias(&name)) {
                debug!("Resolved alias {} to {}/{}", name, provider.kind(), info.name);
                return Ok(ResolvedModel {
                    provider: provider.kind(),
                    model: info.name.to_string(),
                    option,
                    timeout: info.timeout(),
                });
            }
        }

        // Unknown: hand it to a pass-through provider and let the API decide
        let target = available
            .iter()
            .find(|p| p.accepts_any_model())
            .unwrap_or(first);
        debug!("Passing unknown model {} through to {}", name, target.kind());
        Ok(ResolvedModel {
            provider: target.kind(),
            model: name,
            option,
            timeout: None,
        })
    }
}
