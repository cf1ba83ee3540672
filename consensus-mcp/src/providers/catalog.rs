//! Static model catalog per provider.

use std::time::Duration;

use super::ProviderKind;

/// Capabilities of one model that matter to resolution and invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Per-call timeout override in seconds
    pub timeout_secs: Option<u64>,
    /// Fixed-temperature reasoning models reject the parameter
    pub supports_temperature: bool,
    /// Accepts a `reasoning_effort` hint
    pub supports_reasoning_effort: bool,
    /// Input budget in tokens; prompts estimated above it are not sent
    pub context_window: Option<u64>,
}

impl ModelInfo {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            timeout_secs: None,
            supports_temperature: true,
            supports_reasoning_effort: false,
            context_window: None,
        }
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub const fn context_window(mut self, tokens: u64) -> Self {
        self.context_window = Some(tokens);
        self
    }

    /// Reasoning model: fixed temperature, takes a reasoning effort
    pub const fn reasoning(mut self) -> Self {
        self.supports_temperature = false;
        self.supports_reasoning_effort = true;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn matches_alias(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(token))
    }
}

const GEMINI: &[ModelInfo] = &[
    ModelInfo::new("gemini-2.5-flash")
        .aliases(&["flash", "flash-2.5"])
        .context_window(1_048_576),
    ModelInfo::new("gemini-2.5-pro")
        .aliases(&["pro", "gemini-pro"])
        .context_window(1_048_576)
        .timeout_secs(600),
];

// o4-mini first: it is the balanced default when OpenAI is picked for `auto`
const OPENAI: &[ModelInfo] = &[
    ModelInfo::new("o4-mini")
        .aliases(&["o4mini"])
        .context_window(200_000)
        .timeout_secs(180),
    ModelInfo::new("o3")
        .reasoning()
        .context_window(200_000)
        .timeout_secs(300),
    ModelInfo::new("o3-mini")
        .aliases(&["o3mini"])
        .reasoning()
        .context_window(200_000),
    ModelInfo::new("o3-pro-2025-06-10")
        .aliases(&["o3-pro"])
        .reasoning()
        .context_window(200_000)
        .timeout_secs(1800),
    ModelInfo::new("gpt-4.1-2025-04-14")
        .aliases(&["gpt4.1", "gpt-4.1"])
        .context_window(1_000_000),
];

const ANTHROPIC: &[ModelInfo] = &[
    ModelInfo::new("claude-sonnet-4-20250514")
        .aliases(&["sonnet", "claude-sonnet"])
        .context_window(200_000),
    ModelInfo::new("claude-opus-4-20250514")
        .aliases(&["opus", "claude-opus"])
        .context_window(200_000)
        .timeout_secs(600),
];

const XAI: &[ModelInfo] = &[
    ModelInfo::new("grok-3")
        .aliases(&["grok", "grok3"])
        .context_window(131_072),
    ModelInfo::new("grok-3-fast")
        .aliases(&["grokfast", "grok3fast"])
        .context_window(131_072),
];

/// Catalog entries for `kind`; empty for pass-through providers
pub fn models_for(kind: ProviderKind) -> &'static [ModelInfo] {
    match kind {
        ProviderKind::Gemini => GEMINI,
        ProviderKind::OpenAi => OPENAI,
        ProviderKind::Anthropic => ANTHROPIC,
        ProviderKind::XAi => XAI,
        ProviderKind::OpenRouter | ProviderKind::Custom => &[],
    }
}

/// Default model for `kind`, used by `auto`
pub fn default_model_for(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenRouter => Some("openrouter/auto"),
        ProviderKind::Custom => None,
        other => models_for(other).first().map(|m| m.name),
    }
}
