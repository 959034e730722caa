//! Provider identity and the deterministic selection policy.

use crate::settings::AiSettings;

/// The two interchangeable completion providers.
///
/// `OpenAi` is Provider A (chat-completions wire format), `Claude` is
/// Provider B (messages wire format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Claude,
}

impl ProviderKind {
    /// Stable lowercase id used in settings and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }

    /// Name shown in user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Claude => "Claude",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "a" => Some(Self::OpenAi),
            "claude" | "anthropic" | "b" => Some(Self::Claude),
            _ => None,
        }
    }

    /// Prefix every valid credential for this provider starts with.
    pub fn credential_prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "sk-",
            Self::Claude => "sk-ant-",
        }
    }
}

/// Resolves the provider to use for one call.
///
/// Order: enabled Claude with a key, enabled OpenAI with a key, then any
/// Claude key, then any OpenAI key. A stored key therefore wins over a
/// disabled flag when nothing enabled is usable.
pub fn resolve_provider(settings: &AiSettings) -> Option<ProviderKind> {
    let claude = &settings.claude;
    let openai = &settings.openai;

    if claude.enabled && claude.has_credential() {
        return Some(ProviderKind::Claude);
    }
    if openai.enabled && openai.has_credential() {
        return Some(ProviderKind::OpenAi);
    }
    if claude.has_credential() {
        return Some(ProviderKind::Claude);
    }
    if openai.has_credential() {
        return Some(ProviderKind::OpenAi);
    }
    None
}
