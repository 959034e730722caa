//! Provider failure taxonomy.
//!
//! # Responsibility
//! - Separate configuration, transport, API and payload failures.
//! - Produce user-facing text whose remediation depends on the failure class.
//!
//! # Invariants
//! - Transport failures (no HTTP response at all) never masquerade as API
//!   failures, and vice versa.

use crate::ai::provider::ProviderKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityIssue {
    /// Name resolution failed: the machine looks offline.
    Offline,
    /// Outbound HTTPS is intercepted or blocked (proxy, TLS interception,
    /// sandbox without network permission).
    RestrictedContext,
    /// Anything else: refused connection, reset, transport timeout.
    Unreachable,
}

/// Provider call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No provider has a usable credential.
    NoProviderAvailable,
    MissingCredential(ProviderKind),
    /// The request could not be delivered.
    Transport {
        provider: ProviderKind,
        issue: ConnectivityIssue,
        /// Host the request targeted, for remediation text.
        host: String,
    },
    /// Non-success HTTP status.
    Api {
        provider: ProviderKind,
        status: u16,
        /// Message from the error body, or a generic status line.
        message: String,
    },
    /// Success status but the expected text field is missing.
    MalformedResponse(ProviderKind),
}

impl ProviderError {
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            Self::NoProviderAvailable => None,
            Self::MissingCredential(provider) | Self::MalformedResponse(provider) => {
                Some(*provider)
            }
            Self::Transport { provider, .. } | Self::Api { provider, .. } => Some(*provider),
        }
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoProviderAvailable => "no_provider",
            Self::MissingCredential(_) => "missing_credential",
            Self::Transport { issue, .. } => match issue {
                ConnectivityIssue::Offline => "offline",
                ConnectivityIssue::RestrictedContext => "restricted_context",
                ConnectivityIssue::Unreachable => "unreachable",
            },
            Self::Api { .. } => "api_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoProviderAvailable => write!(
                f,
                "Please set an API key for at least one enabled provider in Settings."
            ),
            Self::MissingCredential(provider) => write!(
                f,
                "{} API key is missing. Please add it on the Settings page before trying again.",
                provider.display_name()
            ),
            Self::Transport {
                provider,
                issue,
                host,
            } => match issue {
                ConnectivityIssue::Offline => write!(
                    f,
                    "You appear to be offline. Please reconnect to the internet and try again."
                ),
                ConnectivityIssue::RestrictedContext => write!(
                    f,
                    "Network error: Unable to connect to {} API. Outbound HTTPS to {host} looks blocked or intercepted by a proxy, firewall or sandbox. Allow access to {host} (or configure HTTPS_PROXY) and try again.",
                    provider.display_name()
                ),
                ConnectivityIssue::Unreachable => write!(
                    f,
                    "Network error: Unable to connect to {} API. Please check your internet connection and verify that {host} is accessible.",
                    provider.display_name()
                ),
            },
            Self::Api { message, .. } => write!(f, "{message}"),
            Self::MalformedResponse(provider) => write!(
                f,
                "Invalid response format from {} API",
                provider.display_name()
            ),
        }
    }
}

impl Error for ProviderError {}

/// Transport-level facts extracted from a failed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportFailure {
    pub is_timeout: bool,
    /// Lowercased `Display` of the whole error source chain.
    pub chain: String,
}

impl TransportFailure {
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut chain = String::new();
        let mut current: Option<&(dyn Error + 'static)> = Some(err);
        while let Some(cause) = current {
            if !chain.is_empty() {
                chain.push_str(": ");
            }
            chain.push_str(&cause.to_string().to_lowercase());
            current = cause.source();
        }
        Self {
            is_timeout: false,
            chain,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let mut failure = Self::from_error(err);
        failure.is_timeout = err.is_timeout();
        failure
    }
}

const OFFLINE_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "temporary failure in name resolution",
    "no such host",
    "network is unreachable",
];

const RESTRICTED_MARKERS: &[&str] = &[
    "certificate",
    "invalid peer",
    "handshake",
    "proxy",
    "permission denied",
    "operation not permitted",
    "access is denied",
];

/// Maps a delivery failure to the remediation class shown to the user.
pub fn classify_transport_failure(failure: &TransportFailure) -> ConnectivityIssue {
    if failure.is_timeout {
        return ConnectivityIssue::Unreachable;
    }
    if OFFLINE_MARKERS
        .iter()
        .any(|marker| failure.chain.contains(marker))
    {
        return ConnectivityIssue::Offline;
    }
    if RESTRICTED_MARKERS
        .iter()
        .any(|marker| failure.chain.contains(marker))
    {
        return ConnectivityIssue::RestrictedContext;
    }
    ConnectivityIssue::Unreachable
}
