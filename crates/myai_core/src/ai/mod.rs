//! Remote text-completion providers.
//!
//! # Responsibility
//! - Pick the effective provider from settings.
//! - Normalize both provider wire formats behind `CompletionClient`.
//! - Classify failures so callers can show the right remediation text.

pub mod client;
pub mod error;
pub mod prompts;
pub mod provider;
