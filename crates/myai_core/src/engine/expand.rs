//! Expansion Engine: whole-note rewrite.

use crate::ai::client::CompletionClient;
use crate::ai::prompts::expansion_prompt;
use crate::engine::gate::{BusyGate, EngineOutcome, EngineState};
use crate::engine::{EngineError, EngineResult};
use log::{info, warn};
use std::time::Instant;

/// Produces a full replacement for a note's expanded text.
#[derive(Debug, Default)]
pub struct ExpansionEngine {
    gate: BusyGate,
}

impl ExpansionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.gate.state()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Expands `note_text` with `client`.
    ///
    /// The trimmed note text is sent; the reply is returned verbatim once it
    /// is known to be non-blank.
    ///
    /// # Errors
    /// - `EmptyNote` when `note_text` is blank (no network call).
    /// - `Provider` when the call fails.
    /// - `EmptyResponse` when the reply is blank.
    pub async fn expand(
        &self,
        note_text: &str,
        client: &dyn CompletionClient,
    ) -> EngineResult<EngineOutcome<String>> {
        let Some(_guard) = self.gate.try_enter() else {
            info!("event=expand_skip module=engine status=ok reason=in_flight");
            return Ok(EngineOutcome::Skipped);
        };

        let trimmed = note_text.trim();
        if trimmed.is_empty() {
            return Err(EngineError::EmptyNote);
        }

        let provider = client.provider().as_str();
        let started = Instant::now();
        info!(
            "event=expand_call module=engine status=start provider={provider} input_len={}",
            trimmed.len()
        );

        let prompt = expansion_prompt(trimmed);
        let reply = match client.complete(&prompt.system, &prompt.user).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    "event=expand_call module=engine status=error provider={provider} error_code={} duration_ms={}",
                    err.code(),
                    started.elapsed().as_millis()
                );
                return Err(err.into());
            }
        };

        if reply.trim().is_empty() {
            warn!(
                "event=expand_call module=engine status=error provider={provider} error_code=empty_response"
            );
            return Err(EngineError::EmptyResponse);
        }

        info!(
            "event=expand_call module=engine status=ok provider={provider} output_len={} duration_ms={}",
            reply.len(),
            started.elapsed().as_millis()
        );
        Ok(EngineOutcome::Completed(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::ExpansionEngine;
    use crate::ai::error::ProviderError;
    use crate::engine::testing::ScriptedClient;
    use crate::engine::{EngineError, EngineOutcome, EngineState};

    #[tokio::test]
    async fn blank_note_is_rejected_before_the_call() {
        let engine = ExpansionEngine::new();
        let client = ScriptedClient::replying("anything");
        let err = engine.expand("  \n ", &client).await.unwrap_err();
        assert_eq!(err, EngineError::EmptyNote);
        assert_eq!(client.call_count(), 0);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn sends_trimmed_text_and_returns_reply() {
        let engine = ExpansionEngine::new();
        let client = ScriptedClient::replying("# Expanded\n\nBody");
        let outcome = engine.expand("  buy milk  ", &client).await.unwrap();
        assert_eq!(outcome, EngineOutcome::Completed("# Expanded\n\nBody".to_string()));
        let prompt = client.last_user_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.ends_with("\n\nbuy milk"));
    }

    #[tokio::test]
    async fn blank_reply_and_provider_errors_fail() {
        let engine = ExpansionEngine::new();
        let blank = ScriptedClient::replying("   ");
        assert_eq!(
            engine.expand("note", &blank).await.unwrap_err(),
            EngineError::EmptyResponse
        );

        let failing = ScriptedClient::failing(ProviderError::NoProviderAvailable);
        assert_eq!(
            engine.expand("note", &failing).await.unwrap_err(),
            EngineError::Provider(ProviderError::NoProviderAvailable)
        );
        assert_eq!(engine.state(), EngineState::Idle);
    }
}
