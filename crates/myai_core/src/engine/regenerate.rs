//! Regeneration Engine: rewrite one located span in place.
//!
//! # Invariants
//! - The descriptor is fully validated before the provider is called.
//! - The splice is applied to the descriptor's captured `context`, never to
//!   whatever the note holds when the reply arrives.
//! - On any error no text is produced.

use crate::ai::client::CompletionClient;
use crate::ai::prompts::{rewrite_prompt, strip_selection_markers};
use crate::engine::gate::{BusyGate, EngineOutcome, EngineState};
use crate::engine::splice::{check_span, splice};
use crate::engine::{EngineError, EngineResult};
use crate::selection::SelectionDescriptor;
use log::{info, warn};
use std::time::Instant;

/// Rewrites the selected span of a note through a provider.
#[derive(Debug, Default)]
pub struct RegenerationEngine {
    gate: BusyGate,
}

impl RegenerationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.gate.state()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Returns the new full text: `context[..start] + reply + context[end..]`.
    ///
    /// # Errors
    /// - `UnmappableSelection` when offsets are missing or do not select
    ///   `descriptor.text` inside `descriptor.context`.
    /// - `NoSelection` when the selected text is blank.
    /// - `Splice` when offsets are outside the context or split a character.
    /// - `Provider` when the call fails.
    /// - `EmptyResponse` when the reply is blank after trimming.
    pub async fn regenerate(
        &self,
        descriptor: &SelectionDescriptor,
        client: &dyn CompletionClient,
    ) -> EngineResult<EngineOutcome<String>> {
        let Some(_guard) = self.gate.try_enter() else {
            info!("event=regenerate_skip module=engine status=ok reason=in_flight");
            return Ok(EngineOutcome::Skipped);
        };

        let (start, end) = validate(descriptor)?;
        let provider = client.provider().as_str();
        let started = Instant::now();
        info!(
            "event=regenerate_call module=engine status=start provider={provider} context_len={} start={start} end={end}",
            descriptor.context.len()
        );

        let prompt = rewrite_prompt(&descriptor.context, start, end);
        let reply = match client.complete(&prompt.system, &prompt.user).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    "event=regenerate_call module=engine status=error provider={provider} error_code={} duration_ms={}",
                    err.code(),
                    started.elapsed().as_millis()
                );
                return Err(err.into());
            }
        };

        let replacement = strip_selection_markers(&reply);
        if replacement.is_empty() {
            warn!(
                "event=regenerate_call module=engine status=error provider={provider} error_code=empty_response"
            );
            return Err(EngineError::EmptyResponse);
        }

        let text = splice(&descriptor.context, start, end, replacement)?;
        info!(
            "event=regenerate_call module=engine status=ok provider={provider} replacement_len={} duration_ms={}",
            replacement.len(),
            started.elapsed().as_millis()
        );
        Ok(EngineOutcome::Completed(text))
    }
}

fn validate(descriptor: &SelectionDescriptor) -> EngineResult<(usize, usize)> {
    let Some((start, end)) = descriptor.span() else {
        return Err(EngineError::UnmappableSelection);
    };
    if descriptor.text.trim().is_empty() {
        return Err(EngineError::NoSelection);
    }
    check_span(&descriptor.context, start, end)?;
    if descriptor.context[start..end] != descriptor.text {
        return Err(EngineError::UnmappableSelection);
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::RegenerationEngine;
    use crate::ai::error::ProviderError;
    use crate::ai::provider::ProviderKind;
    use crate::engine::testing::ScriptedClient;
    use crate::engine::{EngineError, EngineOutcome, SpliceError};
    use crate::selection::SelectionDescriptor;

    const NOTE: &str = "Section one. Section two. Section three.";

    #[tokio::test]
    async fn replaces_only_the_selected_span() {
        let engine = RegenerationEngine::new();
        let client = ScriptedClient::replying("  The middle part.\n");
        let descriptor = SelectionDescriptor::mapped(NOTE, 13, 25).unwrap();

        let outcome = engine.regenerate(&descriptor, &client).await.unwrap();
        assert_eq!(
            outcome,
            EngineOutcome::Completed("Section one. The middle part. Section three.".to_string())
        );
        let prompt = client.last_user_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Section one. <<<Section two.>>> Section three."));
    }

    #[tokio::test]
    async fn echoing_the_selection_is_idempotent() {
        let engine = RegenerationEngine::new();
        let client = ScriptedClient::replying("<<<Section two.>>>");
        let descriptor = SelectionDescriptor::mapped(NOTE, 13, 25).unwrap();
        let outcome = engine.regenerate(&descriptor, &client).await.unwrap();
        assert_eq!(outcome, EngineOutcome::Completed(NOTE.to_string()));
    }

    #[tokio::test]
    async fn invalid_descriptors_never_reach_the_provider() {
        let engine = RegenerationEngine::new();
        let client = ScriptedClient::replying("x");

        let unmapped = SelectionDescriptor::unmapped("Section two", NOTE);
        assert_eq!(
            engine.regenerate(&unmapped, &client).await.unwrap_err(),
            EngineError::UnmappableSelection
        );

        let blank = SelectionDescriptor::mapped("a   b", 1, 4).unwrap();
        assert_eq!(
            engine.regenerate(&blank, &client).await.unwrap_err(),
            EngineError::NoSelection
        );

        let mut out_of_range = SelectionDescriptor::mapped(NOTE, 13, 25).unwrap();
        out_of_range.end = Some(400);
        assert_eq!(
            engine.regenerate(&out_of_range, &client).await.unwrap_err(),
            EngineError::Splice(SpliceError::OutOfBounds {
                end: 400,
                len: NOTE.len()
            })
        );

        let mut mismatched = SelectionDescriptor::mapped(NOTE, 13, 25).unwrap();
        mismatched.text = "Section one.".to_string();
        assert_eq!(
            engine.regenerate(&mismatched, &client).await.unwrap_err(),
            EngineError::UnmappableSelection
        );

        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_and_blank_reply_produce_no_text() {
        let engine = RegenerationEngine::new();
        let descriptor = SelectionDescriptor::mapped(NOTE, 13, 25).unwrap();

        let failing = ScriptedClient::failing(ProviderError::Api {
            provider: ProviderKind::OpenAi,
            status: 429,
            message: "Rate limit reached".to_string(),
        });
        let err = engine.regenerate(&descriptor, &failing).await.unwrap_err();
        assert_eq!(err.to_string(), "Rate limit reached");

        let blank = ScriptedClient::replying("<<< >>>");
        assert_eq!(
            engine.regenerate(&descriptor, &blank).await.unwrap_err(),
            EngineError::EmptyResponse
        );
        assert!(!engine.is_busy());
    }
}
