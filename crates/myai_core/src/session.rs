//! Note session: the orchestration boundary for AI actions.
//!
//! # Responsibility
//! - Run expansion and regeneration against one note.
//! - Persist results through the Note Store only after the engine succeeded.
//! - Turn every outcome into one user-visible `StatusMessage`.
//!
//! # Invariants
//! - Rejected or failed actions never mutate the note.
//! - A request made while the same action is in flight is a silent no-op
//!   (`None`), not an error.
//! - Regeneration persists `content` and `expanded_content` together;
//!   expansion persists `expanded_content` only.
//!
//! # See also
//! - `crate::engine` for the validation and splice rules.

use crate::ai::client::{CompletionClient, HttpCompletionClient};
use crate::ai::error::{ProviderError, ProviderResult};
use crate::ai::provider::resolve_provider;
use crate::engine::{EngineError, EngineOutcome, ExpansionEngine, RegenerationEngine};
use crate::model::note::{Note, NoteId, NotePatch};
use crate::repo::note_repo::NoteRepository;
use crate::selection::{has_regenerable_selection, locate, FocusState, SelectionDescriptor};
use crate::service::note_service::NoteService;
use crate::settings::AiSettings;
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One user-visible status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl Display for StatusMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// Progress line shown while the provider call ran, if one was made.
    pub progress: Option<StatusMessage>,
    /// Final status line.
    pub status: StatusMessage,
    /// Stored note after a successful write.
    pub note: Option<Note>,
    /// The caller must discard its selection range.
    pub selection_cleared: bool,
}

impl ActionReport {
    fn rejected(status: StatusMessage) -> Self {
        Self {
            progress: None,
            status,
            note: None,
            selection_cleared: false,
        }
    }
}

/// Where a session gets its completion client from.
pub trait ProviderSource {
    /// Resolves the client for the next call.
    fn resolve(&self) -> ProviderResult<Arc<dyn CompletionClient>>;

    /// Whether `resolve` would currently succeed without a network call.
    fn is_available(&self) -> bool;
}

/// Provider source backed by loaded configuration.
#[derive(Debug, Clone)]
pub struct SettingsProviders {
    settings: AiSettings,
}

impl SettingsProviders {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }
}

impl ProviderSource for SettingsProviders {
    fn resolve(&self) -> ProviderResult<Arc<dyn CompletionClient>> {
        let client = HttpCompletionClient::from_settings(&self.settings)?;
        Ok(Arc::new(client))
    }

    fn is_available(&self) -> bool {
        resolve_provider(&self.settings).is_some()
    }
}

/// AI actions bound to one note.
pub struct NoteSession<'s, R: NoteRepository, P: ProviderSource> {
    store: &'s NoteService<R>,
    providers: P,
    note_id: NoteId,
    regeneration: RegenerationEngine,
    expansion: ExpansionEngine,
}

impl<'s, R: NoteRepository, P: ProviderSource> NoteSession<'s, R, P> {
    pub fn new(store: &'s NoteService<R>, providers: P, note_id: impl Into<NoteId>) -> Self {
        Self {
            store,
            providers,
            note_id: note_id.into(),
            regeneration: RegenerationEngine::new(),
            expansion: ExpansionEngine::new(),
        }
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn is_busy(&self) -> bool {
        self.regeneration.is_busy() || self.expansion.is_busy()
    }

    /// Whether the regenerate action should be offered for `focus`.
    pub fn can_regenerate(&self, focus: &FocusState<'_>) -> bool {
        has_regenerable_selection(
            focus,
            self.providers.is_available(),
            self.regeneration.is_busy(),
        )
    }

    /// Expands the note's current content into `expanded_content`.
    ///
    /// Returns `None` when an expansion is already running.
    pub async fn expand(&self) -> Option<ActionReport> {
        if self.expansion.is_busy() {
            return None;
        }
        let note = match self.load_note() {
            Ok(note) => note,
            Err(status) => return Some(ActionReport::rejected(status)),
        };
        if note.content.trim().is_empty() {
            return Some(ActionReport::rejected(status_for(&EngineError::EmptyNote)));
        }
        let client = match self.providers.resolve() {
            Ok(client) => client,
            Err(err) => {
                return Some(ActionReport::rejected(status_for(&EngineError::from(err))));
            }
        };

        let progress = StatusMessage::info(format!(
            "Expanding with {}...",
            client.provider().display_name()
        ));
        let expanded = match self.expansion.expand(&note.content, client.as_ref()).await {
            Ok(EngineOutcome::Completed(text)) => text,
            Ok(EngineOutcome::Skipped) => return None,
            Err(err) => return Some(self.failed("expand", progress, &err)),
        };

        let patch = NotePatch::new().expanded_content(expanded);
        Some(self.persist("expand", progress, &patch, "Note expanded successfully!", false))
    }

    /// Regenerates whatever `focus` has selected in the stored note.
    ///
    /// Returns `None` when a regeneration is already running.
    pub async fn regenerate(&self, focus: &FocusState<'_>) -> Option<ActionReport> {
        if self.regeneration.is_busy() {
            return None;
        }
        let client = match self.providers.resolve() {
            Ok(client) => client,
            Err(err) => {
                return Some(ActionReport::rejected(status_for(&EngineError::from(err))));
            }
        };
        let note = match self.load_note() {
            Ok(note) => note,
            Err(status) => return Some(ActionReport::rejected(status)),
        };
        let Some(descriptor) = locate(focus, &note.content) else {
            return Some(ActionReport::rejected(status_for(&EngineError::NoSelection)));
        };
        self.run_regeneration(&descriptor, client).await
    }

    /// Regenerates an already located selection.
    ///
    /// Returns `None` when a regeneration is already running.
    pub async fn regenerate_selection(
        &self,
        descriptor: &SelectionDescriptor,
    ) -> Option<ActionReport> {
        if self.regeneration.is_busy() {
            return None;
        }
        let client = match self.providers.resolve() {
            Ok(client) => client,
            Err(err) => {
                return Some(ActionReport::rejected(status_for(&EngineError::from(err))));
            }
        };
        self.run_regeneration(descriptor, client).await
    }

    async fn run_regeneration(
        &self,
        descriptor: &SelectionDescriptor,
        client: Arc<dyn CompletionClient>,
    ) -> Option<ActionReport> {
        if !descriptor.is_mapped() {
            return Some(ActionReport::rejected(status_for(
                &EngineError::UnmappableSelection,
            )));
        }
        if descriptor.text.trim().is_empty() {
            return Some(ActionReport::rejected(status_for(&EngineError::NoSelection)));
        }

        let progress = StatusMessage::info("Regenerating the selected section...");
        let text = match self.regeneration.regenerate(descriptor, client.as_ref()).await {
            Ok(EngineOutcome::Completed(text)) => text,
            Ok(EngineOutcome::Skipped) => return None,
            Err(err) => return Some(self.failed("regenerate", progress, &err)),
        };

        let patch = NotePatch::new()
            .content(text.clone())
            .expanded_content(text);
        Some(self.persist(
            "regenerate",
            progress,
            &patch,
            "Section regenerated successfully.",
            true,
        ))
    }

    fn load_note(&self) -> Result<Note, StatusMessage> {
        match self.store.get_note(&self.note_id) {
            Ok(Some(note)) => Ok(note),
            Ok(None) => Err(StatusMessage::error(format!(
                "Error: note not found: {}",
                self.note_id
            ))),
            Err(err) => Err(StatusMessage::error(format!("Error: {err}"))),
        }
    }

    fn persist(
        &self,
        action: &str,
        progress: StatusMessage,
        patch: &NotePatch,
        success_text: &str,
        clears_selection: bool,
    ) -> ActionReport {
        match self.store.update_note(&self.note_id, patch) {
            Ok(note) => {
                info!(
                    "event=note_{action} module=session status=ok note_id={} updated_at={}",
                    note.id, note.updated_at
                );
                ActionReport {
                    progress: Some(progress),
                    status: StatusMessage::success(success_text),
                    note: Some(note),
                    selection_cleared: clears_selection,
                }
            }
            Err(err) => {
                warn!(
                    "event=note_{action} module=session status=error note_id={} error={err}",
                    self.note_id
                );
                ActionReport {
                    progress: Some(progress),
                    status: StatusMessage::error(format!("Error: {err}")),
                    note: None,
                    selection_cleared: false,
                }
            }
        }
    }

    fn failed(&self, action: &str, progress: StatusMessage, err: &EngineError) -> ActionReport {
        warn!(
            "event=note_{action} module=session status=error note_id={} error_code={}",
            self.note_id,
            err.code()
        );
        ActionReport {
            progress: Some(progress),
            status: status_for(err),
            note: None,
            selection_cleared: false,
        }
    }
}

/// Status line for an engine failure.
///
/// Input and configuration problems are shown as-is; failures after the
/// provider was contacted carry an `Error:` prefix.
pub fn status_for(err: &EngineError) -> StatusMessage {
    match err {
        EngineError::EmptyNote
        | EngineError::NoSelection
        | EngineError::UnmappableSelection
        | EngineError::Provider(ProviderError::NoProviderAvailable) => {
            StatusMessage::error(err.to_string())
        }
        _ => StatusMessage::error(format!("Error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{status_for, StatusKind, StatusMessage};
    use crate::ai::error::ProviderError;
    use crate::engine::EngineError;

    #[test]
    fn pre_call_failures_have_no_prefix() {
        assert_eq!(
            status_for(&EngineError::NoSelection),
            StatusMessage::error("Highlight a portion of the note to regenerate it.")
        );
        assert_eq!(
            status_for(&EngineError::Provider(ProviderError::NoProviderAvailable)).text,
            "Please set an API key for at least one enabled provider in Settings."
        );
    }

    #[test]
    fn call_failures_are_prefixed() {
        let status = status_for(&EngineError::EmptyResponse);
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(
            status.text,
            "Error: The AI response did not contain any content to insert."
        );
    }
}
