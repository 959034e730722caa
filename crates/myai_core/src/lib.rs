//! Core of the AI notes app.
//! Note storage, provider access and the selection-aware rewrite engines live
//! here; binaries only wire user input into these modules.

pub mod ai;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod selection;
pub mod service;
pub mod session;
pub mod settings;

pub use ai::client::{CompletionClient, HttpCompletionClient};
pub use ai::error::{ConnectivityIssue, ProviderError, ProviderResult};
pub use ai::provider::{resolve_provider, ProviderKind};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::{
    EngineError, EngineOutcome, EngineResult, EngineState, ExpansionEngine, RegenerationEngine,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId, NotePatch, NoteValidationError};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
pub use repo::{RepoError, RepoResult};
pub use selection::{locate, FocusState, SelectedText, SelectionDescriptor, ViewRegion};
pub use service::note_service::{ImportError, ImportSummary, NoteService, NoteServiceError};
pub use session::{
    ActionReport, NoteSession, ProviderSource, SettingsProviders, StatusKind, StatusMessage,
};
pub use settings::{AiSettings, ProviderSettings, SettingsError, Theme};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
