//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted note record and its partial-update shape.
//! - Provide validation and timestamp rules shared by every write path.
//!
//! # Invariants
//! - `id` is non-empty and never changes after creation.
//! - `updated_at` never moves backwards; `touch` makes it strictly increase.
//! - `published_content` is only written by publish, never by edits.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Title assigned to new notes and to notes saved with a blank title.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

/// Opaque note identifier.
///
/// Imported notes keep whatever identifier they were exported with, so this
/// is a string rather than a parsed UUID.
pub type NoteId = String;

/// Canonical note record.
///
/// Serialized with camelCase keys; this is also the export/import format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// User-editable canonical source text.
    #[serde(default)]
    pub content: String,
    /// Last AI-produced full-note text.
    #[serde(default)]
    pub expanded_content: String,
    /// Snapshot frozen at publish time.
    #[serde(default)]
    pub published_content: String,
    #[serde(default)]
    pub is_published: bool,
    /// Unix epoch milliseconds of the last publish.
    #[serde(default)]
    pub published_at: Option<i64>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every mutation.
    #[serde(default)]
    pub updated_at: i64,
}

impl Note {
    /// Creates an empty note with a generated id and default title.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string(), now_epoch_ms())
    }

    /// Creates an empty note with a caller-provided id and creation time.
    pub fn with_id(id: impl Into<NoteId>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_NOTE_TITLE.to_string(),
            content: String::new(),
            expanded_content: String::new(),
            published_content: String::new(),
            is_published: false,
            published_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Validates persisted-state invariants.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.trim().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        if self.updated_at < self.created_at {
            return Err(NoteValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Refreshes `updated_at` so it strictly increases, even when the wall
    /// clock has not advanced since the previous mutation.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = next_updated_at(self.updated_at, now);
    }

    /// Whether the note should open in rendered display mode.
    ///
    /// True once the generated text has been applied, i.e. content and
    /// expanded content are both present and equal after trimming.
    pub fn shows_generated_display(&self) -> bool {
        let expanded = self.expanded_content.trim();
        !expanded.is_empty() && !self.content.is_empty() && self.content.trim() == expanded
    }

    /// Text used for per-note export and published previews.
    pub fn display_text(&self) -> &str {
        if self.expanded_content.trim().is_empty() {
            self.content.as_str()
        } else {
            self.expanded_content.as_str()
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

/// Field-by-field partial update merged into a stored note.
///
/// `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub expanded_content: Option<String>,
    pub published_content: Option<String>,
    pub is_published: Option<bool>,
    pub published_at: Option<Option<i64>>,
}

impl NotePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, value: impl Into<String>) -> Self {
        self.title = Some(value.into());
        self
    }

    pub fn content(mut self, value: impl Into<String>) -> Self {
        self.content = Some(value.into());
        self
    }

    pub fn expanded_content(mut self, value: impl Into<String>) -> Self {
        self.expanded_content = Some(value.into());
        self
    }

    /// Freezes a publish snapshot taken at `published_at`.
    pub fn published(mut self, snapshot: impl Into<String>, published_at: i64) -> Self {
        self.published_content = Some(snapshot.into());
        self.is_published = Some(true);
        self.published_at = Some(Some(published_at));
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.is_published = Some(false);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merges the set fields into `note`. Does not touch timestamps.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(expanded) = &self.expanded_content {
            note.expanded_content = expanded.clone();
        }
        if let Some(published) = &self.published_content {
            note.published_content = published.clone();
        }
        if let Some(flag) = self.is_published {
            note.is_published = flag;
        }
        if let Some(published_at) = self.published_at {
            note.published_at = published_at;
        }
    }
}

/// Note invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyId,
    EmptyTitle,
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "note id cannot be empty"),
            Self::EmptyTitle => write!(f, "note title cannot be empty"),
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) is earlier than created_at ({created_at})"
            ),
        }
    }
}

impl Error for NoteValidationError {}

/// Normalizes a user-entered title, falling back to the default.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_NOTE_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Next `updated_at` value: the clock reading, bumped past `previous` when
/// the clock has not advanced.
pub fn next_updated_at(previous: i64, now: i64) -> i64 {
    if now > previous {
        now
    } else {
        previous.saturating_add(1)
    }
}
