//! Note Store use-case service.
//!
//! # Responsibility
//! - Create/read/update/delete/list notes with merge-style partial updates.
//! - Publish snapshots, apply generated text, search, export and import.
//! - Derive list previews from markdown content.
//!
//! # Invariants
//! - Every mutation is a full read-modify-write that refreshes `updated_at`.
//! - Import validates the whole payload before writing anything.
//! - Notes are listed by `updated_at DESC, id ASC`.

use crate::model::note::{normalize_title, now_epoch_ms, Note, NoteId, NotePatch};
use crate::repo::note_repo::{NoteListQuery, NoteRepository, ReplaceMode};
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PREVIEW_MAX_CHARS: usize = 100;

static MARKDOWN_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*]\(([^)]+)\)").expect("valid image regex"));
static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`#>~\-\[\]\(\)!]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// `apply_expanded` called while no generated text is stored.
    NothingToApply,
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Write succeeded but the read-back disagrees.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NothingToApply => write!(f, "Expand a note before applying it."),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Import failure. Nothing is written when any of these is returned.
#[derive(Debug)]
pub enum ImportError {
    InvalidJson(String),
    NotAnArray,
    MissingRequiredFields { index: usize },
    InvalidNote { index: usize, message: String },
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(message) => write!(f, "Invalid JSON: {message}"),
            Self::NotAnArray => write!(f, "Invalid format: expected an array of notes"),
            Self::MissingRequiredFields { index } => write!(
                f,
                "Invalid note format: missing required fields (entry {index})"
            ),
            Self::InvalidNote { index, message } => {
                write!(f, "Invalid note format: {message} (entry {index})")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

/// Successful import summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Length of the input array, regardless of how many were new.
    pub count: usize,
    /// Rows actually written.
    pub inserted: usize,
}

/// Plain-text export of a single note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExport {
    pub file_name: String,
    pub text: String,
}

/// Import element shape: everything but identity is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedNote {
    id: String,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    expanded_content: String,
    #[serde(default)]
    published_content: String,
    #[serde(default)]
    is_published: bool,
    #[serde(default)]
    published_at: Option<i64>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl ImportedNote {
    fn into_note(self, now: i64) -> Note {
        let created_at = self.created_at.unwrap_or(now);
        let updated_at = self.updated_at.unwrap_or(created_at).max(created_at);
        Note {
            id: self.id,
            title: self.title,
            content: self.content,
            expanded_content: self.expanded_content,
            published_content: self.published_content,
            is_published: self.is_published,
            published_at: self.published_at,
            created_at,
            updated_at,
        }
    }
}

/// Note Store facade over a repository implementation.
pub struct NoteService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one empty note with the default title.
    pub fn create_note(&self) -> Result<Note, NoteServiceError> {
        let note = Note::new();
        self.repo.insert_note(&note)?;
        info!(
            "event=note_create module=service status=ok note_id={}",
            note.id
        );
        self.read_back(&note.id, "created note not found in read-back")
    }

    /// Gets one note by id.
    pub fn get_note(&self, id: &str) -> RepoResult<Option<Note>> {
        self.repo.get_note(id)
    }

    /// Merges `patch` into the stored note and refreshes `updated_at`.
    pub fn update_note(&self, id: &str, patch: &NotePatch) -> Result<Note, NoteServiceError> {
        let mut note = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;
        patch.apply_to(&mut note);
        note.touch(now_epoch_ms());
        self.repo.save_note(&note)?;
        self.read_back(id, "updated note not found in read-back")
    }

    /// All notes, most recently updated first.
    pub fn list_sorted_by_recency(&self) -> RepoResult<Vec<Note>> {
        self.repo.list_notes(&NoteListQuery::default())
    }

    /// Published notes, most recently updated first.
    pub fn list_published(&self) -> RepoResult<Vec<Note>> {
        self.repo.list_notes(&NoteListQuery {
            published_only: true,
        })
    }

    /// Permanently deletes a note. Returns whether it existed.
    pub fn delete_note(&self, id: &str) -> RepoResult<bool> {
        let deleted = self.repo.delete_note(id)?;
        info!("event=note_delete module=service status=ok note_id={id} deleted={deleted}");
        Ok(deleted)
    }

    /// Explicit save of the editor state.
    ///
    /// A blank `expanded_content` keeps whatever generated text is stored.
    pub fn save_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
        expanded_content: Option<&str>,
    ) -> Result<Note, NoteServiceError> {
        let mut patch = NotePatch::new().title(normalize_title(title)).content(content);
        if let Some(expanded) = expanded_content.filter(|value| !value.trim().is_empty()) {
            patch = patch.expanded_content(expanded);
        }
        self.update_note(id, &patch)
    }

    /// Debounced editor save: title and content only.
    pub fn auto_save(&self, id: &str, title: &str, content: &str) -> Result<Note, NoteServiceError> {
        let patch = NotePatch::new().title(normalize_title(title)).content(content);
        self.update_note(id, &patch)
    }

    /// Makes the stored generated text the canonical content.
    pub fn apply_expanded(&self, id: &str) -> Result<Note, NoteServiceError> {
        let note = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;
        if note.expanded_content.trim().is_empty() {
            return Err(NoteServiceError::NothingToApply);
        }
        let patch = NotePatch::new()
            .content(note.expanded_content.clone())
            .expanded_content(note.expanded_content);
        self.update_note(id, &patch)
    }

    /// Freezes the current display text as the published snapshot.
    pub fn publish(&self, id: &str) -> Result<Note, NoteServiceError> {
        let note = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;
        let expanded = note.expanded_content.trim();
        let snapshot = if expanded.is_empty() {
            note.content.clone()
        } else {
            expanded.to_string()
        };
        let patch = NotePatch::new().published(snapshot, now_epoch_ms());
        let published = self.update_note(id, &patch)?;
        info!("event=note_publish module=service status=ok note_id={id}");
        Ok(published)
    }

    /// Hides a note from the published list; the snapshot is kept.
    pub fn unpublish(&self, id: &str) -> Result<Note, NoteServiceError> {
        self.update_note(id, &NotePatch::new().unpublished())
    }

    /// Case-insensitive substring search over title, content and expanded text.
    pub fn search(&self, query: &str) -> RepoResult<Vec<Note>> {
        let needle = query.to_lowercase();
        let notes = self.list_sorted_by_recency()?;
        Ok(notes
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
                    || note.expanded_content.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Serializes every note as a pretty-printed JSON array.
    pub fn export_all(&self) -> Result<String, NoteServiceError> {
        let notes = self.list_sorted_by_recency()?;
        serde_json::to_string_pretty(&notes)
            .map_err(|err| NoteServiceError::Repo(RepoError::InvalidData(err.to_string())))
    }

    /// Plain-text export of one note's display text.
    pub fn export_text(&self, id: &str) -> Result<TextExport, NoteServiceError> {
        let note = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;
        Ok(TextExport {
            file_name: format!("{}.txt", note.title),
            text: note.display_text().to_string(),
        })
    }

    /// Imports a JSON array of notes.
    ///
    /// Every element must carry a non-empty `id` and `title`. With
    /// `merge = true` existing notes win over imported duplicates; otherwise
    /// the imported array replaces the whole collection.
    pub fn import_all(&self, serialized: &str, merge: bool) -> Result<ImportSummary, ImportError> {
        let notes = parse_import(serialized, now_epoch_ms()).map_err(|err| {
            warn!("event=note_import module=service status=error error={err}");
            err
        })?;
        let mode = if merge {
            ReplaceMode::Merge
        } else {
            ReplaceMode::Replace
        };
        let inserted = self
            .repo
            .replace_all(&notes, mode)
            .map_err(ImportError::Repo)?;
        info!(
            "event=note_import module=service status=ok count={} inserted={inserted} merge={merge}",
            notes.len()
        );
        Ok(ImportSummary {
            count: notes.len(),
            inserted,
        })
    }

    fn read_back(&self, id: &str, details: &'static str) -> Result<Note, NoteServiceError> {
        self.repo
            .get_note(id)?
            .ok_or(NoteServiceError::InconsistentState(details))
    }
}

fn parse_import(serialized: &str, now: i64) -> Result<Vec<Note>, ImportError> {
    let value: Value =
        serde_json::from_str(serialized).map_err(|err| ImportError::InvalidJson(err.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    for (index, item) in items.iter().enumerate() {
        if !has_non_empty_string(item, "id") || !has_non_empty_string(item, "title") {
            return Err(ImportError::MissingRequiredFields { index });
        }
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<ImportedNote>(item)
                .map(|imported| imported.into_note(now))
                .map_err(|err| ImportError::InvalidNote {
                    index,
                    message: err.to_string(),
                })
        })
        .collect()
}

fn has_non_empty_string(item: &Value, key: &str) -> bool {
    item.get(key)
        .and_then(Value::as_str)
        .is_some_and(|value| !value.trim().is_empty())
}

/// Derives a one-line list preview from markdown content.
///
/// Images are dropped, links keep their label, markdown symbols are removed,
/// whitespace is collapsed and the first 100 chars are kept.
pub fn derive_markdown_preview(content: &str) -> Option<String> {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(content, " ");
    let without_links = MARKDOWN_LINK_RE.replace_all(&without_images, "$1");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_links, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(PREVIEW_MAX_CHARS).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_markdown_preview, parse_import, ImportError};

    #[test]
    fn preview_strips_markdown_and_images() {
        let source = "# title\n\n![cover](a.png) [link](https://example.com)\n**bold** `code`";
        let preview = derive_markdown_preview(source).expect("preview should exist");
        assert_eq!(preview, "title link bold code");
        assert!(derive_markdown_preview("### ").is_none());
    }

    #[test]
    fn import_requires_array_and_identity_fields() {
        assert!(matches!(
            parse_import("{\"id\":\"a\"}", 0),
            Err(ImportError::NotAnArray)
        ));
        assert!(matches!(
            parse_import("[{\"id\":\"a\",\"title\":\"T\"},{\"id\":\"b\"}]", 0),
            Err(ImportError::MissingRequiredFields { index: 1 })
        ));
        assert!(matches!(
            parse_import("not json", 0),
            Err(ImportError::InvalidJson(_))
        ));
    }

    #[test]
    fn import_fills_missing_fields_with_defaults() {
        let notes = parse_import("[{\"id\":\"a\",\"title\":\"T\"}]", 42).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "");
        assert_eq!(notes[0].created_at, 42);
        assert_eq!(notes[0].updated_at, 42);
        assert!(!notes[0].is_published);
    }

    #[test]
    fn import_rejects_wrongly_typed_optional_fields() {
        let err = parse_import("[{\"id\":\"a\",\"title\":\"T\",\"isPublished\":\"yes\"}]", 0)
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidNote { index: 0, .. }));
    }
}
