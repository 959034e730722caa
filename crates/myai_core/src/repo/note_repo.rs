//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist whole note rows; partial merges happen in the service layer.
//! - Provide recency-ordered listing and transactional bulk replacement.
//!
//! # Invariants
//! - Lists are ordered by `updated_at DESC, id ASC`.
//! - `replace_all` is all-or-nothing.

use crate::model::note::Note;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    expanded_content,
    published_content,
    is_published,
    published_at,
    created_at,
    updated_at
FROM notes";

/// Query options for listing notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Only return notes whose publish flag is set.
    pub published_only: bool,
}

/// How `replace_all` treats notes already in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Keep existing notes; skip incoming notes whose id already exists.
    Merge,
    /// Drop every existing note, then insert the incoming ones.
    Replace,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts a new note. Fails with `DuplicateId` when the id is taken.
    fn insert_note(&self, note: &Note) -> RepoResult<()>;
    /// Overwrites every column of an existing note.
    fn save_note(&self, note: &Note) -> RepoResult<()>;
    fn get_note(&self, id: &str) -> RepoResult<Option<Note>>;
    /// Hard-deletes one note. Returns whether a row was removed.
    fn delete_note(&self, id: &str) -> RepoResult<bool>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Bulk write used by import. Returns the number of rows inserted.
    fn replace_all(&self, notes: &[Note], mode: ReplaceMode) -> RepoResult<usize>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;
        if note_exists(self.conn, &note.id)? {
            return Err(RepoError::DuplicateId(note.id.clone()));
        }
        insert_row(self.conn, note)?;
        Ok(())
    }

    fn save_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()?;
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                expanded_content = ?4,
                published_content = ?5,
                is_published = ?6,
                published_at = ?7,
                updated_at = ?8
             WHERE id = ?1;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                note.expanded_content.as_str(),
                note.published_content.as_str(),
                bool_to_int(note.is_published),
                note.published_at,
                note.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id.clone()));
        }
        Ok(())
    }

    fn get_note(&self, id: &str) -> RepoResult<Option<Note>> {
        let sql = format!("{NOTE_SELECT_SQL} WHERE id = ?1;");
        let note = self
            .conn
            .query_row(&sql, [id], note_from_row)
            .optional()?;
        note.map(ensure_valid).transpose()
    }

    fn delete_note(&self, id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = String::from(NOTE_SELECT_SQL);
        if query.published_only {
            sql.push_str(" WHERE is_published = 1");
        }
        sql.push_str(" ORDER BY updated_at DESC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(ensure_valid(note_from_row(row)?)?);
        }
        Ok(notes)
    }

    fn replace_all(&self, notes: &[Note], mode: ReplaceMode) -> RepoResult<usize> {
        for note in notes {
            note.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut seen: HashSet<&str> = HashSet::new();
        if mode == ReplaceMode::Replace {
            tx.execute("DELETE FROM notes;", [])?;
        }

        let mut inserted = 0;
        for note in notes {
            // Later duplicates inside one payload lose to the first occurrence.
            if !seen.insert(note.id.as_str()) {
                continue;
            }
            if mode == ReplaceMode::Merge && note_exists(&tx, &note.id)? {
                continue;
            }
            insert_row(&tx, note)?;
            inserted += 1;
        }
        tx.commit()?;

        Ok(inserted)
    }
}

fn insert_row(conn: &Connection, note: &Note) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO notes (
            id,
            title,
            content,
            expanded_content,
            published_content,
            is_published,
            published_at,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            note.id.as_str(),
            note.title.as_str(),
            note.content.as_str(),
            note.expanded_content.as_str(),
            note.published_content.as_str(),
            bool_to_int(note.is_published),
            note.published_at,
            note.created_at,
            note.updated_at,
        ],
    )
}

fn note_exists(conn: &Connection, id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        expanded_content: row.get("expanded_content")?,
        published_content: row.get("published_content")?,
        is_published: row.get::<_, i64>("is_published")? == 1,
        published_at: row.get("published_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_valid(note: Note) -> RepoResult<Note> {
    note.validate()
        .map_err(|err| RepoError::InvalidData(format!("note `{}`: {err}", note.id)))?;
    Ok(note)
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

#[cfg(test)]
mod tests {
    use super::{NoteListQuery, NoteRepository, ReplaceMode, SqliteNoteRepository};
    use crate::db::open_db_in_memory;
    use crate::model::note::Note;
    use crate::repo::RepoError;

    fn note(id: &str, updated_at: i64) -> Note {
        let mut note = Note::with_id(id, 1);
        note.updated_at = updated_at;
        note
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNoteRepository::new(&conn);
        repo.insert_note(&note("a", 1)).unwrap();
        let err = repo.insert_note(&note("a", 2)).unwrap_err();
        assert!(matches!(err, RepoError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn list_orders_by_recency_then_id() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNoteRepository::new(&conn);
        repo.insert_note(&note("b", 10)).unwrap();
        repo.insert_note(&note("a", 10)).unwrap();
        repo.insert_note(&note("c", 30)).unwrap();

        let ids: Vec<String> = repo
            .list_notes(&NoteListQuery::default())
            .unwrap()
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn replace_all_merge_skips_existing_and_repeated_ids() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNoteRepository::new(&conn);
        repo.insert_note(&note("a", 5)).unwrap();

        let incoming = vec![note("a", 9), note("b", 9), note("b", 9)];
        let inserted = repo.replace_all(&incoming, ReplaceMode::Merge).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(repo.get_note("a").unwrap().unwrap().updated_at, 5);
    }

    #[test]
    fn replace_all_rolls_back_on_invalid_note() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNoteRepository::new(&conn);
        repo.insert_note(&note("keep", 5)).unwrap();

        let mut broken = note("x", 5);
        broken.title = String::new();
        let err = repo
            .replace_all(&[note("y", 5), broken], ReplaceMode::Replace)
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(repo.get_note("keep").unwrap().is_some());
        assert!(repo.get_note("y").unwrap().is_none());
    }

    #[test]
    fn save_missing_note_returns_not_found() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteNoteRepository::new(&conn);
        let err = repo.save_note(&note("ghost", 1)).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
