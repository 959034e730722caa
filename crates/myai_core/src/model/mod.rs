//! Domain model for locally stored notes.
//!
//! # Responsibility
//! - Define canonical note records consumed by the store and the AI engines.
//! - Own timestamp helpers so every mutation path refreshes `updated_at`
//!   the same way.
//!
//! # Invariants
//! - Every note is identified by an opaque, immutable `NoteId`.
//! - `content` is the canonical text used for selection offsets.

pub mod note;
