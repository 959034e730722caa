//! Note use-case services.
//!
//! # Responsibility
//! - Implement the Note Store contract on top of repository traits.
//! - Keep engines and the CLI decoupled from SQL.

pub mod note_service;
