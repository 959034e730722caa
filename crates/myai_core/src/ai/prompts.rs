//! Prompt builders for expansion and in-place rewrites.

/// Opening sentinel around the span to rewrite.
pub const SELECTION_START_MARKER: &str = "<<<";
/// Closing sentinel around the span to rewrite.
pub const SELECTION_END_MARKER: &str = ">>>";

const EXPAND_SYSTEM_PROMPT: &str = "You are a helpful assistant that expands short notes into detailed, well-structured text. Format your response in Markdown for better readability.";
const REWRITE_SYSTEM_PROMPT: &str = "You are a helpful assistant that rewrites sections of Markdown notes. Preserve the tone, structure, and formatting of the surrounding content. Return Markdown that can replace the selected section directly.";

/// System + user prompt pair sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Prompt asking for a full expanded rewrite of `note_text`.
pub fn expansion_prompt(note_text: &str) -> Prompt {
    Prompt {
        system: EXPAND_SYSTEM_PROMPT.to_string(),
        user: format!(
            "Please expand the following note into a detailed, well-structured text.\n\n{note_text}"
        ),
    }
}

/// Prompt asking for a replacement of `context[start..end]` only.
///
/// The whole note is included with the sentinels inserted at the exact
/// offsets, so repeated text elsewhere in the note is not ambiguous.
/// Callers must pass a validated, char-aligned span.
pub fn rewrite_prompt(context: &str, start: usize, end: usize) -> Prompt {
    let before = &context[..start];
    let selected = &context[start..end];
    let after = &context[end..];
    Prompt {
        system: REWRITE_SYSTEM_PROMPT.to_string(),
        user: format!(
            "Here is the complete note in Markdown. The section to rewrite is enclosed between the {SELECTION_START_MARKER} and {SELECTION_END_MARKER} markers:\n\n\
             {before}{SELECTION_START_MARKER}{selected}{SELECTION_END_MARKER}{after}\n\n\
             Rewrite ONLY the section enclosed between the {SELECTION_START_MARKER} and {SELECTION_END_MARKER} markers. \
             Keep any relevant Markdown formatting and return the replacement section only, without the markers.\n\
             Section to rewrite:\n{SELECTION_START_MARKER}\n{selected}\n{SELECTION_END_MARKER}"
        ),
    }
}

/// Removes sentinels a model echoed around its reply, then trims.
pub fn strip_selection_markers(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix(SELECTION_START_MARKER) {
        if let Some(inner) = rest.trim_end().strip_suffix(SELECTION_END_MARKER) {
            text = inner.trim();
        }
    }
    text
}
