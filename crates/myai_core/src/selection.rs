//! Selection Locator.
//!
//! # Responsibility
//! - Turn the current focus/selection state into a `SelectionDescriptor`
//!   anchored in the note's canonical `content`.
//! - Decide whether the regenerate action is currently available.
//!
//! # Invariants
//! - When offsets are present, `context[start..end] == text`.
//! - Offsets are byte offsets on char boundaries of `context`.
//! - Rendered-view selections are located by exact substring search only;
//!   when the text does not occur verbatim the offsets are `None`, never a
//!   guess.
//! - Empty or whitespace-only selections are "no selection".

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|pre|blockquote|tr)>").expect("valid break regex")
});
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Region of the note screen a selection endpoint sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRegion {
    /// Rendered AI-expanded panel.
    ExpandedPanel,
    /// Rendered display-mode panel (applied note).
    DisplayPanel,
    /// Anywhere else (lists, toolbars, other documents).
    Outside,
}

impl ViewRegion {
    /// Whether selections may start or end here.
    pub fn is_rendered_note_view(self) -> bool {
        matches!(self, Self::ExpandedPanel | Self::DisplayPanel)
    }
}

/// Selected content as delivered by a rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedText<'a> {
    /// Already-flattened plain text.
    Plain(&'a str),
    /// Markup fragment covering the selection.
    Html(&'a str),
}

impl SelectedText<'_> {
    /// Plain text content of the selection.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Plain(text) => (*text).to_string(),
            Self::Html(fragment) => html_fragment_text(fragment),
        }
    }
}

/// Where input focus is and what it has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState<'a> {
    /// Raw text editor with its native selection range (byte offsets).
    Editor {
        selection_start: usize,
        selection_end: usize,
    },
    /// A rendered, read-only view.
    Rendered {
        anchor: ViewRegion,
        focus: ViewRegion,
        selected: SelectedText<'a>,
    },
    /// Nothing relevant is focused or selected.
    Unfocused,
}

/// What the user highlighted and where it lives in canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionDescriptor {
    pub text: String,
    /// Byte offset of the first selected byte, or `None` when unmappable.
    pub start: Option<usize>,
    /// Byte offset one past the last selected byte, or `None` when unmappable.
    pub end: Option<usize>,
    /// Canonical note content at the moment of selection.
    pub context: String,
}

impl SelectionDescriptor {
    /// A descriptor with exact offsets.
    pub fn mapped(context: impl Into<String>, start: usize, end: usize) -> Option<Self> {
        let context = context.into();
        let text = context.get(start..end)?.to_string();
        Some(Self {
            text,
            start: Some(start),
            end: Some(end),
            context,
        })
    }

    /// A descriptor whose offsets could not be recovered.
    pub fn unmapped(text: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
            context: context.into(),
        }
    }

    /// `(start, end)` when both offsets are known.
    pub fn span(&self) -> Option<(usize, usize)> {
        self.start.zip(self.end)
    }

    pub fn is_mapped(&self) -> bool {
        self.span().is_some()
    }
}

/// Builds a descriptor for the current selection against `content`.
///
/// Returns `None` for "no selection": collapsed or invalid editor ranges,
/// rendered selections that leave the note views, and blank text.
pub fn locate(focus: &FocusState<'_>, content: &str) -> Option<SelectionDescriptor> {
    match focus {
        FocusState::Editor {
            selection_start,
            selection_end,
        } => {
            let start = (*selection_start).min(*selection_end);
            let end = (*selection_start).max(*selection_end);
            if start == end {
                return None;
            }
            let descriptor = SelectionDescriptor::mapped(content, start, end)?;
            if descriptor.text.trim().is_empty() {
                return None;
            }
            Some(descriptor)
        }
        FocusState::Rendered {
            anchor,
            focus,
            selected,
        } => {
            if !anchor.is_rendered_note_view() || !focus.is_rendered_note_view() {
                return None;
            }
            let text = selected.plain_text();
            if text.trim().is_empty() {
                return None;
            }
            match content.find(text.as_str()) {
                Some(start) => {
                    let end = start + text.len();
                    SelectionDescriptor::mapped(content, start, end)
                }
                None => Some(SelectionDescriptor::unmapped(text, content)),
            }
        }
        FocusState::Unfocused => None,
    }
}

/// Whether the regenerate action should be enabled.
///
/// Rendered selections only need both endpoints inside a note view here;
/// mapping happens when the action runs so the user gets a specific message.
pub fn has_regenerable_selection(
    focus: &FocusState<'_>,
    provider_available: bool,
    busy: bool,
) -> bool {
    if !provider_available || busy {
        return false;
    }
    match focus {
        FocusState::Editor {
            selection_start,
            selection_end,
        } => selection_start != selection_end,
        FocusState::Rendered { anchor, focus, .. } => {
            anchor.is_rendered_note_view() && focus.is_rendered_note_view()
        }
        FocusState::Unfocused => false,
    }
}

/// Converts a char-index range into a byte range of `text`.
///
/// Returns `None` when either index is past the end.
pub fn char_range_to_byte_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let byte_at = |index: usize| {
        text.char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .nth(index)
    };
    Some((byte_at(start)?, byte_at(end)?))
}

fn html_fragment_text(fragment: &str) -> String {
    let with_breaks = HTML_BREAK_RE.replace_all(fragment, "\n");
    let without_tags = HTML_TAG_RE.replace_all(&with_breaks, "");
    decode_basic_entities(without_tags.trim_end_matches('\n'))
}

fn decode_basic_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{
        char_range_to_byte_range, has_regenerable_selection, locate, FocusState, SelectedText,
        ViewRegion,
    };

    const NOTE: &str = "Section one. Section two. Section three.";

    fn rendered(text: &str) -> FocusState<'_> {
        FocusState::Rendered {
            anchor: ViewRegion::DisplayPanel,
            focus: ViewRegion::ExpandedPanel,
            selected: SelectedText::Plain(text),
        }
    }

    #[test]
    fn editor_selection_uses_native_offsets() {
        let focus = FocusState::Editor {
            selection_start: 13,
            selection_end: 25,
        };
        let descriptor = locate(&focus, NOTE).unwrap();
        assert_eq!(descriptor.text, "Section two.");
        assert_eq!(descriptor.span(), Some((13, 25)));
        assert_eq!(descriptor.context, NOTE);
    }

    #[test]
    fn collapsed_or_out_of_range_editor_selection_is_none() {
        let collapsed = FocusState::Editor {
            selection_start: 4,
            selection_end: 4,
        };
        let past_end = FocusState::Editor {
            selection_start: 4,
            selection_end: 400,
        };
        assert!(locate(&collapsed, NOTE).is_none());
        assert!(locate(&past_end, NOTE).is_none());
    }

    #[test]
    fn editor_offsets_inside_a_char_are_rejected() {
        let focus = FocusState::Editor {
            selection_start: 0,
            selection_end: 1,
        };
        assert!(locate(&focus, "é is two bytes").is_none());
    }

    #[test]
    fn rendered_selection_maps_to_first_occurrence() {
        let descriptor = locate(&rendered("Section two."), NOTE).unwrap();
        assert_eq!(descriptor.span(), Some((13, 25)));

        let descriptor = locate(&rendered("Section"), NOTE).unwrap();
        assert_eq!(descriptor.span(), Some((0, 7)));
    }

    #[test]
    fn rendered_selection_not_in_source_has_null_offsets() {
        let content = "# Title\n\nline one\nline two";
        let descriptor = locate(&rendered("line one line two"), content).unwrap();
        assert!(!descriptor.is_mapped());
        assert_eq!(descriptor.start, None);
        assert_eq!(descriptor.end, None);
        assert_eq!(descriptor.context, content);
    }

    #[test]
    fn rendered_selection_leaving_note_views_is_rejected() {
        let focus = FocusState::Rendered {
            anchor: ViewRegion::DisplayPanel,
            focus: ViewRegion::Outside,
            selected: SelectedText::Plain("Section two."),
        };
        assert!(locate(&focus, NOTE).is_none());
    }

    #[test]
    fn blank_rendered_selection_is_rejected() {
        assert!(locate(&rendered(" \n\t"), NOTE).is_none());
    }

    #[test]
    fn html_fragment_is_flattened_before_search() {
        let focus = FocusState::Rendered {
            anchor: ViewRegion::ExpandedPanel,
            focus: ViewRegion::ExpandedPanel,
            selected: SelectedText::Html("<strong>Tom &amp; Jerry</strong>"),
        };
        let descriptor = locate(&focus, "Cast: Tom & Jerry.").unwrap();
        assert_eq!(descriptor.text, "Tom & Jerry");
        assert_eq!(descriptor.span(), Some((6, 17)));
    }

    #[test]
    fn regenerate_availability_follows_provider_busy_and_range() {
        let editor = FocusState::Editor {
            selection_start: 1,
            selection_end: 5,
        };
        assert!(has_regenerable_selection(&editor, true, false));
        assert!(!has_regenerable_selection(&editor, false, false));
        assert!(!has_regenerable_selection(&editor, true, true));
        assert!(!has_regenerable_selection(&FocusState::Unfocused, true, false));
    }

    #[test]
    fn char_ranges_convert_to_byte_ranges() {
        assert_eq!(char_range_to_byte_range("héllo", 1, 3), Some((1, 4)));
        assert_eq!(char_range_to_byte_range("héllo", 0, 5), Some((0, 6)));
        assert_eq!(char_range_to_byte_range("héllo", 0, 6), None);
    }
}
