//! Editor actions.
//!
//! Semantic editing operations, decoupled from how they are triggered
//! (keyboard, menus, input method events). Every action applies to the
//! editor's current selection.

use smol_str::SmolStr;

use crate::node::TextFormat;

/// All possible editor actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    // === Text Insertion ===
    /// Insert text at the selection, replacing selected content.
    InsertText(String),

    /// Split the current block (Enter).
    InsertParagraph,

    /// Insert a line break node inside the current block (Shift+Enter).
    InsertLineBreak,

    /// Insert an inline decorator at the selection.
    InsertDecorator { kind: SmolStr, payload: SmolStr },

    // === Deletion ===
    /// Delete content backward (Backspace).
    DeleteBackward,

    /// Delete content forward (Delete key).
    DeleteForward,

    // === Formatting ===
    /// Toggle a format bit on the selected text.
    ToggleFormat(TextFormat),

    // === Selection ===
    /// Select all content.
    SelectAll,

    // === History ===
    Undo,
    Redo,
}

impl EditorAction {
    pub fn insert_text(text: impl Into<String>) -> Self {
        Self::InsertText(text.into())
    }

    pub fn toggle_bold() -> Self {
        Self::ToggleFormat(TextFormat::BOLD)
    }

    pub fn toggle_italic() -> Self {
        Self::ToggleFormat(TextFormat::ITALIC)
    }

    /// Whether this action deletes content.
    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::DeleteBackward | Self::DeleteForward)
    }

    /// Whether this action inserts content.
    pub fn is_insertion(&self) -> bool {
        matches!(
            self,
            Self::InsertText(_)
                | Self::InsertParagraph
                | Self::InsertLineBreak
                | Self::InsertDecorator { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_classes() {
        assert!(EditorAction::DeleteBackward.is_deletion());
        assert!(!EditorAction::DeleteBackward.is_insertion());
        assert!(EditorAction::insert_text("x").is_insertion());
        assert!(!EditorAction::SelectAll.is_insertion());
        assert_eq!(
            EditorAction::toggle_bold(),
            EditorAction::ToggleFormat(TextFormat::BOLD)
        );
    }
}
