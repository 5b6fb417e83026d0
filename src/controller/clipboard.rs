//! Best-effort clipboard actions for the essay editor.
//!
//! Clipboard access belongs to the host. A failed read or write is logged and leaves the
//! essay untouched; it never reaches the feedback region.

use async_trait::async_trait;

use crate::feedback::compositor::CharIndex;

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> anyhow::Result<()>;
    async fn read_text(&self) -> anyhow::Result<String>;
}

/// Selection in character offsets; `start > end` is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start: start.min(end), end: start.max(end) }
    }

    pub fn caret(position: usize) -> Self {
        Self { start: position, end: position }
    }

    fn byte_range(self, text: &str) -> std::ops::Range<usize> {
        let index = CharIndex::new(text);
        let start = self.start.min(self.end);
        let end = self.start.max(self.end);
        index.byte_offset(start)..index.byte_offset(end)
    }
}

/// Copy the selection. Returns whether the clipboard accepted it.
pub async fn copy(clipboard: &dyn Clipboard, text: &str, selection: Selection) -> bool {
    let range = selection.byte_range(text);
    if range.is_empty() {
        return false;
    }

    match clipboard.write_text(&text[range]).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Clipboard copy failed");
            false
        }
    }
}

/// Copy the selection and remove it from `text` once the clipboard has it.
pub async fn cut(clipboard: &dyn Clipboard, text: &mut String, selection: Selection) -> bool {
    let range = selection.byte_range(text);
    if range.is_empty() {
        return false;
    }

    match clipboard.write_text(&text[range.clone()]).await {
        Ok(()) => {
            text.replace_range(range, "");
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "Clipboard cut failed");
            false
        }
    }
}

/// Replace the selection with the clipboard contents. Returns the caret position (in
/// characters) after the pasted text, or `None` when nothing was pasted.
pub async fn paste(
    clipboard: &dyn Clipboard,
    text: &mut String,
    selection: Selection,
) -> Option<usize> {
    let pasted = match clipboard.read_text().await {
        Ok(pasted) => pasted,
        Err(err) => {
            tracing::warn!(error = %err, "Clipboard paste failed");
            return None;
        }
    };

    let range = selection.byte_range(text);
    let caret = text[..range.start].chars().count() + pasted.chars().count();
    text.replace_range(range, &pasted);
    Some(caret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryClipboard {
        content: Mutex<String>,
        broken: bool,
    }

    #[async_trait]
    impl Clipboard for MemoryClipboard {
        async fn write_text(&self, text: &str) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("clipboard permission denied");
            }
            *self.content.lock().unwrap() = text.to_string();
            Ok(())
        }

        async fn read_text(&self) -> anyhow::Result<String> {
            if self.broken {
                anyhow::bail!("clipboard permission denied");
            }
            Ok(self.content.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn copy_and_paste_use_character_offsets() {
        let clipboard = MemoryClipboard::default();
        let mut text = "déjà vu".to_string();

        assert!(copy(&clipboard, &text, Selection::new(4, 0)).await);
        assert_eq!(*clipboard.content.lock().unwrap(), "déjà");

        let caret = paste(&clipboard, &mut text, Selection::caret(7)).await;
        assert_eq!(text, "déjà vudéjà");
        assert_eq!(caret, Some(11));
    }

    #[tokio::test]
    async fn cut_removes_selection_only_after_clipboard_write() {
        let clipboard = MemoryClipboard::default();
        let mut text = "hello world".to_string();

        assert!(cut(&clipboard, &mut text, Selection::new(5, 11)).await);
        assert_eq!(text, "hello");
        assert_eq!(*clipboard.content.lock().unwrap(), " world");
    }

    #[tokio::test]
    async fn failures_leave_text_untouched() {
        let clipboard = MemoryClipboard { broken: true, ..Default::default() };
        let mut text = "keep me".to_string();

        assert!(!cut(&clipboard, &mut text, Selection::new(0, 4)).await);
        assert_eq!(paste(&clipboard, &mut text, Selection::caret(0)).await, None);
        assert!(!copy(&clipboard, &text, Selection::new(0, 4)).await);
        assert_eq!(text, "keep me");
    }

    #[tokio::test]
    async fn empty_selection_is_not_copied() {
        let clipboard = MemoryClipboard::default();
        assert!(!copy(&clipboard, "abc", Selection::caret(1)).await);
    }
}
