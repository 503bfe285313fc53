//! Conversation messages and their rendered view.
//!
//! A bot message carries its final text from the moment it is appended.
//! Typing playback only moves `revealed` forward; it never edits `text`.

use serde::{Deserialize, Serialize};

/// A single turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sequence number, strictly increasing within a conversation.
    pub id: u64,
    /// Final text. For a bot message mid-playback only a prefix is displayed.
    pub text: String,
    pub is_user: bool,
    /// True while typing playback has not reached the end of `text`.
    pub is_typing: bool,
    /// Number of chars of `text` currently displayed.
    pub revealed: usize,
    /// Local wall-clock time of the append, "HH:MM".
    pub sent_at: String,
}

/// Max chars of a message shown in log lines.
const LOG_PREVIEW_CHARS: usize = 50;

impl Message {
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        let revealed = text.chars().count();
        Self {
            id,
            text,
            is_user: true,
            is_typing: false,
            revealed,
            sent_at: now_hhmm(),
        }
    }

    /// A bot message that starts with nothing displayed and playback pending.
    pub fn bot(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            is_user: false,
            is_typing: true,
            revealed: 0,
            sent_at: now_hhmm(),
        }
    }

    /// The part of `text` the rendering layer should show right now.
    pub fn displayed(&self) -> &str {
        match self.text.char_indices().nth(self.revealed) {
            Some((byte_idx, _)) => &self.text[..byte_idx],
            None => &self.text,
        }
    }

    /// Total length of `text` in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Short single-line preview for logging.
    pub fn preview(&self) -> String {
        let mut out: String = self
            .text
            .chars()
            .take(LOG_PREVIEW_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if self.text.chars().count() > LOG_PREVIEW_CHARS {
            out.push_str("...");
        }
        out
    }

    pub fn view(&self) -> MessageView {
        MessageView {
            id: self.id,
            text: self.text.clone(),
            displayed: self.displayed().to_string(),
            is_user: self.is_user,
            is_typing: self.is_typing,
            sent_at: self.sent_at.clone(),
        }
    }
}

/// Read-only copy of a message handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: u64,
    pub text: String,
    pub displayed: String,
    pub is_user: bool,
    pub is_typing: bool,
    pub sent_at: String,
}

fn now_hhmm() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_fully_displayed() {
        let msg = Message::user(1, "who are you");
        assert!(msg.is_user);
        assert!(!msg.is_typing);
        assert_eq!(msg.displayed(), "who are you");
    }

    #[test]
    fn test_bot_message_starts_empty() {
        let msg = Message::bot(2, "hello there");
        assert!(!msg.is_user);
        assert!(msg.is_typing);
        assert_eq!(msg.displayed(), "");
    }

    #[test]
    fn test_displayed_respects_char_boundaries() {
        let mut msg = Message::bot(3, "héllo ✨");
        msg.revealed = 2;
        assert_eq!(msg.displayed(), "hé");
        msg.revealed = 7;
        assert_eq!(msg.displayed(), "héllo ✨");
        assert_eq!(msg.char_len(), 7);
    }

    #[test]
    fn test_displayed_clamps_past_end() {
        let mut msg = Message::bot(4, "abc");
        msg.revealed = 10;
        assert_eq!(msg.displayed(), "abc");
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        let msg = Message::user(5, format!("line1\nline2 {}", "x".repeat(80)));
        let preview = msg.preview();
        assert!(preview.starts_with("line1 line2"));
        assert!(preview.ends_with("..."));
        assert!(!preview.contains('\n'));
    }

    #[test]
    fn test_sent_at_format() {
        let msg = Message::user(6, "hi");
        assert_eq!(msg.sent_at.len(), 5);
        assert_eq!(&msg.sent_at[2..3], ":");
    }
}
