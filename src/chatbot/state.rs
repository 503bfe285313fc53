//! Conversation state owned by one chat surface.
//!
//! Holds the ordered message log, the input buffer, the thinking flag and
//! the per-query reply rotation counters. Lives for the page-view lifetime
//! only; nothing here is persisted.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::chatbot::message::{Message, MessageView};

/// State shared between a controller and its playback tasks.
pub type SharedState = Arc<Mutex<ConversationState>>;

/// Result of revealing one more char of a typing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal {
    /// One char was revealed. `last` is set when it completed the message.
    Char { ch: char, last: bool },
    /// Nothing left to reveal; typing is now marked finished.
    Finished,
    /// No bot message with that id.
    Missing,
}

/// Conversation state: message log, input buffer, reply rotation.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    index: HashMap<u64, usize>,
    next_id: u64,
    input: String,
    thinking: bool,
    rotation: HashMap<String, u32>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Append a user message and return its id.
    pub fn push_user(&mut self, text: &str) -> u64 {
        let id = self.allocate_id();
        self.push(Message::user(id, text))
    }

    /// Append a bot message with playback pending and return its id.
    pub fn push_bot(&mut self, text: &str) -> u64 {
        let id = self.allocate_id();
        self.push(Message::bot(id, text))
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push(&mut self, msg: Message) -> u64 {
        let id = msg.id;
        self.index.insert(id, self.messages.len());
        self.messages.push(msg);
        id
    }

    pub fn get(&self, id: u64) -> Option<&Message> {
        self.index.get(&id).and_then(|&idx| self.messages.get(idx))
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut Message> {
        match self.index.get(&id) {
            Some(&idx) => self.messages.get_mut(idx),
            None => None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn set_thinking(&mut self, thinking: bool) {
        self.thinking = thinking;
    }

    /// Bump the counter for a normalized query, returning the count before the bump.
    pub fn bump_rotation(&mut self, normalized: &str) -> u32 {
        let count = self.rotation.entry(normalized.to_string()).or_insert(0);
        let before = *count;
        *count = count.saturating_add(1);
        before
    }

    /// How many times this normalized query has been submitted.
    pub fn rotation_count(&self, normalized: &str) -> u32 {
        self.rotation.get(normalized).copied().unwrap_or(0)
    }

    pub fn rotation_len(&self) -> usize {
        self.rotation.len()
    }

    /// Reveal the next char of a bot message.
    pub fn reveal_next(&mut self, id: u64) -> Reveal {
        let Some(msg) = self.get_mut(id) else {
            return Reveal::Missing;
        };
        if msg.is_user {
            return Reveal::Missing;
        }
        match msg.text.chars().nth(msg.revealed) {
            Some(ch) => {
                msg.revealed += 1;
                let last = msg.revealed >= msg.char_len();
                if last {
                    msg.is_typing = false;
                }
                Reveal::Char { ch, last }
            }
            None => {
                msg.is_typing = false;
                Reveal::Finished
            }
        }
    }

    /// Reveal every typing message in full and mark it finished.
    ///
    /// Returns the ids that were still typing.
    pub fn complete_typing(&mut self) -> Vec<u64> {
        let mut completed = Vec::new();
        for msg in self.messages.iter_mut().filter(|m| !m.is_user && m.is_typing) {
            msg.revealed = msg.char_len();
            msg.is_typing = false;
            completed.push(msg.id);
        }
        completed
    }

    /// Ids of bot messages whose playback has not finished.
    pub fn typing_ids(&self) -> Vec<u64> {
        self.messages
            .iter()
            .filter(|m| !m.is_user && m.is_typing)
            .map(|m| m.id)
            .collect()
    }

    pub fn views(&self) -> Vec<MessageView> {
        self.messages.iter().map(Message::view).collect()
    }
}
