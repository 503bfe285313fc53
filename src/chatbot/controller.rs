//! Chat controller: accepts queries, resolves replies, drives typing playback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::chatbot::generator::{GenerationError, GenerationRequest, Generator};
use crate::chatbot::intents::{normalize, IntentTable, Tone, DEFAULT_HUMOR_MARKERS};
use crate::chatbot::message::MessageView;
use crate::chatbot::playback::{wait_end, Playback, PlaybackEnd, PlaybackEvent, TypingPace};
use crate::chatbot::state::SharedState;

pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, I can't answer that one right now. \
Ask me about my skills, projects or experience, or send a note through the contact form!";

/// Tunables for a controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Pause before a canned reply so the thinking indicator is visible.
    pub canned_delay: Duration,
    pub pace: TypingPace,
    /// Upper bound on one remote generation call.
    pub remote_timeout: Duration,
    pub fallback_reply: String,
    pub humor_markers: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            canned_delay: Duration::from_millis(500),
            pace: TypingPace::default(),
            remote_timeout: Duration::from_secs(15),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            humor_markers: DEFAULT_HUMOR_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Notifications for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    MessageAppended { id: u64, is_user: bool },
    Thinking(bool),
    Revealed { id: u64, ch: char },
    TypingFinished { id: u64 },
    TypingCancelled { id: u64 },
    SurfaceToggled { open: bool },
}

impl From<PlaybackEvent> for ChatEvent {
    fn from(ev: PlaybackEvent) -> Self {
        match ev {
            PlaybackEvent::Revealed { id, ch } => ChatEvent::Revealed { id, ch },
            PlaybackEvent::Finished { id } => ChatEvent::TypingFinished { id },
            PlaybackEvent::Cancelled { id } => ChatEvent::TypingCancelled { id },
        }
    }
}

/// Where a bot reply came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    Canned { intent: String, variant: usize },
    Generated,
    Fallback,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing changed.
    Ignored,
    /// Another submission is still thinking; nothing changed.
    Busy,
    Answered {
        user_id: u64,
        bot_id: u64,
        source: ReplySource,
    },
}

/// Read-only view of the conversation for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
    pub messages: Vec<MessageView>,
    pub thinking: bool,
    pub input: String,
    pub open: bool,
}

/// Owns the reply policy and playback for one conversation.
///
/// The conversation state is injected so it can be shared with, or
/// inspected by, code that does not go through the controller.
pub struct ChatController {
    config: ControllerConfig,
    state: SharedState,
    intents: IntentTable,
    generator: Arc<dyn Generator>,
    open: AtomicBool,
    /// Running playbacks by message id. Dropping a handle cancels it.
    playbacks: Mutex<HashMap<u64, Playback>>,
    events: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl ChatController {
    /// Create a controller with the surface open.
    pub fn new(
        config: ControllerConfig,
        state: SharedState,
        intents: IntentTable,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            state,
            intents,
            generator,
            open: AtomicBool::new(true),
            playbacks: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Start publishing [`ChatEvent`]s. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    /// Replace the text being composed.
    pub async fn set_input(&self, text: &str) {
        self.state.lock().await.set_input(text);
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let raw = self.state.lock().await.input().to_string();
        self.submit_query(&raw).await
    }

    /// Answer one user query.
    ///
    /// The user message is appended before any reply work starts. The bot
    /// reply is appended once resolved and typing playback begins if the
    /// surface is open.
    pub async fn submit_query(&self, raw: &str) -> SubmitOutcome {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            debug!("Ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        let (user_id, rotation) = {
            let mut st = self.state.lock().await;
            if st.is_thinking() {
                info!("Submission rejected, still thinking: \"{normalized}\"");
                return SubmitOutcome::Busy;
            }
            let user_id = st.push_user(raw);
            st.set_thinking(true);
            let rotation = st.bump_rotation(&normalized);
            (user_id, rotation)
        };
        self.emit(ChatEvent::MessageAppended { id: user_id, is_user: true });
        self.emit(ChatEvent::Thinking(true));
        info!("📨 Query #{user_id} (asked {rotation} time(s) before): \"{normalized}\"");

        let tone = Tone::classify(&normalized, &self.config.humor_markers);
        let (text, source) = self.resolve_reply(&normalized, rotation, tone).await;

        // Only the newest reply may be typing: earlier ones jump to their full text.
        let (bot_id, completed) = {
            let mut st = self.state.lock().await;
            st.set_thinking(false);
            let completed = st.complete_typing();
            let bot_id = st.push_bot(&text);
            st.clear_input();
            (bot_id, completed)
        };
        self.emit(ChatEvent::Thinking(false));
        self.finish_superseded(&completed);
        self.emit(ChatEvent::MessageAppended { id: bot_id, is_user: false });
        info!("🤖 Reply #{bot_id} ({source:?}): {} chars", text.chars().count());

        if !self.run_typing_playback(bot_id) {
            debug!("Playback for #{bot_id} not started (surface closed)");
        }

        SubmitOutcome::Answered { user_id, bot_id, source }
    }

    async fn resolve_reply(&self, normalized: &str, rotation: u32, tone: Tone) -> (String, ReplySource) {
        if let Some(reply) = self.intents.resolve(normalized, rotation) {
            info!("Matched intent '{}' variant {}", reply.intent, reply.variant);
            let resolved = (
                reply.text.to_string(),
                ReplySource::Canned {
                    intent: reply.intent.to_string(),
                    variant: reply.variant,
                },
            );
            sleep(self.config.canned_delay).await;
            return resolved;
        }

        let request = GenerationRequest {
            query: normalized.to_string(),
            tone,
        };
        let result = match timeout(self.config.remote_timeout, self.generator.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => (text, ReplySource::Generated),
            Ok(_) => {
                warn!("Remote generation failed: {}", GenerationError::Empty);
                (self.config.fallback_reply.clone(), ReplySource::Fallback)
            }
            Err(e) => {
                warn!("Remote generation failed: {e}");
                (self.config.fallback_reply.clone(), ReplySource::Fallback)
            }
        }
    }

    /// Report replies cut short by a newer one.
    ///
    /// A running playback reaches the end on its next tick and reports
    /// itself; replies with no playback are reported here.
    fn finish_superseded(&self, completed: &[u64]) {
        if completed.is_empty() {
            return;
        }
        info!("Completing {} unfinished repl(ies) early", completed.len());
        let playbacks = self.playbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for &id in completed {
            let running = playbacks.get(&id).is_some_and(|p| !p.is_finished());
            if !running {
                self.emit(ChatEvent::TypingFinished { id });
            }
        }
    }

    /// Start typing playback for a bot message.
    ///
    /// Returns false if the surface is closed or a playback for that
    /// message is already running.
    pub fn run_typing_playback(&self, id: u64) -> bool {
        let mut playbacks = self.playbacks.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_open() {
            return false;
        }
        playbacks.retain(|_, p| !p.is_finished());
        if playbacks.contains_key(&id) {
            return false;
        }

        let events = self.events.clone();
        let playback = Playback::spawn(self.state.clone(), id, self.config.pace, move |ev| {
            if let Some(ref tx) = events {
                let _ = tx.send(ev.into());
            }
        });
        debug!("Started playback for #{id}");
        playbacks.insert(id, playback);
        true
    }

    /// Wait until the playback for `id` ends. `None` if none is running.
    pub async fn wait_for_typing(&self, id: u64) -> Option<PlaybackEnd> {
        let end = {
            let playbacks = self.playbacks.lock().unwrap_or_else(PoisonError::into_inner);
            playbacks.get(&id).map(Playback::subscribe_end)
        }?;
        Some(wait_end(end).await)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Close the chat surface. Running playbacks are cancelled; history stays.
    pub fn close(&self) {
        // Flip the flag under the playbacks lock so no playback starts after the drain.
        let cancelled: Vec<Playback> = {
            let mut playbacks = self.playbacks.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.open.swap(false, Ordering::SeqCst) {
                return;
            }
            playbacks.drain().map(|(_, p)| p).collect()
        };
        info!("Chat closed, cancelling {} playback(s)", cancelled.len());
        for playback in &cancelled {
            playback.cancel();
        }
        self.emit(ChatEvent::SurfaceToggled { open: false });
    }

    /// Reopen the chat surface, resuming any unfinished typing.
    pub async fn open(&self) {
        if self.open.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emit(ChatEvent::SurfaceToggled { open: true });
        let typing = self.state.lock().await.typing_ids();
        info!("Chat opened, resuming {} playback(s)", typing.len());
        for id in typing {
            self.run_typing_playback(id);
        }
    }

    /// Toggle the surface and return the new open state.
    pub async fn toggle(&self) -> bool {
        if self.is_open() {
            self.close();
            false
        } else {
            self.open().await;
            true
        }
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let st = self.state.lock().await;
        ChatSnapshot {
            messages: st.views(),
            thinking: st.is_thinking(),
            input: st.input().to_string(),
            open: self.is_open(),
        }
    }
}
