//! Typing playback: reveals a bot message one char at a time.
//!
//! Each playback is a spawned task paired with a cancel handle. Cancelling
//! (or dropping the handle) stops the task before its next reveal, so no
//! timer keeps firing against a closed chat surface.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::chatbot::state::{Reveal, SharedState};

/// Range the per-char reveal interval is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingPace {
    pub min: Duration,
    pub max: Duration,
}

impl TypingPace {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// Random delay before the next char.
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_micros() as u64;
        let max = self.max.as_micros() as u64;
        Duration::from_micros(rand::rng().random_range(min..=max))
    }
}

impl Default for TypingPace {
    fn default() -> Self {
        Self::from_millis(10, 30)
    }
}

/// Emitted by a running playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Revealed { id: u64, ch: char },
    Finished { id: u64 },
    Cancelled { id: u64 },
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Completed,
    Cancelled,
    /// The message was not in the conversation.
    Missing,
}

/// Handle to a running playback. Dropping it cancels the playback.
pub struct Playback {
    id: u64,
    cancel: Arc<Notify>,
    end: watch::Receiver<Option<PlaybackEnd>>,
    task: JoinHandle<()>,
}

impl Playback {
    /// Start revealing message `id`, continuing from its current prefix.
    pub fn spawn<F>(state: SharedState, id: u64, pace: TypingPace, on_event: F) -> Self
    where
        F: Fn(PlaybackEvent) + Send + Sync + 'static,
    {
        let cancel = Arc::new(Notify::new());
        let cancel_clone = cancel.clone();
        let (end_tx, end) = watch::channel(None);

        let task = tokio::spawn(async move {
            let outcome = loop {
                tokio::select! {
                    biased;

                    _ = cancel_clone.notified() => {
                        break PlaybackEnd::Cancelled;
                    }
                    _ = sleep(pace.next_delay()) => {}
                }

                let reveal = state.lock().await.reveal_next(id);
                match reveal {
                    Reveal::Char { ch, last } => {
                        on_event(PlaybackEvent::Revealed { id, ch });
                        if last {
                            break PlaybackEnd::Completed;
                        }
                    }
                    Reveal::Finished => break PlaybackEnd::Completed,
                    Reveal::Missing => break PlaybackEnd::Missing,
                }
            };

            match outcome {
                PlaybackEnd::Completed => on_event(PlaybackEvent::Finished { id }),
                PlaybackEnd::Cancelled => on_event(PlaybackEvent::Cancelled { id }),
                PlaybackEnd::Missing => {}
            }
            debug!("Playback for message {id} ended: {outcome:?}");
            let _ = end_tx.send(Some(outcome));
        });

        Self { id, cancel, end, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop revealing. Takes effect before the next scheduled reveal.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A receiver that resolves once the playback ends.
    pub fn subscribe_end(&self) -> watch::Receiver<Option<PlaybackEnd>> {
        self.end.clone()
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel.notify_one();
    }
}

/// Wait on a receiver from [`Playback::subscribe_end`].
pub async fn wait_end(mut end: watch::Receiver<Option<PlaybackEnd>>) -> PlaybackEnd {
    match end.wait_for(Option::is_some).await {
        Ok(value) => (*value).unwrap_or(PlaybackEnd::Cancelled),
        // Task went away without reporting.
        Err(_) => PlaybackEnd::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::state::ConversationState;
    use std::sync::Mutex as StdMutex;

    fn fast() -> TypingPace {
        TypingPace::from_millis(1, 2)
    }

    #[test]
    fn test_pace_stays_in_range() {
        let pace = TypingPace::from_millis(10, 30);
        for _ in 0..100 {
            let d = pace.next_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
        }
        let fixed = TypingPace::from_millis(5, 5);
        assert_eq!(fixed.next_delay(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_playback_reveals_full_text() {
        let state = ConversationState::new().shared();
        let id = state.lock().await.push_bot("hello");
        let seen = Arc::new(StdMutex::new(String::new()));
        let seen_clone = seen.clone();

        let playback = Playback::spawn(state.clone(), id, fast(), move |ev| {
            if let PlaybackEvent::Revealed { ch, .. } = ev {
                seen_clone.lock().unwrap().push(ch);
            }
        });

        assert_eq!(wait_end(playback.subscribe_end()).await, PlaybackEnd::Completed);
        assert_eq!(playback.id(), id);
        assert_eq!(seen.lock().unwrap().as_str(), "hello");

        let st = state.lock().await;
        let msg = st.get(id).unwrap();
        assert!(!msg.is_typing);
        assert_eq!(msg.displayed(), "hello");
    }

    #[tokio::test]
    async fn test_prefix_never_exceeds_text() {
        let state = ConversationState::new().shared();
        let id = state.lock().await.push_bot("abcdef");
        let playback = Playback::spawn(state.clone(), id, fast(), |_| {});

        loop {
            {
                let st = state.lock().await;
                let msg = st.get(id).unwrap();
                assert!(msg.displayed().len() <= msg.text.len());
                assert!(msg.text.starts_with(msg.displayed()));
                if !msg.is_typing {
                    break;
                }
            }
            sleep(Duration::from_millis(1)).await;
        }
        drop(playback);
    }

    #[tokio::test]
    async fn test_cancel_stops_reveals() {
        let state = ConversationState::new().shared();
        let id = state.lock().await.push_bot(&"x".repeat(500));
        let playback = Playback::spawn(state.clone(), id, TypingPace::from_millis(5, 5), |_| {});

        sleep(Duration::from_millis(20)).await;
        playback.cancel();
        assert_eq!(wait_end(playback.subscribe_end()).await, PlaybackEnd::Cancelled);

        let revealed = state.lock().await.get(id).unwrap().revealed;
        sleep(Duration::from_millis(30)).await;
        let st = state.lock().await;
        let msg = st.get(id).unwrap();
        assert_eq!(msg.revealed, revealed);
        assert!(msg.is_typing);
        assert!(revealed < 500);
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let state = ConversationState::new().shared();
        let id = state.lock().await.push_bot(&"y".repeat(500));
        let playback = Playback::spawn(state.clone(), id, TypingPace::from_millis(5, 5), |_| {});
        let end = playback.subscribe_end();
        drop(playback);

        assert_eq!(wait_end(end).await, PlaybackEnd::Cancelled);
        assert!(state.lock().await.get(id).unwrap().is_typing);
    }

    #[tokio::test]
    async fn test_missing_message() {
        let state = ConversationState::new().shared();
        let playback = Playback::spawn(state, 42, fast(), |_| {});
        assert_eq!(wait_end(playback.subscribe_end()).await, PlaybackEnd::Missing);
    }

    #[tokio::test]
    async fn test_resume_from_prefix() {
        let state = ConversationState::new().shared();
        let id = {
            let mut st = state.lock().await;
            let id = st.push_bot("resume");
            st.reveal_next(id);
            st.reveal_next(id);
            id
        };
        let seen = Arc::new(StdMutex::new(String::new()));
        let seen_clone = seen.clone();
        let playback = Playback::spawn(state.clone(), id, fast(), move |ev| {
            if let PlaybackEvent::Revealed { ch, .. } = ev {
                seen_clone.lock().unwrap().push(ch);
            }
        });
        wait_end(playback.subscribe_end()).await;
        assert_eq!(seen.lock().unwrap().as_str(), "sume");
    }
}
