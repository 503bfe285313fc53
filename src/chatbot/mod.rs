//! Chatbot module - portfolio chat with canned replies and Gemini fallback.

pub mod controller;
pub mod gemini;
pub mod generator;
pub mod intents;
pub mod message;
pub mod playback;
pub mod state;


pub use controller::{ChatController, ChatEvent, ChatSnapshot, ControllerConfig, ReplySource, SubmitOutcome};
pub use gemini::GeminiClient;
pub use generator::{GenerationError, GenerationRequest, Generator};
pub use intents::{Intent, IntentTable, Tone};
pub use message::{Message, MessageView};
pub use playback::{PlaybackEnd, TypingPace};
pub use state::{ConversationState, SharedState};
