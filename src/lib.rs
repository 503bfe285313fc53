//! Portfolio chat assistant: canned replies with a Gemini fallback and
//! simulated typing playback.

pub mod chatbot;
pub mod config;
