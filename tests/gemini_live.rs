//! Integration tests against the live Gemini API.
//!
//! These tests require GEMINI_API_KEY to be set.
//!
//! Run with: cargo test --features integ_test --test gemini_live

#[cfg(feature = "integ_test")]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use foliobot::chatbot::gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
    use foliobot::chatbot::{
        ChatController, ControllerConfig, ConversationState, IntentTable, ReplySource, SubmitOutcome, Tone,
        TypingPace,
    };

    fn api_key() -> Option<String> {
        std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())
    }

    fn client(api_key: String) -> GeminiClient {
        GeminiClient::new(
            api_key,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MODEL.to_string(),
            "You are the assistant on a developer's portfolio website.".to_string(),
            Duration::from_secs(30),
        )
        .expect("Failed to build client")
    }

    #[tokio::test]
    async fn test_generate_reply() {
        let Some(key) = api_key() else {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return;
        };

        let reply = client(key)
            .generate_reply("what is your favourite programming language?", Tone::Professional)
            .await;
        assert!(reply.is_ok(), "Generation failed: {:?}", reply.err());
        assert!(!reply.unwrap().trim().is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_is_an_error() {
        if api_key().is_none() {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return;
        }

        let reply = client("definitely-not-a-key".to_string())
            .generate_reply("hello", Tone::Professional)
            .await;
        assert!(reply.is_err());
    }

    #[tokio::test]
    async fn test_controller_uses_remote_for_unmatched_query() {
        let Some(key) = api_key() else {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return;
        };

        let config = ControllerConfig {
            canned_delay: Duration::ZERO,
            pace: TypingPace::from_millis(0, 1),
            remote_timeout: Duration::from_secs(30),
            ..ControllerConfig::default()
        };
        let controller = ChatController::new(
            config,
            ConversationState::new().shared(),
            IntentTable::default(),
            Arc::new(client(key)),
        );

        match controller.submit_query("tell me a joke about databases").await {
            SubmitOutcome::Answered { source, bot_id, .. } => {
                assert_eq!(source, ReplySource::Generated);
                controller.wait_for_typing(bot_id).await;
                let snapshot = controller.snapshot().await;
                assert!(!snapshot.messages[1].is_typing);
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }
}
