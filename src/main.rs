use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use foliobot::chatbot::{ChatController, ChatEvent, ConversationState, Generator, SubmitOutcome};
use foliobot::config::Config;

/// Terminal-side bookkeeping for rendering typed replies.
#[derive(Default)]
struct Terminal {
    /// Message whose chars are currently being printed on the open line.
    line: Option<u64>,
    /// Chars already printed per bot message, to redraw resumed replies.
    printed: HashMap<u64, String>,
}

impl Terminal {
    fn render(&mut self, event: ChatEvent) {
        let mut out = std::io::stdout().lock();
        match event {
            ChatEvent::Thinking(true) => {
                self.break_line(&mut out);
                writeln!(out, "  ... thinking").ok();
            }
            ChatEvent::Revealed { id, ch } => {
                let printed = self.printed.entry(id).or_default();
                if self.line != Some(id) {
                    if self.line.is_some() {
                        writeln!(out).ok();
                    }
                    write!(out, "bot: {printed}").ok();
                    self.line = Some(id);
                }
                write!(out, "{ch}").ok();
                printed.push(ch);
            }
            ChatEvent::TypingFinished { id } => {
                self.printed.remove(&id);
                if self.line == Some(id) {
                    writeln!(out).ok();
                    self.line = None;
                }
            }
            ChatEvent::TypingCancelled { id } => {
                if self.line == Some(id) {
                    writeln!(out, " ...").ok();
                    self.line = None;
                }
            }
            ChatEvent::SurfaceToggled { open } => {
                self.break_line(&mut out);
                writeln!(out, "({})", if open { "chat opened" } else { "chat closed" }).ok();
            }
            ChatEvent::Thinking(false) | ChatEvent::MessageAppended { .. } => {}
        }
        out.flush().ok();
    }

    fn break_line(&mut self, out: &mut impl Write) {
        if self.line.take().is_some() {
            writeln!(out).ok();
        }
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);
    let config = match config_path {
        Some(ref path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("foliobot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::WARN.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting foliobot...");
    match config_path {
        Some(ref path) => info!("Loaded config from {path}"),
        None => info!("No config file given, using defaults"),
    }
    info!("{} canned intent(s)", config.intents.len());
    if config.gemini_api_key.is_empty() {
        warn!("No Gemini API key set, unmatched questions get the fallback reply");
    }

    let generator: Arc<dyn Generator> = match config.gemini_client() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create Gemini client: {e}");
            std::process::exit(1);
        }
    };

    let mut controller = ChatController::new(
        config.controller_config(),
        ConversationState::new().shared(),
        config.intents.clone(),
        generator,
    );
    let mut events = controller.subscribe();
    let controller = Arc::new(controller);

    println!("Chat with {}. Commands: /close, /open, /history, /quit", config.owner_name);

    let mut terminal = Terminal::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&controller, line).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read stdin: {e}");
                        break;
                    }
                }
            }
            Some(event) = events.recv() => terminal.render(event),
        }
    }

    controller.close();
    info!("👋 Bye");
}

/// Handle one line of input. Returns false to quit.
async fn handle_line(controller: &Arc<ChatController>, line: String) -> bool {
    match line.trim() {
        "/quit" => return false,
        "/close" => controller.close(),
        "/open" => controller.open().await,
        "/history" => print_history(controller).await,
        _ => {
            let controller = controller.clone();
            // Submit the line directly: the input buffer is shared across lines.
            tokio::spawn(async move {
                if controller.submit_query(&line).await == SubmitOutcome::Busy {
                    println!("(still thinking about the last one, hang on)");
                }
            });
        }
    }
    true
}

async fn print_history(controller: &ChatController) {
    let snapshot = controller.snapshot().await;
    if snapshot.messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for msg in &snapshot.messages {
        let who = if msg.is_user { "you" } else { "bot" };
        let typing = if msg.is_typing { " ..." } else { "" };
        println!("[{}] {who}: {}{typing}", msg.sent_at, msg.displayed);
    }
}
