//! Canned reply table and tone classification.
//!
//! Intents are evaluated in declared order; the first whose pattern matches
//! the normalized query wins. Each intent owns a pool of reply variants that
//! rotates with the number of times the same query was asked before.

use regex::Regex;
use tracing::warn;

/// Substrings that flag a query as asking for a humorous reply.
pub const DEFAULT_HUMOR_MARKERS: &[&str] = &["joke", "funny", "haha", "tease"];

/// Desired tone for a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Humorous,
    Professional,
}

impl Tone {
    /// Classify a normalized query by substring markers.
    pub fn classify<S: AsRef<str>>(normalized: &str, markers: &[S]) -> Self {
        if markers.iter().any(|m| normalized.contains(m.as_ref())) {
            Tone::Humorous
        } else {
            Tone::Professional
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Humorous => "humorous",
            Tone::Professional => "professional",
        }
    }
}

/// Lower-case and trim a raw query.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// One canned intent: a predicate and its reply variants.
#[derive(Debug, Clone)]
pub struct Intent {
    pub name: String,
    pattern: Regex,
    replies: Vec<String>,
}

impl Intent {
    /// Compile an intent. `replies` must not be empty.
    pub fn new(name: impl Into<String>, pattern: &str, replies: Vec<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            replies,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    pub fn is_match(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
    }

    /// Pick the variant for a query asked `rotation` times before.
    pub fn variant(&self, rotation: u32) -> Option<(usize, &str)> {
        if self.replies.is_empty() {
            return None;
        }
        let idx = rotation as usize % self.replies.len();
        Some((idx, self.replies[idx].as_str()))
    }
}

/// A matched canned reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedReply<'a> {
    pub intent: &'a str,
    pub variant: usize,
    pub text: &'a str,
}

/// Ordered intent table.
#[derive(Debug, Clone)]
pub struct IntentTable {
    intents: Vec<Intent>,
}

impl IntentTable {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// First-declared intent matching the query, with the rotated variant.
    pub fn resolve(&self, normalized: &str, rotation: u32) -> Option<CannedReply<'_>> {
        self.intents
            .iter()
            .filter(|intent| intent.is_match(normalized))
            .find_map(|intent| {
                intent.variant(rotation).map(|(variant, text)| CannedReply {
                    intent: &intent.name,
                    variant,
                    text,
                })
            })
    }
}

impl Default for IntentTable {
    fn default() -> Self {
        default_intents()
    }
}

/// Built-in intents for the portfolio chat.
pub fn default_intents() -> IntentTable {
    let table: &[(&str, &str, &[&str])] = &[
        (
            "identity",
            r"\b(who are you|who r u|about you|yourself|your name|introduce)\b",
            &[
                "I'm Alex, a full-stack developer who likes building fast, friendly software. This little assistant answers questions about my work.",
                "Still Alex! I write backend services and web frontends, and I care a lot about performance and clean APIs.",
                "You keep asking, so here's the short version: developer, tinkerer, coffee enthusiast. Ask me about projects or skills next!",
            ],
        ),
        (
            "greeting",
            r"^(hi|hello|hey|yo|hiya|greetings)\b",
            &[
                "Hey there! Ask me about my skills, projects, or experience.",
                "Hello again! What would you like to know?",
            ],
        ),
        (
            "skills",
            r"\b(skills?|stack|languages?|technolog(y|ies)|tools?|frameworks?)\b",
            &[
                "Day to day I work with Rust, TypeScript and Python, plus React on the frontend and Postgres underneath.",
                "My toolbox: Rust and Go for services, React and three.js for the web, Docker and CI pipelines for shipping.",
            ],
        ),
        (
            "projects",
            r"\b(projects?|portfolio|built|build|side work)\b",
            &[
                "Check the Projects section: a realtime whiteboard, a CLI for log analysis and a few open-source libraries.",
                "Recent favourite: a collaborative canvas with live cursors. The Projects section has links and write-ups.",
            ],
        ),
        (
            "experience",
            r"\b(experience|career|jobs?|worked|timeline|background|resume|cv)\b",
            &[
                "I've spent the last several years building web platforms, from startups to larger teams. The Timeline section has the details.",
                "Short version: backend engineer turned full-stack. Scroll to the Timeline for the long version.",
            ],
        ),
        (
            "education",
            r"\b(education|degree|university|college|studied|study)\b",
            &[
                "I studied computer science and keep learning through side projects and open source.",
            ],
        ),
        (
            "contact",
            r"\b(contact|email|reach|hire|linkedin|github|available)\b",
            &[
                "The easiest way to reach me is the contact form at the bottom of the page. I usually reply within a day or two.",
                "Drop a note through the contact form or find me on GitHub and LinkedIn, both linked in the footer.",
            ],
        ),
        (
            "hobbies",
            r"\b(hobb(y|ies)|free time|fun fact|interests?|weekend)\b",
            &[
                "Outside of code I climb, cook too much pasta and fiddle with synthesizers.",
                "Fun fact: I once built a particle-effect screensaver just to avoid cleaning my desk.",
            ],
        ),
        (
            "thanks",
            r"\b(thanks|thank you|thx|cheers)\b",
            &["Anytime! Anything else you'd like to know?", "You're welcome!"],
        ),
    ];

    compile_table(table)
}

/// Compile `(name, pattern, replies)` entries in order. An entry whose
/// pattern fails to compile is logged and left out.
fn compile_table(entries: &[(&str, &str, &[&str])]) -> IntentTable {
    let mut intents = Vec::with_capacity(entries.len());
    for (name, pattern, replies) in entries {
        let replies = replies.iter().map(|r| r.to_string()).collect();
        match Intent::new(*name, pattern, replies) {
            Ok(intent) => intents.push(intent),
            Err(e) => warn!("Dropping built-in intent '{name}': bad pattern: {e}"),
        }
    }
    IntentTable::new(intents)
}
