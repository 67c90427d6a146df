//! crates/nexus_core/src/catalog.rs
//!
//! Fixed tables: supported models, system prompt presets and the canned
//! texts the session shows.

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Shown as the first transcript entry of every fresh or cleared conversation.
pub const GREETING: &str = "Hello! I'm ready to assist you. I'm currently configured as a helpful AI assistant. You can modify my behavior using the system message settings.";

/// The status line shown whenever no notification is active.
pub const IDLE_STATUS: &str = "System configured • Ready for conversation";

/// Human-readable label → model identifier, in display order.
pub const MODEL_NAMES: &[(&str, &str)] = &[
    ("GPT-4o", "gpt-4o"),
    ("GPT-4", "gpt-4-0613"),
    ("GPT-3.5 Turbo", "gpt-3.5-turbo-0613"),
    ("GPT-3.5 Turbo 16K", "gpt-3.5-turbo-16k"),
    ("GPT-4o Mini", "gpt-4o-mini"),
    ("GPT-4o Nano", "gpt-4o-nano"),
    ("GPT-3.5 Mini", "gpt-3.5-mini"),
    ("GPT-3.5 Nano", "gpt-3.5-nano"),
];

/// Reverse lookup of a model id to its label.
pub fn model_label(model_id: &str) -> Option<&'static str> {
    MODEL_NAMES
        .iter()
        .find(|(_, id)| *id == model_id)
        .map(|(label, _)| *label)
}

/// A named, canned system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Helpful,
    Creative,
    Technical,
    Teacher,
    Document,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Helpful,
        Preset::Creative,
        Preset::Technical,
        Preset::Teacher,
        Preset::Document,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Helpful => "helpful",
            Preset::Creative => "creative",
            Preset::Technical => "technical",
            Preset::Teacher => "teacher",
            Preset::Document => "document",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Preset::Helpful => "You are a helpful AI assistant. You provide accurate, thoughtful responses and ask clarifying questions when needed.",
            Preset::Creative => "You are a creative writing assistant. You help users brainstorm ideas, write engaging content, and explore imaginative concepts with enthusiasm and originality.",
            Preset::Technical => "You are a technical expert and programming assistant. You provide detailed, accurate technical information, debug code, and explain complex concepts clearly.",
            Preset::Teacher => "You are a patient and encouraging teacher. You break down complex topics into understandable steps, provide examples, and adapt your explanations to the student's level.",
            Preset::Document => "You are a document analysis assistant. You summarize, answer questions, and provide insights based on the uploaded document, referencing key sections and facts.",
        }
    }
}
