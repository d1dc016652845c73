//! The validated script model produced by the semantic mapper.
//!
//! The compiler never builds these values itself. They arrive from a
//! [`ScriptMapper`](crate::toolchain::ScriptMapper) and are only read.

use serde::{Deserialize, Serialize};

/// A fully mapped SkitScript document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapScript {
    /// States in script order. The first one is the initial state.
    pub states: Vec<MapState>,
    /// Declared characters. `MapState::characters[i]` describes `characters[i]`.
    pub characters: Vec<MapCharacter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCharacter {
    pub normalized: String,
    /// Display form, as first written in the script.
    pub verbatim: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapState {
    /// Normalized background name, if any background is shown.
    pub background: Option<String>,
    /// One entry per declared character.
    pub characters: Vec<Presence>,
    /// Normalized names of the characters speaking the line.
    #[serde(default)]
    pub speakers: Vec<String>,
    pub line: Option<Vec<Run>>,
    pub interaction: Interaction,
}

/// What a character is doing in a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Presence {
    NotPresent,
    Entering { animation: String, emote: String },
    Present { emote: String },
    Exiting { animation: String, emote: String },
}

impl Presence {
    /// The emote shown, or `None` when the character is absent.
    pub fn emote(&self) -> Option<&str> {
        match self {
            Presence::NotPresent => None,
            Presence::Entering { emote, .. }
            | Presence::Present { emote }
            | Presence::Exiting { emote, .. } => Some(emote),
        }
    }
}

/// A span of text sharing one set of formatting flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub code: bool,
    pub plain_text: String,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
            ..Default::default()
        }
    }
}

/// How the reader leaves a state. Indices refer to `MapScript::states`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Interaction {
    #[serde(rename_all = "camelCase")]
    Dismiss { state_index: usize },
    Menu { options: Vec<MenuOption> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub content: Vec<Run>,
    pub state_index: usize,
}
