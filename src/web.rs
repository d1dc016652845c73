//! Web-ready data produced by the transpiler and handed to the template.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::path::SourcePath;

/// The `class`/`id` pair every generated element carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementAttributes {
    pub id: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebState {
    pub attributes: ElementAttributes,
    /// Rendered line markup.
    pub line: Option<String>,
    /// Display forms of the speakers, sorted.
    pub speakers: Option<Vec<String>>,
    pub interaction: WebInteraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebInteraction {
    Dismiss { href: String },
    Menu { options: Vec<WebMenuOption> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebMenuOption {
    pub content: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebBackground {
    pub normalized: String,
    pub attributes: ElementAttributes,
    pub path: SourcePath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebCharacter {
    pub normalized: String,
    pub verbatim: String,
    pub attributes: ElementAttributes,
    pub emotes: Vec<WebEmote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebEmote {
    pub normalized: String,
    pub attributes: ElementAttributes,
    pub path: SourcePath,
}

/// Everything the page shows, in document order.
///
/// States come first so that backgrounds and characters can be reached from a
/// targeted state with the `~` combinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebData {
    pub states: Vec<WebState>,
    pub backgrounds: Vec<WebBackground>,
    pub characters: Vec<WebCharacter>,
}

// ---------------------------------------------------------------------------
// Render context
// ---------------------------------------------------------------------------

/// An element whose body is an inlined SVG.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedGraphic {
    pub attributes: BTreeMap<String, String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedCharacter {
    pub attributes: ElementAttributes,
    pub emotes: Vec<RenderedGraphic>,
}

/// The object a page template is rendered against.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext<'a> {
    pub css: &'a str,
    pub states: &'a [WebState],
    pub backgrounds: Vec<RenderedGraphic>,
    pub characters: Vec<RenderedCharacter>,
}
