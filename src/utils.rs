//! Utility functions for the build.
//!
//! - Stylesheet source assembly
//! - CSS minification via lightningcss
//! - Render context assembly (SVG attribute merging)

use std::collections::BTreeMap;
use std::sync::Arc;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::path::SourcePath;
use crate::svg::Svg;
use crate::web::{ElementAttributes, RenderedCharacter, RenderedGraphic, WebData};
use crate::CompileError;

// ---------------------------------------------------------------------------
// Stylesheet assembly
// ---------------------------------------------------------------------------

/// The user's stylesheet followed by the generated state-machine fragment.
///
/// The fragment only includes mixins, so it must come after the stylesheet
/// that defines them.
pub fn stylesheet_source(stylesheet: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return stylesheet.to_string();
    }
    format!("{}\n{}", stylesheet, fragment)
}

// ---------------------------------------------------------------------------
// CSS minification
// ---------------------------------------------------------------------------

/// Parse, minify and print CSS.
pub fn minify_css(css: &str) -> Result<String, CompileError> {
    if css.trim().is_empty() {
        return Ok(String::new());
    }

    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| CompileError::Css(format!("parse error: {}", e)))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| CompileError::Css(format!("minify error: {}", e)))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| CompileError::Css(format!("print error: {}", e)))?;

    Ok(result.code)
}

// ---------------------------------------------------------------------------
// Render context
// ---------------------------------------------------------------------------

/// Looks up loaded SVGs by path.
pub trait SvgLookup {
    fn svg(&self, path: &SourcePath) -> Option<Arc<Svg>>;
}

/// Inlines one SVG into an element. The generated class and id win over
/// anything the SVG's root element declares.
pub fn merge_graphic(attributes: &ElementAttributes, svg: &Svg) -> RenderedGraphic {
    let mut merged: BTreeMap<String, String> = svg.attributes.clone();
    merged.insert("class".into(), attributes.class.clone());
    merged.insert("id".into(), attributes.id.clone());
    RenderedGraphic {
        attributes: merged,
        content: svg.content.clone(),
    }
}

/// Resolves every background and emote of `data` to its inlined SVG.
pub fn render_graphics(
    data: &WebData,
    svgs: &impl SvgLookup,
) -> Result<(Vec<RenderedGraphic>, Vec<RenderedCharacter>), CompileError> {
    let lookup = |path: &SourcePath| {
        svgs.svg(path)
            .ok_or(CompileError::MissingArtifact("a referenced svg"))
    };

    let backgrounds = data
        .backgrounds
        .iter()
        .map(|background| Ok(merge_graphic(&background.attributes, &*lookup(&background.path)?)))
        .collect::<Result<Vec<_>, CompileError>>()?;

    let characters = data
        .characters
        .iter()
        .map(|character| {
            let emotes = character
                .emotes
                .iter()
                .map(|emote| Ok(merge_graphic(&emote.attributes, &*lookup(&emote.path)?)))
                .collect::<Result<Vec<_>, CompileError>>()?;
            Ok(RenderedCharacter {
                attributes: character.attributes.clone(),
                emotes,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    Ok((backgrounds, characters))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
