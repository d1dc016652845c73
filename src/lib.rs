//! # SkitScript Web
//!
//! Compiles a SkitScript document into a single static page that needs no
//! JavaScript. Every state of the script is an element with an id; following a
//! link targets it, and generated CSS keyed on `:target` decides which state,
//! background, characters, emotes and animations are visible.
//!
//! The compiler is incremental. [`Compiler::compile`] runs the first full build;
//! [`Compiler::recompile`] takes the paths that changed and redoes only the
//! work that depends on them.
//!
//! ```text
//! script ─ parse ─ map ─ transpile ─┬─ data ───────────────┐
//!                                   ├─ css fragment ─┐     │
//!                                   └─ asset paths ─ load svgs ─┤
//! stylesheet ────────────────────────── compile css ┘     │
//! template ─ compile ──────────────────────────────────── render ─ minify ─ write
//! ```

pub mod build;
pub mod fs;
pub mod identifier;
pub mod model;
pub mod path;
pub mod runs;
pub mod svg;
pub mod toolchain;
pub mod transpile;
pub mod utils;
pub mod web;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use build::Compiler;
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
pub use path::SourcePath;
pub use toolchain::Toolchain;
pub use transpile::{transpile, Transpiled, TranspileError};

// ---------------------------------------------------------------------------
// Source layout
// ---------------------------------------------------------------------------

/// Where the compiler finds its sources and writes the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    pub script: SourcePath,
    pub template: SourcePath,
    pub stylesheet: SourcePath,
    pub page: SourcePath,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            script: SourcePath::from(["index.skitscript"]),
            template: SourcePath::from(["index.pug"]),
            stylesheet: SourcePath::from(["index.sass"]),
            page: SourcePath::from(["index.html"]),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildOptions
// ---------------------------------------------------------------------------

/// Describes HOW to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub layout: SourceLayout,
    /// Minify the compiled CSS with lightningcss before it reaches the template.
    pub minify_css: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            layout: SourceLayout::default(),
            minify_css: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic reported by the parser or mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CompileError
// ---------------------------------------------------------------------------

/// Which source-processing stage rejected the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStage {
    Parse,
    Mapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStage {
    Compile,
    Render,
}

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Script rejected during {stage:?}: {}", summarize(.diagnostics))]
    Source {
        stage: SourceStage,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("Script model is inconsistent: {0}")]
    Transpile(#[from] TranspileError),

    #[error("Asset `{path}` {source}")]
    Asset {
        path: SourcePath,
        #[source]
        source: svg::SvgError,
    },

    #[error("IO error ({direction:?} `{path}`): {source}")]
    Io {
        path: SourcePath,
        direction: IoDirection,
        #[source]
        source: std::io::Error,
    },

    #[error("Template {stage:?} failed: {source}")]
    Template {
        stage: TemplateStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stylesheet compilation failed: {0}")]
    Stylesheet(#[source] anyhow::Error),

    #[error("CSS minification failed: {0}")]
    Css(String),

    #[error("Markup minification failed: {0}")]
    Markup(#[source] anyhow::Error),

    #[error("Render context could not be built: {0}")]
    RenderContext(#[from] serde_json::Error),

    #[error("Build task failed: {0}")]
    Task(String),

    #[error("Build state is missing {0}")]
    MissingArtifact(&'static str),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "no diagnostics".to_string();
    }
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: BuildOptions =
            serde_json::from_str(r#"{ "layout": { "page": ["dist", "index.html"] } }"#).unwrap();
        assert!(options.minify_css);
        assert_eq!(options.layout.page, SourcePath::from(["dist", "index.html"]));
        assert_eq!(options.layout.script, SourcePath::from(["index.skitscript"]));
    }

    #[test]
    fn source_error_keeps_diagnostics() {
        let err = CompileError::Source {
            stage: SourceStage::Mapping,
            diagnostics: vec![Diagnostic::error("unknown character"), Diagnostic::error("bad")],
        };
        assert_eq!(
            err.to_string(),
            "Script rejected during Mapping: unknown character; bad"
        );
    }
}
