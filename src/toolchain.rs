//! Collaborators the compiler drives but does not implement.
//!
//! Parsing, semantic mapping, templating and stylesheet compilation are owned
//! by other components. The compiler only needs the narrow interfaces below.
//! The SVG optimizer and markup minifier have bundled implementations.

use std::fmt;
use std::sync::Arc;

use crate::model::MapScript;
use crate::Diagnostic;

/// Opaque parser output, handed unchanged to the mapper.
pub type SyntaxTree = serde_json::Value;

/// Turns script text into a syntax tree, or explains why it cannot.
pub trait ScriptParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<SyntaxTree, Vec<Diagnostic>>;
}

/// Turns a syntax tree into a validated script model, or explains why it cannot.
pub trait ScriptMapper: Send + Sync {
    fn map(&self, tree: SyntaxTree) -> Result<MapScript, Vec<Diagnostic>>;
}

/// Compiles template source text.
pub trait TemplateEngine: Send + Sync {
    fn compile(&self, source: &str) -> anyhow::Result<Arc<dyn CompiledTemplate>>;
}

/// A compiled template, rendered once per page write.
pub trait CompiledTemplate: Send + Sync {
    fn render(&self, context: &serde_json::Value) -> anyhow::Result<String>;
}

/// Compiles the user's stylesheet (with the generated fragment appended) to CSS.
pub trait StylesheetCompiler: Send + Sync {
    fn compile(&self, source: &str) -> anyhow::Result<String>;
}

/// Shrinks one SVG document without changing how it looks.
pub trait SvgOptimizer: Send + Sync {
    fn optimize(&self, svg: &str) -> anyhow::Result<String>;
}

/// Shrinks the final page losslessly.
pub trait MarkupMinifier: Send + Sync {
    fn minify(&self, html: &str) -> anyhow::Result<String>;
}

/// Leaves markup untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughMinifier;

impl MarkupMinifier for PassThroughMinifier {
    fn minify(&self, html: &str) -> anyhow::Result<String> {
        Ok(html.to_string())
    }
}

/// The full set of collaborators used by a [`Compiler`](crate::build::Compiler).
#[derive(Clone)]
pub struct Toolchain {
    pub parser: Arc<dyn ScriptParser>,
    pub mapper: Arc<dyn ScriptMapper>,
    pub templates: Arc<dyn TemplateEngine>,
    pub stylesheets: Arc<dyn StylesheetCompiler>,
    pub svg_optimizer: Arc<dyn SvgOptimizer>,
    pub markup_minifier: Arc<dyn MarkupMinifier>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}
