//! Stub collaborators shared by the integration tests.
//!
//! The script "parser" reads JSON, the mapper deserializes it into a
//! `MapScript`, the stylesheet compiler passes text through, and a compiled
//! template prints its own source followed by the render context as JSON.
//! Every stub counts its calls.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use skitscript_web::model::{Interaction, MapCharacter, MapScript, MapState, Presence, Run};
use skitscript_web::toolchain::{
    CompiledTemplate, PassThroughMinifier, ScriptMapper, ScriptParser, StylesheetCompiler,
    SvgOptimizer, SyntaxTree, TemplateEngine,
};
use skitscript_web::{
    BuildOptions, Diagnostic, MemoryFileSystem, SourceLayout, SourcePath, Toolchain,
};

pub const TEMPLATE: &str = "<!-- page -->";
pub const STYLESHEET: &str = "=state\n  display: none";

#[derive(Debug, Default)]
pub struct Calls {
    pub parse: AtomicUsize,
    pub map: AtomicUsize,
    pub template_compile: AtomicUsize,
    pub render: AtomicUsize,
    pub stylesheet: AtomicUsize,
    pub optimize: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct JsonParser(Arc<Calls>);

impl ScriptParser for JsonParser {
    fn parse(&self, source: &str) -> Result<SyntaxTree, Vec<Diagnostic>> {
        self.0.parse.fetch_add(1, Ordering::SeqCst);
        serde_json::from_str(source).map_err(|e| vec![Diagnostic::error(e.to_string())])
    }
}

struct JsonMapper(Arc<Calls>);

impl ScriptMapper for JsonMapper {
    fn map(&self, tree: SyntaxTree) -> Result<MapScript, Vec<Diagnostic>> {
        self.0.map.fetch_add(1, Ordering::SeqCst);
        serde_json::from_value(tree).map_err(|e| vec![Diagnostic::error(e.to_string())])
    }
}

struct EchoTemplates(Arc<Calls>);

impl TemplateEngine for EchoTemplates {
    fn compile(&self, source: &str) -> anyhow::Result<Arc<dyn CompiledTemplate>> {
        self.0.template_compile.fetch_add(1, Ordering::SeqCst);
        if source.contains("{{broken") {
            anyhow::bail!("unterminated tag");
        }
        Ok(Arc::new(EchoTemplate {
            prefix: source.to_string(),
            calls: Arc::clone(&self.0),
        }))
    }
}

struct EchoTemplate {
    prefix: String,
    calls: Arc<Calls>,
}

impl CompiledTemplate for EchoTemplate {
    fn render(&self, context: &serde_json::Value) -> anyhow::Result<String> {
        self.calls.render.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}{}", self.prefix, context))
    }
}

struct PassThroughStylesheets(Arc<Calls>);

impl StylesheetCompiler for PassThroughStylesheets {
    fn compile(&self, source: &str) -> anyhow::Result<String> {
        self.0.stylesheet.fetch_add(1, Ordering::SeqCst);
        Ok(source.to_string())
    }
}

struct CountingOptimizer(Arc<Calls>);

impl SvgOptimizer for CountingOptimizer {
    fn optimize(&self, svg: &str) -> anyhow::Result<String> {
        self.0.optimize.fetch_add(1, Ordering::SeqCst);
        Ok(svg.to_string())
    }
}

/// Routes build logs through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn toolchain(calls: &Arc<Calls>) -> Toolchain {
    init_tracing();
    Toolchain {
        parser: Arc::new(JsonParser(Arc::clone(calls))),
        mapper: Arc::new(JsonMapper(Arc::clone(calls))),
        templates: Arc::new(EchoTemplates(Arc::clone(calls))),
        stylesheets: Arc::new(PassThroughStylesheets(Arc::clone(calls))),
        svg_optimizer: Arc::new(CountingOptimizer(Arc::clone(calls))),
        markup_minifier: Arc::new(PassThroughMinifier),
    }
}

/// The stub stylesheet compiler does not produce real CSS.
pub fn options() -> BuildOptions {
    BuildOptions {
        minify_css: false,
        ..Default::default()
    }
}

pub fn layout() -> SourceLayout {
    SourceLayout::default()
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

pub fn text(plain: &str) -> Vec<Run> {
    vec![Run::plain(plain)]
}

pub fn one_state_script() -> MapScript {
    MapScript {
        states: vec![MapState {
            background: None,
            characters: vec![],
            speakers: vec![],
            line: Some(text("Hello")),
            interaction: Interaction::Dismiss { state_index: 0 },
        }],
        characters: vec![],
    }
}

/// Two states on the beach; Ann enters in the first and stays.
pub fn beach_script() -> MapScript {
    MapScript {
        states: vec![
            MapState {
                background: Some("beach".into()),
                characters: vec![Presence::Entering {
                    animation: "fade".into(),
                    emote: "happy".into(),
                }],
                speakers: vec!["ann".into()],
                line: Some(text("Hi!")),
                interaction: Interaction::Dismiss { state_index: 1 },
            },
            MapState {
                background: Some("beach".into()),
                characters: vec![Presence::Present {
                    emote: "happy".into(),
                }],
                speakers: vec![],
                line: None,
                interaction: Interaction::Dismiss { state_index: 0 },
            },
        ],
        characters: vec![MapCharacter {
            normalized: "ann".into(),
            verbatim: "Ann".into(),
        }],
    }
}

pub fn svg(body: &str) -> String {
    format!(r#"<svg viewBox="0 0 10 10">{}</svg>"#, body)
}

/// A file system holding every source `script` needs.
pub fn seeded(script: &MapScript) -> MemoryFileSystem {
    let fs = MemoryFileSystem::new();
    let layout = layout();
    fs.insert(layout.script, script_source(script));
    fs.insert(layout.template, TEMPLATE);
    fs.insert(layout.stylesheet, STYLESHEET);
    fs.insert(SourcePath::background("beach"), svg("<rect/>"));
    fs.insert(SourcePath::emote("ann", "happy"), svg("<circle/>"));
    fs
}

pub fn script_source(script: &MapScript) -> String {
    serde_json::to_string(script).unwrap()
}

/// The render context a page was produced from.
pub fn page_context(page: &str) -> serde_json::Value {
    let json = page
        .strip_prefix(TEMPLATE)
        .expect("page starts with the template source");
    serde_json::from_str(json).unwrap()
}
