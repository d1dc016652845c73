//! Incremental rebuild behavior of `Compiler::recompile`.
//!
//! Every test runs against a `MemoryFileSystem` and counting stub
//! collaborators, so "was this recomputed" is observable.

mod common;

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{beach_script, layout, options, page_context, seeded, svg, toolchain, Calls};
use skitscript_web::{
    CompileError, Compiler, FileSystem, MemoryFileSystem, SourcePath, SourceStage, TemplateStage,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn compiled_beach() -> (Compiler<MemoryFileSystem>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let fs = seeded(&beach_script());
    let compiler = Compiler::compile(fs, toolchain(&calls), options())
        .await
        .expect("first build succeeds");
    (compiler, calls)
}

fn page(compiler: &Compiler<MemoryFileSystem>) -> String {
    compiler
        .file_system()
        .get(&layout().page)
        .expect("page has been written")
}

// ===========================================================================
// First build
// ===========================================================================

#[tokio::test]
async fn first_build_runs_every_stage_once() {
    let (compiler, calls) = compiled_beach().await;

    assert_eq!(Calls::get(&calls.parse), 1);
    assert_eq!(Calls::get(&calls.map), 1);
    assert_eq!(Calls::get(&calls.template_compile), 1);
    assert_eq!(Calls::get(&calls.stylesheet), 1);
    assert_eq!(Calls::get(&calls.render), 1);
    assert_eq!(Calls::get(&calls.optimize), 2);
    assert_eq!(compiler.file_system().writes(), 1);
}

#[tokio::test]
async fn first_build_inlines_every_svg() {
    let (compiler, _) = compiled_beach().await;
    let context = page_context(&page(&compiler));

    let background = &context["backgrounds"][0];
    assert_eq!(background["content"], "<rect/>");
    assert_eq!(background["attributes"]["viewBox"], "0 0 10 10");

    let emote = &context["characters"][0]["emotes"][0];
    assert_eq!(emote["content"], "<circle/>");
    assert!(context["css"].as_str().unwrap().starts_with(common::STYLESHEET));
}

#[tokio::test]
async fn first_build_fails_on_missing_svg() {
    let calls = Arc::new(Calls::default());
    let fs = seeded(&beach_script());
    fs.remove(&SourcePath::emote("ann", "happy"));

    let err = Compiler::compile(fs.clone(), toolchain(&calls), options())
        .await
        .unwrap_err();

    match err {
        CompileError::Asset { path, .. } => assert_eq!(path, SourcePath::emote("ann", "happy")),
        other => panic!("expected an asset error, got {other}"),
    }
    assert_eq!(fs.writes(), 0);
}

// ===========================================================================
// No-op
// ===========================================================================

#[tokio::test]
async fn empty_change_set_is_a_no_op() {
    let (compiler, calls) = compiled_beach().await;

    compiler.recompile(&[]).await.unwrap();

    assert_eq!(Calls::get(&calls.parse), 1);
    assert_eq!(Calls::get(&calls.stylesheet), 1);
    assert_eq!(Calls::get(&calls.render), 1);
    assert_eq!(Calls::get(&calls.optimize), 2);
    assert_eq!(compiler.file_system().writes(), 1);
}

#[tokio::test]
async fn untracked_path_is_a_no_op() {
    let (compiler, calls) = compiled_beach().await;

    compiler
        .recompile(&[SourcePath::from(["README.md"])])
        .await
        .unwrap();

    assert_eq!(Calls::get(&calls.render), 1);
    assert_eq!(compiler.file_system().writes(), 1);
}

#[tokio::test]
async fn unreferenced_svg_change_does_not_rewrite() {
    let (compiler, calls) = compiled_beach().await;
    let unused = SourcePath::background("forest");
    compiler.file_system().insert(unused.clone(), svg("<g/>"));

    compiler.recompile(&[unused.clone()]).await.unwrap();

    assert_eq!(compiler.file_system().reads_of(&unused), 0);
    assert_eq!(Calls::get(&calls.optimize), 2);
    assert_eq!(compiler.file_system().writes(), 1);
}

// ===========================================================================
// Selective invalidation
// ===========================================================================

#[tokio::test]
async fn stylesheet_change_recompiles_css_only() {
    let (compiler, calls) = compiled_beach().await;
    let fs = compiler.file_system().clone();
    fs.insert(layout().stylesheet, "=state\n  display: block");

    compiler.recompile(&[layout().stylesheet]).await.unwrap();

    assert_eq!(Calls::get(&calls.parse), 1);
    assert_eq!(Calls::get(&calls.map), 1);
    assert_eq!(Calls::get(&calls.template_compile), 1);
    assert_eq!(Calls::get(&calls.optimize), 2);
    assert_eq!(Calls::get(&calls.stylesheet), 2);
    assert_eq!(fs.writes(), 2);

    let context = page_context(&page(&compiler));
    assert!(context["css"]
        .as_str()
        .unwrap()
        .starts_with("=state\n  display: block"));
}

#[tokio::test]
async fn template_change_recompiles_template_only() {
    let (compiler, calls) = compiled_beach().await;
    compiler
        .file_system()
        .insert(layout().template, common::TEMPLATE);

    compiler.recompile(&[layout().template]).await.unwrap();

    assert_eq!(Calls::get(&calls.template_compile), 2);
    assert_eq!(Calls::get(&calls.parse), 1);
    assert_eq!(Calls::get(&calls.stylesheet), 1);
    assert_eq!(Calls::get(&calls.optimize), 2);
    assert_eq!(compiler.file_system().writes(), 2);
}

#[tokio::test]
async fn script_change_loads_only_new_svgs() {
    let (compiler, calls) = compiled_beach().await;
    let fs = compiler.file_system().clone();

    let mut script = beach_script();
    script.states[1].background = Some("forest".into());
    fs.insert(SourcePath::background("forest"), svg("<g/>"));
    fs.insert(layout().script, common::script_source(&script));

    compiler.recompile(&[layout().script]).await.unwrap();

    assert_eq!(Calls::get(&calls.parse), 2);
    assert_eq!(Calls::get(&calls.stylesheet), 2);
    assert_eq!(Calls::get(&calls.optimize), 3);
    assert_eq!(fs.reads_of(&SourcePath::background("beach")), 1);
    assert_eq!(fs.reads_of(&SourcePath::background("forest")), 1);

    let context = page_context(&page(&compiler));
    assert_eq!(context["backgrounds"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn referenced_svg_change_reloads_only_that_svg() {
    let (compiler, calls) = compiled_beach().await;
    let fs = compiler.file_system().clone();
    let beach = SourcePath::background("beach");
    fs.insert(beach.clone(), svg("<rect width=\"2\"/>"));

    compiler.recompile(&[beach.clone()]).await.unwrap();

    assert_eq!(fs.reads_of(&beach), 2);
    assert_eq!(fs.reads_of(&SourcePath::emote("ann", "happy")), 1);
    assert_eq!(Calls::get(&calls.parse), 1);
    assert_eq!(Calls::get(&calls.stylesheet), 1);
    assert_eq!(fs.writes(), 2);

    let context = page_context(&page(&compiler));
    assert_eq!(context["backgrounds"][0]["content"], "<rect width=\"2\"/>");
    assert_eq!(context["characters"][0]["emotes"][0]["content"], "<circle/>");
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn parse_failure_keeps_previous_page() {
    let (compiler, _) = compiled_beach().await;
    let fs = compiler.file_system().clone();
    let before = page(&compiler);
    fs.insert(layout().script, "{ not json");

    let err = compiler.recompile(&[layout().script]).await.unwrap_err();

    match err {
        CompileError::Source { stage, diagnostics } => {
            assert_eq!(stage, SourceStage::Parse);
            assert_eq!(diagnostics.len(), 1);
        }
        other => panic!("expected a source error, got {other}"),
    }
    assert_eq!(page(&compiler), before);
    assert_eq!(fs.writes(), 1);
}

#[tokio::test]
async fn mapping_failure_names_the_stage() {
    let (compiler, _) = compiled_beach().await;
    compiler
        .file_system()
        .insert(layout().script, r#"{ "states": "nope" }"#);

    let err = compiler.recompile(&[layout().script]).await.unwrap_err();

    assert!(matches!(
        err,
        CompileError::Source {
            stage: SourceStage::Mapping,
            ..
        }
    ));
}

#[tokio::test]
async fn failed_recompile_leaves_build_state_intact() {
    let (compiler, calls) = compiled_beach().await;
    let fs = compiler.file_system().clone();
    let before = page(&compiler);

    // The template breaks while the stylesheet changes: nothing is committed.
    fs.insert(layout().template, "{{broken");
    fs.insert(layout().stylesheet, "=state\n  color: red");
    let err = compiler
        .recompile(&[layout().template, layout().stylesheet])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Template {
            stage: TemplateStage::Compile,
            ..
        }
    ));
    assert_eq!(page(&compiler), before);

    // An empty recompile still has everything it needs and changes nothing.
    compiler.recompile(&[]).await.unwrap();
    assert_eq!(fs.writes(), 1);

    // Fixing the template alone renders with the old stylesheet.
    fs.insert(layout().template, common::TEMPLATE);
    compiler.recompile(&[layout().template]).await.unwrap();
    let context = page_context(&page(&compiler));
    assert!(context["css"]
        .as_str()
        .unwrap()
        .starts_with(common::STYLESHEET));
    assert_eq!(Calls::get(&calls.parse), 1);
}

#[tokio::test]
async fn failed_svg_reload_keeps_cached_copy_usable() {
    let (compiler, _) = compiled_beach().await;
    let fs = compiler.file_system().clone();
    let beach = SourcePath::background("beach");
    let before = page(&compiler);

    fs.insert(beach.clone(), "<!-- not an svg -->");
    let err = compiler.recompile(&[beach.clone()]).await.unwrap_err();
    assert!(matches!(err, CompileError::Asset { .. }));
    assert_eq!(page(&compiler), before);

    fs.insert(layout().stylesheet, common::STYLESHEET);
    compiler.recompile(&[layout().stylesheet]).await.unwrap();
    let context = page_context(&page(&compiler));
    assert_eq!(context["backgrounds"][0]["content"], "<rect/>");
}

/// Tracks how many builds sit between their stylesheet read and their page
/// write at the same time.
#[derive(Clone, Default)]
struct OverlapFileSystem {
    inner: MemoryFileSystem,
    in_flight: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
}

impl FileSystem for OverlapFileSystem {
    fn read_utf8(&self, path: &SourcePath) -> impl Future<Output = io::Result<String>> + Send {
        let this = self.clone();
        let path = path.clone();
        async move {
            if path == layout().stylesheet {
                let now = this.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                this.max_seen.fetch_max(now, Ordering::SeqCst);
                for _ in 0..16 {
                    tokio::task::yield_now().await;
                }
            }
            this.inner.read_utf8(&path).await
        }
    }

    fn read_binary(&self, path: &SourcePath) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let inner = self.inner.clone();
        let path = path.clone();
        async move { inner.read_binary(&path).await }
    }

    fn write_utf8(
        &self,
        path: &SourcePath,
        text: String,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let this = self.clone();
        let path = path.clone();
        async move {
            this.inner.write_utf8(&path, text).await?;
            if path == layout().page {
                this.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recompiles_never_overlap() {
    let calls = Arc::new(Calls::default());
    let fs = OverlapFileSystem {
        inner: seeded(&beach_script()),
        ..Default::default()
    };
    let compiler = Arc::new(
        Compiler::compile(fs.clone(), toolchain(&calls), options())
            .await
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let compiler = Arc::clone(&compiler);
            tokio::spawn(async move { compiler.recompile(&[layout().stylesheet]).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fs.max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(fs.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(Calls::get(&calls.stylesheet), 9);
    assert_eq!(fs.inner.writes(), 9);
}
