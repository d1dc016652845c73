//! Incremental build orchestration.
//!
//! A [`Compiler`] owns the artifacts derived from one document's sources and
//! rebuilds only what a set of changed paths invalidates:
//!
//! | changed            | recomputed                                   |
//! |--------------------|----------------------------------------------|
//! | script             | transpiled data, CSS, newly referenced SVGs  |
//! | stylesheet         | CSS                                          |
//! | template           | compiled template                            |
//! | referenced asset   | that SVG                                     |
//!
//! Recomputed artifacts are staged and only committed once the page has been
//! written. A failed recompile leaves the build state and the page exactly as
//! they were.

pub mod cache;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::path::SourcePath;
use crate::svg;
use crate::toolchain::{CompiledTemplate, Toolchain};
use crate::transpile::{transpile, Transpiled};
use crate::utils;
use crate::web::PageContext;
use crate::{BuildOptions, CompileError, IoDirection, SourceLayout, SourceStage, TemplateStage};

use self::cache::{AssetCache, AssetView, BuildState, Staged};

/// Compiles one document into one page and keeps it up to date.
///
/// Calls to [`recompile`](Compiler::recompile) are queued behind a lock and
/// run one at a time in arrival order.
pub struct Compiler<F: FileSystem> {
    fs: Arc<F>,
    toolchain: Toolchain,
    options: BuildOptions,
    state: Mutex<BuildState>,
}

/// Which tracked inputs a set of changed paths touches.
struct ChangeSet<'a> {
    script: bool,
    template: bool,
    stylesheet: bool,
    paths: HashSet<&'a SourcePath>,
}

impl<'a> ChangeSet<'a> {
    fn classify(changes: &'a [SourcePath], layout: &SourceLayout) -> Self {
        let paths: HashSet<&SourcePath> = changes.iter().collect();
        Self {
            script: paths.contains(&layout.script),
            template: paths.contains(&layout.template),
            stylesheet: paths.contains(&layout.stylesheet),
            paths,
        }
    }
}

impl<F: FileSystem> Compiler<F> {
    /// Runs the first full build and returns a compiler ready for
    /// incremental rebuilds.
    pub async fn compile(
        fs: F,
        toolchain: Toolchain,
        options: BuildOptions,
    ) -> Result<Self, CompileError> {
        let initial = [
            options.layout.script.clone(),
            options.layout.template.clone(),
            options.layout.stylesheet.clone(),
        ];
        let compiler = Self {
            fs: Arc::new(fs),
            toolchain,
            options,
            state: Mutex::new(BuildState::default()),
        };
        compiler.recompile(&initial).await?;
        Ok(compiler)
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Rebuilds whatever `changes` invalidates and rewrites the page if
    /// anything observable changed.
    #[tracing::instrument(skip_all, fields(changes = changes.len()))]
    pub async fn recompile(&self, changes: &[SourcePath]) -> Result<(), CompileError> {
        let mut state = self.state.lock().await;
        let changed = ChangeSet::classify(changes, &self.options.layout);
        debug!(
            script = changed.script,
            template = changed.template,
            stylesheet = changed.stylesheet,
            "classified changes"
        );

        let current: &BuildState = &state;
        let (mut staged, template) = tokio::try_join!(
            self.stage_sources(current, &changed),
            self.stage_template(changed.template),
        )?;
        staged.template = template;

        let loaded = staged.assets.len();
        if !(changed.script || changed.template || changed.stylesheet || loaded > 0) {
            info!("no observable change, page left untouched");
            return Ok(());
        }

        self.write_page(current, &staged, &changed.paths).await?;
        state.commit(staged, &changed.paths);
        Ok(())
    }

    /// Script pipeline and stylesheet read, then CSS, then missing SVGs.
    async fn stage_sources(
        &self,
        current: &BuildState,
        changed: &ChangeSet<'_>,
    ) -> Result<Staged, CompileError> {
        let layout = &self.options.layout;
        let (transpiled, stylesheet) = tokio::try_join!(
            async {
                if changed.script {
                    self.load_script().await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if changed.stylesheet {
                    self.read(&layout.stylesheet).await.map(|s| Some(Arc::<str>::from(s)))
                } else {
                    Ok(None)
                }
            },
        )?;

        let script = transpiled
            .as_ref()
            .or(current.transpiled.as_ref())
            .ok_or(CompileError::MissingArtifact("a transpiled script"))?;

        let css = if changed.script || changed.stylesheet {
            let source: &str = stylesheet
                .as_deref()
                .or(current.stylesheet.as_deref())
                .ok_or(CompileError::MissingArtifact("stylesheet text"))?;
            Some(self.compile_css(source, &script.css_fragment)?)
        } else {
            None
        };

        let assets = self
            .load_assets(&script.asset_paths, &current.assets, &changed.paths)
            .await?;

        Ok(Staged {
            transpiled,
            template: None,
            stylesheet,
            css,
            assets,
        })
    }

    async fn stage_template(
        &self,
        changed: bool,
    ) -> Result<Option<Arc<dyn CompiledTemplate>>, CompileError> {
        if !changed {
            return Ok(None);
        }
        let source = self.read(&self.options.layout.template).await?;
        let template = self
            .toolchain
            .templates
            .compile(&source)
            .map_err(|source| CompileError::Template {
                stage: TemplateStage::Compile,
                source,
            })?;
        debug!("template compiled");
        Ok(Some(template))
    }

    async fn load_script(&self) -> Result<Arc<Transpiled>, CompileError> {
        let source = self.read(&self.options.layout.script).await?;
        let tree = self
            .toolchain
            .parser
            .parse(&source)
            .map_err(|diagnostics| CompileError::Source {
                stage: SourceStage::Parse,
                diagnostics,
            })?;
        let script = self
            .toolchain
            .mapper
            .map(tree)
            .map_err(|diagnostics| CompileError::Source {
                stage: SourceStage::Mapping,
                diagnostics,
            })?;
        let transpiled = transpile(&script)?;
        debug!(
            states = transpiled.data.states.len(),
            assets = transpiled.asset_paths.len(),
            "script transpiled"
        );
        Ok(Arc::new(transpiled))
    }

    fn compile_css(&self, stylesheet: &str, fragment: &str) -> Result<Arc<str>, CompileError> {
        let css = self
            .toolchain
            .stylesheets
            .compile(&utils::stylesheet_source(stylesheet, fragment))
            .map_err(CompileError::Stylesheet)?;
        let css = if self.options.minify_css {
            utils::minify_css(&css)?
        } else {
            css
        };
        debug!(bytes = css.len(), "css compiled");
        Ok(Arc::from(css))
    }

    /// Loads every referenced SVG that is not cached, or whose path changed,
    /// into a fresh staging cache. One task per path.
    async fn load_assets(
        &self,
        referenced: &[SourcePath],
        cached: &AssetCache,
        changed: &HashSet<&SourcePath>,
    ) -> Result<AssetCache, CompileError> {
        let staging = AssetCache::new();
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        for path in referenced {
            if !seen.insert(path) || (cached.contains(path) && !changed.contains(path)) {
                continue;
            }
            let fs = Arc::clone(&self.fs);
            let optimizer = Arc::clone(&self.toolchain.svg_optimizer);
            let staging = staging.clone();
            let path = path.clone();
            tasks.spawn(async move {
                match svg::load_svg(&*fs, &*optimizer, &path).await {
                    Ok(svg) => {
                        staging.insert(path, Arc::new(svg));
                        Ok(())
                    }
                    Err(source) => Err(CompileError::Asset { path, source }),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| CompileError::Task(e.to_string()))??;
        }

        if !staging.is_empty() {
            debug!(loaded = staging.len(), "svgs loaded");
        }
        Ok(staging)
    }

    async fn write_page(
        &self,
        current: &BuildState,
        staged: &Staged,
        changed: &HashSet<&SourcePath>,
    ) -> Result<(), CompileError> {
        let script = staged
            .transpiled
            .as_ref()
            .or(current.transpiled.as_ref())
            .ok_or(CompileError::MissingArtifact("a transpiled script"))?;
        let css = staged
            .css
            .as_deref()
            .or(current.css.as_deref())
            .ok_or(CompileError::MissingArtifact("compiled css"))?;
        let template = staged
            .template
            .as_ref()
            .or(current.template.as_ref())
            .ok_or(CompileError::MissingArtifact("a compiled template"))?;

        let view = AssetView {
            staged: &staged.assets,
            committed: &current.assets,
            changed,
        };
        let (backgrounds, characters) = utils::render_graphics(&script.data, &view)?;
        let context = serde_json::to_value(PageContext {
            css,
            states: &script.data.states,
            backgrounds,
            characters,
        })?;

        let html = template
            .render(&context)
            .map_err(|source| CompileError::Template {
                stage: TemplateStage::Render,
                source,
            })?;
        let page = self
            .toolchain
            .markup_minifier
            .minify(&html)
            .map_err(CompileError::Markup)?;

        let path = &self.options.layout.page;
        let bytes = page.len();
        self.fs
            .write_utf8(path, page)
            .await
            .map_err(|source| CompileError::Io {
                path: path.clone(),
                direction: IoDirection::Write,
                source,
            })?;
        info!(path = %path, bytes, "page written");
        Ok(())
    }

    async fn read(&self, path: &SourcePath) -> Result<String, CompileError> {
        self.fs
            .read_utf8(path)
            .await
            .map_err(|source| CompileError::Io {
                path: path.clone(),
                direction: IoDirection::Read,
                source,
            })
    }
}

impl<F: FileSystem> std::fmt::Debug for Compiler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
