//! Build state kept between recompiles.
//!
//! The compiler owns exactly one [`BuildState`]. It is only replaced piecewise
//! by [`BuildState::commit`] at the end of a successful recompile, so readers
//! always see a consistent set of artifacts.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::path::SourcePath;
use crate::svg::Svg;
use crate::toolchain::CompiledTemplate;
use crate::transpile::Transpiled;
use crate::utils::SvgLookup;

/// Thread-safe cache of loaded SVGs keyed by path.
///
/// Clones share storage, so concurrent loaders can each hold one and insert
/// their result. Entries are found by path, never by position.
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    inner: Arc<DashMap<SourcePath, Arc<Svg>>>,
}

impl AssetCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the SVG for a path. Returns the old value if any.
    pub fn insert(&self, path: SourcePath, svg: Arc<Svg>) -> Option<Arc<Svg>> {
        self.inner.insert(path, svg)
    }

    pub fn get(&self, path: &SourcePath) -> Option<Arc<Svg>> {
        self.inner.get(path).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, path: &SourcePath) -> bool {
        self.inner.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&SourcePath) -> bool) {
        self.inner.retain(|path, _| keep(path));
    }

    /// Move every entry of `other` into this cache.
    pub fn absorb(&self, other: AssetCache) {
        for entry in other.inner.iter() {
            self.inner
                .insert(entry.key().clone(), Arc::clone(entry.value()));
        }
    }
}

/// Everything derived from the sources by the last successful build.
#[derive(Default)]
pub(crate) struct BuildState {
    pub(crate) transpiled: Option<Arc<Transpiled>>,
    pub(crate) template: Option<Arc<dyn CompiledTemplate>>,
    pub(crate) stylesheet: Option<Arc<str>>,
    pub(crate) css: Option<Arc<str>>,
    pub(crate) assets: AssetCache,
}

/// Artifacts recomputed by one recompile, not yet visible.
#[derive(Default)]
pub(crate) struct Staged {
    pub(crate) transpiled: Option<Arc<Transpiled>>,
    pub(crate) template: Option<Arc<dyn CompiledTemplate>>,
    pub(crate) stylesheet: Option<Arc<str>>,
    pub(crate) css: Option<Arc<str>>,
    pub(crate) assets: AssetCache,
}

impl BuildState {
    /// Swap staged artifacts in.
    ///
    /// Cached SVGs at a `changed` path are dropped unless they were reloaded,
    /// and SVGs the current script no longer references are pruned.
    pub(crate) fn commit(&mut self, staged: Staged, changed: &HashSet<&SourcePath>) {
        if let Some(transpiled) = staged.transpiled {
            self.transpiled = Some(transpiled);
        }
        if let Some(template) = staged.template {
            self.template = Some(template);
        }
        if let Some(stylesheet) = staged.stylesheet {
            self.stylesheet = Some(stylesheet);
        }
        if let Some(css) = staged.css {
            self.css = Some(css);
        }

        let referenced: HashSet<&SourcePath> = self
            .transpiled
            .as_ref()
            .map(|t| t.asset_paths.iter().collect())
            .unwrap_or_default();
        let before = self.assets.len();
        self.assets
            .retain(|path| referenced.contains(path) && !changed.contains(path));
        tracing::debug!(pruned = before - self.assets.len(), "asset cache reconciled");

        self.assets.absorb(staged.assets);
    }
}

/// Reads staged SVGs first, then committed ones that are still valid.
pub(crate) struct AssetView<'a> {
    pub(crate) staged: &'a AssetCache,
    pub(crate) committed: &'a AssetCache,
    pub(crate) changed: &'a HashSet<&'a SourcePath>,
}

impl SvgLookup for AssetView<'_> {
    fn svg(&self, path: &SourcePath) -> Option<Arc<Svg>> {
        self.staged.get(path).or_else(|| {
            if self.changed.contains(path) {
                None
            } else {
                self.committed.get(path)
            }
        })
    }
}
