//! File system abstraction.
//!
//! The compiler reads sources and writes the page through [`FileSystem`] so it
//! can run against a real directory ([`DiskFileSystem`]) or entirely in memory
//! ([`MemoryFileSystem`]), e.g. behind a dev server.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::path::SourcePath;

/// Path-addressed storage for sources and build artifacts.
///
/// Implementations must tolerate any number of concurrent calls.
pub trait FileSystem: Send + Sync + 'static {
    fn read_utf8(&self, path: &SourcePath) -> impl Future<Output = io::Result<String>> + Send;

    fn read_binary(&self, path: &SourcePath) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    fn write_utf8(
        &self,
        path: &SourcePath,
        text: String,
    ) -> impl Future<Output = io::Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// Disk
// ---------------------------------------------------------------------------

/// Reads and writes below a root directory using `tokio::fs`.
#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    root: PathBuf,
}

impl DiskFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &SourcePath) -> PathBuf {
        let mut resolved = self.root.clone();
        resolved.extend(path.segments());
        resolved
    }
}

impl FileSystem for DiskFileSystem {
    fn read_utf8(&self, path: &SourcePath) -> impl Future<Output = io::Result<String>> + Send {
        let resolved = self.resolve(path);
        async move { tokio::fs::read_to_string(resolved).await }
    }

    fn read_binary(&self, path: &SourcePath) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let resolved = self.resolve(path);
        async move { tokio::fs::read(resolved).await }
    }

    fn write_utf8(
        &self,
        path: &SourcePath,
        text: String,
    ) -> impl Future<Output = io::Result<()>> + Send {
        let resolved = self.resolve(path);
        async move {
            if let Some(parent) = resolved.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(resolved, text).await
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Thread-safe in-memory file system.
///
/// Clones share storage. Reads and writes are counted per path, which is what
/// the incremental build tests observe.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<DashMap<SourcePath, Vec<u8>>>,
    reads: Arc<DashMap<SourcePath, usize>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a file.
    pub fn insert(&self, path: impl Into<SourcePath>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into().into_bytes());
    }

    pub fn remove(&self, path: &SourcePath) -> bool {
        self.files.remove(path).is_some()
    }

    /// Current contents of a file, if it exists and is UTF-8.
    pub fn get(&self, path: &SourcePath) -> Option<String> {
        self.files
            .get(path)
            .and_then(|entry| String::from_utf8(entry.value().clone()).ok())
    }

    /// How many times `path` has been read.
    pub fn reads_of(&self, path: &SourcePath) -> usize {
        self.reads.get(path).map_or(0, |entry| *entry.value())
    }

    /// How many writes have happened in total.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn fetch(&self, path: &SourcePath) -> io::Result<Vec<u8>> {
        *self.reads.entry(path.clone()).or_insert(0) += 1;
        self.files
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("File not found: {}", path))
            })
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_utf8(&self, path: &SourcePath) -> impl Future<Output = io::Result<String>> + Send {
        let result = self.fetch(path).and_then(|bytes| {
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        });
        async move { result }
    }

    fn read_binary(&self, path: &SourcePath) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        let result = self.fetch(path);
        async move { result }
    }

    fn write_utf8(
        &self,
        path: &SourcePath,
        text: String,
    ) -> impl Future<Output = io::Result<()>> + Send {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files.insert(path.clone(), text.into_bytes());
        async { Ok(()) }
    }
}
