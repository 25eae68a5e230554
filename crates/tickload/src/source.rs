//! Sources - openable/closable byte providers for one asset path
//!
//! A source is opened right before its loader runs and closed right after,
//! whatever the outcome. [`LoadContext`](crate::loader::LoadContext) owns that
//! scope; loaders never open or close sources themselves.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};

/// Byte provider for a single asset
pub trait Source: Send + Sync {
    /// Acquire the underlying resource
    fn open(&mut self) -> LoadResult<()>;

    /// Stream over the asset bytes. Only valid while open.
    fn stream(&mut self) -> LoadResult<&mut dyn Read>;

    /// Release the underlying resource. Must tolerate being called when not open.
    fn close(&mut self);

    /// Whether the source is currently open
    fn is_open(&self) -> bool;

    /// Human readable description for logs
    fn describe(&self) -> String {
        "<source>".to_string()
    }
}

/// Source backed by a file on disk
pub struct FileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileSource {
    /// Create a new file source
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn open(&mut self) -> LoadResult<()> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(self.path.display().to_string()),
            _ => LoadError::Io(format!("{}: {}", self.path.display(), e)),
        })?;
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn stream(&mut self) -> LoadResult<&mut dyn Read> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader),
            None => Err(LoadError::Source(format!(
                "{} is not open",
                self.path.display()
            ))),
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Source over bytes already in memory
pub struct MemorySource {
    data: Arc<[u8]>,
    cursor: Option<Cursor<Arc<[u8]>>>,
}

impl MemorySource {
    /// Create a new memory source
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            cursor: None,
        }
    }

    /// Create from a string
    pub fn from_text(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl Source for MemorySource {
    fn open(&mut self) -> LoadResult<()> {
        self.cursor = Some(Cursor::new(self.data.clone()));
        Ok(())
    }

    fn stream(&mut self) -> LoadResult<&mut dyn Read> {
        match self.cursor.as_mut() {
            Some(cursor) => Ok(cursor),
            None => Err(LoadError::Source("memory source is not open".into())),
        }
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    fn describe(&self) -> String {
        format!("memory:{} bytes", self.data.len())
    }
}

/// Open scope over a source; closes it exactly once when dropped
pub(crate) struct SourceScope<'a> {
    source: &'a mut dyn Source,
}

impl<'a> SourceScope<'a> {
    /// Open the source. A failed open still closes it before returning.
    pub(crate) fn open(source: &'a mut dyn Source) -> LoadResult<Self> {
        if let Err(e) = source.open() {
            source.close();
            return Err(e);
        }
        Ok(Self { source })
    }

    pub(crate) fn source(&mut self) -> &mut dyn Source {
        &mut *self.source
    }
}

impl Drop for SourceScope<'_> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Mints sources for the parts of a compound asset
pub trait SourceFactory: Send + Sync {
    /// Create a source for one part path
    fn create(&self, part_path: &str) -> Box<dyn Source>;
}

impl<F> SourceFactory for F
where
    F: Fn(&str) -> Box<dyn Source> + Send + Sync,
{
    fn create(&self, part_path: &str) -> Box<dyn Source> {
        self(part_path)
    }
}

/// Resolves part paths to files under a root directory
#[derive(Debug, Clone)]
pub struct DirSourceFactory {
    root: PathBuf,
}

impl DirSourceFactory {
    /// Create a factory rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full path for an asset path
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl SourceFactory for DirSourceFactory {
    fn create(&self, part_path: &str) -> Box<dyn Source> {
        Box::new(FileSource::new(self.resolve(part_path)))
    }
}
