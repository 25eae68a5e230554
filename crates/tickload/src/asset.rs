//! Asset identity types

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Logical asset path, the sole cache key
pub type AssetPath = String;

/// A decoded asset as stored in the cache
pub type ErasedAsset = Arc<dyn Any + Send + Sync>;

/// Tag selecting which loader handles a request and what shape of object it yields
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetType(&'static str);

impl AssetType {
    /// Create a new asset type tag
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Get the tag name
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Lower-cased file extension of a path, if any
pub fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit(|c: char| c == '/' || c == '\\').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
