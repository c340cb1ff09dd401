//! Host-supplied named byte stores backing the file bridge.

use crate::error::{PetalSonicError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Readable, seekable stream opened from a [`ByteStore`].
pub trait ByteStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteStream for T {}

/// Named-resource read capability the host hands to the bridge.
pub trait ByteStore: Send + Sync {
    /// Size in bytes of the resource at `path`.
    fn size(&self, path: &str) -> Result<u64>;

    /// Opens the resource at `path` for reading from its first byte.
    fn open_read(&self, path: &str) -> Result<Box<dyn ByteStream>>;
}

fn not_found(path: &str) -> PetalSonicError {
    PetalSonicError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no resource named '{}'", path),
    ))
}

/// Store serving files below a root directory.
///
/// Paths are relative to the root. Absolute paths and `..` components are
/// rejected so lookups never escape it.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(PetalSonicError::InvalidArgument(format!(
                "path '{}' is not relative to the store root",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ByteStore for FsByteStore {
    fn size(&self, path: &str) -> Result<u64> {
        let metadata = std::fs::metadata(self.resolve(path)?)?;
        if !metadata.is_file() {
            return Err(not_found(path));
        }
        Ok(metadata.len())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn ByteStream>> {
        let file = File::open(self.resolve(path)?)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Store of named in-memory blobs, for bundled assets and tests.
///
/// Streams opened from it share the blob, so replacing or removing an entry
/// does not affect streams that are already open.
#[derive(Debug, Default)]
pub struct MemoryByteStore {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the blob named `path`.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let blob: Arc<[u8]> = bytes.into().into();
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), blob);
    }

    /// Removes the blob named `path`, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    fn blob(&self, path: &str) -> Result<Arc<[u8]>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

impl ByteStore for MemoryByteStore {
    fn size(&self, path: &str) -> Result<u64> {
        Ok(self.blob(path)?.len() as u64)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn ByteStream>> {
        Ok(Box::new(Cursor::new(self.blob(path)?)))
    }
}
