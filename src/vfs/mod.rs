//! Handle-based virtual file system protocol.
//!
//! A decode engine reads files through the small synchronous [`Vfs`]
//! protocol: open by path, read, seek, tell, stat and close, all keyed by an
//! opaque [`VfsHandle`]. [`VirtualFileBridge`] implements that protocol on
//! top of whatever [`ByteStore`] the host supplies, so audio can come from
//! packaged assets, archives or memory instead of the local disk.

mod bridge;
mod file;
mod pool;
mod store;

use crate::error::{PetalSonicError, Result};

pub use bridge::VirtualFileBridge;
pub use file::VfsFile;
pub use pool::HandlePool;
pub use store::{ByteStore, ByteStream, FsByteStore, MemoryByteStore};

/// Opaque identifier of an open file session.
///
/// The raw value 0 is reserved and never refers to a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsHandle(u64);

impl VfsHandle {
    pub const NULL: VfsHandle = VfsHandle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Slot index encoded by the handle, `None` for the null handle.
    pub(crate) fn index(self) -> Option<usize> {
        self.0
            .checked_sub(1)
            .and_then(|index| usize::try_from(index).ok())
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u64 + 1)
    }
}

/// Reference point of a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    Write,
}

/// Metadata of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub size_in_bytes: u64,
}

/// Synchronous file protocol consumed by the decode engine.
///
/// Every method reports its outcome as a [`Result`]; use
/// [`PetalSonicError::kind`] to map it to an outcome code. Operations on a
/// handle that is null or not open fail with an invalid-argument outcome.
pub trait Vfs: Send + Sync {
    fn open(&self, path: &str, mode: OpenMode) -> Result<VfsHandle>;

    /// Opens a path given as UTF-16 code units.
    fn open_wide(&self, _path: &[u16], _mode: OpenMode) -> Result<VfsHandle> {
        Err(PetalSonicError::NotSupported("wide-character open"))
    }

    fn close(&self, handle: VfsHandle) -> Result<()>;

    /// Fills `dst` from the current position.
    ///
    /// Returns `dst.len()` on a full read. Reaching the end of the file first
    /// fails with `EndOfInput`, carrying the bytes read before it.
    fn read(&self, handle: VfsHandle, dst: &mut [u8]) -> Result<usize>;

    fn write(&self, _handle: VfsHandle, _src: &[u8]) -> Result<usize> {
        Err(PetalSonicError::NotSupported("write"))
    }

    fn seek(&self, handle: VfsHandle, offset: i64, origin: SeekOrigin) -> Result<()>;

    fn tell(&self, handle: VfsHandle) -> Result<u64>;

    fn info(&self, handle: VfsHandle) -> Result<FileInfo>;
}
