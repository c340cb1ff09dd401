use crate::error::{PetalSonicError, Result};
use crate::vfs::{OpenMode, SeekOrigin, Vfs, VfsHandle};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use symphonia::core::io::MediaSource;

/// `Read + Seek` view of one file opened through a [`Vfs`].
///
/// This is how the decoder consumes the protocol. The handle is closed when
/// the value is dropped.
pub struct VfsFile {
    vfs: Arc<dyn Vfs>,
    handle: VfsHandle,
    len: u64,
}

impl VfsFile {
    pub fn open(vfs: Arc<dyn Vfs>, path: &str) -> Result<Self> {
        let handle = vfs.open(path, OpenMode::Read)?;
        let len = match vfs.info(handle) {
            Ok(info) => info.size_in_bytes,
            Err(e) => {
                let _ = vfs.close(handle);
                return Err(e);
            }
        };
        Ok(Self { vfs, handle, len })
    }

    pub fn handle(&self) -> VfsHandle {
        self.handle
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn to_io_error(error: PetalSonicError) -> io::Error {
    match error {
        PetalSonicError::Io(e) => e,
        other => io::Error::other(other),
    }
}

impl Read for VfsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.vfs.read(self.handle, buf) {
            Ok(n) => Ok(n),
            Err(PetalSonicError::EndOfInput { bytes_read }) => Ok(bytes_read),
            Err(e) => Err(to_io_error(e)),
        }
    }
}

impl Seek for VfsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, origin) = match pos {
            SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset out of range")
                })?;
                (offset, SeekOrigin::Start)
            }
            SeekFrom::Current(offset) => (offset, SeekOrigin::Current),
            SeekFrom::End(offset) => (offset, SeekOrigin::End),
        };

        self.vfs
            .seek(self.handle, offset, origin)
            .map_err(to_io_error)?;
        self.vfs.tell(self.handle).map_err(to_io_error)
    }
}

impl MediaSource for VfsFile {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}

impl Drop for VfsFile {
    fn drop(&mut self) {
        let _ = self.vfs.close(self.handle);
    }
}
