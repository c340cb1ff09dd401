use crate::config::VfsBridgeDesc;
use crate::error::{PetalSonicError, Result};
use crate::logging::Logger;
use crate::vfs::{ByteStore, ByteStream, FileInfo, HandlePool, OpenMode, SeekOrigin, Vfs, VfsHandle};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One open file: the stream plus what was learned when opening it.
struct Session {
    path: String,
    size: u64,
    stream: Box<dyn ByteStream>,
    /// Set by a read that failed for a reason other than end of input
    failed: bool,
}

/// Serves the [`Vfs`] protocol from a host [`ByteStore`].
///
/// Opening a path that already has a session returns that session's handle
/// instead of opening the resource again. Both openers then share the read
/// position, and closing either handle closes the session for both.
///
/// The session table sits behind a mutex, so the bridge can be shared
/// between the decode thread and control threads.
pub struct VirtualFileBridge {
    store: Arc<dyn ByteStore>,
    max_sessions: usize,
    sessions: Mutex<HandlePool<Session>>,
    logger: Logger,
}

impl VirtualFileBridge {
    pub fn new(store: Arc<dyn ByteStore>, desc: VfsBridgeDesc, logger: Logger) -> Self {
        Self {
            store,
            max_sessions: desc.max_sessions,
            sessions: Mutex::new(HandlePool::new()),
            logger,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HandlePool<Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Closes every open session and returns how many there were.
    pub fn close_all(&self) -> usize {
        self.sessions().clear()
    }
}

fn invalid_handle(handle: VfsHandle) -> PetalSonicError {
    PetalSonicError::InvalidHandle(handle.as_raw())
}

impl Vfs for VirtualFileBridge {
    fn open(&self, path: &str, mode: OpenMode) -> Result<VfsHandle> {
        if mode == OpenMode::Write {
            return Err(PetalSonicError::NotSupported("open for writing"));
        }

        let mut sessions = self.sessions();
        if let Some(handle) = sessions.find(|session| session.path == path) {
            return Ok(handle);
        }

        if sessions.len() >= self.max_sessions {
            self.logger.error(format_args!(
                "Cannot open '{}': all {} sessions are in use",
                path, self.max_sessions
            ));
            return Err(PetalSonicError::InvalidArgument(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }

        let opened = self
            .store
            .size(path)
            .and_then(|size| Ok((size, self.store.open_read(path)?)));
        let (size, mut stream) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                self.logger
                    .error(format_args!("Failed to open '{}': {}", path, e));
                return Err(PetalSonicError::InvalidArgument(format!(
                    "cannot open '{}': {}",
                    path, e
                )));
            }
        };

        // A stream that cannot report its position is unusable
        if let Err(e) = stream.stream_position() {
            self.logger
                .error(format_args!("Stream for '{}' is not usable: {}", path, e));
            return Err(PetalSonicError::Io(e));
        }

        let handle = sessions.insert(Session {
            path: path.to_string(),
            size,
            stream,
            failed: false,
        });
        self.logger.debug(format_args!(
            "Opened '{}' ({} bytes) as handle {}",
            path,
            size,
            handle.as_raw()
        ));
        Ok(handle)
    }

    fn close(&self, handle: VfsHandle) -> Result<()> {
        let session = self
            .sessions()
            .remove(handle)
            .ok_or_else(|| invalid_handle(handle))?;
        self.logger.debug(format_args!(
            "Closed '{}' (handle {})",
            session.path,
            handle.as_raw()
        ));
        Ok(())
    }

    fn read(&self, handle: VfsHandle, dst: &mut [u8]) -> Result<usize> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(handle)
            .ok_or_else(|| invalid_handle(handle))?;

        if session.failed {
            return Err(PetalSonicError::Io(io::Error::other(
                "stream is in a failed state",
            )));
        }

        let mut total = 0;
        while total < dst.len() {
            match session.stream.read(&mut dst[total..]) {
                Ok(0) => return Err(PetalSonicError::EndOfInput { bytes_read: total }),
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    session.failed = true;
                    self.logger.error(format_args!(
                        "Read from '{}' failed after {} bytes: {}",
                        session.path, total, e
                    ));
                    return Err(PetalSonicError::Io(e));
                }
            }
        }

        Ok(total)
    }

    fn seek(&self, handle: VfsHandle, offset: i64, origin: SeekOrigin) -> Result<()> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(handle)
            .ok_or_else(|| invalid_handle(handle))?;

        if session.failed {
            return Err(PetalSonicError::Io(io::Error::other(
                "stream is in a failed state",
            )));
        }

        let target = match origin {
            SeekOrigin::Start => {
                let start = u64::try_from(offset).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("negative offset {} from start", offset),
                    )
                })?;
                SeekFrom::Start(start)
            }
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };

        session.stream.seek(target)?;
        Ok(())
    }

    fn tell(&self, handle: VfsHandle) -> Result<u64> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(handle)
            .ok_or_else(|| invalid_handle(handle))?;
        Ok(session.stream.stream_position()?)
    }

    fn info(&self, handle: VfsHandle) -> Result<FileInfo> {
        self.sessions()
            .get(handle)
            .map(|session| FileInfo {
                size_in_bytes: session.size,
            })
            .ok_or_else(|| invalid_handle(handle))
    }
}

impl Drop for VirtualFileBridge {
    fn drop(&mut self) {
        let closed = self.close_all();
        if closed > 0 {
            self.logger.warn(format_args!(
                "File bridge dropped with {} open sessions, closed them",
                closed
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::logging::tests::RecordingHandler;
    use crate::vfs::MemoryByteStore;

    fn bridge_with(files: &[(&str, &str)]) -> VirtualFileBridge {
        let store = MemoryByteStore::new();
        for (path, bytes) in files {
            store.insert(*path, bytes.as_bytes());
        }
        VirtualFileBridge::new(Arc::new(store), VfsBridgeDesc::default(), Logger::silent())
    }

    /// Stream that fails every read after the first `good` bytes.
    struct FlakyStream {
        inner: io::Cursor<Vec<u8>>,
        good: u64,
    }

    impl Read for FlakyStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inner.position() >= self.good {
                return Err(io::Error::other("device removed"));
            }
            let limit = (self.good - self.inner.position()) as usize;
            let len = buf.len().min(limit);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for FlakyStream {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    struct FlakyStore;

    impl ByteStore for FlakyStore {
        fn size(&self, _path: &str) -> Result<u64> {
            Ok(8)
        }

        fn open_read(&self, _path: &str) -> Result<Box<dyn ByteStream>> {
            Ok(Box::new(FlakyStream {
                inner: io::Cursor::new(vec![9; 8]),
                good: 3,
            }))
        }
    }

    #[test]
    fn test_same_path_shares_session() {
        let bridge = bridge_with(&[("a.wav", "abcdef")]);
        let first = bridge.open("a.wav", OpenMode::Read).unwrap();
        let second = bridge.open("a.wav", OpenMode::Read).unwrap();
        assert_eq!(first, second);
        assert_eq!(bridge.open_sessions(), 1);

        bridge.close(first).unwrap();
        let mut buf = [0u8; 2];
        let err = bridge.read(second, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_distinct_paths_get_distinct_handles() {
        let bridge = bridge_with(&[("a.wav", "a"), ("b.wav", "b")]);
        let a = bridge.open("a.wav", OpenMode::Read).unwrap();
        let b = bridge.open("b.wav", OpenMode::Read).unwrap();
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_ne!(a, b);
        assert_eq!(bridge.open_sessions(), 2);
    }

    #[test]
    fn test_missing_path_is_invalid_argument() {
        let handler = Arc::new(RecordingHandler::default());
        let bridge = VirtualFileBridge::new(
            Arc::new(MemoryByteStore::new()),
            VfsBridgeDesc::default(),
            Logger::new(handler.clone()),
        );

        let err = bridge.open("nope.wav", OpenMode::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(bridge.open_sessions(), 0);
        assert_eq!(handler.records.lock().unwrap()[0].0, log::Level::Error);
    }

    #[test]
    fn test_read_to_end_reports_partial_count() {
        let bridge = bridge_with(&[("a.bin", "12345")]);
        let handle = bridge.open("a.bin", OpenMode::Read).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(bridge.read(handle, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"123");

        let mut rest = [0u8; 4];
        match bridge.read(handle, &mut rest) {
            Err(PetalSonicError::EndOfInput { bytes_read }) => assert_eq!(bytes_read, 2),
            other => panic!("expected end of input, got {:?}", other),
        }
        assert_eq!(&rest[..2], b"45");

        match bridge.read(handle, &mut rest) {
            Err(PetalSonicError::EndOfInput { bytes_read }) => assert_eq!(bytes_read, 0),
            other => panic!("expected end of input, got {:?}", other),
        }
    }

    #[test]
    fn test_seek_tell_and_info() {
        let bridge = bridge_with(&[("a.bin", "0123456789")]);
        let handle = bridge.open("a.bin", OpenMode::Read).unwrap();
        assert_eq!(bridge.info(handle).unwrap().size_in_bytes, 10);

        bridge.seek(handle, 4, SeekOrigin::Start).unwrap();
        assert_eq!(bridge.tell(handle).unwrap(), 4);
        bridge.seek(handle, 2, SeekOrigin::Current).unwrap();
        assert_eq!(bridge.tell(handle).unwrap(), 6);
        bridge.seek(handle, -1, SeekOrigin::End).unwrap();

        let mut last = [0u8; 1];
        bridge.read(handle, &mut last).unwrap();
        assert_eq!(&last, b"9");

        let err = bridge.seek(handle, -1, SeekOrigin::Start).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_invalid_handles() {
        let bridge = bridge_with(&[("a.bin", "x")]);
        let live = bridge.open("a.bin", OpenMode::Read).unwrap();

        for handle in [VfsHandle::NULL, VfsHandle::from_raw(77)] {
            assert_eq!(bridge.close(handle).unwrap_err().kind(), ErrorKind::InvalidArgument);
            assert_eq!(bridge.tell(handle).unwrap_err().kind(), ErrorKind::InvalidArgument);
            assert_eq!(bridge.info(handle).unwrap_err().kind(), ErrorKind::InvalidArgument);
        }

        // Failed closes leave the live session alone
        assert_eq!(bridge.open_sessions(), 1);
        assert_eq!(bridge.tell(live).unwrap(), 0);
    }

    #[test]
    fn test_write_side_not_supported() {
        let bridge = bridge_with(&[("a.bin", "x")]);
        let handle = bridge.open("a.bin", OpenMode::Read).unwrap();

        let wide: Vec<u16> = "a.bin".encode_utf16().collect();
        assert_eq!(
            bridge.open_wide(&wide, OpenMode::Read).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            bridge.open("a.bin", OpenMode::Write).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            bridge.write(handle, b"y").unwrap_err().kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn test_failed_stream_poisons_session() {
        let bridge = VirtualFileBridge::new(
            Arc::new(FlakyStore),
            VfsBridgeDesc::default(),
            Logger::silent(),
        );
        let handle = bridge.open("flaky", OpenMode::Read).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(bridge.read(handle, &mut buf).unwrap_err().kind(), ErrorKind::IoError);
        assert_eq!(
            bridge.seek(handle, 0, SeekOrigin::Start).unwrap_err().kind(),
            ErrorKind::IoError
        );
        assert_eq!(bridge.read(handle, &mut buf).unwrap_err().kind(), ErrorKind::IoError);
        bridge.close(handle).unwrap();
    }

    #[test]
    fn test_session_limit_and_slot_reuse() {
        let store = MemoryByteStore::new();
        store.insert("a", b"a".to_vec());
        store.insert("b", b"b".to_vec());
        let bridge = VirtualFileBridge::new(
            Arc::new(store),
            VfsBridgeDesc::new().max_sessions(1),
            Logger::silent(),
        );

        let a = bridge.open("a", OpenMode::Read).unwrap();
        assert_eq!(
            bridge.open("b", OpenMode::Read).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        // Reopening an open path does not count against the limit
        assert_eq!(bridge.open("a", OpenMode::Read).unwrap(), a);

        bridge.close(a).unwrap();
        let b = bridge.open("b", OpenMode::Read).unwrap();
        assert_eq!(b, a);
    }

    #[test]
    fn test_drop_closes_open_sessions() {
        let handler = Arc::new(RecordingHandler::default());
        let store = MemoryByteStore::new();
        store.insert("a", b"a".to_vec());
        store.insert("b", b"b".to_vec());
        let bridge = VirtualFileBridge::new(
            Arc::new(store),
            VfsBridgeDesc::default(),
            Logger::new(handler.clone()),
        );
        bridge.open("a", OpenMode::Read).unwrap();
        bridge.open("b", OpenMode::Read).unwrap();

        drop(bridge);

        let records = handler.records.lock().unwrap();
        let (level, message) = records.last().unwrap();
        assert_eq!(*level, log::Level::Warn);
        assert!(message.contains("2 open sessions"));
    }
}
