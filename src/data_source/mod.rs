//! Pull-based audio data sources.
//!
//! A [`DataSource`] is what the mixing engine reads PCM frames from. The
//! engine calls it on its real-time thread, so every method is synchronous
//! and reports outcomes through [`Result`] instead of panicking.
//!
//! Sources shipped with the crate:
//! - [`StreamDataSource`]: live stream fed by a producer, guarded by a mutex
//! - [`SpscStreamSource`]: lock-free variant with a fixed geometry
//! - [`FileDataSource`]: file decoded through a [`Vfs`](crate::vfs::Vfs)

mod file;
mod spsc;
mod stream;

use crate::error::{PetalSonicError, Result};
use crate::format::{Channel, DataFormat};
use std::sync::Arc;

pub use file::FileDataSource;
pub use spsc::{SpscStreamSource, StreamConsumer, StreamProducer};
pub use stream::{PushOutcome, StreamDataSource};

/// Contract between a source of PCM frames and the engine that plays it.
///
/// A delivered frame count of 0 means end of stream. Live sources that have
/// nothing buffered must therefore deliver silence and report the full
/// request instead of 0.
pub trait DataSource: Send + Sync {
    /// Whether the source was configured successfully and can be read.
    fn good(&self) -> bool;

    /// Reports the current format and fills `channel_map` with as many
    /// channel roles as it can hold.
    fn data_format(&self, channel_map: &mut [Channel]) -> Result<DataFormat>;

    /// Writes up to `frame_count` interleaved frames into `out` and returns
    /// how many were delivered. `out` must hold `frame_count` whole frames.
    fn read_pcm_frames(&self, out: &mut [u8], frame_count: u64) -> Result<u64>;

    fn seek_to_pcm_frame(&self, frame_index: u64) -> Result<()>;

    fn cursor_in_pcm_frames(&self) -> Result<u64>;

    fn length_in_pcm_frames(&self) -> Result<u64>;
}

/// Handle through which the playback layer binds any source.
pub type SharedDataSource = Arc<dyn DataSource>;

/// Number of bytes `frame_count` frames take, checked against `out`.
pub(crate) fn output_bytes(out: &[u8], frame_count: u64, bytes_per_frame: usize) -> Result<usize> {
    let needed = usize::try_from(frame_count)
        .ok()
        .and_then(|frames| frames.checked_mul(bytes_per_frame))
        .ok_or_else(|| {
            PetalSonicError::InvalidArgument(format!("frame count {} too large", frame_count))
        })?;

    if out.len() < needed {
        return Err(PetalSonicError::InvalidArgument(format!(
            "output buffer too small: need {} bytes for {} frames, got {}",
            needed,
            frame_count,
            out.len()
        )));
    }

    Ok(needed)
}

/// Copies `map` into `channel_map`, truncated to the caller's capacity.
pub(crate) fn copy_channel_map(map: &[Channel], channel_map: &mut [Channel]) {
    let count = map.len().min(channel_map.len());
    channel_map[..count].copy_from_slice(&map[..count]);
}
