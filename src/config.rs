//! Configuration for PetalSonic I/O

use crate::format::{Channel, MAX_CHANNELS, SampleFormat};
use crate::ring_buffer::OverflowPolicy;

/// Format the decode subsystem converts file-backed audio to.
pub mod decode {
    use crate::format::SampleFormat;

    /// Decoded files keep their native channel count
    pub const DECODE_FORMAT: SampleFormat = SampleFormat::F32;

    pub const DECODE_SAMPLE_RATE: u32 = 48000;
}

/// Largest ring buffer a stream source allocates, in bytes.
pub const MAX_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Ring buffer size for `frames` frames of `channels` x `format` samples.
///
/// `None` when the channel count is above [`MAX_CHANNELS`], the size
/// overflows, or it exceeds [`MAX_BUFFER_BYTES`].
pub fn ring_buffer_bytes(frames: usize, channels: u32, format: SampleFormat) -> Option<usize> {
    if channels > MAX_CHANNELS {
        return None;
    }
    frames
        .checked_mul(channels as usize)?
        .checked_mul(format.bytes_per_sample())
        .filter(|&bytes| bytes <= MAX_BUFFER_BYTES)
}

/// Configuration descriptor for a stream data source
#[derive(Debug, Clone)]
pub struct StreamSourceDesc {
    /// Encoding of the samples pushed by the producer
    pub format: SampleFormat,
    /// Sample rate reported to the engine
    pub sample_rate: u32,
    /// Number of interleaved channels per frame
    pub channels: u32,
    /// Role of each channel, must have `channels` entries
    pub channel_map: Vec<Channel>,
    /// Capacity of the ring buffer, in frames. Must be at least 2.
    pub buffered_samples: usize,
    /// What a push does when the ring buffer has no room left
    pub overflow_policy: OverflowPolicy,
}

impl Default for StreamSourceDesc {
    fn default() -> Self {
        Self {
            format: SampleFormat::F32,
            sample_rate: 48000,
            channels: 2,
            channel_map: Channel::default_map(2),
            buffered_samples: 4096,
            overflow_policy: OverflowPolicy::DropNewest,
        }
    }
}

impl StreamSourceDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Sets the channel count and resets the channel map to the standard layout.
    pub fn channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self.channel_map = Channel::default_map(channels.min(MAX_CHANNELS) as usize);
        self
    }

    pub fn channel_map(mut self, map: Vec<Channel>) -> Self {
        self.channel_map = map;
        self
    }

    pub fn buffered_samples(mut self, frames: usize) -> Self {
        self.buffered_samples = frames;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Ring buffer size in bytes for this geometry, `None` if it is too large.
    pub fn capacity_bytes(&self) -> Option<usize> {
        ring_buffer_bytes(self.buffered_samples, self.channels, self.format)
    }
}

/// Configuration descriptor for a virtual file bridge
#[derive(Debug, Clone)]
pub struct VfsBridgeDesc {
    /// Maximum number of sessions open at the same time
    pub max_sessions: usize,
}

impl Default for VfsBridgeDesc {
    fn default() -> Self {
        Self { max_sessions: 64 }
    }
}

impl VfsBridgeDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_bytes_limits() {
        assert_eq!(ring_buffer_bytes(4096, 2, SampleFormat::F32), Some(32768));
        assert_eq!(ring_buffer_bytes(4096, 0, SampleFormat::F32), Some(0));
        assert_eq!(ring_buffer_bytes(4096, 2, SampleFormat::Unknown), Some(0));
        assert_eq!(ring_buffer_bytes(usize::MAX, 2, SampleFormat::S16), None);
        assert_eq!(ring_buffer_bytes(16, MAX_CHANNELS + 1, SampleFormat::U8), None);
        assert_eq!(ring_buffer_bytes(MAX_BUFFER_BYTES, 1, SampleFormat::U8), Some(MAX_BUFFER_BYTES));
        assert_eq!(ring_buffer_bytes(MAX_BUFFER_BYTES, 1, SampleFormat::S16), None);
    }

    #[test]
    fn test_huge_channel_count_keeps_builder_cheap() {
        let desc = StreamSourceDesc::new().channels(u32::MAX);
        assert_eq!(desc.channel_map.len(), MAX_CHANNELS as usize);
        assert_eq!(desc.capacity_bytes(), None);
    }
}
