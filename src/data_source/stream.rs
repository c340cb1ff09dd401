use crate::config::{StreamSourceDesc, ring_buffer_bytes};
use crate::data_source::{DataSource, copy_channel_map, output_bytes};
use crate::error::{PetalSonicError, Result};
use crate::events::{EventQueue, StreamEvent};
use crate::format::{Channel, DataFormat, SampleFormat};
use crate::logging::Logger;
use crate::ring_buffer::{OverflowPolicy, RingBuffer};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of handing new samples to a stream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    /// Bytes of the pushed data now buffered
    pub accepted_bytes: usize,
    /// Bytes lost to the overflow policy, pushed or previously buffered
    pub dropped_bytes: usize,
}

impl PushOutcome {
    pub fn is_complete(&self) -> bool {
        self.dropped_bytes == 0
    }
}

/// Everything the producer and the audio thread share.
#[derive(Debug)]
struct StreamState {
    format: SampleFormat,
    sample_rate: u32,
    channels: u32,
    channel_map: Vec<Channel>,
    overflow_policy: OverflowPolicy,
    buffer: RingBuffer,
}

impl StreamState {
    fn data_format(&self) -> DataFormat {
        DataFormat::new(self.format, self.channels, self.sample_rate)
    }

    fn bytes_per_frame(&self) -> usize {
        self.data_format().bytes_per_frame()
    }

    fn is_usable(&self) -> bool {
        self.format.is_known() && self.channels > 0
    }

    /// Replaces the buffer with an empty one of `capacity_bytes`, which must
    /// match the current geometry.
    fn rebuild_buffer(&mut self, capacity_bytes: usize) -> StreamEvent {
        let bytes_per_frame = self.bytes_per_frame();
        self.buffer = RingBuffer::new(capacity_bytes);
        StreamEvent::Reconfigured {
            bytes_per_frame,
            capacity_bytes,
        }
    }
}

/// Live PCM stream: a producer pushes samples, the engine pulls frames.
///
/// All state, the ring buffer included, sits behind one mutex that both the
/// producer and the real-time pull take. The pull blocks on that lock, so a
/// producer holding it for long stalls the audio thread. Pushes only copy
/// bytes while locked; reconfiguration also reallocates the buffer. When the
/// geometry never changes, [`SpscStreamSource`](super::SpscStreamSource)
/// avoids the lock entirely.
///
/// An empty buffer is not an end of stream: the pull delivers silence and
/// reports every requested frame as produced.
#[derive(Debug)]
pub struct StreamDataSource {
    buffered_samples: usize,
    state: Mutex<StreamState>,
    events: EventQueue,
    logger: Logger,
}

impl StreamDataSource {
    /// Creates a stream source whose buffer holds `desc.buffered_samples` frames.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `buffered_samples` is below 2, the buffer would
    /// exceed [`MAX_BUFFER_BYTES`](crate::config::MAX_BUFFER_BYTES) or the
    /// channel map does not have one entry per channel.
    pub fn new(desc: StreamSourceDesc, logger: Logger) -> Result<Self> {
        if desc.buffered_samples < 2 {
            logger.error(format_args!(
                "The number of buffered samples must be at least 2, got {}",
                desc.buffered_samples
            ));
            return Err(PetalSonicError::InvalidArgument(format!(
                "buffered_samples must be at least 2, got {}",
                desc.buffered_samples
            )));
        }

        let Some(capacity_bytes) = desc.capacity_bytes() else {
            logger.error(format_args!(
                "Stream buffer of {} frames with {} {:?} channels is too large",
                desc.buffered_samples, desc.channels, desc.format
            ));
            return Err(PetalSonicError::InvalidArgument(format!(
                "buffer of {} frames with {} channels is too large",
                desc.buffered_samples, desc.channels
            )));
        };

        if desc.channel_map.len() != desc.channels as usize {
            logger.error(format_args!(
                "Channel map has {} entries for {} channels",
                desc.channel_map.len(),
                desc.channels
            ));
            return Err(PetalSonicError::InvalidArgument(format!(
                "channel map has {} entries for {} channels",
                desc.channel_map.len(),
                desc.channels
            )));
        }

        let buffer = RingBuffer::new(capacity_bytes);
        logger.debug(format_args!(
            "Created stream data source: {:?} {}ch {} Hz, {} frames ({} bytes)",
            desc.format,
            desc.channels,
            desc.sample_rate,
            desc.buffered_samples,
            buffer.capacity()
        ));

        Ok(Self {
            buffered_samples: desc.buffered_samples,
            state: Mutex::new(StreamState {
                format: desc.format,
                sample_rate: desc.sample_rate,
                channels: desc.channels,
                channel_map: desc.channel_map,
                overflow_policy: desc.overflow_policy,
                buffer,
            }),
            events: EventQueue::new(),
            logger,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        // Critical sections never panic, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `num_samples` frames taken from the front of `data`.
    ///
    /// Never blocks on buffer space: what does not fit is handled by the
    /// overflow policy and reported in the returned [`PushOutcome`].
    ///
    /// # Errors
    ///
    /// - `Uninitialized` if the format or channel count is not usable
    /// - `InvalidArgument` if `data` holds fewer than `num_samples` frames
    pub fn on_new_samples(&self, data: &[u8], num_samples: usize) -> Result<PushOutcome> {
        let mut state = self.lock();
        if !state.is_usable() {
            return Err(PetalSonicError::Uninitialized(format!(
                "stream format {:?} with {} channels cannot hold samples",
                state.format, state.channels
            )));
        }

        let bytes_per_frame = state.bytes_per_frame();
        let bytes = num_samples
            .checked_mul(bytes_per_frame)
            .filter(|&bytes| bytes <= data.len())
            .ok_or_else(|| {
                PetalSonicError::InvalidArgument(format!(
                    "{} samples of {} bytes do not fit in {} bytes of data",
                    num_samples,
                    bytes_per_frame,
                    data.len()
                ))
            })?;
        let data = &data[..bytes];

        let outcome = match state.overflow_policy {
            OverflowPolicy::DropNewest => {
                let room = state.buffer.free() / bytes_per_frame * bytes_per_frame;
                let accepted = state.buffer.write(&data[..bytes.min(room)]);
                PushOutcome {
                    accepted_bytes: accepted,
                    dropped_bytes: bytes - accepted,
                }
            }
            OverflowPolicy::OverwriteOldest => {
                let accepted = bytes.min(state.buffer.capacity());
                let evicted = state.buffer.write_overwrite(data);
                PushOutcome {
                    accepted_bytes: accepted,
                    dropped_bytes: evicted + (bytes - accepted),
                }
            }
        };
        drop(state);

        if !outcome.is_complete() {
            self.events.emit(StreamEvent::Overflow {
                dropped_bytes: outcome.dropped_bytes,
            });
        }

        Ok(outcome)
    }

    /// Buffer size for a new geometry, logged and rejected when too large.
    fn checked_capacity(&self, channels: u32, format: SampleFormat) -> Result<usize> {
        ring_buffer_bytes(self.buffered_samples, channels, format).ok_or_else(|| {
            self.logger.error(format_args!(
                "Rejected stream geometry: {} frames with {} {:?} channels is too large",
                self.buffered_samples, channels, format
            ));
            PetalSonicError::InvalidArgument(format!(
                "buffer of {} frames with {} channels is too large",
                self.buffered_samples, channels
            ))
        })
    }

    /// Sets the sample encoding and recreates the buffer, discarding unread audio.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the resulting buffer would be too large. The
    /// previous format and buffered audio are kept.
    pub fn set_format(&self, format: SampleFormat) -> Result<&Self> {
        let event = {
            let mut state = self.lock();
            let capacity_bytes = self.checked_capacity(state.channels, format)?;
            state.format = format;
            state.rebuild_buffer(capacity_bytes)
        };
        self.logger
            .debug(format_args!("Stream format set to {:?}: {:?}", format, event));
        self.events.emit(event);
        Ok(self)
    }

    /// Sets the reported sample rate. Buffered audio is kept.
    pub fn set_sample_rate(&self, sample_rate: u32) -> &Self {
        self.lock().sample_rate = sample_rate;
        self
    }

    /// Sets the channel count, resets the channel map to the standard layout
    /// and recreates the buffer, discarding unread audio.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `channels` is above
    /// [`MAX_CHANNELS`](crate::format::MAX_CHANNELS) or the resulting buffer
    /// would be too large. The previous geometry and buffered audio are kept.
    pub fn set_num_channels(&self, channels: u32) -> Result<&Self> {
        let event = {
            let mut state = self.lock();
            let capacity_bytes = self.checked_capacity(channels, state.format)?;
            state.channels = channels;
            state.channel_map = Channel::default_map(channels as usize);
            state.rebuild_buffer(capacity_bytes)
        };
        self.logger
            .debug(format_args!("Stream channels set to {}: {:?}", channels, event));
        self.events.emit(event);
        Ok(self)
    }

    /// Sets the role of each channel.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `map` does not have one entry per channel.
    pub fn set_channel_map(&self, map: &[Channel]) -> Result<&Self> {
        let mut state = self.lock();
        if map.len() != state.channels as usize {
            return Err(PetalSonicError::InvalidArgument(format!(
                "channel map has {} entries for {} channels",
                map.len(),
                state.channels
            )));
        }
        state.channel_map = map.to_vec();
        Ok(self)
    }

    pub fn current_format(&self) -> DataFormat {
        self.lock().data_format()
    }

    /// Whole frames waiting to be pulled.
    pub fn buffered_frames(&self) -> usize {
        let state = self.lock();
        match state.bytes_per_frame() {
            0 => 0,
            bytes_per_frame => state.buffer.len() / bytes_per_frame,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.lock().buffer.capacity()
    }

    /// Drains the underrun, overflow and reconfiguration events queued so far.
    pub fn poll_events(&self) -> Vec<StreamEvent> {
        self.events.drain()
    }
}

impl DataSource for StreamDataSource {
    fn good(&self) -> bool {
        self.lock().is_usable()
    }

    fn data_format(&self, channel_map: &mut [Channel]) -> Result<DataFormat> {
        let state = self.lock();
        copy_channel_map(&state.channel_map, channel_map);
        Ok(state.data_format())
    }

    fn read_pcm_frames(&self, out: &mut [u8], frame_count: u64) -> Result<u64> {
        let mut state = self.lock();
        if !state.is_usable() {
            return Err(PetalSonicError::Uninitialized(
                "stream source has no usable format".into(),
            ));
        }

        let bytes_per_frame = state.bytes_per_frame();
        let bytes = output_bytes(out, frame_count, bytes_per_frame)?;

        // Only whole frames leave the buffer
        let available = state.buffer.len() / bytes_per_frame * bytes_per_frame;
        if available == 0 {
            out[..bytes].fill(0);
            drop(state);
            if frame_count > 0 {
                self.events.emit(StreamEvent::Underrun {
                    requested_frames: frame_count,
                });
            }
            return Ok(frame_count);
        }

        let read = state.buffer.read(&mut out[..bytes.min(available)]);
        Ok((read / bytes_per_frame) as u64)
    }

    fn seek_to_pcm_frame(&self, _frame_index: u64) -> Result<()> {
        Err(PetalSonicError::NotSupported("seek on a live stream"))
    }

    fn cursor_in_pcm_frames(&self) -> Result<u64> {
        Err(PetalSonicError::NotSupported("cursor of a live stream"))
    }

    fn length_in_pcm_frames(&self) -> Result<u64> {
        Err(PetalSonicError::NotSupported("length of a live stream"))
    }
}
