use crate::config::StreamSourceDesc;
use crate::data_source::{DataSource, PushOutcome, copy_channel_map, output_bytes};
use crate::error::{PetalSonicError, Result};
use crate::events::{EventQueue, StreamEvent};
use crate::format::{Channel, DataFormat};
use crate::logging::Logger;
use crate::ring_buffer::OverflowPolicy;
use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};
use std::sync::{Mutex, PoisonError};

/// Stream source whose producer and consumer never share a lock.
///
/// The geometry (format, channels, capacity) is fixed at construction.
/// Call [`split`](Self::split) to get the producer half for the feeding
/// thread and the consumer half to bind to the engine.
pub struct SpscStreamSource {
    producer: StreamProducer,
    consumer: StreamConsumer,
}

impl SpscStreamSource {
    /// # Errors
    ///
    /// `InvalidArgument` when `buffered_samples` is below 2, the buffer would
    /// be too large, the format is unknown, there are no channels, the channel map does not match the
    /// channel count, or the policy is `OverwriteOldest` (the producer cannot
    /// evict frames the consumer owns).
    pub fn new(desc: StreamSourceDesc, logger: Logger) -> Result<Self> {
        let format = DataFormat::new(desc.format, desc.channels, desc.sample_rate);
        let capacity_bytes = desc.capacity_bytes();

        let problem = if desc.buffered_samples < 2 {
            Some(format!(
                "buffered_samples must be at least 2, got {}",
                desc.buffered_samples
            ))
        } else if capacity_bytes.is_none() {
            Some(format!(
                "buffer of {} frames with {} channels is too large",
                desc.buffered_samples, desc.channels
            ))
        } else if format.bytes_per_frame() == 0 {
            Some(format!(
                "fixed geometry needs a known format and channels, got {:?} with {} channels",
                desc.format, desc.channels
            ))
        } else if desc.channel_map.len() != desc.channels as usize {
            Some(format!(
                "channel map has {} entries for {} channels",
                desc.channel_map.len(),
                desc.channels
            ))
        } else if desc.overflow_policy == OverflowPolicy::OverwriteOldest {
            Some("lock-free stream cannot overwrite unread frames".to_string())
        } else {
            None
        };

        let capacity_bytes = match (problem, capacity_bytes) {
            (None, Some(capacity_bytes)) => capacity_bytes,
            (problem, _) => {
                let problem = problem.unwrap_or_default();
                logger.error(format_args!("Cannot create lock-free stream: {}", problem));
                return Err(PetalSonicError::InvalidArgument(problem));
            }
        };

        let (prod, cons) = HeapRb::<u8>::new(capacity_bytes).split();
        let events = EventQueue::new();

        logger.debug(format_args!(
            "Created lock-free stream: {:?} {}ch {} Hz, {} frames",
            desc.format, desc.channels, desc.sample_rate, desc.buffered_samples
        ));

        Ok(Self {
            producer: StreamProducer {
                prod,
                format,
                events: events.clone(),
            },
            consumer: StreamConsumer {
                cons: Mutex::new(cons),
                format,
                channel_map: desc.channel_map,
                events,
            },
        })
    }

    pub fn split(self) -> (StreamProducer, StreamConsumer) {
        (self.producer, self.consumer)
    }
}

/// Feeding half of a [`SpscStreamSource`].
pub struct StreamProducer {
    prod: HeapProd<u8>,
    format: DataFormat,
    events: EventQueue,
}

impl StreamProducer {
    /// Appends `num_frames` frames from the front of `data`.
    ///
    /// Frames that do not fit are dropped and counted in the outcome.
    pub fn push_frames(&mut self, data: &[u8], num_frames: usize) -> Result<PushOutcome> {
        let bytes_per_frame = self.format.bytes_per_frame();
        let bytes = num_frames
            .checked_mul(bytes_per_frame)
            .filter(|&bytes| bytes <= data.len())
            .ok_or_else(|| {
                PetalSonicError::InvalidArgument(format!(
                    "{} frames of {} bytes do not fit in {} bytes of data",
                    num_frames,
                    bytes_per_frame,
                    data.len()
                ))
            })?;

        let room = self.prod.vacant_len() / bytes_per_frame * bytes_per_frame;
        let accepted = self.prod.push_slice(&data[..bytes.min(room)]);
        let outcome = PushOutcome {
            accepted_bytes: accepted,
            dropped_bytes: bytes - accepted,
        };

        if !outcome.is_complete() {
            self.events.emit(StreamEvent::Overflow {
                dropped_bytes: outcome.dropped_bytes,
            });
        }

        Ok(outcome)
    }

    /// Whole frames that can be pushed without dropping anything.
    pub fn vacant_frames(&self) -> usize {
        self.prod.vacant_len() / self.format.bytes_per_frame()
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn poll_events(&self) -> Vec<StreamEvent> {
        self.events.drain()
    }
}

/// Engine-facing half of a [`SpscStreamSource`].
///
/// The ring buffer consumer needs exclusive access, so it sits behind a
/// mutex that only the pulling thread takes. The producer never touches it.
pub struct StreamConsumer {
    cons: Mutex<HeapCons<u8>>,
    format: DataFormat,
    channel_map: Vec<Channel>,
    events: EventQueue,
}

impl StreamConsumer {
    pub fn buffered_frames(&self) -> usize {
        let cons = self.cons.lock().unwrap_or_else(PoisonError::into_inner);
        cons.occupied_len() / self.format.bytes_per_frame()
    }

    pub fn poll_events(&self) -> Vec<StreamEvent> {
        self.events.drain()
    }
}

impl DataSource for StreamConsumer {
    fn good(&self) -> bool {
        true
    }

    fn data_format(&self, channel_map: &mut [Channel]) -> Result<DataFormat> {
        copy_channel_map(&self.channel_map, channel_map);
        Ok(self.format)
    }

    fn read_pcm_frames(&self, out: &mut [u8], frame_count: u64) -> Result<u64> {
        let bytes_per_frame = self.format.bytes_per_frame();
        let bytes = output_bytes(out, frame_count, bytes_per_frame)?;

        let mut cons = self.cons.lock().unwrap_or_else(PoisonError::into_inner);
        let available = cons.occupied_len() / bytes_per_frame * bytes_per_frame;
        if available == 0 {
            drop(cons);
            out[..bytes].fill(0);
            if frame_count > 0 {
                self.events.emit(StreamEvent::Underrun {
                    requested_frames: frame_count,
                });
            }
            return Ok(frame_count);
        }

        let read = cons.pop_slice(&mut out[..bytes.min(available)]);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::SampleFormat;
    use std::thread;

    fn stereo_s16(buffered_samples: usize) -> (StreamProducer, StreamConsumer) {
        let desc = StreamSourceDesc::new()
            .format(SampleFormat::S16)
            .buffered_samples(buffered_samples);
        SpscStreamSource::new(desc, Logger::silent())
            .unwrap()
            .split()
    }

    fn frames(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_rejects_unusable_geometry() {
        let cases = [
            StreamSourceDesc::new().buffered_samples(1),
            StreamSourceDesc::new().format(SampleFormat::Unknown),
            StreamSourceDesc::new().channels(0),
            StreamSourceDesc::new().overflow_policy(OverflowPolicy::OverwriteOldest),
            StreamSourceDesc::new().channels(u32::MAX),
            StreamSourceDesc::new().buffered_samples(usize::MAX / 2),
        ];
        for desc in cases {
            let err = SpscStreamSource::new(desc, Logger::silent()).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_push_then_pull() {
        let (mut producer, consumer) = stereo_s16(4);
        assert_eq!(producer.vacant_frames(), 4);

        let outcome = producer.push_frames(&frames(&[1, -1, 2, -2]), 2).unwrap();
        assert_eq!(outcome.accepted_bytes, 8);
        assert_eq!(consumer.buffered_frames(), 2);

        let mut out = [0u8; 12];
        assert_eq!(consumer.read_pcm_frames(&mut out, 3).unwrap(), 2);
        assert_eq!(&out[..8], frames(&[1, -1, 2, -2]).as_slice());
    }

    #[test]
    fn test_underrun_silence_and_event() {
        let (producer, consumer) = stereo_s16(4);
        let mut out = [0xEEu8; 8];
        assert_eq!(consumer.read_pcm_frames(&mut out, 2).unwrap(), 2);
        assert_eq!(out, [0u8; 8]);

        // Both halves see the shared queue
        assert_eq!(
            producer.poll_events(),
            vec![StreamEvent::Underrun {
                requested_frames: 2
            }]
        );
        assert!(consumer.poll_events().is_empty());
    }

    #[test]
    fn test_overflow_drops_whole_frames() {
        let (mut producer, consumer) = stereo_s16(3);
        let outcome = producer
            .push_frames(&frames(&[1, 1, 2, 2, 3, 3, 4, 4, 5, 5]), 5)
            .unwrap();
        assert_eq!(outcome.accepted_bytes, 12);
        assert_eq!(outcome.dropped_bytes, 8);
        assert_eq!(producer.vacant_frames(), 0);
        assert_eq!(
            consumer.poll_events(),
            vec![StreamEvent::Overflow { dropped_bytes: 8 }]
        );
    }

    #[test]
    fn test_reports_fixed_format() {
        let (_, consumer) = stereo_s16(4);
        let mut map = [Channel::None; 4];
        let format = consumer.data_format(&mut map).unwrap();
        assert_eq!(format, DataFormat::new(SampleFormat::S16, 2, 48000));
        assert_eq!(&map[..2], &[Channel::FrontLeft, Channel::FrontRight]);
        assert_eq!(map[2], Channel::None);
        assert!(consumer.good());
        assert_eq!(
            consumer.seek_to_pcm_frame(1).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn test_cross_thread_order() {
        const TOTAL: i16 = 3000;
        let (mut producer, consumer) = stereo_s16(256);

        let feeder = thread::spawn(move || {
            let mut next = 1i16;
            while next <= TOTAL {
                let end = (next + 16).min(TOTAL + 1);
                let chunk: Vec<i16> = (next..end).flat_map(|v| [v, -v]).collect();
                let count = (end - next) as usize;
                // Only push what fits so nothing is dropped
                if producer.vacant_frames() >= count {
                    producer.push_frames(&frames(&chunk), count).unwrap();
                    next = end;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::new();
        let mut out = [0u8; 32 * 4];
        while received.len() < TOTAL as usize {
            let got = consumer.read_pcm_frames(&mut out, 32).unwrap() as usize;
            for frame in out[..got * 4].chunks_exact(4) {
                let left = i16::from_le_bytes([frame[0], frame[1]]);
                let right = i16::from_le_bytes([frame[2], frame[3]]);
                if left == 0 {
                    break;
                }
                assert_eq!(right, -left);
                received.push(left);
            }
            thread::yield_now();
        }
        feeder.join().unwrap();

        let expected: Vec<i16> = (1..=TOTAL).collect();
        assert_eq!(received, expected);
    }
}
