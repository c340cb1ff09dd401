use crate::config::decode::{DECODE_FORMAT, DECODE_SAMPLE_RATE};
use crate::data_source::{DataSource, copy_channel_map, output_bytes};
use crate::error::{PetalSonicError, Result};
use crate::format::{Channel, DataFormat};
use crate::logging::Logger;
use crate::vfs::{Vfs, VfsFile};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Audio file decoded up front and served from memory.
///
/// The whole file is decoded to interleaved `f32` when opened, so pulls
/// never touch the file system and the source supports seeking.
#[derive(Debug)]
pub struct FileDataSource {
    samples: Vec<f32>,
    channels: u32,
    sample_rate: u32,
    channel_map: Vec<Channel>,
    total_frames: u64,
    /// Next frame to deliver
    cursor: Mutex<u64>,
}

impl FileDataSource {
    /// Decodes the file at `path`, read through `vfs`.
    ///
    /// # Errors
    ///
    /// Open failures from `vfs` are passed through. Files that cannot be
    /// probed or decoded fail with `AudioLoading`.
    pub fn open(vfs: Arc<dyn Vfs>, path: &str, logger: Logger) -> Result<Self> {
        let file = VfsFile::open(vfs, path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                logger.error(format_args!("Failed to probe '{}': {}", path, e));
                PetalSonicError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
            })?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| PetalSonicError::AudioLoading("No default audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PetalSonicError::AudioLoading("Sample rate not found".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| PetalSonicError::AudioLoading("Channel count not found".to_string()))?
            .count() as u32;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PetalSonicError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(PetalSonicError::AudioLoading(format!(
                        "Error reading packet: {:?}",
                        e
                    )));
                }
            };

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(e)) => {
                    logger.warn(format_args!("Skipping corrupt packet in '{}': {}", path, e));
                    continue;
                }
                Err(e) => {
                    return Err(PetalSonicError::AudioLoading(format!(
                        "Error decoding packet: {:?}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            tmp.copy_interleaved_ref(decoded);
            samples.extend_from_slice(tmp.samples());
        }

        let source = Self::from_pcm(samples, channels, sample_rate)?;
        if sample_rate != DECODE_SAMPLE_RATE {
            logger.debug(format_args!(
                "'{}' is {} Hz, the engine resamples it to {} Hz",
                path, sample_rate, DECODE_SAMPLE_RATE
            ));
        }
        logger.info(format_args!(
            "Decoded '{}': {} frames, {} channels, {} Hz",
            path, source.total_frames, channels, sample_rate
        ));

        Ok(source)
    }

    /// Wraps already decoded interleaved samples.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_pcm(mut samples: Vec<f32>, channels: u32, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(PetalSonicError::AudioLoading(
                "Audio must have at least one channel".to_string(),
            ));
        }

        let total_frames = samples.len() / channels as usize;
        samples.truncate(total_frames * channels as usize);

        Ok(Self {
            samples,
            channels,
            sample_rate,
            channel_map: Channel::default_map(channels as usize),
            total_frames: total_frames as u64,
            cursor: Mutex::new(0),
        })
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl DataSource for FileDataSource {
    fn good(&self) -> bool {
        true
    }

    fn data_format(&self, channel_map: &mut [Channel]) -> Result<DataFormat> {
        copy_channel_map(&self.channel_map, channel_map);
        Ok(DataFormat::new(DECODE_FORMAT, self.channels, self.sample_rate))
    }

    fn read_pcm_frames(&self, out: &mut [u8], frame_count: u64) -> Result<u64> {
        let bytes_per_frame = DECODE_FORMAT.bytes_per_sample() * self.channels as usize;
        output_bytes(out, frame_count, bytes_per_frame)?;

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let frames = frame_count.min(self.total_frames - *cursor);

        let channels = self.channels as usize;
        let start = *cursor as usize * channels;
        let end = start + frames as usize * channels;
        for (dst, sample) in out.chunks_exact_mut(4).zip(&self.samples[start..end]) {
            dst.copy_from_slice(&sample.to_ne_bytes());
        }

        *cursor += frames;
        Ok(frames)
    }

    fn seek_to_pcm_frame(&self, frame_index: u64) -> Result<()> {
        if frame_index > self.total_frames {
            return Err(PetalSonicError::InvalidArgument(format!(
                "frame {} is past the end ({} frames)",
                frame_index, self.total_frames
            )));
        }
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = frame_index;
        Ok(())
    }

    fn cursor_in_pcm_frames(&self) -> Result<u64> {
        Ok(*self.cursor.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn length_in_pcm_frames(&self) -> Result<u64> {
        Ok(self.total_frames)
    }
}
