//! Uniform playback binding over any data source.
//!
//! A [`Sound`] is what an engine voice holds: one bound
//! [`SharedDataSource`] plus transport state. Live streams, decoded files
//! and host-defined sources are driven the same way.

use crate::data_source::{SharedDataSource, output_bytes};
use crate::error::{PetalSonicError, Result};
use crate::logging::Logger;

/// Loop mode for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play once and stop at the end of the stream
    #[default]
    Once,
    /// Rewind to the first frame at the end of the stream
    Infinite,
}

/// Represents the current playback state of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Frames are pulled from the source
    Playing,
    /// Silence is produced, the source keeps its position
    Paused,
    /// Silence is produced until `play` is called again
    #[default]
    Stopped,
}

/// A data source bound for playback.
pub struct Sound {
    source: SharedDataSource,
    play_state: PlayState,
    loop_mode: LoopMode,
    frames_played: u64,
    logger: Logger,
}

impl Sound {
    /// Binds `source`. The sound starts stopped.
    ///
    /// # Errors
    ///
    /// `Uninitialized` if the source is not good.
    pub fn new(source: SharedDataSource, logger: Logger) -> Result<Self> {
        if !source.good() {
            logger.error(format_args!("Cannot bind a data source that is not ready"));
            return Err(PetalSonicError::Uninitialized(
                "data source is not ready for playback".into(),
            ));
        }

        Ok(Self {
            source,
            play_state: PlayState::Stopped,
            loop_mode: LoopMode::Once,
            frames_played: 0,
            logger,
        })
    }

    pub fn source(&self) -> &SharedDataSource {
        &self.source
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
    }

    /// Frames of real audio delivered since the sound was bound.
    pub fn frames_played(&self) -> u64 {
        self.frames_played
    }

    /// Resume playing from the current position
    pub fn play(&mut self) {
        self.play_state = PlayState::Playing;
    }

    /// Play from the first frame.
    ///
    /// # Errors
    ///
    /// `NotSupported` if the source cannot seek, as live streams do.
    pub fn play_from_beginning(&mut self) -> Result<()> {
        self.source.seek_to_pcm_frame(0)?;
        self.play();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.play_state = PlayState::Paused;
    }

    /// Stop this sound (keeps current position)
    pub fn stop(&mut self) {
        self.play_state = PlayState::Stopped;
    }

    /// Fills `out` with `frame_count` frames and returns how many came from
    /// the source. The rest is silence.
    ///
    /// While playing, an end of stream either rewinds the source
    /// ([`LoopMode::Infinite`] on a seekable source) or stops the sound.
    pub fn read_pcm_frames(&mut self, out: &mut [u8], frame_count: u64) -> Result<u64> {
        let format = self.source.data_format(&mut [])?;
        let bytes_per_frame = format.bytes_per_frame();
        let bytes = output_bytes(out, frame_count, bytes_per_frame)?;

        let mut delivered = 0u64;
        let mut rewound = false;
        while self.is_playing() && delivered < frame_count {
            let offset = delivered as usize * bytes_per_frame;
            let frames = self
                .source
                .read_pcm_frames(&mut out[offset..bytes], frame_count - delivered)?;

            if frames > 0 {
                delivered += frames;
                rewound = false;
                continue;
            }

            // A rewind that immediately hits the end again means an empty source
            let can_loop = self.loop_mode == LoopMode::Infinite && !rewound;
            if can_loop && self.source.seek_to_pcm_frame(0).is_ok() {
                rewound = true;
                continue;
            }

            self.logger.debug(format_args!(
                "Sound reached end of stream after {} frames",
                self.frames_played + delivered
            ));
            self.play_state = PlayState::Stopped;
        }

        let filled = delivered as usize * bytes_per_frame;
        out[filled..bytes].fill(0);

        self.frames_played += delivered;
        Ok(delivered)
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("play_state", &self.play_state)
            .field("loop_mode", &self.loop_mode)
            .field("frames_played", &self.frames_played)
            .finish_non_exhaustive()
    }
}
