//! # PetalSonic I/O
//!
//! The I/O edge between host applications and a pull-based audio engine.
//!
//! The engine pulls interleaved PCM frames from [`DataSource`]s on its
//! real-time thread and reads files through the handle-based [`Vfs`]
//! protocol. This crate provides both sides:
//!
//! - **[`StreamDataSource`]**: live stream fed by a producer thread through
//!   a ring buffer, delivering silence instead of stalling when it runs dry
//! - **[`SpscStreamSource`]**: lock-free variant with a fixed geometry
//! - **[`FileDataSource`]**: file decoded through any [`Vfs`]
//! - **[`VirtualFileBridge`]**: serves the [`Vfs`] protocol from a host
//!   supplied [`ByteStore`] (assets, archives, memory)
//! - **[`Sound`]**: uniform playback binding over any data source
//!
//! ## Quick Start
//!
//! ```no_run
//! use petalsonic_io::*;
//! use std::sync::Arc;
//!
//! let source = Arc::new(StreamDataSource::new(
//!     StreamSourceDesc::new().channels(1),
//!     Logger::default(),
//! )?);
//!
//! // Producer side
//! let samples: Vec<u8> = [0.0f32, 0.5, 1.0]
//!     .iter()
//!     .flat_map(|s| s.to_ne_bytes())
//!     .collect();
//! source.on_new_samples(&samples, 3)?;
//!
//! // Engine side
//! let mut sound = Sound::new(source.clone(), Logger::default())?;
//! sound.play();
//! let mut block = vec![0u8; 256 * 4];
//! sound.read_pcm_frames(&mut block, 256)?;
//!
//! for event in source.poll_events() {
//!     if event.is_error() {
//!         println!("stream event: {:?}", event);
//!     }
//! }
//! # Ok::<(), PetalSonicError>(())
//! ```
//!
//! ## Logging
//!
//! Components trace through the [`Logger`] they are given. The default one
//! forwards to the `log` crate under the `petalsonic_io` target.

pub mod config;
pub mod data_source;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod playback;
pub mod ring_buffer;
pub mod vfs;

pub use config::{StreamSourceDesc, VfsBridgeDesc};
pub use data_source::{
    DataSource, FileDataSource, PushOutcome, SharedDataSource, SpscStreamSource, StreamConsumer,
    StreamDataSource, StreamProducer,
};
pub use error::{ErrorKind, PetalSonicError};
pub use events::StreamEvent;
pub use format::{Channel, DataFormat, SampleFormat};
pub use logging::{LogHandler, Logger};
pub use playback::{LoopMode, PlayState, Sound};
pub use ring_buffer::{OverflowPolicy, RingBuffer};
pub use vfs::{
    ByteStore, ByteStream, FileInfo, FsByteStore, MemoryByteStore, OpenMode, SeekOrigin, Vfs,
    VfsFile, VfsHandle, VirtualFileBridge,
};
