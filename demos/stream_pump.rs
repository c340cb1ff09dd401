use petalsonic_io::{
    DataSource, Logger, MemoryByteStore, OpenMode, SampleFormat, Sound, StreamDataSource,
    StreamEvent, StreamSourceDesc, Vfs, VfsBridgeDesc, VirtualFileBridge,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: u32 = 48000;
const BLOCK_FRAMES: usize = 480;

/// Pushes a sine wave into a stream source while a simulated device pulls
/// fixed-size blocks from it.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let desc = StreamSourceDesc::new()
        .format(SampleFormat::F32)
        .sample_rate(SAMPLE_RATE)
        .channels(2)
        .buffered_samples(BLOCK_FRAMES * 4);
    let source = Arc::new(StreamDataSource::new(desc, Logger::default())?);
    let running = Arc::new(AtomicBool::new(true));

    // Producer: 440 Hz sine, pushed in bursts slightly faster than real time
    let producer = {
        let source = source.clone();
        let running = running.clone();
        thread::spawn(move || -> anyhow::Result<()> {
            let frequency = 440.0f32;
            let mut phase = 0.0f32;
            let mut block = Vec::with_capacity(BLOCK_FRAMES * 8);
            while running.load(Ordering::Relaxed) {
                block.clear();
                for _ in 0..BLOCK_FRAMES {
                    let sample = (phase * 2.0 * std::f32::consts::PI).sin() * 0.1;
                    block.extend_from_slice(&sample.to_ne_bytes());
                    block.extend_from_slice(&sample.to_ne_bytes());
                    phase = (phase + frequency / SAMPLE_RATE as f32).fract();
                }
                let outcome = source.on_new_samples(&block, BLOCK_FRAMES)?;
                if !outcome.is_complete() {
                    log::debug!("Producer dropped {} bytes", outcome.dropped_bytes);
                }
                thread::sleep(Duration::from_millis(9));
            }
            Ok(())
        })
    };

    // Device: pull one 10 ms block every 10 ms
    let mut sound = Sound::new(source.clone(), Logger::default())?;
    sound.play();
    let mut block = vec![0u8; BLOCK_FRAMES * 8];
    for _ in 0..100 {
        sound.read_pcm_frames(&mut block, BLOCK_FRAMES as u64)?;
        thread::sleep(Duration::from_millis(10));
    }

    running.store(false, Ordering::Relaxed);
    match producer.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("producer thread panicked"),
    }

    let events = source.poll_events();
    let underruns = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Underrun { .. }))
        .count();
    let overflows = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Overflow { .. }))
        .count();
    println!(
        "Pulled {} frames: {} underruns, {} overflows, {} frames still buffered",
        sound.frames_played(),
        underruns,
        overflows,
        source.buffered_frames()
    );

    // The same bytes can be served to a decoder through the file bridge
    let store = MemoryByteStore::new();
    store.insert("capture.raw", block);
    let bridge = VirtualFileBridge::new(Arc::new(store), VfsBridgeDesc::default(), Logger::default());
    let handle = bridge.open("capture.raw", OpenMode::Read)?;
    println!(
        "Captured block is {} bytes behind handle {}",
        bridge.info(handle)?.size_in_bytes,
        handle.as_raw()
    );
    bridge.close(handle)?;

    let mut map = [petalsonic_io::Channel::None; 2];
    println!("Stream format: {:?} {:?}", source.data_format(&mut map)?, map);
    Ok(())
}
