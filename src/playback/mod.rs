pub mod aplay;

use std::time::{Duration, Instant};

use anyhow::Result;

pub use aplay::CommandSink;

pub const CHANNELS: u16 = 2;

/// Terminal state reported by a closed playback stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkStatus {
    Success,
    Failed(String),
}

/// Something that can start rendering interleaved stereo S16LE audio.
pub trait PlaybackSink: Send {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn SinkStream>>;
}

/// An open playback stream. Dropping without `close` abandons the stream.
pub trait SinkStream: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Signal end of data and wait for the sink to finish.
    fn close(self: Box<Self>) -> Result<SinkStatus>;
}

pub fn pcm_to_le_bytes(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Discards audio. With `realtime`, writes block for the duration of the audio
/// they carry so a headless run advances at playback speed.
pub struct NullSink {
    realtime: bool,
}

impl NullSink {
    pub fn new(realtime: bool) -> Self {
        Self { realtime }
    }
}

impl PlaybackSink for NullSink {
    fn open(&mut self, sample_rate: u32) -> Result<Box<dyn SinkStream>> {
        log::info!("Headless playback at {} Hz (realtime={})", sample_rate, self.realtime);
        Ok(Box::new(NullStream {
            realtime: self.realtime,
            bytes_per_second: sample_rate as f64 * CHANNELS as f64 * 2.0,
            started: Instant::now(),
            written: 0,
        }))
    }
}

struct NullStream {
    realtime: bool,
    bytes_per_second: f64,
    started: Instant,
    written: u64,
}

impl SinkStream for NullStream {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.written += bytes.len() as u64;
        if self.realtime && self.bytes_per_second > 0.0 {
            let due = Duration::from_secs_f64(self.written as f64 / self.bytes_per_second);
            if let Some(wait) = due.checked_sub(self.started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<SinkStatus> {
        log::debug!("Headless playback consumed {} bytes", self.written);
        Ok(SinkStatus::Success)
    }
}
