use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid FFT size {0}: must be a power of two")]
    FftSize(usize),
    #[error("hop size must be in 1..={fft_size}, got {hop_size}")]
    HopSize { hop_size: usize, fft_size: usize },
    #[error("max_peaks must be at least 1")]
    MaxPeaks,
    #[error("queue capacity must be at least 1")]
    QueueCapacity,
    #[error("event lifetime must be positive, got {0}")]
    Lifetime(f64),
    #[error("render fps must be positive")]
    Fps,
    #[error("unknown FFT backend '{0}' (expected 'radix2' or 'rustfft')")]
    FftBackend(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported format: {channels} channel(s), only stereo input is analyzed")]
    UnsupportedFormat { channels: usize },
    #[error("failed to open playback sink at {sample_rate} Hz")]
    SinkOpen {
        sample_rate: u32,
        #[source]
        source: anyhow::Error,
    },
}
