use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "auralis", about = "Real-time stereo audio analysis driving an audio-reactive visualizer")]
pub struct Cli {
    /// Input audio file (MP3)
    pub input: Option<PathBuf>,

    /// Config file (defaults to ./auralis.toml, then ~/.config/auralis/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Render the visuals to this video file instead of only draining events
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Feed the visualizer random events instead of analyzing audio
    #[arg(long)]
    pub demo: bool,

    /// Stop rendering after this many seconds (demo mode defaults to 10)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Skip the playback command; audio is paced to real time but not heard
    #[arg(long)]
    pub headless: bool,

    /// With --headless, analyze as fast as possible instead of in real time
    #[arg(long)]
    pub fast: bool,

    /// Do not mux the input audio into the rendered video
    #[arg(long)]
    pub no_audio: bool,

    /// Playback device passed to the player with -D
    #[arg(long)]
    pub device: Option<String>,

    /// FFT window length in samples (power of two)
    #[arg(long, default_value_t = 1024)]
    pub fft_size: usize,

    /// Samples between successive analysis windows
    #[arg(long, default_value_t = 512)]
    pub hop_size: usize,

    /// Peak detection threshold in dBFS
    #[arg(long, default_value_t = -50.0, allow_hyphen_values = true)]
    pub threshold: f64,

    /// Maximum spectral peaks kept per window
    #[arg(long, default_value_t = 10)]
    pub max_peaks: usize,

    /// FFT implementation: radix2 or rustfft
    #[arg(long, default_value = "radix2")]
    pub backend: String,

    /// Seconds each visual event stays on screen
    #[arg(long, default_value_t = 1.0)]
    pub lifetime: f64,

    /// Video width in pixels
    #[arg(long, default_value_t = 1000)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1000)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,
}
