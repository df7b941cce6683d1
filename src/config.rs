use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f64,
    #[serde(default = "default_max_peaks")]
    pub max_peaks: usize,
    #[serde(default = "default_fft_backend")]
    pub fft_backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Seconds an event stays visible after the consumer first sees it.
    #[serde(default = "default_lifetime")]
    pub lifetime: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_device")]
    pub device: Option<String>,
    /// Abort the producer when the sink cannot be opened instead of running headless.
    #[serde(default)]
    pub require: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            hop_size: default_hop_size(),
            threshold_db: default_threshold_db(),
            max_peaks: default_max_peaks(),
            fft_backend: default_fft_backend(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            lifetime: default_lifetime(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            device: default_device(),
            require: false,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            crf: default_crf(),
        }
    }
}

fn default_fft_size() -> usize { 1024 }
fn default_hop_size() -> usize { 512 }
fn default_threshold_db() -> f64 { -50.0 }
fn default_max_peaks() -> usize { 10 }
fn default_fft_backend() -> String { "radix2".into() }
fn default_capacity() -> usize { 128 }
fn default_lifetime() -> f64 { 1.0 }
fn default_command() -> String { "aplay".into() }
fn default_device() -> Option<String> { Some("pipewire".into()) }
fn default_width() -> u32 { 1000 }
fn default_height() -> u32 { 1000 }
fn default_fps() -> u32 { 60 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_crf() -> u32 { 18 }

impl Config {
    /// Reject values the analysis path cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        if a.fft_size < 4 || !a.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSize(a.fft_size));
        }
        if a.hop_size == 0 || a.hop_size > a.fft_size {
            return Err(ConfigError::HopSize {
                hop_size: a.hop_size,
                fft_size: a.fft_size,
            });
        }
        if a.max_peaks == 0 {
            return Err(ConfigError::MaxPeaks);
        }
        if !matches!(a.fft_backend.as_str(), "radix2" | "rustfft") {
            return Err(ConfigError::FftBackend(a.fft_backend.clone()));
        }
        if self.queue.capacity == 0 {
            return Err(ConfigError::QueueCapacity);
        }
        if !(self.queue.lifetime > 0.0) {
            return Err(ConfigError::Lifetime(self.queue.lifetime));
        }
        if self.render.fps == 0 {
            return Err(ConfigError::Fps);
        }
        Ok(())
    }
}

/// Explicit path first, then `auralis.toml` in the working directory, then the
/// per-user config locations.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("auralis.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("auralis").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("auralis").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Option<Config> {
    match toml::from_str(content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").expect("empty config parses");
        assert_eq!(cfg.analysis.fft_size, 1024);
        assert_eq!(cfg.analysis.hop_size, 512);
        assert_eq!(cfg.queue.capacity, 128);
        assert_eq!(cfg.playback.command, "aplay");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = parse_config(
            r#"
            [analysis]
            fft_size = 8192
            hop_size = 2048
            fft_backend = "rustfft"

            [queue]
            lifetime = 0.5
            "#,
        )
        .expect("config parses");
        assert_eq!(cfg.analysis.fft_size, 8192);
        assert_eq!(cfg.analysis.max_peaks, 10);
        assert_eq!(cfg.queue.capacity, 128);
        assert!((cfg.queue.lifetime - 0.5).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_block_sizes() {
        let mut cfg = Config::default();
        cfg.analysis.fft_size = 1000;
        assert_eq!(cfg.validate(), Err(ConfigError::FftSize(1000)));

        cfg.analysis.fft_size = 1024;
        cfg.analysis.hop_size = 2048;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::HopSize {
                hop_size: 2048,
                fft_size: 1024
            })
        );

        cfg.analysis.hop_size = 256;
        cfg.analysis.fft_backend = "fftw".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::FftBackend(_))));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(parse_config("[analysis\nfft_size = ").is_none());
    }
}
