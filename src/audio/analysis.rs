use crate::config::AnalysisConfig;
use crate::error::ConfigError;

use super::buffer::WindowView;
use super::features::WindowFeatures;
use super::fft::{make_engine, Complex64, FftEngine};
use super::{peaks, spatial, window};

/// Per-window analysis chain: spatial cues from left/right, then Hann window,
/// FFT and peak extraction on the mid channel.
pub struct Analyzer {
    fft: Box<dyn FftEngine>,
    window: Vec<f64>,
    scratch: Vec<Complex64>,
    threshold_db: f64,
    max_peaks: usize,
}

impl Analyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        let fft = make_engine(&config.fft_backend, config.fft_size)?;
        Ok(Self {
            fft,
            window: window::hann_window(config.fft_size),
            scratch: vec![Complex64::new(0.0, 0.0); config.fft_size],
            threshold_db: config.threshold_db,
            max_peaks: config.max_peaks,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    /// dBFS spectrum of the Hann-windowed `mid` block.
    pub fn spectrum_db(&mut self, mid: &[f32]) -> Vec<f64> {
        debug_assert_eq!(mid.len(), self.fft.size());
        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(mid).zip(&self.window) {
            *slot = Complex64::new(sample as f64 * w, 0.0);
        }
        self.fft.transform(&mut self.scratch);
        peaks::magnitude_spectrum_db(&self.scratch)
    }

    pub fn analyze(&mut self, view: WindowView<'_>, sample_rate: u32, time: f64) -> WindowFeatures {
        let spatial = spatial::analyze(view.left, view.right, sample_rate);
        let mag_db = self.spectrum_db(view.mid);
        let peaks = peaks::extract_peaks(
            &mag_db,
            self.threshold_db,
            self.max_peaks,
            sample_rate,
            self.fft.size(),
        );

        log::debug!(
            "[t={:.3}s] azimuth={:6.1}° ITD={:6.2} ms ILD={:6.2} dB width={:5.1} dB rho={:+.2} peaks={}",
            time,
            spatial.azimuth_deg,
            spatial.itd_sec * 1000.0,
            spatial.ild_db,
            spatial.width_db,
            spatial.correlation,
            peaks.len()
        );
        for p in &peaks {
            log::debug!(
                "   bin={:.2} freq={:8.2} Hz mag={:6.1} dBFS fullness={:.2}",
                p.refined_bin,
                p.frequency_hz,
                p.peak.magnitude_db,
                p.timbre.fullness
            );
        }

        WindowFeatures {
            time,
            spatial,
            peaks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const SR: u32 = 44_100;

    fn config(fft_size: usize, backend: &str) -> AnalysisConfig {
        AnalysisConfig {
            fft_size,
            hop_size: fft_size / 2,
            threshold_db: -50.0,
            max_peaks: 10,
            fft_backend: backend.into(),
        }
    }

    fn sine(bin: f64, n: usize) -> Vec<f32> {
        let freq = bin * SR as f64 / n as f64;
        (0..n)
            .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / SR as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn sine_peak_is_localized_and_refined() {
        let n = 1024;
        for backend in ["radix2", "rustfft"] {
            let mut analyzer = Analyzer::new(&config(n, backend)).expect("valid config");
            for &target in &[37.3, 100.0, 100.25, 200.4] {
                let mid = sine(target, n);
                let mag = analyzer.spectrum_db(&mid);
                let peaks = peaks::select_peaks(&mag, -50.0, 1);
                assert_eq!(peaks.len(), 1);
                let bin = peaks[0].bin as f64;
                assert!((bin - target.round()).abs() <= 1.0, "{backend}: bin {bin} for {target}");

                let refined = peaks::interp_quadratic_bin(&mag, peaks[0].bin);
                assert!((refined - target).abs() < 0.05, "{backend}: refined {refined} for {target}");
            }
        }
    }

    #[test]
    fn silent_window_has_no_peaks() {
        let n = 1024;
        let mut analyzer = Analyzer::new(&config(n, "radix2")).expect("valid config");
        let zeros = vec![0.0f32; n];
        let view = WindowView {
            left: &zeros,
            right: &zeros,
            mid: &zeros,
        };
        let features = analyzer.analyze(view, SR, 0.0);
        assert!(features.peaks.is_empty());
        assert_eq!(features.spatial.ild_db, 0.0);
    }

    #[test]
    fn centered_tone_reports_frequency() {
        let n = 2048;
        let mut analyzer = Analyzer::new(&config(n, "radix2")).expect("valid config");
        let tone = sine(93.0, n);
        let view = WindowView {
            left: &tone,
            right: &tone,
            mid: &tone,
        };
        let features = analyzer.analyze(view, SR, 1.5);

        assert_eq!(features.time, 1.5);
        let strongest = &features.peaks[0];
        let expected_hz = 93.0 * SR as f64 / n as f64;
        assert!((strongest.frequency_hz - expected_hz).abs() < 0.05 * SR as f64 / n as f64);
        assert!(strongest.timbre.harmonic_count() >= 2);
        assert!(features.spatial.azimuth_deg.abs() < 1e-9);
    }
}
