use super::features::{HarmonicTimbre, PeakFeatures, SpectralPeak};
use super::fft::Complex64;

/// Linear magnitude floor before conversion to dB.
const MAGNITUDE_FLOOR: f64 = 1e-12;
/// Harmonics at or below this level end the series.
pub const SILENCE_DB: f64 = -120.0;
pub const MAX_HARMONICS: usize = 100;

/// dBFS magnitudes of the non-redundant half (`N/2 + 1` bins) of a real-input
/// spectrum, scaled so a full-scale rectangular sine reads about 0 dB.
pub fn magnitude_spectrum_db(spectrum: &[Complex64]) -> Vec<f64> {
    let n = spectrum.len();
    let scale = n as f64 * 0.5;
    spectrum[..n / 2 + 1]
        .iter()
        .map(|c| 20.0 * (c.norm() / scale).max(MAGNITUDE_FLOOR).log10())
        .collect()
}

/// Interior local maxima above `threshold_db`, strongest first, at most `max_peaks`.
///
/// A bin must be strictly above its left neighbour and at least its right
/// neighbour, so a plateau is reported at its leftmost bin. Equal magnitudes keep
/// ascending bin order.
pub fn select_peaks(mag_db: &[f64], threshold_db: f64, max_peaks: usize) -> Vec<SpectralPeak> {
    let mut peaks: Vec<SpectralPeak> = mag_db
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > threshold_db && w[1] > w[0] && w[1] >= w[2])
        .map(|(i, w)| SpectralPeak {
            bin: i + 1,
            magnitude_db: w[1],
        })
        .collect();

    peaks.sort_by(|a, b| b.magnitude_db.total_cmp(&a.magnitude_db));
    peaks.truncate(max_peaks);
    peaks
}

/// Parabolic vertex through bins `k-1, k, k+1`. Edge bins and flat
/// neighbourhoods come back unrefined.
pub fn interp_quadratic_bin(mag: &[f64], k: usize) -> f64 {
    if k == 0 || k + 1 >= mag.len() {
        return k as f64;
    }
    let (m1, m0, p1) = (mag[k - 1], mag[k], mag[k + 1]);
    let denom = m1 - 2.0 * m0 + p1;
    if denom.abs() < 1e-12 {
        return k as f64;
    }
    k as f64 + 0.5 * (m1 - p1) / denom
}

pub fn bin_to_frequency(bin: f64, sample_rate: u32, fft_size: usize) -> f64 {
    bin * sample_rate as f64 / fft_size as f64
}

/// dBFS at each integer multiple of `fundamental_hz`, nearest bin, until an
/// entry after the first reaches [`SILENCE_DB`] or [`MAX_HARMONICS`] is hit.
/// Multiples past the spectrum edge read as silence.
pub fn timbre_harmonics(mag_db: &[f64], fundamental_hz: f64, sample_rate: u32, fft_size: usize) -> Vec<f64> {
    let bin_width = sample_rate as f64 / fft_size as f64;
    let mut timbre = Vec::new();

    for h in 1..=MAX_HARMONICS {
        let target_bin = (h as f64 * fundamental_hz / bin_width).round();
        let amp = if target_bin >= 0.0 && (target_bin as usize) < mag_db.len() {
            mag_db[target_bin as usize]
        } else {
            SILENCE_DB
        };
        timbre.push(amp);
        if h > 1 && amp <= SILENCE_DB {
            break;
        }
    }
    timbre
}

/// Mean headroom above silence of the overtones (harmonics 2..), normalized by
/// `120 * len`. Not clamped.
pub fn fullness(timbre: &[f64]) -> f64 {
    if timbre.is_empty() {
        return 0.0;
    }
    let sum: f64 = timbre[1..].iter().map(|db| db - SILENCE_DB).sum();
    sum / (timbre.len() as f64 * -SILENCE_DB)
}

/// Pick, refine and characterize the dominant peaks of one spectrum.
pub fn extract_peaks(
    mag_db: &[f64],
    threshold_db: f64,
    max_peaks: usize,
    sample_rate: u32,
    fft_size: usize,
) -> Vec<PeakFeatures> {
    select_peaks(mag_db, threshold_db, max_peaks)
        .into_iter()
        .map(|peak| {
            let refined_bin = interp_quadratic_bin(mag_db, peak.bin);
            let frequency_hz = bin_to_frequency(refined_bin, sample_rate, fft_size);
            let harmonics_db = timbre_harmonics(mag_db, frequency_hz, sample_rate, fft_size);
            let fullness = fullness(&harmonics_db);
            PeakFeatures {
                peak,
                refined_bin,
                frequency_hz,
                timbre: HarmonicTimbre {
                    harmonics_db,
                    fullness,
                },
            }
        })
        .collect()
}
