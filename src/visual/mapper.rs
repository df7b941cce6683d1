use crate::audio::features::{PeakFeatures, WindowFeatures};

use super::event::VisualEvent;

const RADIUS_BASE: f32 = 0.02;
/// A full harmonic series (100 entries) tops out at radius 0.1.
const RADIUS_SCALE: f32 = 0.008;

pub fn map_features(
    azimuth_deg: f64,
    peak_freq_hz: f64,
    harmonic_count: usize,
    fullness: f64,
    peak_magnitude_db: f64,
) -> VisualEvent {
    let x = 0.5 + 0.4 * (azimuth_deg / 90.0);
    let y = (0.1 + 0.8 * peak_freq_hz / 1000.0).clamp(0.1, 0.9);
    let radius = RADIUS_BASE + RADIUS_SCALE * (harmonic_count as f32 / 10.0);
    let falloff = 0.8 + 1.2 * fullness;
    let intensity = 0.5 + ((peak_magnitude_db + 40.0) / 40.0).clamp(0.0, 1.0);

    VisualEvent::new(x as f32, y as f32, radius, falloff as f32, intensity as f32)
}

pub fn map_peak(azimuth_deg: f64, peak: &PeakFeatures) -> VisualEvent {
    map_features(
        azimuth_deg,
        peak.frequency_hz,
        peak.timbre.harmonic_count(),
        peak.timbre.fullness,
        peak.peak.magnitude_db,
    )
}

/// One event per retained peak, strongest first.
pub fn map_window(features: &WindowFeatures) -> Vec<VisualEvent> {
    features
        .peaks
        .iter()
        .map(|peak| map_peak(features.spatial.azimuth_deg, peak))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{HarmonicTimbre, SpatialFeatures, SpectralPeak};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn azimuth_sets_horizontal_position() {
        assert!(close(map_features(0.0, 500.0, 1, 0.0, -20.0).x, 0.5));
        assert!(close(map_features(90.0, 500.0, 1, 0.0, -20.0).x, 0.9));
        assert!(close(map_features(-90.0, 500.0, 1, 0.0, -20.0).x, 0.1));
    }

    #[test]
    fn frequency_sets_clamped_height() {
        assert!(close(map_features(0.0, 0.0, 1, 0.0, 0.0).y, 0.1));
        assert!(close(map_features(0.0, 500.0, 1, 0.0, 0.0).y, 0.5));
        assert!(close(map_features(0.0, 8000.0, 1, 0.0, 0.0).y, 0.9));
    }

    #[test]
    fn timbre_and_level_shape_the_circle() {
        let event = map_features(0.0, 440.0, 10, 0.5, -20.0);
        assert!(close(event.radius, 0.028));
        assert!(close(event.falloff, 1.4));
        assert!(close(event.intensity, 1.0));
        assert_eq!(event.timestamp, None);

        let full_series = map_features(0.0, 440.0, crate::audio::peaks::MAX_HARMONICS, 1.0, -20.0);
        assert!(close(full_series.radius, 0.1));

        assert!(close(map_features(0.0, 440.0, 0, 0.0, -80.0).intensity, 0.5));
        assert!(close(map_features(0.0, 440.0, 0, 0.0, 6.0).intensity, 1.5));
    }

    #[test]
    fn window_without_peaks_maps_to_nothing() {
        let features = WindowFeatures {
            time: 0.0,
            spatial: SpatialFeatures::default(),
            peaks: Vec::new(),
        };
        assert!(map_window(&features).is_empty());
    }

    #[test]
    fn each_peak_becomes_an_event() {
        let peak = |bin: usize, hz: f64| PeakFeatures {
            peak: SpectralPeak {
                bin,
                magnitude_db: -12.0,
            },
            refined_bin: bin as f64,
            frequency_hz: hz,
            timbre: HarmonicTimbre {
                harmonics_db: vec![-12.0, -30.0],
                fullness: 0.4,
            },
        };
        let features = WindowFeatures {
            time: 0.5,
            spatial: SpatialFeatures {
                azimuth_deg: 45.0,
                ..SpatialFeatures::default()
            },
            peaks: vec![peak(10, 430.0), peak(20, 861.0)],
        };
        let events = map_window(&features);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| close(e.x, 0.7)));
        assert!(events[0].y < events[1].y);
    }
}
