/// Spatial cues for one analysis window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialFeatures {
    /// Right-to-left energy ratio in dB (positive = right-dominant)
    pub ild_db: f64,
    /// Best-correlating lag in seconds (positive = right delayed)
    pub itd_sec: f64,
    /// -90 (right) to +90 (left)
    pub azimuth_deg: f64,
    /// Side-to-mid energy ratio in dB
    pub width_db: f64,
    /// Pearson correlation between left and right
    pub correlation: f64,
}

/// A local maximum of the dBFS magnitude spectrum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectralPeak {
    pub bin: usize,
    pub magnitude_db: f64,
}

/// Harmonic series measured from a refined fundamental.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HarmonicTimbre {
    /// dBFS at 1x, 2x, 3x ... the fundamental
    pub harmonics_db: Vec<f64>,
    pub fullness: f64,
}

impl HarmonicTimbre {
    pub fn harmonic_count(&self) -> usize {
        self.harmonics_db.len()
    }
}

/// A retained peak with its sub-bin refinement and timbre.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakFeatures {
    pub peak: SpectralPeak,
    pub refined_bin: f64,
    pub frequency_hz: f64,
    pub timbre: HarmonicTimbre,
}

/// Everything extracted from one analysis window.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowFeatures {
    /// Window start in seconds from the beginning of the stream
    pub time: f64,
    pub spatial: SpatialFeatures,
    pub peaks: Vec<PeakFeatures>,
}
