use std::sync::Arc;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::ConfigError;

pub type Complex64 = Complex<f64>;

/// Forward complex transform over a block size fixed at construction.
pub trait FftEngine: Send {
    fn size(&self) -> usize;

    /// Transform `buffer` in place. `buffer.len()` must equal [`FftEngine::size`].
    fn transform(&mut self, buffer: &mut [Complex64]);
}

/// Iterative radix-2 Cooley-Tukey with a precomputed twiddle table.
pub struct Radix2Fft {
    size: usize,
    twiddles: Vec<Complex64>,
}

impl Radix2Fft {
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(ConfigError::FftSize(size));
        }
        let twiddles = (0..size / 2)
            .map(|k| {
                let angle = -2.0 * std::f64::consts::PI * k as f64 / size as f64;
                Complex64::new(angle.cos(), angle.sin())
            })
            .collect();
        Ok(Self { size, twiddles })
    }

    fn bit_reverse(buffer: &mut [Complex64]) {
        let n = buffer.len();
        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j ^= bit;
            if i < j {
                buffer.swap(i, j);
            }
        }
    }
}

impl FftEngine for Radix2Fft {
    fn size(&self) -> usize {
        self.size
    }

    fn transform(&mut self, buffer: &mut [Complex64]) {
        debug_assert_eq!(buffer.len(), self.size, "FFT block size mismatch");
        let n = self.size;
        Self::bit_reverse(buffer);

        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let u = buffer[start + k];
                    let v = buffer[start + k + half] * w;
                    buffer[start + k] = u + v;
                    buffer[start + k + half] = u - v;
                }
            }
            len <<= 1;
        }
    }
}

/// Planner-backed engine, selectable with `fft_backend = "rustfft"`.
pub struct RustFftEngine {
    fft: Arc<dyn rustfft::Fft<f64>>,
    scratch: Vec<Complex64>,
}

impl RustFftEngine {
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(ConfigError::FftSize(size));
        }
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Ok(Self { fft, scratch })
    }
}

impl FftEngine for RustFftEngine {
    fn size(&self) -> usize {
        self.fft.len()
    }

    fn transform(&mut self, buffer: &mut [Complex64]) {
        debug_assert_eq!(buffer.len(), self.fft.len(), "FFT block size mismatch");
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }
}

pub fn make_engine(backend: &str, size: usize) -> Result<Box<dyn FftEngine>, ConfigError> {
    match backend {
        "radix2" => Ok(Box::new(Radix2Fft::new(size)?)),
        "rustfft" => Ok(Box::new(RustFftEngine::new(size)?)),
        other => Err(ConfigError::FftBackend(other.to_string())),
    }
}
