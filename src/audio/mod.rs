pub mod analysis;
pub mod buffer;
pub mod decode;
pub mod features;
pub mod fft;
pub mod peaks;
pub mod spatial;
pub mod window;
