//! Short-time Fourier magnitudes for feature extraction
//!
//! All spectral features (onset envelope, chroma, bass ratio) share one
//! analysis frame: window 2048 samples, hop 512 (75% overlap), Hann window.
//! At the 22050 Hz analysis rate this gives ~93 ms frames with ~10.8 Hz
//! frequency resolution, enough to separate the 20-200 Hz bass band.
//!
//! The processor caches the FFT plan, the window, and a work buffer so
//! per-frame processing does not allocate.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT window size
pub const FRAME_SIZE: usize = 2048;

/// Hop length between frames
pub const HOP_SIZE: usize = 512;

/// Number of frequency bins in the positive-frequency half of the spectrum
pub const NUM_BINS: usize = FRAME_SIZE / 2 + 1; // 1025

/// Magnitude spectrogram: `frames[t][k]` is |X(t, k)|
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Center frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / FRAME_SIZE as f32
    }

    /// Time of frame `t` in seconds (frame start)
    pub fn frame_time(&self, t: usize) -> f64 {
        (t * HOP_SIZE) as f64 / self.sample_rate as f64
    }
}

/// Cached STFT processor
pub struct StftProcessor {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    work_buffer: Vec<Complex<f32>>,
}

impl StftProcessor {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);
        let window = hann_window(FRAME_SIZE);
        let work_buffer = vec![Complex::new(0.0, 0.0); FRAME_SIZE];

        Self {
            fft,
            window,
            work_buffer,
        }
    }

    /// Compute the magnitude spectrogram of a mono signal
    ///
    /// Signals shorter than one frame produce a single zero-padded frame.
    pub fn magnitudes(&mut self, samples: &[f32], sample_rate: u32) -> Spectrogram {
        let num_frames = if samples.len() >= FRAME_SIZE {
            (samples.len() - FRAME_SIZE) / HOP_SIZE + 1
        } else {
            1
        };

        let mut frames = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let start = frame_idx * HOP_SIZE;
            let end = (start + FRAME_SIZE).min(samples.len());

            for (i, buf) in self.work_buffer.iter_mut().enumerate() {
                if start + i < end {
                    *buf = Complex::new(samples[start + i] * self.window[i], 0.0);
                } else {
                    *buf = Complex::new(0.0, 0.0);
                }
            }

            self.fft.process(&mut self.work_buffer);

            frames.push(
                self.work_buffer[..NUM_BINS]
                    .iter()
                    .map(|c| c.norm())
                    .collect(),
            );
        }

        Spectrogram {
            frames,
            sample_rate,
        }
    }
}

impl Default for StftProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a Hann window of the given size
fn hann_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    if size == 0 {
        return Vec::new();
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
