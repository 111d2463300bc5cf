//! Loudness features: overall energy and bass intensity
//!
//! Energy is the trimmed mean of per-second RMS values, normalized so an
//! RMS of 0.4 (a loud, heavily limited master) maps to full scale. Bass
//! intensity is the mean per-frame share of spectral magnitude in the
//! 20-200 Hz band.

use crate::analysis::stft::Spectrogram;

/// RMS value mapped to energy 1.0
const FULL_SCALE_RMS: f64 = 0.4;

/// Fraction of frames trimmed from each end of the sorted RMS values
const TRIM_FRACTION: f64 = 0.05;

/// Bass band bounds in Hz
const BASS_LOW_HZ: f32 = 20.0;
const BASS_HIGH_HZ: f32 = 200.0;

/// Overall track energy in [0, 1]
///
/// RMS over non-overlapping 1 second frames, bottom and top 5% of frames
/// dropped, mean of the remainder scaled by [`FULL_SCALE_RMS`].
pub fn track_energy(samples: &[f32], sample_rate: u32) -> f64 {
    if samples.is_empty() || sample_rate == 0 {
        return 0.0;
    }

    let frame_len = sample_rate as usize;
    let mut frame_rms: Vec<f64> = samples
        .chunks(frame_len)
        .map(|frame| rms(frame))
        .collect();

    frame_rms.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let trim = (frame_rms.len() as f64 * TRIM_FRACTION) as usize;
    let kept = if frame_rms.len() > 2 * trim {
        &frame_rms[trim..frame_rms.len() - trim]
    } else {
        &frame_rms[..]
    };

    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    (mean / FULL_SCALE_RMS).clamp(0.0, 1.0)
}

/// Bass intensity in [0, 1]
///
/// Per frame: sum of magnitudes in [20, 200] Hz over the sum in
/// [20, sr/2] Hz; reported as the mean over all frames.
pub fn bass_intensity(spec: &Spectrogram) -> f64 {
    if spec.num_frames() == 0 {
        return 0.0;
    }

    let nyquist = spec.sample_rate as f32 / 2.0;
    let mut ratios = Vec::with_capacity(spec.num_frames());

    for frame in &spec.frames {
        let mut bass = 0.0f64;
        let mut total = 0.0f64;
        for (k, mag) in frame.iter().enumerate() {
            let freq = spec.bin_frequency(k);
            if freq < BASS_LOW_HZ || freq > nyquist {
                continue;
            }
            total += *mag as f64;
            if freq <= BASS_HIGH_HZ {
                bass += *mag as f64;
            }
        }
        if total > 0.0 {
            ratios.push(bass / total);
        }
    }

    if ratios.is_empty() {
        return 0.0;
    }
    (ratios.iter().sum::<f64>() / ratios.len() as f64).clamp(0.0, 1.0)
}

/// Per-hop RMS envelope used by the structure analyzer
pub(crate) fn rms_envelope(samples: &[f32], hop: usize) -> Vec<f64> {
    if samples.is_empty() || hop == 0 {
        return Vec::new();
    }
    samples.chunks(hop).map(|frame| rms(frame)).collect()
}

fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame
        .iter()
        .map(|s| {
            let v = *s as f64;
            // NaN/Inf samples are decode defects; score them as silence
            if v.is_finite() {
                v * v
            } else {
                0.0
            }
        })
        .sum();
    (sum_sq / frame.len() as f64).sqrt()
}

/// Normalize an RMS value the same way [`track_energy`] does
pub(crate) fn normalize_rms(value: f64) -> f64 {
    (value / FULL_SCALE_RMS).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stft::StftProcessor;

    #[test]
    fn test_silence_scores_zero() {
        assert_eq!(track_energy(&vec![0.0; 22050 * 3], 22050), 0.0);
    }

    #[test]
    fn test_full_scale_square_wave_saturates() {
        // RMS of a +/-1 square wave is 1.0, far past the 0.4 full-scale point
        let samples: Vec<f32> = (0..22050 * 3)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        assert_eq!(track_energy(&samples, 22050), 1.0);
    }

    #[test]
    fn test_sine_energy_in_range() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..22050 * 5)
            .map(|i| 0.2 * (2.0 * PI * 220.0 * i as f32 / 22050.0).sin())
            .collect();
        let e = track_energy(&samples, 22050);
        // RMS of 0.2 amplitude sine = 0.1414 -> ~0.354 normalized
        assert!((e - 0.354).abs() < 0.02, "energy {}", e);
    }

    #[test]
    fn test_trim_drops_outlier_frames() {
        // One loud second among 20 quiet ones falls inside the 5% trim
        let sr = 1000u32;
        let mut samples = vec![0.01f32; 20 * sr as usize];
        for s in samples.iter_mut().take(sr as usize) {
            *s = 0.9;
        }
        let e = track_energy(&samples, sr);
        assert!(e < 0.1, "outlier not trimmed: {}", e);
    }

    #[test]
    fn test_bass_heavy_signal() {
        use std::f32::consts::PI;
        let sr = 22050u32;
        // 60 Hz tone: nearly all magnitude below 200 Hz
        let samples: Vec<f32> = (0..sr as usize * 3)
            .map(|i| 0.5 * (2.0 * PI * 60.0 * i as f32 / sr as f32).sin())
            .collect();
        let mut proc = StftProcessor::new();
        let spec = proc.magnitudes(&samples, sr);
        let bass = bass_intensity(&spec);
        assert!(bass > 0.7, "bass {}", bass);
    }

    #[test]
    fn test_treble_signal_low_bass() {
        use std::f32::consts::PI;
        let sr = 22050u32;
        let samples: Vec<f32> = (0..sr as usize * 3)
            .map(|i| 0.5 * (2.0 * PI * 4000.0 * i as f32 / sr as f32).sin())
            .collect();
        let mut proc = StftProcessor::new();
        let spec = proc.magnitudes(&samples, sr);
        let bass = bass_intensity(&spec);
        assert!(bass < 0.2, "bass {}", bass);
    }

    #[test]
    fn test_rms_ignores_non_finite() {
        let samples = vec![f32::NAN, 0.5, f32::INFINITY, 0.5];
        let value = rms(&samples);
        assert!(value.is_finite());
    }
}
