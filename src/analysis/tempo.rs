//! Tempo estimation via onset-envelope autocorrelation
//!
//! The onset envelope is the half-wave-rectified spectral flux of the shared
//! magnitude spectrogram. Its autocorrelation is searched over lags in the
//! [40, 220] BPM range, with scores biased toward the common DJ band by a
//! triangular window centered at 120 BPM. Octave errors (half/double time)
//! are corrected by comparing the scores of the candidate and its octave.
//!
//! A completely flat envelope (silence, sustained tones) carries no tempo
//! information; such signals take the 120 BPM default with zero confidence
//! instead of failing, so downstream structure analysis can still run its
//! fallback path. An envelope with content but no prominent periodicity is a
//! genuine tempo failure.

use crate::analysis::stft::{Spectrogram, HOP_SIZE};
use crate::error::{FeatureStage, Result, SetforgeError};
use std::path::PathBuf;

/// Lower bound of the tempo search range
pub const MIN_BPM: f64 = 40.0;

/// Upper bound of the tempo search range
pub const MAX_BPM: f64 = 220.0;

/// Tempo assigned to signals with no rhythmic content
pub const DEFAULT_BPM: f64 = 120.0;

/// The top autocorrelation peak must exceed this multiple of the median
/// autocorrelation value in the search range
const MIN_PEAK_RATIO: f64 = 1.15;

/// Fewer onset-active envelope frames than this means no rhythm to measure
const MIN_ACTIVE_FRAMES: usize = 8;

/// Octave candidates within this score ratio of the winner are preferred
const OCTAVE_SCORE_RATIO: f64 = 0.9;

/// Tempo estimation result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// BPM in [40, 220], rounded to one decimal
    pub bpm: f64,
    /// Peak prominence mapped to [0, 1]; 0.0 means the default was used
    pub confidence: f64,
}

/// Estimate the tempo of a track from its magnitude spectrogram
pub fn estimate_tempo(spec: &Spectrogram) -> Result<TempoEstimate> {
    let envelope = onset_envelope(spec);

    // Flat envelope: no onsets at all. Silence lands here; it gets the
    // default tempo rather than a hard failure.
    let env_max = envelope.iter().cloned().fold(0.0f64, f64::max);
    if envelope.len() < 8 || env_max <= 1e-6 {
        return Ok(TempoEstimate {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
        });
    }

    // A sustained tone produces a single attack transient and nothing else.
    // A handful of active frames is not rhythm; take the default as well.
    let active_frames = envelope.iter().filter(|v| **v > 0.05 * env_max).count();
    if active_frames < MIN_ACTIVE_FRAMES {
        return Ok(TempoEstimate {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
        });
    }

    let frame_rate = spec.sample_rate as f64 / HOP_SIZE as f64;
    let min_lag = ((60.0 * frame_rate) / MAX_BPM).floor().max(2.0) as usize;
    let max_lag = ((60.0 * frame_rate) / MIN_BPM).ceil() as usize;

    if envelope.len() <= max_lag + 1 {
        // Too short to autocorrelate across the slowest tempo; treat like a
        // flat envelope so very short clips still analyze.
        return Ok(TempoEstimate {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
        });
    }

    let ac = autocorrelate(&envelope, max_lag);
    let ac0 = ac[0];
    if ac0 <= 0.0 {
        return Ok(TempoEstimate {
            bpm: DEFAULT_BPM,
            confidence: 0.0,
        });
    }

    // Score each lag: normalized autocorrelation times the tempo-band bias
    let score_at = |lag: usize| -> f64 {
        let bpm = 60.0 * frame_rate / lag as f64;
        (ac[lag] / ac0) * band_weight(bpm)
    };

    let mut best_lag = min_lag;
    let mut best_score = f64::MIN;
    for lag in min_lag..=max_lag {
        let s = score_at(lag);
        if s > best_score {
            best_score = s;
            best_lag = lag;
        }
    }

    // Prominence gate against the median score in the search range
    let mut scores: Vec<f64> = (min_lag..=max_lag).map(score_at).collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = scores[scores.len() / 2].max(1e-9);
    if best_score <= 0.0 || best_score < MIN_PEAK_RATIO * median {
        return Err(SetforgeError::FeatureFailure {
            path: PathBuf::new(),
            stage: FeatureStage::Tempo,
            reason: format!(
                "no prominent tempo peak (peak/median {:.2})",
                best_score / median
            ),
        });
    }

    // Octave-error correction on the integer-lag candidates
    let bpm_of = |lag: f64| 60.0 * frame_rate / lag;
    let candidate_bpm = bpm_of(best_lag as f64);
    let corrected_lag = correct_octave(candidate_bpm, best_lag, min_lag, max_lag, &score_at);

    let refined_lag = refine_period(&ac, corrected_lag, max_lag);
    let bpm = bpm_of(refined_lag).clamp(MIN_BPM, MAX_BPM);

    let confidence = (ac[corrected_lag] / ac0).clamp(0.0, 1.0);

    Ok(TempoEstimate {
        bpm: (bpm * 10.0).round() / 10.0,
        confidence,
    })
}

/// Half-wave-rectified spectral flux per frame, mean-removed
fn onset_envelope(spec: &Spectrogram) -> Vec<f64> {
    let n = spec.num_frames();
    if n < 2 {
        return Vec::new();
    }

    let mut flux = Vec::with_capacity(n - 1);
    for t in 1..n {
        let mut sum = 0.0f64;
        for (cur, prev) in spec.frames[t].iter().zip(spec.frames[t - 1].iter()) {
            let d = (*cur - *prev) as f64;
            if d > 0.0 {
                sum += d;
            }
        }
        flux.push(sum);
    }
    flux
}

/// Autocorrelation of the mean-removed envelope, normalized by overlap length
fn autocorrelate(envelope: &[f64], max_lag: usize) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = envelope.iter().map(|v| v - mean).collect();

    let mut ac = vec![0.0f64; max_lag + 1];
    for (lag, slot) in ac.iter_mut().enumerate() {
        let count = n - lag;
        let mut sum = 0.0f64;
        for i in 0..count {
            sum += centered[i] * centered[i + lag];
        }
        *slot = sum / count as f64;
    }
    ac
}

/// Triangular bias window centered at 120 BPM
///
/// Unit weight at 120, falling linearly to 0.5 at +/-60 BPM, so the
/// [90, 150] band is favored without excluding the extremes.
fn band_weight(bpm: f64) -> f64 {
    1.0 - 0.5 * ((bpm - 120.0).abs() / 60.0).min(1.0)
}

/// Prefer the octave partner when the raw candidate sits in half/double-time
/// territory and the partner's score is close
fn correct_octave(
    candidate_bpm: f64,
    best_lag: usize,
    min_lag: usize,
    max_lag: usize,
    score_at: &dyn Fn(usize) -> f64,
) -> usize {
    let best_score = score_at(best_lag);

    if candidate_bpm < 80.0 {
        // Probably half time: test the doubled tempo (half the lag)
        let double_lag = best_lag / 2;
        if double_lag >= min_lag {
            let local = local_peak(double_lag, min_lag, max_lag, score_at);
            if score_at(local) >= OCTAVE_SCORE_RATIO * best_score {
                return local;
            }
        }
    } else if candidate_bpm > 180.0 {
        // Probably double time: test the halved tempo (twice the lag)
        let half_lag = best_lag * 2;
        if half_lag <= max_lag {
            let local = local_peak(half_lag, min_lag, max_lag, score_at);
            if score_at(local) >= OCTAVE_SCORE_RATIO * best_score {
                return local;
            }
        }
    }
    best_lag
}

/// Nearest local score maximum within +/-2 lags of a seed position
fn local_peak(seed: usize, min_lag: usize, max_lag: usize, score_at: &dyn Fn(usize) -> f64) -> usize {
    let lo = seed.saturating_sub(2).max(min_lag);
    let hi = (seed + 2).min(max_lag);
    (lo..=hi)
        .max_by(|a, b| score_at(*a).partial_cmp(&score_at(*b)).unwrap())
        .unwrap_or(seed)
}

/// Refine the beat period to sub-lag precision
///
/// Parabolic interpolation at the peak, then averaged across the peak's
/// harmonics (lag, 2*lag, 3*lag, ...) which divides the interpolation error
/// by the harmonic index.
fn refine_period(ac: &[f64], lag: usize, max_lag: usize) -> f64 {
    let mut estimates: Vec<(f64, f64)> = Vec::new(); // (period, weight)

    for k in 1..=4usize {
        let seed = lag * k;
        if seed + 2 > max_lag {
            break;
        }
        // Re-center on the actual local maximum near the harmonic
        let lo = seed.saturating_sub(2).max(1);
        let hi = (seed + 2).min(max_lag - 1);
        let peak = (lo..=hi)
            .max_by(|a, b| ac[*a].partial_cmp(&ac[*b]).unwrap())
            .unwrap_or(seed);
        if peak == 0 || peak + 1 > max_lag {
            continue;
        }

        let refined = parabolic_peak(ac[peak - 1], ac[peak], ac[peak + 1], peak as f64);
        estimates.push((refined / k as f64, k as f64));
    }

    if estimates.is_empty() {
        return lag as f64;
    }

    let weight_sum: f64 = estimates.iter().map(|(_, w)| w).sum();
    estimates.iter().map(|(p, w)| p * w).sum::<f64>() / weight_sum
}

/// Vertex of the parabola through three equally spaced points
fn parabolic_peak(left: f64, center: f64, right: f64, center_x: f64) -> f64 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return center_x;
    }
    let delta = 0.5 * (left - right) / denom;
    // Clamp implausible vertices from flat/asymmetric neighborhoods
    center_x + delta.clamp(-0.5, 0.5)
}
