//! Track structure and mix-point analysis
//!
//! The smoothed RMS envelope is segmented with penalty-based binary
//! splitting (a 1-D regression tree over the envelope): the split with the
//! largest squared-error reduction is applied while the reduction beats a
//! variance-scaled penalty, bounded to 4-8 segments of at least 8 seconds.
//!
//! Sections are labeled by rule: first is the intro, last the outro, the
//! most energetic middle segment the drop, a quiet middle segment flanked by
//! louder neighbors a breakdown, everything else a verse.
//!
//! Mix points snap to 16-bar phrase boundaries at the detected tempo: the
//! mix-in is the first phrase boundary at or after the intro ends (first
//! half of the track), the mix-out the last phrase boundary at or before the
//! outro starts (second half). When segmentation cannot find three sections
//! the percentage fallback applies and the record carries a flag.

use crate::analysis::energy::{normalize_rms, rms_envelope};
use crate::analysis::stft::HOP_SIZE;
use crate::types::{Section, SectionLabel};
use tracing::debug;

/// Beats per bar (4/4 assumed throughout)
const BEATS_PER_BAR: f64 = 4.0;

/// Bars per mixing phrase
const BARS_PER_PHRASE: f64 = 16.0;

/// Envelope smoothing window in seconds
const SMOOTHING_WINDOW_S: f64 = 2.0;

/// Minimum section length in seconds
const MIN_SECTION_S: f64 = 8.0;

/// Maximum number of sections
const MAX_SECTIONS: usize = 8;

/// Minimum number of sections before the fallback applies
const MIN_SECTIONS: usize = 3;

/// Split penalty as a multiple of (envelope variance x minimum segment length)
const SPLIT_PENALTY_FACTOR: f64 = 1.0;

/// Fallback mix-in position as a fraction of the duration
const FALLBACK_IN_FRACTION: f64 = 0.15;

/// Fallback mix-out position as a fraction of the duration
const FALLBACK_OUT_FRACTION: f64 = 0.85;

/// Structure analysis result
#[derive(Debug, Clone)]
pub struct StructureResult {
    pub sections: Vec<Section>,
    pub mix_in_s: f64,
    pub mix_out_s: f64,
    /// True when the percentage fallback produced the mix points
    pub fallback: bool,
}

/// Seconds per bar at the given tempo
pub fn bar_length(bpm: f64) -> f64 {
    BEATS_PER_BAR * 60.0 / bpm
}

/// Seconds per 16-bar phrase at the given tempo
pub fn phrase_length(bpm: f64) -> f64 {
    BARS_PER_PHRASE * bar_length(bpm)
}

/// Analyze the structural sections and mix points of a track
pub fn analyze_structure(
    samples: &[f32],
    sample_rate: u32,
    duration_s: f64,
    bpm: f64,
) -> StructureResult {
    let envelope = smooth(
        &rms_envelope(samples, HOP_SIZE),
        ((SMOOTHING_WINDOW_S * sample_rate as f64) / HOP_SIZE as f64) as usize,
    );
    let frame_dur = HOP_SIZE as f64 / sample_rate as f64;

    let min_seg_frames = ((MIN_SECTION_S / frame_dur) as usize).max(2);
    let boundaries = segment_envelope(&envelope, min_seg_frames);

    if boundaries.len() < MIN_SECTIONS + 1 {
        debug!(
            "segmentation found {} sections, using fallback",
            boundaries.len().saturating_sub(1)
        );
        return fallback_structure(&envelope, frame_dur, duration_s, bpm);
    }

    let sections = build_sections(&envelope, &boundaries, frame_dur, duration_s, bpm);

    // Intro ends where the first section ends; outro starts at the last
    let intro_end = sections[0].end_s;
    let outro_start = sections[sections.len() - 1].start_s;

    let phrase = phrase_length(bpm);
    let mix_in = (phrase * (intro_end / phrase).ceil()).clamp(0.0, duration_s / 2.0);
    let mix_out = (phrase * (outro_start / phrase).floor()).clamp(duration_s / 2.0, duration_s);

    if mix_out <= mix_in {
        // Clamping collapsed the mix window (short track, long phrases)
        let mut result = fallback_structure(&envelope, frame_dur, duration_s, bpm);
        result.sections = sections;
        return result;
    }

    StructureResult {
        sections,
        mix_in_s: mix_in,
        mix_out_s: mix_out,
        fallback: false,
    }
}

// =============================================================================
// Segmentation
// =============================================================================

/// Moving-average smoothing
fn smooth(envelope: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    if envelope.len() <= window {
        return envelope.to_vec();
    }
    let half = window / 2;
    (0..envelope.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(envelope.len());
            envelope[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

/// Penalty-based binary splitting over the 1-D envelope
///
/// Returns boundary frame indices including 0 and envelope.len().
fn segment_envelope(envelope: &[f64], min_seg_frames: usize) -> Vec<usize> {
    let n = envelope.len();
    if n < 2 * min_seg_frames {
        return vec![0, n];
    }

    let prefix = PrefixSums::new(envelope);
    let global_var = prefix.sse(0, n) / n as f64;
    let penalty = SPLIT_PENALTY_FACTOR * global_var * min_seg_frames as f64;

    let mut boundaries = vec![0usize, n];

    while boundaries.len() - 1 < MAX_SECTIONS {
        // Best split across all current segments
        let mut best: Option<(f64, usize)> = None; // (gain, split index)
        for w in boundaries.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            if hi - lo < 2 * min_seg_frames {
                continue;
            }
            if let Some((gain, at)) = prefix.best_split(lo, hi, min_seg_frames) {
                if best.map_or(true, |(g, _)| gain > g) {
                    best = Some((gain, at));
                }
            }
        }

        match best {
            Some((gain, at)) if gain > penalty => {
                let pos = boundaries.binary_search(&at).unwrap_or_else(|p| p);
                boundaries.insert(pos, at);
            }
            _ => break,
        }
    }

    boundaries
}

/// Prefix sums for O(1) segment SSE queries
struct PrefixSums {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl PrefixSums {
    fn new(values: &[f64]) -> Self {
        let mut sum = Vec::with_capacity(values.len() + 1);
        let mut sum_sq = Vec::with_capacity(values.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        for v in values {
            sum.push(sum.last().unwrap() + v);
            sum_sq.push(sum_sq.last().unwrap() + v * v);
        }
        Self { sum, sum_sq }
    }

    /// Sum of squared deviations from the mean over [lo, hi)
    fn sse(&self, lo: usize, hi: usize) -> f64 {
        let n = (hi - lo) as f64;
        if n <= 0.0 {
            return 0.0;
        }
        let s = self.sum[hi] - self.sum[lo];
        let sq = self.sum_sq[hi] - self.sum_sq[lo];
        (sq - s * s / n).max(0.0)
    }

    /// Split of [lo, hi) maximizing the SSE reduction, honoring the minimum
    /// segment length on both sides
    fn best_split(&self, lo: usize, hi: usize, min_len: usize) -> Option<(f64, usize)> {
        let total = self.sse(lo, hi);
        let mut best: Option<(f64, usize)> = None;
        for at in (lo + min_len)..=(hi - min_len) {
            let gain = total - self.sse(lo, at) - self.sse(at, hi);
            if best.map_or(true, |(g, _)| gain > g) {
                best = Some((gain, at));
            }
        }
        best
    }
}

// =============================================================================
// Labeling and section construction
// =============================================================================

fn build_sections(
    envelope: &[f64],
    boundaries: &[usize],
    frame_dur: f64,
    duration_s: f64,
    bpm: f64,
) -> Vec<Section> {
    let count = boundaries.len() - 1;
    let means: Vec<f64> = (0..count)
        .map(|i| segment_mean(envelope, boundaries[i], boundaries[i + 1]))
        .collect();

    let labels = label_sections(&means);
    let t_bar = bar_length(bpm);

    (0..count)
        .map(|i| {
            // Pin the outer edges to the exact track bounds
            let start_s = if i == 0 {
                0.0
            } else {
                boundaries[i] as f64 * frame_dur
            };
            let end_s = if i == count - 1 {
                duration_s
            } else {
                boundaries[i + 1] as f64 * frame_dur
            };
            Section {
                label: labels[i],
                start_s,
                end_s,
                start_bar: to_bar(start_s, t_bar),
                end_bar: to_bar(end_s, t_bar),
                avg_energy: normalize_rms(means[i]),
            }
        })
        .collect()
}

/// Round a boundary to the nearest bar index
fn to_bar(time_s: f64, t_bar: f64) -> u32 {
    (time_s / t_bar).round().max(0.0) as u32
}

/// Rule-based labels from per-segment mean energies
fn label_sections(means: &[f64]) -> Vec<SectionLabel> {
    let n = means.len();
    let mut labels = vec![SectionLabel::Verse; n];
    if n == 0 {
        return labels;
    }

    labels[0] = SectionLabel::Intro;
    labels[n - 1] = SectionLabel::Outro;
    if n <= 2 {
        return labels;
    }

    let mut sorted = means.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = sorted[sorted.len() / 2];

    // Drop: loudest middle segment
    let drop_idx = (1..n - 1)
        .max_by(|a, b| means[*a].partial_cmp(&means[*b]).unwrap())
        .unwrap();
    labels[drop_idx] = SectionLabel::Drop;

    // Breakdown: a quiet valley between louder neighbors
    for i in 1..n - 1 {
        if labels[i] != SectionLabel::Verse {
            continue;
        }
        if means[i] < 0.5 * median && means[i - 1] > means[i] && means[i + 1] > means[i] {
            labels[i] = SectionLabel::Breakdown;
        }
    }

    labels
}

// =============================================================================
// Fallback
// =============================================================================

/// Percentage-based mix points with a minimal intro/verse/outro skeleton
fn fallback_structure(
    envelope: &[f64],
    frame_dur: f64,
    duration_s: f64,
    bpm: f64,
) -> StructureResult {
    let phrase = phrase_length(bpm);
    let mix_in = phrase.min(duration_s * FALLBACK_IN_FRACTION);
    let mix_out = (duration_s - phrase).max(duration_s * FALLBACK_OUT_FRACTION);

    let t_bar = bar_length(bpm);
    let energy_between = |lo_s: f64, hi_s: f64| -> f64 {
        if envelope.is_empty() || frame_dur <= 0.0 {
            return 0.0;
        }
        let lo = ((lo_s / frame_dur) as usize).min(envelope.len().saturating_sub(1));
        let hi = ((hi_s / frame_dur) as usize).clamp(lo + 1, envelope.len());
        normalize_rms(segment_mean(envelope, lo, hi))
    };

    let make = |label, start_s: f64, end_s: f64| Section {
        label,
        start_s,
        end_s,
        start_bar: to_bar(start_s, t_bar),
        end_bar: to_bar(end_s, t_bar),
        avg_energy: energy_between(start_s, end_s),
    };

    StructureResult {
        sections: vec![
            make(SectionLabel::Intro, 0.0, mix_in),
            make(SectionLabel::Verse, mix_in, mix_out),
            make(SectionLabel::Outro, mix_out, duration_s),
        ],
        mix_in_s: mix_in,
        mix_out_s: mix_out,
        fallback: true,
    }
}

fn segment_mean(envelope: &[f64], lo: usize, hi: usize) -> f64 {
    if hi <= lo || lo >= envelope.len() {
        return 0.0;
    }
    let hi = hi.min(envelope.len());
    envelope[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic track: quiet intro, loud body with a breakdown valley,
    /// quiet outro, amplitudes chosen to force clear envelope steps
    fn shaped_track(sample_rate: u32) -> (Vec<f32>, f64) {
        use std::f32::consts::PI;
        // (duration_s, amplitude)
        let plan: &[(f64, f32)] = &[
            (20.0, 0.05), // intro
            (40.0, 0.35), // verse
            (30.0, 0.6),  // drop
            (20.0, 0.05), // breakdown
            (40.0, 0.4),  // verse
            (20.0, 0.05), // outro
        ];
        let mut samples = Vec::new();
        for (dur, amp) in plan {
            let n = (dur * sample_rate as f64) as usize;
            for i in 0..n {
                samples.push(amp * (2.0 * PI * 110.0 * i as f32 / sample_rate as f32).sin());
            }
        }
        let duration = samples.len() as f64 / sample_rate as f64;
        (samples, duration)
    }

    #[test]
    fn test_sections_cover_duration_contiguously() {
        let sr = 22050;
        let (samples, duration) = shaped_track(sr);
        let result = analyze_structure(&samples, sr, duration, 128.0);

        let sections = &result.sections;
        assert!(sections.len() >= 3);
        assert_eq!(sections[0].start_s, 0.0);
        assert!((sections.last().unwrap().end_s - duration).abs() < 1e-9);
        for pair in sections.windows(2) {
            assert!(
                (pair[0].end_s - pair[1].start_s).abs() < 1e-9,
                "gap between sections"
            );
        }
    }

    #[test]
    fn test_first_intro_last_outro() {
        let sr = 22050;
        let (samples, duration) = shaped_track(sr);
        let result = analyze_structure(&samples, sr, duration, 128.0);
        assert_eq!(result.sections[0].label, SectionLabel::Intro);
        assert_eq!(result.sections.last().unwrap().label, SectionLabel::Outro);
    }

    #[test]
    fn test_drop_is_loudest_middle_section() {
        let sr = 22050;
        let (samples, duration) = shaped_track(sr);
        let result = analyze_structure(&samples, sr, duration, 128.0);

        let drop = result
            .sections
            .iter()
            .find(|s| s.label == SectionLabel::Drop);
        assert!(drop.is_some(), "no drop labeled: {:?}", result.sections);
        let drop_energy = drop.unwrap().avg_energy;
        for s in &result.sections[1..result.sections.len() - 1] {
            assert!(s.avg_energy <= drop_energy + 1e-9);
        }
    }

    #[test]
    fn test_mix_points_on_phrase_grid() {
        let sr = 22050;
        let (samples, duration) = shaped_track(sr);
        let result = analyze_structure(&samples, sr, duration, 128.0);
        assert!(!result.fallback);

        let phrase = phrase_length(128.0);
        let in_phrases = result.mix_in_s / phrase;
        let out_phrases = result.mix_out_s / phrase;
        assert!(
            (in_phrases - in_phrases.round()).abs() < 1e-6,
            "mix_in {} not on phrase grid",
            result.mix_in_s
        );
        assert!(
            (out_phrases - out_phrases.round()).abs() < 1e-6,
            "mix_out {} not on phrase grid",
            result.mix_out_s
        );
        assert!(result.mix_in_s < result.mix_out_s);
        assert!(result.mix_in_s <= duration / 2.0);
        assert!(result.mix_out_s >= duration / 2.0);
    }

    #[test]
    fn test_silence_takes_fallback() {
        let sr = 22050;
        let duration = 180.0;
        let samples = vec![0.0f32; (duration * sr as f64) as usize];
        let result = analyze_structure(&samples, sr, duration, 120.0);

        assert!(result.fallback);
        // phrase at 120 BPM = 32 s; 0.15 * 180 = 27, 0.85 * 180 = 153
        assert!((result.mix_in_s - 27.0).abs() < 0.5, "mix_in {}", result.mix_in_s);
        assert!(
            (result.mix_out_s - 153.0).abs() < 0.5,
            "mix_out {}",
            result.mix_out_s
        );
        assert_eq!(result.sections.len(), 3);
        assert_eq!(result.sections[1].label, SectionLabel::Verse);
    }

    #[test]
    fn test_short_track_fallback_orders_points() {
        let sr = 22050;
        let duration = 20.0;
        let samples = vec![0.0f32; (duration * sr as f64) as usize];
        let result = analyze_structure(&samples, sr, duration, 120.0);
        assert!(result.fallback);
        assert!(result.mix_in_s < result.mix_out_s);
        assert!(result.mix_out_s <= duration);
    }

    #[test]
    fn test_bar_length() {
        assert!((bar_length(120.0) - 2.0).abs() < 1e-12);
        assert!((phrase_length(120.0) - 32.0).abs() < 1e-12);
        assert!((bar_length(128.0) - 1.875).abs() < 1e-12);
    }

    #[test]
    fn test_segment_count_bounds() {
        let sr = 22050;
        let (samples, duration) = shaped_track(sr);
        let result = analyze_structure(&samples, sr, duration, 128.0);
        assert!(result.sections.len() >= 3 && result.sections.len() <= MAX_SECTIONS);
    }
}
