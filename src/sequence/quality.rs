//! Playlist quality metrics
//!
//! Aggregate numbers over the adjacent pairs of a finished playlist. For
//! playlists shorter than two tracks the pairwise metrics are undefined:
//! `mean_compat` reports as None (JSON null) and the rest report zero,
//! never NaN.

use crate::sequence::compat::{self, SequencerParams};
use crate::sequence::strategy::Strategy;
use crate::types::TrackRecord;
use serde::{Deserialize, Serialize};

/// Harmonic sub-scores at or above this value count as a hit
const HARMONIC_HIT_THRESHOLD: f64 = 70.0;

/// Aggregate quality numbers for a sequenced playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Mean adjacent-pair compatibility; None when fewer than two tracks
    pub mean_compat: Option<f64>,
    /// Fraction of adjacent pairs with harmonic sub-score >= 70
    pub harmonic_hit_rate: f64,
    pub bpm_jump_max: f64,
    pub bpm_jump_p95: f64,
    pub bpm_jump_mean: f64,
    /// Pearson correlation of realized energies against the strategy's
    /// intended curve; 0 when undefined
    pub energy_correlation: f64,
    /// Count of adjacent pairs with differing genre
    pub genre_switches: u32,
}

impl QualityReport {
    pub fn empty() -> Self {
        Self {
            mean_compat: None,
            harmonic_hit_rate: 0.0,
            bpm_jump_max: 0.0,
            bpm_jump_p95: 0.0,
            bpm_jump_mean: 0.0,
            energy_correlation: 0.0,
            genre_switches: 0,
        }
    }
}

/// Evaluate a finished playlist
pub fn evaluate(playlist: &[TrackRecord], strategy: Strategy, params: &SequencerParams) -> QualityReport {
    if playlist.len() < 2 {
        return QualityReport::empty();
    }

    let len = playlist.len();
    let mut compat_sum = 0.0;
    let mut harmonic_hits = 0usize;
    let mut bpm_jumps = Vec::with_capacity(len - 1);
    let mut genre_switches = 0u32;

    for (i, pair) in playlist.windows(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);

        let direction = strategy.direction_at(i, len, params);
        compat_sum += compat::compatibility(a, b, params, direction);

        if compat::harmonic_score(&a.camelot, &b.camelot, params.allow_experimental)
            >= HARMONIC_HIT_THRESHOLD
        {
            harmonic_hits += 1;
        }

        bpm_jumps.push((a.bpm - b.bpm).abs());

        if a.genre.trim().to_lowercase() != b.genre.trim().to_lowercase() {
            genre_switches += 1;
        }
    }

    let pairs = (len - 1) as f64;
    bpm_jumps.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let realized: Vec<f64> = playlist.iter().map(|t| t.energy).collect();
    let intended = strategy.intended_curve(len, params);

    QualityReport {
        mean_compat: Some(compat_sum / pairs),
        harmonic_hit_rate: harmonic_hits as f64 / pairs,
        bpm_jump_max: *bpm_jumps.last().unwrap(),
        bpm_jump_p95: percentile(&bpm_jumps, 0.95),
        bpm_jump_mean: bpm_jumps.iter().sum::<f64>() / pairs,
        energy_correlation: pearson_or_zero(&realized, &intended),
        genre_switches,
    }
}

/// Percentile of pre-sorted values (nearest-rank)
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() as f64 * p).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

/// Pearson correlation, 0 when either series has no variance
fn pearson_or_zero(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a <= 1e-12 || var_b <= 1e-12 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::compat::tests::track;

    #[test]
    fn test_empty_and_singleton_are_defined() {
        let params = SequencerParams::default();
        let empty = evaluate(&[], Strategy::HarmonicFlow, &params);
        assert_eq!(empty.mean_compat, None);
        assert_eq!(empty.bpm_jump_mean, 0.0);

        let solo = vec![track("/a", "8A", 128.0, 0.5)];
        let single = evaluate(&solo, Strategy::HarmonicFlow, &params);
        assert_eq!(single.mean_compat, None);
        assert!(!single.harmonic_hit_rate.is_nan());
    }

    #[test]
    fn test_bpm_jump_statistics() {
        let playlist = vec![
            track("/a", "8A", 120.0, 0.5),
            track("/b", "8A", 124.0, 0.5),
            track("/c", "8A", 125.0, 0.5),
            track("/d", "8A", 135.0, 0.5),
        ];
        let report = evaluate(&playlist, Strategy::WarmUp, &SequencerParams::default());
        assert_eq!(report.bpm_jump_max, 10.0);
        assert!((report.bpm_jump_mean - 5.0).abs() < 1e-9);
        assert_eq!(report.bpm_jump_p95, 10.0);
    }

    #[test]
    fn test_harmonic_hit_rate() {
        let playlist = vec![
            track("/a", "8A", 128.0, 0.5),
            track("/b", "9A", 128.0, 0.5),  // 90: hit
            track("/c", "11A", 128.0, 0.5), // dist 2 = 70: hit
            track("/d", "5B", 128.0, 0.5),  // miss
        ];
        let report = evaluate(&playlist, Strategy::HarmonicFlow, &SequencerParams::default());
        assert!((report.harmonic_hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_genre_switches_case_insensitive() {
        let mut a = track("/a", "8A", 128.0, 0.5);
        let mut b = track("/b", "8A", 128.0, 0.5);
        let mut c = track("/c", "8A", 128.0, 0.5);
        a.genre = "Techno".into();
        b.genre = "techno".into();
        c.genre = "House".into();
        let report = evaluate(&[a, b, c], Strategy::HarmonicFlow, &SequencerParams::default());
        assert_eq!(report.genre_switches, 1);
    }

    #[test]
    fn test_energy_correlation_tracks_warm_up() {
        // Rising energies against Warm-Up's rising curve correlate strongly
        let playlist: Vec<_> = (0..6)
            .map(|i| track(&format!("/{}", i), "8A", 124.0, 0.2 + 0.1 * i as f64))
            .collect();
        let report = evaluate(&playlist, Strategy::WarmUp, &SequencerParams::default());
        assert!(report.energy_correlation > 0.99);

        let reversed: Vec<_> = playlist.into_iter().rev().collect();
        let report = evaluate(&reversed, Strategy::WarmUp, &SequencerParams::default());
        assert!(report.energy_correlation < -0.99);
    }

    #[test]
    fn test_flat_curve_reports_zero_correlation() {
        let playlist: Vec<_> = (0..4)
            .map(|i| track(&format!("/{}", i), "8A", 124.0, 0.2 + 0.1 * i as f64))
            .collect();
        // Consistent Enhanced intends a flat curve: correlation undefined -> 0
        let report = evaluate(
            &playlist,
            Strategy::ConsistentEnhanced,
            &SequencerParams::default(),
        );
        assert_eq!(report.energy_correlation, 0.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.95), 10.0);
        assert_eq!(percentile(&values, 0.5), 5.0);
    }
}
