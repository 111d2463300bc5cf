//! Playlist construction
//!
//! Every strategy selects a deterministic seed and then appends greedily
//! from the remaining pool; sort-based strategies (Warm-Up, Cool-Down) are
//! plain orderings. All floating-point ties break on lexicographic path
//! order: the candidate pool is kept path-sorted and a strictly-greater
//! comparison keeps the earliest candidate.
//!
//! Strategy-specific hard filters never abort the sequence. When the BPM
//! window rejects every remaining candidate it widens in +1 BPM steps and a
//! `constraint_relaxed` event is logged.

use crate::sequence::compat::{compatibility, EnergyDirection, SequencerParams};
use crate::sequence::quality::{self, QualityReport};
use crate::sequence::strategy::{JourneyPhase, Strategy};
use crate::types::TrackRecord;
use tracing::info;

/// An ordered playlist plus its quality metrics
#[derive(Debug, Clone)]
pub struct SequenceResult {
    pub playlist: Vec<TrackRecord>,
    pub quality: QualityReport,
}

/// Order a set of analyzed tracks under the given strategy
///
/// The result is always a permutation of the input; an empty input yields
/// an empty playlist with zeroed metrics.
pub fn sequence(
    tracks: &[TrackRecord],
    strategy: Strategy,
    params: &SequencerParams,
) -> SequenceResult {
    let mut pool: Vec<TrackRecord> = tracks.to_vec();
    // Canonical pool order makes every downstream tie deterministic
    pool.sort_by(|a, b| a.path.cmp(&b.path));

    let playlist = match strategy {
        Strategy::WarmUp => sort_warm_up(pool),
        Strategy::CoolDown => sort_cool_down(pool),
        Strategy::ConsistentEnhanced => sort_consistent(pool, params),
        Strategy::GenreFlow => sort_genre_flow(pool, params),
        Strategy::EmotionalJourney => sort_emotional_journey(pool, params),
        _ => sort_greedy(pool, strategy, params),
    };

    let quality = quality::evaluate(&playlist, strategy, params);
    SequenceResult { playlist, quality }
}

// =============================================================================
// Greedy strategies
// =============================================================================

/// Harmonic Flow and its variants: greedy argmax compatibility inside a
/// widening BPM window
fn sort_greedy(pool: Vec<TrackRecord>, strategy: Strategy, params: &SequencerParams) -> Vec<TrackRecord> {
    if pool.is_empty() {
        return pool;
    }
    let total = pool.len();

    // Seed: Peak-Time and Energy Wave open on the quietest track, the flow
    // family on the slowest
    let seed = match strategy {
        Strategy::PeakTimeEnhanced | Strategy::EnergyWaveEnhanced => {
            min_index(&pool, |t| (t.energy, t.bpm))
        }
        _ => min_index(&pool, |t| (t.bpm, t.energy)),
    };

    greedy_walk(pool, seed, params, |current, candidate, position, rest| {
        let direction = strategy.direction_at(position, total, params);
        let step_params = step_params(strategy, params, position, total);
        let immediate = compatibility(current, candidate, &step_params, direction);

        match strategy {
            Strategy::HarmonicFlowEnhanced => {
                // One-step lookahead: keep the door open for the best
                // follow-up transition out of the candidate
                let next_direction = strategy.direction_at(position + 1, total, params);
                let best_next = rest
                    .iter()
                    .filter(|x| x.path != candidate.path)
                    .map(|x| compatibility(candidate, x, &step_params, next_direction))
                    .fold(0.0f64, f64::max);
                immediate + 0.5 * best_next
            }
            _ => immediate,
        }
    })
}

/// Per-step parameters: Smart Harmonic decays strictness from 10 at the
/// opening to 5 at the end of the set
fn step_params(
    strategy: Strategy,
    params: &SequencerParams,
    position: usize,
    total: usize,
) -> SequencerParams {
    match strategy {
        Strategy::SmartHarmonic => {
            let t = if total <= 1 {
                0.0
            } else {
                position as f64 / (total - 1) as f64
            };
            SequencerParams {
                harmonic_strictness: (10.0 - 5.0 * t).round() as u8,
                ..params.clone()
            }
        }
        _ => params.clone(),
    }
}

/// The greedy core: hard BPM window with monotone widening, then argmax of
/// the supplied score
fn greedy_walk<F>(
    mut pool: Vec<TrackRecord>,
    seed: usize,
    params: &SequencerParams,
    mut score: F,
) -> Vec<TrackRecord>
where
    F: FnMut(&TrackRecord, &TrackRecord, usize, &[TrackRecord]) -> f64,
{
    let mut playlist = Vec::with_capacity(pool.len());
    playlist.push(pool.remove(seed));

    while !pool.is_empty() {
        let current = playlist.last().unwrap().clone();
        let position = playlist.len() - 1;

        let candidates = window_candidates(&pool, &current, params.bpm_tolerance);

        let mut best_idx = candidates[0];
        let mut best_score = f64::MIN;
        for idx in candidates {
            let s = score(&current, &pool[idx], position, &pool);
            // Strict comparison keeps the lowest path on ties
            if s > best_score {
                best_score = s;
                best_idx = idx;
            }
        }

        playlist.push(pool.remove(best_idx));
    }

    playlist
}

/// Indices of pool tracks inside the BPM window, widening the window by
/// +1 BPM until at least one candidate exists
fn window_candidates(pool: &[TrackRecord], current: &TrackRecord, tolerance: f64) -> Vec<usize> {
    let mut window = tolerance.max(0.0);
    loop {
        let candidates: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, t)| (t.bpm - current.bpm).abs() <= window)
            .map(|(i, _)| i)
            .collect();
        if !candidates.is_empty() {
            return candidates;
        }
        window += 1.0;
        info!(bpm_window = window, "constraint_relaxed");
    }
}

// =============================================================================
// Sort strategies
// =============================================================================

fn sort_warm_up(mut pool: Vec<TrackRecord>) -> Vec<TrackRecord> {
    pool.sort_by(|a, b| {
        cmp_f64(a.bpm, b.bpm)
            .then(cmp_f64(a.energy, b.energy))
            .then(a.path.cmp(&b.path))
    });
    pool
}

fn sort_cool_down(mut pool: Vec<TrackRecord>) -> Vec<TrackRecord> {
    pool.sort_by(|a, b| {
        cmp_f64(b.bpm, a.bpm)
            .then(cmp_f64(b.energy, a.energy))
            .then(a.path.cmp(&b.path))
    });
    pool
}

// =============================================================================
// Consistent
// =============================================================================

/// BPM deltas and energy deltas on a common scale: 0.05 energy ~ 1 BPM
const ENERGY_COST_SCALE: f64 = 20.0;

/// Minimize |dBPM| + |denergy| per transition; harmonic preference breaks
/// cost ties
fn sort_consistent(mut pool: Vec<TrackRecord>, params: &SequencerParams) -> Vec<TrackRecord> {
    if pool.is_empty() {
        return pool;
    }

    let mean_bpm = pool.iter().map(|t| t.bpm).sum::<f64>() / pool.len() as f64;
    let mean_energy = pool.iter().map(|t| t.energy).sum::<f64>() / pool.len() as f64;

    // Seed from the most central track
    let seed = min_index(&pool, |t| {
        (
            (t.bpm - mean_bpm).abs() + (t.energy - mean_energy).abs() * ENERGY_COST_SCALE,
            0.0,
        )
    });

    let mut playlist = Vec::with_capacity(pool.len());
    playlist.push(pool.remove(seed));

    while !pool.is_empty() {
        let current = playlist.last().unwrap();

        let mut best_idx = 0usize;
        let mut best_cost = f64::MAX;
        let mut best_harmonic = f64::MIN;
        for (idx, candidate) in pool.iter().enumerate() {
            let cost = (candidate.bpm - current.bpm).abs()
                + (candidate.energy - current.energy).abs() * ENERGY_COST_SCALE;
            let harmonic = crate::sequence::compat::harmonic_score(
                &current.camelot,
                &candidate.camelot,
                params.allow_experimental,
            );
            let better = cost < best_cost - 1e-9
                || ((cost - best_cost).abs() <= 1e-9 && harmonic > best_harmonic);
            if better {
                best_cost = cost;
                best_harmonic = harmonic;
                best_idx = idx;
            }
        }

        playlist.push(pool.remove(best_idx));
    }

    playlist
}

// =============================================================================
// Genre Flow
// =============================================================================

/// Cluster by genre, order clusters by mean energy, Harmonic Flow inside
fn sort_genre_flow(pool: Vec<TrackRecord>, params: &SequencerParams) -> Vec<TrackRecord> {
    if pool.is_empty() {
        return pool;
    }

    let mut clusters: Vec<(String, Vec<TrackRecord>)> = Vec::new();
    for track in pool {
        let genre = track.genre.trim().to_lowercase();
        match clusters.iter_mut().find(|(g, _)| *g == genre) {
            Some((_, members)) => members.push(track),
            None => clusters.push((genre, vec![track])),
        }
    }

    clusters.sort_by(|(ga, a), (gb, b)| {
        let mean_a = a.iter().map(|t| t.energy).sum::<f64>() / a.len() as f64;
        let mean_b = b.iter().map(|t| t.energy).sum::<f64>() / b.len() as f64;
        cmp_f64(mean_a, mean_b).then(ga.cmp(gb))
    });

    let mut playlist = Vec::new();
    for (_, members) in clusters {
        let seed = min_index(&members, |t| (t.bpm, t.energy));
        let ordered = greedy_walk(members, seed, params, |current, candidate, _, _| {
            compatibility(current, candidate, params, EnergyDirection::Maintain)
        });
        playlist.extend(ordered);
    }
    playlist
}

// =============================================================================
// Emotional Journey
// =============================================================================

/// Partition by count into intro/build/peak/cool, Harmonic Flow inside each
/// phase with the phase's energy direction
fn sort_emotional_journey(mut pool: Vec<TrackRecord>, params: &SequencerParams) -> Vec<TrackRecord> {
    if pool.len() <= 2 {
        return sort_warm_up(pool);
    }

    pool.sort_by(|a, b| cmp_f64(a.energy, b.energy).then(a.path.cmp(&b.path)));
    let n = pool.len();
    let (intro_n, build_n, peak_n) = JourneyPhase::counts(n);

    // Quietest tracks open, loudest tracks peak, the in-between cools down
    let intro: Vec<_> = pool.drain(..intro_n).collect();
    let build: Vec<_> = pool.drain(..build_n.min(pool.len())).collect();
    let peak_start = pool.len().saturating_sub(peak_n);
    let peak: Vec<_> = pool.drain(peak_start..).collect();
    let cool: Vec<_> = pool;

    let mut playlist = Vec::with_capacity(n);
    for (phase_pool, direction, descending) in [
        (intro, EnergyDirection::Up, false),
        (build, EnergyDirection::Up, false),
        (peak, EnergyDirection::Maintain, false),
        (cool, EnergyDirection::Down, true),
    ] {
        if phase_pool.is_empty() {
            continue;
        }
        let seed = if descending {
            min_index(&phase_pool, |t| (-t.energy, t.bpm))
        } else {
            min_index(&phase_pool, |t| (t.energy, t.bpm))
        };
        let ordered = greedy_walk(phase_pool, seed, params, |current, candidate, _, _| {
            compatibility(current, candidate, params, direction)
        });
        playlist.extend(ordered);
    }

    playlist
}

// =============================================================================
// Shared helpers
// =============================================================================

fn cmp_f64(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

/// Index of the minimum by key; path order breaks ties because the pool is
/// path-sorted and the comparison is strict
fn min_index<K: PartialOrd>(pool: &[TrackRecord], key: impl Fn(&TrackRecord) -> K) -> usize {
    let mut best = 0usize;
    for idx in 1..pool.len() {
        if key(&pool[idx]) < key(&pool[best]) {
            best = idx;
        }
    }
    best
}
