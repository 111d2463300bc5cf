//! Sequencing strategies
//!
//! A closed enum of the ten supported orderings. Each strategy knows the
//! energy direction it intends at a given playlist position and the shape
//! of its target energy curve, which the quality metrics correlate against.

use crate::sequence::compat::{EnergyDirection, SequencerParams};
use clap::ValueEnum;
use std::fmt;

/// Named playlist ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Greedy best-compatibility walk inside a hard BPM window
    HarmonicFlow,
    /// Harmonic Flow with one-step lookahead
    HarmonicFlowEnhanced,
    /// Ascending BPM, energy as tie-breaker
    WarmUp,
    /// Descending BPM, energy as tie-breaker
    CoolDown,
    /// Energy rises to a configurable peak, then falls
    PeakTimeEnhanced,
    /// Energy direction alternates every transition
    EnergyWaveEnhanced,
    /// Minimal BPM and energy movement, harmony breaking ties
    ConsistentEnhanced,
    /// Genre clusters ordered by mean energy, Harmonic Flow inside each
    GenreFlow,
    /// Intro, build, peak, cool phases by track count
    EmotionalJourney,
    /// Harmonic Flow whose strictness relaxes over the set
    SmartHarmonic,
}

impl Strategy {
    /// All strategies, in the canonical presentation order
    pub const ALL: [Strategy; 10] = [
        Strategy::HarmonicFlow,
        Strategy::HarmonicFlowEnhanced,
        Strategy::WarmUp,
        Strategy::CoolDown,
        Strategy::PeakTimeEnhanced,
        Strategy::EnergyWaveEnhanced,
        Strategy::ConsistentEnhanced,
        Strategy::GenreFlow,
        Strategy::EmotionalJourney,
        Strategy::SmartHarmonic,
    ];

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            Strategy::HarmonicFlow => "Harmonic Flow",
            Strategy::HarmonicFlowEnhanced => "Harmonic Flow Enhanced",
            Strategy::WarmUp => "Warm-Up",
            Strategy::CoolDown => "Cool-Down",
            Strategy::PeakTimeEnhanced => "Peak-Time Enhanced",
            Strategy::EnergyWaveEnhanced => "Energy Wave Enhanced",
            Strategy::ConsistentEnhanced => "Consistent Enhanced",
            Strategy::GenreFlow => "Genre Flow",
            Strategy::EmotionalJourney => "Emotional Journey",
            Strategy::SmartHarmonic => "Smart Harmonic",
        }
    }

    /// Intended energy direction for the transition leading into position
    /// `position + 1` of a playlist of `len` tracks
    pub fn direction_at(
        self,
        position: usize,
        len: usize,
        params: &SequencerParams,
    ) -> EnergyDirection {
        match self {
            Strategy::HarmonicFlow
            | Strategy::HarmonicFlowEnhanced
            | Strategy::SmartHarmonic
            | Strategy::WarmUp => EnergyDirection::Up,
            Strategy::CoolDown => EnergyDirection::Down,
            Strategy::ConsistentEnhanced | Strategy::GenreFlow => EnergyDirection::Maintain,
            Strategy::EnergyWaveEnhanced => {
                if position % 2 == 0 {
                    EnergyDirection::Up
                } else {
                    EnergyDirection::Down
                }
            }
            Strategy::PeakTimeEnhanced => {
                if progress(position, len) * 100.0 <= params.peak_position {
                    EnergyDirection::Up
                } else {
                    EnergyDirection::Down
                }
            }
            Strategy::EmotionalJourney => match JourneyPhase::at(position, len) {
                JourneyPhase::Intro | JourneyPhase::Build => EnergyDirection::Up,
                JourneyPhase::Peak => EnergyDirection::Maintain,
                JourneyPhase::Cool => EnergyDirection::Down,
            },
        }
    }

    /// Target energy value per playlist position, in [0, 1]
    ///
    /// Realized playlist energies are correlated against this curve in the
    /// quality metrics. Strategies with no meaningful energy shape return a
    /// gentle ramp (flow family) or a flat line (consistent family).
    pub fn intended_curve(self, len: usize, params: &SequencerParams) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let t = progress(i, len);
                match self {
                    Strategy::WarmUp
                    | Strategy::HarmonicFlow
                    | Strategy::HarmonicFlowEnhanced
                    | Strategy::SmartHarmonic => t,
                    Strategy::CoolDown => 1.0 - t,
                    Strategy::ConsistentEnhanced | Strategy::GenreFlow => 0.5,
                    Strategy::EnergyWaveEnhanced => {
                        if i % 2 == 0 {
                            0.25
                        } else {
                            0.75
                        }
                    }
                    Strategy::PeakTimeEnhanced => {
                        let peak = (params.peak_position / 100.0).clamp(0.01, 0.99);
                        if t <= peak {
                            t / peak
                        } else {
                            (1.0 - t) / (1.0 - peak)
                        }
                    }
                    Strategy::EmotionalJourney => match JourneyPhase::at(i, len) {
                        JourneyPhase::Intro => 0.2 + 0.2 * t,
                        JourneyPhase::Build => 0.4 + 0.5 * t,
                        JourneyPhase::Peak => 1.0,
                        JourneyPhase::Cool => (1.0 - t).max(0.1),
                    },
                }
            })
            .collect()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Position as a fraction of the playlist, 0 at the first track and 1 at
/// the last
fn progress(position: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        position as f64 / (len - 1) as f64
    }
}

/// Count-based phases of an Emotional Journey set:
/// intro 20%, build 30%, peak 25%, cool 25%
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyPhase {
    Intro,
    Build,
    Peak,
    Cool,
}

impl JourneyPhase {
    pub fn at(position: usize, len: usize) -> Self {
        let (intro, build, peak) = Self::counts(len);
        if position < intro {
            JourneyPhase::Intro
        } else if position < intro + build {
            JourneyPhase::Build
        } else if position < intro + build + peak {
            JourneyPhase::Peak
        } else {
            JourneyPhase::Cool
        }
    }

    /// (intro, build, peak) track counts; cool takes the remainder
    pub fn counts(len: usize) -> (usize, usize, usize) {
        if len == 0 {
            return (0, 0, 0);
        }
        let intro = ((len as f64 * 0.20).round() as usize).max(1).min(len);
        let build = ((len as f64 * 0.30).round() as usize)
            .max(1)
            .min(len - intro);
        let peak = ((len as f64 * 0.25).round() as usize)
            .max(1)
            .min(len.saturating_sub(intro + build));
        (intro, build, peak)
    }
}
