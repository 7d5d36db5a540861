//! Weighted progress model.
//!
//! Each working phase owns a fixed 25-point band of the overall percentage.
//! UI consumers rely on these bands, so they are a table rather than derived
//! from the amount of work in each phase.

use crate::models::{JobCounters, JobPhase};

/// Percentage range of overall progress owned by one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBand {
    pub phase: JobPhase,
    pub start: f64,
    pub end: f64,
}

impl PhaseBand {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

/// Band table in lifecycle order.
pub const PHASE_BANDS: [PhaseBand; 4] = [
    PhaseBand {
        phase: JobPhase::Pending,
        start: 0.0,
        end: 25.0,
    },
    PhaseBand {
        phase: JobPhase::Crawling,
        start: 25.0,
        end: 50.0,
    },
    PhaseBand {
        phase: JobPhase::Analyzing,
        start: 50.0,
        end: 75.0,
    },
    PhaseBand {
        phase: JobPhase::Generating,
        start: 75.0,
        end: 100.0,
    },
];

/// Highest intra-phase progress an active phase reports. The band ceiling is
/// only reached by moving on to the next phase.
pub const MAX_ACTIVE_PHASE_PROGRESS: f64 = 99.0;

/// Band owned by `phase`, or `None` for terminal phases.
pub fn band_for(phase: JobPhase) -> Option<&'static PhaseBand> {
    PHASE_BANDS.iter().find(|band| band.phase == phase)
}

/// Completion within the phase, 0-100.
///
/// `analyzing` is derived from the element counters once a non-zero element
/// total is known; before that the reported `phase_progress` is used.
pub fn intra_phase_progress(phase: JobPhase, phase_progress: f64, counters: &JobCounters) -> f64 {
    let raw = match phase {
        JobPhase::Analyzing if counters.total_elements > 0 => {
            counters.processed_elements as f64 / counters.total_elements as f64 * 100.0
        }
        _ => phase_progress,
    };

    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Overall progress for a job currently in `phase`.
///
/// `completed` is exactly 100. A failed job's percentage depends on the phase
/// it failed in, see [`failed_percent`]; given `failed` alone this returns 0.
pub fn overall_percent(phase: JobPhase, phase_progress: f64, counters: &JobCounters) -> f64 {
    match phase {
        JobPhase::Completed => 100.0,
        JobPhase::Failed => 0.0,
        active => match band_for(active) {
            Some(band) => {
                let intra = intra_phase_progress(active, phase_progress, counters)
                    .min(MAX_ACTIVE_PHASE_PROGRESS);
                band.start + intra * band.width() / 100.0
            }
            None => 0.0,
        },
    }
}

/// Progress frozen at the point of failure, clipped to the band ceiling of
/// the phase the job was in. Never reports 100.
pub fn failed_percent(failed_during: JobPhase, phase_progress: f64, counters: &JobCounters) -> f64 {
    match band_for(failed_during) {
        Some(band) => {
            let intra = intra_phase_progress(failed_during, phase_progress, counters);
            (band.start + intra * band.width() / 100.0).min(band.end)
        }
        None => 0.0,
    }
}
