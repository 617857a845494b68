//! Round outcome: per-entrant score, finish time and placements.
//!
//! # Formula
//! ```text
//! factor       = distance / base_distance
//! [min, max]   = base_bounds * factor
//! score        = clamp(baseline + clamp(condition/100) * w_condition + luck * w_luck)
//! finish_ms    = max - (max - min) * score
//! ```
//!
//! A higher score means an earlier finish. Placements are a stable ascending
//! sort on `finish_ms`, so ties keep the round's draw order.

use crate::config::{RaceConfig, TimeBounds};
use crate::rng::RandomSource;
use crate::types::{Entrant, EntrantId, Round};
use std::collections::{BTreeMap, HashMap};

/// Clamps to [0, 1]; NaN maps to 0.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Normalized performance of one entrant for one luck draw.
pub fn score(condition: u8, luck: f64, config: &RaceConfig) -> f64 {
    let condition_norm = clamp01(f64::from(condition) / 100.0);
    clamp01(config.score_baseline + condition_norm * config.condition_weight + luck * config.luck_weight)
}

/// Maps a score onto the round's finish window.
pub fn finish_time_ms(score: f64, bounds: TimeBounds) -> f64 {
    bounds.max_ms - (bounds.max_ms - bounds.min_ms) * score
}

/// Finish time of one entrant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrantTiming {
    pub id: EntrantId,
    pub finish_ms: f64,
}

/// Precomputed outcome of a round, decided before any animation starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Timings in round draw order
    pub timings: Vec<EntrantTiming>,

    /// Entrant ids, fastest first
    pub placements: Vec<EntrantId>,

    /// Slowest finish; the round ends once this much time has elapsed
    pub max_finish_ms: f64,
}

impl RoundOutcome {
    /// Decides a round: one luck draw per known entrant, in draw order.
    ///
    /// Ids missing from `entrants` are skipped: they consume no draw and get
    /// no placement.
    pub fn compute<R>(
        round: &Round,
        entrants: &HashMap<EntrantId, Entrant>,
        rng: &mut R,
        config: &RaceConfig,
    ) -> Self
    where
        R: RandomSource + ?Sized,
    {
        let bounds = config.bounds_for(round.distance);

        let timings: Vec<EntrantTiming> = round
            .entrant_ids
            .iter()
            .filter_map(|id| entrants.get(id))
            .map(|entrant| {
                let luck = rng.next_f64();
                EntrantTiming {
                    id: entrant.id,
                    finish_ms: finish_time_ms(score(entrant.condition, luck, config), bounds),
                }
            })
            .collect();

        let mut ranked = timings.clone();
        ranked.sort_by(|a, b| a.finish_ms.total_cmp(&b.finish_ms));
        let placements = ranked.into_iter().map(|t| t.id).collect();

        let max_finish_ms = timings
            .iter()
            .map(|t| t.finish_ms)
            .fold(0.0, f64::max);

        Self {
            timings,
            placements,
            max_finish_ms,
        }
    }

    /// Finish time of an entrant; unknown ids take the slowest finish.
    pub fn finish_ms(&self, id: EntrantId) -> f64 {
        self.timings
            .iter()
            .find(|t| t.id == id)
            .map_or(self.max_finish_ms, |t| t.finish_ms)
    }

    /// Progress of every entrant in `ids` after `elapsed_ms`.
    pub fn progress_at(&self, ids: &[EntrantId], elapsed_ms: f64) -> BTreeMap<EntrantId, f64> {
        ids.iter()
            .map(|&id| {
                let finish = self.finish_ms(id);
                let progress = if finish > 0.0 { clamp01(elapsed_ms / finish) } else { 1.0 };
                (id, progress)
            })
            .collect()
    }

    /// Whether every entrant has crossed the line at `elapsed_ms`.
    pub fn is_complete(&self, elapsed_ms: f64) -> bool {
        elapsed_ms >= self.max_finish_ms
    }
}
