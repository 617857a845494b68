//! Run state and the events that mutate it.
//!
//! The engine never writes [`RaceRunState`] fields directly: every change is
//! a [`RaceEvent`] folded in with [`RaceRunState::apply`] and then broadcast.
//! A host that folds the same events into its own copy stays in sync with
//! the engine.

use crate::types::{EntrantId, RaceStatus, RoundResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A state delta published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    /// Run-scoped fields cleared, status ready
    Prepared,

    /// Run-scoped fields cleared, status idle, generation bumped to `run_id`
    Reset { run_id: u64 },

    StatusChanged { status: RaceStatus },

    /// A round entered the track with every entrant at zero progress
    RoundStarted {
        round_index: u32,
        distance: u32,
        entrant_ids: Vec<EntrantId>,
    },

    /// Full progress map of the round in flight (replaces the previous one)
    ProgressUpdated { progress: BTreeMap<EntrantId, f64> },

    RoundFinished { result: RoundResult },
}

/// Observable state of the race.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RaceRunState {
    /// Generation counter; incremented once per reset
    pub run_id: u64,

    pub status: RaceStatus,

    /// Round in flight (1-based)
    pub current_round_index: Option<u32>,

    /// Distance of the round in flight
    pub current_distance: Option<u32>,

    /// Entrants of the round in flight, in draw order
    pub active_entrant_ids: Vec<EntrantId>,

    /// Progress fraction in [0, 1] per active entrant
    pub progress: BTreeMap<EntrantId, f64>,

    /// Completed rounds, in order
    pub results: Vec<RoundResult>,
}

impl RaceRunState {
    /// Folds one event into the state.
    pub fn apply(&mut self, event: &RaceEvent) {
        match event {
            RaceEvent::Prepared => {
                self.clear_run();
                self.status = RaceStatus::Ready;
            }
            RaceEvent::Reset { run_id } => {
                self.clear_run();
                self.run_id = *run_id;
                self.status = RaceStatus::Idle;
            }
            RaceEvent::StatusChanged { status } => {
                self.status = *status;
            }
            RaceEvent::RoundStarted {
                round_index,
                distance,
                entrant_ids,
            } => {
                self.current_round_index = Some(*round_index);
                self.current_distance = Some(*distance);
                self.active_entrant_ids = entrant_ids.clone();
                self.progress = entrant_ids.iter().map(|id| (*id, 0.0)).collect();
            }
            RaceEvent::ProgressUpdated { progress } => {
                self.progress = progress.clone();
            }
            RaceEvent::RoundFinished { result } => {
                self.results.push(result.clone());
            }
        }
    }

    /// Progress of one entrant in the round in flight.
    pub fn progress_of(&self, id: EntrantId) -> Option<f64> {
        self.progress.get(&id).copied()
    }

    /// Clears everything except the generation counter and status.
    fn clear_run(&mut self) {
        self.current_round_index = None;
        self.current_distance = None;
        self.active_entrant_ids.clear();
        self.progress.clear();
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(round_index: u32) -> RoundResult {
        RoundResult {
            round_index,
            distance: 1200,
            placements: vec![2, 1],
        }
    }

    fn mid_round() -> RaceRunState {
        let mut state = RaceRunState::default();
        state.apply(&RaceEvent::StatusChanged {
            status: RaceStatus::Running,
        });
        state.apply(&RaceEvent::RoundStarted {
            round_index: 2,
            distance: 1400,
            entrant_ids: vec![1, 2],
        });
        state.apply(&RaceEvent::RoundFinished { result: result(1) });
        state
    }

    #[test]
    fn test_initial_state() {
        let state = RaceRunState::default();

        assert_eq!(state.run_id, 0);
        assert_eq!(state.status, RaceStatus::Idle);
        assert!(state.current_round_index.is_none());
        assert!(state.results.is_empty());
    }

    #[test]
    fn test_round_started_zeroes_progress() {
        let state = mid_round();

        assert_eq!(state.current_round_index, Some(2));
        assert_eq!(state.current_distance, Some(1400));
        assert_eq!(state.active_entrant_ids, vec![1, 2]);
        assert_eq!(state.progress_of(1), Some(0.0));
        assert_eq!(state.progress_of(3), None);
    }

    #[test]
    fn test_progress_is_replaced_not_merged() {
        let mut state = mid_round();

        let update = BTreeMap::from([(1, 0.5)]);
        state.apply(&RaceEvent::ProgressUpdated { progress: update });

        assert_eq!(state.progress_of(1), Some(0.5));
        assert_eq!(state.progress_of(2), None);
    }

    #[test]
    fn test_prepare_keeps_run_id() {
        let mut state = mid_round();
        state.run_id = 3;

        state.apply(&RaceEvent::Prepared);

        assert_eq!(state.run_id, 3);
        assert_eq!(state.status, RaceStatus::Ready);
        assert!(state.results.is_empty());
        assert!(state.progress.is_empty());
        assert!(state.current_distance.is_none());
    }

    #[test]
    fn test_reset_clears_and_sets_generation() {
        let mut state = mid_round();

        state.apply(&RaceEvent::Reset { run_id: 1 });

        assert_eq!(state.run_id, 1);
        assert_eq!(state.status, RaceStatus::Idle);
        assert!(state.active_entrant_ids.is_empty());
        assert!(state.results.is_empty());
    }

    #[test]
    fn test_folding_events_rebuilds_state() {
        let events = vec![
            RaceEvent::Prepared,
            RaceEvent::StatusChanged {
                status: RaceStatus::Running,
            },
            RaceEvent::RoundStarted {
                round_index: 1,
                distance: 1200,
                entrant_ids: vec![1, 2],
            },
            RaceEvent::RoundFinished { result: result(1) },
            RaceEvent::StatusChanged {
                status: RaceStatus::Finished,
            },
        ];

        let mut state = RaceRunState::default();
        for event in &events {
            state.apply(event);
        }

        assert_eq!(state.status, RaceStatus::Finished);
        assert_eq!(state.results, vec![result(1)]);
    }
}
