//! Schedule collaborator: draws the entrant subset of every round.

use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::rng::RngFactory;
use crate::sampler::pick_unique;
use crate::types::{Entrant, EntrantId, Round, Schedule};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Read access to the current schedule.
pub trait ScheduleProvider: Send + Sync {
    /// Returns every round, in race order.
    fn list_all(&self) -> Vec<Round>;
}

impl ScheduleProvider for Vec<Round> {
    fn list_all(&self) -> Vec<Round> {
        self.clone()
    }
}

/// In-memory schedule built from the roster with [`pick_unique`].
pub struct ScheduleStore {
    rounds: RwLock<Schedule>,
    rng_factory: Arc<dyn RngFactory>,
    distances: Vec<u32>,
    roster_size: usize,
    round_size: usize,
}

impl ScheduleStore {
    /// Creates an empty schedule.
    pub fn new(rng_factory: Arc<dyn RngFactory>, config: &RaceConfig) -> Self {
        Self {
            rounds: RwLock::new(Vec::new()),
            rng_factory,
            distances: config.round_distances.clone(),
            roster_size: config.roster_size,
            round_size: config.round_size,
        }
    }

    /// Replaces the schedule with one round per configured distance.
    ///
    /// One random stream is shared by all rounds, so a fixed seed yields a
    /// fixed schedule.
    ///
    /// # Errors
    /// - `RaceError::Precondition` - the roster is not complete
    pub fn generate(&self, roster: &[Entrant]) -> Result<Schedule, RaceError> {
        if roster.len() != self.roster_size {
            return Err(RaceError::precondition(format!(
                "schedule/generate: horses must be generated first ({} entrants, found {})",
                self.roster_size,
                roster.len()
            )));
        }

        let mut rng = self.rng_factory.create();
        let ids: Vec<EntrantId> = roster.iter().map(|e| e.id).collect();

        let rounds = self
            .distances
            .iter()
            .enumerate()
            .map(|(idx, &distance)| -> Result<Round, RaceError> {
                Ok(Round {
                    round_index: (idx + 1) as u32,
                    distance,
                    entrant_ids: pick_unique(&ids, self.round_size, rng.as_mut())?,
                })
            })
            .collect::<Result<Schedule, _>>()?;

        debug!(rounds = rounds.len(), "schedule generated");
        *self.rounds.write().unwrap_or_else(PoisonError::into_inner) = rounds.clone();
        Ok(rounds)
    }

    /// Empties the schedule.
    pub fn reset(&self) {
        self.rounds.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of rounds currently scheduled.
    pub fn len(&self) -> usize {
        self.rounds.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no schedule has been generated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScheduleProvider for ScheduleStore {
    fn list_all(&self) -> Vec<Round> {
        self.rounds.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
