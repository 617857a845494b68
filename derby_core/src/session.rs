//! Host-facing facade wiring the roster, schedule and engine together.

use crate::config::RaceConfig;
use crate::engine::{RaceEngine, RunHandle};
use crate::error::RaceError;
use crate::rng::{RngFactory, SeedPolicy};
use crate::roster::{RosterProvider, RosterStore};
use crate::schedule::{ScheduleProvider, ScheduleStore};
use crate::state::RaceRunState;
use crate::types::{Entrant, RaceCommand, Schedule};
use derby_env::RaceContext;
use std::sync::Arc;
use tracing::info;

/// One race table: roster, schedule and engine sharing a seed policy.
pub struct RaceSession<Ctx: RaceContext> {
    roster: Arc<RosterStore>,
    schedule: Arc<ScheduleStore>,
    engine: RaceEngine<Ctx>,
}

impl<Ctx: RaceContext> RaceSession<Ctx> {
    /// Creates a session seeded from the context's seed hint.
    pub fn new(context: Arc<Ctx>, config: RaceConfig) -> Self {
        let rng_factory = Arc::new(SeedPolicy::from_context(Arc::clone(&context)));
        Self::with_rng_factory(context, rng_factory, config)
    }

    pub fn with_rng_factory(context: Arc<Ctx>, rng_factory: Arc<dyn RngFactory>, config: RaceConfig) -> Self {
        let roster = Arc::new(RosterStore::new(Arc::clone(&rng_factory), &config));
        let schedule = Arc::new(ScheduleStore::new(Arc::clone(&rng_factory), &config));
        let engine = RaceEngine::new(
            context,
            Arc::clone(&roster) as Arc<dyn RosterProvider>,
            Arc::clone(&schedule) as Arc<dyn ScheduleProvider>,
            rng_factory,
            config,
        );

        Self {
            roster,
            schedule,
            engine,
        }
    }

    pub fn engine(&self) -> &RaceEngine<Ctx> {
        &self.engine
    }

    pub fn entrants(&self) -> Vec<Entrant> {
        self.roster.list_all()
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule.list_all()
    }

    pub fn snapshot(&self) -> RaceRunState {
        self.engine.snapshot()
    }

    /// Whether the host should offer `command` in the current status.
    pub fn allows(&self, command: RaceCommand) -> bool {
        self.engine.status().allows(command)
    }

    /// Draws a fresh roster and schedule, then readies the engine.
    ///
    /// # Errors
    /// - `RaceError::Precondition` - the configured roster is too small for
    ///   the schedule
    pub fn generate(&self) -> Result<(), RaceError> {
        let entrants = self.roster.generate();
        self.schedule.generate(&entrants)?;
        self.engine.prepare();

        info!(entrants = entrants.len(), rounds = self.schedule.len(), "race generated");
        Ok(())
    }

    /// See [`RaceEngine::start`].
    pub fn start(&self) -> Result<Option<RunHandle>, RaceError> {
        self.engine.start()
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&self) -> bool {
        self.engine.resume()
    }

    /// Cancels any run and empties the schedule and roster.
    pub fn reset(&self) -> u64 {
        let run_id = self.engine.reset();
        self.schedule.reset();
        self.roster.reset();
        run_id
    }
}
