//! The race engine: lifecycle commands and the cancellable run loop.
//!
//! # Lifecycle
//! ```text
//! idle ──prepare──▶ ready ──start──▶ running ⇄ paused
//!                                       │
//!                                       ▼
//!                                   finished
//! reset: any ──▶ idle (generation + 1)
//! ```
//!
//! # Cancellation
//! A run captures the generation counter when it starts. `reset` bumps the
//! counter; from then on the run is *stale*. The stale check and the state
//! write happen under the same lock, so a stale run can never publish after
//! a reset. A [`RunHandle`] can also cancel its own run without touching the
//! engine state.

use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::rng::{RandomSource, RngFactory};
use crate::roster::RosterProvider;
use crate::schedule::ScheduleProvider;
use crate::scoring::RoundOutcome;
use crate::state::{RaceEvent, RaceRunState};
use crate::types::{Entrant, EntrantId, RaceStatus, Round, RoundResult};
use derby_env::RaceContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 1024;

// =============================================================================
// RUN TOKEN AND HANDLE
// =============================================================================

/// Generation token of one run.
#[derive(Debug, Clone)]
struct RunToken {
    generation: u64,
    current: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
}

impl RunToken {
    fn new(current: &Arc<AtomicU64>) -> Self {
        Self {
            generation: current.load(Ordering::SeqCst),
            current: Arc::clone(current),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Generation this run was started in.
    fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the engine was reset or the run was cancelled.
    fn is_stale(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.current.load(Ordering::SeqCst) != self.generation
    }

    /// Marks the run stale; it stops at its next resumption point.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn same_run(&self, other: &RunToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every round completed and the status is `finished`
    Finished,

    /// The run went stale (reset or cancel) and stopped without further writes
    Cancelled,
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    token: RunToken,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn generation(&self) -> u64 {
        self.token.generation()
    }

    /// Cancels this run. Engine state is left as it is.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stale(&self) -> bool {
        self.token.is_stale()
    }

    /// Waits for the run to end.
    ///
    /// # Errors
    /// - `RaceError::TaskFailed` - the run task panicked or was aborted
    pub async fn join(self) -> Result<RunOutcome, RaceError> {
        Ok(self.task.await?)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// The run loop lost its generation.
struct Stale;

/// Result of a run-loop commit that was not stale.
enum Commit {
    Published,

    /// Refused while paused; the event is handed back
    Paused(RaceEvent),
}

struct EngineState {
    run: RaceRunState,
    active: Option<RunToken>,
}

struct EngineShared<Ctx: RaceContext> {
    context: Arc<Ctx>,
    roster: Arc<dyn RosterProvider>,
    schedule: Arc<dyn ScheduleProvider>,
    rng_factory: Arc<dyn RngFactory>,
    config: RaceConfig,
    state: Mutex<EngineState>,
    generation: Arc<AtomicU64>,
    events: broadcast::Sender<RaceEvent>,
}

/// Race engine bound to an environment context.
///
/// Cheap to clone; clones drive the same race.
pub struct RaceEngine<Ctx: RaceContext> {
    shared: Arc<EngineShared<Ctx>>,
}

impl<Ctx: RaceContext> Clone for RaceEngine<Ctx> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Ctx: RaceContext> RaceEngine<Ctx> {
    /// Creates an idle engine with generation 0.
    pub fn new(
        context: Arc<Ctx>,
        roster: Arc<dyn RosterProvider>,
        schedule: Arc<dyn ScheduleProvider>,
        rng_factory: Arc<dyn RngFactory>,
        config: RaceConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(EngineShared {
                context,
                roster,
                schedule,
                rng_factory,
                config,
                state: Mutex::new(EngineState {
                    run: RaceRunState::default(),
                    active: None,
                }),
                generation: Arc::new(AtomicU64::new(0)),
                events,
            }),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RaceRunState {
        self.shared.lock().run.clone()
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> RaceStatus {
        self.shared.lock().run.status
    }

    pub fn run_id(&self) -> u64 {
        self.shared.lock().run.run_id
    }

    /// True while a non-stale run loop is registered.
    pub fn has_active_run(&self) -> bool {
        self.shared
            .lock()
            .active
            .as_ref()
            .is_some_and(|token| !token.is_stale())
    }

    /// Clears run-scoped fields and sets `ready`. The generation is untouched,
    /// so a run still in flight keeps going.
    pub fn prepare(&self) {
        let mut state = self.shared.lock();
        if state.active.as_ref().is_some_and(|token| !token.is_stale()) {
            debug!(run_id = state.run.run_id, "prepare while a run is active; the run keeps publishing");
        }
        self.shared.publish(&mut state, RaceEvent::Prepared);
        info!(run_id = state.run.run_id, "race prepared");
    }

    /// Starts the run loop.
    ///
    /// Returns `Ok(None)` without side effects while another run is active.
    /// Leftovers of an earlier run are cleared before the new run begins.
    ///
    /// # Errors
    /// - `RaceError::Precondition` - roster or schedule is incomplete; no state
    ///   is touched
    pub fn start(&self) -> Result<Option<RunHandle>, RaceError> {
        let shared = &self.shared;
        let roster = shared.roster.list_all();
        let schedule = shared.schedule.list_all();

        let token = {
            let mut state = shared.lock();
            if state.active.as_ref().is_some_and(|token| !token.is_stale()) {
                debug!("start ignored: a run is already active");
                return Ok(None);
            }

            if roster.len() != shared.config.roster_size {
                return Err(RaceError::precondition(format!(
                    "race/start: horses must be generated first ({} entrants, found {})",
                    shared.config.roster_size,
                    roster.len()
                )));
            }
            if schedule.len() != shared.config.schedule_len() {
                return Err(RaceError::precondition(format!(
                    "race/start: schedule must be generated first ({} rounds, found {})",
                    shared.config.schedule_len(),
                    schedule.len()
                )));
            }

            if !state.run.results.is_empty() || state.run.current_round_index.is_some() {
                shared.publish(&mut state, RaceEvent::Prepared);
            }

            let token = RunToken::new(&shared.generation);
            state.active = Some(token.clone());
            shared.publish(
                &mut state,
                RaceEvent::StatusChanged {
                    status: RaceStatus::Running,
                },
            );
            token
        };

        info!(run_id = token.generation(), rounds = schedule.len(), "race started");

        let rng = shared.rng_factory.create();
        let task = shared.context.spawn(
            "race-run",
            run_loop(Arc::clone(shared), token.clone(), roster, schedule, rng),
        );

        Ok(Some(RunHandle { token, task }))
    }

    /// `running` → `paused`; no-op otherwise. Returns whether it transitioned.
    pub fn pause(&self) -> bool {
        self.transition(RaceStatus::Running, RaceStatus::Paused)
    }

    /// `paused` → `running`; no-op otherwise. Returns whether it transitioned.
    pub fn resume(&self) -> bool {
        self.transition(RaceStatus::Paused, RaceStatus::Running)
    }

    /// Bumps the generation, clears run-scoped fields and sets `idle`.
    ///
    /// Any run in flight becomes stale. Returns the new generation.
    pub fn reset(&self) -> u64 {
        let mut state = self.shared.lock();
        let run_id = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.active = None;
        self.shared.publish(&mut state, RaceEvent::Reset { run_id });
        info!(run_id, "race reset");
        run_id
    }

    fn transition(&self, from: RaceStatus, to: RaceStatus) -> bool {
        let mut state = self.shared.lock();
        if state.run.status != from {
            debug!(status = %state.run.status, requested = %to, "transition ignored");
            return false;
        }

        self.shared
            .publish(&mut state, RaceEvent::StatusChanged { status: to });
        info!(run_id = state.run.run_id, status = %to, "race status changed");
        true
    }
}

impl<Ctx: RaceContext> EngineShared<Ctx> {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies and broadcasts an event. Caller holds the state lock.
    fn publish(&self, state: &mut EngineState, event: RaceEvent) {
        state.run.apply(&event);
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Publishes for the run loop. The stale and pause checks share the lock
    /// with the write, so nothing is published after a reset or while paused.
    fn commit_if_current(&self, token: &RunToken, event: RaceEvent) -> Result<Commit, Stale> {
        let mut state = self.lock();
        if token.is_stale() {
            return Err(Stale);
        }
        if state.run.status == RaceStatus::Paused {
            return Ok(Commit::Paused(event));
        }
        self.publish(&mut state, event);
        Ok(Commit::Published)
    }

    /// Holds `event` while the race is paused, then publishes it.
    async fn commit_when_running(&self, token: &RunToken, mut event: RaceEvent) -> Result<(), Stale> {
        loop {
            match self.commit_if_current(token, event)? {
                Commit::Published => return Ok(()),
                Commit::Paused(held) => {
                    event = held;
                    self.context.sleep(self.config.pause_poll).await;
                }
            }
        }
    }

    fn release(&self, token: &RunToken) {
        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|active| active.same_run(token)) {
            state.active = None;
        }
    }

    async fn run_rounds(
        &self,
        token: &RunToken,
        roster: &[Entrant],
        schedule: &[Round],
        rng: &mut (dyn RandomSource + Send),
    ) -> Result<(), Stale> {
        let entrants: HashMap<EntrantId, Entrant> = roster.iter().map(|e| (e.id, e.clone())).collect();

        for round in schedule {
            check(token)?;
            self.commit_when_running(
                token,
                RaceEvent::RoundStarted {
                    round_index: round.round_index,
                    distance: round.distance,
                    entrant_ids: round.entrant_ids.clone(),
                },
            )
            .await?;

            let outcome = RoundOutcome::compute(round, &entrants, rng, &self.config);
            debug!(
                round = round.round_index,
                distance = round.distance,
                max_finish_ms = outcome.max_finish_ms,
                "round started"
            );

            self.animate(token, round, &outcome).await?;

            let finished = round.entrant_ids.iter().map(|id| (*id, 1.0)).collect();
            self.commit_when_running(token, RaceEvent::ProgressUpdated { progress: finished })
                .await?;

            let result = RoundResult {
                round_index: round.round_index,
                distance: round.distance,
                placements: outcome.placements,
            };
            info!(round = result.round_index, winner = ?result.winner(), "round finished");
            self.commit_when_running(token, RaceEvent::RoundFinished { result })
                .await?;
        }

        self.commit_when_running(
            token,
            RaceEvent::StatusChanged {
                status: RaceStatus::Finished,
            },
        )
        .await
    }

    /// Publishes progress every tick until the slowest entrant finishes.
    ///
    /// A tick refused because the race is paused marks the pause start. Time
    /// spent paused is added to `started_at` once a tick is published again,
    /// so progress resumes from the frozen value.
    async fn animate(&self, token: &RunToken, round: &Round, outcome: &RoundOutcome) -> Result<(), Stale> {
        let mut started_at = self.context.now();
        let mut pause_started_at: Option<Duration> = None;

        loop {
            check(token)?;

            let now = self.context.now();
            let paused_for = pause_started_at.map_or(Duration::ZERO, |at| now.saturating_sub(at));
            let elapsed_ms = now.saturating_sub(started_at + paused_for).as_secs_f64() * 1000.0;
            let progress = outcome.progress_at(&round.entrant_ids, elapsed_ms);

            match self.commit_if_current(token, RaceEvent::ProgressUpdated { progress })? {
                Commit::Paused(_) => {
                    pause_started_at.get_or_insert(now);
                    self.context.sleep(self.config.pause_poll).await;
                }
                Commit::Published => {
                    started_at += paused_for;
                    pause_started_at = None;
                    if outcome.is_complete(elapsed_ms) {
                        return Ok(());
                    }
                    self.context.sleep(self.config.tick_interval()).await;
                }
            }
        }
    }
}

fn check(token: &RunToken) -> Result<(), Stale> {
    if token.is_stale() {
        Err(Stale)
    } else {
        Ok(())
    }
}

async fn run_loop<Ctx: RaceContext>(
    shared: Arc<EngineShared<Ctx>>,
    token: RunToken,
    roster: Vec<Entrant>,
    schedule: Vec<Round>,
    mut rng: Box<dyn RandomSource + Send>,
) -> RunOutcome {
    let result = shared.run_rounds(&token, &roster, &schedule, rng.as_mut()).await;
    shared.release(&token);

    match result {
        Ok(()) => {
            info!(run_id = token.generation(), "race finished");
            RunOutcome::Finished
        }
        Err(Stale) => {
            info!(run_id = token.generation(), "race run went stale, stopping");
            RunOutcome::Cancelled
        }
    }
}
