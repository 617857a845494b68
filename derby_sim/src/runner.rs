//! Scenario runner - drives the race engine through lifecycle scenarios.

use crate::context::SimContext;
use crate::scenarios::ScenarioId;

use derby_core::{
    Entrant, RaceConfig, RaceEngine, RaceError, RaceEvent, RaceMode, RaceRunState, RaceSession, RaceStatus,
    RngFactory, Round, RoundResult, RunHandle, RunOutcome, SeedPolicy,
};
use derby_env::RaceContext;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Upper bound on yields spent waiting for the engine to reach a state.
const MAX_WAIT_YIELDS: usize = 100_000;

/// Why a scenario failed.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("engine error: {0}")]
    Engine(#[from] RaceError),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Virtual time consumed, in milliseconds
    pub virtual_time_ms: u64,

    /// Rounds with a result at the end of the scenario
    pub rounds_completed: usize,

    /// Engine status at the end of the scenario
    pub final_status: Option<RaceStatus>,

    /// Roster of the observed run (race scenario only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrants: Vec<Entrant>,

    /// Round results of the observed run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<RoundResult>,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// What a passing scenario leaves behind.
struct Observation {
    state: RaceRunState,
    entrants: Vec<Entrant>,
}

impl Observation {
    fn of(state: RaceRunState) -> Self {
        Self {
            state,
            entrants: Vec::new(),
        }
    }
}

/// Runs race scenarios on a virtual clock.
pub struct ScenarioRunner {
    /// Master seed
    seed: u64,

    /// Timing profile handed to the engine
    mode: RaceMode,
}

impl ScenarioRunner {
    /// Creates a new scenario runner with normal race timing.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            mode: RaceMode::Normal,
        }
    }

    /// Sets the timing profile.
    pub fn with_mode(mut self, mode: RaceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> RaceConfig {
        RaceConfig::default().with_mode(self.mode)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let context = SimContext::shared(self.seed);
        let outcome = self.execute(scenario, &context);
        let virtual_time_ms = context.time_ns() / 1_000_000;

        match outcome {
            Ok(observation) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                virtual_time_ms,
                rounds_completed: observation.state.results.len(),
                final_status: Some(observation.state.status),
                entrants: observation.entrants,
                results: observation.state.results,
                failure_reason: None,
            },
            Err(err) => {
                warn!("Scenario {} failed: {}", scenario.name(), err);
                ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    virtual_time_ms,
                    rounds_completed: 0,
                    final_status: None,
                    entrants: Vec::new(),
                    results: Vec::new(),
                    failure_reason: Some(err.to_string()),
                }
            }
        }
    }

    fn execute(&self, scenario: ScenarioId, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        // Virtual time never waits on the reactor, so no time driver is needed
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;

        runtime.block_on(async {
            match scenario {
                ScenarioId::FullRun => self.run_full_run(context).await,
                ScenarioId::PauseResume => self.run_pause_resume(context).await,
                ScenarioId::ResetMidRun => self.run_reset_mid_run(context).await,
                ScenarioId::RestartAfterReset => self.run_restart_after_reset(context).await,
                ScenarioId::Precondition => self.run_precondition(context).await,
                ScenarioId::Race => self.run_race(context).await,
            }
        })
    }

    fn session(&self, context: &Arc<SimContext>) -> RaceSession<SimContext> {
        RaceSession::new(Arc::clone(context), self.config())
    }

    /// RACE-001: generate, start, run every round to the line.
    async fn run_full_run(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        session.generate()?;

        let outcome = started(session.start()?)?.join().await?;
        ensure(outcome == RunOutcome::Finished, || format!("run ended {outcome:?}"))?;

        let state = session.snapshot();
        ensure(state.status == RaceStatus::Finished, || format!("status {}", state.status))?;
        check_results(&state, &session.schedule())?;

        info!("✓ FullRun complete: {} rounds", state.results.len());
        Ok(Observation::of(state))
    }

    /// RACE-002: pause mid-round, let virtual time pass, resume.
    ///
    /// **Assertion**: progress is unchanged while paused, and the first tick
    /// after resuming moves each entrant by at most one tick's worth.
    async fn run_pause_resume(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        session.generate()?;
        let engine = session.engine();
        let handle = started(session.start()?)?;

        let round = context.chaos_range(1..7) as u32;
        wait_for(engine, &format!("round {round} in motion"), |s| {
            s.current_round_index == Some(round) && in_motion(s)
        })
        .await?;

        ensure(engine.pause(), || "pause from running was ignored".to_string())?;
        let frozen = engine.snapshot();
        let paused_at = context.now();

        let idle_yields = context.chaos_range(5..40);
        for _ in 0..idle_yields {
            tokio::task::yield_now().await;
        }

        let still = engine.snapshot();
        ensure(context.now() > paused_at, || "virtual time did not pass while paused".to_string())?;
        ensure(still.status == RaceStatus::Paused, || format!("status {} while paused", still.status))?;
        ensure(still.progress == frozen.progress, || "progress moved while paused".to_string())?;
        ensure(still.current_round_index == Some(round), || "round changed while paused".to_string())?;

        let mut events = engine.subscribe();
        ensure(engine.resume(), || "resume from paused was ignored".to_string())?;
        let first_tick = next_progress(&mut events).await?;

        let distance = frozen.current_distance.unwrap_or_default();
        let max_step = 2.0 * self.config().tick_interval().as_secs_f64() * 1000.0
            / self.config().bounds_for(distance).min_ms;
        for (id, before) in &frozen.progress {
            let after = first_tick.get(id).copied().unwrap_or_default();
            ensure(after >= *before, || format!("entrant {id} went back from {before} to {after}"))?;
            ensure(after - before <= max_step, || {
                format!("entrant {id} jumped from {before:.3} to {after:.3} after resume")
            })?;
        }
        debug!("  resumed round {} after {} idle yields", round, idle_yields);

        let outcome = handle.join().await?;
        ensure(outcome == RunOutcome::Finished, || format!("run ended {outcome:?}"))?;

        let state = session.snapshot();
        check_results(&state, &session.schedule())?;

        info!("✓ PauseResume complete: paused in round {}", round);
        Ok(Observation::of(state))
    }

    /// RACE-003: reset while a round animates.
    ///
    /// **Assertion**: generation +1, idle, empty results, and nothing is
    /// published after the reset.
    async fn run_reset_mid_run(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        session.generate()?;
        let engine = session.engine();
        let mut events = engine.subscribe();
        let handle = started(session.start()?)?;

        let round = context.chaos_range(1..7) as u32;
        wait_for(engine, &format!("round {round} in motion"), |s| {
            s.current_round_index == Some(round) && in_motion(s)
        })
        .await?;

        let run_id = session.reset();
        ensure(run_id == 1, || format!("run id {run_id} after one reset"))?;
        ensure(handle.is_stale(), || "run handle not stale after reset".to_string())?;

        let outcome = handle.join().await?;
        ensure(outcome == RunOutcome::Cancelled, || format!("stale run ended {outcome:?}"))?;

        let state = session.snapshot();
        ensure(state.run_id == 1, || format!("run id {}", state.run_id))?;
        ensure(state.status == RaceStatus::Idle, || format!("status {}", state.status))?;
        ensure(state.results.is_empty(), || format!("{} results survived reset", state.results.len()))?;
        ensure(state.current_round_index.is_none() && state.progress.is_empty(), || {
            "round fields survived reset".to_string()
        })?;
        ensure(session.entrants().is_empty() && session.schedule().is_empty(), || {
            "roster or schedule survived reset".to_string()
        })?;

        let last = drain_last(&mut events);
        ensure(last == Some(RaceEvent::Reset { run_id: 1 }), || {
            format!("event after reset: {last:?}")
        })?;

        info!("✓ ResetMidRun complete: cancelled in round {}", round);
        Ok(Observation::of(state))
    }

    /// RACE-004: reset mid-run, regenerate, run to the line.
    async fn run_restart_after_reset(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        session.generate()?;
        let engine = session.engine();

        let stale = started(session.start()?)?;
        wait_for(engine, "first progress", in_motion).await?;
        session.reset();
        let outcome = stale.join().await?;
        ensure(outcome == RunOutcome::Cancelled, || format!("stale run ended {outcome:?}"))?;

        session.generate()?;
        let fresh = started(session.start()?)?;
        ensure(fresh.generation() == 1, || format!("fresh run in generation {}", fresh.generation()))?;
        let outcome = fresh.join().await?;
        ensure(outcome == RunOutcome::Finished, || format!("fresh run ended {outcome:?}"))?;

        let state = session.snapshot();
        ensure(state.run_id == 1, || format!("run id {}", state.run_id))?;
        ensure(state.status == RaceStatus::Finished, || format!("status {}", state.status))?;
        check_results(&state, &session.schedule())?;

        info!("✓ RestartAfterReset complete");
        Ok(Observation::of(state))
    }

    /// RACE-005: start with incomplete collaborators.
    ///
    /// **Assertion**: every attempt fails with a precondition error and
    /// publishes nothing.
    async fn run_precondition(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        let mut events = session.engine().subscribe();

        expect_precondition(session.start())?;
        ensure(session.snapshot().status == RaceStatus::Idle, || "status changed".to_string())?;
        ensure(drain_last(&mut events).is_none(), || "failed start published an event".to_string())?;

        session.generate()?;
        let entrants = session.entrants();
        let schedule = session.schedule();
        let rng_factory: Arc<dyn RngFactory> = Arc::new(SeedPolicy::from_context(Arc::clone(context)));

        let cases: [(Vec<Entrant>, Vec<Round>); 4] = [
            (Vec::new(), schedule.clone()),
            (entrants[..entrants.len() - 1].to_vec(), schedule.clone()),
            (entrants.clone(), Vec::new()),
            (entrants.clone(), schedule[..schedule.len() - 1].to_vec()),
        ];

        for (roster, rounds) in cases {
            let (roster_len, rounds_len) = (roster.len(), rounds.len());
            let engine = RaceEngine::new(
                Arc::clone(context),
                Arc::new(roster),
                Arc::new(rounds),
                Arc::clone(&rng_factory),
                self.config(),
            );
            engine.prepare();

            expect_precondition(engine.start())?;
            ensure(engine.status() == RaceStatus::Ready && !engine.has_active_run(), || {
                format!("state touched with {roster_len} entrants / {rounds_len} rounds")
            })?;
            debug!("  rejected {} entrants / {} rounds", roster_len, rounds_len);
        }

        info!("✓ Precondition complete");
        Ok(Observation::of(session.snapshot()))
    }

    /// RACE-006: run the race, replay it on a fresh clock, compare.
    async fn run_race(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let first = self.race_once(context).await?;
        let replay = self.race_once(&SimContext::shared(self.seed)).await?;

        ensure(first.entrants == replay.entrants, || "replay drew a different roster".to_string())?;
        ensure(first.state.results == replay.state.results, || "replay placed differently".to_string())?;

        info!("✓ Race complete: replay matched");
        Ok(first)
    }

    async fn race_once(&self, context: &Arc<SimContext>) -> Result<Observation, ScenarioError> {
        let session = self.session(context);
        session.generate()?;

        let outcome = started(session.start()?)?.join().await?;
        ensure(outcome == RunOutcome::Finished, || format!("run ended {outcome:?}"))?;

        let state = session.snapshot();
        check_results(&state, &session.schedule())?;
        Ok(Observation {
            state,
            entrants: session.entrants(),
        })
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

fn started(handle: Option<RunHandle>) -> Result<RunHandle, ScenarioError> {
    handle.ok_or_else(|| ScenarioError::Assertion("start returned no run".to_string()))
}

fn expect_precondition(result: Result<Option<RunHandle>, RaceError>) -> Result<(), ScenarioError> {
    match result {
        Err(RaceError::Precondition(_)) => Ok(()),
        Err(other) => Err(ScenarioError::Assertion(format!("expected precondition error, got {other}"))),
        Ok(_) => Err(ScenarioError::Assertion("start succeeded without a complete race".to_string())),
    }
}

fn in_motion(state: &RaceRunState) -> bool {
    state.progress.values().any(|p| *p > 0.0 && *p < 1.0)
}

/// Every round has a result, in order, placing exactly its entrants.
fn check_results(state: &RaceRunState, schedule: &[Round]) -> Result<(), ScenarioError> {
    ensure(state.results.len() == schedule.len(), || {
        format!("{} results for {} rounds", state.results.len(), schedule.len())
    })?;

    for (round, result) in schedule.iter().zip(&state.results) {
        ensure(result.round_index == round.round_index, || {
            format!("result {} out of order", result.round_index)
        })?;

        let placed: HashSet<_> = result.placements.iter().collect();
        let drawn: HashSet<_> = round.entrant_ids.iter().collect();
        ensure(result.placements.len() == round.entrant_ids.len() && placed == drawn, || {
            format!("round {} placements are not a permutation of its entrants", round.round_index)
        })?;
    }
    Ok(())
}

async fn wait_for<Ctx: RaceContext>(
    engine: &RaceEngine<Ctx>,
    what: &str,
    condition: impl Fn(&RaceRunState) -> bool,
) -> Result<RaceRunState, ScenarioError> {
    for _ in 0..MAX_WAIT_YIELDS {
        let state = engine.snapshot();
        if condition(&state) {
            return Ok(state);
        }
        tokio::task::yield_now().await;
    }
    Err(ScenarioError::Timeout(what.to_string()))
}

async fn next_progress(
    events: &mut broadcast::Receiver<RaceEvent>,
) -> Result<BTreeMap<u32, f64>, ScenarioError> {
    loop {
        match events.recv().await {
            Ok(RaceEvent::ProgressUpdated { progress }) => return Ok(progress),
            Ok(_) => continue,
            Err(err) => return Err(ScenarioError::Assertion(format!("event stream: {err}"))),
        }
    }
}

fn drain_last(events: &mut broadcast::Receiver<RaceEvent>) -> Option<RaceEvent> {
    let mut last = None;
    loop {
        match events.try_recv() {
            Ok(event) => last = Some(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_run_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::FullRun);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.rounds_completed, 6);
        assert_eq!(result.final_status, Some(RaceStatus::Finished));
        assert!(result.virtual_time_ms > 0);
    }

    #[test]
    fn test_pause_resume_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::PauseResume);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_reset_mid_run_scenario() {
        let result = ScenarioRunner::new(7).run(ScenarioId::ResetMidRun);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.final_status, Some(RaceStatus::Idle));
        assert_eq!(result.rounds_completed, 0);
    }

    #[test]
    fn test_restart_after_reset_scenario() {
        let result = ScenarioRunner::new(3)
            .with_mode(RaceMode::Automated)
            .run(ScenarioId::RestartAfterReset);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_precondition_scenario() {
        let result = ScenarioRunner::new(1).run(ScenarioId::Precondition);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.final_status, Some(RaceStatus::Ready));
    }

    #[test]
    fn test_race_is_deterministic() {
        let runner1 = ScenarioRunner::new(42).with_mode(RaceMode::Automated);
        let runner2 = ScenarioRunner::new(42).with_mode(RaceMode::Automated);

        let result1 = runner1.run(ScenarioId::Race);
        let result2 = runner2.run(ScenarioId::Race);

        assert!(result1.passed, "{:?}", result1.failure_reason);
        assert_eq!(result1.results, result2.results);
        assert_eq!(result1.entrants.len(), 20);
        assert_eq!(result1.virtual_time_ms, result2.virtual_time_ms);
    }

    #[test]
    fn test_timing_mode_does_not_change_placements() {
        let normal = ScenarioRunner::new(5).run(ScenarioId::Race);
        let automated = ScenarioRunner::new(5)
            .with_mode(RaceMode::Automated)
            .run(ScenarioId::Race);

        assert_eq!(normal.results, automated.results);
        assert!(normal.virtual_time_ms > automated.virtual_time_ms);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_seed_survives_reset_and_pause(seed in any::<u64>()) {
            let runner = ScenarioRunner::new(seed).with_mode(RaceMode::Automated);

            for scenario in [ScenarioId::PauseResume, ScenarioId::ResetMidRun] {
                let result = runner.run(scenario);
                prop_assert!(result.passed, "{} seed={}: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }
}
