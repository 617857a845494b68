//! Simulation context implementing RaceContext for deterministic testing.

use async_trait::async_trait;
use derby_env::RaceContext;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Simulation context backed by a virtual clock and a fixed seed.
///
/// This implements `RaceContext` using:
/// - A virtual clock that only moves when someone sleeps or advances it
/// - The master seed, handed to the engine as its seed hint
/// - A seeded ChaCha8 RNG for choosing when host commands fire
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Deterministic RNG for command timing
    rng: Arc<Mutex<ChaCha8Rng>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed the race engine resolves; the low 32 bits of the master seed.
    pub fn race_seed(&self) -> u32 {
        self.seed as u32
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration.as_nanos() as u64;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Draws a value in `range` from the command-timing stream.
    ///
    /// Independent of the race's own random stream, so where a scenario
    /// pauses or resets never changes the race outcome.
    pub fn chaos_range(&self, range: Range<u64>) -> u64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(range)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl RaceContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping advances virtual time, then lets other tasks observe it
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let span = tracing::debug_span!("sim_task", name = %name, seed = self.seed);
        tokio::spawn(future.instrument(span))
    }

    fn seed_hint(&self) -> Option<String> {
        Some(self.race_seed().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new(1);

        ctx.sleep(Duration::from_millis(40)).await;
        ctx.sleep(Duration::from_millis(16)).await;

        assert_eq!(ctx.now(), Duration::from_millis(56));
        assert_eq!(
            ctx.system_time().duration_since(UNIX_EPOCH).unwrap(),
            Duration::from_secs(1704067200) + Duration::from_millis(56)
        );
    }

    #[test]
    fn test_seed_hint_is_low_bits_of_seed() {
        assert_eq!(SimContext::new(42).seed_hint().as_deref(), Some("42"));
        assert_eq!(SimContext::new((1 << 32) + 5).race_seed(), 5);
    }

    #[test]
    fn test_chaos_range_is_deterministic() {
        let a = SimContext::new(9);
        let b = SimContext::new(9);

        let draws_a: Vec<u64> = (0..20).map(|_| a.chaos_range(1..7)).collect();
        let draws_b: Vec<u64> = (0..20).map(|_| b.chaos_range(1..7)).collect();

        assert_eq!(draws_a, draws_b);
        assert!(draws_a.iter().all(|d| (1..7).contains(d)));
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        assert_eq!(ctx1.now(), ctx2.now());
    }
}
