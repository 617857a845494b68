//! Core environment context trait for the race engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the race engine can run
/// against the system clock in production and against a virtual clock in
/// deterministic tests.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and process env
/// - **Simulation**: `SimContext` (in `derby_sim`) - virtual clock, fixed seed
#[async_trait]
pub trait RaceContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// All elapsed-time and pause accounting in the tick loop is measured
    /// against this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time.
    fn system_time(&self) -> SystemTime;

    /// Wall-clock milliseconds since the Unix epoch.
    ///
    /// Used as the fallback seed when no external seed is configured.
    fn wall_clock_millis(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task and returns its join handle.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;

    /// Returns the external seed string, if one is configured.
    ///
    /// The value is passed through untouched; parsing and fallback are
    /// the caller's job.
    fn seed_hint(&self) -> Option<String>;
}
