//! Production implementation of RaceContext using Tokio.

use crate::RaceContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Environment variable holding the optional race seed.
pub const SEED_ENV_VAR: &str = "DERBY_RNG_SEED";

/// Production context backed by Tokio and the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Overrides the environment lookup when set
    seed_override: Option<String>,
}

impl TokioContext {
    /// Creates a new TokioContext reading the seed from the environment.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            seed_override: None,
        }
    }

    /// Creates a context with a fixed seed string instead of the env var.
    pub fn with_seed_hint(seed: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            seed_override: Some(seed.into()),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaceContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let span = tracing::info_span!("task", name = %name);
        tokio::spawn(future.instrument(span))
    }

    fn seed_hint(&self) -> Option<String> {
        match &self.seed_override {
            Some(seed) => Some(seed.clone()),
            None => std::env::var(SEED_ENV_VAR).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_context_spawn_returns_output() {
        let ctx = TokioContext::new();
        let handle = ctx.spawn("answer", async { 21 * 2 });

        assert_eq!(handle.await.unwrap(), 42);
    }

    #[test]
    fn test_seed_override() {
        let ctx = TokioContext::with_seed_hint("777");
        assert_eq!(ctx.seed_hint().as_deref(), Some("777"));
    }

    #[test]
    fn test_wall_clock_millis_is_recent() {
        let ctx = TokioContext::new();
        // 2020-01-01 in epoch millis
        assert!(ctx.wall_clock_millis() > 1_577_836_800_000);
    }
}
