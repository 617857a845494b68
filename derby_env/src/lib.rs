//! Derby Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the race engine
//! to run in both **Production** (tokio, wall clock) and **Simulation**
//! (virtual clock) environments.
//!
//! # Core Concept
//!
//! The race loop never touches time directly. Every source of
//! non-determinism is routed through [`RaceContext`]:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - The external seed string (`seed_hint()`)
//!
//! With a virtual clock and a fixed seed, a whole race (including pause
//! and reset timing) becomes reproducible.
//!
//! # Example
//!
//! ```ignore
//! use derby_env::RaceContext;
//!
//! async fn tick_loop<Ctx: RaceContext>(ctx: &Ctx) {
//!     let started = ctx.now();
//!     while ctx.now() - started < Duration::from_millis(400) {
//!         publish_progress();
//!         ctx.sleep(Duration::from_millis(40)).await;
//!     }
//! }
//! ```

mod context;
mod tokio_impl;

pub use context::RaceContext;
pub use tokio_impl::{TokioContext, SEED_ENV_VAR};
