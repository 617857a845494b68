//! Derby Core - Deterministic Multi-Round Horse Race Engine
//!
//! This library runs a six-round horse race whose outcome is fully decided
//! by a seed:
//! 1. **Reproducible randomness**: Mulberry32 stream per generate/start call
//! 2. **Fair draws**: Fisher–Yates sampling of each round's entrants
//! 3. **Cancellable runs**: a generation token makes a reset win over any
//!    in-flight round, even across pauses
//!
//! # Architecture
//!
//! ```text
//! RosterStore ──┐
//!               ├──▶ RaceEngine ──RaceEvent──▶ subscribers / snapshot()
//! ScheduleStore ┘        │
//!                        ▼
//!               RaceContext (clock, sleep, spawn)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod rng;
pub mod roster;
pub mod sampler;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod state;
pub mod types;

// Re-export key types for convenience
pub use config::{RaceConfig, RaceMode, TimeBounds};
pub use engine::{RaceEngine, RunHandle, RunOutcome};
pub use error::RaceError;
pub use rng::{Mulberry32, RandomSource, RngFactory, SeedPolicy};
pub use roster::{RosterProvider, RosterStore};
pub use sampler::pick_unique;
pub use schedule::{ScheduleProvider, ScheduleStore};
pub use scoring::RoundOutcome;
pub use session::RaceSession;
pub use state::{RaceEvent, RaceRunState};
pub use types::{Entrant, EntrantId, RaceCommand, RaceStatus, Round, RoundResult, Schedule};
