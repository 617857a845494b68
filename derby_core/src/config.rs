//! Race configuration: sizes, distances, scoring weights and timing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that switches the engine to automated-test timing.
pub const E2E_ENV_VAR: &str = "DERBY_E2E";

/// Distances (meters) of the six rounds, in schedule order.
pub const ROUND_DISTANCES: [u32; 6] = [1200, 1400, 1600, 1800, 2000, 2200];

/// Colour palette assigned to entrants by roster position.
pub const ENTRANT_COLORS: [&str; 20] = [
    "#E6194B", "#3CB44B", "#FFE119", "#4363D8", "#F58231",
    "#911EB4", "#46F0F0", "#F032E6", "#BCF60C", "#FABEBE",
    "#008080", "#E6BEFF", "#9A6324", "#FFFAC8", "#800000",
    "#AAFFC3", "#808000", "#FFD8B1", "#000075", "#808080",
];

/// Colour used when the roster outgrows the palette.
pub const FALLBACK_COLOR: &str = "#000000";

/// Timing profile of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceMode {
    /// Human-watchable race timing
    #[default]
    Normal,

    /// Short rounds and fast ticks for automated end-to-end runs
    Automated,
}

/// Finish-time window of a round, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBounds {
    /// Finish time of a perfect score
    pub min_ms: f64,

    /// Finish time of a zero score
    pub max_ms: f64,
}

impl TimeBounds {
    /// Scales both bounds by the same factor.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            min_ms: self.min_ms * factor,
            max_ms: self.max_ms * factor,
        }
    }
}

/// Configuration for a race engine and its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Timing profile
    pub mode: RaceMode,

    /// Entrants required on the roster (default: 20)
    pub roster_size: usize,

    /// Entrants drawn into every round (default: 10)
    pub round_size: usize,

    /// Round distances in schedule order; its length is the schedule length
    pub round_distances: Vec<u32>,

    /// Distance the base time bounds are calibrated for (default: 1200)
    pub base_distance: f64,

    /// Score every entrant starts from
    pub score_baseline: f64,

    /// Weight applied to the normalized condition
    pub condition_weight: f64,

    /// Weight applied to the luck draw
    pub luck_weight: f64,

    /// Base finish window in normal mode
    pub normal_bounds: TimeBounds,

    /// Base finish window in automated mode
    pub automated_bounds: TimeBounds,

    /// Progress publish interval in normal mode
    pub normal_tick: Duration,

    /// Progress publish interval in automated mode
    pub automated_tick: Duration,

    /// Poll interval while the race is paused
    pub pause_poll: Duration,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            mode: RaceMode::Normal,
            roster_size: 20,
            round_size: 10,
            round_distances: ROUND_DISTANCES.to_vec(),
            base_distance: 1200.0,
            score_baseline: 0.2,
            // Luck dominates: a strong entrant can still lose to a lucky one.
            condition_weight: 0.25,
            luck_weight: 0.65,
            normal_bounds: TimeBounds { min_ms: 700.0, max_ms: 1600.0 },
            automated_bounds: TimeBounds { min_ms: 120.0, max_ms: 260.0 },
            normal_tick: Duration::from_millis(40),
            automated_tick: Duration::from_millis(16),
            pause_poll: Duration::from_millis(50),
        }
    }
}

impl RaceConfig {
    /// Builds the default config, switching to automated timing when
    /// `DERBY_E2E=1` is set.
    pub fn from_env() -> Self {
        let flag = std::env::var(E2E_ENV_VAR).ok();
        Self::default().with_mode(mode_from_flag(flag.as_deref()))
    }

    /// Sets the timing profile.
    pub fn with_mode(mut self, mode: RaceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of rounds a complete schedule has.
    pub fn schedule_len(&self) -> usize {
        self.round_distances.len()
    }

    /// Base finish window for the current mode.
    pub fn base_bounds(&self) -> TimeBounds {
        match self.mode {
            RaceMode::Normal => self.normal_bounds,
            RaceMode::Automated => self.automated_bounds,
        }
    }

    /// Finish window for a round of the given distance.
    pub fn bounds_for(&self, distance: u32) -> TimeBounds {
        self.base_bounds().scaled(distance as f64 / self.base_distance)
    }

    /// Progress publish interval for the current mode.
    pub fn tick_interval(&self) -> Duration {
        match self.mode {
            RaceMode::Normal => self.normal_tick,
            RaceMode::Automated => self.automated_tick,
        }
    }
}

fn mode_from_flag(flag: Option<&str>) -> RaceMode {
    match flag {
        Some("1") => RaceMode::Automated,
        _ => RaceMode::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = RaceConfig::default();
        assert_eq!(config.roster_size, 20);
        assert_eq!(config.round_size, 10);
        assert_eq!(config.schedule_len(), 6);
        assert_eq!(config.tick_interval(), Duration::from_millis(40));
    }

    #[test]
    fn test_automated_mode_switches_timing() {
        let config = RaceConfig::default().with_mode(RaceMode::Automated);
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.base_bounds(), TimeBounds { min_ms: 120.0, max_ms: 260.0 });
    }

    #[test]
    fn test_bounds_scale_with_distance() {
        let config = RaceConfig::default();
        let bounds = config.bounds_for(1800);

        assert_relative_eq!(bounds.min_ms, 1050.0);
        assert_relative_eq!(bounds.max_ms, 2400.0);
    }

    #[test]
    fn test_mode_flag() {
        assert_eq!(mode_from_flag(Some("1")), RaceMode::Automated);
        assert_eq!(mode_from_flag(Some("true")), RaceMode::Normal);
        assert_eq!(mode_from_flag(None), RaceMode::Normal);
    }
}
