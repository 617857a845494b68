//! Race lifecycle scenarios for DST.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// RACE-001: Uninterrupted run from generate to finish
    FullRun,

    /// RACE-002: Pause mid-round, idle, resume
    PauseResume,

    /// RACE-003: Reset while a round is animating
    ResetMidRun,

    /// RACE-004: Reset, regenerate and run again
    RestartAfterReset,

    /// RACE-005: Start without a complete roster or schedule
    Precondition,

    /// RACE-006: Full race replayed twice; placements table
    Race,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FullRun,
            ScenarioId::PauseResume,
            ScenarioId::ResetMidRun,
            ScenarioId::RestartAfterReset,
            ScenarioId::Precondition,
            ScenarioId::Race,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FullRun => "full_run",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::ResetMidRun => "reset_mid_run",
            ScenarioId::RestartAfterReset => "restart_after_reset",
            ScenarioId::Precondition => "precondition",
            ScenarioId::Race => "race",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FullRun => "Six rounds run to completion, every placement a permutation of its round",
            ScenarioId::PauseResume => "Progress freezes while paused and resumes from the frozen value",
            ScenarioId::ResetMidRun => "Reset cancels the in-flight run with no later writes",
            ScenarioId::RestartAfterReset => "A fresh run after reset finishes under the new generation",
            ScenarioId::Precondition => "Start fails without 20 entrants and 6 rounds, state untouched",
            ScenarioId::Race => "Same seed twice gives the same placements",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_run" | "fullrun" | "race-001" => Ok(ScenarioId::FullRun),
            "pause_resume" | "pauseresume" | "race-002" => Ok(ScenarioId::PauseResume),
            "reset_mid_run" | "resetmidrun" | "race-003" => Ok(ScenarioId::ResetMidRun),
            "restart_after_reset" | "restartafterreset" | "race-004" => Ok(ScenarioId::RestartAfterReset),
            "precondition" | "race-005" => Ok(ScenarioId::Precondition),
            "race" | "race-006" => Ok(ScenarioId::Race),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("RACE-003".parse::<ScenarioId>(), Ok(ScenarioId::ResetMidRun));
        assert_eq!("PauseResume".parse::<ScenarioId>(), Ok(ScenarioId::PauseResume));
        assert!("photo_finish".parse::<ScenarioId>().is_err());
    }
}
