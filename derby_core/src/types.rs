//! Race data model: entrants, rounds, results and lifecycle status.

use serde::{Deserialize, Serialize};

/// Identifier of an entrant; ids start at 1.
pub type EntrantId = u32;

/// A race participant.
///
/// Created once per roster generation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    /// Unique id, starting at 1
    pub id: EntrantId,

    /// Display name
    pub name: String,

    /// Display colour as `#RRGGBB`
    pub color: String,

    /// Performance attribute in [1, 100]
    pub condition: u8,
}

/// One heat of the race: a distance and a fixed-size entrant subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based position in the schedule
    pub round_index: u32,

    /// Distance in meters
    pub distance: u32,

    /// Entrants running this round, in draw order (no duplicates)
    pub entrant_ids: Vec<EntrantId>,
}

/// Ordered sequence of rounds for a run.
pub type Schedule = Vec<Round>;

/// Finish order of a completed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_index: u32,
    pub distance: u32,

    /// Entrant ids, fastest first
    pub placements: Vec<EntrantId>,
}

impl RoundResult {
    /// Winner of the round, if anyone finished.
    pub fn winner(&self) -> Option<EntrantId> {
        self.placements.first().copied()
    }
}

/// Lifecycle status of the race engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    #[default]
    Idle,
    Ready,
    Running,
    Paused,
    Finished,
}

impl RaceStatus {
    /// Returns the status name.
    pub fn name(&self) -> &'static str {
        match self {
            RaceStatus::Idle => "idle",
            RaceStatus::Ready => "ready",
            RaceStatus::Running => "running",
            RaceStatus::Paused => "paused",
            RaceStatus::Finished => "finished",
        }
    }

    /// Whether a host control for `command` should be enabled in this status.
    ///
    /// Mirrors the control panel of the race UI: generating is only offered
    /// from a clean slate, and reset is withheld while the race is moving.
    pub fn allows(&self, command: RaceCommand) -> bool {
        use RaceCommand::{Generate, Pause, Reset, Resume, Start};

        match self {
            RaceStatus::Idle => matches!(command, Generate),
            RaceStatus::Ready => matches!(command, Start | Reset),
            RaceStatus::Running => matches!(command, Pause),
            RaceStatus::Paused => matches!(command, Resume | Reset),
            RaceStatus::Finished => matches!(command, Reset),
        }
    }
}

impl std::fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Host-facing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceCommand {
    Generate,
    Start,
    Pause,
    Resume,
    Reset,
}

impl RaceCommand {
    /// All commands, in control-panel order.
    pub fn all() -> [RaceCommand; 5] {
        [
            RaceCommand::Generate,
            RaceCommand::Start,
            RaceCommand::Pause,
            RaceCommand::Resume,
            RaceCommand::Reset,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_matrix() {
        use RaceCommand::*;

        let enabled = |status: RaceStatus| -> Vec<RaceCommand> {
            RaceCommand::all()
                .into_iter()
                .filter(|c| status.allows(*c))
                .collect()
        };

        assert_eq!(enabled(RaceStatus::Idle), vec![Generate]);
        assert_eq!(enabled(RaceStatus::Ready), vec![Start, Reset]);
        assert_eq!(enabled(RaceStatus::Running), vec![Pause]);
        assert_eq!(enabled(RaceStatus::Paused), vec![Resume, Reset]);
        assert_eq!(enabled(RaceStatus::Finished), vec![Reset]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RaceStatus::Finished.to_string(), "finished");
        assert_eq!(RaceStatus::default(), RaceStatus::Idle);
    }

    #[test]
    fn test_winner() {
        let result = RoundResult {
            round_index: 1,
            distance: 1200,
            placements: vec![7, 3, 9],
        };
        assert_eq!(result.winner(), Some(7));
    }
}
