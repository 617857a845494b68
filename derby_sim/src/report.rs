//! Run summaries for CI parsing and the placements table.

use crate::runner::ScenarioResult;
use derby_core::{Entrant, EntrantId, RoundResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Summary of every scenario run in one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn new(results: Vec<ScenarioResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();

        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Renders one block per round: distance, then entrants fastest first.
pub fn placements_table(entrants: &[Entrant], results: &[RoundResult]) -> String {
    let by_id: HashMap<EntrantId, &Entrant> = entrants.iter().map(|e| (e.id, e)).collect();
    let mut out = String::new();

    for result in results {
        let _ = writeln!(out, "Round {} - {}m", result.round_index, result.distance);
        for (rank, id) in result.placements.iter().enumerate() {
            match by_id.get(id) {
                Some(entrant) => {
                    let _ = writeln!(
                        out,
                        "  {:>2}. {:<20} #{:<3} cond {:>3}",
                        rank + 1,
                        entrant.name,
                        entrant.id,
                        entrant.condition
                    );
                }
                None => {
                    let _ = writeln!(out, "  {:>2}. #{}", rank + 1, id);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;
    use derby_core::RaceStatus;

    fn result(scenario: ScenarioId, passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: 42,
            passed,
            virtual_time_ms: 1000,
            rounds_completed: 6,
            final_status: Some(RaceStatus::Finished),
            entrants: Vec::new(),
            results: Vec::new(),
            failure_reason: (!passed).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::new(vec![
            result(ScenarioId::FullRun, true),
            result(ScenarioId::ResetMidRun, false),
        ]);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_summary_json_uses_scenario_names() {
        let summary = RunSummary::new(vec![result(ScenarioId::PauseResume, true)]);
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

        assert_eq!(json["results"][0]["scenario"], "pause_resume");
        assert_eq!(json["results"][0]["final_status"], "finished");
        assert!(json["results"][0].get("entrants").is_none());
    }

    #[test]
    fn test_placements_table() {
        let entrants = vec![Entrant {
            id: 7,
            name: "Swift Bay".to_string(),
            color: "#E6194B".to_string(),
            condition: 80,
        }];
        let results = vec![RoundResult {
            round_index: 1,
            distance: 1200,
            placements: vec![7, 3],
        }];

        let table = placements_table(&entrants, &results);

        assert!(table.starts_with("Round 1 - 1200m"));
        assert!(table.contains("1. Swift Bay"));
        assert!(table.contains("2. #3"));
    }
}
