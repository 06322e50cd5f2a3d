//! Canonical link conditions used to sanity-check a trained table.
//!
//! Each scenario pins one hand-picked observation and, where the answer is
//! unambiguous, the uplink any sensible policy should pick. Scenarios whose
//! answer depends on what was learned carry `expected: None`.

use crate::{Decider, Decision, Observation, Uplink};

/// One named check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub observation: Observation,
    pub expected: Option<Uplink>,
}

/// The four canonical scenarios.
pub fn canonical_scenarios() -> [Scenario; 4] {
    [
        Scenario {
            name: "primary-good",
            description: "A fast and clean, B slower; voice-heavy",
            observation: Observation::new(40.0, 0.01, 95.0, 0.05, 0.8),
            expected: Some(Uplink::A),
        },
        Scenario {
            name: "primary-degraded",
            description: "A slow and lossy, B healthy",
            observation: Observation::new(160.0, 0.12, 35.0, 0.0, 0.6),
            expected: Some(Uplink::B),
        },
        Scenario {
            name: "bulk-heavy",
            description: "both healthy, B slightly faster; bulk-heavy traffic",
            observation: Observation::new(60.0, 0.02, 40.0, 0.0, 0.1),
            expected: None,
        },
        Scenario {
            name: "backup-outage",
            description: "B past the outage loss threshold",
            observation: Observation::new(50.0, 0.02, 40.0, 0.60, 0.6),
            expected: Some(Uplink::A),
        },
    ]
}

/// A scenario together with the decision taken for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub decision: Decision,
}

impl ScenarioOutcome {
    /// `None` when the scenario has no fixed expectation.
    pub fn passed(&self) -> Option<bool> {
        self.scenario
            .expected
            .map(|want| want == self.decision.chosen)
    }
}

/// Decide every canonical scenario with `decider`.
pub fn run_scenarios(decider: &Decider) -> Vec<ScenarioOutcome> {
    canonical_scenarios()
        .into_iter()
        .map(|scenario| ScenarioOutcome {
            decision: decider.decide(&scenario.observation),
            scenario,
        })
        .collect()
}
