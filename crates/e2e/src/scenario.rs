//! Scenario identifiers and verdicts

use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed scenario catalogue, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioId {
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    E1,
    E2,
    E3,
    E4,
    E5,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 11] = [
        ScenarioId::T1,
        ScenarioId::T2,
        ScenarioId::T3,
        ScenarioId::T4,
        ScenarioId::T5,
        ScenarioId::T6,
        ScenarioId::E1,
        ScenarioId::E2,
        ScenarioId::E3,
        ScenarioId::E4,
        ScenarioId::E5,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ScenarioId::T1 => "profile select is the first screen",
            ScenarioId::T2 => "choosing a profile opens the title screen",
            ScenarioId::T3 => "last selected profile is persisted",
            ScenarioId::T4 => "settings can return to profile select",
            ScenarioId::T5 => "profiles keep separate daily and rank records",
            ScenarioId::T6 => "profile reset clears only that profile",
            ScenarioId::E1 => "enter submits exactly once",
            ScenarioId::E2 => "click submits exactly once",
            ScenarioId::E3 => "keypad digits append to the answer",
            ScenarioId::E4 => "rapid clicks submit exactly once",
            ScenarioId::E5 => "round ends when the timer runs out",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Verdict of one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub id: ScenarioId,
    pub pass: bool,
}

impl ScenarioResult {
    pub fn new(id: ScenarioId, pass: bool) -> Self {
        Self { id, pass }
    }
}

/// Serialize results as the single output line.
pub fn to_json_line(results: &[ScenarioResult]) -> serde_json::Result<String> {
    serde_json::to_string(results)
}
