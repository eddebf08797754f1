use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often a chore is expected to be done.
///
/// The string labels are what gets stored in the database and sent over
/// the wire, so they must not change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    #[serde(rename = "Semi-annually")]
    SemiAnnually,
    Annual,
    #[serde(rename = "Summer-weekly")]
    SummerWeekly,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::SemiAnnually,
        Frequency::Annual,
        Frequency::SummerWeekly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::SemiAnnually => "Semi-annually",
            Frequency::Annual => "Annual",
            Frequency::SummerWeekly => "Summer-weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frequency: {0}")]
pub struct UnknownFrequency(pub String);

impl FromStr for Frequency {
    type Err = UnknownFrequency;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownFrequency(s.to_string()))
    }
}

/// A chore definition as it appears in seed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreTemplate {
    pub room: String,
    pub task: String,
    pub frequency: Frequency,
    pub estimated_time: i32,
}

/// Whether an assignment has a completion recorded against it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    Complete,
    Incomplete,
}

impl CompletionStatus {
    pub fn from_completed(done: bool) -> Self {
        if done {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Incomplete
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "Complete",
            CompletionStatus::Incomplete => "Incomplete",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed share in percent; zero when nothing was assigned.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}
