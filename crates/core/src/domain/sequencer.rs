// Job Sequencer Domain Model
// "Run NextJob once every job in DependencyList has resolved"

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type SequencerId = i64;

/// Job kind the dependency IDs refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencySource {
    Describe,
    Benchmark,
}

impl DependencySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencySource::Describe => "Describe",
            DependencySource::Benchmark => "Benchmark",
        }
    }
}

impl FromStr for DependencySource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Describe" => Ok(DependencySource::Describe),
            "Benchmark" => Ok(DependencySource::Benchmark),
            _ => Err(DomainError::UnknownValue {
                kind: "dependency source",
                value: s.to_string(),
            }),
        }
    }
}

/// Downstream job triggered once dependencies resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NextJob {
    Analytics,
    Benchmark { benchmark_id: String },
}

impl NextJob {
    pub fn kind(&self) -> &'static str {
        match self {
            NextJob::Analytics => "Analytics",
            NextJob::Benchmark { .. } => "Benchmark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencerStatus {
    WaitingForDependencies,
    Finished,
    Failed,
}

impl SequencerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequencerStatus::WaitingForDependencies => "WaitingForDependencies",
            SequencerStatus::Finished => "Finished",
            SequencerStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SequencerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequencerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WaitingForDependencies" => Ok(SequencerStatus::WaitingForDependencies),
            "Finished" => Ok(SequencerStatus::Finished),
            "Failed" => Ok(SequencerStatus::Failed),
            _ => Err(DomainError::UnknownValue {
                kind: "sequencer status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSequencer {
    pub id: SequencerId,
    pub dependency_list: Vec<i64>,
    pub dependency_source: DependencySource,
    pub next_job: NextJob,
    pub status: SequencerStatus,
    pub failure_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJobSequencer {
    pub dependency_list: Vec<i64>,
    pub dependency_source: DependencySource,
    pub next_job: NextJob,
}

impl NewJobSequencer {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.dependency_list.is_empty() {
            return Err(DomainError::ValidationError(
                "job sequencer needs at least one dependency".to_string(),
            ));
        }
        if let NextJob::Benchmark { benchmark_id } = &self.next_job {
            if benchmark_id.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "benchmark_id cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
