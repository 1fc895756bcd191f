// Downstream job kinds the engine triggers or reconciles but does not execute:
// benchmark (compliance) jobs and their per-connection runners.

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BenchmarkJobStatus {
    Created,
    RunnersInProgress,
    SummarizerInProgress,
    Succeeded,
    Failed,
    Timeout,
}

impl BenchmarkJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkJobStatus::Created => "CREATED",
            BenchmarkJobStatus::RunnersInProgress => "RUNNERS_IN_PROGRESS",
            BenchmarkJobStatus::SummarizerInProgress => "SUMMARIZER_IN_PROGRESS",
            BenchmarkJobStatus::Succeeded => "SUCCEEDED",
            BenchmarkJobStatus::Failed => "FAILED",
            BenchmarkJobStatus::Timeout => "TIMEOUT",
        }
    }

    /// Anything past the runner phase counts as resolved for sequencing
    pub fn is_resolved(&self) -> bool {
        !matches!(
            self,
            BenchmarkJobStatus::Created | BenchmarkJobStatus::RunnersInProgress
        )
    }
}

impl FromStr for BenchmarkJobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(BenchmarkJobStatus::Created),
            "RUNNERS_IN_PROGRESS" => Ok(BenchmarkJobStatus::RunnersInProgress),
            "SUMMARIZER_IN_PROGRESS" => Ok(BenchmarkJobStatus::SummarizerInProgress),
            "SUCCEEDED" => Ok(BenchmarkJobStatus::Succeeded),
            "FAILED" => Ok(BenchmarkJobStatus::Failed),
            "TIMEOUT" => Ok(BenchmarkJobStatus::Timeout),
            _ => Err(DomainError::UnknownValue {
                kind: "benchmark job status",
                value: s.to_string(),
            }),
        }
    }
}

/// Compliance runner status; FAILED/TIMEOUT runners are retried with back-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerStatus {
    Created,
    Queued,
    InProgress,
    Succeeded,
    Failed,
    Timeout,
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Created => "CREATED",
            RunnerStatus::Queued => "QUEUED",
            RunnerStatus::InProgress => "IN_PROGRESS",
            RunnerStatus::Succeeded => "SUCCEEDED",
            RunnerStatus::Failed => "FAILED",
            RunnerStatus::Timeout => "TIMEOUT",
        }
    }
}

impl FromStr for RunnerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(RunnerStatus::Created),
            "QUEUED" => Ok(RunnerStatus::Queued),
            "IN_PROGRESS" => Ok(RunnerStatus::InProgress),
            "SUCCEEDED" => Ok(RunnerStatus::Succeeded),
            "FAILED" => Ok(RunnerStatus::Failed),
            "TIMEOUT" => Ok(RunnerStatus::Timeout),
            _ => Err(DomainError::UnknownValue {
                kind: "runner status",
                value: s.to_string(),
            }),
        }
    }
}
