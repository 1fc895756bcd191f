// Describe Delivery Port (Interface)
// One implementation per backend, selected once at startup.

use crate::domain::{DescribeJob, DescribeWorkerPayload};
use async_trait::async_trait;
use thiserror::Error;

/// Outcome of a successful hand-off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Transport-assigned sequence number (durable queues only)
    pub sequence: Option<u64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Backend throttled the invocation: {0}")]
    Throttled(String),

    #[error("Invocation failed: {0}")]
    Invocation(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),
}

impl DeliveryError {
    /// Error code stored on the FAILED job
    pub fn error_code(&self) -> &'static str {
        match self {
            DeliveryError::Throttled(_) => "Throttled",
            DeliveryError::Invocation(_) | DeliveryError::StreamNotFound(_) => "InvocationError",
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryError::Throttled(_) => "throttled",
            DeliveryError::Invocation(_) => "invocation",
            DeliveryError::StreamNotFound(_) => "stream_not_found",
        }
    }
}

#[async_trait]
pub trait DescribeDelivery: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        job: &DescribeJob,
        payload: &DescribeWorkerPayload,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

pub mod mocks {
    use super::*;
    use crate::domain::JobId;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every payload; per-job failures can be scripted
    #[derive(Default)]
    pub struct RecordingDelivery {
        delivered: Mutex<Vec<DescribeWorkerPayload>>,
        failures: Mutex<HashMap<JobId, DeliveryError>>,
        fail_all: Mutex<Option<DeliveryError>>,
        next_sequence: Mutex<u64>,
    }

    impl RecordingDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(error: DeliveryError) -> Self {
            let delivery = Self::default();
            *delivery.fail_all.lock().unwrap() = Some(error);
            delivery
        }

        pub fn fail_job(&self, id: JobId, error: DeliveryError) {
            self.failures.lock().unwrap().insert(id, error);
        }

        pub fn delivered(&self) -> Vec<DescribeWorkerPayload> {
            self.delivered.lock().unwrap().clone()
        }

        pub fn delivered_count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DescribeDelivery for RecordingDelivery {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(
            &self,
            job: &DescribeJob,
            payload: &DescribeWorkerPayload,
        ) -> Result<DeliveryReceipt, DeliveryError> {
            if let Some(error) = self.fail_all.lock().unwrap().clone() {
                return Err(error);
            }
            if let Some(error) = self.failures.lock().unwrap().get(&job.id).cloned() {
                return Err(error);
            }
            self.delivered.lock().unwrap().push(payload.clone());
            let mut sequence = self.next_sequence.lock().unwrap();
            *sequence += 1;
            Ok(DeliveryReceipt {
                sequence: Some(*sequence),
            })
        }
    }
}
