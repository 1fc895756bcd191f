// NATS JetStream delivery: durable publish with broker-side dedup

use async_nats::jetstream::{self, context::PublishErrorKind, stream};
use async_trait::async_trait;
use bytes::Bytes;
use describer_core::domain::{Connector, DescribeJob, DescribeWorkerPayload, TriggerType};
use describer_core::port::{DeliveryError, DeliveryReceipt, DescribeDelivery};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Broker dedup window for repeated message IDs
const DUPLICATE_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Stream and subject for one (connector, trigger class) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub name: String,
    pub subject: String,
}

fn trigger_class(trigger: TriggerType) -> &'static str {
    if trigger.is_manual() {
        "manual"
    } else {
        "scheduled"
    }
}

/// `describe.<connector>.<scheduled|manual>`
pub fn subject_for(connector: Connector, trigger: TriggerType) -> String {
    format!("describe.{}.{}", connector.as_str(), trigger_class(trigger))
}

/// `DESCRIBE_<CONNECTOR>_<SCHEDULED|MANUAL>`
pub fn stream_name_for(connector: Connector, trigger: TriggerType) -> String {
    format!(
        "DESCRIBE_{}_{}",
        connector.as_str().to_uppercase(),
        trigger_class(trigger).to_uppercase()
    )
}

/// Every stream the scheduler publishes to
pub fn describe_streams() -> Vec<StreamSpec> {
    let mut specs = Vec::new();
    for connector in [Connector::Aws, Connector::Azure] {
        for trigger in [TriggerType::Scheduled, TriggerType::Manual] {
            specs.push(StreamSpec {
                name: stream_name_for(connector, trigger),
                subject: subject_for(connector, trigger),
            });
        }
    }
    specs
}

/// Message ID: a retried job gets a new ID, a replayed publish does not
pub fn message_id(job: &DescribeJob) -> String {
    format!("describe-{}-{}", job.id, job.retry_count)
}

/// Publish seam over a JetStream context
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamPublisher: Send + Sync {
    /// Publish and wait for the PubAck; returns the stream sequence
    async fn publish(
        &self,
        subject: String,
        message_id: String,
        payload: Bytes,
    ) -> Result<u64, DeliveryError>;

    /// Create any missing describe stream
    async fn declare_streams(&self) -> Result<(), DeliveryError>;
}

pub struct NatsStreamPublisher {
    context: jetstream::Context,
}

impl NatsStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

fn classify_publish_error(err: jetstream::context::PublishError) -> DeliveryError {
    match err.kind() {
        PublishErrorKind::StreamNotFound => DeliveryError::StreamNotFound(err.to_string()),
        _ => DeliveryError::Invocation(err.to_string()),
    }
}

#[async_trait]
impl StreamPublisher for NatsStreamPublisher {
    async fn publish(
        &self,
        subject: String,
        message_id: String,
        payload: Bytes,
    ) -> Result<u64, DeliveryError> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(async_nats::header::NATS_MESSAGE_ID, message_id.as_str());

        let ack = self
            .context
            .publish_with_headers(subject, headers, payload)
            .await
            .map_err(classify_publish_error)?
            .await
            .map_err(classify_publish_error)?;
        Ok(ack.sequence)
    }

    async fn declare_streams(&self) -> Result<(), DeliveryError> {
        for spec in describe_streams() {
            self.context
                .get_or_create_stream(stream::Config {
                    name: spec.name.clone(),
                    subjects: vec![spec.subject.clone()],
                    retention: stream::RetentionPolicy::WorkQueue,
                    duplicate_window: DUPLICATE_WINDOW,
                    ..Default::default()
                })
                .await
                .map_err(|e| DeliveryError::Invocation(format!("stream {}: {e}", spec.name)))?;
        }
        info!(streams = describe_streams().len(), "Describe streams declared");
        Ok(())
    }
}

pub struct JetStreamDelivery {
    publisher: Arc<dyn StreamPublisher>,
}

impl JetStreamDelivery {
    pub fn new(publisher: Arc<dyn StreamPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl DescribeDelivery for JetStreamDelivery {
    fn name(&self) -> &'static str {
        "jetstream"
    }

    async fn deliver(
        &self,
        job: &DescribeJob,
        payload: &DescribeWorkerPayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let subject = subject_for(job.connector, job.trigger_type);
        let id = message_id(job);
        let body = Bytes::from(
            serde_json::to_vec(payload)
                .map_err(|e| DeliveryError::Invocation(format!("payload encoding: {e}")))?,
        );

        let sequence = match self
            .publisher
            .publish(subject.clone(), id.clone(), body.clone())
            .await
        {
            Err(DeliveryError::StreamNotFound(reason)) => {
                warn!(job_id = job.id, subject = %subject, reason = %reason, "Stream missing, re-declaring");
                self.publisher.declare_streams().await?;
                self.publisher.publish(subject.clone(), id, body).await?
            }
            other => other?,
        };

        debug!(job_id = job.id, subject = %subject, sequence, "Payload published");
        Ok(DeliveryReceipt {
            sequence: Some(sequence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{job, payload};

    #[test]
    fn test_subject_and_stream_names() {
        assert_eq!(
            subject_for(Connector::Aws, TriggerType::Scheduled),
            "describe.aws.scheduled"
        );
        assert_eq!(
            subject_for(Connector::Azure, TriggerType::CostFullDiscovery),
            "describe.azure.manual"
        );
        assert_eq!(
            stream_name_for(Connector::Aws, TriggerType::InitialDiscovery),
            "DESCRIBE_AWS_SCHEDULED"
        );
        assert_eq!(describe_streams().len(), 4);
    }

    #[test]
    fn test_message_id_changes_with_retry() {
        let mut job = job();
        let first = message_id(&job);
        job.retry_count += 1;
        assert_eq!(first, "describe-7-0");
        assert_eq!(message_id(&job), "describe-7-1");
    }

    #[tokio::test]
    async fn test_publish_returns_sequence() {
        let mut publisher = MockStreamPublisher::new();
        publisher
            .expect_publish()
            .withf(|subject, id, _| subject == "describe.azure.scheduled" && id == "describe-7-0")
            .times(1)
            .returning(|_, _, _| Ok(41));
        publisher.expect_declare_streams().never();

        let job = job();
        let receipt = JetStreamDelivery::new(Arc::new(publisher))
            .deliver(&job, &payload(&job))
            .await
            .unwrap();
        assert_eq!(receipt.sequence, Some(41));
    }

    #[tokio::test]
    async fn test_stream_not_found_redeclares_and_retries_once() {
        let mut publisher = MockStreamPublisher::new();
        let mut seq = mockall::Sequence::new();
        publisher
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(DeliveryError::StreamNotFound("no responders".to_string())));
        publisher
            .expect_declare_streams()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        publisher
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(3));

        let job = job();
        let receipt = JetStreamDelivery::new(Arc::new(publisher))
            .deliver(&job, &payload(&job))
            .await
            .unwrap();
        assert_eq!(receipt.sequence, Some(3));
    }

    #[tokio::test]
    async fn test_second_stream_not_found_is_returned() {
        let mut publisher = MockStreamPublisher::new();
        publisher
            .expect_publish()
            .times(2)
            .returning(|_, _, _| Err(DeliveryError::StreamNotFound("gone".to_string())));
        publisher.expect_declare_streams().times(1).returning(|| Ok(()));

        let job = job();
        let err = JetStreamDelivery::new(Arc::new(publisher))
            .deliver(&job, &payload(&job))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "InvocationError");
    }
}
