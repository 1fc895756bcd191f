// Message bus delivery: one queue per connector, REST sender links

use async_trait::async_trait;
use bytes::Bytes;
use describer_core::domain::{Connector, DescribeJob, DescribeWorkerPayload};
use describer_core::port::{DeliveryError, DeliveryReceipt, DescribeDelivery};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::serverless::classify_status;

/// Open sender link on a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderHandle {
    pub queue: String,
    pub link_id: String,
}

/// Broker operations the delivery backend needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn open_sender(&self, queue: &str) -> Result<SenderHandle, DeliveryError>;

    async fn send(&self, sender: &SenderHandle, body: Bytes) -> Result<(), DeliveryError>;

    async fn close(&self, sender: SenderHandle) -> Result<(), DeliveryError>;
}

/// Broker reached over its REST endpoint with a shared-access token
pub struct RestBrokerClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSenderResponse {
    link_id: String,
}

impl RestBrokerClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Invocation(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn authorization(&self) -> String {
        format!("SharedAccessSignature {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DeliveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

fn transport_error(e: reqwest::Error) -> DeliveryError {
    DeliveryError::Invocation(e.to_string())
}

#[async_trait]
impl BrokerClient for RestBrokerClient {
    async fn open_sender(&self, queue: &str) -> Result<SenderHandle, DeliveryError> {
        let response = self
            .client
            .post(format!("{}/{}/senders", self.base_url, queue))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(transport_error)?;
        let opened: OpenSenderResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(SenderHandle {
            queue: queue.to_string(),
            link_id: opened.link_id,
        })
    }

    async fn send(&self, sender: &SenderHandle, body: Bytes) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(format!(
                "{}/{}/senders/{}/messages",
                self.base_url, sender.queue, sender.link_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await.map(|_| ())
    }

    async fn close(&self, sender: SenderHandle) -> Result<(), DeliveryError> {
        let response = self
            .client
            .delete(format!(
                "{}/{}/senders/{}",
                self.base_url, sender.queue, sender.link_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await.map(|_| ())
    }
}

pub struct MessageBusDelivery {
    broker: Arc<dyn BrokerClient>,
    queues: HashMap<Connector, String>,
}

impl MessageBusDelivery {
    pub fn new(broker: Arc<dyn BrokerClient>, queues: HashMap<Connector, String>) -> Self {
        Self { broker, queues }
    }
}

#[async_trait]
impl DescribeDelivery for MessageBusDelivery {
    fn name(&self) -> &'static str {
        "message_bus"
    }

    async fn deliver(
        &self,
        job: &DescribeJob,
        payload: &DescribeWorkerPayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let queue = self.queues.get(&job.connector).ok_or_else(|| {
            DeliveryError::Invocation(format!("no queue configured for {}", job.connector))
        })?;
        let body = serde_json::to_vec(payload)
            .map_err(|e| DeliveryError::Invocation(format!("payload encoding: {e}")))?;

        let sender = self.broker.open_sender(queue).await?;
        let sent = self.broker.send(&sender, Bytes::from(body)).await;
        if let Err(e) = self.broker.close(sender).await {
            warn!(job_id = job.id, queue = %queue, error = %e, "Failed to close sender");
        }
        sent?;

        debug!(job_id = job.id, queue = %queue, "Payload sent to queue");
        Ok(DeliveryReceipt::default())
    }
}
