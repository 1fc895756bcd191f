// Serverless function invocation over HTTP

use async_trait::async_trait;
use describer_core::domain::{Connector, DescribeJob, DescribeWorkerPayload};
use describer_core::port::{DeliveryError, DeliveryReceipt, DescribeDelivery};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Header asking the platform to queue the invocation and return at once
pub const INVOCATION_TYPE_HEADER: &str = "X-Amz-Invocation-Type";
const INVOCATION_TYPE_EVENT: &str = "Event";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Asynchronous invoke of one describer function per connector
pub struct ServerlessInvoker {
    client: reqwest::Client,
    function_urls: HashMap<Connector, String>,
}

impl ServerlessInvoker {
    pub fn new(function_urls: HashMap<Connector, String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Invocation(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            function_urls,
        })
    }

    fn url_for(&self, connector: Connector) -> Result<&str, DeliveryError> {
        self.function_urls
            .get(&connector)
            .map(String::as_str)
            .ok_or_else(|| {
                DeliveryError::Invocation(format!("no function configured for {connector}"))
            })
    }
}

/// Map a non-success invoke status onto a delivery error
pub(crate) fn classify_status(status: StatusCode, body: &str) -> DeliveryError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        DeliveryError::Throttled(format!("{status}: {body}"))
    } else {
        DeliveryError::Invocation(format!("{status}: {body}"))
    }
}

#[async_trait]
impl DescribeDelivery for ServerlessInvoker {
    fn name(&self) -> &'static str {
        "serverless"
    }

    async fn deliver(
        &self,
        job: &DescribeJob,
        payload: &DescribeWorkerPayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let url = self.url_for(job.connector)?;

        let response = self
            .client
            .post(url)
            .header(INVOCATION_TYPE_HEADER, INVOCATION_TYPE_EVENT)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Invocation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        debug!(job_id = job.id, status = status.as_u16(), "Function invoked");
        Ok(DeliveryReceipt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_throttled() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "rate exceeded");
        assert_eq!(err.error_code(), "Throttled");
    }

    #[test]
    fn test_other_failures_are_invocation_errors() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::INTERNAL_SERVER_ERROR] {
            let err = classify_status(status, "");
            assert!(matches!(err, DeliveryError::Invocation(_)));
            assert_eq!(err.error_code(), "InvocationError");
        }
    }

    #[test]
    fn test_missing_function_url() {
        let invoker = ServerlessInvoker::new(HashMap::from([(
            Connector::Aws,
            "http://localhost:9000/aws".to_string(),
        )]))
        .unwrap();

        assert_eq!(invoker.url_for(Connector::Aws).unwrap(), "http://localhost:9000/aws");
        assert!(invoker.url_for(Connector::Azure).is_err());
    }
}
