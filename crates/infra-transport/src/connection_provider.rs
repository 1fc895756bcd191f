// Onboarding service client: read-only connection lookups over HTTP

use async_trait::async_trait;
use describer_core::domain::Connection;
use describer_core::error::{AppError, Result};
use describer_core::port::ConnectionProvider;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpConnectionProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpConnectionProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn connections_url(&self) -> String {
        format!("{}/api/v1/connections", self.base_url)
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    AppError::Transport(format!("onboarding service: {e}"))
}

#[async_trait]
impl ConnectionProvider for HttpConnectionProvider {
    async fn list_connections(&self) -> Result<Vec<Connection>> {
        let connections: Vec<Connection> = self
            .get(self.connections_url())
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        debug!(count = connections.len(), "Connections listed");
        Ok(connections)
    }

    async fn get_connection(&self, id: &str) -> Result<Option<Connection>> {
        let response = self
            .get(format!("{}/{}", self.connections_url(), id))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let connection = response
            .error_for_status()
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(Some(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = HttpConnectionProvider::new("http://onboard:8080/", None).unwrap();
        assert_eq!(
            provider.connections_url(),
            "http://onboard:8080/api/v1/connections"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) is closed on test hosts
        let provider = HttpConnectionProvider::new("http://127.0.0.1:9", None).unwrap();
        let result = provider.list_connections().await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
