//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP. Workers post their status reports here; operators
//! use it for job lookup and manual triggers.

use crate::handler::RpcHandler;
use crate::types::{JobRequest, TriggerRequest};
use describer_core::domain::DescribeJobResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "0.0.0.0";
const DEFAULT_RPC_PORT: u16 = 6251;

pub const METHOD_RESULT: &str = "describe.result.v1";
pub const METHOD_JOB: &str = "describe.job.v1";
pub const METHOD_TRIGGER: &str = "describe.trigger.v1";

/// RPC Server Configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Start the JSON-RPC server; returns the bound address and its handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_RESULT, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DescribeJobResult = params.parse()?;
                    handler.result(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_JOB, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: JobRequest = params.parse()?;
                    handler.job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method(METHOD_TRIGGER, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TriggerRequest = params.parse()?;
                    handler.trigger(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
