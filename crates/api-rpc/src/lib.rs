//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for the describe job scheduler: worker result
//! callbacks, job lookup and manual triggers.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
