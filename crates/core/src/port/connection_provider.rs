// Connection Provider Port (Interface)
// Read-only view of the onboarding service's connections.

use crate::domain::Connection;
use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn list_connections(&self) -> Result<Vec<Connection>>;

    async fn get_connection(&self, id: &str) -> Result<Option<Connection>>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Fixed set of connections; lookups of listed IDs can be made to fail
    #[derive(Default)]
    pub struct StaticConnectionProvider {
        connections: Mutex<Vec<Connection>>,
        failing_ids: Mutex<Vec<String>>,
        lookups: Mutex<usize>,
    }

    impl StaticConnectionProvider {
        pub fn new(connections: Vec<Connection>) -> Self {
            Self {
                connections: Mutex::new(connections),
                ..Default::default()
            }
        }

        pub fn fail_lookup(&self, id: &str) {
            self.failing_ids.lock().unwrap().push(id.to_string());
        }

        pub fn lookup_count(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl ConnectionProvider for StaticConnectionProvider {
        async fn list_connections(&self) -> Result<Vec<Connection>> {
            Ok(self.connections.lock().unwrap().clone())
        }

        async fn get_connection(&self, id: &str) -> Result<Option<Connection>> {
            *self.lookups.lock().unwrap() += 1;
            if self.failing_ids.lock().unwrap().iter().any(|f| f == id) {
                return Err(crate::AppError::Transport(format!(
                    "connection lookup failed: {id}"
                )));
            }
            let connections = self.connections.lock().unwrap();
            Ok(connections.iter().find(|c| c.id == id).cloned())
        }
    }
}
