// Connection Domain Model
// A tenant's registered cloud account/subscription, as reported by the
// onboarding service. The engine only reads connections.

use crate::domain::job::Connector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    NotOnboard,
    InitialDiscovery,
    Onboard,
    Disabled,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Initial,
}

/// AWS organization membership of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMembership {
    pub organization_id: String,
    pub is_manager: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub account_id: String,
    pub connector: Connector,
    pub lifecycle_state: LifecycleState,
    pub health_state: HealthState,
    #[serde(default)]
    pub credential_cipher_text: String,
    /// Azure AD tenant (or AWS payer) the connection belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub organization: Option<OrganizationMembership>,
    /// None means every catalog type of the connector is supported
    #[serde(default)]
    pub supported_resource_types: Option<BTreeSet<String>>,
}

impl Connection {
    /// Onboarded, or onboarding with its first discovery pending
    pub fn is_enabled(&self) -> bool {
        matches!(
            self.lifecycle_state,
            LifecycleState::Onboard | LifecycleState::InitialDiscovery
        )
    }

    pub fn is_healthy(&self) -> bool {
        self.health_state == HealthState::Healthy
    }

    pub fn is_organization_manager(&self) -> bool {
        self.organization.as_ref().is_some_and(|org| org.is_manager)
    }

    pub fn is_organization_member(&self) -> bool {
        self.organization.as_ref().is_some_and(|org| !org.is_manager)
    }

    pub fn supports(&self, resource_type: &str) -> bool {
        self.supported_resource_types
            .as_ref()
            .map_or(true, |types| types.contains(resource_type))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_initial_discovery_counts_as_enabled() {
        let mut conn = aws_connection("c1");
        conn.lifecycle_state = LifecycleState::InitialDiscovery;
        assert!(conn.is_enabled());

        conn.lifecycle_state = LifecycleState::Disabled;
        assert!(!conn.is_enabled());
    }

    #[test]
    fn test_organization_roles() {
        let mut conn = aws_connection("c1");
        assert!(!conn.is_organization_manager());
        assert!(!conn.is_organization_member());

        conn.organization = Some(OrganizationMembership {
            organization_id: "o-1".to_string(),
            is_manager: false,
        });
        assert!(conn.is_organization_member());
    }

    #[test]
    fn test_supports_defaults_to_all() {
        let mut conn = aws_connection("c1");
        assert!(conn.supports("AWS::EC2::Instance"));

        conn.supported_resource_types = Some(BTreeSet::from(["AWS::S3::Bucket".to_string()]));
        assert!(!conn.supports("AWS::EC2::Instance"));
        assert!(conn.supports("AWS::S3::Bucket"));
    }

    #[test]
    fn test_deserialize_provider_json() {
        let json = r#"{
            "id": "c9",
            "accountId": "123456789012",
            "connector": "aws",
            "lifecycleState": "ONBOARD",
            "healthState": "healthy"
        }"#;
        let conn: Connection = serde_json::from_str(json).unwrap();
        assert_eq!(conn.connector, Connector::Aws);
        assert!(conn.is_enabled() && conn.is_healthy());
        assert!(conn.organization.is_none());
    }
}
