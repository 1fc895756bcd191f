// Resource Type Metadata
// Static per-type flags that drive discovery classification and the
// canonical-connection rules of the scheduling policy.

use crate::domain::job::{Connector, DiscoveryType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeSpec {
    pub name: String,
    pub connector: Connector,
    #[serde(default)]
    pub fast_discovery: bool,
    #[serde(default)]
    pub cost_discovery: bool,
    /// Enumerated once per Azure AD tenant, not per subscription
    #[serde(default)]
    pub directory_wide: bool,
    /// Enumerated only from the AWS organization manager account
    #[serde(default)]
    pub organization_wide: bool,
}

impl ResourceTypeSpec {
    pub fn new(name: &str, connector: Connector) -> Self {
        Self {
            name: name.to_string(),
            connector,
            fast_discovery: false,
            cost_discovery: false,
            directory_wide: false,
            organization_wide: false,
        }
    }

    pub fn discovery_type(&self) -> DiscoveryType {
        if self.cost_discovery {
            DiscoveryType::Cost
        } else if self.fast_discovery {
            DiscoveryType::Fast
        } else {
            DiscoveryType::Full
        }
    }

    fn fast(mut self) -> Self {
        self.fast_discovery = true;
        self
    }

    fn cost(mut self) -> Self {
        self.cost_discovery = true;
        self
    }

    fn directory_wide(mut self) -> Self {
        self.directory_wide = true;
        self
    }

    fn organization_wide(mut self) -> Self {
        self.organization_wide = true;
        self
    }
}

/// Lookup table of known resource types, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeCatalog {
    types: BTreeMap<String, ResourceTypeSpec>,
}

impl ResourceTypeCatalog {
    pub fn new(specs: impl IntoIterator<Item = ResourceTypeSpec>) -> Self {
        Self {
            types: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Catalog shipped with the scheduler; deployments may replace it from config
    pub fn builtin() -> Self {
        use Connector::{Aws, Azure};
        Self::new([
            ResourceTypeSpec::new("AWS::EC2::Instance", Aws).fast(),
            ResourceTypeSpec::new("AWS::S3::Bucket", Aws).fast(),
            ResourceTypeSpec::new("AWS::IAM::Role", Aws),
            ResourceTypeSpec::new("AWS::RDS::DBInstance", Aws),
            ResourceTypeSpec::new("AWS::Lambda::Function", Aws),
            ResourceTypeSpec::new("AWS::CostExplorer::ByServiceDaily", Aws).cost(),
            ResourceTypeSpec::new("AWS::IdentityStore::User", Aws).organization_wide(),
            ResourceTypeSpec::new("AWS::IdentityStore::Group", Aws).organization_wide(),
            ResourceTypeSpec::new("Microsoft.Compute/virtualMachines", Azure).fast(),
            ResourceTypeSpec::new("Microsoft.Storage/storageAccounts", Azure),
            ResourceTypeSpec::new("Microsoft.CostManagement/CostByResourceType", Azure).cost(),
            ResourceTypeSpec::new("Microsoft.Resources/users", Azure).directory_wide(),
            ResourceTypeSpec::new("Microsoft.Resources/groups", Azure).directory_wide(),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ResourceTypeSpec> {
        self.types.get(name)
    }

    /// All types applicable to a connector, in name order
    pub fn for_connector(&self, connector: Connector) -> impl Iterator<Item = &ResourceTypeSpec> {
        self.types.values().filter(move |s| s.connector == connector)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
