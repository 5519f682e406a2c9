use crate::crds::{
    InstallPlanApproval, OperatorGroup, OperatorGroupSpec, OperatorHubSpec, Subscription,
    SubscriptionSpec,
};
use std::collections::BTreeMap;

use super::{labels, object_meta};

/// Namespace the default catalog sources live in
pub const MARKETPLACE_NAMESPACE: &str = "openshift-marketplace";

/// Catalog an operator package is installed from
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogSource {
    Certified,
    Community,
    RedHat,
    /// A catalog outside the default marketplace. Installs with the package's
    /// default approval strategy
    Custom { name: String, namespace: String },
}

impl CatalogSource {
    pub fn name(&self) -> &str {
        match self {
            CatalogSource::Certified => "certified-operators",
            CatalogSource::Community => "community-operators",
            CatalogSource::RedHat => "redhat-operators",
            CatalogSource::Custom { name, .. } => name,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            CatalogSource::Custom { namespace, .. } => namespace,
            _ => MARKETPLACE_NAMESPACE,
        }
    }

    fn approval(&self) -> Option<InstallPlanApproval> {
        match self {
            CatalogSource::Custom { .. } => None,
            _ => Some(InstallPlanApproval::Manual),
        }
    }
}

/// Subscription to `package` on the channel and starting version from the
/// Workshop. An empty version installs whatever the channel advertises.
/// Subscriptions are never owned by the Workshop.
pub fn subscription(
    name: &str,
    namespace: &str,
    module: &str,
    package: &str,
    hub: &OperatorHubSpec,
    catalog: CatalogSource,
) -> Subscription {
    let mut labels = labels::module_labels(module);
    labels.insert(labels::CATALOG_SOURCE.to_string(), catalog.name().to_string());

    Subscription {
        metadata: object_meta(name, Some(namespace), labels, None),
        spec: SubscriptionSpec {
            channel: if hub.channel.is_empty() {
                None
            } else {
                Some(hub.channel.clone())
            },
            install_plan_approval: catalog.approval(),
            name: package.to_string(),
            source: catalog.name().to_string(),
            source_namespace: catalog.namespace().to_string(),
            starting_csv: if hub.cluster_service_version.is_empty() {
                None
            } else {
                Some(hub.cluster_service_version.clone())
            },
        },
        status: None,
    }
}

/// Operator group watching the given namespaces, or every namespace when empty
pub fn operator_group(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    target_namespaces: &[&str],
) -> OperatorGroup {
    OperatorGroup {
        metadata: object_meta(name, Some(namespace), labels, None),
        spec: OperatorGroupSpec {
            target_namespaces: if target_namespaces.is_empty() {
                None
            } else {
                Some(target_namespaces.iter().map(|s| s.to_string()).collect())
            },
        },
    }
}
