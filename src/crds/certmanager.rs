use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// CertManager instance managed by the certified cert-manager operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "operator.cert-manager.io",
    version = "v1alpha1",
    kind = "CertManager",
    namespaced,
    schema = "disabled"
)]
pub struct CertManagerSpec {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}
