use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// ServiceMeshControlPlane configures the Istio control plane in `istio-system`
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "maistra.io",
    version = "v2",
    kind = "ServiceMeshControlPlane",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshControlPlaneSpec {
    pub version: String,
    #[serde(default)]
    pub tracing: Value,
    #[serde(default)]
    pub addons: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// ServiceMeshMemberRoll lists the namespaces that belong to the mesh
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "maistra.io",
    version = "v1",
    kind = "ServiceMeshMemberRoll",
    namespaced,
    schema = "disabled"
)]
pub struct ServiceMeshMemberRollSpec {
    #[serde(default)]
    pub members: Vec<String>,
}
