use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Group served by the ansible-style Gitea and Nexus operators
pub const GROUP: &str = "gpte.opentlc.com";

/// Gitea server managed by the Gitea operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "gpte.opentlc.com",
    version = "v1alpha1",
    kind = "Gitea",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct GiteaSpec {
    pub gitea_volume_size: String,
    pub gitea_ssl: bool,
    pub postgresql_volume_size: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Nexus repository manager managed by the Nexus operator
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "gpte.opentlc.com",
    version = "v1alpha1",
    kind = "Nexus",
    plural = "nexus",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct NexusSpec {
    pub nexus_volume_size: String,
    pub nexus_ssl: bool,
    pub nexus_image_tag: String,
    pub nexus_cpu_request: String,
    pub nexus_cpu_limit: String,
    pub nexus_memory_request: String,
    pub nexus_memory_limit: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
