use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// CheCluster drives the CodeReady Workspaces server, its identity provider and
/// its plugin registry
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "org.eclipse.che",
    version = "v1",
    kind = "CheCluster",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct CheClusterSpec {
    #[serde(default)]
    pub server: CheServerSpec,
    #[serde(default)]
    pub database: CheDatabaseSpec,
    #[serde(default)]
    pub auth: CheAuthSpec,
    #[serde(default)]
    pub storage: CheStorageSpec,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheServerSpec {
    #[serde(default)]
    pub che_flavor: String,
    #[serde(default)]
    pub tls_support: bool,
    #[serde(default)]
    pub self_signed_cert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_registry_image: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_che_properties: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheDatabaseSpec {
    #[serde(default)]
    pub external_db: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheAuthSpec {
    #[serde(default)]
    pub open_shift_oauth: bool,
    #[serde(default)]
    pub external_identity_provider: bool,
    #[serde(default)]
    pub identity_provider_password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheStorageSpec {
    #[serde(default)]
    pub pvc_strategy: String,
    #[serde(default)]
    pub pvc_claim_size: String,
}
