use k8s_openapi::apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// OpenShift Route exposing a service on the cluster's wildcard domain
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub to: RouteTargetReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub termination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}

/// OpenShift SecurityContextConstraints. Only `users` is interpreted; every other
/// field observed on the server is carried through untouched on update.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SecurityContextConstraints {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl SecurityContextConstraints {
    pub fn new(name: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            "apiVersion".to_string(),
            Value::String(<Self as k8s_openapi::Resource>::API_VERSION.to_string()),
        );
        fields.insert(
            "kind".to_string(),
            Value::String(<Self as k8s_openapi::Resource>::KIND.to_string()),
        );
        Self {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            users: Some(vec![]),
            fields,
        }
    }
}

impl k8s_openapi::Resource for SecurityContextConstraints {
    const API_VERSION: &'static str = "security.openshift.io/v1";
    const GROUP: &'static str = "security.openshift.io";
    const KIND: &'static str = "SecurityContextConstraints";
    const VERSION: &'static str = "v1";
    const URL_PATH_SEGMENT: &'static str = "securitycontextconstraints";
    type Scope = k8s_openapi::ClusterResourceScope;
}

impl k8s_openapi::Metadata for SecurityContextConstraints {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Cluster ingress configuration, read for the apps wildcard domain
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Ingress",
    root = "IngressConfig",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfigSpec {
    #[serde(default)]
    pub domain: String,
}

/// Cluster console configuration, read for the public console URL
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Console",
    root = "ConsoleConfig",
    status = "ConsoleConfigStatus",
    schema = "disabled"
)]
pub struct ConsoleConfigSpec {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ConsoleConfigStatus {
    #[serde(rename = "consoleURL", default)]
    pub console_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    #[test]
    fn test_scc_preserves_unknown_fields() {
        let scc: SecurityContextConstraints = serde_json::from_value(serde_json::json!({
            "apiVersion": "security.openshift.io/v1",
            "kind": "SecurityContextConstraints",
            "metadata": {"name": "privileged"},
            "allowPrivilegedContainer": true,
            "users": ["system:admin"]
        }))
        .unwrap();

        assert_eq!(scc.users.as_deref(), Some(&["system:admin".to_string()][..]));

        let value = serde_json::to_value(&scc).unwrap();
        assert_eq!(value["allowPrivilegedContainer"], true);
        assert_eq!(value["kind"], "SecurityContextConstraints");
    }

    #[test]
    fn test_scc_accepts_null_users() {
        let scc: SecurityContextConstraints = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "anyuid"},
            "users": null
        }))
        .unwrap();
        assert!(scc.users.is_none());
    }

    #[test]
    fn test_cluster_config_singletons() {
        assert_eq!(IngressConfig::kind(&()), "Ingress");
        assert_eq!(IngressConfig::plural(&()), "ingresses");
        assert_eq!(ConsoleConfig::api_version(&()), "config.openshift.io/v1");

        let console: ConsoleConfig = serde_json::from_value(serde_json::json!({
            "apiVersion": "config.openshift.io/v1",
            "kind": "Console",
            "metadata": {"name": "cluster"},
            "spec": {},
            "status": {"consoleURL": "https://console.apps.cluster.example.com"}
        }))
        .unwrap();
        assert_eq!(
            console.status.map(|s| s.console_url).as_deref(),
            Some("https://console.apps.cluster.example.com")
        );
    }
}
