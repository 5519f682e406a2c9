use crate::crds::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
use k8s_openapi::apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString};
use std::collections::BTreeMap;

use super::object_meta;

/// Route to a service port. The host is left to the router unless given
pub fn build(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    service: &str,
    target_port: IntOrString,
    tls: Option<TlsConfig>,
    owner: Option<&OwnerReference>,
) -> Route {
    Route {
        metadata: object_meta(name, Some(namespace), labels, owner),
        spec: RouteSpec {
            host: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: service.to_string(),
                weight: Some(100),
            },
            port: Some(RoutePort { target_port }),
            tls,
        },
    }
}

/// Edge termination, redirecting plain HTTP to HTTPS
pub fn edge_tls() -> TlsConfig {
    TlsConfig {
        termination: "edge".to_string(),
        insecure_edge_termination_policy: Some("Redirect".to_string()),
    }
}

/// Host the router assigns to a route on the apps wildcard domain
pub fn default_host(name: &str, namespace: &str, apps_hostname_suffix: &str) -> String {
    format!("{}-{}.{}", name, namespace, apps_hostname_suffix)
}
