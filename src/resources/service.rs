use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString},
};
use std::collections::BTreeMap;

use super::object_meta;

pub fn build(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
    ports: Vec<ServicePort>,
    owner: Option<&OwnerReference>,
) -> Service {
    Service {
        metadata: object_meta(name, Some(namespace), labels, owner),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Headless service, used for stable stateful set pod identities
pub fn headless(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
    ports: Vec<ServicePort>,
    owner: Option<&OwnerReference>,
) -> Service {
    let mut service = build(name, namespace, labels, selector, ports, owner);
    if let Some(spec) = service.spec.as_mut() {
        spec.cluster_ip = Some("None".to_string());
        spec.publish_not_ready_addresses = Some(true);
    }
    service
}

pub fn port(name: &str, port: i32, target_port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(target_port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}
