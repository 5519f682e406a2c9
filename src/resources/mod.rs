//! Pure constructors for the cluster objects the modules manage, plus the few
//! object-specific write helpers (tracked deployment updates, SCC set-append).

use crate::crds::Workshop;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

pub mod configmap;
pub mod crd;
pub mod deployment;
pub mod labels;
pub mod namespace;
pub mod olm;
pub mod rbac;
pub mod route;
pub mod scc;
pub mod secret;
pub mod service;
pub mod statefulset;
pub mod storage;
pub mod webhook;

/// Metadata with exactly the given name, namespace, labels and owner
pub fn object_meta(
    name: &str,
    namespace: Option<&str>,
    labels: BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        labels: Some(labels),
        owner_references: owner.map(|o| vec![o.clone()]),
        ..Default::default()
    }
}

/// Owner reference to the Workshop for objects living in the Workshop's own
/// namespace. Owner references cannot cross namespaces, so everything else is
/// removed by the module delete paths instead of garbage collection.
pub fn owner_for(workshop: &Workshop, namespace: &str) -> Option<OwnerReference> {
    if workshop.namespace().as_deref() == Some(namespace) {
        workshop.controller_owner_ref(&())
    } else {
        None
    }
}
