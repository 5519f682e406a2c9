use k8s_openapi::api::core::v1::Namespace;
use std::collections::BTreeMap;

use super::object_meta;

/// Namespaces are cluster scoped and never carry an owner reference
pub fn build(name: &str, labels: BTreeMap<String, String>) -> Namespace {
    Namespace {
        metadata: object_meta(name, None, labels, None),
        ..Default::default()
    }
}
