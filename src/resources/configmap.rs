use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::OwnerReference};
use std::collections::BTreeMap;

use super::object_meta;

pub fn build(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(name, Some(namespace), labels, owner),
        data: Some(data),
        ..Default::default()
    }
}
