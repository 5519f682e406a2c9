use k8s_openapi::{
    api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::OwnerReference, ByteString,
};
use std::collections::BTreeMap;

use super::object_meta;

/// Opaque secret holding the given string values as bytes
pub fn opaque(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
) -> Secret {
    Secret {
        metadata: object_meta(name, Some(namespace), labels, owner),
        type_: Some("Opaque".to_string()),
        data: Some(to_bytes(data)),
        ..Default::default()
    }
}

pub fn to_bytes(data: BTreeMap<String, String>) -> BTreeMap<String, ByteString> {
    data.into_iter()
        .map(|(k, v)| (k, ByteString(v.into_bytes())))
        .collect()
}

/// Read a key of a secret as UTF-8
pub fn value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|b| String::from_utf8(b.0.clone()).ok())
}
