use crate::error::Result;
use k8s_openapi::{
    api::core::v1::PersistentVolumeClaim, apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use std::collections::BTreeMap;

use super::object_meta;

/// ReadWriteOnce claim of the given size
pub fn claim(
    name: &str,
    namespace: Option<&str>,
    labels: BTreeMap<String, String>,
    size: &str,
    owner: Option<&OwnerReference>,
) -> Result<PersistentVolumeClaim> {
    // the resources type of the claim spec differs between API versions, the
    // JSON shape does not
    let mut claim: PersistentVolumeClaim = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "spec": {
            "accessModes": ["ReadWriteOnce"],
            "resources": {"requests": {"storage": size}}
        }
    }))?;
    claim.metadata = object_meta(name, namespace, labels, owner);
    Ok(claim)
}
