use crate::error::Result;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::collections::BTreeMap;

use super::object_meta;

/// Namespaced CRD with a single served version, a status subresource and an
/// open schema. Used for the operators this controller deploys itself
pub fn namespaced(
    group: &str,
    version: &str,
    kind: &str,
    plural: &str,
    labels: BTreeMap<String, String>,
) -> Result<CustomResourceDefinition> {
    let name = format!("{}.{}", plural, group);
    let mut crd: CustomResourceDefinition = serde_json::from_value(serde_json::json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {},
        "spec": {
            "group": group,
            "names": {
                "kind": kind,
                "listKind": format!("{}List", kind),
                "plural": plural,
                "singular": kind.to_lowercase(),
            },
            "scope": "Namespaced",
            "versions": [{
                "name": version,
                "served": true,
                "storage": true,
                "subresources": {"status": {}},
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "x-kubernetes-preserve-unknown-fields": true
                    }
                }
            }]
        }
    }))?;
    crd.metadata = object_meta(&name, None, labels, None);
    Ok(crd)
}
