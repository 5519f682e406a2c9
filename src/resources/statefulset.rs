use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::PersistentVolumeClaim,
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
};
use std::collections::BTreeMap;

use super::{deployment::PodParams, object_meta};

#[allow(clippy::too_many_arguments)]
pub fn build(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
    service_name: &str,
    pod: PodParams,
    claims: Vec<PersistentVolumeClaim>,
    owner: Option<&OwnerReference>,
) -> StatefulSet {
    let mut pod_labels = labels.clone();
    pod_labels.extend(selector.clone());

    StatefulSet {
        metadata: object_meta(name, Some(namespace), labels, owner),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: Some(service_name.to_string()),
            pod_management_policy: Some("Parallel".to_string()),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: pod.template(pod_labels),
            volume_claim_templates: if claims.is_empty() {
                None
            } else {
                Some(claims)
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
