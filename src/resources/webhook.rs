use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use std::collections::BTreeMap;

use super::object_meta;

/// Mutating webhook calling `path` on the given service for pod creation.
/// Webhook configurations are cluster scoped and carry no owner reference
pub fn pod_mutating(
    name: &str,
    labels: BTreeMap<String, String>,
    webhook_name: &str,
    service: &str,
    namespace: &str,
    path: &str,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: object_meta(name, None, labels, None),
        webhooks: Some(vec![MutatingWebhook {
            name: webhook_name.to_string(),
            admission_review_versions: vec!["v1".to_string(), "v1beta1".to_string()],
            side_effects: "None".to_string(),
            failure_policy: Some("Ignore".to_string()),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: service.to_string(),
                    namespace: namespace.to_string(),
                    path: Some(path.to_string()),
                    port: Some(443),
                }),
                ..Default::default()
            },
            rules: Some(vec![RuleWithOperations {
                api_groups: Some(vec!["".to_string()]),
                api_versions: Some(vec!["v1".to_string()]),
                operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                resources: Some(vec!["pods".to_string()]),
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}
