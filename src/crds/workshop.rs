use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::date_time::DateTime;

/// Workshop declares a multi-user workshop environment: how many learner accounts
/// to provision and which infrastructure modules to install for them
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "workshop.openshiftlabs.io",
    version = "v1",
    kind = "Workshop",
    plural = "workshops",
    singular = "workshop",
    shortname = "ws",
    namespaced,
    status = "WorkshopStatus",
    printcolumn = r#"{"name":"Users", "type":"integer", "jsonPath":".spec.userCount"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopSpec {
    /// Number of learner accounts, named user1..userN
    #[schemars(range(min = 1))]
    pub user_count: u32,

    /// Initial password shared by every learner account
    #[serde(default)]
    pub user_password: String,

    #[serde(default)]
    pub source: SourceSpec,

    #[serde(default)]
    pub infrastructure: InfrastructureSpec,
}

/// Location of the repository holding the workshop devfile
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct SourceSpec {
    #[serde(rename = "gitURL", default)]
    pub git_url: String,
    #[serde(rename = "gitBranch", default)]
    pub git_branch: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    #[serde(default)]
    pub user: UserSpec,
    #[serde(default)]
    pub project: ProjectSpec,
    #[serde(default)]
    pub portal: PortalSpec,
    #[serde(default)]
    pub bookbag: BookbagSpec,
    #[serde(default)]
    pub cert_manager: OperatorProductSpec,
    #[serde(default)]
    pub pipeline: OperatorProductSpec,
    #[serde(default)]
    pub gitea: GiteaSpec,
    #[serde(default)]
    pub nexus: NexusSpec,
    #[serde(default)]
    pub git_ops: OperatorProductSpec,
    #[serde(default)]
    pub vault: VaultSpec,
    #[serde(default)]
    pub service_mesh: ServiceMeshSpec,
    #[serde(default)]
    pub serverless: OperatorProductSpec,
    #[serde(default)]
    pub istio_workspace: OperatorProductSpec,
    #[serde(default)]
    pub code_ready_workspace: CodeReadyWorkspaceSpec,
}

/// Channel and version to install from OperatorHub
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorHubSpec {
    #[serde(default)]
    pub channel: String,
    /// An empty version installs whatever the channel advertises
    #[serde(default)]
    pub cluster_service_version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ImageSpec {
    pub name: String,
    pub tag: String,
}

impl ImageSpec {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorProductSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub operator_hub: OperatorHubSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct UserSpec {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Prefix of the per-user staging projects, suffixed with the user index
    #[serde(default)]
    pub staging_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortalSpec {
    #[serde(default)]
    pub enabled: bool,
    pub image: Option<ImageSpec>,
    pub redis_image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct BookbagSpec {
    #[serde(default)]
    pub enabled: bool,
    pub image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct GiteaSpec {
    #[serde(default)]
    pub enabled: bool,
    pub image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
pub struct NexusSpec {
    #[serde(default)]
    pub enabled: bool,
    pub image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultSpec {
    #[serde(default)]
    pub enabled: bool,
    pub image: Option<ImageSpec>,
    pub agent_injector_image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub service_mesh_operator_hub: OperatorHubSpec,
    #[serde(default)]
    pub elastic_search_operator_hub: OperatorHubSpec,
    #[serde(default)]
    pub jaeger_operator_hub: OperatorHubSpec,
    #[serde(default)]
    pub kiali_operator_hub: OperatorHubSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeReadyWorkspaceSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub operator_hub: OperatorHubSpec,
    /// Authenticate learners through the OpenShift OAuth server instead of Keycloak
    #[serde(rename = "openshiftOAuth", default)]
    pub openshift_oauth: bool,
    pub plugin_registry_image: Option<ImageSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopStatus {
    /// One condition per module, typed by the module name
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Last observed generation
    pub observed_generation: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: ConditionStatus,
    pub last_transition_time: Option<DateTime>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl WorkshopStatus {
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }

    /// Replaces the condition of the same type, keeping the transition time when
    /// the status did not change
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            Some(existing) => {
                let transition = if existing.status == condition.status {
                    existing.last_transition_time.clone()
                } else {
                    condition.last_transition_time.clone()
                };
                *existing = Condition {
                    last_transition_time: transition,
                    ..condition
                };
            }
            None => self.conditions.push(condition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_workshop() {
        let spec: WorkshopSpec = serde_json::from_value(serde_json::json!({
            "userCount": 2,
            "userPassword": "openshift",
            "source": {"gitURL": "https://github.com/org/repo", "gitBranch": "main"},
            "infrastructure": {
                "project": {"enabled": true, "stagingName": "staging"},
                "gitOps": {"enabled": true, "operatorHub": {"channel": "alpha"}}
            }
        }))
        .unwrap();

        assert_eq!(spec.user_count, 2);
        assert_eq!(spec.source.git_branch, "main");
        assert!(spec.infrastructure.project.enabled);
        assert_eq!(spec.infrastructure.project.staging_name, "staging");
        assert!(spec.infrastructure.git_ops.enabled);
        assert_eq!(spec.infrastructure.git_ops.operator_hub.channel, "alpha");
        assert!(spec
            .infrastructure
            .git_ops
            .operator_hub
            .cluster_service_version
            .is_empty());
        assert!(!spec.infrastructure.vault.enabled);
    }

    #[test]
    fn test_set_condition_keeps_transition_time() {
        let mut status = WorkshopStatus::default();
        let first = DateTime::now();
        status.set_condition(Condition {
            r#type: "gitops".to_string(),
            status: ConditionStatus::True,
            last_transition_time: Some(first.clone()),
            reason: Some("Reconciled".to_string()),
            message: None,
        });
        status.set_condition(Condition {
            r#type: "gitops".to_string(),
            status: ConditionStatus::True,
            last_transition_time: Some(DateTime::now()),
            reason: Some("Reconciled".to_string()),
            message: None,
        });

        assert_eq!(status.conditions.len(), 1);
        assert_eq!(
            status.conditions[0].last_transition_time.as_ref().unwrap().0,
            first.0
        );
    }
}
