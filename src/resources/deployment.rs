use crate::{
    client::{self, Applied, ObjectClient},
    error::Result,
};
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec,
            PodTemplateSpec, SecretKeySelector, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference},
};
use std::collections::BTreeMap;

use super::object_meta;

/// Pod-level inputs of a single-replica workload
#[derive(Clone, Debug, Default)]
pub struct PodParams {
    pub containers: Vec<Container>,
    pub service_account: Option<String>,
    pub volumes: Vec<Volume>,
}

impl PodParams {
    pub fn single(container: Container) -> Self {
        Self {
            containers: vec![container],
            ..Default::default()
        }
    }

    pub fn with_service_account(mut self, name: &str) -> Self {
        self.service_account = Some(name.to_string());
        self
    }

    pub fn with_volumes(mut self, volumes: Vec<Volume>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn template(&self, labels: BTreeMap<String, String>) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(kube::api::ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: self.containers.clone(),
                service_account_name: self.service_account.clone(),
                volumes: if self.volumes.is_empty() {
                    None
                } else {
                    Some(self.volumes.clone())
                },
                ..Default::default()
            }),
        }
    }
}

pub fn build(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
    pod: PodParams,
    owner: Option<&OwnerReference>,
) -> Deployment {
    let mut pod_labels = labels.clone();
    pod_labels.extend(selector.clone());

    Deployment {
        metadata: object_meta(name, Some(namespace), labels, owner),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: pod.template(pod_labels),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn container(name: &str, image: &str, env: Vec<EnvVar>, ports: &[(&str, i32)]) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: if env.is_empty() { None } else { Some(env) },
        ports: if ports.is_empty() {
            None
        } else {
            Some(
                ports
                    .iter()
                    .map(|(port_name, port)| ContainerPort {
                        name: Some(port_name.to_string()),
                        container_port: *port,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            )
        },
        ..Default::default()
    }
}

pub fn with_mounts(mut container: Container, mounts: Vec<VolumeMount>) -> Container {
    container.volume_mounts = Some(mounts);
    container
}

pub fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

pub fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Downward-API variable, e.g. `status.podIP`
pub fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// True iff the deployment reports at least one replica and all of them available
pub fn is_available(deployment: &Deployment) -> bool {
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };
    let wanted = status.replicas.unwrap_or(0);
    let available = status.available_replicas.unwrap_or(0);
    wanted > 0 && available >= wanted
}

/// Create the deployment, or restore the tracked attributes (container image and
/// env vars, matched by container name) on the live object.
pub async fn apply_tracked<C: ObjectClient>(client: &C, desired: &Deployment) -> Result<Applied> {
    client::ensure_tracked(client, desired, restore_tracked).await
}

fn containers_mut(deployment: &mut Deployment) -> Option<&mut Vec<Container>> {
    deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .map(|p| &mut p.containers)
}

fn containers(deployment: &Deployment) -> &[Container] {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default()
}

/// Copy desired image and env onto the live containers. Returns whether anything changed
pub fn restore_tracked(live: &mut Deployment, desired: &Deployment) -> bool {
    let wanted = containers(desired).to_vec();
    let Some(live_containers) = containers_mut(live) else {
        return false;
    };

    let mut changed = false;
    for want in wanted {
        if let Some(have) = live_containers.iter_mut().find(|c| c.name == want.name) {
            if have.image != want.image {
                have.image = want.image.clone();
                changed = true;
            }
            if have.env != want.env {
                have.env = want.env.clone();
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::memory::MemoryClient, resources::labels};
    use k8s_openapi::api::apps::v1::DeploymentStatus;

    fn desired(image: &str, value: &str) -> Deployment {
        build(
            "user1-bookbag",
            "workshop-guides",
            labels::module_labels("bookbag"),
            labels::selector_labels("user1-bookbag"),
            PodParams::single(container(
                "bookbag",
                image,
                vec![env("CONSOLE_URL", value)],
                &[("http", 10080)],
            )),
            None,
        )
    }

    #[test]
    fn test_is_available() {
        let mut d = desired("img:1", "a");
        assert!(!is_available(&d));

        d.status = Some(DeploymentStatus {
            replicas: Some(1),
            available_replicas: Some(0),
            ..Default::default()
        });
        assert!(!is_available(&d));

        d.status = Some(DeploymentStatus {
            replicas: Some(1),
            available_replicas: Some(1),
            ..Default::default()
        });
        assert!(is_available(&d));
    }

    #[test]
    fn test_selector_labels_on_pod_template() {
        let d = desired("img:1", "a");
        let spec = d.spec.unwrap();
        let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(pod_labels["app"], "user1-bookbag");
        assert_eq!(pod_labels[labels::PART_OF], "bookbag");
        assert_eq!(spec.selector.match_labels.unwrap()["app"], "user1-bookbag");
    }

    #[tokio::test]
    async fn test_apply_tracked_restores_env_only() {
        let client = MemoryClient::new();
        assert_eq!(
            apply_tracked(&client, &desired("img:1", "a")).await.unwrap(),
            Applied::Created
        );

        // out-of-band edit of the env and an unrelated field
        let mut live: Deployment = client
            .fetch("user1-bookbag", Some("workshop-guides"))
            .unwrap();
        live.spec.as_mut().unwrap().replicas = Some(3);
        live.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers[0].env =
            Some(vec![env("CONSOLE_URL", "tampered")]);
        client.insert(&live);

        assert_eq!(
            apply_tracked(&client, &desired("img:1", "a")).await.unwrap(),
            Applied::Updated
        );
        let live: Deployment = client
            .fetch("user1-bookbag", Some("workshop-guides"))
            .unwrap();
        let spec = live.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(
            spec.template.spec.unwrap().containers[0].env,
            Some(vec![env("CONSOLE_URL", "a")])
        );

        assert_eq!(
            apply_tracked(&client, &desired("img:1", "a")).await.unwrap(),
            Applied::Unchanged
        );
    }
}
