//! A development-mode Vault server and its agent injector, deployed directly
//! without an operator.

use super::Outcome;
use crate::{
    client::{self, ObjectClient},
    crds::{ImageSpec, Workshop},
    error::Result,
    reconciler::Context,
    resources::{configmap, deployment, labels, namespace, rbac, scc, service, statefulset, webhook},
};
use k8s_openapi::api::{
    admissionregistration::v1::MutatingWebhookConfiguration,
    apps::v1::{Deployment, StatefulSet},
    core::v1::{ConfigMap, ConfigMapVolumeSource, Namespace, Service, ServiceAccount, Volume, VolumeMount},
    rbac::v1::{ClusterRole, ClusterRoleBinding},
};
use std::collections::BTreeMap;

const MODULE: &str = "vault";

pub const NAMESPACE: &str = "vault";
pub const SERVER: &str = "vault";
pub const INJECTOR: &str = "vault-agent-injector";

const CONFIG: &str = "vault-config";
const INTERNAL_SERVICE: &str = "vault-internal";
const SERVER_BINDING: &str = "vault-server-binding";
const INJECTOR_SERVICE: &str = "vault-agent-injector-svc";
const INJECTOR_ROLE: &str = "vault-agent-injector-clusterrole";
const INJECTOR_BINDING: &str = "vault-agent-injector-binding";
const INJECTOR_WEBHOOK: &str = "vault-agent-injector-cfg";

const API_PORT: i32 = 8200;
const CLUSTER_PORT: i32 = 8201;
const INJECTOR_PORT: i32 = 8080;

const DEFAULT_IMAGE: &str = "vault:1.4.2";
const DEFAULT_INJECTOR_IMAGE: &str = "hashicorp/vault-k8s:0.4.0";

const SERVER_CONFIG: &str = r#"disable_mlock = true
ui = true
listener "tcp" {
  tls_disable = 1
  address = "[::]:8200"
  cluster_address = "[::]:8201"
}
storage "file" {
  path = "/vault/data"
}
"#;

fn image(spec: Option<&ImageSpec>, default: &str) -> String {
    spec.map(ImageSpec::reference)
        .unwrap_or_else(|| default.to_string())
}

fn server(workshop: &Workshop) -> StatefulSet {
    let mut container = deployment::with_mounts(
        deployment::container(
            SERVER,
            &image(workshop.spec.infrastructure.vault.image.as_ref(), DEFAULT_IMAGE),
            vec![
                deployment::field_env("POD_IP", "status.podIP"),
                deployment::env("VAULT_ADDR", format!("http://127.0.0.1:{}", API_PORT)),
                deployment::env("VAULT_API_ADDR", format!("http://$(POD_IP):{}", API_PORT)),
                deployment::env("SKIP_CHOWN", "true"),
                deployment::env("SKIP_SETCAP", "true"),
                deployment::env("HOME", "/home/vault"),
            ],
            &[("http", API_PORT), ("internal", CLUSTER_PORT)],
        ),
        vec![VolumeMount {
            name: "config".to_string(),
            mount_path: "/vault/config".to_string(),
            ..Default::default()
        }],
    );
    container.command = Some(vec!["/bin/sh".to_string(), "-ec".to_string()]);
    container.args = Some(vec![
        "vault server -dev -config=/vault/config/extraconfig-from-values.hcl".to_string(),
    ]);

    statefulset::build(
        SERVER,
        NAMESPACE,
        labels::app_labels(MODULE, SERVER),
        labels::selector_labels(SERVER),
        INTERNAL_SERVICE,
        deployment::PodParams::single(container)
            .with_service_account(SERVER)
            .with_volumes(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: CONFIG.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
        Vec::new(),
        None,
    )
}

fn server_services() -> [Service; 2] {
    let ports = || {
        vec![
            service::port("http", API_PORT, API_PORT),
            service::port("internal", CLUSTER_PORT, CLUSTER_PORT),
        ]
    };
    [
        service::build(
            SERVER,
            NAMESPACE,
            labels::app_labels(MODULE, SERVER),
            labels::selector_labels(SERVER),
            ports(),
            None,
        ),
        service::headless(
            INTERNAL_SERVICE,
            NAMESPACE,
            labels::app_labels(MODULE, SERVER),
            labels::selector_labels(SERVER),
            ports(),
            None,
        ),
    ]
}

fn injector(workshop: &Workshop) -> Deployment {
    let container = deployment::container(
        "sidecar-injector",
        &image(
            workshop.spec.infrastructure.vault.agent_injector_image.as_ref(),
            DEFAULT_INJECTOR_IMAGE,
        ),
        vec![
            deployment::env("AGENT_INJECT_LISTEN", format!(":{}", INJECTOR_PORT)),
            deployment::env("AGENT_INJECT_LOG_LEVEL", "info"),
            deployment::env(
                "AGENT_INJECT_VAULT_ADDR",
                format!("http://{}.{}.svc:{}", SERVER, NAMESPACE, API_PORT),
            ),
            deployment::env("AGENT_INJECT_VAULT_IMAGE", DEFAULT_IMAGE),
            deployment::env("AGENT_INJECT_TLS_AUTO", INJECTOR_WEBHOOK),
            deployment::env(
                "AGENT_INJECT_TLS_AUTO_HOSTS",
                format!("{},{}.{},{}.{}.svc", INJECTOR_SERVICE, INJECTOR_SERVICE, NAMESPACE, INJECTOR_SERVICE, NAMESPACE),
            ),
        ],
        &[("https", INJECTOR_PORT)],
    );
    deployment::build(
        INJECTOR,
        NAMESPACE,
        labels::app_labels(MODULE, INJECTOR),
        labels::selector_labels(INJECTOR),
        deployment::PodParams::single(container).with_service_account(INJECTOR),
        None,
    )
}

async fn reconcile_server<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let labels = labels::module_labels(MODULE);

    client::ensure(
        &ctx.client,
        &configmap::build(
            CONFIG,
            NAMESPACE,
            labels.clone(),
            BTreeMap::from([(
                "extraconfig-from-values.hcl".to_string(),
                SERVER_CONFIG.to_string(),
            )]),
            None,
        ),
    )
    .await?;
    client::ensure(&ctx.client, &rbac::service_account(SERVER, NAMESPACE, labels.clone(), None)).await?;
    scc::add_user(&ctx.client, scc::PRIVILEGED, &scc::service_account_user(NAMESPACE, SERVER)).await?;
    client::ensure(
        &ctx.client,
        &rbac::cluster_role_binding(
            SERVER_BINDING,
            labels,
            rbac::cluster_role_ref("system:auth-delegator"),
            vec![rbac::service_account_subject(SERVER, NAMESPACE)],
        ),
    )
    .await?;
    for svc in server_services() {
        client::ensure(&ctx.client, &svc).await?;
    }
    client::ensure(&ctx.client, &server(workshop)).await?;
    Ok(())
}

async fn reconcile_injector<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let labels = labels::module_labels(MODULE);

    client::ensure(&ctx.client, &rbac::service_account(INJECTOR, NAMESPACE, labels.clone(), None)).await?;
    scc::add_user(&ctx.client, scc::PRIVILEGED, &scc::service_account_user(NAMESPACE, INJECTOR)).await?;
    client::ensure(
        &ctx.client,
        &rbac::cluster_role(
            INJECTOR_ROLE,
            labels.clone(),
            vec![rbac::rule(
                &["admissionregistration.k8s.io"],
                &["mutatingwebhookconfigurations"],
                &["get", "list", "watch", "patch"],
            )],
        ),
    )
    .await?;
    client::ensure(
        &ctx.client,
        &rbac::cluster_role_binding(
            INJECTOR_BINDING,
            labels.clone(),
            rbac::cluster_role_ref(INJECTOR_ROLE),
            vec![rbac::service_account_subject(INJECTOR, NAMESPACE)],
        ),
    )
    .await?;
    client::ensure(
        &ctx.client,
        &service::build(
            INJECTOR_SERVICE,
            NAMESPACE,
            labels::app_labels(MODULE, INJECTOR),
            labels::selector_labels(INJECTOR),
            vec![service::port("https", 443, INJECTOR_PORT)],
            None,
        ),
    )
    .await?;
    deployment::apply_tracked(&ctx.client, &injector(workshop)).await?;
    client::ensure(
        &ctx.client,
        &webhook::pod_mutating(
            INJECTOR_WEBHOOK,
            labels,
            "vault.hashicorp.com",
            INJECTOR_SERVICE,
            NAMESPACE,
            "/mutate",
        ),
    )
    .await?;
    Ok(())
}

/// Server first so the injector has something to point the agents at
pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    client::ensure(&ctx.client, &namespace::build(NAMESPACE, labels::module_labels(MODULE))).await?;
    reconcile_server(workshop, ctx).await?;
    reconcile_injector(workshop, ctx).await?;
    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let ns = Some(NAMESPACE);

    client::delete_if_exists::<C, MutatingWebhookConfiguration>(&ctx.client, INJECTOR_WEBHOOK, None).await?;
    client::delete_if_exists::<C, Deployment>(&ctx.client, INJECTOR, ns).await?;
    client::delete_if_exists::<C, Service>(&ctx.client, INJECTOR_SERVICE, ns).await?;
    client::delete_if_exists::<C, ClusterRoleBinding>(&ctx.client, INJECTOR_BINDING, None).await?;
    client::delete_if_exists::<C, ClusterRole>(&ctx.client, INJECTOR_ROLE, None).await?;
    scc::remove_user(&ctx.client, scc::PRIVILEGED, &scc::service_account_user(NAMESPACE, INJECTOR)).await?;
    client::delete_if_exists::<C, ServiceAccount>(&ctx.client, INJECTOR, ns).await?;

    client::delete_if_exists::<C, StatefulSet>(&ctx.client, SERVER, ns).await?;
    client::delete_if_exists::<C, Service>(&ctx.client, INTERNAL_SERVICE, ns).await?;
    client::delete_if_exists::<C, Service>(&ctx.client, SERVER, ns).await?;
    client::delete_if_exists::<C, ClusterRoleBinding>(&ctx.client, SERVER_BINDING, None).await?;
    scc::remove_user(&ctx.client, scc::PRIVILEGED, &scc::service_account_user(NAMESPACE, SERVER)).await?;
    client::delete_if_exists::<C, ServiceAccount>(&ctx.client, SERVER, ns).await?;
    client::delete_if_exists::<C, ConfigMap>(&ctx.client, CONFIG, ns).await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crds::SecurityContextConstraints, identity::tests::workshop, modules::testing};

    fn privileged_users(ctx: &Context<crate::client::memory::MemoryClient>) -> Vec<String> {
        let constraints: SecurityContextConstraints =
            ctx.client.fetch(scc::PRIVILEGED, None).unwrap();
        constraints.users.unwrap_or_default()
    }

    #[tokio::test]
    async fn test_service_accounts_added_to_privileged_once() {
        let (ctx, _) = testing::context();
        let ws = workshop(1, "staging");

        for _ in 0..3 {
            assert_eq!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Done);
        }

        let users = privileged_users(&ctx);
        assert_eq!(
            users,
            vec![
                "system:admin",
                "system:serviceaccount:vault:vault",
                "system:serviceaccount:vault:vault-agent-injector",
            ]
        );
        assert_eq!(ctx.client.update_count::<SecurityContextConstraints>(scc::PRIVILEGED, None), 2);
    }

    #[tokio::test]
    async fn test_server_runs_in_dev_mode() {
        let (ctx, _) = testing::context();
        reconcile(&workshop(1, "staging"), &ctx).await.unwrap();

        let sts: StatefulSet = ctx.client.fetch(SERVER, Some(NAMESPACE)).unwrap();
        let spec = sts.spec.unwrap();
        assert_eq!(spec.service_name.as_deref(), Some(INTERNAL_SERVICE));
        let container = &spec.template.spec.unwrap().containers[0];
        assert!(container.args.as_ref().unwrap()[0].starts_with("vault server -dev"));
        assert_eq!(container.image.as_deref(), Some(DEFAULT_IMAGE));
        let env = container.env.as_ref().unwrap();
        let pod_ip = env.iter().position(|e| e.name == "POD_IP").unwrap();
        let api_addr = env.iter().position(|e| e.name == "VAULT_API_ADDR").unwrap();
        assert!(pod_ip < api_addr);
        assert_eq!(
            env[pod_ip].value_from.as_ref().unwrap().field_ref.as_ref().unwrap().field_path,
            "status.podIP"
        );

        let internal: Service = ctx.client.fetch(INTERNAL_SERVICE, Some(NAMESPACE)).unwrap();
        assert_eq!(internal.spec.unwrap().cluster_ip.as_deref(), Some("None"));
        assert!(ctx.client.contains::<MutatingWebhookConfiguration>(INJECTOR_WEBHOOK, None));
        let binding: ClusterRoleBinding = ctx.client.fetch(SERVER_BINDING, None).unwrap();
        assert_eq!(binding.role_ref.name, "system:auth-delegator");
    }

    #[tokio::test]
    async fn test_delete_releases_privileged_scc() {
        let (ctx, _) = testing::context();
        let ws = workshop(1, "staging");
        reconcile(&ws, &ctx).await.unwrap();

        delete(&ws, &ctx).await.unwrap();
        delete(&ws, &ctx).await.unwrap();
        assert_eq!(privileged_users(&ctx), vec!["system:admin"]);
        assert!(!ctx.client.contains::<StatefulSet>(SERVER, Some(NAMESPACE)));
        assert!(!ctx.client.contains::<ClusterRole>(INJECTOR_ROLE, None));
        assert!(!ctx.client.contains::<Namespace>(NAMESPACE, None));
    }
}
