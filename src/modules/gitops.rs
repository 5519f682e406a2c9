//! ArgoCD for the learners: one shared instance in `argocd` with a local account,
//! an RBAC policy block and an AppProject per learner, and the rights the
//! application controller needs in every staging project.

use super::{gate, install_operator, uninstall_operator, user, wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{
        AppProject, AppProjectSpec, ApplicationDestination, ArgoCD, ArgoCDRbacSpec, ArgoCDSpec,
        OperatorGroup, Workshop,
    },
    error::Result,
    identity,
    reconciler::{
        fanout::{self, DesiredObject},
        Context,
    },
    resources::{configmap, labels, namespace, object_meta, olm, rbac, secret},
};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use std::collections::BTreeMap;
use tracing::info;

const MODULE: &str = "gitops";

pub const NAMESPACE: &str = identity::ARGOCD_NAMESPACE;
const SUBSCRIPTION: &str = "argocd-operator";
const OPERATOR_DEPLOYMENT: &str = "argocd-operator";
const INSTANCE: &str = "argocd";
const CONFIG_MAP: &str = "argocd-cm";
const SECRET: &str = "argocd-secret";
/// Created by the operator once the instance is up
pub const CLUSTER_CONFIG: &str = "argocd-default-cluster-config";
const MANAGER: &str = "argocd-manager";

fn instance(workshop: &Workshop) -> ArgoCD {
    ArgoCD {
        metadata: object_meta(INSTANCE, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: ArgoCDSpec {
            rbac: ArgoCDRbacSpec {
                default_policy: Some(String::new()),
                policy: Some(identity::gitops_policy(workshop)),
                scopes: Some("[groups]".to_string()),
            },
            ..Default::default()
        },
    }
}

fn restore_policy(live: &mut ArgoCD, desired: &ArgoCD) -> bool {
    if live.spec.rbac.policy == desired.spec.rbac.policy {
        return false;
    }
    live.spec.rbac.policy = desired.spec.rbac.policy.clone();
    true
}

fn accounts(workshop: &Workshop) -> ConfigMap {
    let data = identity::user_indices(workshop)
        .map(|i| (format!("accounts.{}", identity::username(i)), "login".to_string()))
        .collect();
    configmap::build(CONFIG_MAP, NAMESPACE, labels::module_labels(MODULE), data, None)
}

/// Copy the desired keys onto the live config map, keeping keys the operator added
fn restore_accounts(live: &mut ConfigMap, desired: &ConfigMap) -> bool {
    let data = live.data.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired.data.iter().flatten() {
        if data.get(key) != Some(value) {
            data.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// `accounts.userN.password` for every learner. A hash already stored on `live`
/// is reused while it still verifies against the Workshop password
async fn account_passwords(
    workshop: &Workshop,
    live: Option<&Secret>,
) -> Result<BTreeMap<String, String>> {
    let stored = identity::user_indices(workshop)
        .map(|index| {
            let key = format!("accounts.{}.password", identity::username(index));
            let hash = live.and_then(|s| secret::value(s, &key));
            (key, hash)
        })
        .collect();
    let hashes = user::hash_passwords(&workshop.spec.user_password, stored).await?;
    Ok(hashes.into_iter().collect())
}

fn restore_passwords(live: &mut Secret, desired: &Secret) -> bool {
    let data = live.data.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired.data.iter().flatten() {
        if data.get(key) != Some(value) {
            data.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Point the operator's default cluster config at the staging projects. Requeues
/// until the operator has created it
async fn cluster_config<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Option<Outcome>> {
    let Some(mut live) = ctx.client.get::<Secret>(CLUSTER_CONFIG, Some(NAMESPACE)).await? else {
        return Ok(Some(ctx.waiting(&format!("secret {}/{}", NAMESPACE, CLUSTER_CONFIG))));
    };

    let namespaces = identity::cluster_config_namespaces(workshop);
    if secret::value(&live, "namespaces").as_deref() != Some(namespaces.as_str()) {
        info!("Setting {} namespaces to {}", CLUSTER_CONFIG, namespaces);
        live.data
            .get_or_insert_with(BTreeMap::new)
            .extend(secret::to_bytes(BTreeMap::from([("namespaces".to_string(), namespaces)])));
        ctx.client.update(&live).await?;
    }
    Ok(None)
}

/// AppProject of one learner plus the controller's role in their staging project
pub fn user_objects(workshop: &Workshop, index: u32) -> Vec<DesiredObject> {
    let username = identity::username(index);
    let project = identity::staging_project(workshop, index);
    let labels = labels::module_labels(MODULE);

    let app_project = AppProject {
        metadata: object_meta(&username, Some(NAMESPACE), labels.clone(), None),
        spec: AppProjectSpec {
            source_repos: vec![format!("{}/{}/*", identity::GITEA_INTERNAL_URL, username)],
            destinations: vec![ApplicationDestination {
                namespace: project.clone(),
                server: identity::IN_CLUSTER_SERVER.to_string(),
            }],
            cluster_resource_whitelist: Vec::new(),
        },
    };

    vec![
        app_project.into(),
        rbac::role(
            MANAGER,
            &project,
            labels.clone(),
            vec![rbac::full_access(&["*"], &["*"])],
            None,
        )
        .into(),
        rbac::role_binding(
            MANAGER,
            &project,
            labels,
            rbac::role_ref(MANAGER),
            vec![rbac::service_account_subject(identity::ARGOCD_CONTROLLER_SA, NAMESPACE)],
            None,
        )
        .into(),
    ]
}

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.git_ops.operator_hub;
    let labels = labels::module_labels(MODULE);

    client::ensure(&ctx.client, &namespace::build(NAMESPACE, labels.clone())).await?;
    client::ensure(
        &ctx.client,
        &olm::operator_group(NAMESPACE, NAMESPACE, labels, &[NAMESPACE]),
    )
    .await?;

    let subscription = olm::subscription(
        SUBSCRIPTION,
        NAMESPACE,
        MODULE,
        SUBSCRIPTION,
        hub,
        olm::CatalogSource::RedHat,
    );
    gate!(install_operator(ctx, &subscription, &hub.cluster_service_version).await?);
    gate!(wait_for_deployment(ctx, OPERATOR_DEPLOYMENT, NAMESPACE).await?);

    client::ensure_tracked(&ctx.client, &instance(workshop), restore_policy).await?;
    client::ensure_tracked(&ctx.client, &accounts(workshop), restore_accounts).await?;

    let live = ctx.client.get::<Secret>(SECRET, Some(NAMESPACE)).await?;
    let passwords = secret::opaque(
        SECRET,
        NAMESPACE,
        labels::module_labels(MODULE),
        account_passwords(workshop, live.as_ref()).await?,
        None,
    );
    client::ensure_tracked(&ctx.client, &passwords, restore_passwords).await?;

    gate!(cluster_config(workshop, ctx).await?);

    fanout::apply(&ctx.client, MODULE, workshop.spec.user_count, |i| {
        user_objects(workshop, i)
    })
    .await?;

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    fanout::remove(&ctx.client, workshop.spec.user_count, |i| {
        user_objects(workshop, i)
    })
    .await?;

    let ns = Some(NAMESPACE);
    client::delete_if_exists::<C, Secret>(&ctx.client, SECRET, ns).await?;
    client::delete_if_exists::<C, ConfigMap>(&ctx.client, CONFIG_MAP, ns).await?;
    client::delete_if_exists::<C, ArgoCD>(&ctx.client, INSTANCE, ns).await?;
    uninstall_operator(ctx, SUBSCRIPTION, NAMESPACE).await?;
    client::delete_if_exists::<C, OperatorGroup>(&ctx.client, NAMESPACE, ns).await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::memory::MemoryClient,
        identity::tests::workshop,
        modules::testing,
    };
    use k8s_openapi::api::rbac::v1::{Role, RoleBinding};

    fn ready_context() -> Context<MemoryClient> {
        let (ctx, _) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "argocd-operator.v0.0.14");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        ctx.client.insert(&secret::opaque(
            CLUSTER_CONFIG,
            NAMESPACE,
            BTreeMap::new(),
            BTreeMap::from([("server".to_string(), identity::IN_CLUSTER_SERVER.to_string())]),
            None,
        ));
        ctx
    }

    #[tokio::test]
    async fn test_policy_and_cluster_config_for_two_users() {
        let ctx = ready_context();
        let ws = workshop(2, "staging");
        assert_eq!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Done);

        let argocd: ArgoCD = ctx.client.fetch(INSTANCE, Some(NAMESPACE)).unwrap();
        assert_eq!(
            argocd.spec.rbac.policy.unwrap(),
            format!(
                "{}{}",
                identity::gitops_policy_block("user1", "staging1"),
                identity::gitops_policy_block("user2", "staging2")
            )
        );

        let config: Secret = ctx.client.fetch(CLUSTER_CONFIG, Some(NAMESPACE)).unwrap();
        assert_eq!(secret::value(&config, "namespaces").as_deref(), Some("staging1,staging2"));
        assert_eq!(
            secret::value(&config, "server").as_deref(),
            Some(identity::IN_CLUSTER_SERVER)
        );

        let cm: ConfigMap = ctx.client.fetch(CONFIG_MAP, Some(NAMESPACE)).unwrap();
        assert_eq!(cm.data.unwrap()["accounts.user2"], "login");

        for i in 1..=2 {
            let project = format!("staging{}", i);
            assert!(ctx.client.contains::<AppProject>(&format!("user{}", i), Some(NAMESPACE)));
            assert!(ctx.client.contains::<Role>(MANAGER, Some(&project)));
            let rb: RoleBinding = ctx.client.fetch(MANAGER, Some(&project)).unwrap();
            assert_eq!(rb.subjects.unwrap()[0].name, identity::ARGOCD_CONTROLLER_SA);
        }
    }

    #[tokio::test]
    async fn test_passwords_are_hashed_once() {
        let ctx = ready_context();
        let ws = workshop(1, "staging");
        reconcile(&ws, &ctx).await.unwrap();

        let stored: Secret = ctx.client.fetch(SECRET, Some(NAMESPACE)).unwrap();
        let hash = secret::value(&stored, "accounts.user1.password").unwrap();
        assert!(bcrypt::verify("openshift", &hash).unwrap());

        reconcile(&ws, &ctx).await.unwrap();
        assert_eq!(ctx.client.update_count::<Secret>(SECRET, Some(NAMESPACE)), 0);
    }

    #[tokio::test]
    async fn test_policy_drift_is_restored() {
        let ctx = ready_context();
        let ws = workshop(1, "staging");
        reconcile(&ws, &ctx).await.unwrap();

        let mut live: ArgoCD = ctx.client.fetch(INSTANCE, Some(NAMESPACE)).unwrap();
        live.spec.rbac.policy = Some("g, user1, role:admin\n".to_string());
        live.spec.rbac.scopes = Some("[email]".to_string());
        ctx.client.insert(&live);

        reconcile(&ws, &ctx).await.unwrap();
        let live: ArgoCD = ctx.client.fetch(INSTANCE, Some(NAMESPACE)).unwrap();
        assert_eq!(live.spec.rbac.policy, Some(identity::gitops_policy(&ws)));
        assert_eq!(live.spec.rbac.scopes.as_deref(), Some("[email]"));
    }

    #[tokio::test]
    async fn test_waits_for_cluster_config() {
        let (ctx, _) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "argocd-operator.v0.0.14");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        let ws = workshop(1, "staging");

        assert!(matches!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Requeue(_)));
        assert!(ctx.client.contains::<ArgoCD>(INSTANCE, Some(NAMESPACE)));
        assert_eq!(ctx.client.count::<AppProject>(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let ctx = ready_context();
        let ws = workshop(2, "staging");
        reconcile(&ws, &ctx).await.unwrap();

        delete(&ws, &ctx).await.unwrap();
        delete(&ws, &ctx).await.unwrap();
        assert_eq!(ctx.client.count::<AppProject>(), 0);
        assert_eq!(ctx.client.count::<RoleBinding>(), 0);
        assert!(!ctx.client.contains::<ArgoCD>(INSTANCE, Some(NAMESPACE)));
        assert!(!ctx.client.contains::<Namespace>(NAMESPACE, None));
    }
}
