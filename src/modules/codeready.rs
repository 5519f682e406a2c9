//! CodeReady Workspaces: the in-browser IDE. Beyond the operator and its
//! CheCluster, every learner gets an identity-provider account and a first
//! workspace started from the workshop's devfile.
//!
//! Learners whose workspace was started are recorded in a config map next to
//! the server, one key per learner, so a pass that fails halfway picks up the
//! remaining learners on the next one.

use super::{gate, install_operator, uninstall_operator, wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{
        CheAuthSpec, CheCluster, CheClusterSpec, CheDatabaseSpec, CheServerSpec, CheStorageSpec,
        ImageSpec, OperatorGroup, Workshop,
    },
    error::Result,
    external::Registration,
    identity,
    reconciler::{Context, Environment},
    resources::{configmap, labels, namespace, object_meta, olm, route},
};
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const MODULE: &str = "codeready";

pub const NAMESPACE: &str = "workspaces";
const SUBSCRIPTION: &str = "codeready-workspaces";
const OPERATOR_DEPLOYMENT: &str = "codeready-operator";
pub const CHE_CLUSTER: &str = "codeready-workspaces";
/// Server deployment the operator rolls out for the CheCluster
const SERVER_DEPLOYMENT: &str = "codeready";
const REALM: &str = "codeready";
/// Learners whose first workspace has been started
const PROVISIONED: &str = "codeready-provisioned-users";

pub fn che_url(env: &Environment) -> String {
    format!(
        "https://{}",
        route::default_host(CHE_CLUSTER, NAMESPACE, &env.apps_hostname_suffix)
    )
}

pub fn keycloak_url(env: &Environment) -> String {
    format!(
        "https://{}",
        route::default_host("keycloak", NAMESPACE, &env.apps_hostname_suffix)
    )
}

fn che_cluster(workshop: &Workshop) -> CheCluster {
    let spec = &workshop.spec.infrastructure.code_ready_workspace;
    CheCluster {
        metadata: object_meta(CHE_CLUSTER, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: CheClusterSpec {
            server: CheServerSpec {
                che_flavor: "codeready".to_string(),
                tls_support: true,
                self_signed_cert: false,
                plugin_registry_image: spec.plugin_registry_image.as_ref().map(ImageSpec::reference),
                custom_che_properties: BTreeMap::from([(
                    "CHE_LIMITS_USER_WORKSPACES_RUN_COUNT".to_string(),
                    "2".to_string(),
                )]),
            },
            database: CheDatabaseSpec { external_db: false },
            auth: CheAuthSpec {
                open_shift_oauth: spec.openshift_oauth,
                external_identity_provider: false,
                identity_provider_password: "admin".to_string(),
            },
            storage: CheStorageSpec {
                pvc_strategy: "per-workspace".to_string(),
                pvc_claim_size: "1Gi".to_string(),
            },
            ..Default::default()
        },
    }
}

async fn provisioned_users<C: ObjectClient>(ctx: &Context<C>) -> Result<BTreeSet<String>> {
    client::ensure(
        &ctx.client,
        &configmap::build(
            PROVISIONED,
            NAMESPACE,
            labels::module_labels(MODULE),
            BTreeMap::new(),
            None,
        ),
    )
    .await?;
    Ok(ctx
        .client
        .get::<ConfigMap>(PROVISIONED, Some(NAMESPACE))
        .await?
        .and_then(|cm| cm.data)
        .map(|data| data.into_keys().collect())
        .unwrap_or_default())
}

async fn mark_provisioned<C: ObjectClient>(ctx: &Context<C>, username: &str) -> Result<()> {
    let mut data = serde_json::Map::new();
    data.insert(
        username.to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    let patch = json!({ "data": data });
    ctx.client
        .merge_patch::<ConfigMap>(PROVISIONED, Some(NAMESPACE), &patch)
        .await
}

/// Register every learner with the identity provider, then start a workspace
/// from the devfile for every learner that has none yet. The devfile is fetched
/// at most once per pass
async fn provision_users<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<()> {
    let external = &ctx.external;
    let keycloak = keycloak_url(env);
    let che = che_url(env);
    let password = &workshop.spec.user_password;
    let admin_token = external.keycloak_admin_token(&keycloak).await?;
    let provisioned = provisioned_users(ctx).await?;

    let mut devfile: Option<Value> = None;
    for index in identity::user_indices(workshop) {
        let username = identity::username(index);
        let registration = external
            .create_keycloak_user(&keycloak, REALM, &admin_token, &username, password)
            .await?;
        if registration == Registration::AlreadyExists {
            debug!("{} already registered with CodeReady", username);
        }
        if provisioned.contains(&username) {
            continue;
        }

        let token = if workshop.spec.infrastructure.code_ready_workspace.openshift_oauth {
            external
                .openshift_oauth_token(&env.apps_hostname_suffix, &username, password)
                .await?
        } else {
            external
                .keycloak_user_token(&keycloak, REALM, &username, password)
                .await?
        };

        if devfile.is_none() {
            let source = &workshop.spec.source;
            devfile = Some(external.fetch_devfile(&source.git_url, &source.git_branch).await?);
        }
        if let Some(devfile) = devfile.as_ref() {
            external.init_workspace(&che, &username, &token, devfile).await?;
            mark_provisioned(ctx, &username).await?;
            info!("Initialized workspace for {}", username);
        }
    }
    Ok(())
}

pub async fn reconcile<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.code_ready_workspace.operator_hub;
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

    client::ensure(&ctx.client, &che_cluster(workshop)).await?;
    gate!(wait_for_deployment(ctx, SERVER_DEPLOYMENT, NAMESPACE).await?);

    provision_users(workshop, env, ctx).await?;
    Ok(Outcome::Done)
}

/// Identity-provider accounts and workspaces live inside the CodeReady server and
/// go away with it
pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    client::delete_if_exists::<C, CheCluster>(&ctx.client, CHE_CLUSTER, Some(NAMESPACE)).await?;
    client::delete_if_exists::<C, ConfigMap>(&ctx.client, PROVISIONED, Some(NAMESPACE)).await?;
    uninstall_operator(ctx, SUBSCRIPTION, NAMESPACE).await?;
    client::delete_if_exists::<C, OperatorGroup>(&ctx.client, NAMESPACE, Some(NAMESPACE)).await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::tests::workshop,
        modules::testing::{self, env},
    };

    fn enabled_workshop(users: u32) -> Workshop {
        let mut ws = workshop(users, "staging");
        ws.spec.infrastructure.code_ready_workspace.enabled = true;
        ws.spec.source.git_url = "https://github.com/org/workshop".to_string();
        ws.spec.source.git_branch = "main".to_string();
        ws
    }

    #[tokio::test]
    async fn test_operator_not_ready_requeues_without_che_cluster() {
        let (ctx, external) = testing::context();
        let ws = enabled_workshop(1);
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.insert(&k8s_openapi::api::apps::v1::Deployment {
            metadata: object_meta(OPERATOR_DEPLOYMENT, Some(NAMESPACE), BTreeMap::new(), None),
            ..Default::default()
        });

        assert!(matches!(reconcile(&ws, &env(), &ctx).await.unwrap(), Outcome::Requeue(_)));
        assert!(!ctx.client.contains::<CheCluster>(CHE_CLUSTER, Some(NAMESPACE)));
        assert!(external.calls().is_empty());
    }

    #[tokio::test]
    async fn test_workspace_initialized_once_per_user() {
        let (ctx, external) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        ctx.client.mark_deployment_ready(SERVER_DEPLOYMENT, NAMESPACE);

        assert_eq!(reconcile(&enabled_workshop(1), &env(), &ctx).await.unwrap(), Outcome::Done);
        assert!(ctx.client.contains::<CheCluster>(CHE_CLUSTER, Some(NAMESPACE)));
        assert_eq!(
            external.calls(),
            vec![
                "admin-token https://keycloak-workspaces.apps.cluster.example.com",
                "keycloak-user codeready user1",
                "user-token user1",
                "devfile https://raw.githubusercontent.com/org/workshop/main/devfile.yaml",
                "workspace user1 token-user1",
            ]
        );

        external.calls.lock().unwrap().clear();
        assert_eq!(reconcile(&enabled_workshop(2), &env(), &ctx).await.unwrap(), Outcome::Done);
        assert_eq!(
            external.calls(),
            vec![
                "admin-token https://keycloak-workspaces.apps.cluster.example.com",
                "keycloak-user codeready user1",
                "keycloak-user codeready user2",
                "user-token user2",
                "devfile https://raw.githubusercontent.com/org/workshop/main/devfile.yaml",
                "workspace user2 token-user2",
            ]
        );
    }

    #[tokio::test]
    async fn test_openshift_oauth_tokens() {
        let (ctx, external) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        ctx.client.mark_deployment_ready(SERVER_DEPLOYMENT, NAMESPACE);
        let mut ws = enabled_workshop(2);
        ws.spec.infrastructure.code_ready_workspace.openshift_oauth = true;

        reconcile(&ws, &env(), &ctx).await.unwrap();
        let calls = external.calls();
        assert!(calls.contains(&"workspace user2 oauth-user2".to_string()));
        assert_eq!(calls.iter().filter(|c| c.starts_with("devfile")).count(), 1);

        let che: CheCluster = ctx.client.fetch(CHE_CLUSTER, Some(NAMESPACE)).unwrap();
        assert!(che.spec.auth.open_shift_oauth);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (ctx, _) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        reconcile(&enabled_workshop(1), &env(), &ctx).await.unwrap();

        delete(&enabled_workshop(1), &ctx).await.unwrap();
        delete(&enabled_workshop(1), &ctx).await.unwrap();
        assert!(!ctx.client.contains::<CheCluster>(CHE_CLUSTER, Some(NAMESPACE)));
        assert!(!ctx.client.contains::<Namespace>(NAMESPACE, None));
    }

    #[tokio::test]
    async fn test_failed_workspace_init_is_retried_next_pass() {
        let (ctx, external) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        ctx.client.mark_deployment_ready(SERVER_DEPLOYMENT, NAMESPACE);
        let ws = enabled_workshop(2);

        external.fail_next("workspace", 503);
        let err = reconcile(&ws, &env(), &ctx).await.unwrap_err();
        assert!(err.is_retryable());

        external.calls.lock().unwrap().clear();
        assert_eq!(reconcile(&ws, &env(), &ctx).await.unwrap(), Outcome::Done);
        let calls = external.calls();
        assert!(calls.contains(&"workspace user1 token-user1".to_string()));
        assert!(calls.contains(&"workspace user2 token-user2".to_string()));

        let record: ConfigMap = ctx.client.fetch(PROVISIONED, Some(NAMESPACE)).unwrap();
        let users: Vec<String> = record.data.unwrap().into_keys().collect();
        assert_eq!(users, vec!["user1", "user2"]);
    }

    #[tokio::test]
    async fn test_progress_kept_when_a_later_user_fails() {
        let (ctx, external) = testing::context();
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, NAMESPACE, "crwoperator.v2.1.0");
        ctx.client.mark_deployment_ready(OPERATOR_DEPLOYMENT, NAMESPACE);
        ctx.client.mark_deployment_ready(SERVER_DEPLOYMENT, NAMESPACE);

        reconcile(&enabled_workshop(1), &env(), &ctx).await.unwrap();
        external.fail_next("user-token", 500);
        reconcile(&enabled_workshop(2), &env(), &ctx).await.unwrap_err();

        external.calls.lock().unwrap().clear();
        reconcile(&enabled_workshop(2), &env(), &ctx).await.unwrap();
        let workspaces: Vec<String> = external
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("workspace"))
            .collect();
        assert_eq!(workspaces, vec!["workspace user2 token-user2"]);
    }
}
