use super::{gate, install_operator, uninstall_operator, Outcome};
use crate::{
    client::ObjectClient,
    crds::Workshop,
    error::Result,
    identity,
    reconciler::{
        fanout::{self, DesiredObject},
        Context,
    },
    resources::{labels, olm, rbac, scc},
};

const MODULE: &str = "istio-workspace";

const SUBSCRIPTION: &str = "istio-workspace-operator";
const ROLE: &str = "istio-workspace";

/// SCCs the sessions' pods need, granted to the default service account of
/// every staging project
const SCCS: [&str; 2] = [scc::PRIVILEGED, scc::ANYUID];

fn session_user(workshop: &Workshop, index: u32) -> String {
    scc::service_account_user(&identity::staging_project(workshop, index), "default")
}

/// Role and binding that let one learner open sessions in their staging project
pub fn user_objects(workshop: &Workshop, index: u32) -> Vec<DesiredObject> {
    let project = identity::staging_project(workshop, index);
    let labels = labels::module_labels(MODULE);
    vec![
        rbac::role(
            ROLE,
            &project,
            labels.clone(),
            vec![rbac::full_access(&["maistra.io"], &["sessions"])],
            None,
        )
        .into(),
        rbac::role_binding(
            ROLE,
            &project,
            labels,
            rbac::role_ref(ROLE),
            vec![rbac::user_subject(&identity::username(index))],
            None,
        )
        .into(),
    ]
}

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.istio_workspace.operator_hub;
    let subscription = olm::subscription(
        SUBSCRIPTION,
        &ctx.config.operators_namespace,
        MODULE,
        SUBSCRIPTION,
        hub,
        olm::CatalogSource::Community,
    );
    gate!(install_operator(ctx, &subscription, &hub.cluster_service_version).await?);

    fanout::apply(&ctx.client, MODULE, workshop.spec.user_count, |i| {
        user_objects(workshop, i)
    })
    .await?;

    for index in identity::user_indices(workshop) {
        let user = session_user(workshop, index);
        for name in SCCS {
            scc::add_user(&ctx.client, name, &user).await?;
        }
    }

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    for index in identity::user_indices(workshop) {
        let user = session_user(workshop, index);
        for name in SCCS {
            scc::remove_user(&ctx.client, name, &user).await?;
        }
    }
    fanout::remove(&ctx.client, workshop.spec.user_count, |i| {
        user_objects(workshop, i)
    })
    .await?;
    uninstall_operator(ctx, SUBSCRIPTION, &ctx.config.operators_namespace).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::memory::MemoryClient,
        crds::{SecurityContextConstraints, Subscription},
        modules::testing,
    };
    use k8s_openapi::api::rbac::v1::{Role, RoleBinding};

    fn users(ctx: &Context<MemoryClient>, name: &str) -> Vec<String> {
        let constraints: SecurityContextConstraints = ctx.client.fetch(name, None).unwrap();
        constraints.users.unwrap_or_default()
    }

    #[tokio::test]
    async fn test_requeues_before_per_user_work() {
        let (ctx, _) = testing::context();
        let ws = crate::identity::tests::workshop(2, "staging");

        assert!(matches!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Requeue(_)));
        let sub: Subscription = ctx
            .client
            .fetch(SUBSCRIPTION, Some("openshift-operators"))
            .unwrap();
        assert_eq!(sub.spec.source, "community-operators");
        assert_eq!(ctx.client.count::<Role>(), 0);
        assert_eq!(users(&ctx, scc::PRIVILEGED), vec!["system:admin"]);
    }

    #[tokio::test]
    async fn test_scc_users_appended_once() {
        let (ctx, _) = testing::context();
        let ws = crate::identity::tests::workshop(2, "staging");
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, "openshift-operators", "istio-workspace.v0.0.9");

        assert_eq!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Done);
        assert_eq!(reconcile(&ws, &ctx).await.unwrap(), Outcome::Done);

        for name in SCCS {
            assert_eq!(
                users(&ctx, name),
                vec![
                    "system:admin",
                    "system:serviceaccount:staging1:default",
                    "system:serviceaccount:staging2:default",
                ]
            );
        }
        let rb: RoleBinding = ctx.client.fetch(ROLE, Some("staging2")).unwrap();
        assert_eq!(rb.subjects.unwrap()[0].name, "user2");
    }

    #[tokio::test]
    async fn test_delete_releases_scc_users() {
        let (ctx, _) = testing::context();
        let ws = crate::identity::tests::workshop(1, "staging");
        testing::installed_subscription(&ctx.client, SUBSCRIPTION, "openshift-operators", "istio-workspace.v0.0.9");
        reconcile(&ws, &ctx).await.unwrap();

        delete(&ws, &ctx).await.unwrap();
        delete(&ws, &ctx).await.unwrap();
        assert_eq!(users(&ctx, scc::ANYUID), vec!["system:admin"]);
        assert_eq!(ctx.client.count::<Role>(), 0);
        assert!(!ctx.client.contains::<Subscription>(SUBSCRIPTION, Some("openshift-operators")));
    }
}
