//! Service mesh with tracing and observability: ElasticSearch, Jaeger, Kiali and
//! the mesh operator, one control plane in `istio-system`, and every staging
//! project as a mesh member.

use super::{gate, install_operator, uninstall_operator, wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{
        OperatorGroup, OperatorHubSpec, ServiceMeshControlPlane, ServiceMeshControlPlaneSpec,
        ServiceMeshMemberRoll, ServiceMeshMemberRollSpec, Workshop,
    },
    error::Result,
    identity,
    reconciler::Context,
    resources::{labels, namespace, object_meta, olm, rbac},
};
use k8s_openapi::api::{
    core::v1::Namespace,
    rbac::v1::{Role, RoleBinding, Subject},
};
use serde_json::json;

const MODULE: &str = "servicemesh";

pub const NAMESPACE: &str = "istio-system";
const REDHAT_OPERATORS_NAMESPACE: &str = "openshift-operators-redhat";
const CONTROL_PLANE: &str = "basic";
const MEMBER_ROLL: &str = "default";
const JAEGER_ROLE: &str = "jaeger-user";
const JAEGER_USERS: &str = "jaeger-users";
const MESH_USERS: &str = "mesh-users";
/// Role the mesh operator creates in the control plane namespace
const MESH_USER_ROLE: &str = "mesh-user";

/// One operator the mesh needs: subscription name, namespace and the
/// deployment that reports it ready
struct Product<'a> {
    subscription: &'static str,
    namespace: &'a str,
    deployment: &'static str,
    hub: &'a OperatorHubSpec,
}

fn products<'a>(workshop: &'a Workshop, operators_namespace: &'a str) -> [Product<'a>; 4] {
    let spec = &workshop.spec.infrastructure.service_mesh;
    [
        Product {
            subscription: "elasticsearch-operator",
            namespace: REDHAT_OPERATORS_NAMESPACE,
            deployment: "elasticsearch-operator",
            hub: &spec.elastic_search_operator_hub,
        },
        Product {
            subscription: "jaeger-product",
            namespace: operators_namespace,
            deployment: "jaeger-operator",
            hub: &spec.jaeger_operator_hub,
        },
        Product {
            subscription: "kiali-ossm",
            namespace: operators_namespace,
            deployment: "kiali-operator",
            hub: &spec.kiali_operator_hub,
        },
        Product {
            subscription: "servicemeshoperator",
            namespace: operators_namespace,
            deployment: "istio-operator",
            hub: &spec.service_mesh_operator_hub,
        },
    ]
}

fn control_plane() -> ServiceMeshControlPlane {
    ServiceMeshControlPlane {
        metadata: object_meta(CONTROL_PLANE, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: ServiceMeshControlPlaneSpec {
            version: "v2.0".to_string(),
            tracing: json!({"type": "Jaeger", "sampling": 10000}),
            addons: json!({
                "jaeger": {"name": "jaeger", "install": {"storage": {"type": "Memory"}}},
                "kiali": {"enabled": true, "name": "kiali"},
                "grafana": {"enabled": true},
            }),
            ..Default::default()
        },
    }
}

fn member_roll(workshop: &Workshop) -> ServiceMeshMemberRoll {
    ServiceMeshMemberRoll {
        metadata: object_meta(MEMBER_ROLL, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: ServiceMeshMemberRollSpec {
            members: identity::staging_projects(workshop),
        },
    }
}

fn restore_members(live: &mut ServiceMeshMemberRoll, desired: &ServiceMeshMemberRoll) -> bool {
    if live.spec.members == desired.spec.members {
        return false;
    }
    live.spec.members = desired.spec.members.clone();
    true
}

/// Every learner, plus the GitOps application controller when GitOps deploys
/// into the mesh
fn mesh_subjects(workshop: &Workshop) -> Vec<Subject> {
    let mut subjects: Vec<Subject> = identity::user_indices(workshop)
        .map(|i| rbac::user_subject(&identity::username(i)))
        .collect();
    if workshop.spec.infrastructure.git_ops.enabled {
        subjects.push(rbac::service_account_subject(
            identity::ARGOCD_CONTROLLER_SA,
            identity::ARGOCD_NAMESPACE,
        ));
    }
    subjects
}

fn jaeger_role() -> Role {
    rbac::role(
        JAEGER_ROLE,
        NAMESPACE,
        labels::module_labels(MODULE),
        vec![rbac::rule(
            &["jaegertracing.io"],
            &["jaegers"],
            &["get", "list", "watch"],
        )],
        None,
    )
}

fn role_bindings(workshop: &Workshop) -> [RoleBinding; 2] {
    let subjects = mesh_subjects(workshop);
    [
        rbac::role_binding(
            JAEGER_USERS,
            NAMESPACE,
            labels::module_labels(MODULE),
            rbac::role_ref(JAEGER_ROLE),
            subjects.clone(),
            None,
        ),
        rbac::role_binding(
            MESH_USERS,
            NAMESPACE,
            labels::module_labels(MODULE),
            rbac::role_ref(MESH_USER_ROLE),
            subjects,
            None,
        ),
    ]
}

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let labels = labels::module_labels(MODULE);

    client::ensure(&ctx.client, &namespace::build(REDHAT_OPERATORS_NAMESPACE, labels.clone())).await?;
    client::ensure(
        &ctx.client,
        &olm::operator_group(REDHAT_OPERATORS_NAMESPACE, REDHAT_OPERATORS_NAMESPACE, labels.clone(), &[]),
    )
    .await?;

    let products = products(workshop, &ctx.config.operators_namespace);
    for product in &products {
        let subscription = olm::subscription(
            product.subscription,
            product.namespace,
            MODULE,
            product.subscription,
            product.hub,
            olm::CatalogSource::RedHat,
        );
        gate!(install_operator(ctx, &subscription, &product.hub.cluster_service_version).await?);
    }
    for product in &products {
        gate!(wait_for_deployment(ctx, product.deployment, product.namespace).await?);
    }

    client::ensure(&ctx.client, &namespace::build(NAMESPACE, labels)).await?;
    client::ensure(&ctx.client, &control_plane()).await?;
    client::ensure_tracked(&ctx.client, &member_roll(workshop), restore_members).await?;

    client::ensure(&ctx.client, &jaeger_role()).await?;
    for binding in role_bindings(workshop) {
        client::ensure_tracked(&ctx.client, &binding, rbac::restore_subjects).await?;
    }

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let ns = Some(NAMESPACE);
    client::delete_if_exists::<C, RoleBinding>(&ctx.client, MESH_USERS, ns).await?;
    client::delete_if_exists::<C, RoleBinding>(&ctx.client, JAEGER_USERS, ns).await?;
    client::delete_if_exists::<C, Role>(&ctx.client, JAEGER_ROLE, ns).await?;
    client::delete_if_exists::<C, ServiceMeshMemberRoll>(&ctx.client, MEMBER_ROLL, ns).await?;
    client::delete_if_exists::<C, ServiceMeshControlPlane>(&ctx.client, CONTROL_PLANE, ns).await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;

    for product in products(workshop, &ctx.config.operators_namespace).iter().rev() {
        uninstall_operator(ctx, product.subscription, product.namespace).await?;
    }
    client::delete_if_exists::<C, OperatorGroup>(
        &ctx.client,
        REDHAT_OPERATORS_NAMESPACE,
        Some(REDHAT_OPERATORS_NAMESPACE),
    )
    .await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, REDHAT_OPERATORS_NAMESPACE, None).await?;
    Ok(())
}
