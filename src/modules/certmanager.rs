use super::{gate, install_operator, uninstall_operator, wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{CertManager, OperatorGroup, Workshop},
    error::Result,
    reconciler::Context,
    resources::{labels, namespace, object_meta, olm},
};
use k8s_openapi::api::core::v1::Namespace;

const MODULE: &str = "cert-manager";

pub const NAMESPACE: &str = "cert-manager";
const SUBSCRIPTION: &str = "cert-manager-operator";
const OPERATOR_DEPLOYMENT: &str = "cert-manager-operator";
const INSTANCE: &str = "cert-manager";

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.cert_manager.operator_hub;

    client::ensure(&ctx.client, &namespace::build(NAMESPACE, labels::module_labels(MODULE))).await?;
    client::ensure(
        &ctx.client,
        &olm::operator_group(NAMESPACE, NAMESPACE, labels::module_labels(MODULE), &[]),
    )
    .await?;

    let subscription = olm::subscription(
        SUBSCRIPTION,
        NAMESPACE,
        MODULE,
        SUBSCRIPTION,
        hub,
        olm::CatalogSource::Certified,
    );
    gate!(install_operator(ctx, &subscription, &hub.cluster_service_version).await?);
    gate!(wait_for_deployment(ctx, OPERATOR_DEPLOYMENT, NAMESPACE).await?);

    let instance = CertManager {
        metadata: object_meta(INSTANCE, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: Default::default(),
    };
    client::ensure(&ctx.client, &instance).await?;

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    client::delete_if_exists::<C, CertManager>(&ctx.client, INSTANCE, Some(NAMESPACE)).await?;
    uninstall_operator(ctx, SUBSCRIPTION, NAMESPACE).await?;
    client::delete_if_exists::<C, OperatorGroup>(&ctx.client, NAMESPACE, Some(NAMESPACE)).await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;
    Ok(())
}
