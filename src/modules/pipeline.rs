use super::{gate, install_operator, uninstall_operator, Outcome};
use crate::{
    client::ObjectClient,
    crds::Workshop,
    error::Result,
    reconciler::Context,
    resources::olm,
};

const MODULE: &str = "pipeline";
const SUBSCRIPTION: &str = "openshift-pipelines-operator-rh";

/// Pipelines only needs its operator, installed cluster-wide
pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.pipeline.operator_hub;
    let subscription = olm::subscription(
        SUBSCRIPTION,
        &ctx.config.operators_namespace,
        MODULE,
        SUBSCRIPTION,
        hub,
        olm::CatalogSource::RedHat,
    );
    gate!(install_operator(ctx, &subscription, &hub.cluster_service_version).await?);
    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    uninstall_operator(ctx, SUBSCRIPTION, &ctx.config.operators_namespace).await
}
