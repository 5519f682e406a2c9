use super::{gate, install_operator, uninstall_operator, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{OperatorGroup, Workshop},
    error::Result,
    reconciler::Context,
    resources::{labels, namespace, olm},
};
use k8s_openapi::api::core::v1::Namespace;

const MODULE: &str = "serverless";

const OPERATOR_NAMESPACE: &str = "openshift-serverless";
const SERVING_NAMESPACE: &str = "knative-serving";
const EVENTING_NAMESPACE: &str = "knative-eventing";
const SUBSCRIPTION: &str = "serverless-operator";

const NAMESPACES: [&str; 3] = [OPERATOR_NAMESPACE, SERVING_NAMESPACE, EVENTING_NAMESPACE];

/// Installs the Serverless operator and the namespaces Knative Serving and
/// Eventing live in. The Knative instances themselves are not created here.
pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let hub = &workshop.spec.infrastructure.serverless.operator_hub;

    for ns in NAMESPACES {
        client::ensure(&ctx.client, &namespace::build(ns, labels::module_labels(MODULE))).await?;
    }
    client::ensure(
        &ctx.client,
        &olm::operator_group(
            OPERATOR_NAMESPACE,
            OPERATOR_NAMESPACE,
            labels::module_labels(MODULE),
            &[],
        ),
    )
    .await?;

    let subscription = olm::subscription(
        SUBSCRIPTION,
        OPERATOR_NAMESPACE,
        MODULE,
        SUBSCRIPTION,
        hub,
        olm::CatalogSource::RedHat,
    );
    gate!(install_operator(ctx, &subscription, &hub.cluster_service_version).await?);

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    uninstall_operator(ctx, SUBSCRIPTION, OPERATOR_NAMESPACE).await?;
    client::delete_if_exists::<C, OperatorGroup>(&ctx.client, OPERATOR_NAMESPACE, Some(OPERATOR_NAMESPACE))
        .await?;
    for ns in NAMESPACES.iter().rev() {
        client::delete_if_exists::<C, Namespace>(&ctx.client, ns, None).await?;
    }
    Ok(())
}
