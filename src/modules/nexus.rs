use super::{ansible_operator::AnsibleOperator, gate, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{gpte, ImageSpec, Nexus, Workshop},
    error::Result,
    reconciler::Context,
    resources::{labels, object_meta},
};

const MODULE: &str = "nexus";

pub const NAMESPACE: &str = "nexus";
const OPERATOR: &str = "nexus-operator";
const INSTANCE: &str = "nexus";

const DEFAULT_IMAGE: &str = "quay.io/gpte-devops-automation/nexus-operator";
const DEFAULT_TAG: &str = "v0.9";

fn operator(workshop: &Workshop) -> AnsibleOperator<'static> {
    AnsibleOperator {
        module: MODULE,
        namespace: NAMESPACE,
        name: OPERATOR,
        kind: "Nexus",
        plural: "nexus",
        image: workshop
            .spec
            .infrastructure
            .nexus
            .image
            .as_ref()
            .map(ImageSpec::reference)
            .unwrap_or_else(|| format!("{}:{}", DEFAULT_IMAGE, DEFAULT_TAG)),
    }
}

fn instance() -> Nexus {
    Nexus {
        metadata: object_meta(INSTANCE, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: gpte::NexusSpec {
            nexus_volume_size: "10Gi".to_string(),
            nexus_ssl: true,
            nexus_image_tag: "3.20.1-01".to_string(),
            nexus_cpu_request: "1".to_string(),
            nexus_cpu_limit: "2".to_string(),
            nexus_memory_request: "2Gi".to_string(),
            nexus_memory_limit: "2Gi".to_string(),
            ..Default::default()
        },
    }
}

/// Repository manager shared by all learners. Done once the instance exists;
/// the server itself comes up in the background.
pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    gate!(operator(workshop).install(ctx).await?);
    client::ensure(&ctx.client, &instance()).await?;
    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    client::delete_if_exists::<C, Nexus>(&ctx.client, INSTANCE, Some(NAMESPACE)).await?;
    operator(workshop).uninstall(ctx).await
}
