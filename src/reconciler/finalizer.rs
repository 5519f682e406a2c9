use super::{update_status, was_installed, Context, FINALIZER};
use crate::{
    client::ObjectClient,
    crds::{Condition, ConditionStatus, Workshop},
    date_time::DateTime,
    error::{Error, Result},
    modules,
};
use kube::{runtime::controller::Action, ResourceExt};
use tracing::{debug, info};

/// Run the delete pipeline of every module this Workshop enabled or installed, in
/// reverse install order, then release the Workshop. Modules it never touched are
/// left alone: their namespaces and operators may belong to someone else. Each
/// pipeline skips what is already gone, so an interrupted cleanup resumes where
/// it stopped.
pub async fn cleanup<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Action> {
    info!("Cleaning up Workshop {}", workshop.name_any());

    if !workshop.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(Action::await_change());
    }

    let current = workshop.status.clone().unwrap_or_default();
    for kind in modules::deletion_order() {
        if !kind.enabled(workshop) && !was_installed(&current, kind) {
            debug!("Module {} was never installed, skipping", kind);
            continue;
        }
        if let Err(e) = modules::delete(kind, workshop, ctx).await {
            let mut status = current.clone();
            status.set_condition(Condition {
                r#type: kind.name().to_string(),
                status: ConditionStatus::False,
                last_transition_time: Some(DateTime::now()),
                reason: Some("RemovalFailed".to_string()),
                message: Some(e.to_string()),
            });
            update_status(workshop, ctx, status).await?;
            return Err(e);
        }
        ctx.metrics.record_deletion();
    }

    remove_finalizer(workshop, ctx).await?;
    Ok(Action::await_change())
}

async fn remove_finalizer<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let mut finalizers = workshop.finalizers().to_vec();
    finalizers.retain(|f| f != FINALIZER);

    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers
        }
    });

    ctx.client
        .merge_patch::<Workshop>(&workshop.name_any(), workshop.namespace().as_deref(), &patch)
        .await
        .map_err(|e| Error::FinalizerError(e.to_string()))
}
