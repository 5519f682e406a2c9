//! Per-user staging projects and the three role bindings each learner needs in it.

use super::Outcome;
use crate::{
    client::ObjectClient,
    crds::Workshop,
    error::Result,
    identity,
    reconciler::{
        fanout::{self, DesiredObject},
        Context,
    },
    resources::{labels, namespace, owner_for, rbac},
};

const MODULE: &str = "project";

/// Namespace and role bindings of one learner, namespace first
pub fn user_objects(workshop: &Workshop, index: u32) -> Vec<DesiredObject> {
    let username = identity::username(index);
    let project = identity::staging_project(workshop, index);
    let owner = owner_for(workshop, &project);
    let labels = labels::module_labels(MODULE);

    vec![
        namespace::build(&project, labels.clone()).into(),
        rbac::role_binding(
            &format!("{}-project", username),
            &project,
            labels.clone(),
            rbac::cluster_role_ref("edit"),
            vec![rbac::user_subject(&username)],
            owner.as_ref(),
        )
        .into(),
        rbac::role_binding(
            &format!("{}-default", username),
            &project,
            labels.clone(),
            rbac::cluster_role_ref("view"),
            vec![rbac::service_account_subject("default", &project)],
            owner.as_ref(),
        )
        .into(),
        rbac::role_binding(
            &format!("{}-argocd", username),
            &project,
            labels,
            rbac::cluster_role_ref("edit"),
            vec![rbac::user_subject(&identity::argocd_controller_user())],
            owner.as_ref(),
        )
        .into(),
    ]
}

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
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
    Ok(())
}
