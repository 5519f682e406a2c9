//! The module registry and the helpers every module reconciler shares.
//!
//! A module is one unit of enable/disable on the Workshop. Each module file
//! exposes `reconcile`, which converges its objects toward the Workshop, and
//! `delete`, which removes them again skipping whatever is already gone.

use crate::{
    client::{self, ObjectClient},
    crds::{ClusterServiceVersion, Subscription, Workshop},
    error::Result,
    reconciler::{
        install_plan::{self, Gate},
        Context, Environment,
    },
};
use std::{fmt, time::Duration};
use tracing::info;

mod ansible_operator;
pub mod bookbag;
pub mod certmanager;
pub mod codeready;
pub mod gitea;
pub mod gitops;
pub mod istio_workspace;
pub mod nexus;
pub mod pipeline;
pub mod portal;
pub mod project;
pub mod serverless;
pub mod servicemesh;
pub mod user;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;

/// Result of one module reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Something the module depends on is not ready; try again after the delay
    Requeue(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleKind {
    User,
    Project,
    Portal,
    Bookbag,
    CertManager,
    Pipeline,
    Gitea,
    Nexus,
    GitOps,
    Vault,
    ServiceMesh,
    Serverless,
    IstioWorkspace,
    CodeReady,
}

impl ModuleKind {
    /// Every module, in declaration order
    pub const ALL: [ModuleKind; 14] = [
        ModuleKind::User,
        ModuleKind::Project,
        ModuleKind::Portal,
        ModuleKind::Bookbag,
        ModuleKind::CertManager,
        ModuleKind::Pipeline,
        ModuleKind::Gitea,
        ModuleKind::Nexus,
        ModuleKind::GitOps,
        ModuleKind::Vault,
        ModuleKind::ServiceMesh,
        ModuleKind::Serverless,
        ModuleKind::IstioWorkspace,
        ModuleKind::CodeReady,
    ];

    /// Stable short name, used as the `part-of` label and the condition type
    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::User => "user",
            ModuleKind::Project => "project",
            ModuleKind::Portal => "portal",
            ModuleKind::Bookbag => "bookbag",
            ModuleKind::CertManager => "cert-manager",
            ModuleKind::Pipeline => "pipeline",
            ModuleKind::Gitea => "gitea",
            ModuleKind::Nexus => "nexus",
            ModuleKind::GitOps => "gitops",
            ModuleKind::Vault => "vault",
            ModuleKind::ServiceMesh => "servicemesh",
            ModuleKind::Serverless => "serverless",
            ModuleKind::IstioWorkspace => "istio-workspace",
            ModuleKind::CodeReady => "codeready",
        }
    }

    /// Modules that must run before this one
    pub fn depends_on(self) -> &'static [ModuleKind] {
        match self {
            ModuleKind::Project | ModuleKind::Portal | ModuleKind::Bookbag => &[ModuleKind::User],
            ModuleKind::GitOps => &[ModuleKind::Project, ModuleKind::Gitea],
            ModuleKind::ServiceMesh | ModuleKind::IstioWorkspace => &[ModuleKind::Project],
            ModuleKind::CodeReady => &[ModuleKind::Project, ModuleKind::Gitea],
            ModuleKind::Vault => &[ModuleKind::CertManager],
            _ => &[],
        }
    }

    pub fn enabled(self, workshop: &Workshop) -> bool {
        let infra = &workshop.spec.infrastructure;
        match self {
            ModuleKind::User => infra.user.enabled,
            ModuleKind::Project => infra.project.enabled,
            ModuleKind::Portal => infra.portal.enabled,
            ModuleKind::Bookbag => infra.bookbag.enabled,
            ModuleKind::CertManager => infra.cert_manager.enabled,
            ModuleKind::Pipeline => infra.pipeline.enabled,
            ModuleKind::Gitea => infra.gitea.enabled,
            ModuleKind::Nexus => infra.nexus.enabled,
            ModuleKind::GitOps => infra.git_ops.enabled,
            ModuleKind::Vault => infra.vault.enabled,
            ModuleKind::ServiceMesh => infra.service_mesh.enabled,
            ModuleKind::Serverless => infra.serverless.enabled,
            ModuleKind::IstioWorkspace => infra.istio_workspace.enabled,
            ModuleKind::CodeReady => infra.code_ready_workspace.enabled,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Topological order of the registry, ties broken by declaration order
pub fn install_order() -> Vec<ModuleKind> {
    let mut order: Vec<ModuleKind> = Vec::with_capacity(ModuleKind::ALL.len());
    while order.len() < ModuleKind::ALL.len() {
        let next = ModuleKind::ALL.iter().copied().find(|kind| {
            !order.contains(kind) && kind.depends_on().iter().all(|dep| order.contains(dep))
        });
        match next {
            Some(kind) => order.push(kind),
            // the registry is acyclic; keep whatever is left in declaration order
            None => {
                let rest: Vec<ModuleKind> = ModuleKind::ALL
                    .iter()
                    .copied()
                    .filter(|k| !order.contains(k))
                    .collect();
                order.extend(rest);
            }
        }
    }
    order
}

pub fn deletion_order() -> Vec<ModuleKind> {
    let mut order = install_order();
    order.reverse();
    order
}

pub async fn reconcile<C: ObjectClient>(
    kind: ModuleKind,
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<Outcome> {
    info!("Reconciling module {}", kind);
    match kind {
        ModuleKind::User => user::reconcile(workshop, ctx).await,
        ModuleKind::Project => project::reconcile(workshop, ctx).await,
        ModuleKind::Portal => portal::reconcile(workshop, env, ctx).await,
        ModuleKind::Bookbag => bookbag::reconcile(workshop, env, ctx).await,
        ModuleKind::CertManager => certmanager::reconcile(workshop, ctx).await,
        ModuleKind::Pipeline => pipeline::reconcile(workshop, ctx).await,
        ModuleKind::Gitea => gitea::reconcile(workshop, env, ctx).await,
        ModuleKind::Nexus => nexus::reconcile(workshop, ctx).await,
        ModuleKind::GitOps => gitops::reconcile(workshop, ctx).await,
        ModuleKind::Vault => vault::reconcile(workshop, ctx).await,
        ModuleKind::ServiceMesh => servicemesh::reconcile(workshop, ctx).await,
        ModuleKind::Serverless => serverless::reconcile(workshop, ctx).await,
        ModuleKind::IstioWorkspace => istio_workspace::reconcile(workshop, ctx).await,
        ModuleKind::CodeReady => codeready::reconcile(workshop, env, ctx).await,
    }
}

pub async fn delete<C: ObjectClient>(kind: ModuleKind, workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    info!("Deleting module {}", kind);
    match kind {
        ModuleKind::User => user::delete(workshop, ctx).await,
        ModuleKind::Project => project::delete(workshop, ctx).await,
        ModuleKind::Portal => portal::delete(workshop, ctx).await,
        ModuleKind::Bookbag => bookbag::delete(workshop, ctx).await,
        ModuleKind::CertManager => certmanager::delete(workshop, ctx).await,
        ModuleKind::Pipeline => pipeline::delete(workshop, ctx).await,
        ModuleKind::Gitea => gitea::delete(workshop, ctx).await,
        ModuleKind::Nexus => nexus::delete(workshop, ctx).await,
        ModuleKind::GitOps => gitops::delete(workshop, ctx).await,
        ModuleKind::Vault => vault::delete(workshop, ctx).await,
        ModuleKind::ServiceMesh => servicemesh::delete(workshop, ctx).await,
        ModuleKind::Serverless => serverless::delete(workshop, ctx).await,
        ModuleKind::IstioWorkspace => istio_workspace::delete(workshop, ctx).await,
        ModuleKind::CodeReady => codeready::delete(workshop, ctx).await,
    }
}

/// Create the subscription and approve its install plan. Returns a requeue while
/// the subscription has not produced an install plan.
pub async fn install_operator<C: ObjectClient>(
    ctx: &Context<C>,
    subscription: &Subscription,
    expected_csv: &str,
) -> Result<Option<Outcome>> {
    client::ensure(&ctx.client, subscription).await?;

    let name = subscription.metadata.name.as_deref().unwrap_or_default();
    let namespace = subscription.metadata.namespace.as_deref().unwrap_or_default();
    match install_plan::approve(&ctx.client, expected_csv, name, namespace).await? {
        Gate::SubscriptionNotReady => Ok(Some(ctx.waiting(&format!("subscription {}", name)))),
        Gate::Installed | Gate::Approved | Gate::AwaitingInstall => Ok(None),
    }
}

/// Requeue unless the named deployment reports all replicas available
pub async fn wait_for_deployment<C: ObjectClient>(
    ctx: &Context<C>,
    name: &str,
    namespace: &str,
) -> Result<Option<Outcome>> {
    if ctx.client.deployment_ready(name, namespace).await? {
        Ok(None)
    } else {
        Ok(Some(ctx.waiting(&format!("deployment {}/{}", namespace, name))))
    }
}

/// Delete the CSV a subscription installed, then the subscription. A
/// subscription that is already gone names no CSV, so nothing else is deleted.
pub async fn uninstall_operator<C: ObjectClient>(
    ctx: &Context<C>,
    subscription: &str,
    namespace: &str,
) -> Result<()> {
    let Some(sub) = ctx
        .client
        .get::<Subscription>(subscription, Some(namespace))
        .await?
    else {
        return Ok(());
    };

    let csv = sub
        .status
        .as_ref()
        .and_then(|s| s.installed_csv.clone().or_else(|| s.current_csv.clone()));
    if let Some(csv) = csv {
        client::delete_if_exists::<C, ClusterServiceVersion>(&ctx.client, &csv, Some(namespace))
            .await?;
    }
    client::delete_if_exists::<C, Subscription>(&ctx.client, subscription, Some(namespace)).await?;
    Ok(())
}

/// Bail out of a module reconcile with the given outcome when a gate is closed
macro_rules! gate {
    ($e:expr) => {
        if let Some(outcome) = $e {
            return Ok(outcome);
        }
    };
}
pub(crate) use gate;
