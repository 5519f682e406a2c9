use crate::{
    client::{KubeObjectClient, ObjectClient},
    config::ControllerConfig,
    crds::{Condition, ConditionStatus, ConsoleConfig, IngressConfig, Workshop, WorkshopStatus},
    date_time::DateTime,
    error::{Error, Result},
    external::ExternalServices,
    modules::{self, ModuleKind, Outcome},
    telemetry::Metrics,
};
use kube::{runtime::controller::Action, Resource, ResourceExt};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, instrument, warn};

pub mod fanout;
pub mod finalizer;
pub mod install_plan;

pub const FINALIZER: &str = "workshop.openshiftlabs.io/finalizer";

/// Name of the cluster-wide OpenShift configuration singletons
const CLUSTER_CONFIG: &str = "cluster";

pub struct Context<C = KubeObjectClient> {
    pub client: C,
    pub external: Arc<dyn ExternalServices>,
    pub config: Arc<ControllerConfig>,
    pub metrics: Arc<Metrics>,
}

impl<C: ObjectClient> Context<C> {
    /// Requeue after the configured delay because `what` is not ready yet
    pub fn waiting(&self, what: &str) -> Outcome {
        info!("Waiting for {}", what);
        Outcome::Requeue(self.config.requeue_delay)
    }
}

/// Facts about the cluster every module may need, read once per reconciliation
#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    /// Wildcard domain routes are exposed on, e.g. `apps.cluster.example.com`
    pub apps_hostname_suffix: String,
    pub console_url: String,
}

impl Environment {
    pub async fn read<C: ObjectClient>(client: &C) -> Result<Self> {
        let ingress = client
            .get::<IngressConfig>(CLUSTER_CONFIG, None)
            .await?
            .ok_or_else(|| Error::missing("Ingress", CLUSTER_CONFIG))?;
        let console = client
            .get::<ConsoleConfig>(CLUSTER_CONFIG, None)
            .await?
            .ok_or_else(|| Error::missing("Console", CLUSTER_CONFIG))?;

        let apps_hostname_suffix = ingress.spec.domain;
        if apps_hostname_suffix.is_empty() {
            return Err(Error::missing("Ingress domain", CLUSTER_CONFIG));
        }
        let console_url = console.status.map(|s| s.console_url).unwrap_or_default();
        if console_url.is_empty() {
            return Err(Error::missing("Console URL", CLUSTER_CONFIG));
        }

        Ok(Self {
            apps_hostname_suffix,
            console_url,
        })
    }
}

#[instrument(skip(ctx, workshop), fields(workshop = %workshop.name_any(), namespace = %workshop.namespace().unwrap_or_default()))]
pub async fn reconcile<C: ObjectClient>(workshop: Arc<Workshop>, ctx: Arc<Context<C>>) -> Result<Action> {
    info!("Reconciling Workshop {}", workshop.name_any());
    ctx.metrics.record_reconcile();

    // Handle deletion
    if workshop.meta().deletion_timestamp.is_some() {
        return finalizer::cleanup(&workshop, &ctx).await;
    }

    // Ensure finalizer
    if !workshop.finalizers().iter().any(|f| f == FINALIZER) {
        return add_finalizer(&workshop, &ctx).await;
    }

    if workshop.spec.user_count == 0 {
        return Err(Error::InvalidWorkshop(
            "userCount must be at least 1".to_string(),
        ));
    }

    let env = Environment::read(&ctx.client).await?;
    let mut status = workshop.status.clone().unwrap_or_default();
    let result = dispatch(&workshop, &env, &ctx, &mut status).await;

    // conditions are written on every path, including errors
    update_status(&workshop, &ctx, status).await?;

    match result? {
        Outcome::Done => Ok(Action::requeue(ctx.config.resync_interval)),
        Outcome::Requeue(delay) => Ok(Action::requeue(delay)),
    }
}

/// Remove disabled modules this Workshop installed, then run every enabled
/// module in install order. Stops at the first requeue or error.
async fn dispatch<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
    status: &mut WorkshopStatus,
) -> Result<Outcome> {
    for kind in modules::deletion_order() {
        if kind.enabled(workshop) || !was_installed(status, kind) {
            continue;
        }
        info!("Module {} was disabled, removing it", kind);
        match modules::delete(kind, workshop, ctx).await {
            Ok(()) => {
                ctx.metrics.record_deletion();
                status.set_condition(condition(kind, ConditionStatus::False, "Removed", None));
            }
            Err(e) => {
                status.set_condition(condition(
                    kind,
                    ConditionStatus::False,
                    "RemovalFailed",
                    Some(e.to_string()),
                ));
                return Err(e);
            }
        }
    }

    for kind in modules::install_order() {
        if !kind.enabled(workshop) {
            continue;
        }
        match modules::reconcile(kind, workshop, env, ctx).await {
            Ok(Outcome::Done) => {
                status.set_condition(condition(kind, ConditionStatus::True, "Reconciled", None));
            }
            Ok(Outcome::Requeue(delay)) => {
                ctx.metrics.record_requeue(kind.name());
                status.set_condition(condition(kind, ConditionStatus::Unknown, "Waiting", None));
                return Ok(Outcome::Requeue(delay));
            }
            Err(e) => {
                warn!("Module {} failed: {}", kind, e);
                status.set_condition(condition(
                    kind,
                    ConditionStatus::False,
                    "Failed",
                    Some(e.to_string()),
                ));
                return Err(e);
            }
        }
    }

    Ok(Outcome::Done)
}

/// True if the module reported any condition other than `Removed`, i.e. this
/// Workshop attempted to install it
pub fn was_installed(status: &WorkshopStatus, kind: ModuleKind) -> bool {
    status
        .condition(kind.name())
        .map(|c| c.reason.as_deref() != Some("Removed"))
        .unwrap_or(false)
}

fn condition(
    kind: ModuleKind,
    status: ConditionStatus,
    reason: &str,
    message: Option<String>,
) -> Condition {
    Condition {
        r#type: kind.name().to_string(),
        status,
        last_transition_time: Some(DateTime::now()),
        reason: Some(reason.to_string()),
        message,
    }
}

async fn add_finalizer<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Action> {
    let mut finalizers = workshop.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());

    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers
        }
    });

    ctx.client
        .merge_patch::<Workshop>(&workshop.name_any(), workshop.namespace().as_deref(), &patch)
        .await?;

    Ok(Action::requeue(Duration::from_secs(1)))
}

/// Helper to update status
pub async fn update_status<C: ObjectClient>(
    workshop: &Workshop,
    ctx: &Context<C>,
    mut status: WorkshopStatus,
) -> Result<()> {
    status.observed_generation = workshop.meta().generation;

    let patch = serde_json::json!({
        "status": status
    });

    ctx.client
        .merge_patch_status::<Workshop>(&workshop.name_any(), workshop.namespace().as_deref(), &patch)
        .await
}

/// Error handling for reconciliation
pub fn error_policy<C: ObjectClient>(_workshop: Arc<Workshop>, error: &Error, ctx: Arc<Context<C>>) -> Action {
    error!("[*] Reconciliation error: {:?}", error);
    ctx.metrics.record_error();

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(10))
    } else {
        Action::requeue(Duration::from_secs(300))
    }
}
