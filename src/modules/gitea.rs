//! Git server for the learners, deployed through the Gitea operator. Every
//! learner gets an account through the server's sign-up form.

use super::{ansible_operator::AnsibleOperator, gate, wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::{gpte, Gitea, ImageSpec, Workshop},
    error::Result,
    external::Registration,
    identity,
    reconciler::{Context, Environment},
    resources::{labels, object_meta, route},
};
use tracing::{debug, info};

const MODULE: &str = "gitea";

pub const NAMESPACE: &str = "gitea";
pub const SERVER: &str = "gitea-server";
const OPERATOR: &str = "gitea-operator";

const DEFAULT_IMAGE: &str = "quay.io/gpte-devops-automation/gitea-operator";
const DEFAULT_TAG: &str = "v0.17";

fn operator(workshop: &Workshop) -> AnsibleOperator<'static> {
    AnsibleOperator {
        module: MODULE,
        namespace: NAMESPACE,
        name: OPERATOR,
        kind: "Gitea",
        plural: "giteas",
        image: workshop
            .spec
            .infrastructure
            .gitea
            .image
            .as_ref()
            .map(ImageSpec::reference)
            .unwrap_or_else(|| format!("{}:{}", DEFAULT_IMAGE, DEFAULT_TAG)),
    }
}

/// Public address of the Git server
pub fn url(env: &Environment) -> String {
    format!(
        "https://{}",
        route::default_host(SERVER, NAMESPACE, &env.apps_hostname_suffix)
    )
}

fn server() -> Gitea {
    Gitea {
        metadata: object_meta(SERVER, Some(NAMESPACE), labels::module_labels(MODULE), None),
        spec: gpte::GiteaSpec {
            gitea_volume_size: "4Gi".to_string(),
            gitea_ssl: true,
            postgresql_volume_size: "4Gi".to_string(),
            ..Default::default()
        },
    }
}

pub async fn reconcile<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<Outcome> {
    gate!(operator(workshop).install(ctx).await?);

    client::ensure(&ctx.client, &server()).await?;
    gate!(wait_for_deployment(ctx, SERVER, NAMESPACE).await?);

    let url = url(env);
    let mut created = 0;
    for index in identity::user_indices(workshop) {
        let username = identity::username(index);
        let email = format!("{}@example.com", username);
        match ctx
            .external
            .gitea_sign_up(&url, &username, &email, &workshop.spec.user_password)
            .await?
        {
            Registration::Created => created += 1,
            Registration::AlreadyExists => debug!("Gitea user {} already exists", username),
        }
    }
    if created > 0 {
        info!("Created {} Gitea users", created);
    }

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    client::delete_if_exists::<C, Gitea>(&ctx.client, SERVER, Some(NAMESPACE)).await?;
    operator(workshop).uninstall(ctx).await
}
