//! Landing page handing out learner accounts, backed by a small redis. Lives in the
//! Workshop's own namespace, so everything here is owned by the Workshop.

use super::Outcome;
use crate::{
    client::{self, ObjectClient},
    crds::{ImageSpec, Route, Workshop},
    error::{Error, Result},
    reconciler::{Context, Environment},
    resources::{deployment, labels, owner_for, route, secret, service, storage},
};
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{
            PersistentVolumeClaim, PersistentVolumeClaimVolumeSource, Secret, Service, Volume,
            VolumeMount,
        },
    },
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::ResourceExt;
use std::collections::BTreeMap;

const MODULE: &str = "portal";

pub const PORTAL: &str = "portal";
pub const REDIS: &str = "redis";
const REDIS_PASSWORD_KEY: &str = "database-password";

const PORTAL_PORT: i32 = 8080;
const REDIS_PORT: i32 = 6379;

const DEFAULT_IMAGE: &str = "quay.io/openshiftlabs/username-distribution:1.4";
const DEFAULT_REDIS_IMAGE: &str = "registry.redhat.io/rhel8/redis-5:1";

fn workshop_namespace(workshop: &Workshop) -> Result<String> {
    workshop
        .namespace()
        .ok_or_else(|| Error::InvalidWorkshop("Workshop has no namespace".to_string()))
}

fn image(spec: Option<&ImageSpec>, default: &str) -> String {
    spec.map(ImageSpec::reference)
        .unwrap_or_else(|| default.to_string())
}

fn redis_deployment(workshop: &Workshop, namespace: &str) -> Deployment {
    let owner = owner_for(workshop, namespace);
    let container = deployment::with_mounts(
        deployment::container(
            REDIS,
            &image(workshop.spec.infrastructure.portal.redis_image.as_ref(), DEFAULT_REDIS_IMAGE),
            vec![deployment::secret_env("REDIS_PASSWORD", REDIS, REDIS_PASSWORD_KEY)],
            &[("redis", REDIS_PORT)],
        ),
        vec![VolumeMount {
            name: "data".to_string(),
            mount_path: "/var/lib/redis/data".to_string(),
            ..Default::default()
        }],
    );
    deployment::build(
        REDIS,
        namespace,
        labels::app_labels(MODULE, REDIS),
        labels::selector_labels(REDIS),
        deployment::PodParams::single(container).with_volumes(vec![Volume {
            name: "data".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: REDIS.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        owner.as_ref(),
    )
}

fn portal_deployment(workshop: &Workshop, env: &Environment, namespace: &str) -> Deployment {
    let owner = owner_for(workshop, namespace);
    let container = deployment::container(
        PORTAL,
        &image(workshop.spec.infrastructure.portal.image.as_ref(), DEFAULT_IMAGE),
        vec![
            deployment::env("LAB_TITLE", workshop.name_any()),
            deployment::env("LAB_USER_COUNT", workshop.spec.user_count.to_string()),
            deployment::env("LAB_USER_PASS", workshop.spec.user_password.clone()),
            deployment::env("LAB_USER_PREFIX", crate::identity::USER_PREFIX),
            deployment::env("LAB_MODULE_URLS", env.console_url.clone()),
            deployment::env("LAB_EXTRA_URLS", env.apps_hostname_suffix.clone()),
            deployment::env("REDIS_SERVER", REDIS),
            deployment::secret_env("REDIS_PASSWORD", REDIS, REDIS_PASSWORD_KEY),
        ],
        &[("http", PORTAL_PORT)],
    );
    deployment::build(
        PORTAL,
        namespace,
        labels::app_labels(MODULE, PORTAL),
        labels::selector_labels(PORTAL),
        deployment::PodParams::single(container),
        owner.as_ref(),
    )
}

pub async fn reconcile<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<Outcome> {
    let namespace = workshop_namespace(workshop)?;
    let ns = namespace.as_str();
    let owner = owner_for(workshop, ns);

    // the password is generated on first creation and never rotated
    let password = secret::opaque(
        REDIS,
        ns,
        labels::app_labels(MODULE, REDIS),
        BTreeMap::from([(REDIS_PASSWORD_KEY.to_string(), uuid::Uuid::new_v4().to_string())]),
        owner.as_ref(),
    );
    client::ensure(&ctx.client, &password).await?;
    client::ensure(
        &ctx.client,
        &storage::claim(REDIS, Some(ns), labels::app_labels(MODULE, REDIS), "512Mi", owner.as_ref())?,
    )
    .await?;
    deployment::apply_tracked(&ctx.client, &redis_deployment(workshop, ns)).await?;
    client::ensure(
        &ctx.client,
        &service::build(
            REDIS,
            ns,
            labels::app_labels(MODULE, REDIS),
            labels::selector_labels(REDIS),
            vec![service::port("redis", REDIS_PORT, REDIS_PORT)],
            owner.as_ref(),
        ),
    )
    .await?;

    deployment::apply_tracked(&ctx.client, &portal_deployment(workshop, env, ns)).await?;
    client::ensure(
        &ctx.client,
        &service::build(
            PORTAL,
            ns,
            labels::app_labels(MODULE, PORTAL),
            labels::selector_labels(PORTAL),
            vec![service::port("http", PORTAL_PORT, PORTAL_PORT)],
            owner.as_ref(),
        ),
    )
    .await?;
    client::ensure(
        &ctx.client,
        &route::build(
            PORTAL,
            ns,
            labels::app_labels(MODULE, PORTAL),
            PORTAL,
            IntOrString::Int(PORTAL_PORT),
            Some(route::edge_tls()),
            owner.as_ref(),
        ),
    )
    .await?;

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    let namespace = workshop_namespace(workshop)?;
    let ns = Some(namespace.as_str());

    client::delete_if_exists::<C, Route>(&ctx.client, PORTAL, ns).await?;
    client::delete_if_exists::<C, Service>(&ctx.client, PORTAL, ns).await?;
    client::delete_if_exists::<C, Deployment>(&ctx.client, PORTAL, ns).await?;
    client::delete_if_exists::<C, Service>(&ctx.client, REDIS, ns).await?;
    client::delete_if_exists::<C, Deployment>(&ctx.client, REDIS, ns).await?;
    client::delete_if_exists::<C, PersistentVolumeClaim>(&ctx.client, REDIS, ns).await?;
    client::delete_if_exists::<C, Secret>(&ctx.client, REDIS, ns).await?;
    Ok(())
}
