//! Per-user guide (bookbag) pods in the shared `workshop-guides` namespace.

use super::Outcome;
use crate::{
    client::{self, ObjectClient},
    crds::{ImageSpec, Workshop},
    error::Result,
    identity,
    reconciler::{
        fanout::{self, DesiredObject},
        Context, Environment,
    },
    resources::{configmap, deployment, labels, namespace, owner_for, rbac, route, service},
};
use k8s_openapi::{
    api::core::v1::{ConfigMapVolumeSource, Namespace, Volume, VolumeMount},
    apimachinery::pkg::util::intstr::IntOrString,
};
use std::collections::BTreeMap;

const MODULE: &str = "bookbag";

pub const NAMESPACE: &str = "workshop-guides";
pub const PORT: i32 = 10080;

const DEFAULT_IMAGE: &str = "quay.io/openshiftlabs/workshop-dashboard";
const DEFAULT_TAG: &str = "5.0.0";

pub fn name(index: u32) -> String {
    format!("{}-bookbag", identity::username(index))
}

fn image(workshop: &Workshop) -> String {
    workshop
        .spec
        .infrastructure
        .bookbag
        .image
        .as_ref()
        .map(ImageSpec::reference)
        .unwrap_or_else(|| format!("{}:{}", DEFAULT_IMAGE, DEFAULT_TAG))
}

/// Variables the guide content renders, as a JSON document
fn workshop_vars(workshop: &Workshop, env: &Environment, index: u32) -> String {
    serde_json::json!({
        "user": identity::username(index),
        "password": workshop.spec.user_password,
        "project": identity::staging_project(workshop, index),
        "console_url": env.console_url,
        "apps_hostname_suffix": env.apps_hostname_suffix,
        "gitea_url": format!("https://gitea-server-gitea.{}", env.apps_hostname_suffix),
        "codeready_url": format!("https://codeready-workspaces.{}", env.apps_hostname_suffix),
    })
    .to_string()
}

/// Guide objects of one learner, in creation order
pub fn user_objects(workshop: &Workshop, env: &Environment, index: u32) -> Vec<DesiredObject> {
    let name = name(index);
    let env_name = format!("{}-env", name);
    let vars_name = format!("{}-vars", name);
    let owner = owner_for(workshop, NAMESPACE);
    let labels = labels::app_labels(MODULE, &name);

    let env_config = configmap::build(
        &env_name,
        NAMESPACE,
        labels.clone(),
        BTreeMap::from([
            ("gateway.sh".to_string(), String::new()),
            ("terminal.sh".to_string(), String::new()),
            ("workshop.sh".to_string(), String::new()),
        ]),
        owner.as_ref(),
    );
    let vars_config = configmap::build(
        &vars_name,
        NAMESPACE,
        labels.clone(),
        BTreeMap::from([(
            "workshop-vars.json".to_string(),
            workshop_vars(workshop, env, index),
        )]),
        owner.as_ref(),
    );

    let container = deployment::with_mounts(
        deployment::container(
            "bookbag",
            &image(workshop),
            vec![
                deployment::env("APPLICATION_NAME", name.clone()),
                deployment::env("AUTH_USERNAME", "*"),
                deployment::env("AUTH_PASSWORD", ""),
                deployment::env("CLUSTER_SUBDOMAIN", env.apps_hostname_suffix.clone()),
                deployment::env("OAUTH_SERVICE_ACCOUNT", name.clone()),
                deployment::env("CONSOLE_URL", env.console_url.clone()),
                deployment::env("PROJECT_NAMESPACE", identity::staging_project(workshop, index)),
                deployment::env("WORKSHOP_VARS_FILE", "/var/run/workshop-vars/workshop-vars.json"),
            ],
            &[("http", PORT)],
        ),
        vec![
            VolumeMount {
                name: "envvars".to_string(),
                mount_path: "/opt/workshop/envvars".to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: "workshop-vars".to_string(),
                mount_path: "/var/run/workshop-vars".to_string(),
                ..Default::default()
            },
        ],
    );
    let volumes = vec![config_map_volume("envvars", &env_name), config_map_volume("workshop-vars", &vars_name)];

    vec![
        env_config.into(),
        vars_config.into(),
        rbac::service_account(&name, NAMESPACE, labels.clone(), owner.as_ref()).into(),
        rbac::role_binding(
            &name,
            NAMESPACE,
            labels.clone(),
            rbac::cluster_role_ref("admin"),
            vec![rbac::service_account_subject(&name, NAMESPACE)],
            owner.as_ref(),
        )
        .into(),
        deployment::build(
            &name,
            NAMESPACE,
            labels.clone(),
            labels::selector_labels(&name),
            deployment::PodParams::single(container)
                .with_service_account(&name)
                .with_volumes(volumes),
            owner.as_ref(),
        )
        .into(),
        service::build(
            &name,
            NAMESPACE,
            labels.clone(),
            labels::selector_labels(&name),
            vec![service::port("http", PORT, PORT)],
            owner.as_ref(),
        )
        .into(),
        route::build(
            &name,
            NAMESPACE,
            labels,
            &name,
            IntOrString::Int(PORT),
            Some(route::edge_tls()),
            owner.as_ref(),
        )
        .into(),
    ]
}

fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub async fn reconcile<C: ObjectClient>(
    workshop: &Workshop,
    env: &Environment,
    ctx: &Context<C>,
) -> Result<Outcome> {
    client::ensure(&ctx.client, &namespace::build(NAMESPACE, labels::module_labels(MODULE))).await?;

    fanout::apply(&ctx.client, MODULE, workshop.spec.user_count, |i| {
        user_objects(workshop, env, i)
    })
    .await?;
    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    // deletion only needs names, so any environment will do
    let env = Environment {
        apps_hostname_suffix: String::new(),
        console_url: String::new(),
    };
    fanout::remove(&ctx.client, workshop.spec.user_count, |i| {
        user_objects(workshop, &env, i)
    })
    .await?;
    client::delete_if_exists::<C, Namespace>(&ctx.client, NAMESPACE, None).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crds::Route,
        identity::tests::workshop,
        modules::testing::{self, env},
    };
    use k8s_openapi::api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Service, ServiceAccount},
    };

    fn console_url_of(d: &Deployment) -> Option<String> {
        d.spec.as_ref()?.template.spec.as_ref()?.containers[0]
            .env
            .as_ref()?
            .iter()
            .find(|e| e.name == "CONSOLE_URL")?
            .value
            .clone()
    }

    #[tokio::test]
    async fn test_every_user_gets_a_guide() {
        let (ctx, _) = testing::context();
        let ws = workshop(2, "staging");
        reconcile(&ws, &env(), &ctx).await.unwrap();

        for i in 1..=2 {
            let name = name(i);
            let d: Deployment = ctx.client.fetch(&name, Some(NAMESPACE)).unwrap();
            assert_eq!(d.metadata.labels.as_ref().unwrap()[labels::PART_OF], "bookbag");
            assert!(ctx.client.contains::<Service>(&name, Some(NAMESPACE)));
            assert!(ctx.client.contains::<Route>(&name, Some(NAMESPACE)));
            assert!(ctx.client.contains::<ServiceAccount>(&name, Some(NAMESPACE)));
            assert!(ctx.client.contains::<ConfigMap>(&format!("{}-env", name), Some(NAMESPACE)));
            assert!(ctx.client.contains::<ConfigMap>(&format!("{}-vars", name), Some(NAMESPACE)));
        }
        let svc: Service = ctx.client.fetch("user1-bookbag", Some(NAMESPACE)).unwrap();
        assert_eq!(svc.spec.unwrap().ports.unwrap()[0].port, 10080);
    }

    #[tokio::test]
    async fn test_shrinking_user_count_orphans_trailing_guides() {
        let (ctx, _) = testing::context();
        reconcile(&workshop(2, "staging"), &env(), &ctx).await.unwrap();
        assert!(ctx.client.contains::<Deployment>("user1-bookbag", Some(NAMESPACE)));
        assert!(ctx.client.contains::<Deployment>("user2-bookbag", Some(NAMESPACE)));

        reconcile(&workshop(1, "staging"), &env(), &ctx).await.unwrap();
        assert!(ctx.client.contains::<Deployment>("user1-bookbag", Some(NAMESPACE)));
        assert!(ctx.client.contains::<Deployment>("user2-bookbag", Some(NAMESPACE)));
    }

    #[tokio::test]
    async fn test_env_drift_is_restored() {
        let (ctx, _) = testing::context();
        let ws = workshop(1, "staging");
        reconcile(&ws, &env(), &ctx).await.unwrap();

        let mut live: Deployment = ctx.client.fetch("user1-bookbag", Some(NAMESPACE)).unwrap();
        let spec = live.spec.as_mut().unwrap();
        spec.replicas = Some(2);
        let container = &mut spec.template.spec.as_mut().unwrap().containers[0];
        for var in container.env.as_mut().unwrap() {
            if var.name == "CONSOLE_URL" {
                var.value = Some("https://elsewhere".to_string());
            }
        }
        ctx.client.insert(&live);

        reconcile(&ws, &env(), &ctx).await.unwrap();
        let live: Deployment = ctx.client.fetch("user1-bookbag", Some(NAMESPACE)).unwrap();
        assert_eq!(console_url_of(&live), Some(env().console_url));
        assert_eq!(live.spec.unwrap().replicas, Some(2));
    }

    #[tokio::test]
    async fn test_delete_removes_guides_and_namespace() {
        let (ctx, _) = testing::context();
        let ws = workshop(2, "staging");
        reconcile(&ws, &env(), &ctx).await.unwrap();

        delete(&ws, &ctx).await.unwrap();
        delete(&ws, &ctx).await.unwrap();
        assert_eq!(ctx.client.count::<Deployment>(), 0);
        assert_eq!(ctx.client.count::<ConfigMap>(), 0);
        assert!(!ctx.client.contains::<Namespace>(NAMESPACE, None));
    }
}
