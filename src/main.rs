use futures::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Secret, Service},
};
use kube::{
    runtime::{controller::Controller, watcher::Config as WatcherConfig},
    Api, Client,
};
use std::sync::Arc;
use tracing::{debug, info};
use workshop_operator::{
    client::KubeObjectClient,
    config::ControllerConfig,
    crds::{Route, Workshop},
    external::HttpServices,
    reconciler::{self, Context},
    telemetry::{self, Metrics},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let metrics = Arc::new(Metrics::default());

    info!("Starting Workshop Operator");
    let config = Arc::new(ControllerConfig::from_env()?);
    info!("Configuration loaded");
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let ctx = Arc::new(Context {
        client: KubeObjectClient::new(client.clone(), &config.field_manager),
        external: Arc::new(HttpServices::new(config.http_timeout)?),
        config,
        metrics,
    });

    let workshops = Api::<Workshop>::all(client.clone());

    // children owned by a Workshop live in its namespace (portal, guides in the
    // same namespace). changes to them re-trigger the parent
    let deployments = Api::<Deployment>::all(client.to_owned());
    let services = Api::<Service>::all(client.to_owned());
    let secrets = Api::<Secret>::all(client.to_owned());
    let config_maps = Api::<ConfigMap>::all(client.to_owned());
    let routes = Api::<Route>::all(client.to_owned());

    info!("Starting controller loop");
    Controller::new(workshops, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .owns(secrets, WatcherConfig::default())
        .owns(config_maps, WatcherConfig::default())
        .owns(routes, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconciler::reconcile, reconciler::error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled: {:?}", o),
                // if the object cannot be found it was likely deleted. we can ignore this.
                Err(kube::runtime::controller::Error::ObjectNotFound(_)) => {}
                Err(e) => tracing::warn!("[!] Reconciliation error: {:?}", e),
            }
        })
        .await;

    Ok(())
}
