//! Fixtures shared by the module and reconciler tests.

use crate::{
    client::memory::MemoryClient,
    config::ControllerConfig,
    crds::{
        ConsoleConfig, ConsoleConfigStatus, IngressConfig, Subscription, SubscriptionSpec,
        SubscriptionStatus, SecurityContextConstraints,
    },
    external::fake::FakeServices,
    reconciler::{Context, Environment},
    resources::scc,
    telemetry::Metrics,
};
use std::sync::Arc;

pub const APPS: &str = "apps.cluster.example.com";

pub fn env() -> Environment {
    Environment {
        apps_hostname_suffix: APPS.to_string(),
        console_url: format!("https://console-openshift-console.{}", APPS),
    }
}

/// Context over an empty in-memory cluster that already carries the OpenShift
/// singletons: ingress and console configuration, `privileged` and `anyuid` SCCs
pub fn context() -> (Context<MemoryClient>, Arc<FakeServices>) {
    let client = MemoryClient::new();

    let mut ingress = IngressConfig::new("cluster", Default::default());
    ingress.spec.domain = APPS.to_string();
    client.insert(&ingress);

    let mut console = ConsoleConfig::new("cluster", Default::default());
    console.status = Some(ConsoleConfigStatus {
        console_url: env().console_url,
    });
    client.insert(&console);

    for name in [scc::PRIVILEGED, scc::ANYUID] {
        let mut constraints = SecurityContextConstraints::new(name);
        constraints.users = Some(vec!["system:admin".to_string()]);
        client.insert(&constraints);
    }

    let external = Arc::new(FakeServices::default());
    let ctx = Context {
        client,
        external: external.clone(),
        config: Arc::new(ControllerConfig::default()),
        metrics: Arc::new(Metrics::default()),
    };
    (ctx, external)
}

/// Seed a subscription whose operator version is already installed
pub fn installed_subscription(client: &MemoryClient, name: &str, namespace: &str, csv: &str) {
    let mut sub = Subscription::new(
        name,
        SubscriptionSpec {
            name: name.to_string(),
            ..Default::default()
        },
    );
    sub.metadata.namespace = Some(namespace.to_string());
    sub.status = Some(SubscriptionStatus {
        installed_csv: Some(csv.to_string()),
        current_csv: Some(csv.to_string()),
        ..Default::default()
    });
    client.insert(&sub);
}
