use crate::{
    client::ObjectClient,
    crds::{InstallPlan, Subscription},
    error::Result,
};
use tracing::{debug, info};

/// Where an operator subscription stands with respect to its expected version
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The expected version (or any version, when none is pinned) is installed
    Installed,
    /// The pending install plan was approved by this call
    Approved,
    /// An install plan exists but is already approved or targets another version
    AwaitingInstall,
    /// The subscription has no install plan yet
    SubscriptionNotReady,
}

fn installed(subscription: &Subscription, expected_csv: &str) -> bool {
    let Some(installed) = subscription
        .status
        .as_ref()
        .and_then(|s| s.installed_csv.as_deref())
        .filter(|csv| !csv.is_empty())
    else {
        return false;
    };
    expected_csv.is_empty() || installed == expected_csv
}

/// Approve the install plan of `subscription` that installs `expected_csv`. An
/// empty `expected_csv` accepts whatever version the plan carries. This never
/// waits for the operator itself to become ready.
pub async fn approve<C: ObjectClient>(
    client: &C,
    expected_csv: &str,
    subscription: &str,
    namespace: &str,
) -> Result<Gate> {
    let Some(sub) = client
        .get::<Subscription>(subscription, Some(namespace))
        .await?
    else {
        return Ok(Gate::SubscriptionNotReady);
    };

    if installed(&sub, expected_csv) {
        debug!("Subscription {}/{} is installed", namespace, subscription);
        return Ok(Gate::Installed);
    }

    let Some(plan_ref) = sub.status.as_ref().and_then(|s| s.install_plan_ref.as_ref()) else {
        info!("Subscription {}/{} has no install plan yet", namespace, subscription);
        return Ok(Gate::SubscriptionNotReady);
    };
    let plan_namespace = plan_ref.namespace.as_deref().unwrap_or(namespace);
    let Some(mut plan) = client
        .get::<InstallPlan>(&plan_ref.name, Some(plan_namespace))
        .await?
    else {
        return Ok(Gate::SubscriptionNotReady);
    };

    let targets_expected = expected_csv.is_empty()
        || plan
            .spec
            .cluster_service_version_names
            .iter()
            .any(|csv| csv == expected_csv);
    if !targets_expected || plan.spec.approved {
        return Ok(Gate::AwaitingInstall);
    }

    info!(
        "Approving install plan {}/{} for {}",
        plan_namespace, plan_ref.name, subscription
    );
    plan.spec.approved = true;
    client.update(&plan).await?;
    Ok(Gate::Approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::memory::MemoryClient,
        crds::{InstallPlanReference, InstallPlanSpec, SubscriptionSpec, SubscriptionStatus},
    };

    const NS: &str = "openshift-operators";

    fn subscription(status: Option<SubscriptionStatus>) -> Subscription {
        let mut sub = Subscription::new("pkg", SubscriptionSpec::default());
        sub.metadata.namespace = Some(NS.to_string());
        sub.status = status;
        sub
    }

    fn plan(csvs: &[&str], approved: bool) -> InstallPlan {
        let mut plan = InstallPlan::new(
            "install-abc",
            InstallPlanSpec {
                cluster_service_version_names: csvs.iter().map(|s| s.to_string()).collect(),
                approval: "Manual".to_string(),
                approved,
                ..Default::default()
            },
        );
        plan.metadata.namespace = Some(NS.to_string());
        plan
    }

    fn pending() -> SubscriptionStatus {
        SubscriptionStatus {
            install_plan_ref: Some(InstallPlanReference {
                name: "install-abc".to_string(),
                namespace: Some(NS.to_string()),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_plan_ref_is_not_ready() {
        let client = MemoryClient::new();
        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::SubscriptionNotReady
        );

        client.insert(&subscription(None));
        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::SubscriptionNotReady
        );
    }

    #[tokio::test]
    async fn test_approves_matching_plan_once() {
        let client = MemoryClient::new();
        client.insert(&subscription(Some(pending())));
        client.insert(&plan(&["pkg.v1"], false));

        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::Approved
        );
        let stored: InstallPlan = client.fetch("install-abc", Some(NS)).unwrap();
        assert!(stored.spec.approved);
        assert_eq!(stored.spec.approval, "Manual");

        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::AwaitingInstall
        );
        assert_eq!(client.update_count::<InstallPlan>("install-abc", Some(NS)), 1);
    }

    #[tokio::test]
    async fn test_plan_for_other_version_is_left_alone() {
        let client = MemoryClient::new();
        client.insert(&subscription(Some(pending())));
        client.insert(&plan(&["pkg.v2"], false));

        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::AwaitingInstall
        );
        let stored: InstallPlan = client.fetch("install-abc", Some(NS)).unwrap();
        assert!(!stored.spec.approved);
    }

    #[tokio::test]
    async fn test_noop_once_installed() {
        let client = MemoryClient::new();
        let mut status = pending();
        status.installed_csv = Some("pkg.v1".to_string());
        client.insert(&subscription(Some(status)));
        client.insert(&plan(&["pkg.v1"], false));

        assert_eq!(
            approve(&client, "pkg.v1", "pkg", NS).await.unwrap(),
            Gate::Installed
        );
        assert_eq!(
            approve(&client, "", "pkg", NS).await.unwrap(),
            Gate::Installed
        );
        assert_eq!(client.update_count::<InstallPlan>("install-abc", Some(NS)), 0);
    }
}
