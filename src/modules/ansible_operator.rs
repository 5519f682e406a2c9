//! Operators this controller deploys itself rather than through OLM: a CRD, a
//! service account with cluster-wide rights and a single operator deployment.

use super::{wait_for_deployment, Outcome};
use crate::{
    client::{self, ObjectClient},
    crds::gpte,
    error::Result,
    reconciler::Context,
    resources::{crd, deployment, labels, namespace, rbac},
};
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{Namespace, ServiceAccount},
        rbac::v1::{ClusterRole, ClusterRoleBinding},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
};

pub struct AnsibleOperator<'a> {
    pub module: &'a str,
    pub namespace: &'a str,
    /// Name of the service account, cluster role, binding and deployment
    pub name: &'a str,
    pub kind: &'a str,
    pub plural: &'a str,
    pub image: String,
}

impl AnsibleOperator<'_> {
    fn crd_name(&self) -> String {
        format!("{}.{}", self.plural, gpte::GROUP)
    }

    fn cluster_role(&self) -> ClusterRole {
        rbac::cluster_role(
            self.name,
            labels::module_labels(self.module),
            vec![
                rbac::full_access(&[gpte::GROUP], &["*"]),
                rbac::full_access(
                    &[""],
                    &[
                        "pods",
                        "services",
                        "services/finalizers",
                        "endpoints",
                        "persistentvolumeclaims",
                        "events",
                        "configmaps",
                        "secrets",
                        "serviceaccounts",
                    ],
                ),
                rbac::full_access(&["apps"], &["deployments", "daemonsets", "replicasets", "statefulsets"]),
                rbac::full_access(&["route.openshift.io"], &["routes", "routes/custom-host"]),
                rbac::full_access(&["rbac.authorization.k8s.io"], &["roles", "rolebindings"]),
                rbac::rule(&["monitoring.coreos.com"], &["servicemonitors"], &["get", "create"]),
            ],
        )
    }

    fn deployment(&self) -> Deployment {
        let container = deployment::container(
            "operator",
            &self.image,
            vec![
                deployment::env("WATCH_NAMESPACE", ""),
                deployment::env("OPERATOR_NAME", self.name),
                deployment::env("ANSIBLE_GATHERING", "explicit"),
            ],
            &[],
        );
        deployment::build(
            self.name,
            self.namespace,
            labels::app_labels(self.module, self.name),
            labels::selector_labels(self.name),
            deployment::PodParams::single(container).with_service_account(self.name),
            None,
        )
    }

    /// Everything up to a ready operator. Requeues until the operator deployment
    /// is available
    pub async fn install<C: ObjectClient>(&self, ctx: &Context<C>) -> Result<Option<Outcome>> {
        let labels = labels::module_labels(self.module);

        client::ensure(&ctx.client, &namespace::build(self.namespace, labels.clone())).await?;
        client::ensure(
            &ctx.client,
            &crd::namespaced(gpte::GROUP, "v1alpha1", self.kind, self.plural, labels.clone())?,
        )
        .await?;
        client::ensure(&ctx.client, &self.cluster_role()).await?;
        client::ensure(
            &ctx.client,
            &rbac::cluster_role_binding(
                self.name,
                labels.clone(),
                rbac::cluster_role_ref(self.name),
                vec![rbac::service_account_subject(self.name, self.namespace)],
            ),
        )
        .await?;
        client::ensure(
            &ctx.client,
            &rbac::service_account(self.name, self.namespace, labels, None),
        )
        .await?;
        deployment::apply_tracked(&ctx.client, &self.deployment()).await?;

        wait_for_deployment(ctx, self.name, self.namespace).await
    }

    pub async fn uninstall<C: ObjectClient>(&self, ctx: &Context<C>) -> Result<()> {
        let ns = Some(self.namespace);
        client::delete_if_exists::<C, Deployment>(&ctx.client, self.name, ns).await?;
        client::delete_if_exists::<C, ServiceAccount>(&ctx.client, self.name, ns).await?;
        client::delete_if_exists::<C, ClusterRoleBinding>(&ctx.client, self.name, None).await?;
        client::delete_if_exists::<C, ClusterRole>(&ctx.client, self.name, None).await?;
        client::delete_if_exists::<C, CustomResourceDefinition>(&ctx.client, &self.crd_name(), None)
            .await?;
        client::delete_if_exists::<C, Namespace>(&ctx.client, self.namespace, None).await?;
        Ok(())
    }
}
