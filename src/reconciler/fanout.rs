//! Per-user fan-out: a module describes the objects one learner needs as data and
//! the engine creates (or removes) them for every user index.

use crate::{
    client::{self, Applied, Created, ObjectClient},
    crds::{AppProject, Route},
    error::Result,
    resources::{deployment, rbac},
};
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount},
    rbac::v1::{Role, RoleBinding},
};
use kube::ResourceExt;
use tracing::info;

macro_rules! desired_objects {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// One object a module wants to exist for a learner
        #[derive(Clone, Debug)]
        pub enum DesiredObject {
            $($variant($ty)),*
        }

        $(
            impl From<$ty> for DesiredObject {
                fn from(obj: $ty) -> Self {
                    DesiredObject::$variant(obj)
                }
            }
        )*

        impl DesiredObject {
            pub fn name(&self) -> String {
                match self {
                    $(DesiredObject::$variant(obj) => obj.name_any()),*
                }
            }

            pub fn namespace(&self) -> Option<String> {
                match self {
                    $(DesiredObject::$variant(obj) => obj.namespace()),*
                }
            }

            async fn create<C: ObjectClient>(&self, client: &C) -> Result<Created> {
                match self {
                    $(DesiredObject::$variant(obj) => client::ensure(client, obj).await),*
                }
            }

            /// Delete the object if it exists. Returns whether anything was deleted
            pub async fn remove<C: ObjectClient>(&self, client: &C) -> Result<bool> {
                let name = self.name();
                let namespace = self.namespace();
                match self {
                    $(DesiredObject::$variant(_) => {
                        client::delete_if_exists::<C, $ty>(client, &name, namespace.as_deref()).await
                    }),*
                }
            }
        }
    };
}

desired_objects! {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    ConfigMap(ConfigMap),
    Secret(Secret),
    Service(Service),
    Route(Route),
    Deployment(Deployment),
    AppProject(AppProject),
}

fn restore_app_project(live: &mut AppProject, desired: &AppProject) -> bool {
    if live.spec == desired.spec {
        return false;
    }
    live.spec = desired.spec.clone();
    true
}

impl DesiredObject {
    /// Create the object, or restore its tracked attributes when it already
    /// exists: deployment image and env, role binding subjects, AppProject spec.
    /// Returns whether the object was newly created.
    pub async fn apply<C: ObjectClient>(&self, client: &C) -> Result<Created> {
        let applied = match self {
            DesiredObject::Deployment(d) => deployment::apply_tracked(client, d).await?,
            DesiredObject::RoleBinding(rb) => {
                client::ensure_tracked(client, rb, rbac::restore_subjects).await?
            }
            DesiredObject::AppProject(p) => {
                client::ensure_tracked(client, p, restore_app_project).await?
            }
            other => return other.create(client).await,
        };
        Ok(match applied {
            Applied::Created => Created::New,
            Applied::Updated | Applied::Unchanged => Created::AlreadyExists,
        })
    }
}

/// Aggregate progress of one fan-out pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub users: u32,
    pub created: usize,
    pub existing: usize,
}

/// Apply the objects `factory` yields for every user index in `1..=user_count`,
/// in index order and, within a user, in the order given
pub async fn apply<C, F>(client: &C, module: &str, user_count: u32, factory: F) -> Result<FanoutReport>
where
    C: ObjectClient,
    F: Fn(u32) -> Vec<DesiredObject>,
{
    let mut report = FanoutReport::default();
    for index in 1..=user_count {
        for obj in factory(index) {
            match obj.apply(client).await? {
                Created::New => report.created += 1,
                Created::AlreadyExists => report.existing += 1,
            }
        }
        report.users += 1;
    }
    info!(
        "{}: {} users, {} objects created, {} already present",
        module, report.users, report.created, report.existing
    );
    Ok(report)
}

/// Remove the objects `factory` yields for every user index, each user's objects
/// in reverse order. Returns how many objects were deleted
pub async fn remove<C, F>(client: &C, user_count: u32, factory: F) -> Result<usize>
where
    C: ObjectClient,
    F: Fn(u32) -> Vec<DesiredObject>,
{
    let mut removed = 0;
    for index in 1..=user_count {
        for obj in factory(index).iter().rev() {
            if obj.remove(client).await? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::memory::MemoryClient,
        resources::{configmap, labels, namespace},
    };
    use std::collections::BTreeMap;

    fn factory(index: u32) -> Vec<DesiredObject> {
        let ns = format!("staging{}", index);
        vec![
            namespace::build(&ns, labels::module_labels("test")).into(),
            configmap::build(
                "settings",
                &ns,
                labels::module_labels("test"),
                BTreeMap::new(),
                None,
            )
            .into(),
        ]
    }

    #[tokio::test]
    async fn test_apply_is_resumable() {
        let client = MemoryClient::new();
        client.insert(&namespace::build("staging1", labels::module_labels("test")));

        let report = apply(&client, "test", 2, factory).await.unwrap();
        assert_eq!(
            report,
            FanoutReport {
                users: 2,
                created: 3,
                existing: 1
            }
        );

        let again = apply(&client, "test", 2, factory).await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.existing, 4);
    }

    #[tokio::test]
    async fn test_remove_twice_is_noop() {
        let client = MemoryClient::new();
        apply(&client, "test", 2, factory).await.unwrap();

        assert_eq!(remove(&client, 2, factory).await.unwrap(), 4);
        assert_eq!(remove(&client, 2, factory).await.unwrap(), 0);
        assert_eq!(client.count::<Namespace>(), 0);
        assert_eq!(client.count::<ConfigMap>(), 0);
    }
}
