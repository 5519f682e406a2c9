//! Thin typed access to the cluster API.
//!
//! Every module talks to the API server through [`ObjectClient`], which offers the
//! handful of verbs the controller needs for arbitrary typed objects. "Already
//! exists" on create is a distinguished outcome rather than an error; every other
//! failure is surfaced unchanged.

use crate::{
    error::{is_status, Result},
    resources::deployment,
};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{DeleteParams, GetParams, Patch, PatchParams, PostParams},
    core::Request,
    Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use tracing::{debug, info};

#[cfg(test)]
pub mod memory;

/// Any statically typed cluster object the controller manages
pub trait Object:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Outcome of a create call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Created {
    New,
    AlreadyExists,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Create the object. A 409 from the server is reported as `Created::AlreadyExists`
    async fn create<K: Object>(&self, obj: &K) -> Result<Created>;

    /// Fetch an object, `None` when it does not exist
    async fn get<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<Option<K>>;

    /// Replace the object with the given state. Conflicts are surfaced as errors
    async fn update<K: Object>(&self, obj: &K) -> Result<K>;

    /// Delete the object. Not found is an error; callers gate on `get` first
    async fn delete<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<()>;

    /// JSON merge patch of the main resource
    async fn merge_patch<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()>;

    /// JSON merge patch of the status subresource
    async fn merge_patch_status<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()>;

    /// True iff the named deployment reports all of its replicas available
    async fn deployment_ready(&self, name: &str, namespace: &str) -> Result<bool> {
        Ok(self
            .get::<Deployment>(name, Some(namespace))
            .await?
            .map(|d| deployment::is_available(&d))
            .unwrap_or(false))
    }
}

/// Create an object, treating "already exists" as success
pub async fn ensure<C: ObjectClient, K: Object>(client: &C, obj: &K) -> Result<Created> {
    let created = client.create(obj).await?;
    let kind = K::kind(&());
    let namespace = obj.namespace().unwrap_or_default();
    match created {
        Created::New => info!("Created {} {}/{}", kind, namespace, obj.name_any()),
        Created::AlreadyExists => {
            debug!("{} {}/{} already exists", kind, namespace, obj.name_any())
        }
    }
    Ok(created)
}

/// Outcome of a tracked apply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

/// Create the object, or copy the tracked attributes of `desired` onto the live
/// object with `restore` and replace it when anything changed. Fields `restore`
/// does not touch keep whatever the server holds.
pub async fn ensure_tracked<C, K, F>(client: &C, desired: &K, restore: F) -> Result<Applied>
where
    C: ObjectClient,
    K: Object,
    F: Fn(&mut K, &K) -> bool + Send + Sync,
{
    if ensure(client, desired).await? == Created::New {
        return Ok(Applied::Created);
    }

    let name = desired.name_any();
    let namespace = desired.namespace();
    let Some(mut live) = client.get::<K>(&name, namespace.as_deref()).await? else {
        return Ok(Applied::Unchanged);
    };
    if !restore(&mut live, desired) {
        return Ok(Applied::Unchanged);
    }

    info!(
        "Restoring tracked fields of {} {}/{}",
        K::kind(&()),
        namespace.unwrap_or_default(),
        name
    );
    client.update(&live).await?;
    Ok(Applied::Updated)
}

/// Delete an object if it can be found. Returns whether anything was deleted
pub async fn delete_if_exists<C: ObjectClient, K: Object>(
    client: &C,
    name: &str,
    namespace: Option<&str>,
) -> Result<bool> {
    let kind = K::kind(&());
    match client.get::<K>(name, namespace).await? {
        Some(_) => {
            info!("Deleting {} {}/{}", kind, namespace.unwrap_or_default(), name);
            client.delete::<K>(name, namespace).await?;
            Ok(true)
        }
        None => {
            debug!("{} {}/{} already deleted", kind, namespace.unwrap_or_default(), name);
            Ok(false)
        }
    }
}

/// [`ObjectClient`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
    field_manager: String,
}

impl KubeObjectClient {
    /// Writes are attributed to `field_manager`
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    fn request<K: Object>(namespace: Option<&str>) -> Request {
        Request::new(K::url_path(&(), namespace))
    }
}

#[async_trait]
impl ObjectClient for KubeObjectClient {
    async fn create<K: Object>(&self, obj: &K) -> Result<Created> {
        let req = Self::request::<K>(obj.meta().namespace.as_deref())
            .create(&self.post_params(), serde_json::to_vec(obj)?)
            .map_err(kube::Error::BuildRequest)?;

        match self.client.request::<K>(req).await {
            Ok(_) => Ok(Created::New),
            Err(e) if is_status(&e, 409) => Ok(Created::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn get<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<Option<K>> {
        let req = Self::request::<K>(namespace)
            .get(name, &GetParams::default())
            .map_err(kube::Error::BuildRequest)?;

        match self.client.request::<K>(req).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if is_status(&e, 404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update<K: Object>(&self, obj: &K) -> Result<K> {
        let req = Self::request::<K>(obj.meta().namespace.as_deref())
            .replace(&obj.name_any(), &self.post_params(), serde_json::to_vec(obj)?)
            .map_err(kube::Error::BuildRequest)?;

        Ok(self.client.request::<K>(req).await?)
    }

    async fn delete<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let req = Self::request::<K>(namespace)
            .delete(name, &DeleteParams::background())
            .map_err(kube::Error::BuildRequest)?;

        // the server answers with either the object or a Status, neither is needed
        self.client.request::<Value>(req).await?;
        Ok(())
    }

    async fn merge_patch<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let req = Self::request::<K>(namespace)
            .patch(name, &self.patch_params(), &Patch::Merge(patch))
            .map_err(kube::Error::BuildRequest)?;

        self.client.request::<Value>(req).await?;
        Ok(())
    }

    async fn merge_patch_status<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let req = Self::request::<K>(namespace)
            .patch_subresource("status", name, &self.patch_params(), &Patch::Merge(patch))
            .map_err(kube::Error::BuildRequest)?;

        self.client.request::<Value>(req).await?;
        Ok(())
    }
}
