//! In-memory object store used by the unit tests in place of the API server.

use super::{Created, Object, ObjectClient};
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use kube::{core::ErrorResponse, Resource, ResourceExt};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Mutex};

type Key = (String, String, String, String);

#[derive(Default)]
pub struct MemoryClient {
    objects: Mutex<BTreeMap<Key, Value>>,
    updates: Mutex<BTreeMap<Key, usize>>,
    /// Writes another client lands right before our next update of the key
    races: Mutex<BTreeMap<Key, Value>>,
}

fn key<K: Object>(name: &str, namespace: Option<&str>) -> Key {
    (
        K::api_version(&()).to_string(),
        K::kind(&()).to_string(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn api_error(code: u16, reason: &str, message: String) -> crate::error::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
    .into()
}

/// RFC 7386 JSON merge patch
fn merge(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(entries) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(map) = target {
                for (k, v) in entries {
                    if v.is_null() {
                        map.remove(k);
                    } else {
                        merge(map.entry(k.clone()).or_insert(Value::Null), v);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

fn resource_version(value: &Value) -> Option<String> {
    value["metadata"]["resourceVersion"].as_str().map(String::from)
}

fn set_resource_version(value: &mut Value, version: u64) {
    value["metadata"]["resourceVersion"] = Value::String(version.to_string());
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as-is, replacing any previous state
    pub fn insert<K: Object>(&self, obj: &K) {
        let mut value = serde_json::to_value(obj).unwrap();
        set_resource_version(&mut value, 1);
        self.objects.lock().unwrap().insert(
            key::<K>(&obj.name_any(), obj.meta().namespace.as_deref()),
            value,
        );
    }

    pub fn fetch<K: Object>(&self, name: &str, namespace: Option<&str>) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key::<K>(name, namespace))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn contains<K: Object>(&self, name: &str, namespace: Option<&str>) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&key::<K>(name, namespace))
    }

    pub fn count<K: Object>(&self) -> usize {
        let api_version = K::api_version(&()).to_string();
        let kind = K::kind(&()).to_string();
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(a, k, _, _)| *a == api_version && *k == kind)
            .count()
    }

    pub fn update_count<K: Object>(&self, name: &str, namespace: Option<&str>) -> usize {
        self.updates
            .lock()
            .unwrap()
            .get(&key::<K>(name, namespace))
            .copied()
            .unwrap_or(0)
    }

    /// Have another writer replace the object with `concurrent` just before the
    /// next update of it, so that update fails with a 409 conflict
    pub fn race_next_update<K: Object>(&self, concurrent: &K) {
        self.races.lock().unwrap().insert(
            key::<K>(&concurrent.name_any(), concurrent.meta().namespace.as_deref()),
            serde_json::to_value(concurrent).unwrap(),
        );
    }

    /// Report every replica of an existing deployment as available, creating a
    /// bare deployment when the test never created one
    pub fn mark_deployment_ready(&self, name: &str, namespace: &str) {
        let mut deployment = self
            .fetch::<Deployment>(name, Some(namespace))
            .unwrap_or_else(|| Deployment {
                metadata: kube::api::ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            });
        deployment.status = Some(DeploymentStatus {
            replicas: Some(1),
            ready_replicas: Some(1),
            available_replicas: Some(1),
            ..Default::default()
        });
        self.insert(&deployment);
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn create<K: Object>(&self, obj: &K) -> Result<Created> {
        let key = key::<K>(&obj.name_any(), obj.meta().namespace.as_deref());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Ok(Created::AlreadyExists);
        }
        let mut value = serde_json::to_value(obj)?;
        set_resource_version(&mut value, 1);
        objects.insert(key, value);
        Ok(Created::New)
    }

    async fn get<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<Option<K>> {
        let objects = self.objects.lock().unwrap();
        match objects.get(&key::<K>(name, namespace)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn update<K: Object>(&self, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let key = key::<K>(&name, obj.meta().namespace.as_deref());
        let mut objects = self.objects.lock().unwrap();
        if let Some(mut concurrent) = self.races.lock().unwrap().remove(&key) {
            let version = objects
                .get(&key)
                .and_then(resource_version)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            set_resource_version(&mut concurrent, version + 1);
            objects.insert(key.clone(), concurrent);
        }
        let current = objects
            .get(&key)
            .ok_or_else(|| api_error(404, "NotFound", format!("{} {} not found", K::kind(&()), name)))?;

        let stored = resource_version(current);
        let mut value = serde_json::to_value(obj)?;
        if let Some(sent) = resource_version(&value) {
            if Some(&sent) != stored.as_ref() {
                return Err(api_error(409, "Conflict", format!("{} {} was modified", K::kind(&()), name)));
            }
        }
        let next = stored.and_then(|v| v.parse::<u64>().ok()).unwrap_or(1) + 1;
        set_resource_version(&mut value, next);
        objects.insert(key.clone(), value.clone());
        *self.updates.lock().unwrap().entry(key).or_insert(0) += 1;
        Ok(serde_json::from_value(value)?)
    }

    async fn delete<K: Object>(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        match self.objects.lock().unwrap().remove(&key::<K>(name, namespace)) {
            Some(_) => Ok(()),
            None => Err(api_error(404, "NotFound", format!("{} {} not found", K::kind(&()), name))),
        }
    }

    async fn merge_patch<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        match objects.get_mut(&key::<K>(name, namespace)) {
            Some(value) => {
                merge(value, patch);
                Ok(())
            }
            None => Err(api_error(404, "NotFound", format!("{} {} not found", K::kind(&()), name))),
        }
    }

    async fn merge_patch_status<K: Object>(
        &self,
        name: &str,
        namespace: Option<&str>,
        patch: &Value,
    ) -> Result<()> {
        let status_only = serde_json::json!({ "status": patch["status"].clone() });
        self.merge_patch::<K>(name, namespace, &status_only).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_twice_reports_existing() {
        let client = MemoryClient::new();
        assert_eq!(client.create(&config_map("a")).await.unwrap(), Created::New);
        assert_eq!(
            client.create(&config_map("a")).await.unwrap(),
            Created::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let client = MemoryClient::new();
        client.create(&config_map("a")).await.unwrap();
        let fresh: ConfigMap = client.get("a", Some("default")).await.unwrap().unwrap();
        client.update(&fresh).await.unwrap();

        let err = client.update(&fresh).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let client = MemoryClient::new();
        assert!(client.delete::<ConfigMap>("a", Some("default")).await.is_err());
    }

    #[test]
    fn test_merge_patch_removes_nulls() {
        let mut target = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge(&mut target, &serde_json::json!({"a": null, "b": {"c": 4}}));
        assert_eq!(target, serde_json::json!({"b": {"c": 4, "d": 3}}));
    }
}
