use std::collections::BTreeMap;

pub const PART_OF: &str = "app.kubernetes.io/part-of";
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "workshop-operator";
pub const CATALOG_SOURCE: &str = "workshop.openshiftlabs.io/catalog-source";

/// Standard labels stamped on every object a module manages
pub fn module_labels(module: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(PART_OF.to_string(), module.to_string());
    labels.insert(MANAGED_BY.to_string(), MANAGER.to_string());
    labels
}

/// Module labels plus the `app` label workloads are selected by
pub fn app_labels(module: &str, app: &str) -> BTreeMap<String, String> {
    let mut labels = module_labels(module);
    labels.insert("app".to_string(), app.to_string());
    labels
}

/// Generate selector labels for pods
pub fn selector_labels(app: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    labels
}
