use k8s_openapi::{
    api::{
        core::v1::ServiceAccount,
        rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject},
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use std::collections::BTreeMap;

use super::object_meta;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

pub fn service_account(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner: Option<&OwnerReference>,
) -> ServiceAccount {
    ServiceAccount {
        metadata: object_meta(name, Some(namespace), labels, owner),
        ..Default::default()
    }
}

pub fn role(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    rules: Vec<PolicyRule>,
    owner: Option<&OwnerReference>,
) -> Role {
    Role {
        metadata: object_meta(name, Some(namespace), labels, owner),
        rules: Some(rules),
    }
}

pub fn role_binding(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    role_ref: RoleRef,
    subjects: Vec<Subject>,
    owner: Option<&OwnerReference>,
) -> RoleBinding {
    RoleBinding {
        metadata: object_meta(name, Some(namespace), labels, owner),
        role_ref,
        subjects: Some(subjects),
    }
}

pub fn cluster_role(name: &str, labels: BTreeMap<String, String>, rules: Vec<PolicyRule>) -> ClusterRole {
    ClusterRole {
        metadata: object_meta(name, None, labels, None),
        rules: Some(rules),
        ..Default::default()
    }
}

pub fn cluster_role_binding(
    name: &str,
    labels: BTreeMap<String, String>,
    role_ref: RoleRef,
    subjects: Vec<Subject>,
) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: object_meta(name, None, labels, None),
        role_ref,
        subjects: Some(subjects),
    }
}

pub fn cluster_role_ref(name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_GROUP.to_string(),
        kind: "ClusterRole".to_string(),
        name: name.to_string(),
    }
}

pub fn role_ref(name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_GROUP.to_string(),
        kind: "Role".to_string(),
        name: name.to_string(),
    }
}

pub fn user_subject(name: &str) -> Subject {
    Subject {
        api_group: Some(RBAC_GROUP.to_string()),
        kind: "User".to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

pub fn service_account_subject(name: &str, namespace: &str) -> Subject {
    Subject {
        api_group: None,
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
    }
}

pub fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(|s| s.to_string()).collect()),
        resources: Some(resources.iter().map(|s| s.to_string()).collect()),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Every verb on every listed resource
pub fn full_access(api_groups: &[&str], resources: &[&str]) -> PolicyRule {
    rule(api_groups, resources, &["*"])
}

/// Copy the desired subjects onto a live role binding. Returns whether they differed
pub fn restore_subjects(live: &mut RoleBinding, desired: &RoleBinding) -> bool {
    if live.subjects == desired.subjects {
        return false;
    }
    live.subjects = desired.subjects.clone();
    true
}
