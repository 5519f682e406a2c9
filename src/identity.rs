//! Per-user naming shared by every module.
//!
//! Learner identities are woven through many modules (staging projects, mesh
//! membership, GitOps policy, role bindings), so every name derived from a user
//! index comes from here.

use crate::crds::Workshop;

/// Prefix of every learner account name
pub const USER_PREFIX: &str = "user";

/// Namespace and service account of the GitOps application controller, which
/// deploys into every staging project
pub const ARGOCD_NAMESPACE: &str = "argocd";
pub const ARGOCD_CONTROLLER_SA: &str = "argocd-argocd-application-controller";

/// In-cluster address of the Git server
pub const GITEA_INTERNAL_URL: &str = "http://gitea-server.gitea.svc:3000";

/// In-cluster address of the API server, as GitOps names it
pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";

/// `user<i>`
pub fn username(index: u32) -> String {
    format!("{}{}", USER_PREFIX, index)
}

/// `<stagingName><i>`
pub fn staging_project(workshop: &Workshop, index: u32) -> String {
    format!("{}{}", workshop.spec.infrastructure.project.staging_name, index)
}

/// `role:<username>`
pub fn user_role(username: &str) -> String {
    format!("role:{}", username)
}

/// RBAC user name of the GitOps application controller
pub fn argocd_controller_user() -> String {
    format!(
        "system:serviceaccount:{}:{}",
        ARGOCD_NAMESPACE, ARGOCD_CONTROLLER_SA
    )
}

/// All user indices of the Workshop, `1..=userCount`
pub fn user_indices(workshop: &Workshop) -> impl Iterator<Item = u32> {
    1..=workshop.spec.user_count
}

/// GitOps RBAC policy block for one learner
pub fn gitops_policy_block(username: &str, project: &str) -> String {
    let role = user_role(username);
    format!(
        "p, {role}, applications, *, {project}/*, allow\n\
         p, {role}, clusters, get, {server}, allow\n\
         p, {role}, projects, *, {project}, allow\n\
         p, {role}, repositories, *, {gitea}/{username}/*, allow\n\
         g, {username}, {role}\n",
        role = role,
        project = project,
        server = IN_CLUSTER_SERVER,
        gitea = GITEA_INTERNAL_URL,
        username = username,
    )
}

/// GitOps RBAC policy for every learner, concatenated in user-index order
pub fn gitops_policy(workshop: &Workshop) -> String {
    user_indices(workshop)
        .map(|i| gitops_policy_block(&username(i), &staging_project(workshop, i)))
        .collect()
}

/// Staging projects of every learner in user-index order
pub fn staging_projects(workshop: &Workshop) -> Vec<String> {
    user_indices(workshop)
        .map(|i| staging_project(workshop, i))
        .collect()
}

/// Value of the GitOps cluster-config `namespaces` field
pub fn cluster_config_namespaces(workshop: &Workshop) -> String {
    staging_projects(workshop).join(",")
}
