pub mod argocd;
pub mod certmanager;
pub mod che;
pub mod gpte;
pub mod maistra;
pub mod olm;
pub mod openshift;
pub mod workshop;

// Re-export types
pub use argocd::{
    AppProject, AppProjectSpec, ApplicationDestination, ArgoCD, ArgoCDRbacSpec, ArgoCDSpec,
    GroupKind,
};
pub use certmanager::{CertManager, CertManagerSpec};
pub use che::{CheAuthSpec, CheCluster, CheClusterSpec, CheDatabaseSpec, CheServerSpec, CheStorageSpec};
pub use gpte::{Gitea, Nexus};
pub use maistra::{
    ServiceMeshControlPlane, ServiceMeshControlPlaneSpec, ServiceMeshMemberRoll,
    ServiceMeshMemberRollSpec,
};
pub use olm::{
    ClusterServiceVersion, InstallPlan, InstallPlanApproval, InstallPlanReference, InstallPlanSpec,
    OperatorGroup, OperatorGroupSpec, Subscription, SubscriptionSpec, SubscriptionStatus,
};
pub use openshift::{
    ConsoleConfig, ConsoleConfigStatus, IngressConfig, Route, RoutePort, RouteSpec,
    RouteTargetReference, SecurityContextConstraints, TlsConfig,
};
pub use workshop::{
    BookbagSpec, CodeReadyWorkspaceSpec, Condition, ConditionStatus, GiteaSpec, ImageSpec,
    InfrastructureSpec, NexusSpec, OperatorHubSpec, OperatorProductSpec, PortalSpec, ProjectSpec,
    ServiceMeshSpec, SourceSpec, UserSpec, VaultSpec, Workshop, WorkshopSpec, WorkshopStatus,
};
