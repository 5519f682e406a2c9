//! Set semantics on the `users` list of the cluster-wide SecurityContextConstraints.
//!
//! SCCs are shared by every module (and by other tenants of the cluster), so they
//! are only ever mutated read-modify-write: a subject is appended when missing and
//! nothing else on the object is touched. A conflicting concurrent writer causes a
//! bounded number of re-reads before the error is surfaced to the framework.

use crate::{
    client::ObjectClient,
    crds::SecurityContextConstraints,
    error::{Error, Result},
};
use tracing::{debug, info};

pub const PRIVILEGED: &str = "privileged";
pub const ANYUID: &str = "anyuid";

const CONFLICT_RETRIES: usize = 3;

/// Subject string an SCC uses for a service account
pub fn service_account_user(namespace: &str, name: &str) -> String {
    format!("system:serviceaccount:{}:{}", namespace, name)
}

/// Append `user` to the SCC's users unless already present. Returns whether the
/// SCC was modified. A missing SCC is an assertion failure.
pub async fn add_user<C: ObjectClient>(client: &C, scc: &str, user: &str) -> Result<bool> {
    modify(client, scc, user, |users| {
        if users.iter().any(|u| u == user) {
            false
        } else {
            users.push(user.to_string());
            true
        }
    })
    .await
}

/// Remove `user` from the SCC's users. Used only by the delete paths, where an
/// SCC that is already gone is nothing to do
pub async fn remove_user<C: ObjectClient>(client: &C, scc: &str, user: &str) -> Result<bool> {
    if client.get::<SecurityContextConstraints>(scc, None).await?.is_none() {
        debug!("SCC {} not found, nothing to remove", scc);
        return Ok(false);
    }
    modify(client, scc, user, |users| {
        let before = users.len();
        users.retain(|u| u != user);
        users.len() != before
    })
    .await
}

async fn modify<C, F>(client: &C, scc: &str, user: &str, mutate: F) -> Result<bool>
where
    C: ObjectClient,
    F: Fn(&mut Vec<String>) -> bool + Send + Sync,
{
    let mut attempt = 0;
    loop {
        let mut current = client
            .get::<SecurityContextConstraints>(scc, None)
            .await?
            .ok_or_else(|| Error::missing("SecurityContextConstraints", scc))?;

        let users = current.users.get_or_insert_with(Vec::new);
        if !mutate(users) {
            debug!("SCC {} already up to date for {}", scc, user);
            return Ok(false);
        }

        match client.update(&current).await {
            Ok(_) => {
                info!("Updated SCC {} for {}", scc, user);
                return Ok(true);
            }
            Err(Error::KubeError(kube::Error::Api(ae)))
                if ae.code == 409 && attempt + 1 < CONFLICT_RETRIES =>
            {
                attempt += 1;
                debug!("Conflict updating SCC {}, retrying ({})", scc, attempt);
            }
            Err(e) => return Err(e),
        }
    }
}
