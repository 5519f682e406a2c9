//! Learner accounts for the cluster's htpasswd identity provider.
//!
//! The module maintains the htpasswd file in a secret; wiring the file into the
//! cluster OAuth configuration is left to the cluster administrator.

use super::Outcome;
use crate::{
    client::{self, ObjectClient},
    crds::Workshop,
    error::Result,
    identity,
    reconciler::Context,
    resources::{labels, secret},
};
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use tracing::info;

const MODULE: &str = "user";

pub const HTPASSWD_SECRET: &str = "htpasswd-workshop-users";
pub const HTPASSWD_NAMESPACE: &str = "openshift-config";
pub const HTPASSWD_KEY: &str = "htpasswd";

/// bcrypt cost of every learner password hash
const HASH_COST: u32 = 10;

/// bcrypt hash of `password` for every key, reusing a stored hash while it still
/// verifies. The whole batch runs on the blocking pool
pub(crate) async fn hash_passwords(
    password: &str,
    stored: Vec<(String, Option<String>)>,
) -> Result<Vec<(String, String)>> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        stored
            .into_iter()
            .map(|(key, stored)| {
                let hash = match stored {
                    Some(hash) if bcrypt::verify(&password, &hash).unwrap_or(false) => hash,
                    _ => bcrypt::hash(&password, HASH_COST)?,
                };
                Ok((key, hash))
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?
}

/// `user:hash` entries of an htpasswd file
fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(user, hash)| (user.to_string(), hash.to_string()))
        .collect()
}

/// htpasswd file with one bcrypt entry per learner in index order. Entries of
/// `existing` that still verify against the password are kept as they are.
pub async fn htpasswd(
    workshop: &Workshop,
    existing: &BTreeMap<String, String>,
) -> Result<String> {
    let stored = identity::user_indices(workshop)
        .map(identity::username)
        .map(|username| {
            let hash = existing.get(&username).cloned();
            (username, hash)
        })
        .collect();
    let entries = hash_passwords(&workshop.spec.user_password, stored).await?;
    Ok(entries
        .into_iter()
        .map(|(username, hash)| format!("{}:{}\n", username, hash))
        .collect())
}

pub async fn reconcile<C: ObjectClient>(workshop: &Workshop, ctx: &Context<C>) -> Result<Outcome> {
    let live = ctx
        .client
        .get::<Secret>(HTPASSWD_SECRET, Some(HTPASSWD_NAMESPACE))
        .await?;

    let current = live
        .as_ref()
        .and_then(|s| secret::value(s, HTPASSWD_KEY))
        .unwrap_or_default();
    let desired = htpasswd(workshop, &parse(&current)).await?;

    match live {
        None => {
            let data = BTreeMap::from([(HTPASSWD_KEY.to_string(), desired)]);
            let secret = secret::opaque(
                HTPASSWD_SECRET,
                HTPASSWD_NAMESPACE,
                labels::module_labels(MODULE),
                data,
                None,
            );
            client::ensure(&ctx.client, &secret).await?;
        }
        Some(mut live) if current != desired => {
            info!("Updating htpasswd entries for {} users", workshop.spec.user_count);
            live.data
                .get_or_insert_with(BTreeMap::new)
                .extend(secret::to_bytes(BTreeMap::from([(HTPASSWD_KEY.to_string(), desired)])));
            ctx.client.update(&live).await?;
        }
        Some(_) => {}
    }

    Ok(Outcome::Done)
}

pub async fn delete<C: ObjectClient>(_workshop: &Workshop, ctx: &Context<C>) -> Result<()> {
    client::delete_if_exists::<C, Secret>(&ctx.client, HTPASSWD_SECRET, Some(HTPASSWD_NAMESPACE))
        .await?;
    Ok(())
}
