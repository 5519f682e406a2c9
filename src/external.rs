//! Outbound HTTP side effects: devfile fetch, the IDE's identity provider and
//! workspace API, the OpenShift OAuth server and the Git server sign-up page.
//!
//! This is the only place that accepts invalid certificates and refuses to follow
//! redirects. Modules only see the [`ExternalServices`] trait.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{redirect, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Result of registering an account with an external system
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait ExternalServices: Send + Sync {
    /// Fetch `devfile.yaml` of a GitHub repository branch, converted to JSON
    async fn fetch_devfile(&self, git_url: &str, git_branch: &str) -> Result<Value>;

    /// Admin token of the Keycloak master realm
    async fn keycloak_admin_token(&self, keycloak_url: &str) -> Result<String>;

    async fn create_keycloak_user(
        &self,
        keycloak_url: &str,
        realm: &str,
        admin_token: &str,
        username: &str,
        password: &str,
    ) -> Result<Registration>;

    async fn keycloak_user_token(
        &self,
        keycloak_url: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> Result<String>;

    /// Exchange learner credentials for an OpenShift OAuth access token
    async fn openshift_oauth_token(
        &self,
        apps_hostname_suffix: &str,
        username: &str,
        password: &str,
    ) -> Result<String>;

    /// Create and start a workspace from a devfile on behalf of a learner
    async fn init_workspace(
        &self,
        che_url: &str,
        username: &str,
        token: &str,
        devfile: &Value,
    ) -> Result<()>;

    async fn gitea_sign_up(
        &self,
        gitea_url: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration>;
}

/// `org/repo` of a GitHub URL, dropping a trailing `.git`
pub fn github_path(git_url: &str) -> String {
    let path = git_url
        .trim_end_matches('/')
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("github.com/");
    path.trim_end_matches(".git").to_string()
}

pub fn devfile_url(git_url: &str, git_branch: &str) -> String {
    format!(
        "https://raw.githubusercontent.com/{}/{}/devfile.yaml",
        github_path(git_url),
        git_branch
    )
}

/// Access token carried in the fragment of an OAuth implicit-grant redirect
pub fn access_token_from_location(location: &str) -> Option<String> {
    let fragment = location.split_once('#').map(|(_, f)| f).unwrap_or(location);
    fragment
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
        .filter(|token| !token.is_empty())
        .map(String::from)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn unexpected(action: &str, status: StatusCode) -> Error {
    warn!("Unexpected status {} while trying to {}", status, action);
    Error::UnexpectedStatus {
        action: action.to_string(),
        status: status.as_u16(),
    }
}

/// [`ExternalServices`] over HTTPS with certificate verification disabled
#[derive(Clone)]
pub struct HttpServices {
    http: reqwest::Client,
}

impl HttpServices {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ExternalServices for HttpServices {
    async fn fetch_devfile(&self, git_url: &str, git_branch: &str) -> Result<Value> {
        let url = devfile_url(git_url, git_branch);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(unexpected("fetch the devfile", response.status()));
        }
        let body = response.text().await?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&body)?;
        Ok(serde_json::to_value(yaml)?)
    }

    async fn keycloak_admin_token(&self, keycloak_url: &str) -> Result<String> {
        let response = self
            .http
            .post(format!(
                "{}/auth/realms/master/protocol/openid-connect/token",
                keycloak_url
            ))
            .form(&[
                ("username", "admin"),
                ("password", "admin"),
                ("grant_type", "password"),
                ("client_id", "admin-cli"),
            ])
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected("get the Keycloak admin token", response.status()));
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    async fn create_keycloak_user(
        &self,
        keycloak_url: &str,
        realm: &str,
        admin_token: &str,
        username: &str,
        password: &str,
    ) -> Result<Registration> {
        let body = serde_json::json!({
            "username": username,
            "enabled": true,
            "email": format!("{}@workshop.none", username),
            "emailVerified": true,
            "credentials": [{"type": "password", "value": password, "temporary": false}],
        });
        let response = self
            .http
            .post(format!("{}/auth/admin/realms/{}/users", keycloak_url, realm))
            .bearer_auth(admin_token)
            .json(&body)
            .send()
            .await?;
        match response.status() {
            StatusCode::CREATED => {
                info!("Created Keycloak user {} in realm {}", username, realm);
                Ok(Registration::Created)
            }
            StatusCode::CONFLICT => Ok(Registration::AlreadyExists),
            status => Err(unexpected("create a Keycloak user", status)),
        }
    }

    async fn keycloak_user_token(
        &self,
        keycloak_url: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let client_id = format!("{}-public", realm);
        let response = self
            .http
            .post(format!(
                "{}/auth/realms/{}/protocol/openid-connect/token",
                keycloak_url, realm
            ))
            .form(&[
                ("username", username),
                ("password", password),
                ("grant_type", "password"),
                ("client_id", client_id.as_str()),
            ])
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected("get a Keycloak user token", response.status()));
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    async fn openshift_oauth_token(
        &self,
        apps_hostname_suffix: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let response = self
            .http
            .get(format!(
                "https://oauth-openshift.{}/oauth/authorize?client_id=openshift-challenging-client&response_type=token",
                apps_hostname_suffix
            ))
            .basic_auth(username, Some(password))
            .send()
            .await?;
        if response.status() != StatusCode::FOUND {
            return Err(unexpected("get an OpenShift OAuth token", response.status()));
        }
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|l| l.to_str().ok())
            .and_then(access_token_from_location)
            .ok_or_else(|| unexpected("read the OpenShift OAuth redirect", StatusCode::FOUND))
    }

    async fn init_workspace(
        &self,
        che_url: &str,
        username: &str,
        token: &str,
        devfile: &Value,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/api/workspace/devfile?start-after-create=true&namespace={}",
                che_url, username
            ))
            .bearer_auth(token)
            .json(devfile)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected("initialize a workspace", response.status()));
        }
        info!("Initialized workspace for {}", username);
        Ok(())
    }

    async fn gitea_sign_up(
        &self,
        gitea_url: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration> {
        let response = self
            .http
            .post(format!("{}/user/sign_up", gitea_url))
            .form(&[
                ("user_name", username),
                ("email", email),
                ("password", password),
                ("retype", password),
            ])
            .send()
            .await?;
        match response.status() {
            // a successful sign-up redirects to the dashboard
            StatusCode::CREATED | StatusCode::FOUND => {
                info!("Created Gitea user {}", username);
                Ok(Registration::Created)
            }
            // the form is re-rendered with an error when the name is taken
            StatusCode::OK => Ok(Registration::AlreadyExists),
            status => Err(unexpected("sign up to Gitea", status)),
        }
    }
}
