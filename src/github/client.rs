//! Source host client.
//!
//! [`SourceHost`] is the narrow view of the hosting platform the router
//! needs for refreshes. [`OctocrabHost`] implements it as a GitHub App:
//! app-level calls authenticate with a JWT signed by the app's RSA key,
//! repository calls with a token scoped to the owning installation.
//!
//! Pull requests come back as raw JSON so synthetic events carry the same
//! shape as native webhook payloads.

use async_trait::async_trait;
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId as GhInstallationId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::{HostError, OptionalExt};
use crate::types::{InstallationId, PrNumber, Repository};

const PER_PAGE: u32 = 100;

/// Read-only access to the source host.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// The installation that has access to `owner/repo`, if any.
    async fn repository_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<InstallationId>, HostError>;

    async fn repository(
        &self,
        installation: InstallationId,
        owner: &str,
        repo: &str,
    ) -> Result<Repository, HostError>;

    /// Whether `path` exists at the repository's default branch. A 404 is
    /// `false`, not an error.
    async fn has_config_file(
        &self,
        installation: InstallationId,
        repository: &Repository,
        path: &str,
    ) -> Result<bool, HostError>;

    /// Open pull requests, optionally only those targeting `base`.
    async fn open_pulls(
        &self,
        installation: InstallationId,
        repository: &Repository,
        base: Option<&str>,
    ) -> Result<Vec<Value>, HostError>;

    async fn pull(
        &self,
        installation: InstallationId,
        repository: &Repository,
        number: PrNumber,
    ) -> Result<Value, HostError>;

    /// Every installation of the app.
    async fn installations(&self) -> Result<Vec<InstallationId>, HostError>;

    /// Every repository one installation can access.
    async fn installation_repositories(
        &self,
        installation: InstallationId,
    ) -> Result<Vec<Repository>, HostError>;
}

/// [`SourceHost`] backed by octocrab, authenticated as a GitHub App.
#[derive(Clone)]
pub struct OctocrabHost {
    /// App-authenticated client.
    app: Octocrab,
}

impl OctocrabHost {
    pub fn new(app: Octocrab) -> Self {
        Self { app }
    }

    /// Builds an app client from the app id and its PEM private key.
    pub fn from_app_key(app_id: u64, private_key_pem: &[u8]) -> Result<Self, HostError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_key_pem)?;
        let app = Octocrab::builder()
            .app(AppId(app_id), key)
            .build()
            .map_err(|e| HostError::from_octocrab("building app client", e))?;
        Ok(Self::new(app))
    }

    fn installation_client(&self, installation: InstallationId) -> Result<Octocrab, HostError> {
        self.app
            .installation(GhInstallationId(installation.0))
            .map_err(|e| HostError::from_octocrab(format!("installation {installation}"), e))
    }

    async fn get<R, P>(client: &Octocrab, route: &str, params: Option<&P>) -> Result<R, HostError>
    where
        R: DeserializeOwned,
        P: Serialize + ?Sized + Sync,
    {
        debug!(route, "GitHub GET");
        client
            .get::<R, _, P>(route, params)
            .await
            .map_err(|e| HostError::from_octocrab(route.to_string(), e))
    }
}

#[derive(Serialize)]
struct PageParams<'a> {
    per_page: u32,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<&'a str>,
}

impl<'a> PageParams<'a> {
    fn page(page: u32) -> Self {
        PageParams {
            per_page: PER_PAGE,
            page,
            state: None,
            base: None,
        }
    }
}

#[async_trait]
impl SourceHost for OctocrabHost {
    async fn repository_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<InstallationId>, HostError> {
        let route = format!("/repos/{owner}/{repo}/installation");
        let installation: Option<Value> = Self::get(&self.app, &route, None::<&()>)
            .await
            .optional()?;

        Ok(installation
            .and_then(|v| v.get("id").and_then(Value::as_u64))
            .map(InstallationId))
    }

    async fn repository(
        &self,
        installation: InstallationId,
        owner: &str,
        repo: &str,
    ) -> Result<Repository, HostError> {
        let client = self.installation_client(installation)?;
        let route = format!("/repos/{owner}/{repo}");
        Self::get(&client, &route, None::<&()>).await
    }

    async fn has_config_file(
        &self,
        installation: InstallationId,
        repository: &Repository,
        path: &str,
    ) -> Result<bool, HostError> {
        let client = self.installation_client(installation)?;
        let route = format!("/repos/{}/contents/{}", repository.full_name, path);
        let found: Option<Value> = Self::get(&client, &route, None::<&()>).await.optional()?;
        Ok(found.is_some())
    }

    async fn open_pulls(
        &self,
        installation: InstallationId,
        repository: &Repository,
        base: Option<&str>,
    ) -> Result<Vec<Value>, HostError> {
        let client = self.installation_client(installation)?;
        let route = format!("/repos/{}/pulls", repository.full_name);

        let mut page = 1u32;
        let mut pulls = Vec::new();
        loop {
            let params = PageParams {
                state: Some("open"),
                base,
                ..PageParams::page(page)
            };
            let items: Vec<Value> = Self::get(&client, &route, Some(&params)).await?;
            let is_last_page = items.len() < PER_PAGE as usize;
            pulls.extend(items);

            if is_last_page {
                break;
            }
            page += 1;
        }

        Ok(pulls)
    }

    async fn pull(
        &self,
        installation: InstallationId,
        repository: &Repository,
        number: PrNumber,
    ) -> Result<Value, HostError> {
        let client = self.installation_client(installation)?;
        let route = format!("/repos/{}/pulls/{}", repository.full_name, number.0);
        Self::get(&client, &route, None::<&()>).await
    }

    async fn installations(&self) -> Result<Vec<InstallationId>, HostError> {
        let mut page = 1u32;
        let mut ids = Vec::new();
        loop {
            let items: Vec<Value> =
                Self::get(&self.app, "/app/installations", Some(&PageParams::page(page))).await?;
            let is_last_page = items.len() < PER_PAGE as usize;
            ids.extend(
                items
                    .iter()
                    .filter_map(|v| v.get("id").and_then(Value::as_u64))
                    .map(InstallationId),
            );

            if is_last_page {
                break;
            }
            page += 1;
        }

        Ok(ids)
    }

    async fn installation_repositories(
        &self,
        installation: InstallationId,
    ) -> Result<Vec<Repository>, HostError> {
        #[derive(serde::Deserialize)]
        struct RepositoryPage {
            repositories: Vec<Repository>,
        }

        let client = self.installation_client(installation)?;
        let mut page = 1u32;
        let mut repos = Vec::new();
        loop {
            let body: RepositoryPage = Self::get(
                &client,
                "/installation/repositories",
                Some(&PageParams::page(page)),
            )
            .await?;
            let is_last_page = body.repositories.len() < PER_PAGE as usize;
            repos.extend(body.repositories);

            if is_last_page {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }
}

impl std::fmt::Debug for OctocrabHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabHost").finish_non_exhaustive()
    }
}
