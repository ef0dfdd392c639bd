//! Dropbox-backed artifact store

use super::traits::{ArtifactStore, LocalArtifact};
use crate::config::StoreConfig;
use crate::error::{AuthError, Error, Result, TransferError};
use crate::types::{BackupArtifact, sort_newest_first};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Short-lived bearer token for the Dropbox API
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// The raw bearer token
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Serialize)]
struct ListFolderRequest<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct ListFolderContinueRequest<'a> {
    cursor: &'a str,
}

#[derive(Deserialize)]
struct ListFolderResponse {
    #[serde(default)]
    entries: Vec<FolderEntry>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct FolderEntry {
    #[serde(rename = ".tag", default)]
    tag: Option<String>,
    name: String,
    #[serde(default)]
    path_display: Option<String>,
    #[serde(default)]
    server_modified: Option<String>,
}

#[derive(Serialize)]
struct TemporaryLinkRequest<'a> {
    path: &'a str,
}

#[derive(Deserialize)]
struct TemporaryLinkResponse {
    link: String,
}

/// Artifact store backed by the Dropbox HTTP API
///
/// Every operation first exchanges the configured refresh token for a fresh
/// bearer token. Metadata calls are bounded by `metadata_timeout`, the bulk
/// download by `download_timeout`.
///
/// # Examples
///
/// ```no_run
/// use pricelist_sync::config::StoreConfig;
/// use pricelist_sync::store::DropboxStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = DropboxStore::new(StoreConfig {
///     app_key: "key".into(),
///     app_secret: "secret".into(),
///     refresh_token: "refresh".into(),
///     ..Default::default()
/// })?;
/// let token = store.refresh_access_token().await?;
/// # Ok(())
/// # }
/// ```
pub struct DropboxStore {
    client: reqwest::Client,
    config: StoreConfig,
}

impl DropboxStore {
    /// Create a store client from configuration
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            Error::Transfer(TransferError::Request {
                operation: "http_client",
                reason: e.to_string(),
            })
        })?;
        Ok(Self { client, config })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), endpoint)
    }

    /// Exchange the stored refresh token for a bearer token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the endpoint refuses the credential,
    /// [`AuthError::Timeout`] if it does not answer within `metadata_timeout`.
    pub async fn refresh_access_token(&self) -> Result<AccessToken> {
        let response = self
            .client
            .post(self.api_url("oauth2/token"))
            .basic_auth(&self.config.app_key, Some(&self.config.app_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Timeout
                } else {
                    AuthError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "token refresh rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::Timeout
            } else {
                AuthError::MalformedResponse(e.to_string())
            }
        })?;

        match token.access_token {
            Some(token) if !token.is_empty() => {
                debug!("access token refreshed");
                Ok(AccessToken(token))
            }
            _ => Err(AuthError::MalformedResponse("missing access_token".to_string()).into()),
        }
    }

    /// POST a JSON body to an API endpoint and decode the JSON answer
    async fn post_api<B, R>(
        &self,
        operation: &'static str,
        endpoint: &str,
        token: &AccessToken,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.api_url(endpoint))
            .bearer_auth(token.secret())
            .json(body)
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(|e| request_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                operation,
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }
            .into());
        }

        response.json().await.map_err(|e| {
            if e.is_decode() {
                Error::from(TransferError::InvalidResponse {
                    operation,
                    reason: e.to_string(),
                })
            } else {
                request_error(operation, e)
            }
        })
    }

    /// Convert a folder entry into an artifact, skipping folders and foreign files
    fn to_artifact(&self, entry: FolderEntry) -> Result<Option<BackupArtifact>> {
        if matches!(entry.tag.as_deref(), Some(tag) if tag != "file") {
            return Ok(None);
        }

        let suffix = format!(
            ".{}",
            self.config
                .backup_extension
                .trim_start_matches('.')
                .to_ascii_lowercase()
        );
        if !entry.name.to_ascii_lowercase().ends_with(&suffix) {
            return Ok(None);
        }

        let Some(server_modified) = entry.server_modified else {
            debug!(name = %entry.name, "entry without server_modified, skipping");
            return Ok(None);
        };
        let modified = DateTime::parse_from_rfc3339(&server_modified)
            .map_err(|e| TransferError::InvalidResponse {
                operation: "list_folder",
                reason: format!(
                    "invalid server_modified '{}' for {}: {}",
                    server_modified, entry.name, e
                ),
            })?
            .with_timezone(&Utc);

        let path = entry.path_display.unwrap_or_else(|| {
            format!(
                "{}/{}",
                self.config.folder_path.trim_end_matches('/'),
                entry.name
            )
        });

        Ok(Some(BackupArtifact {
            name: entry.name,
            path,
            modified,
        }))
    }

    /// Stream the response body into `destination` through a `.part` sibling
    async fn write_body(
        &self,
        mut response: reqwest::Response,
        destination: &Path,
    ) -> Result<u64> {
        let part = part_path(destination);
        let write_failed = |e: std::io::Error| TransferError::WriteFailed {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::create(&part).await.map_err(write_failed)?;
        let mut written: u64 = 0;
        let streamed: Result<()> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| request_error("download", e))?
            {
                file.write_all(&chunk).await.map_err(write_failed)?;
                written += chunk.len() as u64;
            }
            file.sync_all().await.map_err(write_failed)?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = streamed {
            if let Err(remove_err) = tokio::fs::remove_file(&part).await {
                warn!(path = ?part, error = %remove_err, "failed to remove partial download");
            }
            return Err(e);
        }

        tokio::fs::rename(&part, destination)
            .await
            .map_err(write_failed)?;
        Ok(written)
    }
}

#[async_trait]
impl ArtifactStore for DropboxStore {
    async fn list_backups(&self) -> Result<Vec<BackupArtifact>> {
        let token = self.refresh_access_token().await?;

        let mut page: ListFolderResponse = self
            .post_api(
                "list_folder",
                "2/files/list_folder",
                &token,
                &ListFolderRequest {
                    path: &self.config.folder_path,
                },
            )
            .await?;

        let mut artifacts = Vec::new();
        loop {
            for entry in std::mem::take(&mut page.entries) {
                if let Some(artifact) = self.to_artifact(entry)? {
                    artifacts.push(artifact);
                }
            }

            match (page.has_more, page.cursor.take()) {
                (true, Some(cursor)) => {
                    page = self
                        .post_api(
                            "list_folder_continue",
                            "2/files/list_folder/continue",
                            &token,
                            &ListFolderContinueRequest { cursor: &cursor },
                        )
                        .await?;
                }
                (true, None) => {
                    return Err(TransferError::InvalidResponse {
                        operation: "list_folder",
                        reason: "has_more set without a cursor".to_string(),
                    }
                    .into());
                }
                (false, _) => break,
            }
        }

        sort_newest_first(&mut artifacts);
        info!(
            folder = %self.config.folder_path,
            count = artifacts.len(),
            "found backup files"
        );
        Ok(artifacts)
    }

    async fn download_latest(&self, destination: &Path) -> Result<LocalArtifact> {
        let latest = self
            .list_backups()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransferError::NoBackups {
                folder: self.config.folder_path.clone(),
            })?;

        info!(
            name = %latest.name,
            modified = %latest.modified,
            "downloading latest backup"
        );

        let token = self.refresh_access_token().await?;
        let link: TemporaryLinkResponse = self
            .post_api(
                "get_temporary_link",
                "2/files/get_temporary_link",
                &token,
                &TemporaryLinkRequest { path: &latest.path },
            )
            .await?;

        let response = self
            .client
            .get(&link.link)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| request_error("download", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                operation: "download",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }
            .into());
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::WriteFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        let size = self.write_body(response, destination).await?;
        info!(path = ?destination, size, "downloaded backup");

        Ok(LocalArtifact {
            artifact: latest,
            path: destination.to_path_buf(),
            size,
        })
    }

    fn name(&self) -> &'static str {
        "dropbox"
    }
}

fn request_error(operation: &'static str, e: reqwest::Error) -> Error {
    let reason = if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    TransferError::Request { operation, reason }.into()
}

/// Temporary path the download is streamed into before the final rename
pub(crate) fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
