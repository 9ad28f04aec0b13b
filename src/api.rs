//! Typed access to the storage api endpoints.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ClientError;
use crate::models::{DeleteRequest, DirectoryEntry, MkdirRequest, RenameRequest};
use crate::path::NavigationPath;

/// multipart field carrying the file itself
pub const UPLOAD_FILE_FIELD: &str = "files";
/// multipart field carrying the destination directory
pub const UPLOAD_PATH_FIELD: &str = "path";

/// thin client over the six storage endpoints
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

// turn a non-2xx response into an error
fn ensure_success(response: Response, operation: &'static str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::warn!("{} failed with status {}", operation, status);
        Err(ClientError::HttpStatus { operation, status })
    }
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        // without the trailing slash url joins would replace the last segment
        let mut base = config.api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        tracing::debug!("Api client targeting {}", base);
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    /// url of the listing endpoint; the query is omitted at the root
    pub fn list_url(&self, path: &NavigationPath) -> Result<Url, ClientError> {
        let mut url = self.endpoint("api/list")?;
        if !path.is_root() {
            url.set_query(Some(&format!("path={}", path.to_query_string())));
        }
        Ok(url)
    }

    /// url a file can be fetched from
    pub fn download_url(&self, path: &NavigationPath) -> Result<Url, ClientError> {
        self.endpoint(&format!("api/download/{}", path.to_download_segment()))
    }

    pub async fn list(&self, path: &NavigationPath) -> Result<Vec<DirectoryEntry>, ClientError> {
        let url = self.list_url(path)?;
        tracing::debug!("Listing directory {} ({})", path, url);

        let response = self.http.get(url).send().await?;
        let body = ensure_success(response, "Loading files")?.bytes().await?;
        let entries: Vec<DirectoryEntry> = serde_json::from_slice(&body)?;

        tracing::trace!("Received {} entries for {}", entries.len(), path);
        Ok(entries)
    }

    pub async fn mkdir(&self, parent: &NavigationPath, name: &str) -> Result<(), ClientError> {
        tracing::debug!("Creating folder {:?} in {}", name, parent);
        let body = MkdirRequest {
            name: name.to_string(),
            path: parent.to_display_string(),
        };
        let response = self
            .http
            .post(self.endpoint("api/mkdir")?)
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "Creating folder")?;
        Ok(())
    }

    pub async fn rename(&self, old: &NavigationPath, new: &NavigationPath) -> Result<(), ClientError> {
        tracing::debug!("Renaming {} -> {}", old, new);
        let body = RenameRequest {
            old: old.to_display_string(),
            new: new.to_display_string(),
        };
        let response = self
            .http
            .post(self.endpoint("api/rename")?)
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "Rename")?;
        Ok(())
    }

    pub async fn delete(&self, path: &NavigationPath) -> Result<(), ClientError> {
        tracing::debug!("Deleting {}", path);
        let body = DeleteRequest {
            path: path.to_display_string(),
        };
        let response = self
            .http
            .post(self.endpoint("api/delete")?)
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "Delete")?;
        Ok(())
    }

    /// send one file part to the upload endpoint and hand back the raw status.
    /// the caller decides what counts as success (the api answers 201).
    pub async fn upload(&self, part: Part, destination: &NavigationPath) -> Result<StatusCode, ClientError> {
        let form = Form::new()
            .part(UPLOAD_FILE_FIELD, part)
            .text(UPLOAD_PATH_FIELD, destination.to_display_string());

        let response = self
            .http
            .post(self.endpoint("api/upload")?)
            .multipart(form)
            .send()
            .await?;
        Ok(response.status())
    }

    /// stream a remote file into `dest_dir`, named after its last segment
    /// (with a ` (n)` suffix when that name is taken)
    pub async fn download(&self, path: &NavigationPath, dest_dir: &Path) -> Result<PathBuf, ClientError> {
        let name = match path.file_name() {
            Some(name) if name != "." && name != ".." => name,
            _ => return Err(ClientError::validation("Please choose a file to download")),
        };

        let url = self.download_url(path)?;
        tracing::debug!("Downloading {} from {}", path, url);
        let response = ensure_success(self.http.get(url).send().await?, "Download")?;

        // hidden partial file, renamed into place only once complete.
        // an existing local file is never overwritten.
        let partial = dest_dir.join(format!(".{}.{}.part", name, Uuid::new_v4().simple()));
        let saved = async {
            let written = write_body(response, &partial).await?;
            let target = free_target(dest_dir, name).await?;
            tokio::fs::rename(&partial, &target).await?;
            Ok::<_, ClientError>((written, target))
        }
        .await;
        let (written, target) = match saved {
            Ok(saved) => saved,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tracing::info!("⬇️  Downloaded {} ({} bytes) to {:?}", path, written, target);
        Ok(target)
    }
}

async fn write_body(response: Response, partial: &Path) -> Result<u64, ClientError> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.sync_all().await?;
    Ok(written)
}

// `a.txt`, or `a (1).txt`, `a (2).txt`, ... when that is taken
async fn free_target(dir: &Path, name: &str) -> Result<PathBuf, ClientError> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };
    let mut n = 1u32;
    loop {
        let numbered = match extension {
            Some(extension) => format!("{} ({}).{}", stem, n, extension),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
