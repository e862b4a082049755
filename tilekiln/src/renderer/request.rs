//! Resource loading for renderers.
//!
//! Styles reference tiles and data by URL. The handler resolves:
//!
//! - `http://` / `https://` - fetched with `reqwest`; 404 means "no data"
//! - `file://<absolute path>`
//! - `mbtiles://<name>/{z}/{x}/{y}` - tile from `<source_dir>/<name>.mbtiles`
//! - relative paths - looked up in the style directory, then the source
//!   directory
//!
//! A missing resource is `Ok(None)`, which renderers treat as an empty tile.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::archive::{MbtilesReader, MBTILES_EXTENSION};
use crate::coord::TileCoord;

const USER_AGENT: &str = concat!("tilekiln/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from resolving a resource.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("HTTP request for {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Archive source {name} failed: {message}")]
    Archive { name: String, message: String },

    #[error("Unsupported resource URL: {0}")]
    InvalidUrl(String),
}

/// Resolves resource URLs for one renderer instance.
pub struct ResourceRequestHandler {
    style_dir: PathBuf,
    source_dir: PathBuf,
    client: reqwest::Client,
    archives: Mutex<HashMap<String, MbtilesReader>>,
}

impl ResourceRequestHandler {
    /// Creates a handler rooted at the given directories.
    pub fn new(
        style_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
    ) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RequestError::Http {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            style_dir: style_dir.into(),
            source_dir: source_dir.into(),
            client,
            archives: Mutex::new(HashMap::new()),
        })
    }

    /// Directory relative style resources are resolved against first.
    pub fn style_dir(&self) -> &Path {
        &self.style_dir
    }

    /// Directory holding source archives and `metadata.json`.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Fetches a resource.
    pub async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, RequestError> {
        trace!(url = url, "Resource request");

        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url).await
        } else if let Some(rest) = url.strip_prefix("mbtiles://") {
            self.fetch_mbtiles(url, rest).await
        } else if let Some(path) = url.strip_prefix("file://") {
            read_optional(Path::new(path)).await
        } else if url.contains("://") {
            Err(RequestError::InvalidUrl(url.to_string()))
        } else {
            self.fetch_relative(url).await
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<Option<Vec<u8>>, RequestError> {
        let http_error = |message: String| RequestError::Http {
            url: url.to_string(),
            message,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = url, error = %e, is_timeout = e.is_timeout(), "HTTP request failed");
            http_error(e.to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::NO_CONTENT {
            debug!(url = url, status = status.as_u16(), "No data for resource");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(http_error(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http_error(format!("failed to read body: {}", e)))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn fetch_mbtiles(&self, url: &str, rest: &str) -> Result<Option<Vec<u8>>, RequestError> {
        let (name, coord) =
            parse_mbtiles_url(rest).ok_or_else(|| RequestError::InvalidUrl(url.to_string()))?;

        let archive_error = |message: String| RequestError::Archive {
            name: name.to_string(),
            message,
        };

        let reader = {
            let mut archives = self.archives.lock().await;
            match archives.get(name) {
                Some(reader) => reader.clone(),
                None => {
                    let path = self
                        .source_dir
                        .join(format!("{}.{}", name, MBTILES_EXTENSION));
                    let reader = MbtilesReader::open(&path)
                        .await
                        .map_err(|e| archive_error(e.to_string()))?;
                    debug!(name = name, path = %path.display(), "Opened source archive");
                    archives.insert(name.to_string(), reader.clone());
                    reader
                }
            }
        };

        reader
            .tile(coord)
            .await
            .map_err(|e| archive_error(e.to_string()))
    }

    async fn fetch_relative(&self, url: &str) -> Result<Option<Vec<u8>>, RequestError> {
        for dir in [&self.style_dir, &self.source_dir] {
            let path = dir.join(url);
            if let Some(data) = read_optional(&path).await? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    /// Closes any open source archives.
    pub async fn close(&self) {
        let mut archives = self.archives.lock().await;
        for (_, reader) in archives.drain() {
            reader.close().await;
        }
    }
}

impl std::fmt::Debug for ResourceRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRequestHandler")
            .field("style_dir", &self.style_dir)
            .field("source_dir", &self.source_dir)
            .finish()
    }
}

/// Reads a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, RequestError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RequestError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parses `<name>/<z>/<x>/<y>[.ext]`.
fn parse_mbtiles_url(rest: &str) -> Option<(&str, TileCoord)> {
    let mut parts = rest.rsplitn(4, '/');
    let y = parts.next()?;
    let x = parts.next()?;
    let z = parts.next()?;
    let name = parts.next()?;

    let y = y.split('.').next()?;
    if name.is_empty() {
        return None;
    }

    let coord = TileCoord::new(z.parse().ok()?, x.parse().ok()?, y.parse().ok()?).ok()?;
    Some((name, coord))
}
