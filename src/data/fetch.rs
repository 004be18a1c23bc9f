//! Asset fetching
//!
//! Overlays and tile layers never talk to the network directly. They go
//! through an [`AssetFetcher`], so a viewer can read assets from an HTTP
//! origin, a local directory, or an in-memory fake in tests.

use crate::core::config::{AssetConfig, AssetSource};
use crate::{MapError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared async HTTP client for tile fetching
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("cragmap/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to default HTTP client: {}", err);
            reqwest::Client::new()
        })
});

/// Fetches raw bytes for an asset path or URL
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Human-readable description used in log lines
    fn describe(&self) -> String {
        "asset fetcher".to_string()
    }
}

/// Builds the fetcher described by the asset configuration
pub fn fetcher_from_config(config: &AssetConfig) -> Result<Arc<dyn AssetFetcher>> {
    Ok(match &config.source {
        AssetSource::Http { base_url } => Arc::new(HttpFetcher::with_config(base_url, config)?),
        AssetSource::Directory { root } => Arc::new(DirectoryFetcher::new(root)),
    })
}

/// HTTP GET against an optional base URL. Absolute URLs bypass the base.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpFetcher {
    /// Fetcher for absolute URLs on the shared client
    pub fn shared() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            base_url: None,
        }
    }

    /// Fetcher resolving relative paths against `base_url`, on the shared client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            base_url: Some(base_url.into()),
        }
    }

    /// Fetcher with its own client honouring the configured timeout and user agent
    pub fn with_config(base_url: &str, config: &AssetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: Some(base_url.to_string()),
        })
    }

    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.resolve(path);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MapError::Http {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn describe(&self) -> String {
        match &self.base_url {
            Some(base) => format!("http fetcher ({})", base),
            None => "http fetcher".to_string(),
        }
    }
}

/// Reads assets from files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Maps an asset path onto the root. Parent-directory components are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(MapError::Io(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("asset path escapes root: {}", path),
                    )))
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl AssetFetcher for DirectoryFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.resolve(path)?;
        log::debug!("reading {}", file.display());
        Ok(tokio::fs::read(&file).await?)
    }

    fn describe(&self) -> String {
        format!("directory fetcher ({})", self.root.display())
    }
}
