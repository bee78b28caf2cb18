// src/fetch.rs

//! Source fetching with retry and bounded concurrency
//!
//! [`SourceFetcher`] resolves a [`FileSource`] plus relative path segments
//! into retrieved bytes. All requests run on a bounded worker pool whose
//! thread count is the admission-control limit for in-flight requests,
//! whether they fetch a manifest, a checksum map, or an asset.
//! Clones share the pool and HTTP client, so one fetcher can scope the
//! limit to a batch or serve as the process-wide default.

use rayon::ThreadPool;
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{FileSource, GitHubRef};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of concurrently in-flight requests
pub const DEFAULT_CONCURRENT_FETCHES: usize = 8;

/// Maximum attempts for a failed fetch
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Fixed delay between retry attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// URL template GitHub sources are rewritten through
pub const DEFAULT_GITHUB_URL_TEMPLATE: &str =
    "https://raw.githubusercontent.com/{owner}/{repo}/{ref_path}/{path}";

/// Tunables for [`SourceFetcher`]
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Worker count of the fetch pool, bounding concurrent requests
    pub concurrent_fetches: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Template with `{owner}`/`{repo}`/`{ref}`/`{ref_path}`/`{path}`
    /// placeholders for resolving GitHub sources
    pub github_url_template: String,
    /// Optional proxy URL applied to all requests
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrent_fetches: DEFAULT_CONCURRENT_FETCHES,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            github_url_template: DEFAULT_GITHUB_URL_TEMPLATE.to_string(),
            proxy: None,
        }
    }
}

/// HTTP fetcher with retry support and a bounded worker pool
#[derive(Clone)]
pub struct SourceFetcher {
    client: Client,
    pool: Arc<ThreadPool>,
    max_retries: u32,
    retry_delay: Duration,
    github_url_template: String,
}

impl SourceFetcher {
    /// Create a fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&FetchConfig::default())
    }

    /// Create a fetcher from explicit configuration
    pub fn with_config(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(HTTP_TIMEOUT);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::InitError(format!("Invalid proxy `{}`: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrent_fetches.max(1))
            .thread_name(|i| format!("fetch-{}", i))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create fetch pool: {}", e)))?;

        Ok(Self {
            client,
            pool: Arc::new(pool),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay,
            github_url_template: config.github_url_template.clone(),
        })
    }

    /// The worker pool bounding this fetcher's concurrency; batch operations
    /// fan out on it so nested fetches share the same limit
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Resolve a source plus relative path segments into a URL
    pub fn resolve_url(&self, source: &FileSource, segments: &[&str]) -> String {
        let base = match source {
            FileSource::Url { url } => url.clone(),
            FileSource::GitHub {
                owner,
                repo,
                path,
                git_ref,
            } => self.github_base_url(owner, repo, git_ref, path.as_deref()),
        };
        join_url(&base, segments)
    }

    fn github_base_url(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &GitHubRef,
        path: Option<&str>,
    ) -> String {
        self.github_url_template
            .replace("{owner}", owner)
            .replace("{repo}", repo)
            .replace("{ref}", git_ref.name())
            .replace("{ref_path}", &git_ref.ref_path())
            .replace("{path}", path.unwrap_or(""))
    }

    /// Fetch a file under `source`, retrying on transport and HTTP-status
    /// failures; runs on the bounded pool
    pub fn fetch(&self, source: &FileSource, segments: &[&str]) -> Result<Vec<u8>> {
        let url = self.resolve_url(source, segments);
        self.pool.install(|| self.fetch_url(&url))
    }

    fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.client.get(url).send() {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.bytes() {
                            Ok(bytes) => return Ok(bytes.to_vec()),
                            Err(e) => Error::FetchError(format!(
                                "Failed to read response from {}: {}",
                                url, e
                            )),
                        }
                    } else {
                        Error::FetchError(format!("HTTP {} from {}", response.status(), url))
                    }
                }
                Err(e) => Error::FetchError(format!("Request to {} failed: {}", url, e)),
            };

            if attempt >= self.max_retries {
                return Err(error);
            }
            warn!(
                "Fetch attempt {} / {} failed: {}, retrying...",
                attempt, self.max_retries, error
            );
            std::thread::sleep(self.retry_delay);
        }
    }
}

/// Join non-empty path segments onto a base URL
fn join_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(segment);
    }
    url
}
