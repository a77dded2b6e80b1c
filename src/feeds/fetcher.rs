use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::tsml::{self, RawMeeting};
use super::{FeedSource, FetchError};

const DEFAULT_USER_AGENT: &str = concat!("proofmeet-sync/", env!("CARGO_PKG_VERSION"));

/// Third-party scraping proxy used for feeds that block automated clients.
/// The target URL is passed as a query parameter alongside the API key.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl ProxyConfig {
    pub fn wrap(&self, target: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| FetchError::Proxy(format!("bad proxy endpoint '{}': {}", self.endpoint, e)))?;
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", target);
        Ok(url)
    }
}

/// Outcome of fetching one source.
#[derive(Debug)]
pub struct SourceFetch {
    pub source: FeedSource,
    pub result: Result<Vec<RawMeeting>, FetchError>,
}

/// HTTP client for TSML feeds. Cheap to clone.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
    proxy: Option<ProxyConfig>,
    max_concurrency: usize,
}

impl FeedFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    pub fn new(
        timeout: Duration,
        proxy: Option<ProxyConfig>,
        max_concurrency: usize,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self::with_client(client, proxy, max_concurrency))
    }

    pub fn with_client(client: Client, proxy: Option<ProxyConfig>, max_concurrency: usize) -> Self {
        Self {
            client,
            proxy,
            max_concurrency: max_concurrency.max(1),
        }
    }

    fn request_url(&self, source: &FeedSource) -> Result<Url, FetchError> {
        if source.use_proxy {
            let proxy = self.proxy.as_ref().ok_or_else(|| {
                FetchError::Proxy(format!(
                    "feed '{}' requires the bypass proxy but none is configured",
                    source.name
                ))
            })?;
            proxy.wrap(&source.url)
        } else {
            Url::parse(&source.url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", source.url, e)))
        }
    }

    /// Fetch and parse a single feed.
    pub async fn fetch(&self, source: &FeedSource) -> Result<Vec<RawMeeting>, FetchError> {
        let url = self.request_url(source)?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let meetings = tsml::parse_feed(&body, source.format)?;
        log::info!("Fetched {} records from feed '{}'", meetings.len(), source.name);
        Ok(meetings)
    }

    /// Fetch every source concurrently, at most `max_concurrency` at a time.
    ///
    /// Results come back in the order of `sources`, one per source; a failure
    /// is confined to its own entry.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Vec<SourceFetch> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.iter().cloned().enumerate() {
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = fetcher.fetch(&source).await;
                (index, SourceFetch { source, result })
            });
        }

        let mut slots: Vec<Option<SourceFetch>> = sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, fetched)) => slots[index] = Some(fetched),
                Err(e) => log::error!("Feed fetch task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(sources)
            .map(|(slot, source)| {
                slot.unwrap_or_else(|| SourceFetch {
                    source: source.clone(),
                    result: Err(FetchError::Aborted),
                })
            })
            .collect()
    }
}
