//! TMDB metadata provider
//!
//! API Flow:
//! 1. Details: /movie/{id}?api_key=... -> id, title, genres[].name
//! 2. Popular: /movie/popular?api_key=...&page=N -> results[] (no genre names)
//!
//! Every attempt runs under the configured timeout; transient failures are
//! retried according to the configured [`RetryPolicy`].
//!
//! Item ids are TMDB movie ids (digits only) and are checked before any
//! request is built.

use crate::error::{MetadataError, Result};
use crate::fetcher::MetadataFetcher;
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use catalog::Item;
use reqwest::{Client as HttpClient, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`TmdbClient`]
#[derive(Clone)]
pub struct MetadataConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl MetadataConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl fmt::Debug for MetadataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// TMDB movie ids are positive integers
fn check_item_id(item_id: &str) -> Result<()> {
    if item_id.is_empty() || !item_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MetadataError::InvalidItemId(item_id.to_string()));
    }
    Ok(())
}

// TMDB response shapes

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TmdbId {
    Number(i64),
    Text(String),
}

impl TmdbId {
    fn into_item_id(self) -> String {
        match self {
            TmdbId::Number(n) => n.to_string(),
            TmdbId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: TmdbId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
}

impl From<TmdbMovie> for Item {
    fn from(movie: TmdbMovie) -> Self {
        let mut item = Item::bare(movie.id.into_item_id());
        item.name = movie.title.or(movie.name).filter(|n| !n.is_empty());
        item.genres = movie.genres.into_iter().map(|g| g.name).collect();
        item
    }
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    results: Vec<TmdbMovie>,
}

/// HTTP client for The Movie Database
#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    base_url: Url,
    config: MetadataConfig,
}

impl TmdbClient {
    /// Fails with [`MetadataError::MissingCredential`] when the API key is
    /// empty, and with [`MetadataError::InvalidBaseUrl`] when the base URL
    /// cannot carry a path
    pub fn new(config: MetadataConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MetadataError::MissingCredential);
        }

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| MetadataError::InvalidBaseUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MetadataError::InvalidBaseUrl(config.base_url.clone()));
        }

        Ok(Self {
            http_client: HttpClient::new(),
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Append `segments` to the base path, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MetadataError::InvalidBaseUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// One request, no retry
    async fn send<T: DeserializeOwned>(&self, url: &Url, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .http_client
            .get(url.clone())
            .query(&[("api_key", self.config.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MetadataError::Parse(e.to_string()))
    }

    /// One request under the configured timeout
    async fn attempt<T: DeserializeOwned>(&self, url: &Url, query: &[(&str, String)]) -> Result<T> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.send(url, query))
            .await
            .map_err(|_| MetadataError::Timeout(timeout))?
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        with_retry(&self.config.retry, || self.attempt(&url, query)).await
    }

    /// Fetch one page of the provider's popular list
    #[instrument(skip(self))]
    pub async fn fetch_popular(&self, page: u32) -> Result<Vec<Item>> {
        let page: TmdbPage = self
            .get_json(&["movie", "popular"], &[("page", page.to_string())])
            .await?;

        let items: Vec<Item> = page.results.into_iter().map(Item::from).collect();
        debug!("Fetched {} popular items", items.len());
        Ok(items)
    }
}

#[async_trait]
impl MetadataFetcher for TmdbClient {
    #[instrument(skip(self))]
    async fn fetch(&self, item_id: &str) -> Result<Item> {
        check_item_id(item_id)?;
        let movie: TmdbMovie = self.get_json(&["movie", item_id], &[]).await?;
        let item = Item::from(movie);
        debug!("Fetched metadata for {}", item.id);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, retry: RetryPolicy) -> TmdbClient {
        let config = MetadataConfig::new("test-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(2))
            .with_retry(retry);
        TmdbClient::new(config).unwrap()
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_key_is_missing_credential() {
        let result = TmdbClient::new(MetadataConfig::new("  "));
        assert!(matches!(result, Err(MetadataError::MissingCredential)));
    }

    #[test]
    fn test_default_config() {
        let config = MetadataConfig::new("k");
        assert_eq!(config.base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 2);
    }

    #[tokio::test]
    async fn test_fetch_maps_movie_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 603,
                "title": "The Matrix",
                "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
                "runtime": 136
            })))
            .expect(1)
            .mount(&server)
            .await;

        let item = client_for(&server, RetryPolicy::none()).fetch("603").await.unwrap();

        assert_eq!(item.id, "603");
        assert_eq!(item.name.as_deref(), Some("The Matrix"));
        assert_eq!(item.category, "movie");
        assert!(item.genres.contains("Action"));
        assert!(item.genres.contains("Science Fiction"));
    }

    #[tokio::test]
    async fn test_fetch_accepts_string_id_and_name_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "42",
                "name": "Some Show"
            })))
            .mount(&server)
            .await;

        let item = client_for(&server, RetryPolicy::none()).fetch("42").await.unwrap();
        assert_eq!(item.id, "42");
        assert_eq!(item.name.as_deref(), Some("Some Show"));
        assert!(item.genres.is_empty());
    }

    #[tokio::test]
    async fn test_non_numeric_ids_never_reach_the_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "title": "Wrong endpoint"
            })))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::none());
        for item_id in ["popular", "603/videos", "603?append=x", "../tv/1", "", "tt01"] {
            let err = client.fetch(item_id).await.unwrap_err();
            assert!(
                matches!(&err, MetadataError::InvalidItemId(id) if id == item_id),
                "{item_id:?} gave {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/603"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 603, "title": "The Matrix"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = MetadataConfig::new("test-key")
            .with_base_url(format!("{}/3/", server.uri()))
            .with_retry(RetryPolicy::none());
        let item = TmdbClient::new(config).unwrap().fetch("603").await.unwrap();
        assert_eq!(item.id, "603");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = TmdbClient::new(MetadataConfig::new("k").with_base_url("not a url"));
        assert!(matches!(result, Err(MetadataError::InvalidBaseUrl(_))));

        let result = TmdbClient::new(MetadataConfig::new("k").with_base_url("mailto:me@example.com"));
        assert!(matches!(result, Err(MetadataError::InvalidBaseUrl(_))));
    }

    #[tokio::test]
    async fn test_network_error_hides_api_key() {
        // Grab a free port, then close it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = MetadataConfig::new("SECRET-KEY-123")
            .with_base_url(format!("http://{}", addr))
            .with_retry(RetryPolicy::none());
        let err = TmdbClient::new(config).unwrap().fetch("603").await.unwrap_err();
        assert!(matches!(err, MetadataError::Network(_)));

        let mut chain = vec![err.to_string(), format!("{:?}", err)];
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        for text in chain {
            assert!(!text.contains("SECRET-KEY-123"), "key leaked: {text}");
        }
    }

    #[test]
    fn test_config_debug_hides_api_key() {
        let rendered = format!("{:?}", MetadataConfig::new("SECRET-KEY-123"));
        assert!(!rendered.contains("SECRET-KEY-123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, fast_retry(3)).fetch("1").await.unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_id_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "No Id"})))
            .mount(&server)
            .await;

        let err = client_for(&server, RetryPolicy::none()).fetch("1").await.unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, fast_retry(3)).fetch("404").await.unwrap_err();
        assert!(matches!(err, MetadataError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/7"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server, fast_retry(2)).fetch("7").await.unwrap_err();
        assert!(matches!(err, MetadataError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 9, "title": "Late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = MetadataConfig::new("test-key")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(50))
            .with_retry(RetryPolicy::none());
        let err = TmdbClient::new(config).unwrap().fetch("9").await.unwrap_err();
        assert!(matches!(err, MetadataError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_popular() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .and(query_param("page", "2"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 2,
                "results": [
                    {"id": 550, "title": "Fight Club", "genre_ids": [18]},
                    {"id": 13, "title": "Forrest Gump", "genre_ids": [35, 18]}
                ]
            })))
            .mount(&server)
            .await;

        let items = client_for(&server, RetryPolicy::none()).fetch_popular(2).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["550", "13"]);
        assert_eq!(items[0].name.as_deref(), Some("Fight Club"));
    }
}
