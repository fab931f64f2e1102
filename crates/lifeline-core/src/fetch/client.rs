use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::envelope::FetchResponse;
use super::transport::{ReqwestTransport, RequestDescriptor, Transport};
use super::FetchError;
use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::clock::Clock;
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// Per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries after the first attempt; 2 means at most 3 requests.
pub const DEFAULT_RETRIES: u32 = 2;

/// Backoff unit; the wait after attempt `n` (from 0) is `2^n` of these.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Strip surrounding whitespace, trailing slashes and a trailing `/api`
/// (any case) so endpoints written as `/api/...` never double the prefix.
pub fn normalize_api_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let len = trimmed.len();
    if len >= 4 && trimmed.is_char_boundary(len - 4) && trimmed[len - 4..].eq_ignore_ascii_case("/api") {
        trimmed[..len - 4].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Per-call options. Unset fields take the fetcher's defaults.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub cache_key: Option<String>,
    pub ttl: Option<Duration>,
    /// Overrides the fetcher-wide demo flag for this call.
    pub demo_mode: Option<bool>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = Some(demo_mode);
        self
    }
}

/// Outbound HTTP with timeouts, bounded retry and read-through caching.
/// Every call yields a `FetchResponse`; nothing here returns `Err`.
/// Clone is cheap; clones share the transport and the cache.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    base_url: String,
    demo_mode: bool,
    timeout: Duration,
    retries: u32,
    ttl: Duration,
    cache: TtlCache<FetchResponse<Value>>,
    clock: Arc<dyn Clock>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            base_url: normalize_api_host(base_url),
            demo_mode: false,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            ttl: DEFAULT_TTL,
            cache: TtlCache::new(Arc::clone(&clock)),
            clock,
        }
    }

    /// Reqwest-backed fetcher configured from `config`.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, FetchError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(transport, &config.api_base_url, clock)
            .with_demo_mode(config.client_demo_mode)
            .with_defaults(config.request_timeout(), config.retries, config.cache_ttl()))
    }

    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn with_defaults(mut self, timeout: Duration, retries: u32, ttl: Duration) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self.ttl = ttl;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn cache(&self) -> &TtlCache<FetchResponse<Value>> {
        &self.cache
    }

    /// Absolute `http(s)://` endpoints pass through; anything else is joined
    /// to the base host with exactly one `/`.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn describe(&self, endpoint: &str, options: &FetchOptions) -> RequestDescriptor {
        RequestDescriptor {
            url: self.url_for(endpoint),
            method: options.method.clone(),
            headers: options.headers.clone(),
            body: options.body.clone(),
            timeout: options.timeout.unwrap_or(self.timeout),
        }
    }

    /// Fetch `endpoint` and decode the body into `T`.
    ///
    /// In demo mode the demo envelope is returned and nothing is cached. With
    /// a cache key the call goes through the coalescing cache and only
    /// successful envelopes are stored. If that path fails, including when
    /// the cached body does not decode as `T`, the request is made again
    /// without the cache.
    pub async fn safe_fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: FetchOptions,
    ) -> FetchResponse<T> {
        let request = self.describe(endpoint, &options);
        let retries = options.retries.unwrap_or(self.retries);
        if options.demo_mode.unwrap_or(self.demo_mode) {
            info!(url = %request.url, "Demo mode: returning mock data");
            return Self::decode_lossy(FetchResponse::demo(), &request.url);
        }

        if let Some(key) = &options.cache_key {
            let ttl = options.ttl.unwrap_or(self.ttl);
            let this = self.clone();
            let cached_request = request.clone();
            let result = self
                .cache
                .get_or_fetch(
                    key,
                    ttl,
                    move || async move {
                        Ok::<_, anyhow::Error>(this.execute(&cached_request, retries).await)
                    },
                    |response: &FetchResponse<Value>| response.success,
                )
                .await;

            match result.map(FetchResponse::<Value>::decode::<T>) {
                Ok(Ok(response)) => return response,
                Ok(Err(e)) => {
                    warn!(key = %key, error = %e, "Cached response did not decode, refetching without cache")
                }
                Err(e) => warn!(key = %key, error = %e, "Cached fetch failed, refetching without cache"),
            }
        }

        let response = self.execute(&request, retries).await;
        Self::decode_lossy(response, &request.url)
    }

    fn decode_lossy<T: DeserializeOwned>(response: FetchResponse<Value>, url: &str) -> FetchResponse<T> {
        let fallback = FetchResponse {
            success: response.success,
            data: None,
            error: response.error.clone(),
            status: response.status,
            message: response.message.clone(),
        };
        match response.decode() {
            Ok(typed) => typed,
            Err(e) => {
                warn!(url, error = %e, "Response body did not match the expected shape");
                fallback
            }
        }
    }

    /// The retry loop. Completed HTTP exchanges are returned as they are;
    /// only transport failures are retried.
    async fn execute(&self, request: &RequestDescriptor, retries: u32) -> FetchResponse<Value> {
        let mut attempt: u32 = 0;
        loop {
            let result = match tokio::time::timeout(request.timeout, self.transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(request.timeout)),
            };

            match result {
                Ok(raw) => {
                    debug!(url = %request.url, status = raw.status, "Response received");
                    return FetchResponse::from_raw(&raw);
                }
                Err(e) if e.is_transport() && attempt < retries => {
                    let backoff = INITIAL_BACKOFF * 2u32.saturating_pow(attempt);
                    warn!(
                        url = %request.url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, backing off"
                    );
                    self.clock.sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(url = %request.url, attempts = attempt + 1, error = %e, "Request failed");
                    return FetchResponse::failure(&e);
                }
            }
        }
    }

    /// Warm the cache for `key`. Failures are logged, never raised.
    pub async fn prefetch(&self, key: &str, endpoint: &str, ttl: Option<Duration>) {
        let mut options = FetchOptions::new().cache_key(key);
        if let Some(ttl) = ttl {
            options = options.ttl(ttl);
        }
        let response: FetchResponse<Value> = self.safe_fetch(endpoint, options).await;
        if !response.success {
            warn!(
                key,
                endpoint,
                error = response.error.as_deref().unwrap_or_default(),
                "Prefetch failed"
            );
        }
    }

    /// Issue all requests concurrently; results keep the input order.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        requests: Vec<(String, FetchOptions)>,
    ) -> Vec<FetchResponse<T>> {
        join_all(
            requests
                .into_iter()
                .map(|(endpoint, options)| async move { self.safe_fetch(&endpoint, options).await }),
        )
        .await
    }

    /// Drop cached responses whose key matches `pattern`.
    pub fn invalidate(&self, pattern: &Regex) -> usize {
        let removed = self.cache.invalidate_matching(pattern);
        debug!(pattern = %pattern, removed, "Invalidated cached responses");
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, TokioClock};
    use crate::fetch::transport::RawResponse;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replays scripted results, repeating the last one.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, FetchError>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<RawResponse, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.url.clone());
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    /// Never answers.
    struct HangingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(&self, _request: &RequestDescriptor) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::pending().await
        }
    }

    fn ok(body: &str) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 200,
            reason: "OK".into(),
            body: body.into(),
        })
    }

    fn refused() -> Result<RawResponse, FetchError> {
        Err(FetchError::Network("connection refused".into()))
    }

    #[test]
    fn test_normalize_api_host() {
        assert_eq!(normalize_api_host("  https://api.example.org/api/  "), "https://api.example.org");
        assert_eq!(normalize_api_host("https://api.example.org/API"), "https://api.example.org");
        assert_eq!(normalize_api_host("https://api.example.org///"), "https://api.example.org");
        assert_eq!(normalize_api_host("https://example.org/rapid"), "https://example.org/rapid");
        assert_eq!(normalize_api_host(""), "");
    }

    #[test]
    fn test_url_for() {
        let fetcher = Fetcher::new(
            ScriptedTransport::new(vec![ok("{}")]),
            "https://api.example.org/api/",
            Arc::new(ManualClock::new()),
        );
        assert_eq!(fetcher.url_for("/api/stats"), "https://api.example.org/api/stats");
        assert_eq!(fetcher.url_for("api/stats"), "https://api.example.org/api/stats");
        assert_eq!(fetcher.url_for("http://other.example.org/x"), "http://other.example.org/x");
    }

    #[tokio::test]
    async fn test_transport_failures_retry_with_backoff() {
        let transport = ScriptedTransport::new(vec![refused()]);
        let clock = Arc::new(ManualClock::new());
        let fetcher = Fetcher::new(transport.clone(), "http://localhost:5000", clock.clone());

        let response: FetchResponse<Value> = fetcher.safe_fetch("/api/stat/stats", FetchOptions::new()).await;

        assert!(!response.success);
        assert_eq!(response.status, 0);
        assert_eq!(
            response.error.as_deref(),
            Some("Unable to connect to server. Please check if the API is running.")
        );
        assert_eq!(transport.calls(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_recovers_on_later_attempt() {
        let transport = ScriptedTransport::new(vec![refused(), ok(r#"{"value": 1}"#)]);
        let clock = Arc::new(ManualClock::new());
        let fetcher = Fetcher::new(transport.clone(), "", clock.clone());

        let response: FetchResponse<Value> = fetcher.safe_fetch("/api/x", FetchOptions::new()).await;

        assert!(response.success);
        assert_eq!(response.data, Some(json!({"value": 1})));
        assert_eq!(transport.calls(), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_time_out() {
        let transport = Arc::new(HangingTransport {
            calls: AtomicUsize::new(0),
        });
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(TokioClock));

        let started = tokio::time::Instant::now();
        let response: FetchResponse<Value> = fetcher
            .safe_fetch("/api/impact", FetchOptions::new().timeout(Duration::from_millis(100)))
            .await;

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(response.status, 0);
        assert_eq!(
            response.error.as_deref(),
            Some("Request timeout. Server may be overloaded or offline.")
        );
    }

    #[tokio::test]
    async fn test_other_transport_error_keeps_message() {
        let transport = ScriptedTransport::new(vec![Err(FetchError::Other("builder error".into()))]);
        let fetcher = Fetcher::new(transport, "", Arc::new(ManualClock::new()));

        let response: FetchResponse<Value> = fetcher.safe_fetch("x", FetchOptions::new().retries(0)).await;

        assert_eq!(response.error.as_deref(), Some("builder error"));
    }

    #[tokio::test]
    async fn test_demo_mode_skips_transport() {
        let transport = ScriptedTransport::new(vec![ok("{}")]);
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(ManualClock::new())).with_demo_mode(true);

        let response: FetchResponse<Value> = fetcher.safe_fetch("/api/events", FetchOptions::new()).await;
        assert_eq!(response, FetchResponse::demo());

        // Per-call flag overrides the fetcher-wide one
        let response: FetchResponse<Value> = fetcher
            .safe_fetch("/api/events", FetchOptions::new().demo_mode(false))
            .await;
        assert!(response.success);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_demo_envelope_is_not_cached() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"live": true}"#)]);
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(ManualClock::new()));

        let demo: FetchResponse<Value> = fetcher
            .safe_fetch("/api/events", FetchOptions::new().cache_key("events").demo_mode(true))
            .await;
        assert_eq!(demo, FetchResponse::demo());
        assert!(fetcher.cache().get("events").is_none());
        assert_eq!(transport.calls(), 0);

        let live: FetchResponse<Value> = fetcher
            .safe_fetch("/api/events", FetchOptions::new().cache_key("events").demo_mode(false))
            .await;
        assert_eq!(live.data, Some(json!({"live": true})));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_error_from_transport_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(FetchError::http(503, "busy"))]);
        let clock = Arc::new(ManualClock::new());
        let fetcher = Fetcher::new(transport.clone(), "", clock.clone());

        let response: FetchResponse<Value> = fetcher.safe_fetch("/api/stat/stats", FetchOptions::new()).await;

        assert!(!response.success);
        assert_eq!(response.status, 503);
        assert_eq!(response.error.as_deref(), Some("busy"));
        assert_eq!(transport.calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_failed_envelopes_are_not_cached() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse {
                status: 503,
                reason: "Service Unavailable".into(),
                body: String::new(),
            }),
            ok(r#"{"n": 1}"#),
        ]);
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(ManualClock::new()));
        let options = || FetchOptions::new().cache_key("stats-data");

        let first: FetchResponse<Value> = fetcher.safe_fetch("/api/stat/stats", options()).await;
        assert!(!first.success);
        assert!(fetcher.cache().get("stats-data").is_none());

        let second: FetchResponse<Value> = fetcher.safe_fetch("/api/stat/stats", options()).await;
        let third: FetchResponse<Value> = fetcher.safe_fetch("/api/stat/stats", options()).await;
        assert_eq!(second.data, Some(json!({"n": 1})));
        assert_eq!(second, third);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_cached_body_falls_back_to_uncached_fetch() {
        #[derive(Debug, Deserialize)]
        struct Stats {
            #[allow(dead_code)]
            count: u32,
        }

        let transport = ScriptedTransport::new(vec![ok(r#"{"count": "many"}"#)]);
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(ManualClock::new()));

        let response: FetchResponse<Stats> = fetcher
            .safe_fetch("/api/stats", FetchOptions::new().cache_key("stats"))
            .await;

        assert!(response.success);
        assert!(response.data.is_none());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let transport = ScriptedTransport::new(vec![ok("{}")]);
        let fetcher = Fetcher::new(transport.clone(), "", Arc::new(ManualClock::new()));

        fetcher.prefetch("events-data", "/api/events", None).await;
        fetcher.prefetch("stats-data", "/api/stats", None).await;
        assert_eq!(fetcher.cache().len(), 2);

        assert_eq!(fetcher.invalidate(&Regex::new("^events").unwrap()), 1);
        fetcher.clear_cache();
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_order() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"a": 1}"#), ok(r#"{"b": 2}"#)]);
        let fetcher = Fetcher::new(transport.clone(), "http://h", Arc::new(ManualClock::new()));

        let results: Vec<FetchResponse<Value>> = fetcher
            .fetch_all(vec![
                ("/one".to_string(), FetchOptions::new()),
                ("/two".to_string(), FetchOptions::new()),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(transport.calls(), 2);
        assert_eq!(*transport.seen.lock().unwrap(), vec!["http://h/one", "http://h/two"]);
    }

    // ===== reqwest transport against a mock server =====

    fn live_fetcher(server: &MockServer) -> Fetcher {
        let transport = Arc::new(ReqwestTransport::new().expect("failed to create transport"));
        Fetcher::new(transport, &format!("{}/api", server.uri()), Arc::new(TokioClock))
    }

    #[tokio::test]
    async fn test_live_success_flag_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/newsletter/subscribe"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "message": "Already subscribed"})),
            )
            .mount(&server)
            .await;

        let response: FetchResponse<Value> = live_fetcher(&server)
            .safe_fetch(
                "/api/newsletter/subscribe",
                FetchOptions::new()
                    .method(Method::POST)
                    .json(json!({"email": "a@example.org"})),
            )
            .await;

        assert!(!response.success);
        assert_eq!(response.status, 200);
        assert_eq!(response.error.as_deref(), Some("Already subscribed"));
    }

    #[tokio::test]
    async fn test_live_server_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/impact"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let response: FetchResponse<Value> = live_fetcher(&server)
            .safe_fetch("/api/impact", FetchOptions::new())
            .await;

        assert!(!response.success);
        assert_eq!(response.status, 500);
        assert_eq!(response.data, None);
        assert_eq!(response.error.as_deref(), Some("500 Internal Server Error"));
    }

    #[tokio::test]
    async fn test_live_concurrent_cached_calls_coalesce() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stat/stats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"stats": [{"number": 5000}]}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = live_fetcher(&server);
        let options = || FetchOptions::new().cache_key("stats-data");
        let (a, b): (FetchResponse<Value>, FetchResponse<Value>) = tokio::join!(
            fetcher.safe_fetch("/api/stat/stats", options()),
            fetcher.safe_fetch("/api/stat/stats", options()),
        );

        assert!(a.success);
        assert_eq!(a, b);
        assert_eq!(fetcher.cache().in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_live_connection_refused() {
        let transport = Arc::new(ReqwestTransport::new().expect("failed to create transport"));
        let fetcher = Fetcher::new(transport, "http://127.0.0.1:9", Arc::new(TokioClock));

        let response: FetchResponse<Value> = fetcher
            .safe_fetch("/api/stats", FetchOptions::new().retries(0))
            .await;

        assert_eq!(response.status, 0);
        assert_eq!(
            response.error.as_deref(),
            Some("Unable to connect to server. Please check if the API is running.")
        );
    }
}
