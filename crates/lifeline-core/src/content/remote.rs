use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::sections::{fallback_stats, EventsSection, ImpactSection, StatItem};
use crate::clock::Clock;
use crate::fetch::{FetchOptions, FetchResponse, Fetcher};
use crate::loader::{DataLoader, Loaded};

pub const STATS_ENDPOINT: &str = "/api/stat/stats";
pub const EVENTS_ENDPOINT: &str = "/api/events";
pub const IMPACT_ENDPOINT: &str = "/api/impact";

pub const STATS_CACHE_KEY: &str = "stats-data";
pub const EVENTS_CACHE_KEY: &str = "events-data";

/// The stats endpoint answers with either a list or a single item.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Turn an envelope into data, or the reason there is none.
fn require_data(response: FetchResponse<Value>) -> Result<Value, String> {
    match response.into_result() {
        Ok(Some(data)) if !data.is_null() => Ok(data),
        Ok(_) => Err("No data received from API".to_string()),
        Err(e) => Err(e.user_message()),
    }
}

/// Sections served by the HTTP API, each loaded with fallback content.
#[derive(Clone)]
pub struct RemoteContent {
    fetcher: Fetcher,
    clock: Arc<dyn Clock>,
}

impl RemoteContent {
    pub fn new(fetcher: Fetcher, clock: Arc<dyn Clock>) -> Self {
        Self { fetcher, clock }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    async fn fetch_stats(self) -> Result<Vec<StatItem>, String> {
        let options = FetchOptions::new()
            .timeout(Duration::from_millis(10_000))
            .retries(2)
            .cache_key(STATS_CACHE_KEY)
            .ttl(Duration::from_millis(300_000));
        let data = require_data(self.fetcher.safe_fetch(STATS_ENDPOINT, options).await)?;
        match serde_json::from_value::<OneOrMany<StatItem>>(data).map_err(|e| e.to_string())? {
            OneOrMany::Many(stats) => Ok(stats),
            OneOrMany::One(stat) => Ok(vec![stat]),
        }
    }

    /// Headline counters.
    pub async fn load_stats(&self) -> Loaded<Vec<StatItem>> {
        let this = self.clone();
        DataLoader::new(Arc::clone(&self.clock))
            .load(move || this.clone().fetch_stats(), Some(fallback_stats()))
            .await
    }

    async fn fetch_events(self) -> Result<EventsSection, String> {
        let options = FetchOptions::new()
            .timeout(Duration::from_millis(15_000))
            .retries(3)
            .cache_key(EVENTS_CACHE_KEY)
            .ttl(Duration::from_millis(600_000));
        let data = require_data(self.fetcher.safe_fetch(EVENTS_ENDPOINT, options).await)?;
        serde_json::from_value(data).map_err(|e| e.to_string())
    }

    /// Upcoming events. The default section stands in after the first
    /// failure while retries run in the background.
    pub async fn load_events(&self) -> Loaded<EventsSection> {
        let this = self.clone();
        DataLoader::new(Arc::clone(&self.clock))
            .retry_on_error(true)
            .load(move || this.clone().fetch_events(), Some(EventsSection::default()))
            .await
    }

    async fn fetch_impact(self) -> Result<ImpactSection, String> {
        let options = FetchOptions::new().timeout(Duration::from_millis(5_000));
        let data = require_data(self.fetcher.safe_fetch(IMPACT_ENDPOINT, options).await)?;
        serde_json::from_value(data).map_err(|e| e.to_string())
    }

    pub async fn load_impact(&self) -> Loaded<ImpactSection> {
        let this = self.clone();
        DataLoader::new(Arc::clone(&self.clock))
            .load(move || this.clone().fetch_impact(), Some(ImpactSection::default()))
            .await
    }
}
