//! Service context.
//!
//! `Lifeline` owns one instance of every component, built from a `Config`,
//! and is the only place they are wired together.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::TtlCache;
use crate::clock::{Clock, TokioClock};
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::content::{ContentService, RemoteContent};
use crate::executor::Executor;
use crate::fetch::Fetcher;
use crate::store::connector_for_url;

pub struct Lifeline {
    config: Config,
    connection: Arc<ConnectionManager>,
    executor: Executor,
    fetcher: Fetcher,
    content: ContentService,
    sweepers: Vec<JoinHandle<()>>,
}

impl Lifeline {
    /// Build everything from `config` and connect to the store. Returns once
    /// the store is connected or demo mode is active.
    pub async fn init(config: Config) -> Result<Self> {
        Self::init_with_clock(config, Arc::new(TokioClock)).await
    }

    pub async fn init_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let connector = connector_for_url(&config.store_url);
        info!(
            store = %connector.describe(),
            demo_mode = config.demo_mode,
            "Initializing"
        );

        let connection = Arc::new(ConnectionManager::new(
            connector,
            config.connection_settings(),
            Arc::clone(&clock),
            config.demo_mode,
        ));

        let executor = Executor::new(Arc::clone(&connection), TtlCache::new(Arc::clone(&clock)))
            .with_default_ttl(config.cache_ttl());

        let fetcher = Fetcher::from_config(&config, Arc::clone(&clock))
            .context("Failed to create HTTP client")?;

        let content = ContentService::new(executor.clone())
            .with_remote(RemoteContent::new(fetcher.clone(), Arc::clone(&clock)));

        let sweepers = vec![
            executor.cache().spawn_sweeper(config.sweep_interval()),
            fetcher.cache().spawn_sweeper(config.sweep_interval()),
        ];

        connection.supervise().await;
        info!(state = %connection.state(), "Store ready");

        Ok(Self {
            config,
            connection,
            executor,
            fetcher,
            content,
            sweepers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn content(&self) -> &ContentService {
        &self.content
    }

    /// Stop background tasks and close the store. Never fails.
    pub async fn shutdown(self) {
        info!("Shutting down");
        for sweeper in self.sweepers {
            sweeper.abort();
        }
        self.connection.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::content::{CtaSection, SectionKind};
    use serde_json::json;
    use std::time::Duration;

    fn config(store_url: &str) -> Config {
        Config {
            store_url: store_url.to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_init_with_memory_store_connects() {
        let lifeline = Lifeline::init(config("memory://")).await.unwrap();
        assert_eq!(lifeline.connection().state(), ConnectionState::Connected);

        let saved = lifeline
            .content()
            .save_cta(json!({"id": "main-cta", "title": "Live"}))
            .await
            .unwrap();
        assert_eq!(saved.data["title"], "Live");

        lifeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_init_with_file_store_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());

        let mut cta = serde_json::to_value(CtaSection::default()).unwrap();
        cta["title"] = json!("Persisted");

        let lifeline = Lifeline::init(config(&url)).await.unwrap();
        lifeline.content().save_cta(cta).await.unwrap();
        lifeline.shutdown().await;

        let lifeline = Lifeline::init(config(&url)).await.unwrap();
        assert_eq!(lifeline.content().get_cta().await.data.title, "Persisted");
        lifeline.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_store_ends_in_demo_mode() {
        let started = tokio::time::Instant::now();
        let lifeline = Lifeline::init(Config::default()).await.unwrap();

        assert_eq!(lifeline.connection().state(), ConnectionState::DemoMode);
        assert!(started.elapsed() >= Duration::from_secs(6));

        // Everything still answers
        let section = lifeline.content().get_section(SectionKind::Cta).await;
        assert_eq!(section, SectionKind::Cta.fallback());
        lifeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_configured_demo_mode_skips_connecting() {
        let lifeline = Lifeline::init(Config {
            demo_mode: true,
            ..config("memory://")
        })
        .await
        .unwrap();

        assert!(lifeline.executor().is_demo_mode());
        assert!(lifeline.connection().store().is_none());
        lifeline.shutdown().await;
    }
}
