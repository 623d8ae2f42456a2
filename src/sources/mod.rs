//! Source collector registry
//!
//! This module provides:
//! - Construction of one collector per configured source
//! - A static name → collector registry built at startup
//!
//! All site-specific logic lives in the collector modules.
//! The rest of the application only sees `SourceCollector`.

pub mod adapter;
pub mod paged_listing;
pub mod workday;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use adapter::SourceCollector;

use crate::collector::task::SourceTask;
use crate::config::{Config, HttpConfig, SourceConfig};

/// Builds the collector for one source by its `kind`.
///
/// RETURNS:
/// - `Ok(Some(..))` for a supported kind
/// - `Ok(None)` if the kind is unknown
/// - `Err` if the kind is known but its settings are invalid
pub fn build_collector(
    cfg: &SourceConfig,
    client: &reqwest::Client,
) -> anyhow::Result<Option<Arc<dyn SourceCollector>>> {
    let collector: Arc<dyn SourceCollector> = match cfg.kind.as_str() {
        "paged_listing" => Arc::new(paged_listing::PagedListingCollector::new(client.clone(), cfg)?),
        "workday" => Arc::new(workday::WorkdayCollector::new(client.clone(), cfg)?),
        _ => return Ok(None),
    };
    Ok(Some(collector))
}

pub fn http_client(cfg: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .user_agent(cfg.user_agent.as_str())
        .build()
        .context("building http client")
}

/// Name → collector mapping for every enabled source.
///
/// Registered once at process start and reused for every run.
#[derive(Clone, Default)]
pub struct Registry {
    collectors: HashMap<String, Arc<dyn SourceCollector>>,
}

impl Registry {
    /// Registers every enabled, supported source.
    ///
    /// Unsupported kinds and invalid source settings are logged
    /// and skipped so one bad entry does not disable the rest.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = http_client(&config.http)?;
        let mut registry = Self::default();

        for src in config.enabled_sources() {
            match build_collector(src, &client) {
                Ok(Some(collector)) => {
                    info!("source '{}' registered with {} collector", src.name, collector.kind());
                    registry.register(&src.name, collector);
                }
                Ok(None) => warn!("source '{}': collector kind '{}' is not supported", src.name, src.kind),
                Err(e) => warn!("source '{}': invalid settings: {e:#}", src.name),
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, name: &str, collector: Arc<dyn SourceCollector>) {
        self.collectors.insert(name.to_string(), collector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceCollector>> {
        self.collectors.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Resolves every registered, enabled source into a runnable task.
    pub fn tasks(&self, config: &Config) -> Vec<SourceTask> {
        let mut names: Vec<&str> = self.collectors.keys().map(String::as_str).collect();
        names.sort_unstable();

        names
            .into_iter()
            .filter_map(|name| {
                let src = config.lookup(name).filter(|s| s.enabled)?;
                let collector = self.get(name)?;
                Some(SourceTask::new(&src.name, src.url.clone(), collector).with_deadline(src.timeout()))
            })
            .collect()
    }
}
