use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use url::Url;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - The university sources and how to collect them
// - Pool concurrency
// - Snapshot file and database destinations
// - Optional schedule and HTTP settings
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Known sources (one per university)
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Absent means "run once and exit"
    pub schedule: Option<ScheduleConfig>,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(data).context("parsing config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolves a source name to its navigation descriptor.
    ///
    /// `Registry::tasks` goes through here to pair each registered
    /// collector with its entry URL and deadline.
    pub fn lookup(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.enabled_sources().next().is_none() {
            bail!("config has no enabled sources");
        }

        let mut seen = HashSet::new();
        for src in &self.sources {
            if src.name.trim().is_empty() {
                bail!("source with empty name");
            }
            if !seen.insert(src.name.as_str()) {
                bail!("duplicate source name '{}'", src.name);
            }
            if src.url.cannot_be_a_base() {
                bail!("source '{}' url {} is not a base url", src.name, src.url);
            }
        }

        if self.database.batch_size == 0 {
            bail!("database.batch_size must be at least 1");
        }

        if self.schedule.as_ref().is_some_and(|s| s.interval_secs == 0) {
            bail!("schedule.interval_secs must be at least 1");
        }

        Ok(())
    }
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// One university career portal.
//
// `kind` selects the collector from the registry; the same
// collector kind serves every site built on the same platform.
//
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// University identifier, also used as the `UniName` tag
    pub name: String,

    /// Collector kind (e.g. "paged_listing", "workday")
    pub kind: String,

    /// Entry URL; relative hrefs are resolved against it
    pub url: Url,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-source deadline; no deadline when absent
    pub timeout_secs: Option<u64>,

    /// Hard cap on pages walked
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// CSS selector for job links (paged_listing only)
    pub link_selector: Option<String>,

    /// HTTP method for listing pages (paged_listing only)
    #[serde(default)]
    pub method: PageMethod,

    /// Results per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl SourceConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageMethod {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// Maximum simultaneously running sources
    pub concurrency: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

// ------------------------------------------------------------
// Snapshot configuration
// ------------------------------------------------------------
//
// `stale_paths` lists leftovers of earlier runs (e.g. per-source
// intermediate CSVs) that are removed together with the old
// snapshot before a new one is written.
//
#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    pub path: PathBuf,

    #[serde(default)]
    pub stale_paths: Vec<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tables/job_data.csv"),
            stale_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite connection string
    pub url: String,

    /// Rows per committed transaction
    pub batch_size: usize,

    /// Permit an empty run to replace existing data
    pub allow_empty_overwrite: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://jobs.db?mode=rwc".to_string(),
            batch_size: 100,
            allow_empty_overwrite: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_pages() -> usize {
    100
}

fn default_page_size() -> usize {
    20
}
