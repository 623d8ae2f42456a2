use url::Url;

use crate::schema::RawListing;

/// SourceCollector is the abstraction layer between:
/// - The generic pool / merge pipeline
/// - Site-specific page walking (HTML listings, JSON search APIs)
///
/// Each implementation must:
/// - Walk every result page reachable from the entry URL
/// - Return one title and href per posting
///
/// It may:
/// - Tidy whitespace in titles
/// - Assemble absolute hrefs from platform-specific path fragments
///   (e.g. Workday `externalPath` under the public site URL)
///
/// It must NOT:
/// - Join page hrefs against the entry URL (the SourceTask does that)
/// - Filter out links (the SourceTask drops unusable ones)
/// - Write files or touch the database
/// - Retry on its own
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - Instances are built once per configured source at startup
///   and shared behind `Arc`
///
#[async_trait::async_trait]
pub trait SourceCollector: Send + Sync {
    /// Collector kind, matches `kind` in the source configuration.
    fn kind(&self) -> &'static str;

    /// Collects every listing reachable from `entry`.
    ///
    /// An `Ok` with an empty vector means the portal currently
    /// advertises no jobs; that is a success, not a failure.
    async fn collect(&self, entry: &Url) -> anyhow::Result<Vec<RawListing>>;
}
