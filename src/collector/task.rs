use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::CollectError;
use crate::schema::{ListingRecord, RawListing};
use crate::sources::adapter::SourceCollector;
use crate::util;

/// One unit of collection work: one university, one run.
///
/// A SourceTask owns everything it needs (entry URL, collector
/// handle, deadline) so it can be moved onto its own tokio task
/// without sharing mutable state with any other source.
#[derive(Clone)]
pub struct SourceTask {
    name: String,
    entry: Url,
    collector: Arc<dyn SourceCollector>,
    deadline: Option<Duration>,
}

/// Normalized rows plus how many raw rows were rejected.
#[derive(Debug)]
pub struct Collected {
    pub rows: Vec<ListingRecord>,
    pub dropped: usize,
}

impl SourceTask {
    pub fn new(name: &str, entry: Url, collector: Arc<dyn SourceCollector>) -> Self {
        Self {
            name: name.to_string(),
            entry,
            collector,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the collector and normalizes its output.
    ///
    /// Errors and deadline expiry are returned, never raised;
    /// panics are left to the pool, which isolates them per task.
    pub async fn execute(&self) -> Result<Collected, CollectError> {
        let raw = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.collector.collect(&self.entry))
                .await
                .map_err(|_| CollectError::TimedOut(limit))??,
            None => self.collector.collect(&self.entry).await?,
        };

        Ok(normalize(&self.entry, raw))
    }
}

/// Turns raw collector output into listing records.
///
/// - titles are whitespace-collapsed and must be non-empty
/// - hrefs are resolved against the entry URL and must be http(s)
///   links to some other page
/// - anything else is dropped and counted
pub fn normalize(entry: &Url, raw: Vec<RawListing>) -> Collected {
    let total = raw.len();

    let rows: Vec<ListingRecord> = raw
        .into_iter()
        .filter_map(|r| {
            let title = util::clean_title(&r.title);
            if title.is_empty() {
                return None;
            }
            let link = util::resolve_link(entry, &r.href)?;
            let uni_name = r.uni_name.filter(|u| !u.trim().is_empty());
            Some(ListingRecord {
                title,
                link,
                uni_name,
            })
        })
        .collect();

    Collected {
        dropped: total - rows.len(),
        rows,
    }
}

/// Deduplicates by link, keeping the first occurrence.
///
/// Links are unique within a source; this applies that rule
/// to collectors that revisit a page.
pub fn dedup_by_link(rows: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| seen.insert(r.link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<RawListing>);

    #[async_trait::async_trait]
    impl SourceCollector for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        async fn collect(&self, _entry: &Url) -> anyhow::Result<Vec<RawListing>> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl SourceCollector for Slow {
        fn kind(&self) -> &'static str {
            "slow"
        }

        async fn collect(&self, _entry: &Url) -> anyhow::Result<Vec<RawListing>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn entry() -> Url {
        Url::parse("https://example.edu").unwrap()
    }

    #[test]
    fn normalize_resolves_and_filters() {
        let raw = vec![
            RawListing::new("  Lecturer ", "/jobs/42"),
            RawListing::new("Tutor", "https://jobs.example.edu/7"),
            RawListing::new("", "/jobs/1"),
            RawListing::new("No link", " "),
            RawListing::new("Tagged", "/jobs/9").tagged("UQ"),
            RawListing::new("Apply", "javascript:void(0)"),
            RawListing::new("Back to top", "#"),
            RawListing::new("Contact HR", "mailto:hr@example.edu"),
        ];

        let out = normalize(&entry(), raw);

        assert_eq!(out.dropped, 5);
        assert_eq!(out.rows.len(), 3);
        assert_eq!(out.rows[0].title, "Lecturer");
        assert_eq!(out.rows[0].link, "https://example.edu/jobs/42");
        assert_eq!(out.rows[1].link, "https://jobs.example.edu/7");
        assert_eq!(out.rows[2].uni_name.as_deref(), Some("UQ"));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let rows = normalize(
            &entry(),
            vec![
                RawListing::new("A", "/jobs/1"),
                RawListing::new("A again", "https://example.edu/jobs/1"),
                RawListing::new("B", "/jobs/2"),
            ],
        )
        .rows;

        let rows = dedup_by_link(rows);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "A");
    }

    #[tokio::test]
    async fn execute_returns_normalized_rows() {
        let task = SourceTask::new(
            "UNSW",
            entry(),
            Arc::new(Fixed(vec![RawListing::new("Lecturer", "/jobs/42")])),
        );

        let out = task.execute().await.unwrap();
        assert_eq!(out.rows[0].link, "https://example.edu/jobs/42");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_into_timeout() {
        let task = SourceTask::new("USYD", entry(), Arc::new(Slow))
            .with_deadline(Some(Duration::from_secs(5)));

        let err = task.execute().await.unwrap_err();
        assert!(matches!(err, CollectError::TimedOut(d) if d == Duration::from_secs(5)));
    }
}
