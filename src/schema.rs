use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SourceFailure;

// ------------------------------------------------------------
// Raw listing (collector output)
// ------------------------------------------------------------
//
// Exactly what a site collector scraped, before any cleanup.
//
// - `href` may be relative ("/jobs/42") or absolute
// - `uni_name` is only set by collectors that tag rows themselves
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub href: String,
    pub uni_name: Option<String>,
}

impl RawListing {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            uni_name: None,
        }
    }

    pub fn tagged(mut self, uni_name: impl Into<String>) -> Self {
        self.uni_name = Some(uni_name.into());
        self
    }
}

// ------------------------------------------------------------
// Listing record (SourceTask output)
// ------------------------------------------------------------
//
// A listing that passed normalization inside its SourceTask.
//
// INVARIANTS:
// - `title` is trimmed and non-empty
// - `link` is an absolute URL
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub link: String,
    pub uni_name: Option<String>,
}

/// Outcome of one SourceTask.
///
/// A source either contributes all of its rows or none of them;
/// there is no partially successful variant.
#[derive(Debug)]
pub struct SourceResult {
    pub source: String,
    pub outcome: Result<Vec<ListingRecord>, SourceFailure>,
}

impl SourceResult {
    pub fn ok(source: impl Into<String>, rows: Vec<ListingRecord>) -> Self {
        Self {
            source: source.into(),
            outcome: Ok(rows),
        }
    }

    pub fn failed(failure: SourceFailure) -> Self {
        Self {
            source: failure.source_name.clone(),
            outcome: Err(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

// ------------------------------------------------------------
// Merged table
// ------------------------------------------------------------
//
// One run's snapshot. Every row shares `scrape_date`.
//
// Row order is whatever order the pool completed sources in
// and must not be relied upon.
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRow {
    pub title: String,
    pub uni_name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTable {
    pub scrape_date: NaiveDate,
    pub rows: Vec<JobRow>,

    /// Sources whose result was `Ok`, even if empty.
    pub contributing_sources: Vec<String>,

    /// Sources whose result was `Failed`.
    pub failed_sources: Vec<String>,
}

impl MergedTable {
    pub fn empty(scrape_date: NaiveDate) -> Self {
        Self {
            scrape_date,
            rows: Vec::new(),
            contributing_sources: Vec::new(),
            failed_sources: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when no source produced an `Ok` result.
    pub fn all_sources_failed(&self) -> bool {
        self.contributing_sources.is_empty()
    }

    /// Number of rows per university, sorted by name.
    pub fn counts_by_source(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.uni_name.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
