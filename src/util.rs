/// Utility helpers shared by collectors and the pipeline.
///
/// This module contains:
/// - Link resolution
/// - Title cleanup
/// - Date helpers
///
/// IMPORTANT:
/// - No site-specific logic should live here.
/// - Everything here must remain deterministic.
///
use chrono::{Local, NaiveDate};
use url::Url;

/// Resolve a scraped href against the source's entry URL.
///
/// Examples:
/// - ("https://example.edu", "/jobs/42")            -> "https://example.edu/jobs/42"
/// - ("https://example.edu", "https://x.edu/jobs/1") -> "https://x.edu/jobs/1"
///
/// Absolute hrefs are returned exactly as scraped so that the
/// link stays byte-identical to what the portal published.
///
/// Returns `None` for:
/// - empty hrefs and hrefs that cannot be joined
/// - anything that is not an http(s) URL (`javascript:`, `mailto:`)
/// - in-page anchors that resolve back to the entry page itself
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return is_web(&absolute).then(|| href.to_string());
    }

    let joined = base.join(href).ok()?;
    if !is_web(&joined) || same_page(&joined, base) {
        return None;
    }

    Some(joined.into())
}

fn is_web(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn same_page(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// Collapse internal whitespace runs and trim.
///
/// Listing anchors often carry newlines and indentation from
/// the page markup.
pub fn clean_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The local calendar date used as a run's `Scrape_Date`.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format used for `Scrape_Date` in snapshots.
pub const SCRAPE_DATE_FORMAT: &str = "%Y-%m-%d";
