use std::collections::HashSet;

use anyhow::{Context, anyhow, bail};
use log::debug;
use scraper::{Html, Selector};
use url::Url;

use crate::config::{PageMethod, SourceConfig};
use crate::schema::RawListing;
use crate::util;

use super::adapter::SourceCollector;

const DEFAULT_LINK_SELECTOR: &str = "a.job-link";

/// Numbered-page HTML listing collector
///
/// Works for portals that render server-side result pages
/// addressed as `?page=N&page-items=S` (e.g. PageUp based sites).
///
/// Termination:
/// - non-2xx status after the first page
/// - a page without job links
/// - a page that yields nothing new (portal ignores `page`)
/// - `max_pages`
pub struct PagedListingCollector {
    client: reqwest::Client,
    selector: String,
    method: PageMethod,
    page_size: usize,
    max_pages: usize,
}

impl PagedListingCollector {
    pub fn new(client: reqwest::Client, cfg: &SourceConfig) -> anyhow::Result<Self> {
        let selector = cfg
            .link_selector
            .clone()
            .unwrap_or_else(|| DEFAULT_LINK_SELECTOR.to_string());

        // Fail at startup rather than on every run.
        parse_selector(&selector)?;

        Ok(Self {
            client,
            selector,
            method: cfg.method,
            page_size: cfg.page_size.max(1),
            max_pages: cfg.max_pages.max(1),
        })
    }
}

#[async_trait::async_trait]
impl SourceCollector for PagedListingCollector {
    fn kind(&self) -> &'static str {
        "paged_listing"
    }

    async fn collect(&self, entry: &Url) -> anyhow::Result<Vec<RawListing>> {
        let mut listings = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.max_pages {
            let url = page_url(entry, page, self.page_size);
            let request = match self.method {
                PageMethod::Get => self.client.get(url.as_str()),
                PageMethod::Post => self.client.post(url.as_str()),
            };

            let response = request
                .send()
                .await
                .with_context(|| format!("requesting {url}"))?;

            let status = response.status();
            if !status.is_success() {
                if page == 1 {
                    bail!("first page {url} returned HTTP {status}");
                }
                debug!("{url} returned HTTP {status}, stopping");
                break;
            }

            let html = response
                .text()
                .await
                .with_context(|| format!("reading body of {url}"))?;

            let found = parse_listing_page(&html, &self.selector)?;
            if found.is_empty() {
                break;
            }

            let before = listings.len();
            for listing in found {
                if seen.insert((listing.title.clone(), listing.href.clone())) {
                    listings.push(listing);
                }
            }

            debug!("{url}: {} new listings", listings.len() - before);

            if listings.len() == before {
                break;
            }
        }

        Ok(listings)
    }
}

/// Builds the URL for a result page, replacing any paging
/// parameters already present on the entry URL.
pub fn page_url(entry: &Url, page: usize, page_size: usize) -> Url {
    let kept: Vec<(String, String)> = entry
        .query_pairs()
        .filter(|(k, _)| k != "page" && k != "page-items")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = entry.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs
            .append_pair("page", &page.to_string())
            .append_pair("page-items", &page_size.to_string());
    }
    url
}

/// Extracts job anchors from one result page.
///
/// Anchors without an `href` are kept with an empty href; the
/// SourceTask counts and drops them.
pub fn parse_listing_page(html: &str, selector: &str) -> anyhow::Result<Vec<RawListing>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|el| {
            let title = util::clean_title(&el.text().collect::<String>());
            let href = el.value().attr("href").unwrap_or_default();
            RawListing::new(title, href)
        })
        .collect())
}

fn parse_selector(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid link selector '{selector}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="results">
            <a class="job-link" href="/cw/en/job/500001/lecturer-in-law">
                Lecturer in Law
            </a>
            <a class="job-link" href="https://external-careers.jobs.unsw.edu.au/cw/en/job/500002/postdoc">Postdoctoral Fellow</a>
            <a class="job-link">Broken anchor</a>
            <a class="other" href="/about">About us</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn extracts_only_selected_anchors() {
        let rows = parse_listing_page(PAGE, "a.job-link").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, "Lecturer in Law");
        assert_eq!(rows[0].href, "/cw/en/job/500001/lecturer-in-law");
        assert_eq!(rows[1].title, "Postdoctoral Fellow");
        assert_eq!(rows[2].href, "");
    }

    #[test]
    fn empty_page_yields_nothing() {
        let rows = parse_listing_page("<html><body><p>No jobs</p></body></html>", "a.job-link")
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn bad_selector_is_an_error() {
        assert!(parse_listing_page(PAGE, "a[[").is_err());
    }

    #[test]
    fn page_url_replaces_paging_params() {
        let entry =
            Url::parse("https://careers.example.edu/cw/en/listing?page=7&lang=en").unwrap();
        let url = page_url(&entry, 2, 20);
        assert_eq!(
            url.as_str(),
            "https://careers.example.edu/cw/en/listing?lang=en&page=2&page-items=20"
        );
    }
}
