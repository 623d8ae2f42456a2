use anyhow::{Context, anyhow, bail};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::SourceConfig;
use crate::schema::RawListing;
use crate::util;

use super::adapter::SourceCollector;

/// Workday rejects larger pages.
const MAX_PAGE_SIZE: usize = 20;

/// Workday career-site collector
///
/// Workday sites render listings client-side, but the page is
/// backed by a JSON search endpoint:
///
/// ```text
/// POST {scheme}://{host}/wday/cxs/{tenant}/{site}/jobs
/// ```
///
/// The tenant is the first label of the host and the site is
/// the first path segment of the public URL after an optional
/// locale (`/en-US/`).
///
/// `total` is only reported on the first page; later pages
/// return 0 and are ignored for termination.
pub struct WorkdayCollector {
    client: reqwest::Client,
    page_size: usize,
    max_pages: usize,
}

impl WorkdayCollector {
    pub fn new(client: reqwest::Client, cfg: &SourceConfig) -> anyhow::Result<Self> {
        // Surface malformed site URLs at startup.
        api_endpoint(&cfg.url)?;

        Ok(Self {
            client,
            page_size: cfg.page_size.clamp(1, MAX_PAGE_SIZE),
            max_pages: cfg.max_pages.max(1),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total: usize,

    #[serde(default, rename = "jobPostings")]
    pub job_postings: Vec<Posting>,
}

#[derive(Debug, Deserialize)]
pub struct Posting {
    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "externalPath")]
    pub external_path: String,
}

#[async_trait::async_trait]
impl SourceCollector for WorkdayCollector {
    fn kind(&self) -> &'static str {
        "workday"
    }

    async fn collect(&self, entry: &Url) -> anyhow::Result<Vec<RawListing>> {
        let endpoint = api_endpoint(entry)?;
        let mut listings = Vec::new();
        let mut total = None;

        for page in 0..self.max_pages {
            let offset = page * self.page_size;
            let body = json!({
                "appliedFacets": {},
                "limit": self.page_size,
                "offset": offset,
                "searchText": "",
            });

            let response = self
                .client
                .post(endpoint.as_str())
                .json(&body)
                .send()
                .await
                .with_context(|| format!("requesting {endpoint} offset {offset}"))?;

            let status = response.status();
            if !status.is_success() {
                bail!("{endpoint} offset {offset} returned HTTP {status}");
            }

            let page: SearchPage = response
                .json()
                .await
                .with_context(|| format!("decoding {endpoint} offset {offset}"))?;

            if total.is_none() {
                total = Some(page.total);
            }

            if page.job_postings.is_empty() {
                break;
            }

            let fetched = page.job_postings.len();
            listings.extend(postings_to_listings(entry, page.job_postings));
            debug!("{endpoint}: offset {offset} -> {fetched} postings");

            if total.is_some_and(|t| offset + fetched >= t) {
                break;
            }
        }

        Ok(listings)
    }
}

/// Derives the JSON search endpoint from a public site URL.
pub fn api_endpoint(site: &Url) -> anyhow::Result<Url> {
    let host = site
        .host_str()
        .ok_or_else(|| anyhow!("workday url {site} has no host"))?;

    let tenant = host
        .split('.')
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("workday url {site} has no tenant"))?;

    let site_id = site
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .find(|s| !is_locale(s))
        .ok_or_else(|| anyhow!("workday url {site} has no site path"))?;

    let raw = format!("{}://{host}/wday/cxs/{tenant}/{site_id}/jobs", site.scheme());
    Url::parse(&raw).with_context(|| format!("building workday endpoint from {site}"))
}

/// Posting paths are relative to the public site URL, not the
/// host root, so they are appended rather than joined.
pub fn postings_to_listings(site: &Url, postings: Vec<Posting>) -> Vec<RawListing> {
    let site = site.as_str().trim_end_matches('/');

    postings
        .into_iter()
        .map(|p| {
            let href = if p.external_path.is_empty() {
                String::new()
            } else {
                format!("{site}{}", p.external_path)
            };
            RawListing::new(util::clean_title(&p.title), href)
        })
        .collect()
}

fn is_locale(segment: &str) -> bool {
    let b = segment.as_bytes();
    b.len() == 5 && b[2] == b'-' && b[..2].iter().all(u8::is_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = r#"{
        "total": 2,
        "jobPostings": [
            { "title": "Research Assistant", "externalPath": "/job/St-Lucia/Research-Assistant_R-01",
              "locationsText": "St Lucia", "postedOn": "Posted Today" },
            { "title": "  Lecturer ", "externalPath": "/job/Herston/Lecturer_R-02" }
        ],
        "facets": []
    }"#;

    #[test]
    fn endpoint_from_site_url() {
        let site = Url::parse("https://uq.wd3.myworkdayjobs.com/uqcareers").unwrap();
        assert_eq!(
            api_endpoint(&site).unwrap().as_str(),
            "https://uq.wd3.myworkdayjobs.com/wday/cxs/uq/uqcareers/jobs"
        );
    }

    #[test]
    fn endpoint_skips_locale_segment() {
        let site =
            Url::parse("https://usyd.wd3.myworkdayjobs.com/en-US/USYD_EXTERNAL_CAREER_SITE")
                .unwrap();
        assert_eq!(
            api_endpoint(&site).unwrap().as_str(),
            "https://usyd.wd3.myworkdayjobs.com/wday/cxs/usyd/USYD_EXTERNAL_CAREER_SITE/jobs"
        );
    }

    #[test]
    fn endpoint_requires_site_path() {
        let site = Url::parse("https://uq.wd3.myworkdayjobs.com/").unwrap();
        assert!(api_endpoint(&site).is_err());
    }

    #[test]
    fn postings_become_site_relative_links() {
        let site = Url::parse("https://uq.wd3.myworkdayjobs.com/uqcareers/").unwrap();
        let page: SearchPage = serde_json::from_str(FIRST_PAGE).unwrap();
        assert_eq!(page.total, 2);

        let rows = postings_to_listings(&site, page.job_postings);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].href,
            "https://uq.wd3.myworkdayjobs.com/uqcareers/job/St-Lucia/Research-Assistant_R-01"
        );
        assert_eq!(rows[1].title, "Lecturer");
    }

    #[test]
    fn later_pages_without_total_still_decode() {
        let page: SearchPage = serde_json::from_str(r#"{ "jobPostings": [] }"#).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.job_postings.is_empty());
    }
}
