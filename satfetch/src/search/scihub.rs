//! Copernicus SciHub OpenSearch provider.
//!
//! The OpenSearch endpoint answers with an Atom feed. Records are read with
//! a single pass over the feed's lines: an entry starts at `<entry>` and ends
//! at `</entry>`, and within it the product name, UUID, and cloud coverage
//! each appear at most once.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info, warn};

use super::query::Query;
use super::types::{fetch_text, log_failure, ResultSet, SearchError, SearchProvider};
use crate::descriptor::{ProductDescriptor, Sensor};
use crate::transfer::{Credentials, HttpClient};

/// Public SciHub service root.
pub const SCIHUB_URL: &str = "https://scihub.copernicus.eu/apihub";

/// Record fields collected between `<entry>` and `</entry>`.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct FeedRecord {
    pub title: Option<String>,
    pub id: Option<String>,
    pub clouds: Option<f64>,
}

/// Where the feed scanner is.
enum FeedState {
    Outside,
    InEntry(FeedRecord),
}

/// Text between `open` and `close` on one line.
fn between<'a>(line: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = line.find(open)? + open.len();
    let end = line[start..].find(close)? + start;
    Some(line[start..end].trim())
}

/// Split an Atom feed into records.
///
/// Compact feeds are broken at tag boundaries first so that each tag sits
/// on its own line.
pub(crate) fn parse_feed(feed: &str) -> Vec<FeedRecord> {
    let expanded = feed.replace("><", ">\n<");
    let mut records = Vec::new();
    let mut state = FeedState::Outside;

    for line in expanded.lines() {
        let line = line.trim();
        if line.contains("<entry>") || line.starts_with("<entry ") {
            state = FeedState::InEntry(FeedRecord::default());
            continue;
        }
        if line.contains("</entry>") {
            if let FeedState::InEntry(record) = std::mem::replace(&mut state, FeedState::Outside) {
                records.push(record);
            }
            continue;
        }

        let FeedState::InEntry(record) = &mut state else {
            continue;
        };

        if line.contains("<title>") && record.title.is_none() {
            record.title = between(line, "<title>", "</title>").map(str::to_string);
        } else if line.contains("<id>") && record.id.is_none() {
            record.id = between(line, "<id>", "</id>").map(str::to_string);
        } else if line.contains("name=\"cloudcoverpercentage\"") && record.clouds.is_none() {
            record.clouds = between(line, ">", "</double>").and_then(|v| v.parse().ok());
        }
    }

    records
}

/// Search provider for the SciHub OpenSearch API.
pub struct SciHubSearch {
    client: Arc<dyn HttpClient>,
    base_url: String,
    credentials: Option<Credentials>,
}

impl SciHubSearch {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            base_url: SCIHUB_URL.to_string(),
            credentials: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// OpenSearch `q` parameter: every active filter joined with `AND`.
    pub fn query_string(query: &Query) -> String {
        let mut terms = vec![
            "platformname:Sentinel-2".to_string(),
            "producttype:S2MSI1C".to_string(),
        ];

        if query.start.is_some() || query.end.is_some() {
            let start = query
                .start
                .map(|d| format!("{}T00:00:00.000Z", d))
                .unwrap_or_else(|| "*".to_string());
            let end = query
                .end
                .map(|d| format!("{}T23:59:59.999Z", d))
                .unwrap_or_else(|| "NOW".to_string());
            terms.push(format!("beginPosition:[{} TO {}]", start, end));
        }

        if let Some(area) = &query.area {
            terms.push(format!("footprint:\"Intersects({})\"", area.to_wkt()));
        }

        if let Some(orbit) = query.relative_orbit {
            terms.push(format!("relativeorbitnumber:{}", orbit));
        }

        if query.cloud_ceiling > 0.0 {
            terms.push(format!("cloudcoverpercentage:[0 TO {}]", query.cloud_ceiling));
        }

        if let Some(platform) = query.platform {
            terms.push(format!("filename:{}_*", platform));
        }

        if !query.tiles.is_empty() {
            let tiles = query
                .tiles
                .iter()
                .map(|t| format!("filename:*_T{}_*", t))
                .collect::<Vec<_>>()
                .join(" OR ");
            terms.push(format!("({})", tiles));
        }

        terms.join(" AND ")
    }

    /// URL of the result page starting at `start`.
    pub fn page_url(&self, query: &Query, start: usize) -> String {
        let endpoint = format!("{}/search", self.base_url);
        let params = [
            ("q", Self::query_string(query)),
            ("rows", query.page_size.to_string()),
            ("start", start.to_string()),
            ("orderby", "beginposition asc".to_string()),
        ];
        match Url::parse_with_params(&endpoint, &params) {
            Ok(url) => url.to_string(),
            Err(_) => endpoint,
        }
    }
}

impl SearchProvider for SciHubSearch {
    fn name(&self) -> &str {
        "scihub"
    }

    fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        query.validate()?;
        if query.sensor != Sensor::Sentinel2 {
            return Err(SearchError::InvalidQuery(
                "SciHub only serves Sentinel-2 products".to_string(),
            ));
        }

        let mut results = ResultSet::new(self.name());
        let mut start = query.offset;
        let mut titles: HashSet<String> = HashSet::new();

        loop {
            let url = self.page_url(query, start);
            debug!(url = %url, "Querying SciHub");

            let feed = match fetch_text(
                self.client.as_ref(),
                self.name(),
                &url,
                self.credentials.as_ref(),
            ) {
                Ok(feed) => feed,
                Err(e) => {
                    log_failure(&e, results.len());
                    break;
                }
            };

            let records = parse_feed(&feed);
            let page_len = records.len();
            let fresh = records
                .iter()
                .filter_map(|r| r.title.clone())
                .filter(|t| titles.insert(t.clone()))
                .count();
            if page_len > 0 && fresh == 0 {
                warn!(start, "Page repeats earlier results, stopping");
                break;
            }

            for record in records {
                let Some(title) = record.title else {
                    warn!("Feed entry without a title");
                    continue;
                };
                let mut product = match ProductDescriptor::parse(&title) {
                    Ok(product) => product,
                    Err(e) => {
                        warn!(error = %e, "Ignoring feed entry");
                        continue;
                    }
                };
                if let Some(id) = record.id {
                    product = product.with_id(id);
                }
                if let Some(clouds) = record.clouds {
                    product = product.with_clouds_percentage(clouds);
                }
                results.offer(product, query);
            }

            if page_len < query.page_size {
                break;
            }
            start += page_len;
        }

        info!(count = results.len(), "SciHub search complete");
        Ok(results.into_vec())
    }
}
