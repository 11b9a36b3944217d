//! Sentinel-2 on AWS provider.
//!
//! The public bucket has no search API. Products are found by listing
//! `tiles/{utm}/{band}/{square}/{year}/{month}/` with a `/` delimiter and
//! walking down to each acquisition's `tileInfo.json`.

use std::sync::{Arc, OnceLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::query::Query;
use super::types::{fetch_text, log_failure, ResultSet, SearchError, SearchProvider};
use crate::descriptor::{ProductDescriptor, Sensor};
use crate::transfer::HttpClient;

/// Public bucket root for Sentinel-2 L1C.
pub const AWS_S2_URL: &str = "https://sentinel-s2-l1c.s3.amazonaws.com";

/// Earliest month walked when the query has no start date.
const FIRST_ACQUISITION: (i32, u32) = (2015, 6);

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<Prefix>([^<]+)</Prefix>").unwrap())
}

/// Subset of `tileInfo.json` used for search.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileInfo {
    product_name: String,
    #[serde(default)]
    cloudy_pixel_percentage: Option<f64>,
}

/// Key prefix of a tile, e.g. `35TLK` to `tiles/35/T/LK/`.
pub fn tile_prefix(tile: &str) -> Option<String> {
    let tile = tile.trim_start_matches(['T', 't']);
    if tile.len() != 5 || !tile.is_ascii() {
        return None;
    }
    let utm = tile[..2].trim_start_matches('0');
    Some(format!(
        "tiles/{}/{}/{}/",
        utm,
        &tile[2..3].to_uppercase(),
        &tile[3..].to_uppercase()
    ))
}

/// Common prefixes of a delimiter listing.
pub(crate) fn common_prefixes(listing: &str) -> Vec<String> {
    let Some(start) = listing.find("<CommonPrefixes>") else {
        return Vec::new();
    };
    prefix_pattern()
        .captures_iter(&listing[start..])
        .map(|c| c[1].to_string())
        .collect()
}

/// Last path segment of a listing prefix, as a number.
fn last_segment(prefix: &str) -> Option<u32> {
    prefix.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Every `(year, month)` between two dates, inclusive.
fn months(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

/// Search provider walking the Sentinel-2 bucket listing.
pub struct AwsSearch {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl AwsSearch {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            base_url: AWS_S2_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Listing URL for the keys under `prefix`.
    pub fn listing_url(&self, prefix: &str) -> String {
        format!("{}/?delimiter=/&prefix={}", self.base_url, prefix)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, SearchError> {
        let url = self.listing_url(prefix);
        debug!(url = %url, "Listing bucket");
        let listing = fetch_text(self.client.as_ref(), self.name(), &url, None)?;
        Ok(common_prefixes(&listing))
    }

    fn tile_info(&self, acquisition: &str) -> Result<TileInfo, SearchError> {
        let url = format!("{}/{}tileInfo.json", self.base_url, acquisition);
        let body = fetch_text(self.client.as_ref(), self.name(), &url, None)?;
        serde_json::from_str(&body).map_err(|e| SearchError::CatalogUnavailable {
            provider: self.name().to_string(),
            reason: format!("bad tileInfo.json at {}: {}", url, e),
        })
    }

    /// Walk one tile's listing for the query's date window.
    fn walk_tile(
        &self,
        tile_prefix: &str,
        start: NaiveDate,
        end: NaiveDate,
        query: &Query,
        results: &mut ResultSet,
    ) -> Result<(), SearchError> {
        for (year, month) in months(start, end) {
            let month_prefix = format!("{}{}/{}/", tile_prefix, year, month);
            for day_prefix in self.list(&month_prefix)? {
                let in_window = last_segment(&day_prefix)
                    .and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
                    .is_some_and(|date| query.accepts_date(date));
                if !in_window {
                    continue;
                }

                for acquisition in self.list(&day_prefix)? {
                    let info = match self.tile_info(&acquisition) {
                        Ok(info) => info,
                        Err(e) => {
                            warn!(error = %e, "Skipping acquisition");
                            continue;
                        }
                    };
                    match ProductDescriptor::parse(&info.product_name) {
                        Ok(mut product) => {
                            if let Some(clouds) = info.cloudy_pixel_percentage {
                                product = product.with_clouds_percentage(clouds);
                            }
                            results.offer(product, query);
                        }
                        Err(e) => warn!(error = %e, "Ignoring acquisition"),
                    }
                }
            }
        }
        Ok(())
    }
}

impl SearchProvider for AwsSearch {
    fn name(&self) -> &str {
        "aws"
    }

    fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        query.validate()?;
        if query.sensor != Sensor::Sentinel2 {
            return Err(SearchError::InvalidQuery(
                "the AWS bucket only serves Sentinel-2 products".to_string(),
            ));
        }
        if query.tiles.is_empty() {
            return Err(SearchError::InvalidQuery(
                "AWS search needs at least one tile".to_string(),
            ));
        }

        let start = query.start.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(FIRST_ACQUISITION.0, FIRST_ACQUISITION.1, 1)
                .unwrap_or(NaiveDate::MIN)
        });
        let end = query
            .end
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let mut results = ResultSet::new(self.name());
        for tile in &query.tiles {
            let Some(prefix) = tile_prefix(tile) else {
                warn!(tile = %tile, "Not a tile identifier");
                continue;
            };
            if let Err(e) = self.walk_tile(&prefix, start, end, query, &mut results) {
                log_failure(&e, results.len());
            }
        }

        info!(count = results.len(), "AWS search complete");
        Ok(results.into_vec())
    }
}
