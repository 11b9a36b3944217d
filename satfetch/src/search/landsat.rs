//! Paged JSON catalog for Landsat-8 scenes.
//!
//! Each result carries its scalar properties as an array of
//! `{"name": ..., "value": ...}` attributes; cloud cover is the
//! `cloudCover` attribute.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::query::Query;
use super::types::{fetch_text, log_failure, ResultSet, SearchError, SearchProvider};
use crate::descriptor::{ProductDescriptor, Sensor};
use crate::transfer::{Credentials, HttpClient};

/// Default Landsat-8 scene catalog.
pub const LANDSAT_CATALOG_URL: &str = "https://api.developmentseed.org/satellites";

/// Attribute holding the scene's cloud cover.
pub const CLOUD_ATTRIBUTE: &str = "cloudCover";

#[derive(Debug, Default, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    meta: PageMeta,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    #[serde(default)]
    found: Option<usize>,
}

/// Value of the attribute called `name`, looked up in `result.attributes[]`.
fn attribute<'a>(result: &'a Value, name: &str) -> Option<&'a Value> {
    result
        .get("attributes")?
        .as_array()?
        .iter()
        .filter(|attr| attr.get("name").and_then(Value::as_str) == Some(name))
        .find_map(|attr| attr.get("value"))
}

/// Numeric attributes are sent either as numbers or as strings.
fn as_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Scene name of a result, preferring the Collection-1 product id.
fn scene_name(result: &Value) -> Option<&str> {
    ["product_id", "scene_id"]
        .iter()
        .find_map(|key| result.get(*key).and_then(Value::as_str))
}

/// Search provider for a paged REST catalog of Landsat-8 scenes.
pub struct LandsatSearch {
    client: Arc<dyn HttpClient>,
    base_url: String,
    credentials: Option<Credentials>,
}

impl LandsatSearch {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// URL of the 1-based result page `page`.
    pub fn page_url(&self, query: &Query, page: usize) -> String {
        let mut params = vec![
            "satellite_name=landsat-8".to_string(),
            format!("limit={}", query.page_size),
            format!("page={}", page),
        ];
        if let Some(start) = query.start {
            params.push(format!("date_from={}", start));
        }
        if let Some(end) = query.end {
            params.push(format!("date_to={}", end));
        }
        if query.cloud_ceiling > 0.0 {
            params.push(format!("cloud_to={}", query.cloud_ceiling));
        }
        if let Some(orbit) = query.relative_orbit {
            params.push(format!("path={}", orbit));
        }
        if let Some(area) = &query.area {
            let rect = area.bounding_box();
            params.push(format!(
                "bbox={},{},{},{}",
                rect.min_lon, rect.min_lat, rect.max_lon, rect.max_lat
            ));
        }
        format!("{}/search?{}", self.base_url, params.join("&"))
    }
}

impl SearchProvider for LandsatSearch {
    fn name(&self) -> &str {
        "landsat"
    }

    fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        query.validate()?;
        if query.sensor != Sensor::Landsat8 {
            return Err(SearchError::InvalidQuery(
                "the Landsat catalog only serves Landsat-8 scenes".to_string(),
            ));
        }

        let mut results = ResultSet::new(self.name());
        let mut page = query.offset / query.page_size + 1;
        let mut received = 0usize;

        loop {
            let url = self.page_url(query, page);
            debug!(url = %url, "Querying Landsat catalog");

            let body = match fetch_text(
                self.client.as_ref(),
                self.name(),
                &url,
                self.credentials.as_ref(),
            ) {
                Ok(body) => body,
                Err(e) => {
                    log_failure(&e, results.len());
                    break;
                }
            };

            let parsed: CatalogPage = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    let error = SearchError::CatalogUnavailable {
                        provider: self.name().to_string(),
                        reason: format!("malformed page {}: {}", page, e),
                    };
                    log_failure(&error, results.len());
                    break;
                }
            };

            let page_len = parsed.results.len();
            received += page_len;

            for result in &parsed.results {
                let Some(name) = scene_name(result) else {
                    warn!("Catalog result without a scene name");
                    continue;
                };
                match ProductDescriptor::parse(name) {
                    Ok(mut product) => {
                        if let Some(clouds) = attribute(result, CLOUD_ATTRIBUTE).and_then(as_number) {
                            product = product.with_clouds_percentage(clouds);
                        }
                        results.offer(product, query);
                    }
                    Err(e) => warn!(error = %e, "Ignoring catalog result"),
                }
            }

            let exhausted = parsed
                .meta
                .found
                .is_some_and(|found| query.offset + received >= found);
            if page_len < query.page_size || exhausted {
                break;
            }
            page += 1;
        }

        info!(count = results.len(), "Landsat search complete");
        Ok(results.into_vec())
    }
}
