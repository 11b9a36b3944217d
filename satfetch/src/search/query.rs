//! Catalog-independent search query.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::types::SearchError;
use crate::descriptor::{normalize_tile, PlatformType, ProductDescriptor, Sensor};
use crate::geo::Polygon;

/// Default page size for paged catalogs.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// What to look for, independent of the catalog queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sensor: Sensor,
    /// Area of interest.
    pub area: Option<Polygon>,
    /// Explicit tile ids (normalized, without leading `T`).
    pub tiles: BTreeSet<String>,
    /// First sensing day, inclusive.
    pub start: Option<NaiveDate>,
    /// Last sensing day, inclusive.
    pub end: Option<NaiveDate>,
    /// Maximum cloud coverage in percent; 0 means no limit.
    pub cloud_ceiling: f64,
    pub relative_orbit: Option<u32>,
    /// Restrict results to one satellite of the mission.
    pub platform: Option<PlatformType>,
    pub page_size: usize,
    pub offset: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            sensor: Sensor::Sentinel2,
            area: None,
            tiles: BTreeSet::new(),
            start: None,
            end: None,
            cloud_ceiling: 0.0,
            relative_orbit: None,
            platform: None,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Query {
    pub fn new(sensor: Sensor) -> Self {
        Self {
            sensor,
            ..Default::default()
        }
    }

    pub fn with_area(mut self, area: Polygon) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_tiles<I, S>(mut self, tiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tiles = tiles.into_iter().map(|t| normalize_tile(t.as_ref())).collect();
        self
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_cloud_ceiling(mut self, percent: f64) -> Self {
        self.cloud_ceiling = percent;
        self
    }

    pub fn with_relative_orbit(mut self, orbit: u32) -> Self {
        self.relative_orbit = Some(orbit);
        self
    }

    pub fn with_platform(mut self, platform: PlatformType) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_page(mut self, page_size: usize, offset: usize) -> Self {
        self.page_size = page_size;
        self.offset = offset;
        self
    }

    /// Reject queries no catalog could answer.
    pub fn validate(&self) -> Result<(), SearchError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(SearchError::InvalidQuery(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        if self.page_size == 0 {
            return Err(SearchError::InvalidQuery("page size must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.cloud_ceiling) {
            return Err(SearchError::InvalidQuery(format!(
                "cloud ceiling {} is not a percentage",
                self.cloud_ceiling
            )));
        }
        if let Some(platform) = self.platform {
            if platform.sensor() != self.sensor {
                return Err(SearchError::InvalidQuery(format!(
                    "platform {} does not belong to {}",
                    platform, self.sensor
                )));
            }
        }
        Ok(())
    }

    /// Whether a cloud value passes the ceiling. Unknown values pass.
    pub fn accepts_clouds(&self, clouds: Option<f64>) -> bool {
        match clouds {
            Some(value) if self.cloud_ceiling > 0.0 => value <= self.cloud_ceiling,
            _ => true,
        }
    }

    pub fn accepts_date(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Why `product` is excluded by this query's post-filters, if it is.
    pub fn rejection_reason(&self, product: &ProductDescriptor) -> Option<String> {
        if product.sensor() != self.sensor {
            return Some(format!("sensor is {}", product.sensor()));
        }
        if !self.accepts_clouds(product.clouds_percentage()) {
            return Some(format!(
                "cloud coverage {:.2}% exceeds {:.2}%",
                product.clouds_percentage().unwrap_or_default(),
                self.cloud_ceiling
            ));
        }
        if let Some(date) = product.sensing_date() {
            if !self.accepts_date(date) {
                return Some(format!("sensed on {}, outside the date window", date));
            }
        }
        if let (Some(wanted), Some(orbit)) = (self.relative_orbit, product.relative_orbit()) {
            if wanted != orbit {
                return Some(format!("relative orbit {} is not {}", orbit, wanted));
            }
        }
        if let (Some(wanted), Some(platform)) = (self.platform, product.platform()) {
            if wanted != platform {
                return Some(format!("platform {} is not {}", platform, wanted));
            }
        }
        if let Some(tile) = product.tile_id() {
            if !self.tiles.is_empty() && !self.tiles.contains(&tile) {
                return Some(format!("tile {} is not requested", tile));
            }
        }
        None
    }
}
