//! Catalog search.
//!
//! Every catalog implements [`SearchProvider`], turning a [`Query`] into
//! validated [`ProductDescriptor`](crate::descriptor::ProductDescriptor)s:
//!
//! - [`SciHubSearch`]: OpenSearch Atom feed
//! - [`AwsSearch`]: bucket listing walked by tile and date
//! - [`LandsatSearch`]: paged JSON catalog
//!
//! [`ProviderChain`] pairs a primary provider with a secondary one.

mod aws;
mod landsat;
mod query;
mod scihub;
mod types;

pub use aws::{tile_prefix, AwsSearch, AWS_S2_URL};
pub use landsat::{LandsatSearch, CLOUD_ATTRIBUTE, LANDSAT_CATALOG_URL};
pub use query::{Query, DEFAULT_PAGE_SIZE};
pub use scihub::{SciHubSearch, SCIHUB_URL};
pub use types::{ProviderChain, SearchError, SearchProvider};
