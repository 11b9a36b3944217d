//! Provider contract shared by every catalog.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::query::Query;
use crate::descriptor::ProductDescriptor;
use crate::transfer::{Credentials, HttpClient, RequestOptions};

/// Errors raised while querying a catalog.
///
/// Only [`SearchError::InvalidQuery`] escapes a search call. The other
/// variants describe why a request produced nothing and are logged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("{provider}: invalid credentials")]
    InvalidCredentials { provider: String },

    #[error("{provider} unavailable: {reason}")]
    CatalogUnavailable { provider: String, reason: String },
}

/// A catalog that turns a [`Query`] into product descriptors.
pub trait SearchProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Query the catalog.
    ///
    /// Results are deduplicated by product name and kept in first-seen
    /// order. Catalog failures yield whatever was accumulated so far.
    fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError>;
}

/// A primary provider with an optional secondary covering another platform.
///
/// The secondary receives a copy of the primary's query and is searched
/// independently.
pub struct ProviderChain {
    primary: Arc<dyn SearchProvider>,
    secondary: Option<Arc<dyn SearchProvider>>,
}

impl ProviderChain {
    pub fn new(primary: Arc<dyn SearchProvider>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn SearchProvider>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn primary(&self) -> &Arc<dyn SearchProvider> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Arc<dyn SearchProvider>> {
        self.secondary.as_ref()
    }

    /// Results of the primary provider only.
    pub fn search(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        self.primary.execute(query)
    }

    /// Results of the secondary provider, queried with a copy of `query`.
    pub fn search_secondary(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        match &self.secondary {
            Some(secondary) => secondary.execute(&query.clone()),
            None => Ok(Vec::new()),
        }
    }

    /// Primary results followed by unseen secondary results.
    pub fn search_all(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        let mut results = ResultSet::new(self.primary.name());
        for product in self.search(query)? {
            results.push(product);
        }
        for product in self.search_secondary(query)? {
            results.push(product);
        }
        Ok(results.into_vec())
    }
}

impl SearchProvider for ProviderChain {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
        self.search(query)
    }
}

/// Accumulates descriptors, dropping duplicates and filtered products.
pub(crate) struct ResultSet {
    provider: String,
    seen: HashSet<String>,
    products: Vec<ProductDescriptor>,
}

impl ResultSet {
    pub(crate) fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            seen: HashSet::new(),
            products: Vec::new(),
        }
    }

    /// Add `product` unless already seen. Returns whether it was added.
    pub(crate) fn push(&mut self, product: ProductDescriptor) -> bool {
        if !self.seen.insert(product.name().to_string()) {
            debug!(provider = %self.provider, product = %product.name(), "Duplicate result dropped");
            return false;
        }
        self.products.push(product);
        true
    }

    /// Add `product` if it passes the query's post-filters.
    pub(crate) fn offer(&mut self, product: ProductDescriptor, query: &Query) -> bool {
        if let Some(reason) = query.rejection_reason(&product) {
            info!(
                provider = %self.provider,
                product = %product.name(),
                reason = %reason,
                "Skipping product"
            );
            return false;
        }
        self.push(product)
    }

    pub(crate) fn len(&self) -> usize {
        self.products.len()
    }

    pub(crate) fn into_vec(self) -> Vec<ProductDescriptor> {
        self.products
    }
}

/// GET `url` and return the body, classifying non-success statuses.
pub(crate) fn fetch_text(
    client: &dyn HttpClient,
    provider: &str,
    url: &str,
    credentials: Option<&Credentials>,
) -> Result<String, SearchError> {
    let token = credentials.map(Credentials::basic_token);
    let options = RequestOptions::with_authorization(token.as_deref());

    let unavailable = |reason: String| SearchError::CatalogUnavailable {
        provider: provider.to_string(),
        reason,
    };

    let response = client.get(url, &options).map_err(|e| unavailable(e.to_string()))?;
    match response.status {
        200 => response.text(url).map_err(|e| unavailable(e.to_string())),
        401 => Err(SearchError::InvalidCredentials {
            provider: provider.to_string(),
        }),
        status => Err(unavailable(format!("HTTP {} for {}", status, url))),
    }
}

/// Log a failed catalog request in the shared format.
pub(crate) fn log_failure(error: &SearchError, collected: usize) {
    warn!(error = %error, collected, "Catalog request failed, keeping results so far");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::MockHttpClient;
    use std::sync::Mutex;

    const A: &str = "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030";
    const B: &str = "S2B_MSIL1C_20170708T092029_N0205_R093_T35TLK_20170708T092234";

    struct FixedProvider {
        name: &'static str,
        products: Vec<&'static str>,
        last_query: Mutex<Option<Query>>,
    }

    impl FixedProvider {
        fn new(name: &'static str, products: Vec<&'static str>) -> Self {
            Self {
                name,
                products,
                last_query: Mutex::new(None),
            }
        }
    }

    impl SearchProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn execute(&self, query: &Query) -> Result<Vec<ProductDescriptor>, SearchError> {
            *self.last_query.lock().unwrap() = Some(query.clone());
            let mut results = ResultSet::new(self.name);
            for name in &self.products {
                results.offer(ProductDescriptor::parse(name).unwrap(), query);
            }
            Ok(results.into_vec())
        }
    }

    #[test]
    fn test_result_set_dedupes_in_first_seen_order() {
        let mut set = ResultSet::new("test");
        assert!(set.push(ProductDescriptor::parse(B).unwrap()));
        assert!(set.push(ProductDescriptor::parse(A).unwrap()));
        assert!(!set.push(ProductDescriptor::parse(B).unwrap()));
        let names: Vec<_> = set.into_vec().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec![B, A]);
    }

    #[test]
    fn test_offer_applies_cloud_ceiling() {
        let query = Query::default().with_cloud_ceiling(30.0);
        let mut set = ResultSet::new("test");
        assert!(!set.offer(
            ProductDescriptor::parse(A).unwrap().with_clouds_percentage(80.0),
            &query
        ));
        assert!(set.offer(
            ProductDescriptor::parse(B).unwrap().with_clouds_percentage(10.0),
            &query
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_chain_merges_and_mirrors_filters() {
        let primary = Arc::new(FixedProvider::new("primary", vec![A]));
        let secondary = Arc::new(FixedProvider::new("secondary", vec![A, B]));
        let chain = ProviderChain::new(primary.clone()).with_secondary(secondary.clone());

        let query = Query::default().with_relative_orbit(93).with_cloud_ceiling(20.0);
        assert_eq!(chain.search(&query).unwrap().len(), 1);

        let all = chain.search_all(&query).unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec![A, B]);

        let mirrored = secondary.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(mirrored, query);
    }

    #[test]
    fn test_chain_without_secondary() {
        let chain = ProviderChain::new(Arc::new(FixedProvider::new("primary", vec![A])));
        assert!(chain.search_secondary(&Query::default()).unwrap().is_empty());
        assert_eq!(chain.search_all(&Query::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_text_classifies_status() {
        let client = MockHttpClient::new()
            .with_file("http://catalog/ok", "body")
            .with_status("http://catalog/auth", 401)
            .with_status("http://catalog/down", 503);

        assert_eq!(fetch_text(&client, "c", "http://catalog/ok", None).unwrap(), "body");
        assert_eq!(
            fetch_text(&client, "c", "http://catalog/auth", None),
            Err(SearchError::InvalidCredentials {
                provider: "c".to_string()
            })
        );
        assert!(matches!(
            fetch_text(&client, "c", "http://catalog/down", None),
            Err(SearchError::CatalogUnavailable { .. })
        ));
    }
}
