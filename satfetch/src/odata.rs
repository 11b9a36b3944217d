//! OData node addressing.
//!
//! Hierarchical catalogs expose a product's internal files as nested
//! `Nodes('...')` resources under `Products('{uuid}')`; appending `/$value`
//! addresses the raw byte stream of a node.
//!
//! [`ODataPath`] is an immutable value: `root` starts a fresh address and
//! every `node` returns a new path extended by one segment. Chaining `node`
//! on an existing value therefore always extends that value, and an address
//! for a different resource must start from its own `root` (or from a
//! shared prefix value kept aside).
//!
//! ```
//! use satfetch::odata::ODataPath;
//!
//! let product = ODataPath::root("https://hub/odata/v1/Products('42')");
//! let granules = product.node("S2A.SAFE").node("GRANULE");
//! assert_eq!(granules.path(), "https://hub/odata/v1/Products('42')/Nodes('S2A.SAFE')/Nodes('GRANULE')");
//! assert_eq!(product.value(), "https://hub/odata/v1/Products('42')/$value");
//! ```

use std::fmt;

/// An accumulated OData resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ODataPath {
    url: String,
}

impl ODataPath {
    /// Start an address at a base resource URL.
    pub fn root(base: impl Into<String>) -> Self {
        Self { url: base.into() }
    }

    /// Address of a product entity in an OData service.
    pub fn product(service_url: &str, uuid: &str) -> Self {
        Self::root(format!(
            "{}/Products('{}')",
            service_url.trim_end_matches('/'),
            uuid
        ))
    }

    /// Extend the address with one `Nodes('name')` segment.
    pub fn node(&self, name: &str) -> Self {
        Self {
            url: format!("{}/Nodes('{}')", self.url, name),
        }
    }

    /// Extend the address with several nested nodes.
    pub fn nodes<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        names.into_iter().fold(self.clone(), |path, name| path.node(name))
    }

    /// The address of the collection itself.
    pub fn path(&self) -> &str {
        &self.url
    }

    /// The address of the node's byte stream.
    pub fn value(&self) -> String {
        format!("{}/$value", self.url)
    }
}

impl fmt::Display for ODataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_node_value() {
        let url = ODataPath::root("A").node("B").node("C").value();
        assert_eq!(url, "A/Nodes('B')/Nodes('C')/$value");
    }

    #[test]
    fn test_node_without_root_appends() {
        let first = ODataPath::root("A").node("B").node("C");
        let second = first.node("D");
        assert_eq!(second.path(), "A/Nodes('B')/Nodes('C')/Nodes('D')");
        // the original value is untouched
        assert_eq!(first.path(), "A/Nodes('B')/Nodes('C')");
    }

    #[test]
    fn test_root_starts_fresh() {
        let _ = ODataPath::root("A").node("B");
        assert_eq!(ODataPath::root("X").node("Y").path(), "X/Nodes('Y')");
    }

    #[test]
    fn test_product_address() {
        let p = ODataPath::product("https://hub/odata/v1/", "abc");
        assert_eq!(p.path(), "https://hub/odata/v1/Products('abc')");
        assert_eq!(p.value(), "https://hub/odata/v1/Products('abc')/$value");
    }

    #[test]
    fn test_nodes() {
        let p = ODataPath::root("A").nodes(["P.SAFE", "GRANULE", "G1", "IMG_DATA"]);
        assert_eq!(
            p.path(),
            "A/Nodes('P.SAFE')/Nodes('GRANULE')/Nodes('G1')/Nodes('IMG_DATA')"
        );
    }
}
