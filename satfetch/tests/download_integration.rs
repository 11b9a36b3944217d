//! Integration tests for search and download.
//!
//! These tests run the library end to end against an in-memory HTTP store:
//! - Catalog search with area, date window and cloud ceiling
//! - Tile-filtered assembly of a SAFE product from the object store
//! - Fallback to an alternate backend
//! - Resumed transfers
//!
//! Run with: `cargo test --test download_integration`

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tempfile::TempDir;

use satfetch::descriptor::{PlatformType, ProductDescriptor, Sensor};
use satfetch::download::{DownloadConfig, ProductDownloader, ProductStore, ReturnCode};
use satfetch::geo::Polygon;
use satfetch::search::{Query, SciHubSearch, SearchProvider};
use satfetch::transfer::{
    DownloadMode, HttpClient, HttpResponse, RequestOptions, ResumableDownloader,
    ThroughputTracker, TransferResult,
};

// ============================================================================
// In-memory store
// ============================================================================

/// Serves a fixed set of URLs. Unknown URLs answer 404.
#[derive(Default)]
struct InMemoryStore {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<(String, RequestOptions)>>,
}

impl InMemoryStore {
    fn with(mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.into(), content.into());
        self
    }

    fn requested(&self) -> Vec<(String, RequestOptions)> {
        self.requests.lock().unwrap().clone()
    }

    fn requested_urls(&self) -> Vec<String> {
        self.requested().into_iter().map(|(url, _)| url).collect()
    }
}

impl HttpClient for InMemoryStore {
    fn get(&self, url: &str, options: &RequestOptions) -> TransferResult<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        let Some(data) = self.files.get(url) else {
            return Ok(HttpResponse::new(404, None, Box::new(Cursor::new(Vec::new()))));
        };
        let (status, body) = match options.range_start {
            Some(start) => (206, data[(start as usize).min(data.len())..].to_vec()),
            None => (200, data.clone()),
        };
        Ok(HttpResponse::new(
            status,
            Some(body.len() as u64),
            Box::new(Cursor::new(body)),
        ))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const S2: &str = "http://s2.test";
const L8: &str = "http://l8.test";
const HUB: &str = "http://hub.test";

const IN_WINDOW: &str = "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030";
const TOO_CLOUDY: &str = "S2B_MSIL1C_20170708T092029_N0205_R093_T35TLK_20170708T092234";
const TOO_EARLY: &str = "S2A_MSIL1C_20170623T092031_N0205_R093_T35TLK_20170623T092030";
const DATASTRIP: &str = "S2A_OPER_MSI_L1C_DS_SGS__20170703T111805_S20170703T092030_N02.05";

const TILES: &[&str] = &["35TLK", "35TLL", "35TMK"];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn area() -> Polygon {
    Polygon::new(vec![(24.0, 44.5), (25.5, 44.5), (25.5, 45.5), (24.0, 45.5)])
}

fn query() -> Query {
    Query::new(Sensor::Sentinel2)
        .with_area(area())
        .with_dates(date(2017, 7, 1), date(2017, 7, 14))
        .with_cloud_ceiling(30.0)
}

fn feed() -> String {
    let entry = |name: &str, id: &str, clouds: f64| {
        format!(
            "<entry>\n<title>{}</title>\n<id>{}</id>\n<double name=\"cloudcoverpercentage\">{}</double>\n</entry>",
            name, id, clouds
        )
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n<title>results</title>\n{}\n{}\n{}\n</feed>",
        entry(IN_WINDOW, "uuid-1", 12.5),
        entry(TOO_CLOUDY, "uuid-2", 64.0),
        entry(TOO_EARLY, "uuid-3", 3.0),
    )
}

fn granule_id(tile: &str) -> String {
    format!(
        "S2A_OPER_MSI_L1C_TL_SGS__20170703T111805_A010606_T{}_N02.05",
        tile
    )
}

fn product_metadata() -> String {
    let granules: Vec<String> = TILES
        .iter()
        .map(|tile| {
            format!(
                "<Granule_List>\n<Granule datastripIdentifier=\"{}\" granuleIdentifier=\"{}\" imageFormat=\"JPEG2000\">\n<IMAGE_FILE>GRANULE/x</IMAGE_FILE>\n</Granule>\n</Granule_List>",
                DATASTRIP,
                granule_id(tile)
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\n<n1:Level-1C_User_Product>\n<Product_Organisation>\n{}\n</Product_Organisation>\n</n1:Level-1C_User_Product>",
        granules.join("\n")
    )
}

/// Object store holding `IN_WINDOW` with every tile of `TILES`.
fn object_store() -> InMemoryStore {
    let product_dir = format!("{}/products/2017/7/3/{}", S2, IN_WINDOW);
    let mut store = InMemoryStore::default()
        .with(format!("{}/metadata.xml", product_dir), product_metadata())
        .with(format!("{}/datastrip/0/metadata.xml", product_dir), "<datastrip/>");

    for tile in TILES {
        let (zone, band, square) = (&tile[..2], &tile[2..3], &tile[3..]);
        let tile_dir = format!("{}/tiles/{}/{}/{}/2017/7/3/0", S2, zone, band, square);
        store = store
            .with(
                format!("{}/metadata.xml", tile_dir),
                "<Pixel_Level_QI>\n<MASK_FILENAME type=\"MSK_CLOUDS\">GRANULE/g/QI_DATA/MSK_CLOUDS_B00.gml</MASK_FILENAME>\n<MASK_FILENAME type=\"MSK_DETFOO\">GRANULE/g/QI_DATA/MSK_DETFOO_B04.gml</MASK_FILENAME>\n</Pixel_Level_QI>",
            )
            .with(format!("{}/B04.jp2", tile_dir), format!("B04 of {}", tile))
            .with(format!("{}/qi/MSK_CLOUDS_B00.gml", tile_dir), "<clouds/>")
            .with(format!("{}/qi/MSK_DETFOO_B04.gml", tile_dir), "<detfoo/>")
            .with(format!("{}/auxiliary/ECMWFT", tile_dir), "ecmwf");
    }
    store
}

fn aws_config(target: &Path) -> DownloadConfig {
    DownloadConfig::new(target)
        .with_aws_url(S2)
        .with_landsat_url(L8)
}

fn granule_folders(safe: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(safe.join("GRANULE"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Search by area, window and cloud ceiling, then download the first result
/// restricted to one tile.
#[test]
fn test_search_then_tile_filtered_download() {
    let temp = TempDir::new().unwrap();
    let query = query();

    let catalog = SciHubSearch::new(Arc::new(InMemoryStore::default())).with_base_url(HUB);
    let catalog_store = Arc::new(InMemoryStore::default().with(catalog.page_url(&query, 0), feed()));
    let catalog = SciHubSearch::new(catalog_store.clone()).with_base_url(HUB);

    let products = catalog.execute(&query).unwrap();
    assert_eq!(products.len(), 1);
    for product in &products {
        let sensed = product.sensing_date().unwrap();
        assert!(sensed >= date(2017, 7, 1) && sensed <= date(2017, 7, 14));
        assert!(product.clouds_percentage().unwrap() <= 30.0);
    }
    assert_eq!(products[0].name(), IN_WINDOW);
    assert_eq!(products[0].id(), Some("uuid-1"));

    let config = aws_config(temp.path())
        .with_tiles(["T35TLK"])
        .with_bands(["B04"]);
    let store = Arc::new(object_store());
    let downloader = ProductDownloader::new(config, store.clone()).unwrap();

    let report = downloader.download_all(&products[..1]);
    assert_eq!(report.worst(), ReturnCode::Ok);

    let safe = temp.path().join(format!("{}.SAFE", IN_WINDOW));
    let folders = granule_folders(&safe);
    assert_eq!(folders, vec!["L1C_T35TLK_A010606_20170703T092030".to_string()]);

    let granule = safe.join("GRANULE").join(&folders[0]);
    assert_eq!(
        fs::read_to_string(granule.join("IMG_DATA/T35TLK_20170703T092031_B04.jp2")).unwrap(),
        "B04 of 35TLK"
    );
    // masks follow the band allow-list
    assert!(granule.join("QI_DATA/MSK_DETFOO_B04.gml").is_file());
    assert!(!granule.join("QI_DATA/MSK_CLOUDS_B00.gml").exists());

    let metadata = fs::read_to_string(safe.join("MTD_MSIL1C.xml")).unwrap();
    assert_eq!(metadata.matches("<Granule ").count(), 1);
    assert!(!store
        .requested_urls()
        .iter()
        .any(|u| u.contains("/tiles/35/T/LL/") || u.contains("/tiles/35/T/MK/")));
}

/// A filter matching two of three granules fetches exactly two folders.
#[test]
fn test_partial_tile_filter() {
    let temp = TempDir::new().unwrap();
    let config = aws_config(temp.path())
        .with_tiles(["35TLK", "35TMK"])
        .with_bands(["B04"])
        .with_fetch_aux(false);
    let downloader = ProductDownloader::new(config, Arc::new(object_store())).unwrap();

    let outcome = downloader.download(&ProductDescriptor::parse(IN_WINDOW).unwrap());
    assert!(outcome.is_ok(), "{}", outcome);

    let safe = outcome.path.unwrap();
    assert_eq!(granule_folders(&safe).len(), 2);
    let metadata = fs::read_to_string(safe.join("MTD_MSIL1C.xml")).unwrap();
    assert_eq!(metadata.matches("<Granule ").count(), 2);
}

/// A filter matching no granule leaves no metadata behind.
#[test]
fn test_tile_filter_matching_nothing() {
    let temp = TempDir::new().unwrap();
    let config = aws_config(temp.path()).with_tiles(["34TFQ"]);
    let downloader = ProductDownloader::new(config, Arc::new(object_store())).unwrap();

    let outcome = downloader.download(&ProductDescriptor::parse(IN_WINDOW).unwrap());
    assert_eq!(outcome.code, ReturnCode::EmptyProduct);
    assert!(!temp
        .path()
        .join(format!("{}.SAFE/MTD_MSIL1C.xml", IN_WINDOW))
        .exists());
}

/// The catalog has nothing; the object store, registered as alternate for
/// Sentinel-2A, delivers the product.
#[test]
fn test_fallback_to_intended_alternate() {
    let temp = TempDir::new().unwrap();
    let alternate = ProductDownloader::new(
        aws_config(temp.path())
            .with_bands(["B04"])
            .with_platforms([PlatformType::S2A]),
        Arc::new(object_store()),
    )
    .unwrap();
    let primary = ProductDownloader::new(
        DownloadConfig::new(temp.path())
            .with_store(ProductStore::SciHub)
            .with_scihub_url(HUB),
        Arc::new(InMemoryStore::default()),
    )
    .unwrap()
    .with_alternate(alternate);

    let product = ProductDescriptor::parse(IN_WINDOW).unwrap().with_id("uuid-1");
    let outcome = primary.download(&product);
    assert_eq!(outcome.code, ReturnCode::Ok, "{}", outcome);
    assert_eq!(outcome.backend.as_deref(), Some("aws"));
    assert_eq!(granule_folders(&outcome.path.unwrap()).len(), TILES.len());
}

/// An alternate serving another platform is not tried.
#[test]
fn test_no_fallback_to_other_platform() {
    let temp = TempDir::new().unwrap();
    let alternate_store = Arc::new(object_store());
    let alternate = ProductDownloader::new(
        aws_config(temp.path()).with_platforms([PlatformType::S2B]),
        alternate_store.clone(),
    )
    .unwrap();
    let primary = ProductDownloader::new(
        DownloadConfig::new(temp.path())
            .with_store(ProductStore::SciHub)
            .with_scihub_url(HUB),
        Arc::new(InMemoryStore::default()),
    )
    .unwrap()
    .with_alternate(alternate);

    let product = ProductDescriptor::parse(IN_WINDOW).unwrap().with_id("uuid-1");
    let outcome = primary.download(&product);
    assert_eq!(outcome.code, ReturnCode::EmptyProduct);
    assert!(alternate_store.requested_urls().is_empty());
}

/// A partial file is completed with a range request; a complete one is not
/// read again.
#[test]
fn test_resume_partial_file() {
    let temp = TempDir::new().unwrap();
    let url = "http://s2.test/big.jp2";
    let content: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
    let store = Arc::new(InMemoryStore::default().with(url, content.clone()));
    let downloader = ResumableDownloader::new(store.clone());
    let dest = temp.path().join("big.jp2");
    fs::write(&dest, &content[..50_000]).unwrap();

    let mut throughput = ThroughputTracker::new();
    downloader
        .fetch(url, &dest, DownloadMode::Resume, &mut throughput)
        .unwrap();
    assert_eq!(fs::read(&dest).unwrap(), content);
    assert!(store
        .requested()
        .iter()
        .any(|(_, options)| options.range_start == Some(50_000)));

    let before = store.requested().len();
    downloader
        .fetch(url, &dest, DownloadMode::Resume, &mut throughput)
        .unwrap();
    let after = store.requested();
    assert_eq!(after.len(), before + 1);
    assert_eq!(after.last().unwrap().1.range_start, None);
    assert_eq!(fs::read(&dest).unwrap().len(), content.len());
}
