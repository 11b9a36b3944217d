//! Product download orchestration.
//!
//! A [`ProductDownloader`] drives one product at a time through
//! `Init → Dispatch → {Archive | Metadata → Tile loop (+ Datastrip once)} →
//! Compress → Done` and turns the result into a [`ProductOutcome`].
//! A product the configured backend cannot deliver at all is handed to an
//! optional alternate downloader, provided the alternate serves the
//! product's platform.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collab::{MetadataRepair, PassThroughRepair, RepairMode};
use crate::descriptor::{ProductDescriptor, SchemaVersion, Sensor};
use crate::transfer::{
    DownloadMode, HttpClient, ReqwestClient, ResumableDownloader, ThroughputTracker,
};

use super::archive::compress_dir;
use super::config::{DownloadConfig, ProductStore};
use super::error::{DownloadError, DownloadResult};
use super::layout::{AwsLayout, GranuleRef, ODataLayout, RemoteLayout};
use super::local::{FileFilter, LocalMirror};
use super::log::ProductLog;
use super::metadata::{filter_granules, mask_files, mask_selected, read_lines, scan_granules, write_lines};
use super::progress::{BatchProgress, ProgressSinks};
use super::safe::SafeLayout;
use super::state::{BatchReport, ProductOutcome, ReturnCode, Step};

/// Where products are fetched from.
#[derive(Debug, Clone)]
enum Backend {
    Local(LocalMirror),
    ObjectStore(AwsLayout),
    Catalog(ODataLayout),
}

impl Backend {
    fn from_config(config: &DownloadConfig) -> DownloadResult<Self> {
        match config.store {
            ProductStore::Local => {
                let root = config.local_root.clone().ok_or_else(|| {
                    DownloadError::Fatal("the local store needs a mirror root".to_string())
                })?;
                Ok(Backend::Local(LocalMirror::new(root)))
            }
            ProductStore::Aws if !config.mode.is_remote() => Err(remote_mode_error(config)),
            ProductStore::SciHub if !config.mode.is_remote() => Err(remote_mode_error(config)),
            ProductStore::Aws => Ok(Backend::ObjectStore(AwsLayout::new(
                &config.aws_url,
                &config.landsat_url,
            ))),
            ProductStore::SciHub => Ok(Backend::Catalog(ODataLayout::new(&config.scihub_url))),
        }
    }
}

fn remote_mode_error(config: &DownloadConfig) -> DownloadError {
    DownloadError::Fatal(format!(
        "mode {} requires the local store, not {}",
        config.mode, config.store
    ))
}

/// Downloads products from one backend, with an optional fallback.
pub struct ProductDownloader {
    config: DownloadConfig,
    backend: Backend,
    transfer: ResumableDownloader,
    repair: Arc<dyn MetadataRepair>,
    sinks: ProgressSinks,
    alternate: Option<Box<ProductDownloader>>,
}

impl ProductDownloader {
    /// Create a downloader using `client` for every remote request.
    ///
    /// Fails with [`DownloadError::Fatal`] when the configuration cannot
    /// work at all, e.g. a local store without a mirror root.
    pub fn new(config: DownloadConfig, client: Arc<dyn HttpClient>) -> DownloadResult<Self> {
        let backend = Backend::from_config(&config)?;
        let authorization = config.credentials.as_ref().map(|c| c.basic_token());
        let transfer = ResumableDownloader::new(client).with_authorization(authorization);

        Ok(Self {
            config,
            backend,
            transfer,
            repair: Arc::new(PassThroughRepair),
            sinks: ProgressSinks::new(),
            alternate: None,
        })
    }

    /// Create a downloader backed by a real HTTP client built from the
    /// configuration's timeout and proxy.
    pub fn from_config(config: DownloadConfig) -> DownloadResult<Self> {
        let client = ReqwestClient::with_config(&config.network())
            .map_err(|e| DownloadError::Fatal(e.to_string()))?;
        Self::new(config, Arc::new(client))
    }

    pub fn with_repair(mut self, repair: Arc<dyn MetadataRepair>) -> Self {
        self.repair = repair;
        self
    }

    pub fn with_progress(mut self, sinks: ProgressSinks) -> Self {
        self.transfer = self.transfer.with_progress(sinks.file());
        self.sinks = sinks;
        self
    }

    /// Downloader tried when this one cannot deliver a product.
    pub fn with_alternate(mut self, alternate: ProductDownloader) -> Self {
        self.alternate = Some(Box::new(alternate));
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Configured repair mode the installed repair cannot honor.
    pub fn unsupported_repair_mode(&self) -> Option<RepairMode> {
        let mode = self.config.repair_mode;
        (!self.repair.supports(mode)).then_some(mode)
    }

    pub fn alternate(&self) -> Option<&ProductDownloader> {
        self.alternate.as_deref()
    }

    /// Backend name reported in outcomes.
    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Local(_) => ProductStore::Local.name(),
            Backend::ObjectStore(layout) => layout.name(),
            Backend::Catalog(layout) => layout.name(),
        }
    }

    /// Whether this downloader serves the product's platform. An empty
    /// platform set serves every platform.
    pub fn is_intended_for(&self, product: &ProductDescriptor) -> bool {
        self.config.platforms.is_empty()
            || product
                .platform()
                .is_some_and(|p| self.config.platforms.contains(&p))
    }

    /// Download products given as names, with catalog ids in the same
    /// order (or no ids at all).
    ///
    /// An invalid name or mismatched lists fail before anything is
    /// downloaded.
    pub fn download_names(&self, names: &[String], ids: &[String]) -> DownloadResult<BatchReport> {
        let products = ProductDescriptor::from_names_and_ids(names, ids)?;
        Ok(self.download_all(&products))
    }

    /// Download every product, in order.
    ///
    /// One product's failure never stops the batch; a
    /// [`ReturnCode::Fatal`] outcome does.
    pub fn download_all(&self, products: &[ProductDescriptor]) -> BatchReport {
        let mut report = BatchReport::new();
        info!(
            count = products.len(),
            store = %self.config.store,
            target = %self.config.target_dir.display(),
            "Starting batch"
        );
        if let Some(mode) = self.unsupported_repair_mode() {
            warn!(mode = mode.name(), "Metadata repair not available, files are kept as downloaded");
        }

        for product in products {
            let outcome = self.download(product);
            let code = outcome.code;
            self.sinks.report_batch(&BatchProgress {
                completed: report.len() + 1,
                total: products.len(),
                product: outcome.product.clone(),
                code,
                average_speed: outcome.average_speed,
            });
            report.record(outcome);

            if code == ReturnCode::Fatal {
                warn!(product = %product.name(), "Fatal error, aborting batch");
                break;
            }
        }

        info!(
            succeeded = report.succeeded(),
            total = products.len(),
            worst = %report.worst(),
            "Batch finished"
        );
        report
    }

    /// Download one product, falling back to the alternate downloader when
    /// this backend has nothing to deliver.
    pub fn download(&self, product: &ProductDescriptor) -> ProductOutcome {
        let (outcome, soft_miss) = self.download_once(product);
        if !soft_miss {
            return outcome;
        }

        match self.alternate.as_deref() {
            Some(alternate) if alternate.is_intended_for(product) => {
                info!(
                    product = %product.name(),
                    from = self.backend_name(),
                    to = alternate.backend_name(),
                    "Falling back to alternate backend"
                );
                alternate.download_once(product).0
            }
            Some(alternate) => {
                debug!(
                    product = %product.name(),
                    alternate = alternate.backend_name(),
                    "Alternate backend does not serve this platform"
                );
                outcome
            }
            None => outcome,
        }
    }

    /// One attempt on this backend only. The flag tells whether the product
    /// was simply unavailable here.
    fn download_once(&self, product: &ProductDescriptor) -> (ProductOutcome, bool) {
        let mut log = ProductLog::open(product.name(), self.config.log_dir.as_deref());
        let mut throughput = ThroughputTracker::new();

        let result = self.attempt(product, &mut log, &mut throughput);
        let (mut outcome, soft_miss) = match result {
            Ok(path) => (
                ProductOutcome::succeeded(product.name(), path, self.backend_name()),
                false,
            ),
            Err(e) => (
                ProductOutcome::failed(
                    product.name(),
                    e.return_code(),
                    log.current_step().clone(),
                    e.to_string(),
                ),
                e.is_soft_miss(),
            ),
        };
        outcome.average_speed = throughput.average();
        log.finish(&outcome);
        (outcome, soft_miss)
    }

    fn attempt(
        &self,
        product: &ProductDescriptor,
        log: &mut ProductLog,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<PathBuf> {
        let target = &self.config.target_dir;
        fs::create_dir_all(target).map_err(|e| {
            DownloadError::Fatal(format!("cannot create {}: {}", target.display(), e))
        })?;

        log.step(Step::Dispatch);
        let path = match &self.backend {
            Backend::Local(mirror) => {
                log.step(Step::Local);
                mirror.materialize(product, target, self.config.mode, &self.file_filter(product))?
            }
            Backend::ObjectStore(layout) => self.fetch_remote(product, layout, log, throughput)?,
            Backend::Catalog(layout) => {
                let product = self.resolve_catalog_id(product, layout)?;
                self.fetch_remote(&product, layout, log, throughput)?
            }
        };

        let path = if self.config.compress && path.is_dir() {
            log.step(Step::Compress);
            compress_dir(&path, self.config.delete_after_compress)?
        } else {
            path
        };

        log.step(Step::Done);
        Ok(path)
    }

    /// Look up the catalog id of a product that was given by name only.
    fn resolve_catalog_id(
        &self,
        product: &ProductDescriptor,
        layout: &ODataLayout,
    ) -> DownloadResult<ProductDescriptor> {
        if product.id().is_some() {
            return Ok(product.clone());
        }

        let url = layout.lookup_url(product.name());
        debug!(product = %product.name(), url = %url, "Looking up catalog id");
        let response = self.transfer.open(&url)?;
        if !response.is_success() {
            return Err(DownloadError::empty(
                product.name(),
                format!("catalog lookup returned HTTP {}", response.status),
            ));
        }

        let body = response.text(&url)?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            DownloadError::empty(product.name(), format!("unreadable catalog lookup: {}", e))
        })?;
        let id = value
            .pointer("/d/results/0/Id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DownloadError::empty(product.name(), "not found in catalog"))?;

        info!(product = %product.name(), id, "Resolved catalog id");
        Ok(product.clone().with_id(id))
    }

    fn fetch_remote(
        &self,
        product: &ProductDescriptor,
        layout: &dyn RemoteLayout,
        log: &mut ProductLog,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<PathBuf> {
        if product.sensor() == Sensor::Landsat8 {
            return self.fetch_flat(product, layout, log, throughput);
        }

        if product.version() == SchemaVersion::Legacy && !self.config.has_tile_filter() {
            if let Some(url) = layout.archive(product) {
                log.step(Step::Archive);
                let dest = self.config.target_dir.join(format!("{}.zip", product.name()));
                if let Some(path) = self.fetch_file(&url, &dest, throughput)? {
                    return Ok(path);
                }
                log.line("Archive not available, assembling from parts");
            }
        }

        self.assemble(product, layout, log, throughput)
    }

    /// Build the product directory file by file.
    fn assemble(
        &self,
        product: &ProductDescriptor,
        layout: &dyn RemoteLayout,
        log: &mut ProductLog,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<PathBuf> {
        log.step(Step::Metadata);
        let name = product.name();
        let metadata_name = product
            .metadata_file_name()
            .ok_or_else(|| DownloadError::InvalidInput(format!("{}: no metadata file name", name)))?;
        let url = layout
            .product_metadata(product)
            .ok_or_else(|| DownloadError::empty(name, format!("not addressable on {}", layout.name())))?;

        let safe = SafeLayout::new(self.config.target_dir.join(product.product_folder()));
        safe.create_root()?;
        let metadata_path = safe.file(&metadata_name);

        if self.fetch_metadata(&url, &metadata_path, throughput)?.is_none() {
            discard(safe.root());
            return Err(DownloadError::empty(name, "product metadata not found"));
        }

        let lines = read_lines(&metadata_path).map_err(|e| DownloadError::io(&metadata_path, e))?;
        let granules = if self.config.has_tile_filter() {
            let (kept_lines, kept) = filter_granules(&lines, &self.config.tiles);
            if kept.is_empty() {
                discard(safe.root());
                return Err(DownloadError::NoMatchingTiles {
                    product: name.to_string(),
                });
            }
            write_lines(&metadata_path, &kept_lines)
                .map_err(|e| DownloadError::io(&metadata_path, e))?;
            kept
        } else {
            scan_granules(&lines)
        };

        if granules.is_empty() {
            discard(safe.root());
            return Err(DownloadError::empty(name, "metadata lists no granules"));
        }

        let folders = granules
            .iter()
            .map(|g| {
                product
                    .granule_folder(&g.datastrip_id, &g.granule_id)
                    .ok_or_else(|| DownloadError::InvalidInput(format!("{}: bad granule {}", name, g.granule_id)))
            })
            .collect::<DownloadResult<Vec<_>>>()?;
        safe.create_skeleton(&folders, None)?;
        info!(product = %name, granules = granules.len(), "Granules selected");

        let bands = self.selected_bands(product);
        let total = granules.len();
        let mut datastrip_done = false;

        for (index, (record, folder)) in granules.iter().zip(folders).enumerate() {
            log.step(Step::Tile {
                index: index + 1,
                total,
            });
            let granule = GranuleRef {
                datastrip_id: record.datastrip_id.clone(),
                granule_id: record.granule_id.clone(),
                folder,
            };

            if !datastrip_done {
                self.fetch_datastrip(product, layout, &safe, &granule.datastrip_id, log, throughput)?;
                datastrip_done = true;
                log.step(Step::Tile {
                    index: index + 1,
                    total,
                });
            }

            self.fetch_granule(product, layout, &safe, &granule, &bands, throughput)?;
        }

        Ok(safe.root().to_path_buf())
    }

    fn fetch_datastrip(
        &self,
        product: &ProductDescriptor,
        layout: &dyn RemoteLayout,
        safe: &SafeLayout,
        datastrip_id: &str,
        log: &mut ProductLog,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<()> {
        log.step(Step::Datastrip);
        let (Some(folder), Some(file), Some(url)) = (
            product.datastrip_folder(datastrip_id),
            product.datastrip_metadata_file_name(datastrip_id),
            layout.datastrip_metadata(product, datastrip_id),
        ) else {
            debug!(datastrip = datastrip_id, "Datastrip not addressable");
            return Ok(());
        };

        safe.create_datastrip(&folder)?;
        let dest = safe.datastrip_dir(&folder).join(file);
        if self.fetch_file(&url, &dest, throughput)?.is_none() {
            warn!(product = %product.name(), url = %url, "Datastrip metadata missing");
        }
        Ok(())
    }

    /// Granule metadata, then bands, masks and the auxiliary file.
    fn fetch_granule(
        &self,
        product: &ProductDescriptor,
        layout: &dyn RemoteLayout,
        safe: &SafeLayout,
        granule: &GranuleRef,
        bands: &[String],
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<()> {
        let granule_dir = safe.granule_dir(&granule.folder);

        let granule_lines = match (
            product.granule_metadata_file_name(&granule.granule_id),
            layout.granule_metadata(product, granule),
        ) {
            (Some(file), Some(url)) => {
                let dest = granule_dir.join(file);
                match self.fetch_metadata(&url, &dest, throughput)? {
                    Some(path) => self
                        .repair
                        .repair(&path, self.config.repair_mode)
                        .map_err(|e| DownloadError::io(&path, e))?,
                    None => {
                        warn!(granule = %granule.granule_id, url = %url, "Granule metadata missing");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let img_dir = safe.granule_img_dir(&granule.folder);
        for band in bands {
            let (Some(file), Some(url)) = (
                product.band_file_name(&granule.granule_id, band),
                layout.band(product, granule, band),
            ) else {
                continue;
            };
            if self.fetch_file(&url, &img_dir.join(file), throughput)?.is_none() {
                warn!(granule = %granule.granule_id, band = %band, "Band missing");
            }
        }

        let qi_dir = safe.granule_qi_dir(&granule.folder);
        for (_, mask) in mask_files(&granule_lines) {
            if !mask_selected(&mask, bands_filter(&self.config, bands)) {
                continue;
            }
            let Some(url) = layout.mask(product, granule, &mask) else {
                continue;
            };
            if self.fetch_file(&url, &qi_dir.join(&mask), throughput)?.is_none() {
                warn!(granule = %granule.granule_id, mask = %mask, "Mask missing");
            }
        }

        if self.config.fetch_aux {
            if let (Some(file), Some(url)) = (
                product.aux_file_name(&granule.granule_id),
                layout.aux(product, granule),
            ) {
                let dest = safe.granule_aux_dir(&granule.folder).join(file);
                if self.fetch_file(&url, &dest, throughput)?.is_none() {
                    warn!(granule = %granule.granule_id, "Auxiliary file missing");
                }
            }
        }

        Ok(())
    }

    /// Products without granules: every file sits in one folder.
    fn fetch_flat(
        &self,
        product: &ProductDescriptor,
        layout: &dyn RemoteLayout,
        log: &mut ProductLog,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<PathBuf> {
        let name = product.name();
        let dir = self.config.target_dir.join(product.product_folder());

        let mut files: Vec<String> = product.metadata_file_name().into_iter().collect();
        if files.is_empty() {
            return Err(DownloadError::InvalidInput(format!("{}: no metadata file name", name)));
        }
        if self.config.fetch_aux {
            files.extend(product.aux_file_name(""));
        }
        files.extend(
            self.selected_bands(product)
                .iter()
                .filter_map(|band| product.band_file_name("", band)),
        );

        fs::create_dir_all(&dir).map_err(|e| DownloadError::io(&dir, e))?;
        let total = files.len();
        for (index, file) in files.iter().enumerate() {
            log.step(Step::File {
                index: index + 1,
                total,
            });
            let url = layout
                .flat_file(product, file)
                .ok_or_else(|| DownloadError::empty(name, format!("not addressable on {}", layout.name())))?;

            if self.fetch_file(&url, &dir.join(file), throughput)?.is_none() {
                if index == 0 {
                    discard(&dir);
                    return Err(DownloadError::empty(name, "product metadata not found"));
                }
                warn!(product = %name, file = %file, "File missing");
            }
        }

        Ok(dir)
    }

    /// Canonical bands to fetch. An empty configuration selects them all.
    fn selected_bands(&self, product: &ProductDescriptor) -> Vec<String> {
        if self.config.bands.is_empty() {
            return product.band_names().iter().map(|b| b.to_string()).collect();
        }
        self.config
            .bands
            .iter()
            .filter_map(|band| {
                let canonical = product.canonical_band(band);
                if canonical.is_none() {
                    warn!(product = %product.name(), band = %band, "Unknown band ignored");
                }
                canonical
            })
            .collect()
    }

    fn file_filter(&self, product: &ProductDescriptor) -> FileFilter {
        FileFilter {
            tiles: self.config.tiles.clone(),
            bands: if self.config.bands.is_empty() {
                Vec::new()
            } else {
                self.selected_bands(product)
            },
        }
    }

    fn fetch_file(
        &self,
        url: &str,
        dest: &Path,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<Option<PathBuf>> {
        let mode = if self.config.mode.is_remote() {
            self.config.mode
        } else {
            DownloadMode::Resume
        };
        Ok(self.transfer.fetch(url, dest, mode, throughput)?)
    }

    /// Metadata is rewritten locally (tile filter, repair), so a local copy
    /// never is a prefix of the remote file. Always fetch it whole.
    fn fetch_metadata(
        &self,
        url: &str,
        dest: &Path,
        throughput: &mut ThroughputTracker,
    ) -> DownloadResult<Option<PathBuf>> {
        Ok(self
            .transfer
            .fetch(url, dest, DownloadMode::Overwrite, throughput)?)
    }
}

/// Mask selection keeps every mask unless bands were asked for explicitly.
fn bands_filter<'a>(config: &DownloadConfig, bands: &'a [String]) -> &'a [String] {
    if config.bands.is_empty() {
        &[]
    } else {
        bands
    }
}

/// Remove a directory left behind by a product that produced nothing.
fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        debug!(dir = %dir.display(), error = %e, "Could not remove partial product");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PlatformType;
    use crate::transfer::{HttpResponse, MockHttpClient, RequestOptions, TransferError, TransferResult};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const MODERN: &str = "S2A_MSIL1C_20170703T092031_N0205_R093_T35TLK_20170703T092030";
    const LEGACY: &str =
        "S2A_OPER_PRD_MSIL1C_PDMC_20160716T140931_R036_V20160716T091532_20160716T091532";
    const LANDSAT: &str = "LC08_L1TP_183029_20170630_20170715_01_T1";
    const DS: &str = "S2A_OPER_MSI_L1C_DS_SGS__20170703T111805_S20170703T092030_N02.05";

    const S2: &str = "http://s2";
    const L8: &str = "http://l8";

    fn product_mtd() -> String {
        let granule = |tile: &str| {
            format!(
                "<Granule datastripIdentifier=\"{}\" granuleIdentifier=\"S2A_OPER_MSI_L1C_TL_SGS__20170703T111805_A010606_T{}_N02.05\" imageFormat=\"JPEG2000\">\n<IMAGE_FILE>x</IMAGE_FILE>\n</Granule>",
                DS, tile
            )
        };
        format!(
            "<Product_Organisation>\n<Granule_List>\n{}\n</Granule_List>\n<Granule_List>\n{}\n</Granule_List>\n</Product_Organisation>",
            granule("35TLK"),
            granule("35TLL")
        )
    }

    const TILE_MTD: &str = "<Pixel_Level_QI>\n<MASK_FILENAME type=\"MSK_CLOUDS\">GRANULE/G/QI_DATA/MSK_CLOUDS_B00.gml</MASK_FILENAME>\n<MASK_FILENAME type=\"MSK_DETFOO\">GRANULE/G/QI_DATA/MSK_DETFOO_B02.gml</MASK_FILENAME>\n</Pixel_Level_QI>";

    fn modern_store() -> MockHttpClient {
        let tile = "http://s2/tiles/35/T/LK/2017/7/3/0";
        MockHttpClient::new()
            .with_file(
                &format!("{}/products/2017/7/3/{}/metadata.xml", S2, MODERN),
                product_mtd(),
            )
            .with_file(
                &format!("{}/products/2017/7/3/{}/datastrip/0/metadata.xml", S2, MODERN),
                "<ds/>",
            )
            .with_file(&format!("{}/metadata.xml", tile), TILE_MTD)
            .with_file(&format!("{}/B02.jp2", tile), "b02")
            .with_file(&format!("{}/qi/MSK_DETFOO_B02.gml", tile), "<mask/>")
            .with_file(&format!("{}/qi/MSK_CLOUDS_B00.gml", tile), "<clouds/>")
            .with_file(&format!("{}/auxiliary/ECMWFT", tile), "aux")
    }

    fn aws_config(target: &Path) -> DownloadConfig {
        DownloadConfig::new(target)
            .with_aws_url(S2)
            .with_landsat_url(L8)
    }

    fn downloader(config: DownloadConfig, client: MockHttpClient) -> (ProductDownloader, Arc<MockHttpClient>) {
        let client = Arc::new(client);
        let downloader = ProductDownloader::new(config, client.clone()).unwrap();
        (downloader, client)
    }

    #[test]
    fn test_tile_filtered_product() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path())
            .with_tiles(["T35TLK"])
            .with_bands(["B02"]);
        let (downloader, _) = downloader(config, modern_store());

        let outcome = downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert!(outcome.is_ok(), "{}", outcome);

        let safe = temp.path().join(format!("{}.SAFE", MODERN));
        assert_eq!(outcome.path.as_deref(), Some(safe.as_path()));
        let mtd = fs::read_to_string(safe.join("MTD_MSIL1C.xml")).unwrap();
        assert!(mtd.contains("T35TLK"));
        assert!(!mtd.contains("T35TLL"));

        let granule = safe.join("GRANULE/L1C_T35TLK_A010606_20170703T092030");
        assert!(granule.join("MTD_TL.xml").is_file());
        assert!(granule.join("IMG_DATA/T35TLK_20170703T092031_B02.jp2").is_file());
        assert!(granule.join("QI_DATA/MSK_DETFOO_B02.gml").is_file());
        assert!(!granule.join("QI_DATA/MSK_CLOUDS_B00.gml").exists());
        assert!(granule.join("AUX_DATA/AUX_ECMWFT").is_file());
        assert!(!safe.join("GRANULE/L1C_T35TLL_A010606_20170703T092030").exists());
        assert!(safe
            .join("DATASTRIP/DS_SGS_20170703T111805_S20170703T092030/MTD_DS.xml")
            .is_file());
    }

    #[test]
    fn test_second_run_keeps_filtered_metadata() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path()).with_tiles(["T35TLK"]);
        assert_eq!(config.mode, DownloadMode::Resume);
        let (downloader, _) = downloader(config, modern_store());
        let product = ProductDescriptor::parse(MODERN).unwrap();
        let mtd = temp.path().join(format!("{}.SAFE/MTD_MSIL1C.xml", MODERN));

        assert!(downloader.download(&product).is_ok());
        let once = fs::read_to_string(&mtd).unwrap();
        assert!(downloader.download(&product).is_ok());
        let twice = fs::read_to_string(&mtd).unwrap();

        assert_eq!(once, twice);
        assert!(!twice.contains("T35TLL"));
    }

    struct FullRepair;

    impl MetadataRepair for FullRepair {
        fn repair(&self, metadata: &Path, _mode: RepairMode) -> std::io::Result<Vec<String>> {
            read_lines(metadata)
        }
    }

    #[test]
    fn test_unsupported_repair_mode() {
        let temp = TempDir::new().unwrap();
        let (plain, _) = downloader(aws_config(temp.path()), MockHttpClient::new());
        assert_eq!(plain.unsupported_repair_mode(), None);

        let config = aws_config(temp.path()).with_repair_mode(RepairMode::Nan);
        let (pass_through, _) = downloader(config.clone(), MockHttpClient::new());
        assert_eq!(pass_through.unsupported_repair_mode(), Some(RepairMode::Nan));

        let (repairing, _) = downloader(config, MockHttpClient::new());
        let repairing = repairing.with_repair(Arc::new(FullRepair));
        assert_eq!(repairing.unsupported_repair_mode(), None);
    }

    #[test]
    fn test_datastrip_fetched_once() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path()).with_bands(["B02"]);
        let (downloader, client) = downloader(config, modern_store());

        downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        let datastrip_requests = client
            .requested_urls()
            .iter()
            .filter(|u| u.ends_with("datastrip/0/metadata.xml"))
            .count();
        assert_eq!(datastrip_requests, 1);
    }

    #[test]
    fn test_no_matching_tiles() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path()).with_tiles(["34TFQ"]);
        let (downloader, client) = downloader(config, modern_store());

        let outcome = downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert_eq!(outcome.code, ReturnCode::EmptyProduct);
        assert_eq!(outcome.step, Step::Metadata);
        assert!(!temp.path().join(format!("{}.SAFE", MODERN)).exists());
        assert!(!client.requested_urls().iter().any(|u| u.contains("/tiles/")));
    }

    #[test]
    fn test_missing_product_is_empty() {
        let temp = TempDir::new().unwrap();
        let (downloader, _) = downloader(aws_config(temp.path()), MockHttpClient::new());

        let outcome = downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert_eq!(outcome.code, ReturnCode::EmptyProduct);
        assert!(!temp.path().join(format!("{}.SAFE", MODERN)).exists());
    }

    #[test]
    fn test_landsat_flat_folder() {
        let temp = TempDir::new().unwrap();
        let base = format!("{}/c1/L8/183/029/{}", L8, LANDSAT);
        let client = MockHttpClient::new()
            .with_file(&format!("{}/{}_MTL.txt", base, LANDSAT), "GROUP = L1_METADATA_FILE")
            .with_file(&format!("{}/{}_ANG.txt", base, LANDSAT), "angles")
            .with_file(&format!("{}/{}_B4.TIF", base, LANDSAT), "b4");
        let config = aws_config(temp.path()).with_bands(["B4"]);
        let (downloader, _) = downloader(config, client);

        let outcome = downloader.download(&ProductDescriptor::parse(LANDSAT).unwrap());
        assert!(outcome.is_ok(), "{}", outcome);
        let dir = temp.path().join(LANDSAT);
        assert!(dir.join(format!("{}_MTL.txt", LANDSAT)).is_file());
        assert!(dir.join(format!("{}_ANG.txt", LANDSAT)).is_file());
        assert!(dir.join(format!("{}_B4.TIF", LANDSAT)).is_file());
    }

    #[test]
    fn test_legacy_archive_from_catalog() {
        let temp = TempDir::new().unwrap();
        let client = MockHttpClient::new()
            .with_file("http://hub/Products('u-1')/$value", "zipdata");
        let config = DownloadConfig::new(temp.path())
            .with_store(ProductStore::SciHub)
            .with_scihub_url("http://hub");
        let (downloader, _) = downloader(config, client);

        let product = ProductDescriptor::parse(LEGACY).unwrap().with_id("u-1");
        let outcome = downloader.download(&product);
        assert!(outcome.is_ok(), "{}", outcome);
        let archive = temp.path().join(format!("{}.zip", LEGACY));
        assert_eq!(outcome.path.as_deref(), Some(archive.as_path()));
        assert_eq!(fs::read_to_string(archive).unwrap(), "zipdata");
    }

    #[test]
    fn test_catalog_id_lookup() {
        let temp = TempDir::new().unwrap();
        let layout = ODataLayout::new("http://hub");
        let client = MockHttpClient::new()
            .with_file(&layout.lookup_url(LEGACY), r#"{"d":{"results":[{"Id":"u-9"}]}}"#)
            .with_file("http://hub/Products('u-9')/$value", "zipdata");
        let config = DownloadConfig::new(temp.path())
            .with_store(ProductStore::SciHub)
            .with_scihub_url("http://hub");
        let (downloader, _) = downloader(config, client);

        let outcome = downloader.download(&ProductDescriptor::parse(LEGACY).unwrap());
        assert!(outcome.is_ok(), "{}", outcome);
    }

    #[test]
    fn test_fallback_when_intended() {
        let temp = TempDir::new().unwrap();
        let alternate_client = Arc::new(modern_store());
        let alternate = ProductDownloader::new(
            aws_config(temp.path()).with_bands(["B02"]),
            alternate_client.clone(),
        )
        .unwrap();
        let primary_config = DownloadConfig::new(temp.path())
            .with_store(ProductStore::SciHub)
            .with_scihub_url("http://hub");
        let (primary, _) = downloader(primary_config, MockHttpClient::new());
        let primary = primary.with_alternate(alternate);

        let outcome = primary.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert!(outcome.is_ok(), "{}", outcome);
        assert_eq!(outcome.backend.as_deref(), Some("aws"));
        assert!(!alternate_client.requested_urls().is_empty());
    }

    #[test]
    fn test_no_fallback_for_other_platform() {
        let temp = TempDir::new().unwrap();
        let alternate_client = Arc::new(modern_store());
        let alternate = ProductDownloader::new(
            aws_config(temp.path()).with_platforms([PlatformType::L8]),
            alternate_client.clone(),
        )
        .unwrap();
        let (primary, _) = downloader(aws_config(temp.path()), MockHttpClient::new());
        let primary = primary.with_alternate(alternate);

        let outcome = primary.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert_eq!(outcome.code, ReturnCode::EmptyProduct);
        assert!(alternate_client.requested_urls().is_empty());
    }

    /// Times out on every request.
    struct StalledClient;

    impl HttpClient for StalledClient {
        fn get(&self, url: &str, _options: &RequestOptions) -> TransferResult<HttpResponse> {
            Err(TransferError::Timeout {
                url: url.to_string(),
                timeout_secs: 30,
            })
        }
    }

    #[test]
    fn test_timeout_is_download_error() {
        let temp = TempDir::new().unwrap();
        let downloader = ProductDownloader::new(aws_config(temp.path()), Arc::new(StalledClient)).unwrap();

        let outcome = downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert_eq!(outcome.code, ReturnCode::DownloadError);
        assert_eq!(outcome.step, Step::Metadata);
    }

    #[test]
    fn test_batch_continues_and_keeps_worst() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path()).with_bands(["B02"]);
        let (downloader, _) = downloader(config, modern_store());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let downloader = downloader.with_progress(ProgressSinks::new().with_batch(Arc::new(
            move |p: &BatchProgress| sink.lock().unwrap().push((p.completed, p.code)),
        )));

        let products = vec![
            ProductDescriptor::parse(LANDSAT).unwrap(),
            ProductDescriptor::parse(MODERN).unwrap(),
        ];
        let report = downloader.download_all(&products);
        assert_eq!(report.len(), 2);
        assert_eq!(report.worst(), ReturnCode::EmptyProduct);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, ReturnCode::EmptyProduct), (2, ReturnCode::Ok)]
        );
    }

    #[test]
    fn test_mismatched_lists_fail_fast() {
        let temp = TempDir::new().unwrap();
        let (downloader, client) = downloader(aws_config(temp.path()), modern_store());
        let err = downloader
            .download_names(&[MODERN.to_string()], &["a".to_string(), "b".to_string()])
            .unwrap_err();
        assert_eq!(err.return_code(), ReturnCode::Fatal);
        assert!(client.requested_urls().is_empty());
    }

    #[test]
    fn test_setup_errors_are_fatal() {
        let temp = TempDir::new().unwrap();
        let local = DownloadConfig::new(temp.path()).with_store(ProductStore::Local);
        assert!(matches!(
            ProductDownloader::new(local, Arc::new(MockHttpClient::new())),
            Err(DownloadError::Fatal(_))
        ));

        let symlink_remote = aws_config(temp.path()).with_mode(DownloadMode::Symlink);
        assert!(matches!(
            ProductDownloader::new(symlink_remote, Arc::new(MockHttpClient::new())),
            Err(DownloadError::Fatal(_))
        ));
    }

    #[test]
    fn test_compress_after_download() {
        let temp = TempDir::new().unwrap();
        let config = aws_config(temp.path())
            .with_tiles(["35TLK"])
            .with_bands(["B02"])
            .with_compression(true, true);
        let (downloader, _) = downloader(config, modern_store());

        let outcome = downloader.download(&ProductDescriptor::parse(MODERN).unwrap());
        assert!(outcome.is_ok(), "{}", outcome);
        let archive = temp.path().join(format!("{}.SAFE.zip", MODERN));
        assert_eq!(outcome.path.as_deref(), Some(archive.as_path()));
        assert!(!temp.path().join(format!("{}.SAFE", MODERN)).exists());
    }
}
