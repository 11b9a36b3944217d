//! Line-based scanning of product and granule metadata.
//!
//! Product metadata lists one `<Granule>` (modern) or `<Granules>` (legacy)
//! element per granule, with `datastripIdentifier` and `granuleIdentifier`
//! attributes. Tile filtering drops whole elements from the line list so the
//! rewritten file only describes the granules actually downloaded.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::descriptor::granule_tile;

fn granule_open() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<Granules?\s").unwrap())
}

fn granule_close() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</Granules?>|<Granules?\s[^>]*/>").unwrap())
}

fn datastrip_attribute() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"datastripIdentifier="([^"]+)""#).unwrap())
}

fn granule_attribute() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"granuleIdentifier="([^"]+)""#).unwrap())
}

fn mask_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<MASK_FILENAME[^>]*>\s*([^<\s]+)\s*</MASK_FILENAME>").unwrap())
}

/// One granule listed in product metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleRecord {
    pub datastrip_id: String,
    pub granule_id: String,
}

impl GranuleRecord {
    /// Tile of the granule, e.g. `35TLK`.
    pub fn tile(&self) -> Option<String> {
        granule_tile(&self.granule_id)
    }

    /// Whether the granule passes `tiles`. An empty filter keeps everything.
    pub fn matches(&self, tiles: &BTreeSet<String>) -> bool {
        tiles.is_empty() || self.tile().is_some_and(|t| tiles.contains(&t))
    }
}

fn record_from_line(line: &str) -> Option<GranuleRecord> {
    let granule_id = granule_attribute().captures(line)?[1].to_string();
    let datastrip_id = datastrip_attribute()
        .captures(line)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    Some(GranuleRecord {
        datastrip_id,
        granule_id,
    })
}

/// Granule records in document order.
pub fn scan_granules(lines: &[String]) -> Vec<GranuleRecord> {
    lines
        .iter()
        .filter(|line| granule_open().is_match(line))
        .filter_map(|line| record_from_line(line))
        .collect()
}

/// Keep only the granule elements matching `tiles`.
///
/// Returns the rewritten lines and the retained records. Lines outside
/// granule elements are kept unchanged, except `<Granule_List>` wrappers
/// left empty by the pruning.
pub fn filter_granules(lines: &[String], tiles: &BTreeSet<String>) -> (Vec<String>, Vec<GranuleRecord>) {
    let mut kept_lines = Vec::with_capacity(lines.len());
    let mut kept = Vec::new();
    let mut keeping: Option<bool> = None;

    for line in lines {
        if keeping.is_none() && granule_open().is_match(line) {
            let record = record_from_line(line);
            let keep = record.as_ref().is_some_and(|r| r.matches(tiles));
            if keep {
                kept.extend(record);
            }
            keeping = Some(keep);
        }

        match keeping {
            Some(keep) => {
                if keep {
                    kept_lines.push(line.clone());
                }
                if granule_close().is_match(line) {
                    keeping = None;
                }
            }
            None => kept_lines.push(line.clone()),
        }
    }

    (drop_empty_lists(kept_lines), kept)
}

fn drop_empty_lists(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let closes_empty = line.trim() == "</Granule_List>"
            && out.last().is_some_and(|prev| prev.trim() == "<Granule_List>");
        if closes_empty {
            out.pop();
        } else {
            out.push(line);
        }
    }
    out
}

/// Read a file as lines.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::to_string)
        .collect())
}

/// Write lines back, newline-terminated.
pub fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content)
}

/// Quality mask files referenced by granule metadata, as
/// `(path as written, file name)` pairs.
pub fn mask_files(lines: &[String]) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| mask_pattern().captures(line))
        .map(|c| {
            let path = c[1].to_string();
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            (path, name)
        })
        .collect()
}

/// Whether a mask belongs to one of `bands`. An empty allow-list keeps all.
pub fn mask_selected(mask_name: &str, bands: &[String]) -> bool {
    bands.is_empty() || bands.iter().any(|band| mask_name.contains(band.as_str()))
}
