use crate::io::sightings::Sighting;
use crate::search::catalog::Snapshot;
use crate::types::SarResult;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Entry of the URL-indexed mapping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlMatch {
    pub id: String,
    pub snapshot_info: Snapshot,
    pub iceberg_info: Map<String, Value>,
}

/// Entry of the sighting-indexed mapping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SightingMatch {
    pub snapshot_info: Snapshot,
    pub iceberg_info: Map<String, Value>,
}

/// Everything a search run collects.
///
/// Both mappings keep keys in the order they were first recorded.
#[derive(Debug, Clone, Default)]
pub struct SearchAggregates {
    /// Download URL -> sightings it covers
    pub download_urls: IndexMap<String, Vec<UrlMatch>>,
    /// Sighting identifier -> snapshots covering it
    pub search_results: IndexMap<String, Vec<SightingMatch>>,
    /// Snapshot matches over all sightings
    pub total_snapshots: usize,
    /// Sightings with at least one match
    pub unique_sightings: usize,
    /// Sightings searched, with or without matches
    pub processed: usize,
    /// Sightings skipped after an error, by CSV index
    pub failures: Vec<(usize, String)>,
}

impl SearchAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the matches for one sighting
    pub fn record(&mut self, sighting: &Sighting, snapshots: &[Snapshot]) -> SarResult<()> {
        if snapshots.is_empty() {
            self.processed += 1;
            return Ok(());
        }

        let id = sighting.identifier()?;
        // resolve every url first so a bad snapshot leaves the maps untouched
        let urls = snapshots
            .iter()
            .map(|s| s.url().map(str::to_string))
            .collect::<SarResult<Vec<_>>>()?;

        for (snapshot, url) in snapshots.iter().zip(urls) {
            self.download_urls.entry(url).or_default().push(UrlMatch {
                id: id.clone(),
                snapshot_info: snapshot.clone(),
                iceberg_info: sighting.info.clone(),
            });
            self.search_results
                .entry(id.clone())
                .or_default()
                .push(SightingMatch {
                    snapshot_info: snapshot.clone(),
                    iceberg_info: sighting.info.clone(),
                });
        }

        self.processed += 1;
        self.total_snapshots += snapshots.len();
        self.unique_sightings += 1;
        Ok(())
    }

    pub fn record_failure(&mut self, sighting: &Sighting, message: String) {
        self.processed += 1;
        self.failures.push((sighting.index, message));
    }

    /// Progress line: `Total: {:5} | Unique: {:4}`
    pub fn summary(&self) -> String {
        format!(
            "Total: {:5} | Unique: {:4}",
            self.total_snapshots, self.unique_sightings
        )
    }

    /// Write `iip-urls-{year}.json` and `iip-search-result-{year}.json` into `out_dir`
    pub fn write_json(&self, out_dir: &Path, year: i32) -> SarResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(out_dir)?;
        let urls_path = out_dir.join(format!("iip-urls-{}.json", year));
        let results_path = out_dir.join(format!("iip-search-result-{}.json", year));

        write_document(&urls_path, &self.download_urls)?;
        write_document(&results_path, &self.search_results)?;

        log::info!(
            "Wrote {} download urls to {} and {} sightings to {}",
            self.download_urls.len(),
            urls_path.display(),
            self.search_results.len(),
            results_path.display()
        );
        Ok((urls_path, results_path))
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> SarResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
