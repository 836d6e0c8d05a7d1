use crate::io::sightings::Sighting;
use crate::search::aggregate::SearchAggregates;
use crate::search::catalog::{CatalogSearch, Platform, SearchQuery};
use crate::types::{ErrorPolicy, SarResult};
use chrono::Duration;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub platform: Platform,
    /// Search window length, starting at midnight of the sighting date
    pub window: Duration,
    pub max_results: Option<usize>,
    pub error_policy: ErrorPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Sentinel1,
            window: Duration::days(1),
            max_results: None,
            error_policy: ErrorPolicy::FailFast,
        }
    }
}

/// Progress bar sized for `len` sightings
pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len} [{elapsed_precise}<{eta_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// One sequential pass of catalog searches over a sighting table
pub struct SnapshotSearch<'a> {
    catalog: &'a dyn CatalogSearch,
    config: SearchConfig,
}

impl<'a> SnapshotSearch<'a> {
    pub fn new(catalog: &'a dyn CatalogSearch, config: SearchConfig) -> Self {
        Self { catalog, config }
    }

    /// Search and record one sighting
    pub fn search_sighting(
        &self,
        sighting: &Sighting,
        aggregates: &mut SearchAggregates,
    ) -> SarResult<usize> {
        let mut query = SearchQuery::for_sighting(sighting, self.config.window, self.config.platform)?;
        query.max_results = self.config.max_results;

        let snapshots = self.catalog.geo_search(&query)?;
        aggregates.record(sighting, &snapshots)?;
        Ok(snapshots.len())
    }

    /// Search every sighting in file order
    pub fn run(&self, sightings: &[Sighting], progress: &ProgressBar) -> SarResult<SearchAggregates> {
        let mut aggregates = SearchAggregates::new();

        for sighting in sightings {
            match self.search_sighting(sighting, &mut aggregates) {
                Ok(found) => {
                    log::debug!("Sighting {}: {} snapshots", sighting.index, found);
                }
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::FailFast => {
                        progress.abandon_with_message(aggregates.summary());
                        return Err(e);
                    }
                    ErrorPolicy::Skip => {
                        log::error!("Skipping sighting {}: {}", sighting.index, e);
                        aggregates.record_failure(sighting, e.to_string());
                    }
                },
            }
            progress.set_message(aggregates.summary());
            progress.inc(1);
        }

        progress.finish_with_message(aggregates.summary());
        log::info!(
            "Searched {} sightings: {} snapshots, {} sightings with matches, {} failed",
            aggregates.processed,
            aggregates.total_snapshots,
            aggregates.unique_sightings,
            aggregates.failures.len()
        );
        Ok(aggregates)
    }
}
