//! Catalog search for SAR snapshots covering iceberg sightings

pub mod aggregate;
pub mod catalog;
pub mod runner;

pub use aggregate::{SearchAggregates, SightingMatch, UrlMatch};
pub use catalog::{AsfCatalog, CatalogSearch, Platform, SearchQuery, Snapshot, ASF_SEARCH_URL};
pub use runner::{progress_bar, SearchConfig, SnapshotSearch};
