use crate::io::sightings::Sighting;
use crate::io::wkt::AoiGeometry;
use crate::types::{SarError, SarResult};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// ASF search endpoint
pub const ASF_SEARCH_URL: &str = "https://api.daac.asf.alaska.edu/services/search/param";

/// Platform families known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Platform {
    #[default]
    #[value(name = "sentinel-1")]
    Sentinel1,
    #[value(name = "sentinel-1a")]
    Sentinel1A,
    #[value(name = "sentinel-1b")]
    Sentinel1B,
    Alos,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Sentinel1 => write!(f, "SENTINEL-1"),
            Platform::Sentinel1A => write!(f, "SENTINEL-1A"),
            Platform::Sentinel1B => write!(f, "SENTINEL-1B"),
            Platform::Alos => write!(f, "ALOS"),
        }
    }
}

/// Geographic + temporal catalog query over `[start, end)`
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub intersects_with: String,
    pub platform: Platform,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_results: Option<usize>,
}

impl SearchQuery {
    /// Point query starting at midnight of the sighting date and lasting `window`
    pub fn for_sighting(sighting: &Sighting, window: Duration, platform: Platform) -> SarResult<Self> {
        let (lon, lat) = sighting.position()?;
        let midnight = sighting.sighting_date()?.and_time(NaiveTime::default());
        let start = Utc.from_utc_datetime(&midnight);

        Ok(Self {
            intersects_with: AoiGeometry::point(lon, lat).to_wkt(),
            platform,
            start,
            end: start + window,
            max_results: None,
        })
    }

    /// Request parameters in the form the search API expects
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("platform", self.platform.to_string()),
            ("intersectsWith", self.intersects_with.clone()),
            ("start", self.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("end", self.end.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            ("output", "geojson".to_string()),
        ];
        if let Some(max) = self.max_results {
            params.push(("maxResults", max.to_string()));
        }
        params
    }
}

/// One catalog match as a GeoJSON feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub feature: Map<String, Value>,
}

impl Snapshot {
    fn properties(&self) -> Option<&Map<String, Value>> {
        self.feature.get("properties").and_then(Value::as_object)
    }

    /// Download URL (`properties.url`)
    pub fn url(&self) -> SarResult<&str> {
        self.properties()
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SarError::Search(format!(
                    "Snapshot {} has no download url",
                    self.scene_name().unwrap_or("<unnamed>")
                ))
            })
    }

    pub fn scene_name(&self) -> Option<&str> {
        self.properties()
            .and_then(|p| p.get("sceneName").or_else(|| p.get("fileID")))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Snapshot>,
}

/// Parse a GeoJSON FeatureCollection response body
pub fn parse_feature_collection(body: &str) -> SarResult<Vec<Snapshot>> {
    let collection: FeatureCollection = serde_json::from_str(body)?;
    Ok(collection.features)
}

/// Satellite catalog search capability
pub trait CatalogSearch {
    fn geo_search(&self, query: &SearchQuery) -> SarResult<Vec<Snapshot>>;
}

/// Alaska Satellite Facility search API client
pub struct AsfCatalog {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl AsfCatalog {
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> SarResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("icesar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SarError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl CatalogSearch for AsfCatalog {
    fn geo_search(&self, query: &SearchQuery) -> SarResult<Vec<Snapshot>> {
        log::debug!(
            "Searching {} for {} between {} and {}",
            query.platform,
            query.intersects_with,
            query.start,
            query.end
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&query.to_params())
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let excerpt: String = body.chars().take(300).collect();
            return Err(SarError::Search(format!(
                "Search request failed with status {}: {}",
                status, excerpt
            )));
        }

        let snapshots = parse_feature_collection(&body)?;
        log::debug!("{} snapshots found", snapshots.len());
        Ok(snapshots)
    }
}
