use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::operators::OperatorCall;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarization {
    HH,
    HV,
    VV,
    VH,
}

impl Polarization {
    /// All polarizations in detection order
    pub const ALL: [Polarization; 4] = [
        Polarization::HH,
        Polarization::HV,
        Polarization::VV,
        Polarization::VH,
    ];

    /// Lower-case token used in SAFE file names (`-hh-`)
    pub fn file_token(&self) -> &'static str {
        match self {
            Polarization::HH => "hh",
            Polarization::HV => "hv",
            Polarization::VV => "vv",
            Polarization::VH => "vh",
        }
    }

    /// Parse a user supplied list such as `HH,HV`, `HH HV` or `['HH', 'HV']`
    pub fn parse_list(input: &str) -> SarResult<Vec<Polarization>> {
        let mut pols = Vec::new();
        for token in input
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .map(|t| t.trim_matches(|c: char| matches!(c, '[' | ']' | '\'' | '"')))
            .filter(|t| !t.is_empty())
        {
            let pol: Polarization = token.parse()?;
            if !pols.contains(&pol) {
                pols.push(pol);
            }
        }

        if pols.is_empty() {
            return Err(SarError::InvalidFormat(format!(
                "No polarization found in '{}'",
                input
            )));
        }
        Ok(pols)
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::HH => write!(f, "HH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HH" => Ok(Polarization::HH),
            "HV" => Ok(Polarization::HV),
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            _ => Err(SarError::InvalidFormat(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// A named raster band and its geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub width: usize,
    pub height: usize,
}

impl Band {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// Handle to a product known to the processing toolbox.
///
/// The band collection reflects the last operator applied; `location` is where
/// the toolbox can find the product on disk and `lineage` lists the operator
/// calls that derived it from the source product. The trailing `pending`
/// calls of the lineage are recorded but not yet computed at `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub location: PathBuf,
    pub bands: Vec<Band>,
    /// Acquisition start, when the reader could determine it
    pub start_time: Option<DateTime<Utc>>,
    pub lineage: Vec<OperatorCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<OperatorCall>,
}

impl Product {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>, bands: Vec<Band>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            bands,
            start_time: None,
            lineage: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|b| b.name == name)
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// Raster dimensions (width, height) of the first band
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.bands.first().map(|b| (b.width, b.height))
    }

    /// Derive a new product from this one, extending the lineage with `call`
    pub fn derive(&self, call: OperatorCall, location: PathBuf, bands: Vec<Band>) -> Product {
        let mut lineage = self.lineage.clone();
        let name = format!("{}_{}", self.name, call.operator.suffix());
        lineage.push(call);
        Product {
            name,
            location,
            bands,
            start_time: self.start_time,
            lineage,
            pending: Vec::new(),
        }
    }

    /// Record `call` without computing it; the result stays at this location
    pub fn defer(&self, call: OperatorCall, bands: Vec<Band>) -> Product {
        let mut derived = self.derive(call.clone(), self.location.clone(), bands);
        derived.pending = self.pending.clone();
        derived.pending.push(call);
        derived
    }

    pub fn is_materialized(&self) -> bool {
        self.pending.is_empty()
    }
}

/// What to do when a single unit of work (a polarization, a sighting) fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Abort the whole run on the first failure
    #[default]
    FailFast,
    /// Log the failure, record it in the report and continue
    Skip,
}

/// Error types for SAR processing and search
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Toolbox operator {operator} failed: {message}")]
    Toolbox { operator: String, message: String },

    #[error("Catalog search error: {0}")]
    Search(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polarization_list() {
        let pols = Polarization::parse_list("HH,HV").unwrap();
        assert_eq!(pols, vec![Polarization::HH, Polarization::HV]);

        let pols = Polarization::parse_list("['vv', 'vh']").unwrap();
        assert_eq!(pols, vec![Polarization::VV, Polarization::VH]);

        let pols = Polarization::parse_list("HH HH HV").unwrap();
        assert_eq!(pols, vec![Polarization::HH, Polarization::HV]);
    }

    #[test]
    fn test_parse_polarization_list_rejects_garbage() {
        assert!(Polarization::parse_list("").is_err());
        assert!(Polarization::parse_list("HH,XX").is_err());
    }

    #[test]
    fn test_product_band_queries() {
        let product = Product::new(
            "S1B_TEST",
            "/tmp/S1B_TEST.zip",
            vec![Band::new("Intensity_HH", 10, 20), Band::new("Intensity_HV", 10, 20)],
        );
        assert!(product.has_band("Intensity_HH"));
        assert!(!product.has_band("Sigma0_HH"));
        assert_eq!(product.dimensions(), Some((10, 20)));
        assert_eq!(product.band_names(), vec!["Intensity_HH", "Intensity_HV"]);
    }

    #[test]
    fn test_deferred_calls_stay_at_source_location() {
        let source = Product::new("S1B", "/work/S1B_Sub.dim", vec![Band::new("Intensity_HH", 4, 4)]);
        let cal = OperatorCall::calibration(Polarization::HH);
        let deferred = source.defer(cal.clone(), vec![Band::new("Sigma0_HH", 4, 4)]);
        let deferred = deferred.defer(OperatorCall::linear_to_db(), vec![Band::new("Sigma0_HH_db", 4, 4)]);

        assert_eq!(deferred.name, "S1B_Cal_dB");
        assert_eq!(deferred.location, source.location);
        assert_eq!(deferred.pending.len(), 2);
        assert_eq!(deferred.lineage, deferred.pending);
        assert!(!deferred.is_materialized());

        let computed = deferred.derive(cal, PathBuf::from("/work/S1B_Cal_dB.dim"), Vec::new());
        assert!(computed.is_materialized());
        assert_eq!(computed.lineage.len(), 3);
    }
}
