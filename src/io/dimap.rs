use crate::types::{Band, Product, SarError, SarResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// BEAM-DIMAP header (`.dim`), reduced to band layout and scene timing
#[derive(Debug, Deserialize)]
struct DimapDocument {
    #[serde(rename = "Dataset_Id", default)]
    dataset_id: Option<DatasetId>,
    #[serde(rename = "Production", default)]
    production: Option<Production>,
    #[serde(rename = "Raster_Dimensions")]
    raster_dimensions: RasterDimensions,
    #[serde(rename = "Image_Interpretation", default)]
    image_interpretation: Option<ImageInterpretation>,
}

#[derive(Debug, Deserialize)]
struct DatasetId {
    #[serde(rename = "DATASET_NAME", default)]
    dataset_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Production {
    #[serde(rename = "PRODUCT_SCENE_RASTER_START_TIME", default)]
    start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RasterDimensions {
    #[serde(rename = "NCOLS")]
    ncols: usize,
    #[serde(rename = "NROWS")]
    nrows: usize,
}

#[derive(Debug, Deserialize)]
struct ImageInterpretation {
    #[serde(rename = "Spectral_Band_Info", default)]
    bands: Vec<SpectralBandInfo>,
}

#[derive(Debug, Deserialize)]
struct SpectralBandInfo {
    #[serde(rename = "BAND_NAME")]
    band_name: String,
    #[serde(rename = "BAND_RASTER_WIDTH", default)]
    width: Option<usize>,
    #[serde(rename = "BAND_RASTER_HEIGHT", default)]
    height: Option<usize>,
}

/// Read a BEAM-DIMAP header into a product handle located at `path`
pub fn read_dimap_header<P: AsRef<Path>>(path: P) -> SarResult<Product> {
    let path = path.as_ref();
    log::debug!("Reading DIMAP header: {}", path.display());

    let content = fs::read_to_string(path)?;
    let mut product = parse_dimap_header(&content)?;
    if product.name.is_empty() {
        product.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    product.location = path.to_path_buf();
    Ok(product)
}

/// Parse DIMAP header content; the returned product has an empty location
pub fn parse_dimap_header(content: &str) -> SarResult<Product> {
    let document: DimapDocument = from_str(content)
        .map_err(|e| SarError::XmlParsing(format!("Invalid DIMAP header: {}", e)))?;

    let (ncols, nrows) = (
        document.raster_dimensions.ncols,
        document.raster_dimensions.nrows,
    );
    let bands = document
        .image_interpretation
        .map(|i| i.bands)
        .unwrap_or_default()
        .into_iter()
        .map(|b| Band::new(b.band_name, b.width.unwrap_or(ncols), b.height.unwrap_or(nrows)))
        .collect();

    let name = document
        .dataset_id
        .and_then(|d| d.dataset_name)
        .unwrap_or_default();
    let mut product = Product::new(name, "", bands);

    if let Some(start) = document.production.and_then(|p| p.start_time) {
        match parse_dimap_time(&start) {
            Some(time) => product = product.with_start_time(time),
            None => log::warn!("Could not parse DIMAP start time '{}'", start),
        }
    }
    Ok(product)
}

/// DIMAP times look like `14-JUN-2021 10:03:44.123456`
fn parse_dimap_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%d-%b-%Y %H:%M:%S%.f")
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}
