//! icesar: Sentinel-1 preprocessing and snapshot search for iceberg tracking
//!
//! Two sequential tools share this library. `process-product` runs a GRD
//! product through SNAP's orbit, noise, subset, calibration, speckle, terrain
//! correction and dB operators and writes one GeoTIFF per polarization.
//! `search-snapshots` queries the ASF catalog for every International Ice
//! Patrol sighting of a season and collects the matching scenes.

pub mod types;
pub mod io;
pub mod core;
pub mod toolbox;
pub mod search;

// Re-export main types and functions for easier access
pub use types::{Band, BoundingBox, ErrorPolicy, Polarization, Product, SarError, SarResult};
pub use io::{AoiGeometry, SafeReader, Sighting};
pub use crate::core::{PipelineConfig, PipelineRequest, ProductPipeline};
pub use toolbox::{GptToolbox, SimulatedToolbox, Toolbox};
