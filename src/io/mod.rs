//! I/O modules for reading SAR products, AOIs and sighting tables

pub mod safe_reader;
pub mod dimap;
pub mod wkt;
pub mod sightings;

pub use safe_reader::SafeReader;
pub use wkt::AoiGeometry;
pub use sightings::Sighting;
