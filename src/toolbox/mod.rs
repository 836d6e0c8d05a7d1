//! Geospatial processing toolbox backends.
//!
//! The pipeline never touches pixels itself. Every read, operator and write
//! goes through a [`Toolbox`]: [`GptToolbox`] drives SNAP's Graph Processing
//! Tool, [`SimulatedToolbox`] applies the band model in memory.

pub mod gpt;
pub mod graph;
pub mod simulated;

pub use gpt::{is_checkpoint, GptConfig, GptToolbox};
pub use graph::Graph;
pub use simulated::SimulatedToolbox;

use crate::core::operators::OperatorCall;
use crate::io::dimap::read_dimap_header;
use crate::io::safe_reader::SafeReader;
use crate::types::{Product, SarError, SarResult};
use std::path::{Path, PathBuf};

pub trait Toolbox {
    /// Open a source product
    fn read(&self, path: &Path) -> SarResult<Product>;

    /// Run one operator on `source` and return the derived product
    fn apply(&self, call: &OperatorCall, source: &Product) -> SarResult<Product>;

    /// Write `product` to `target` (extension added per format); returns the file written
    fn write(&self, product: &Product, target: &Path, format: &str) -> SarResult<PathBuf>;
}

/// File extension the toolbox appends for a writer format
pub fn format_extension(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "geotiff" | "geotiff-bigtiff" => "tif",
        "beam-dimap" => "dim",
        "netcdf4-cf" | "netcdf-cf" => "nc",
        "envi" => "hdr",
        _ => "img",
    }
}

/// `target` with the format's extension appended
pub fn output_file(target: &Path, format: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".");
    name.push(format_extension(format));
    PathBuf::from(name)
}

/// Open a product the way the toolbox would: SAFE zip/dir or BEAM-DIMAP
pub fn read_source_product(path: &Path) -> SarResult<Product> {
    let is_dimap = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("dim"));

    if is_dimap {
        if !path.exists() {
            return Err(SarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }
        return read_dimap_header(path);
    }

    let mut reader = SafeReader::new(path)?;
    reader.read_product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_extension() {
        let path = output_file(Path::new("/out/berg_HH"), "GeoTIFF");
        assert_eq!(path, PathBuf::from("/out/berg_HH.tif"));
        assert_eq!(format_extension("BEAM-DIMAP"), "dim");
    }

    #[test]
    fn test_read_source_product_rejects_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(matches!(read_source_product(&path), Err(SarError::InvalidFormat(_))));
        assert!(read_source_product(&dir.path().join("missing.zip")).is_err());
    }
}
