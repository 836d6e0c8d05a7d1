use crate::types::{Band, Polarization, Product, SarError, SarResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Subset of the Sentinel-1 annotation needed to size the image
#[derive(Debug, Deserialize)]
struct AnnotationProduct {
    #[serde(rename = "imageAnnotation")]
    image_annotation: ImageAnnotation,
}

#[derive(Debug, Deserialize)]
struct ImageAnnotation {
    #[serde(rename = "imageInformation")]
    image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
struct ImageInformation {
    #[serde(rename = "numberOfSamples")]
    number_of_samples: usize,
    #[serde(rename = "numberOfLines")]
    number_of_lines: usize,
}

enum SafeSource {
    Zip(ZipArchive<File>),
    Directory(PathBuf),
}

/// Sentinel-1 SAFE product reader (zipped or unpacked)
pub struct SafeReader {
    path: PathBuf,
    source: SafeSource,
}

impl SafeReader {
    /// Open a SAFE `.zip`, a `.SAFE` directory or its `manifest.safe`
    pub fn new<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(SarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let source = if path.is_dir() {
            if !path.join("manifest.safe").exists() {
                return Err(SarError::InvalidFormat(format!(
                    "{} has no manifest.safe",
                    path.display()
                )));
            }
            SafeSource::Directory(path.clone())
        } else if path.file_name().map_or(false, |n| n == "manifest.safe") {
            let dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            SafeSource::Directory(dir)
        } else if Self::has_extension(&path, "zip") {
            let file = File::open(&path)?;
            let archive = ZipArchive::new(file)
                .map_err(|e| SarError::InvalidFormat(format!("Failed to open ZIP: {}", e)))?;
            SafeSource::Zip(archive)
        } else {
            return Err(SarError::InvalidFormat(format!(
                "Not a Sentinel-1 SAFE product: {}",
                path.display()
            )));
        };

        Ok(Self { path, source })
    }

    fn has_extension(path: &Path, ext: &str) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(ext))
    }

    /// List all files in the product, `/`-separated
    pub fn list_files(&mut self) -> SarResult<Vec<String>> {
        match &mut self.source {
            SafeSource::Zip(archive) => {
                let mut files = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    let file = archive.by_index(i)?;
                    files.push(file.name().to_string());
                }
                Ok(files)
            }
            SafeSource::Directory(root) => {
                let mut files = Vec::new();
                Self::walk_directory(root, root, &mut files)?;
                files.sort();
                Ok(files)
            }
        }
    }

    fn walk_directory(root: &Path, dir: &Path, files: &mut Vec<String>) -> SarResult<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::walk_directory(root, &path, files)?;
            } else if let Ok(relative) = path.strip_prefix(root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
            }
        }
        Ok(())
    }

    /// Read a file from the product as text
    pub fn read_file(&mut self, name: &str) -> SarResult<String> {
        let mut content = String::new();
        match &mut self.source {
            SafeSource::Zip(archive) => {
                let mut file = archive.by_name(name)?;
                file.read_to_string(&mut content)?;
            }
            SafeSource::Directory(root) => {
                content = fs::read_to_string(root.join(name))?;
            }
        }
        Ok(content)
    }

    fn find_files_by_polarization(
        files: &[String],
        directory: &str,
        extensions: &[&str],
    ) -> BTreeMap<Polarization, String> {
        let mut found = BTreeMap::new();
        for file in files {
            let mut segments = file.rsplit('/');
            let file_name = segments.next().unwrap_or("");
            if segments.next() != Some(directory) {
                continue;
            }
            let lower = file_name.to_lowercase();
            if !extensions.iter().any(|ext| lower.ends_with(ext)) {
                continue;
            }
            for pol in Polarization::ALL {
                if lower.contains(&format!("-{}-", pol.file_token())) {
                    found.entry(pol).or_insert_with(|| file.clone());
                }
            }
        }
        found
    }

    /// Find measurement rasters for each polarization
    pub fn find_measurement_files(&mut self) -> SarResult<BTreeMap<Polarization, String>> {
        let files = self.list_files()?;
        let measurements =
            Self::find_files_by_polarization(&files, "measurement", &[".tiff", ".tif"]);

        if measurements.is_empty() {
            return Err(SarError::InvalidFormat(
                "No measurement files found".to_string(),
            ));
        }
        Ok(measurements)
    }

    /// Find annotation files for each polarization
    pub fn find_annotation_files(&mut self) -> SarResult<BTreeMap<Polarization, String>> {
        let files = self.list_files()?;
        let annotations = Self::find_files_by_polarization(&files, "annotation", &[".xml"]);

        if annotations.is_empty() {
            return Err(SarError::InvalidFormat(
                "No annotation files found".to_string(),
            ));
        }
        Ok(annotations)
    }

    /// Image (width, height) of one polarization, from its annotation
    pub fn image_dimensions(&mut self, pol: Polarization) -> SarResult<(usize, usize)> {
        let annotations = self.find_annotation_files()?;
        let annotation_file = annotations
            .get(&pol)
            .ok_or_else(|| {
                SarError::InvalidFormat(format!("No annotation found for polarization {}", pol))
            })?
            .clone();

        let xml_content = self.read_file(&annotation_file)?;
        Self::parse_image_dimensions(&xml_content)
    }

    fn parse_image_dimensions(xml_content: &str) -> SarResult<(usize, usize)> {
        let annotation: AnnotationProduct = from_str(xml_content)
            .map_err(|e| SarError::XmlParsing(format!("Failed to parse annotation: {}", e)))?;
        let info = annotation.image_annotation.image_information;
        Ok((info.number_of_samples, info.number_of_lines))
    }

    /// Product identifier derived from the file or directory name
    pub fn product_id(&self) -> String {
        let base = if self.path.file_name().map_or(false, |n| n == "manifest.safe") {
            self.path.parent().unwrap_or(&self.path)
        } else {
            self.path.as_path()
        };
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.trim_end_matches(".zip")
            .trim_end_matches(".SAFE")
            .to_string()
    }

    /// Acquisition start time encoded in the product name
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        Self::parse_start_time(&self.product_id())
    }

    fn parse_start_time(product_id: &str) -> Option<DateTime<Utc>> {
        let pattern = regex::Regex::new(r"_(\d{8}T\d{6})_\d{8}T\d{6}_").ok()?;
        let captures = pattern.captures(product_id)?;
        NaiveDateTime::parse_from_str(captures.get(1)?.as_str(), "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
    }

    /// Build the toolbox view of the product: amplitude and intensity per polarization
    pub fn read_product(&mut self) -> SarResult<Product> {
        let product_id = self.product_id();
        log::info!("Reading SAFE product: {}", product_id);

        let measurements = self.find_measurement_files()?;
        let mut bands = Vec::new();
        for pol in Polarization::ALL {
            if !measurements.contains_key(&pol) {
                continue;
            }
            let (width, height) = self.image_dimensions(pol)?;
            log::debug!("{}: {} x {} pixels", pol, width, height);
            bands.push(Band::new(format!("Amplitude_{}", pol), width, height));
            bands.push(Band::new(format!("Intensity_{}", pol), width, height));
        }

        let mut product = Product::new(product_id, self.path.clone(), bands);
        if let Some(start_time) = self.start_time() {
            product = product.with_start_time(start_time);
        }
        Ok(product)
    }
}
