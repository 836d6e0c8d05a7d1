use icesar::toolbox::read_source_product;
use icesar::{Polarization, SafeReader, SarError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;

const PRODUCT_ID: &str = "S1B_IW_GRDH_1SDH_20210614T100344_20210614T100409_027351_03443D_13A1";

fn annotation(samples: usize, lines: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<product>
  <adsHeader><missionId>S1B</missionId><productType>GRD</productType></adsHeader>
  <imageAnnotation>
    <imageInformation>
      <productFirstLineUtcTime>2021-06-14T10:03:44.000000</productFirstLineUtcTime>
      <numberOfSamples>{}</numberOfSamples>
      <numberOfLines>{}</numberOfLines>
    </imageInformation>
  </imageAnnotation>
</product>"#,
        samples, lines
    )
}

/// Relative paths and contents of a dual-polarization GRD product
fn safe_entries() -> Vec<(String, String)> {
    let root = format!("{}.SAFE", PRODUCT_ID);
    let mut entries = vec![(format!("{}/manifest.safe", root), "<xfdu/>".to_string())];
    for pol in ["hh", "hv"] {
        let stem = format!("s1b-iw-grd-{}-20210614t100344-20210614t100409-027351-03443d-00{}", pol, if pol == "hh" { 1 } else { 2 });
        entries.push((format!("{}/measurement/{}.tiff", root, stem), "II*".to_string()));
        entries.push((format!("{}/annotation/{}.xml", root, stem), annotation(25969, 16659)));
        entries.push((
            format!("{}/annotation/calibration/calibration-{}.xml", root, stem),
            "<calibration/>".to_string(),
        ));
    }
    entries
}

fn write_safe_zip(dir: &Path) -> PathBuf {
    let path = dir.join(format!("{}.zip", PRODUCT_ID));
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in safe_entries() {
        zip.start_file(name, FileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn write_safe_dir(dir: &Path) -> PathBuf {
    for (name, content) in safe_entries() {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir.join(format!("{}.SAFE", PRODUCT_ID))
}

#[test]
fn test_read_zipped_product() {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_safe_zip(temp_dir.path());

    let mut reader = SafeReader::new(&path).expect("open zip");
    assert_eq!(reader.product_id(), PRODUCT_ID);

    let measurements = reader.find_measurement_files().unwrap();
    assert_eq!(
        measurements.keys().copied().collect::<Vec<_>>(),
        vec![Polarization::HH, Polarization::HV]
    );
    let annotations = reader.find_annotation_files().unwrap();
    assert!(annotations.values().all(|f| !f.contains("/calibration/")));
    assert_eq!(reader.image_dimensions(Polarization::HV).unwrap(), (25969, 16659));

    let product = read_source_product(&path).unwrap();
    assert_eq!(product.name, PRODUCT_ID);
    assert_eq!(
        product.band_names(),
        vec!["Amplitude_HH", "Intensity_HH", "Amplitude_HV", "Intensity_HV"]
    );
    assert_eq!(product.dimensions(), Some((25969, 16659)));
    assert_eq!(
        product.start_time.unwrap().format("%Y-%m-%dT%H:%M:%S").to_string(),
        "2021-06-14T10:03:44"
    );
    assert!(product.lineage.is_empty());
}

#[test]
fn test_read_unpacked_product() {
    let temp_dir = TempDir::new().unwrap();
    let safe_dir = write_safe_dir(temp_dir.path());

    let from_dir = read_source_product(&safe_dir).unwrap();
    let from_manifest = read_source_product(&safe_dir.join("manifest.safe")).unwrap();
    assert_eq!(from_dir.name, PRODUCT_ID);
    assert_eq!(from_manifest.name, PRODUCT_ID);
    assert_eq!(from_dir.bands, from_manifest.bands);
}

#[test]
fn test_product_without_measurements() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.zip");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file("EMPTY.SAFE/manifest.safe", FileOptions::default()).unwrap();
    zip.write_all(b"<xfdu/>").unwrap();
    zip.finish().unwrap();

    let err = read_source_product(&path).unwrap_err();
    assert!(matches!(err, SarError::InvalidFormat(_)));
}

#[test]
fn test_directory_without_manifest() {
    let temp_dir = TempDir::new().unwrap();
    assert!(matches!(
        SafeReader::new(temp_dir.path()),
        Err(SarError::InvalidFormat(_))
    ));
}
