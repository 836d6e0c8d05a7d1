//! International Ice Patrol (IIP) iceberg sighting tables.

use crate::types::{SarError, SarResult};
use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default directory holding the yearly IIP CSV files
pub const IIP_DATASET_DIR: &str = "IIP-dataset";

/// Seasons published in the IIP dataset
pub const PUBLISHED_SEASONS: [i32; 3] = [2019, 2020, 2021];

/// Column added to every row with its zero-based position in the CSV
pub const CSV_INDEX_COLUMN: &str = "ICEBERG_CSV_IDX";

const DATE_COLUMN: &str = "SIGHTING_DATE";
const LONGITUDE_COLUMN: &str = "SIGHTING_LONGITUDE";
const LATITUDE_COLUMN: &str = "SIGHTING_LATITUDE";
const YEAR_COLUMN: &str = "ICEBERG_YEAR";
const NUMBER_COLUMN: &str = "ICEBERG_NUMBER";

/// Path of the season file for `year` inside `dataset_dir`
pub fn iip_filepath(dataset_dir: &Path, year: i32) -> PathBuf {
    dataset_dir.join(format!("IIP_{}IcebergSeason.csv", year))
}

/// One iceberg sighting row, all columns kept in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub index: usize,
    pub info: Map<String, Value>,
}

impl Sighting {
    fn field(&self, column: &str) -> SarResult<&Value> {
        match self.info.get(column) {
            Some(Value::Null) | None => Err(SarError::Metadata(format!(
                "Sighting {} has no {}",
                self.index, column
            ))),
            Some(value) => Ok(value),
        }
    }

    fn number(&self, column: &str) -> SarResult<f64> {
        match self.field(column)? {
            Value::Number(n) => n.as_f64().ok_or_else(|| {
                SarError::Metadata(format!("{} is not a finite number", column))
            }),
            Value::String(s) => s.trim().parse().map_err(|_| {
                SarError::Metadata(format!("Sighting {}: invalid {} '{}'", self.index, column, s))
            }),
            other => Err(SarError::Metadata(format!(
                "Sighting {}: unexpected {} value {}",
                self.index, column, other
            ))),
        }
    }

    /// Sighting date from `SIGHTING_DATE` (`MM/DD/YYYY`)
    pub fn sighting_date(&self) -> SarResult<NaiveDate> {
        let raw = match self.field(DATE_COLUMN)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y").map_err(|e| {
            SarError::Metadata(format!(
                "Sighting {}: invalid {} '{}': {}",
                self.index, DATE_COLUMN, raw, e
            ))
        })
    }

    /// Sighting position as (lon, lat)
    pub fn position(&self) -> SarResult<(f64, f64)> {
        Ok((self.number(LONGITUDE_COLUMN)?, self.number(LATITUDE_COLUMN)?))
    }

    /// Composite identifier `{ICEBERG_YEAR}_{ICEBERG_CSV_IDX}_{ICEBERG_NUMBER}`
    pub fn identifier(&self) -> SarResult<String> {
        Ok(format!(
            "{}_{}_{}",
            id_component(self.field(YEAR_COLUMN)?),
            self.index,
            id_component(self.field(NUMBER_COLUMN)?)
        ))
    }
}

fn id_component(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Interpret a CSV cell: integer, float, or text; empty and NaN cells become null
fn typed_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Number::from_f64(f).map_or(Value::Null, Value::Number);
    }
    Value::String(raw.to_string())
}

/// Read sightings from CSV content with a header row
pub fn read_sightings<R: Read>(reader: R) -> SarResult<Vec<Sighting>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    for required in [DATE_COLUMN, LONGITUDE_COLUMN, LATITUDE_COLUMN] {
        if !headers.iter().any(|h| h == required) {
            return Err(SarError::InvalidFormat(format!(
                "Sighting table has no {} column",
                required
            )));
        }
    }

    let mut sightings = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let mut info = Map::new();
        for (header, raw) in headers.iter().zip(record.iter()) {
            info.insert(header.to_string(), typed_value(raw));
        }
        info.insert(CSV_INDEX_COLUMN.to_string(), Value::from(index));
        sightings.push(Sighting { index, info });
    }

    Ok(sightings)
}

/// Read the IIP season file for `year`
pub fn read_season(dataset_dir: &Path, year: i32) -> SarResult<Vec<Sighting>> {
    if !PUBLISHED_SEASONS.contains(&year) {
        log::warn!("{} is not a published IIP season, trying anyway", year);
    }
    let path = iip_filepath(dataset_dir, year);
    log::info!("Reading iceberg sightings: {}", path.display());

    let file = File::open(&path).map_err(|e| {
        SarError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    let sightings = read_sightings(file)?;
    log::info!("Loaded {} sightings for {}", sightings.len(), year);
    Ok(sightings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ICEBERG_YEAR,ICEBERG_NUMBER,SIGHTING_DATE,SIGHTING_TIME,SIGHTING_LATITUDE,SIGHTING_LONGITUDE,SIZE
2021,6,06/14/2021,1003,55.003427,-58.778066,LG
2021,17,06/15/2021,1420,47.1,-50.25,
";

    #[test]
    fn test_read_sightings_keeps_columns_and_index() {
        let sightings = read_sightings(SAMPLE.as_bytes()).unwrap();
        assert_eq!(sightings.len(), 2);

        let first = &sightings[0];
        let columns: Vec<&String> = first.info.keys().collect();
        assert_eq!(columns.first().map(|s| s.as_str()), Some("ICEBERG_YEAR"));
        assert_eq!(columns.last().map(|s| s.as_str()), Some(CSV_INDEX_COLUMN));
        assert_eq!(first.info["SIZE"], Value::String("LG".to_string()));
        assert_eq!(sightings[1].info["SIZE"], Value::Null);
        assert_eq!(sightings[1].info[CSV_INDEX_COLUMN], Value::from(1));
    }

    #[test]
    fn test_sighting_accessors() {
        let sightings = read_sightings(SAMPLE.as_bytes()).unwrap();
        let first = &sightings[0];
        assert_eq!(first.sighting_date().unwrap(), NaiveDate::from_ymd_opt(2021, 6, 14).unwrap());
        assert_eq!(first.position().unwrap(), (-58.778066, 55.003427));
        assert_eq!(first.identifier().unwrap(), "2021_0_6");
        assert_eq!(sightings[1].identifier().unwrap(), "2021_1_17");
    }

    #[test]
    fn test_float_id_components_render_as_integers() {
        assert_eq!(id_component(&Value::from(2019.0)), "2019");
        assert_eq!(id_component(&Value::from(12)), "12");
        assert_eq!(id_component(&Value::String("A12".into())), "A12");
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "ICEBERG_NUMBER,SIGHTING_DATE\n1,06/14/2021\n";
        assert!(read_sightings(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_bad_date_is_metadata_error() {
        let csv = "ICEBERG_YEAR,ICEBERG_NUMBER,SIGHTING_DATE,SIGHTING_LATITUDE,SIGHTING_LONGITUDE\n2021,1,2021-06-14,1,2\n";
        let sightings = read_sightings(csv.as_bytes()).unwrap();
        assert!(matches!(sightings[0].sighting_date(), Err(SarError::Metadata(_))));
    }

    #[test]
    fn test_season_path() {
        let path = iip_filepath(Path::new(IIP_DATASET_DIR), 2019);
        assert_eq!(path, Path::new("IIP-dataset/IIP_2019IcebergSeason.csv"));
    }
}
