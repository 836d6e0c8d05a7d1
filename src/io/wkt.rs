//! Area-of-interest geometry parsed from Well-Known Text.
//!
//! Only the shapes needed to describe an AOI or a sighting position are
//! supported: `POINT`, `POLYGON` and `MULTIPOLYGON`, in lon/lat order.

use crate::types::{BoundingBox, SarError, SarResult};
use std::iter::Peekable;
use std::str::Chars;

/// Closed ring of (lon, lat) vertices
pub type Ring = Vec<(f64, f64)>;

#[derive(Debug, Clone, PartialEq)]
pub enum AoiGeometry {
    Point { lon: f64, lat: f64 },
    /// Exterior ring followed by holes
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Parenthesized coordinate tree produced by the tokenizer
#[derive(Debug)]
enum Nested {
    Coord(Vec<f64>),
    List(Vec<Nested>),
}

impl AoiGeometry {
    /// Parse a WKT string
    pub fn parse(wkt: &str) -> SarResult<Self> {
        let mut chars = wkt.trim().chars().peekable();
        let keyword = read_keyword(&mut chars);
        if keyword.is_empty() {
            return Err(SarError::Geometry(format!("Missing geometry type in '{}'", wkt)));
        }

        skip_whitespace(&mut chars);
        if chars.peek() != Some(&'(') {
            let rest: String = chars.collect();
            return Err(SarError::Geometry(format!(
                "Unsupported or empty {} geometry: '{}'",
                keyword,
                rest.trim()
            )));
        }

        let tree = parse_list(&mut chars)?;
        skip_whitespace(&mut chars);
        if let Some(c) = chars.next() {
            return Err(SarError::Geometry(format!("Unexpected '{}' after geometry", c)));
        }

        let geometry = match keyword.as_str() {
            "POINT" => {
                let (lon, lat) = single_coord(&tree)?;
                AoiGeometry::Point { lon, lat }
            }
            "POLYGON" => AoiGeometry::Polygon(polygon_rings(tree)?),
            "MULTIPOLYGON" => {
                let polygons = as_list(tree, "MULTIPOLYGON")?
                    .into_iter()
                    .map(polygon_rings)
                    .collect::<SarResult<Vec<_>>>()?;
                AoiGeometry::MultiPolygon(polygons)
            }
            other => {
                return Err(SarError::Geometry(format!("Unsupported geometry type: {}", other)))
            }
        };

        geometry.validate()?;
        log::debug!("Parsed {} AOI with bounds {:?}", keyword, geometry.bounding_box());
        Ok(geometry)
    }

    /// Point geometry for a sighting position
    pub fn point(lon: f64, lat: f64) -> Self {
        AoiGeometry::Point { lon, lat }
    }

    fn validate(&self) -> SarResult<()> {
        for &(lon, lat) in self.vertices().iter() {
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                return Err(SarError::Geometry(format!(
                    "Coordinate ({}, {}) is outside lon/lat range",
                    lon, lat
                )));
            }
        }

        let rings: Vec<&Ring> = match self {
            AoiGeometry::Point { .. } => Vec::new(),
            AoiGeometry::Polygon(rings) => rings.iter().collect(),
            AoiGeometry::MultiPolygon(polys) => polys.iter().flatten().collect(),
        };
        for ring in rings {
            if ring.len() < 4 {
                return Err(SarError::Geometry(format!(
                    "Polygon ring needs at least 4 vertices, got {}",
                    ring.len()
                )));
            }
            if ring.first() != ring.last() {
                return Err(SarError::Geometry("Polygon ring is not closed".to_string()));
            }
        }
        Ok(())
    }

    fn vertices(&self) -> Vec<(f64, f64)> {
        match self {
            AoiGeometry::Point { lon, lat } => vec![(*lon, *lat)],
            AoiGeometry::Polygon(rings) => rings.iter().flatten().copied().collect(),
            AoiGeometry::MultiPolygon(polys) => {
                polys.iter().flatten().flatten().copied().collect()
            }
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for (lon, lat) in self.vertices() {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        bbox
    }

    /// Normalized WKT rendering
    pub fn to_wkt(&self) -> String {
        fn ring_text(ring: &Ring) -> String {
            let coords: Vec<String> = ring
                .iter()
                .map(|(lon, lat)| format!("{} {}", lon, lat))
                .collect();
            format!("({})", coords.join(", "))
        }
        fn polygon_text(rings: &[Ring]) -> String {
            let rings: Vec<String> = rings.iter().map(ring_text).collect();
            format!("({})", rings.join(", "))
        }

        match self {
            AoiGeometry::Point { lon, lat } => format!("POINT({} {})", lon, lat),
            AoiGeometry::Polygon(rings) => format!("POLYGON {}", polygon_text(rings)),
            AoiGeometry::MultiPolygon(polys) => {
                let polys: Vec<String> = polys.iter().map(|p| polygon_text(p)).collect();
                format!("MULTIPOLYGON ({})", polys.join(", "))
            }
        }
    }
}

impl std::fmt::Display for AoiGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wkt())
    }
}

impl std::str::FromStr for AoiGeometry {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AoiGeometry::parse(s)
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().map_or(false, |c| c.is_whitespace()) {
        chars.next();
    }
}

fn read_keyword(chars: &mut Peekable<Chars<'_>>) -> String {
    skip_whitespace(chars);
    let mut keyword = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() {
            keyword.push(c.to_ascii_uppercase());
            chars.next();
        } else {
            break;
        }
    }
    keyword
}

fn parse_list(chars: &mut Peekable<Chars<'_>>) -> SarResult<Nested> {
    skip_whitespace(chars);
    match chars.next() {
        Some('(') => {}
        other => {
            return Err(SarError::Geometry(format!("Expected '(' but found {:?}", other)))
        }
    }

    let mut items = Vec::new();
    loop {
        skip_whitespace(chars);
        let item = if chars.peek() == Some(&'(') {
            parse_list(chars)?
        } else {
            parse_coord(chars)?
        };
        items.push(item);

        skip_whitespace(chars);
        match chars.next() {
            Some(',') => continue,
            Some(')') => break,
            other => {
                return Err(SarError::Geometry(format!(
                    "Expected ',' or ')' but found {:?}",
                    other
                )))
            }
        }
    }
    Ok(Nested::List(items))
}

fn parse_coord(chars: &mut Peekable<Chars<'_>>) -> SarResult<Nested> {
    let mut values = Vec::new();
    loop {
        skip_whitespace(chars);
        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                token.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if token.is_empty() {
            break;
        }
        let value: f64 = token
            .parse()
            .map_err(|_| SarError::Geometry(format!("Invalid coordinate value '{}'", token)))?;
        values.push(value);
    }

    // Z/M ordinates are accepted and ignored
    if values.len() < 2 || values.len() > 4 {
        return Err(SarError::Geometry(format!(
            "Coordinate needs 2 to 4 ordinates, got {}",
            values.len()
        )));
    }
    Ok(Nested::Coord(values))
}

fn as_list(node: Nested, context: &str) -> SarResult<Vec<Nested>> {
    match node {
        Nested::List(items) => Ok(items),
        Nested::Coord(_) => Err(SarError::Geometry(format!(
            "Expected nested list in {}",
            context
        ))),
    }
}

fn as_coord(node: &Nested) -> SarResult<(f64, f64)> {
    match node {
        Nested::Coord(values) => Ok((values[0], values[1])),
        Nested::List(_) => Err(SarError::Geometry("Expected coordinate".to_string())),
    }
}

fn single_coord(tree: &Nested) -> SarResult<(f64, f64)> {
    match tree {
        Nested::List(items) if items.len() == 1 => as_coord(&items[0]),
        _ => Err(SarError::Geometry("POINT takes exactly one coordinate".to_string())),
    }
}

fn polygon_rings(node: Nested) -> SarResult<Vec<Ring>> {
    let rings = as_list(node, "POLYGON")?
        .into_iter()
        .map(|ring| {
            as_list(ring, "POLYGON ring")?
                .iter()
                .map(as_coord)
                .collect::<SarResult<Ring>>()
        })
        .collect::<SarResult<Vec<Ring>>>()?;

    if rings.is_empty() {
        return Err(SarError::Geometry("Polygon has no rings".to_string()));
    }
    Ok(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FIXTURE_AOI: &str = "POLYGON ((-58.75306600000002 55.02842699999997, -58.75306600000002 54.978426999999975, -58.803066000000015 54.978426999999975, -58.803066000000015 55.02842699999997, -58.75306600000002 55.02842699999997))";

    #[test]
    fn test_parse_polygon_bounds() {
        let aoi = AoiGeometry::parse(FIXTURE_AOI).unwrap();
        let bbox = aoi.bounding_box();
        assert_relative_eq!(bbox.min_lon, -58.803066000000015);
        assert_relative_eq!(bbox.max_lon, -58.75306600000002);
        assert_relative_eq!(bbox.min_lat, 54.978426999999975);
        assert_relative_eq!(bbox.max_lat, 55.02842699999997);
    }

    #[test]
    fn test_polygon_round_trips_through_normalized_text() {
        let aoi = AoiGeometry::parse(FIXTURE_AOI).unwrap();
        let reparsed = AoiGeometry::parse(&aoi.to_wkt()).unwrap();
        assert_eq!(aoi, reparsed);
    }

    #[test]
    fn test_parse_point_case_insensitive() {
        let point = AoiGeometry::parse("point(-50.5 47.25)").unwrap();
        assert_eq!(point, AoiGeometry::point(-50.5, 47.25));
        assert_eq!(point.to_wkt(), "POINT(-50.5 47.25)");
    }

    #[test]
    fn test_parse_multipolygon() {
        let wkt = "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((10 10, 11 10, 11 11, 10 10)))";
        match AoiGeometry::parse(wkt).unwrap() {
            AoiGeometry::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_geometries() {
        assert!(AoiGeometry::parse("").is_err());
        assert!(AoiGeometry::parse("POLYGON EMPTY").is_err());
        assert!(AoiGeometry::parse("LINESTRING (0 0, 1 1)").is_err());
        // not closed
        assert!(AoiGeometry::parse("POLYGON ((0 0, 1 0, 1 1, 0 1))").is_err());
        // too few vertices
        assert!(AoiGeometry::parse("POLYGON ((0 0, 1 0, 0 0))").is_err());
        assert!(AoiGeometry::parse("POINT (200 10)").is_err());
        assert!(AoiGeometry::parse("POINT (1 2) trailing").is_err());
    }
}
