//! SNAP processing graphs.
//!
//! A graph chains `Read`, any number of operator calls and `Write` so that
//! `gpt` computes pixels once, at write time, without materializing the
//! products in between.

use crate::core::operators::OperatorCall;
use crate::types::{SarError, SarResult};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename = "graph")]
pub struct Graph {
    #[serde(rename = "@id")]
    id: String,
    version: String,
    #[serde(rename = "node")]
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
struct Node {
    #[serde(rename = "@id")]
    id: String,
    operator: String,
    sources: Sources,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Sources {
    #[serde(rename = "sourceProduct", skip_serializing_if = "Option::is_none")]
    source_product: Option<SourceRef>,
}

#[derive(Debug, Serialize)]
struct SourceRef {
    #[serde(rename = "@refid")]
    refid: String,
}

/// Operator parameters as child elements, in call order
#[derive(Debug)]
struct Parameters(Vec<(String, String)>);

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Graph {
    /// `Read(source) -> calls... -> Write(target, format)`
    pub fn chain(source: &Path, calls: &[OperatorCall], target: &Path, format: &str) -> Self {
        let mut nodes = vec![Node {
            id: "Read".to_string(),
            operator: "Read".to_string(),
            sources: Sources {
                source_product: None,
            },
            parameters: Parameters(vec![("file".to_string(), source.display().to_string())]),
        }];

        for call in calls {
            let name = call.operator.toolbox_name();
            let id = if nodes.iter().any(|n| n.id == name) {
                format!("{}({})", name, nodes.len())
            } else {
                name.to_string()
            };
            let previous = nodes[nodes.len() - 1].id.clone();
            nodes.push(Node {
                id,
                operator: name.to_string(),
                sources: Sources {
                    source_product: Some(SourceRef { refid: previous }),
                },
                parameters: Parameters(call.parameters.clone()),
            });
        }

        let previous = nodes[nodes.len() - 1].id.clone();
        nodes.push(Node {
            id: "Write".to_string(),
            operator: "Write".to_string(),
            sources: Sources {
                source_product: Some(SourceRef { refid: previous }),
            },
            parameters: Parameters(vec![
                ("file".to_string(), target.display().to_string()),
                ("formatName".to_string(), format.to_string()),
            ]),
        });

        Self {
            id: "icesar".to_string(),
            version: "1.0".to_string(),
            nodes,
        }
    }

    /// Operators in execution order, `Read` and `Write` included
    pub fn operators(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.operator.as_str()).collect()
    }

    pub fn to_xml(&self) -> SarResult<String> {
        quick_xml::se::to_string(self)
            .map_err(|e| SarError::XmlParsing(format!("Failed to serialize graph: {}", e)))
    }

    /// Serialize the graph to `path`
    pub fn write_to(&self, path: &Path) -> SarResult<()> {
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operators::{OperatorCall, OrbitType};
    use crate::io::wkt::AoiGeometry;
    use crate::types::Polarization;

    #[test]
    fn test_preprocessing_chain_xml() {
        let aoi = AoiGeometry::parse("POLYGON ((-58.8 54.9, -58.7 54.9, -58.7 55.0, -58.8 54.9))").unwrap();
        let calls = vec![
            OperatorCall::apply_orbit_file(OrbitType::Precise, 3),
            OperatorCall::thermal_noise_removal(),
            OperatorCall::remove_grd_border_noise(500, 0.5),
            OperatorCall::subset(&aoi),
        ];
        let graph = Graph::chain(Path::new("/data/S1B.zip"), &calls, Path::new("/work/01_S1B_Sub.dim"), "BEAM-DIMAP");
        assert_eq!(
            graph.operators(),
            vec!["Read", "Apply-Orbit-File", "ThermalNoiseRemoval", "Remove-GRD-Border-Noise", "Subset", "Write"]
        );

        let xml = graph.to_xml().unwrap();
        assert!(xml.starts_with("<graph id=\"icesar\"><version>1.0</version>"));
        assert!(xml.contains("<node id=\"Read\"><operator>Read</operator>"));
        assert!(xml.contains("<parameters><file>/data/S1B.zip</file></parameters>"));
        assert!(xml.contains("<sourceProduct refid=\"Remove-GRD-Border-Noise\"/>"));
        assert!(xml.contains("<borderLimit>500</borderLimit><trimThreshold>0.5</trimThreshold>"));
        assert!(xml.contains("<geoRegion>POLYGON ((-58.8 54.9, -58.7 54.9, -58.7 55, -58.8 54.9))</geoRegion>"));
        assert!(xml.contains("<file>/work/01_S1B_Sub.dim</file><formatName>BEAM-DIMAP</formatName>"));
        assert!(xml.ends_with("</graph>"));
    }

    #[test]
    fn test_parameter_text_is_escaped() {
        let call = OperatorCall::speckle_filter(Polarization::HH, "Lee <7x7 & co");
        let graph = Graph::chain(Path::new("in.dim"), &[call], Path::new("out.tif"), "GeoTIFF");
        let xml = graph.to_xml().unwrap();
        assert!(xml.contains("<filter>Lee &lt;7x7 &amp; co</filter>"));
    }

    #[test]
    fn test_empty_chain_is_read_then_write() {
        let graph = Graph::chain(Path::new("in.dim"), &[], Path::new("out.tif"), "GeoTIFF");
        assert_eq!(graph.operators(), vec!["Read", "Write"]);
        assert!(graph.to_xml().unwrap().contains("<sourceProduct refid=\"Read\"/>"));
    }
}
