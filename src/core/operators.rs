use crate::io::wkt::AoiGeometry;
use crate::types::Polarization;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Toolbox operators used by the preprocessing chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    ApplyOrbitFile,
    ThermalNoiseRemoval,
    RemoveGrdBorderNoise,
    Subset,
    Calibration,
    SpeckleFilter,
    TerrainCorrection,
    LinearToFromDb,
}

impl Operator {
    /// Operator name as registered in the toolbox
    pub fn toolbox_name(&self) -> &'static str {
        match self {
            Operator::ApplyOrbitFile => "Apply-Orbit-File",
            Operator::ThermalNoiseRemoval => "ThermalNoiseRemoval",
            Operator::RemoveGrdBorderNoise => "Remove-GRD-Border-Noise",
            Operator::Subset => "Subset",
            Operator::Calibration => "Calibration",
            Operator::SpeckleFilter => "Speckle-Filter",
            Operator::TerrainCorrection => "Terrain-Correction",
            Operator::LinearToFromDb => "linearToFromdB",
        }
    }

    /// Suffix appended to derived product names
    pub fn suffix(&self) -> &'static str {
        match self {
            Operator::ApplyOrbitFile => "Orb",
            Operator::ThermalNoiseRemoval => "NR",
            Operator::RemoveGrdBorderNoise => "Bnr",
            Operator::Subset => "Sub",
            Operator::Calibration => "Cal",
            Operator::SpeckleFilter => "Spk",
            Operator::TerrainCorrection => "TC",
            Operator::LinearToFromDb => "dB",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.toolbox_name())
    }
}

/// Orbit file types understood by Apply-Orbit-File
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OrbitType {
    /// Precise Orbit Ephemerides (best accuracy, ~20 days delay)
    #[default]
    Precise,
    /// Restituted Orbit Ephemerides (lower accuracy, ~3 hours delay)
    Restituted,
    /// Pick by product age
    Auto,
}

impl OrbitType {
    /// Resolve `Auto` against the acquisition time of the product
    pub fn resolve(self, acquisition_time: Option<DateTime<Utc>>) -> OrbitType {
        match self {
            OrbitType::Auto => match acquisition_time {
                Some(time) => Self::determine_orbit_type(time),
                None => {
                    log::warn!("Acquisition time unknown, assuming precise orbits are available");
                    OrbitType::Precise
                }
            },
            other => other,
        }
    }

    /// Determine which orbit type to use based on product age
    pub fn determine_orbit_type(acquisition_time: DateTime<Utc>) -> OrbitType {
        let age_days = (Utc::now() - acquisition_time).num_days();

        if age_days > 20 {
            OrbitType::Precise
        } else {
            OrbitType::Restituted
        }
    }

    fn parameter_value(self) -> &'static str {
        match self {
            OrbitType::Precise | OrbitType::Auto => "Sentinel Precise (Auto Download)",
            OrbitType::Restituted => "Sentinel Restituted (Auto Download)",
        }
    }
}

/// One operator invocation: the operator and its ordered parameter map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorCall {
    pub operator: Operator,
    pub parameters: Vec<(String, String)>,
}

impl OperatorCall {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            parameters: Vec::new(),
        }
    }

    /// Builder-style parameter insertion; a repeated key replaces the old value
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.parameters.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.parameters.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Polarization targeted by a per-polarization call, if any
    pub fn polarization(&self) -> Option<Polarization> {
        self.get("selectedPolarisations")
            .or_else(|| self.get("sourceBands").and_then(|b| b.rsplit('_').next()))
            .and_then(|p| p.parse().ok())
    }

    pub fn apply_orbit_file(orbit_type: OrbitType, poly_degree: u32) -> Self {
        Self::new(Operator::ApplyOrbitFile)
            .param("orbitType", orbit_type.parameter_value())
            .param("polyDegree", poly_degree)
            .param("continueOnFail", false)
    }

    pub fn thermal_noise_removal() -> Self {
        Self::new(Operator::ThermalNoiseRemoval).param("removeThermalNoise", true)
    }

    pub fn remove_grd_border_noise(border_limit: u32, trim_threshold: f64) -> Self {
        Self::new(Operator::RemoveGrdBorderNoise)
            .param("borderLimit", border_limit)
            .param("trimThreshold", trim_threshold)
    }

    pub fn subset(aoi: &AoiGeometry) -> Self {
        Self::new(Operator::Subset)
            .param("copyMetadata", true)
            .param("geoRegion", aoi.to_wkt())
    }

    pub fn calibration(pol: Polarization) -> Self {
        Self::new(Operator::Calibration)
            .param("outputSigmaBand", true)
            .param("sourceBands", format!("Intensity_{}", pol))
            .param("selectedPolarisations", pol)
    }

    pub fn speckle_filter(pol: Polarization, filter: &str) -> Self {
        Self::new(Operator::SpeckleFilter)
            .param("sourceBands", format!("Sigma0_{}", pol))
            .param("filter", filter)
    }

    pub fn terrain_correction(pol: Polarization, dem_name: &str, resampling: &str) -> Self {
        Self::new(Operator::TerrainCorrection)
            .param("demName", dem_name)
            .param("imgResamplingMethod", resampling)
            .param("sourceBands", format!("Sigma0_{}", pol))
            .param("saveProjectedLocalIncidenceAngle", true)
            .param("saveSelectedSourceBand", true)
    }

    pub fn linear_to_db() -> Self {
        Self::new(Operator::LinearToFromDb)
    }
}
