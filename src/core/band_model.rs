//! Band transitions of the preprocessing operators.
//!
//! | operator                | bands out                                      |
//! |-------------------------|------------------------------------------------|
//! | Apply-Orbit-File        | unchanged                                      |
//! | ThermalNoiseRemoval     | `Intensity_*` only                             |
//! | Remove-GRD-Border-Noise | unchanged                                      |
//! | Subset                  | unchanged, AOI geometry                        |
//! | Calibration(p)          | `Sigma0_p`                                     |
//! | Speckle-Filter          | unchanged                                      |
//! | Terrain-Correction(p)   | `Sigma0_p`, `projectedLocalIncidenceAngle`     |
//! | linearToFromdB          | every band suffixed `_db`                      |

use crate::core::operators::{Operator, OperatorCall};
use crate::types::{Product, SarError, SarResult};

pub const LOCAL_INCIDENCE_ANGLE_BAND: &str = "projectedLocalIncidenceAngle";

/// Band names produced by applying `call` to a product holding `input`
pub fn expected_bands(call: &OperatorCall, input: &[&str]) -> Vec<String> {
    let owned = || input.iter().map(|b| b.to_string()).collect::<Vec<_>>();
    match call.operator {
        Operator::ApplyOrbitFile
        | Operator::RemoveGrdBorderNoise
        | Operator::Subset
        | Operator::SpeckleFilter => owned(),
        Operator::ThermalNoiseRemoval => input
            .iter()
            .filter(|b| !b.starts_with("Amplitude_"))
            .map(|b| b.to_string())
            .collect(),
        Operator::Calibration => match call.polarization() {
            Some(pol) => vec![format!("Sigma0_{}", pol)],
            None => input
                .iter()
                .filter_map(|b| b.strip_prefix("Intensity_"))
                .map(|pol| format!("Sigma0_{}", pol))
                .collect(),
        },
        Operator::TerrainCorrection => {
            let mut bands: Vec<String> = match call.get("sourceBands") {
                Some(source) => source.split(',').map(|s| s.trim().to_string()).collect(),
                None => owned(),
            };
            bands.push(LOCAL_INCIDENCE_ANGLE_BAND.to_string());
            bands
        }
        Operator::LinearToFromDb => input
            .iter()
            .map(|b| match b.strip_suffix("_db") {
                Some(linear) => linear.to_string(),
                None => format!("{}_db", b),
            })
            .collect(),
    }
}

/// Bands a call reads from its source product
pub fn required_bands(call: &OperatorCall) -> Vec<String> {
    match call.operator {
        Operator::Calibration | Operator::SpeckleFilter | Operator::TerrainCorrection => call
            .get("sourceBands")
            .map(|s| s.split(',').map(|b| b.trim().to_string()).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Fail when `product` lacks a band that `call` needs
pub fn check_required_bands(call: &OperatorCall, product: &Product) -> SarResult<()> {
    for band in required_bands(call) {
        if !product.has_band(&band) {
            return Err(SarError::Processing(format!(
                "{} needs band {} but {} only has [{}]",
                call.operator,
                band,
                product.name,
                product.band_names().join(", ")
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Band, Polarization};

    #[test]
    fn test_thermal_noise_drops_amplitude() {
        let input = ["Amplitude_HH", "Intensity_HH", "Amplitude_HV", "Intensity_HV"];
        let out = expected_bands(&OperatorCall::thermal_noise_removal(), &input);
        assert_eq!(out, vec!["Intensity_HH", "Intensity_HV"]);
    }

    #[test]
    fn test_calibration_selects_one_polarization() {
        let input = ["Intensity_HH", "Intensity_HV"];
        let out = expected_bands(&OperatorCall::calibration(Polarization::HV), &input);
        assert_eq!(out, vec!["Sigma0_HV"]);
    }

    #[test]
    fn test_terrain_correction_and_db() {
        let tc = OperatorCall::terrain_correction(Polarization::HH, "GETASSE30", "BILINEAR_INTERPOLATION");
        let out = expected_bands(&tc, &["Sigma0_HH"]);
        assert_eq!(out, vec!["Sigma0_HH", LOCAL_INCIDENCE_ANGLE_BAND]);

        let refs: Vec<&str> = out.iter().map(String::as_str).collect();
        let db = expected_bands(&OperatorCall::linear_to_db(), &refs);
        assert_eq!(db, vec!["Sigma0_HH_db", "projectedLocalIncidenceAngle_db"]);
    }

    #[test]
    fn test_missing_source_band_is_reported() {
        let product = Product::new("p", "p.dim", vec![Band::new("Intensity_HH", 4, 4)]);
        assert!(check_required_bands(&OperatorCall::calibration(Polarization::HH), &product).is_ok());
        let err = check_required_bands(&OperatorCall::calibration(Polarization::VV), &product);
        assert!(matches!(err, Err(SarError::Processing(_))));
    }
}
