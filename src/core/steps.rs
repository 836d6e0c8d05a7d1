use crate::core::band_model::check_required_bands;
use crate::core::operators::{OperatorCall, OrbitType};
use crate::io::wkt::AoiGeometry;
use crate::toolbox::Toolbox;
use crate::types::{Polarization, Product, SarResult};

/// One stage of the preprocessing chain.
///
/// A step only decides which operator call to make for a given product; the
/// toolbox does the work.
pub trait CorrectionStep {
    fn name(&self) -> String;

    /// Operator call this step issues for `product`
    fn call(&self, product: &Product) -> OperatorCall;

    fn apply(&self, toolbox: &dyn Toolbox, product: Product) -> SarResult<Product> {
        let call = self.call(&product);
        check_required_bands(&call, &product)?;
        log::info!("{}: {}", self.name(), product.name);
        log::debug!("{} parameters: {:?}", call.operator, call.parameters);

        let result = toolbox.apply(&call, &product)?;
        if let Some((width, height)) = result.dimensions() {
            log::debug!(
                "{} -> {} x {} [{}]",
                self.name(),
                width,
                height,
                result.band_names().join(", ")
            );
        }
        Ok(result)
    }
}

/// Precise orbit correction
pub struct ApplyOrbitFile {
    pub orbit_type: OrbitType,
    pub poly_degree: u32,
}

impl CorrectionStep for ApplyOrbitFile {
    fn name(&self) -> String {
        "apply orbit file".to_string()
    }

    fn call(&self, product: &Product) -> OperatorCall {
        let orbit_type = self.orbit_type.resolve(product.start_time);
        OperatorCall::apply_orbit_file(orbit_type, self.poly_degree)
    }
}

pub struct ThermalNoiseRemoval;

impl CorrectionStep for ThermalNoiseRemoval {
    fn name(&self) -> String {
        "remove thermal noise".to_string()
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::thermal_noise_removal()
    }
}

pub struct BorderNoiseRemoval {
    pub border_limit: u32,
    pub trim_threshold: f64,
}

impl CorrectionStep for BorderNoiseRemoval {
    fn name(&self) -> String {
        "remove GRD border noise".to_string()
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::remove_grd_border_noise(self.border_limit, self.trim_threshold)
    }
}

/// Geographic subset to the area of interest
pub struct Subset {
    pub aoi: AoiGeometry,
}

impl CorrectionStep for Subset {
    fn name(&self) -> String {
        "subset".to_string()
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::subset(&self.aoi)
    }
}

/// Radiometric calibration to Sigma0 for one polarization
pub struct Calibrate {
    pub polarization: Polarization,
}

impl CorrectionStep for Calibrate {
    fn name(&self) -> String {
        format!("calibrate {}", self.polarization)
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::calibration(self.polarization)
    }
}

pub struct SpeckleFilter {
    pub polarization: Polarization,
    pub filter: String,
}

impl CorrectionStep for SpeckleFilter {
    fn name(&self) -> String {
        format!("speckle filter {}", self.polarization)
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::speckle_filter(self.polarization, &self.filter)
    }
}

pub struct TerrainCorrection {
    pub polarization: Polarization,
    pub dem_name: String,
    pub resampling: String,
}

impl CorrectionStep for TerrainCorrection {
    fn name(&self) -> String {
        format!("terrain correction {}", self.polarization)
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::terrain_correction(self.polarization, &self.dem_name, &self.resampling)
    }
}

/// Linear backscatter to decibels
pub struct LinearToDb;

impl CorrectionStep for LinearToDb {
    fn name(&self) -> String {
        "scale to dB".to_string()
    }

    fn call(&self, _product: &Product) -> OperatorCall {
        OperatorCall::linear_to_db()
    }
}
