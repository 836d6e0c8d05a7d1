use crate::core::operators::OrbitType;
use crate::core::steps::{
    ApplyOrbitFile, BorderNoiseRemoval, Calibrate, CorrectionStep, LinearToDb, SpeckleFilter,
    Subset, TerrainCorrection, ThermalNoiseRemoval,
};
use crate::io::wkt::AoiGeometry;
use crate::toolbox::Toolbox;
use crate::types::{ErrorPolicy, Polarization, Product, SarError, SarResult};
use std::path::{Path, PathBuf};

/// Processing constants for the GRD preprocessing chain
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub orbit_type: OrbitType,
    /// Polynomial degree for orbit state vector fitting
    pub poly_degree: u32,
    /// Border limit in pixels for GRD border noise removal
    pub border_limit: u32,
    pub trim_threshold: f64,
    pub speckle_filter: String,
    pub dem_name: String,
    pub resampling: String,
    /// Writer format for the final rasters
    pub output_format: String,
    pub error_policy: ErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orbit_type: OrbitType::Precise,
            poly_degree: 3,
            border_limit: 500,
            trim_threshold: 0.5,
            speckle_filter: "Refined Lee".to_string(),
            dem_name: "GETASSE30".to_string(),
            resampling: "BILINEAR_INTERPOLATION".to_string(),
            output_format: "GeoTIFF".to_string(),
            error_policy: ErrorPolicy::FailFast,
        }
    }
}

/// One product to process
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub product_path: PathBuf,
    pub aoi: AoiGeometry,
    pub out_path: PathBuf,
    pub out_name: String,
    /// Explicit polarizations; detected from the subset when `None`
    pub polarizations: Option<Vec<Polarization>>,
}

/// A raster written for one polarization
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizationOutput {
    pub polarization: Polarization,
    pub path: PathBuf,
    pub bands: Vec<String>,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub product: String,
    pub polarizations: Vec<Polarization>,
    pub outputs: Vec<PolarizationOutput>,
    /// Polarizations skipped under [`ErrorPolicy::Skip`], with the error
    pub failures: Vec<(Polarization, String)>,
}

/// Polarizations whose `Intensity_*` band is present, in `HH, HV, VV, VH` order
pub fn detect_polarizations(product: &Product) -> Vec<Polarization> {
    Polarization::ALL
        .into_iter()
        .filter(|pol| product.has_band(&format!("Intensity_{}", pol)))
        .collect()
}

/// Output location `{out_path}/{out_name}_{pol}`, before the format extension
pub fn output_target(out_path: &Path, out_name: &str, pol: Polarization) -> PathBuf {
    out_path.join(format!("{}_{}", out_name, pol))
}

/// Sentinel-1 GRD preprocessing: orbit, noise removal, subset, then a
/// calibrate / speckle / terrain-correct / dB chain per polarization.
pub struct ProductPipeline<'a> {
    toolbox: &'a dyn Toolbox,
    config: PipelineConfig,
}

impl<'a> ProductPipeline<'a> {
    pub fn new(toolbox: &'a dyn Toolbox, config: PipelineConfig) -> Self {
        Self { toolbox, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Steps shared by every polarization, in order
    pub fn preprocessing_steps(&self, aoi: &AoiGeometry) -> Vec<Box<dyn CorrectionStep>> {
        vec![
            Box::new(ApplyOrbitFile {
                orbit_type: self.config.orbit_type,
                poly_degree: self.config.poly_degree,
            }),
            Box::new(ThermalNoiseRemoval),
            Box::new(BorderNoiseRemoval {
                border_limit: self.config.border_limit,
                trim_threshold: self.config.trim_threshold,
            }),
            Box::new(Subset { aoi: aoi.clone() }),
        ]
    }

    /// Steps applied to one polarization branch, in order
    pub fn polarization_steps(&self, polarization: Polarization) -> Vec<Box<dyn CorrectionStep>> {
        vec![
            Box::new(Calibrate { polarization }),
            Box::new(SpeckleFilter {
                polarization,
                filter: self.config.speckle_filter.clone(),
            }),
            Box::new(TerrainCorrection {
                polarization,
                dem_name: self.config.dem_name.clone(),
                resampling: self.config.resampling.clone(),
            }),
            Box::new(LinearToDb),
        ]
    }

    fn run_steps(&self, steps: &[Box<dyn CorrectionStep>], product: Product) -> SarResult<Product> {
        steps
            .iter()
            .try_fold(product, |product, step| step.apply(self.toolbox, product))
    }

    /// Read the product and bring it to the AOI subset
    pub fn preprocess(&self, request: &PipelineRequest) -> SarResult<Product> {
        let product = self.toolbox.read(&request.product_path)?;
        log::info!(
            "Read {} with bands [{}]",
            product.name,
            product.band_names().join(", ")
        );
        self.run_steps(&self.preprocessing_steps(&request.aoi), product)
    }

    /// Run one polarization branch from the subset product and write it
    pub fn process_polarization(
        &self,
        subset: &Product,
        polarization: Polarization,
        request: &PipelineRequest,
    ) -> SarResult<PolarizationOutput> {
        log::info!("Processing polarization {}", polarization);
        let product = self.run_steps(&self.polarization_steps(polarization), subset.clone())?;

        let target = output_target(&request.out_path, &request.out_name, polarization);
        let path = self
            .toolbox
            .write(&product, &target, &self.config.output_format)?;
        let (width, height) = product.dimensions().unwrap_or((0, 0));
        log::info!("Wrote {} ({} x {})", path.display(), width, height);

        Ok(PolarizationOutput {
            polarization,
            path,
            bands: product.bands.iter().map(|b| b.name.clone()).collect(),
            width,
            height,
        })
    }

    pub fn run(&self, request: &PipelineRequest) -> SarResult<PipelineReport> {
        std::fs::create_dir_all(&request.out_path)?;

        let subset = self.preprocess(request)?;
        let polarizations = match &request.polarizations {
            Some(pols) => pols.clone(),
            None => {
                let detected = detect_polarizations(&subset);
                log::info!(
                    "Detected polarizations: {}",
                    detected
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                detected
            }
        };
        if polarizations.is_empty() {
            return Err(SarError::Processing(format!(
                "No intensity bands in {}",
                subset.name
            )));
        }

        let mut report = PipelineReport {
            product: subset.name.clone(),
            polarizations: polarizations.clone(),
            ..PipelineReport::default()
        };
        for polarization in polarizations {
            match self.process_polarization(&subset, polarization, request) {
                Ok(output) => report.outputs.push(output),
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::FailFast => return Err(e),
                    ErrorPolicy::Skip => {
                        log::error!("Skipping polarization {}: {}", polarization, e);
                        report.failures.push((polarization, e.to_string()));
                    }
                },
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Band;

    #[test]
    fn test_detect_polarizations_in_canonical_order() {
        let product = Product::new(
            "p",
            "p.dim",
            vec![
                Band::new("Intensity_VH", 1, 1),
                Band::new("Intensity_HH", 1, 1),
                Band::new("Amplitude_VV", 1, 1),
            ],
        );
        assert_eq!(
            detect_polarizations(&product),
            vec![Polarization::HH, Polarization::VH]
        );
    }

    #[test]
    fn test_output_target() {
        let target = output_target(Path::new("/data/out"), "berg_0612", Polarization::HV);
        assert_eq!(target, PathBuf::from("/data/out/berg_0612_HV"));
    }

    #[test]
    fn test_default_config_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.border_limit, 500);
        assert_eq!(config.trim_threshold, 0.5);
        assert_eq!(config.poly_degree, 3);
        assert_eq!(config.speckle_filter, "Refined Lee");
        assert_eq!(config.output_format, "GeoTIFF");
    }
}
