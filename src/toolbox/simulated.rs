use crate::core::band_model::{check_required_bands, expected_bands};
use crate::core::operators::{Operator, OperatorCall};
use crate::toolbox::{output_file, Toolbox};
use crate::types::{Band, Polarization, Product, SarError, SarResult};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// In-memory toolbox following the band model.
///
/// Raster sizes are fixed up front: the scene size on read, `subset_size`
/// after Subset and `terrain_size` after Terrain-Correction. Writes produce a
/// JSON description of the product, so identical inputs give identical files.
pub struct SimulatedToolbox {
    polarizations: Vec<Polarization>,
    scene_size: (usize, usize),
    subset_size: (usize, usize),
    terrain_size: (usize, usize),
    fail_on: Option<(Operator, Option<Polarization>)>,
    calls: RefCell<Vec<OperatorCall>>,
}

impl SimulatedToolbox {
    pub fn new(polarizations: &[Polarization], scene_size: (usize, usize)) -> Self {
        Self {
            polarizations: polarizations.to_vec(),
            scene_size,
            subset_size: scene_size,
            terrain_size: scene_size,
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_subset_size(mut self, width: usize, height: usize) -> Self {
        self.subset_size = (width, height);
        self
    }

    pub fn with_terrain_size(mut self, width: usize, height: usize) -> Self {
        self.terrain_size = (width, height);
        self
    }

    /// Make `operator` fail, for every polarization or just `pol`
    pub fn failing_on(mut self, operator: Operator, pol: Option<Polarization>) -> Self {
        self.fail_on = Some((operator, pol));
        self
    }

    /// Operator calls applied so far, in order
    pub fn calls(&self) -> Vec<OperatorCall> {
        self.calls.borrow().clone()
    }

    fn should_fail(&self, call: &OperatorCall) -> bool {
        match self.fail_on {
            Some((operator, None)) => operator == call.operator,
            Some((operator, Some(pol))) => {
                operator == call.operator && call.polarization() == Some(pol)
            }
            None => false,
        }
    }
}

impl Toolbox for SimulatedToolbox {
    fn read(&self, path: &Path) -> SarResult<Product> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SarError::InvalidFormat(format!("Not a product path: {}", path.display()))
            })?;

        let (width, height) = self.scene_size;
        let bands = self
            .polarizations
            .iter()
            .flat_map(|pol| {
                [
                    Band::new(format!("Amplitude_{}", pol), width, height),
                    Band::new(format!("Intensity_{}", pol), width, height),
                ]
            })
            .collect();
        Ok(Product::new(name, path, bands))
    }

    fn apply(&self, call: &OperatorCall, source: &Product) -> SarResult<Product> {
        self.calls.borrow_mut().push(call.clone());

        if self.should_fail(call) {
            return Err(SarError::Toolbox {
                operator: call.operator.toolbox_name().to_string(),
                message: "simulated failure".to_string(),
            });
        }
        check_required_bands(call, source)?;

        let (width, height) = match call.operator {
            Operator::Subset => self.subset_size,
            Operator::TerrainCorrection => self.terrain_size,
            _ => source.dimensions().unwrap_or(self.scene_size),
        };
        let bands = expected_bands(call, &source.band_names())
            .into_iter()
            .map(|name| Band::new(name, width, height))
            .collect();

        let location = PathBuf::from(format!("{}_{}", source.name, call.operator.suffix()));
        Ok(source.derive(call.clone(), location, bands))
    }

    fn write(&self, product: &Product, target: &Path, format: &str) -> SarResult<PathBuf> {
        let file = output_file(target, format);
        let content = serde_json::to_vec_pretty(product)?;
        std::fs::write(&file, content)?;
        Ok(file)
    }
}
