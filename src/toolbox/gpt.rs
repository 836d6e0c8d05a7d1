use crate::core::band_model::expected_bands;
use crate::core::operators::{Operator, OperatorCall};
use crate::io::dimap::read_dimap_header;
use crate::toolbox::graph::Graph;
use crate::toolbox::{output_file, read_source_product, Toolbox};
use crate::types::{Band, Product, SarError, SarResult};
use std::cell::{Cell, RefCell};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Format of the intermediate products
const INTERMEDIATE_FORMAT: &str = "BEAM-DIMAP";

/// SNAP Graph Processing Tool settings
#[derive(Debug, Clone)]
pub struct GptConfig {
    /// Path to the `gpt` executable
    pub executable: PathBuf,
    /// Directory for intermediate products; a temporary directory when unset
    pub work_dir: Option<PathBuf>,
    /// Tile cache size passed as `-c`, e.g. `4G`
    pub cache_size: Option<String>,
    /// Thread count passed as `-q`
    pub parallelism: Option<usize>,
    /// Leave intermediate products and graph files in the work directory
    pub keep_intermediates: bool,
}

impl Default for GptConfig {
    fn default() -> Self {
        Self {
            executable: default_gpt_path(),
            work_dir: None,
            cache_size: None,
            parallelism: None,
            keep_intermediates: false,
        }
    }
}

/// `~/esa-snap/bin/gpt` when installed there, otherwise `gpt` from `PATH`
pub fn default_gpt_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("esa-snap").join("bin").join("gpt"))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("gpt"))
}

/// Operators whose output is computed before the chain continues.
///
/// Subset is the source of every polarization branch and linearToFromdB ends
/// a branch; both are AOI sized. Everything else is deferred into the next
/// graph, so the full scene is never written out.
pub fn is_checkpoint(operator: Operator) -> bool {
    matches!(operator, Operator::Subset | Operator::LinearToFromDb)
}

/// Toolbox backed by SNAP `gpt`.
///
/// Operator calls are deferred until a checkpoint, then the pending chain runs
/// as one graph (`Read -> ... -> Write`) into a BEAM-DIMAP product in the work
/// directory, whose header is read back to learn the bands and raster size.
/// Intermediates are removed once written out, and on drop, unless
/// [`GptConfig::keep_intermediates`] is set.
pub struct GptToolbox {
    config: GptConfig,
    work_dir: PathBuf,
    _temp_dir: Option<TempDir>,
    counter: Cell<usize>,
    intermediates: RefCell<Vec<PathBuf>>,
}

impl GptToolbox {
    pub fn new(config: GptConfig) -> SarResult<Self> {
        let (work_dir, temp_dir) = match &config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("icesar-").tempdir()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        log::info!("Intermediate products go to {}", work_dir.display());

        Ok(Self {
            config,
            work_dir,
            _temp_dir: temp_dir,
            counter: Cell::new(0),
            intermediates: RefCell::new(Vec::new()),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Intermediate products currently on disk, oldest first
    pub fn intermediates(&self) -> Vec<PathBuf> {
        self.intermediates.borrow().clone()
    }

    /// Numbered work file `{nn}_{name}.{extension}`
    fn next_work_file(&self, name: &str, extension: &str) -> PathBuf {
        let n = self.counter.get() + 1;
        self.counter.set(n);
        self.work_dir.join(format!("{:02}_{}.{}", n, name, extension))
    }

    /// Command line for one graph run, without the executable
    pub fn graph_args(&self, graph_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![graph_file.into()];
        if let Some(cache) = &self.config.cache_size {
            args.push("-c".into());
            args.push(cache.into());
        }
        if let Some(threads) = self.config.parallelism {
            args.push("-q".into());
            args.push(threads.to_string().into());
        }
        args
    }

    /// Write `graph` next to its output and run it
    fn run_graph(&self, graph: &Graph, graph_file: &Path) -> SarResult<()> {
        let label = graph.operators()[1..].join(" -> ");
        graph.write_to(graph_file)?;
        let args = self.graph_args(graph_file);
        log::debug!(
            "{} {}",
            self.config.executable.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.config.executable)
            .args(&args)
            .output()
            .map_err(|e| SarError::Toolbox {
                operator: label.clone(),
                message: format!(
                    "could not start {}: {}",
                    self.config.executable.display(),
                    e
                ),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            let tail: Vec<&str> = detail.lines().rev().take(10).collect();
            return Err(SarError::Toolbox {
                operator: label,
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
                ),
            });
        }

        if !self.config.keep_intermediates {
            remove_quietly(graph_file);
        }
        Ok(())
    }

    /// Delete an intermediate product this toolbox created
    fn release(&self, location: &Path) {
        if self.config.keep_intermediates {
            return;
        }
        let mut intermediates = self.intermediates.borrow_mut();
        if let Some(pos) = intermediates.iter().position(|p| p == location) {
            let path = intermediates.remove(pos);
            log::debug!("Removing intermediate {}", path.display());
            remove_dimap_product(&path);
        }
    }
}

impl Drop for GptToolbox {
    fn drop(&mut self) {
        if self.config.keep_intermediates {
            return;
        }
        for path in self.intermediates.get_mut().drain(..) {
            remove_dimap_product(&path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Remove a `.dim` header and its `.data` directory
fn remove_dimap_product(header: &Path) {
    remove_quietly(header);
    let data_dir = header.with_extension("data");
    if data_dir.is_dir() {
        if let Err(e) = std::fs::remove_dir_all(&data_dir) {
            log::warn!("Could not remove {}: {}", data_dir.display(), e);
        }
    }
}

impl Toolbox for GptToolbox {
    fn read(&self, path: &Path) -> SarResult<Product> {
        read_source_product(path)
    }

    fn apply(&self, call: &OperatorCall, source: &Product) -> SarResult<Product> {
        let operator_name = call.operator.toolbox_name();
        let source_bands = source.band_names();
        let expected = expected_bands(call, &source_bands);

        if !is_checkpoint(call.operator) {
            log::debug!("Deferring {} on {}", operator_name, source.name);
            // sizes stay those of the last computed product
            let (width, height) = source.dimensions().unwrap_or((0, 0));
            let bands = expected
                .into_iter()
                .map(|name| Band::new(name, width, height))
                .collect();
            return Ok(source.defer(call.clone(), bands));
        }

        let mut calls = source.pending.clone();
        calls.push(call.clone());
        let derived_name = format!("{}_{}", source.name, call.operator.suffix());
        let target = self.next_work_file(&derived_name, "dim");
        let graph = Graph::chain(&source.location, &calls, &target, INTERMEDIATE_FORMAT);

        log::info!(
            "Running {} on {}",
            calls
                .iter()
                .map(|c| c.operator.toolbox_name())
                .collect::<Vec<_>>()
                .join(" -> "),
            source.name
        );
        self.run_graph(&graph, &target.with_extension("xml"))?;
        self.intermediates.borrow_mut().push(target.clone());

        let result = read_dimap_header(&target)?;
        let produced: Vec<String> = result.bands.iter().map(|b| b.name.clone()).collect();
        if produced != expected {
            log::warn!(
                "{} produced bands [{}], expected [{}]",
                operator_name,
                produced.join(", "),
                expected.join(", ")
            );
        }

        Ok(source.derive(call.clone(), target, result.bands))
    }

    fn write(&self, product: &Product, target: &Path, format: &str) -> SarResult<PathBuf> {
        let file = output_file(target, format);
        log::info!("Writing {} as {} to {}", product.name, format, file.display());

        let graph = Graph::chain(&product.location, &product.pending, &file, format);
        let graph_file = self.next_work_file(&format!("{}_write", product.name), "xml");
        self.run_graph(&graph, &graph_file)?;

        if !file.exists() {
            return Err(SarError::Toolbox {
                operator: "Write".to_string(),
                message: format!("{} was not created", file.display()),
            });
        }
        self.release(&product.location);
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarization;

    fn toolbox(config: GptConfig) -> (GptToolbox, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = GptConfig {
            work_dir: Some(dir.path().to_path_buf()),
            ..config
        };
        (GptToolbox::new(config).unwrap(), dir)
    }

    #[test]
    fn test_graph_args_layout() {
        let (gpt, _dir) = toolbox(GptConfig {
            executable: PathBuf::from("gpt"),
            cache_size: Some("4G".to_string()),
            parallelism: Some(2),
            ..GptConfig::default()
        });
        let args = gpt.graph_args(Path::new("/work/01_S1B_Sub.xml"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["/work/01_S1B_Sub.xml", "-c", "4G", "-q", "2"]);
    }

    #[test]
    fn test_work_files_are_unique() {
        let (gpt, dir) = toolbox(GptConfig::default());
        let a = gpt.next_work_file("S1B_Cal", "dim");
        let b = gpt.next_work_file("S1B_Cal", "dim");
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("dim"));
    }

    #[test]
    fn test_non_checkpoint_calls_are_deferred() {
        let (gpt, dir) = toolbox(GptConfig {
            executable: PathBuf::from("/nonexistent/snap/bin/gpt"),
            ..GptConfig::default()
        });
        let source = Product::new(
            "S1B",
            "in.zip",
            vec![Band::new("Amplitude_HH", 100, 80), Band::new("Intensity_HH", 100, 80)],
        );
        let orbit = gpt
            .apply(&OperatorCall::apply_orbit_file(Default::default(), 3), &source)
            .unwrap();
        let noise = gpt.apply(&OperatorCall::thermal_noise_removal(), &orbit).unwrap();

        assert_eq!(noise.location, PathBuf::from("in.zip"));
        assert_eq!(noise.pending.len(), 2);
        assert_eq!(noise.band_names(), vec!["Intensity_HH"]);
        assert_eq!(noise.dimensions(), Some((100, 80)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_missing_executable_is_toolbox_error() {
        let (gpt, _dir) = toolbox(GptConfig {
            executable: PathBuf::from("/nonexistent/snap/bin/gpt"),
            ..GptConfig::default()
        });
        let source = Product::new("S1B", "in.dim", vec![Band::new("Intensity_HH", 4, 4)])
            .defer(OperatorCall::calibration(Polarization::HH), vec![Band::new("Sigma0_HH", 4, 4)]);
        let err = gpt.apply(&OperatorCall::linear_to_db(), &source).unwrap_err();
        match err {
            SarError::Toolbox { operator, .. } => {
                assert_eq!(operator, "Calibration -> linearToFromdB -> Write")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_release_removes_header_and_data() {
        let (gpt, dir) = toolbox(GptConfig::default());
        let header = dir.path().join("01_S1B_Sub.dim");
        std::fs::write(&header, "<Dimap_Document/>").unwrap();
        std::fs::create_dir_all(header.with_extension("data")).unwrap();
        gpt.intermediates.borrow_mut().push(header.clone());

        gpt.release(&header);
        assert!(!header.exists());
        assert!(!header.with_extension("data").exists());
        assert!(gpt.intermediates().is_empty());
    }
}
