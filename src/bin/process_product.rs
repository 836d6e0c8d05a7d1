//! Preprocess one Sentinel-1 GRD product into a GeoTIFF per polarization.

use anyhow::{bail, Context, Result};
use clap::Parser;
use icesar::core::{OrbitType, PipelineConfig, PipelineRequest, ProductPipeline};
use icesar::toolbox::{GptConfig, GptToolbox};
use icesar::{AoiGeometry, ErrorPolicy, Polarization};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sentinel-1 GRD preprocessing through SNAP gpt", long_about = None)]
struct Cli {
    /// Sentinel-1 product: SAFE zip, .SAFE directory or BEAM-DIMAP header
    #[arg(long = "product_path", visible_alias = "product-path")]
    product_path: PathBuf,

    /// Area of interest as a WKT polygon (lon/lat)
    #[arg(long = "wkt_aoi", visible_alias = "wkt-aoi")]
    wkt_aoi: String,

    /// Output directory
    #[arg(long = "out_path", visible_alias = "out-path")]
    out_path: PathBuf,

    /// Output base name; files are written as {out_name}_{polarization}
    #[arg(long = "out_name", visible_alias = "out-name")]
    out_name: String,

    /// Polarizations to process, e.g. "HH,HV"; detected from the product when omitted
    #[arg(long)]
    polarizations: Option<String>,

    /// Orbit files to apply
    #[arg(long, value_enum, default_value_t = OrbitType::Precise)]
    orbit_type: OrbitType,

    /// Elevation model for terrain correction
    #[arg(long, default_value = "GETASSE30")]
    dem: String,

    /// Stop at the first failed polarization or skip it
    #[arg(long, value_enum, default_value_t = ErrorPolicy::FailFast)]
    on_error: ErrorPolicy,

    /// SNAP gpt executable
    #[arg(long, env = "SNAP_GPT")]
    gpt: Option<PathBuf>,

    /// Keep intermediate BEAM-DIMAP products in this directory
    #[arg(long, env = "SNAP_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// gpt tile cache size, e.g. 4G
    #[arg(long)]
    cache_size: Option<String>,

    /// gpt worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Leave intermediate products and graphs in the work directory
    #[arg(long)]
    keep_intermediates: bool,
}

impl Cli {
    /// Explicit polarization list, or `None` to detect them from the product
    fn requested_polarizations(&self) -> Result<Option<Vec<Polarization>>> {
        self.polarizations
            .as_deref()
            .map(Polarization::parse_list)
            .transpose()
            .context("invalid --polarizations")
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let aoi = AoiGeometry::parse(&cli.wkt_aoi).context("--wkt_aoi is not a usable geometry")?;
    let polarizations = cli.requested_polarizations()?;

    let mut gpt_config = GptConfig {
        work_dir: cli.work_dir,
        cache_size: cli.cache_size,
        parallelism: cli.threads,
        keep_intermediates: cli.keep_intermediates,
        ..GptConfig::default()
    };
    if let Some(gpt) = cli.gpt {
        gpt_config.executable = gpt;
    }
    let toolbox = GptToolbox::new(gpt_config).context("failed to prepare gpt work directory")?;

    let config = PipelineConfig {
        orbit_type: cli.orbit_type,
        dem_name: cli.dem,
        error_policy: cli.on_error,
        ..PipelineConfig::default()
    };
    let request = PipelineRequest {
        product_path: cli.product_path,
        aoi,
        out_path: cli.out_path,
        out_name: cli.out_name,
        polarizations,
    };

    let pipeline = ProductPipeline::new(&toolbox, config);
    let report = pipeline
        .run(&request)
        .with_context(|| format!("processing {} failed", request.product_path.display()))?;

    for output in &report.outputs {
        log::info!(
            "{}: {} ({} x {})",
            output.polarization,
            output.path.display(),
            output.width,
            output.height
        );
    }
    if !report.failures.is_empty() {
        bail!(
            "{} of {} polarizations failed: {}",
            report.failures.len(),
            report.polarizations.len(),
            report
                .failures
                .iter()
                .map(|(pol, e)| format!("{} ({})", pol, e))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    const AOI: &str = "POLYGON ((-58.75 55.02, -58.75 54.97, -58.80 54.97, -58.80 55.02, -58.75 55.02))";

    fn required_args() -> Vec<&'static str> {
        vec![
            "process-product",
            "--product_path",
            "S1B_IW_GRDH_1SDH_20210614T100344_20210614T100409_027351_03443D_13A1.zip",
            "--wkt_aoi",
            AOI,
            "--out_path",
            "out",
            "--out_name",
            "berg_0612",
        ]
    }

    #[test]
    fn test_underscore_flags() {
        let cli = Cli::try_parse_from(required_args()).unwrap();
        assert_eq!(
            cli.product_path,
            PathBuf::from("S1B_IW_GRDH_1SDH_20210614T100344_20210614T100409_027351_03443D_13A1.zip")
        );
        assert_eq!(cli.wkt_aoi, AOI);
        assert_eq!(cli.out_path, PathBuf::from("out"));
        assert_eq!(cli.out_name, "berg_0612");
        assert_eq!(cli.orbit_type, OrbitType::Precise);
        assert_eq!(cli.on_error, ErrorPolicy::FailFast);
        assert!(!cli.keep_intermediates);
        assert!(AoiGeometry::parse(&cli.wkt_aoi).is_ok());
    }

    #[test]
    fn test_kebab_aliases() {
        let cli = Cli::try_parse_from([
            "process-product",
            "--product-path",
            "p.zip",
            "--wkt-aoi",
            AOI,
            "--out-path",
            "out",
            "--out-name",
            "berg",
        ])
        .unwrap();
        assert_eq!(cli.out_name, "berg");
    }

    #[test]
    fn test_each_required_flag_is_required() {
        let args = required_args();
        for flag in ["--product_path", "--wkt_aoi", "--out_path", "--out_name"] {
            let pos = args.iter().position(|a| *a == flag).unwrap();
            let mut missing = args.clone();
            missing.drain(pos..pos + 2);
            let err = Cli::try_parse_from(missing).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument, "{}", flag);
        }
    }

    #[test]
    fn test_polarizations_omitted_means_detection() {
        let cli = Cli::try_parse_from(required_args()).unwrap();
        assert!(cli.polarizations.is_none());
        assert_eq!(cli.requested_polarizations().unwrap(), None);
    }

    #[test]
    fn test_polarization_list_forms() {
        for list in ["HH,HV", "['HH', 'HV']", "HH HV"] {
            let mut args = required_args();
            args.extend(["--polarizations", list]);
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(
                cli.requested_polarizations().unwrap(),
                Some(vec![Polarization::HH, Polarization::HV]),
                "{}",
                list
            );
        }

        let mut args = required_args();
        args.extend(["--polarizations", "HH,XX"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.requested_polarizations().is_err());
    }

    #[test]
    fn test_processing_options() {
        let mut args = required_args();
        args.extend([
            "--orbit-type",
            "auto",
            "--dem",
            "SRTM 3Sec",
            "--on-error",
            "skip",
            "--cache-size",
            "4G",
            "--threads",
            "8",
            "--keep-intermediates",
        ]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.orbit_type, OrbitType::Auto);
        assert_eq!(cli.dem, "SRTM 3Sec");
        assert_eq!(cli.on_error, ErrorPolicy::Skip);
        assert_eq!(cli.cache_size.as_deref(), Some("4G"));
        assert_eq!(cli.threads, Some(8));
        assert!(cli.keep_intermediates);
    }
}
