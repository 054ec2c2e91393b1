//! luma - convert an image to grayscale on a compute device.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use luma_compute::{Backend, ImageExtent, KernelSource, PartitionStrategy, PipelineOptions};
use luma_io::RgbaImage;

#[derive(Parser, Debug)]
#[command(name = "luma")]
#[command(author, version, about = "Convert an image to grayscale on a compute device")]
#[command(long_about = "
Loads a PNG or JPEG image, converts it to grayscale with an OpenCL kernel
(or the CPU reference device) and writes the result.

Examples:
  luma                                   # input.jpg -> output_gray.jpg
  luma photo.png photo_gray.png          # lossless output
  luma photo.jpg out.jpg --backend cpu   # force the reference device
  luma --list-backends
")]
struct Cli {
    /// Input image (PNG or JPEG)
    #[arg(default_value = "input.jpg")]
    input: PathBuf,

    /// Output image; format from extension
    #[arg(default_value = "output_gray.jpg")]
    output: PathBuf,

    /// Compute backend
    #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Work-group search
    #[arg(short, long, value_enum, default_value_t = StrategyArg::Greedy)]
    strategy: StrategyArg,

    /// JPEG quality (1-100)
    #[arg(
        long,
        default_value_t = luma_io::DEFAULT_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    quality: u8,

    /// Number of threads for the CPU backend (0 = auto)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,

    /// List compute backends and exit
    #[arg(long)]
    list_backends: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    Cpu,
    Opencl,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Cpu => Backend::Cpu,
            BackendArg::Opencl => Backend::OpenCl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Greedy,
    Exhaustive,
}

impl From<StrategyArg> for PartitionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Greedy => PartitionStrategy::Greedy,
            StrategyArg::Exhaustive => PartitionStrategy::Exhaustive,
        }
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    if cli.list_backends {
        print!("{}", luma_compute::describe_backends());
        return Ok(());
    }

    let start = Instant::now();

    let image = luma_io::load(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let extent = ImageExtent::new(image.width, image.height)?;
    info!(input = %cli.input.display(), %extent, "Loaded image");

    let backend = Backend::from(cli.backend);
    let options = PipelineOptions {
        kernel: KernelSource::grayscale(),
        strategy: cli.strategy.into(),
    };
    let gray = luma_compute::grayscale_with(backend, &image.data, extent, &options)
        .with_context(|| format!("Grayscale conversion failed on backend '{}'", backend))?;

    let output = RgbaImage::new(image.width, image.height, gray)?;
    luma_io::save(&cli.output, &output, cli.quality)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    info!(
        output = %cli.output.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["luma"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("input.jpg"));
        assert_eq!(cli.output, PathBuf::from("output_gray.jpg"));
        assert_eq!(cli.backend, BackendArg::Auto);
        assert_eq!(cli.strategy, StrategyArg::Greedy);
        assert_eq!(cli.quality, 100);
        assert_eq!(cli.threads, 0);
    }

    #[test]
    fn test_options() {
        let cli = Cli::try_parse_from([
            "luma",
            "a.png",
            "b.png",
            "--backend",
            "opencl",
            "--strategy",
            "exhaustive",
            "--quality",
            "80",
        ])
        .unwrap();
        assert_eq!(Backend::from(cli.backend), Backend::OpenCl);
        assert_eq!(PartitionStrategy::from(cli.strategy), PartitionStrategy::Exhaustive);
        assert_eq!(cli.quality, 80);
    }

    #[test]
    fn test_quality_range() {
        assert!(Cli::try_parse_from(["luma", "--quality", "0"]).is_err());
        assert!(Cli::try_parse_from(["luma", "--quality", "101"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["luma", "-v", "-q"]).is_err());
    }
}
