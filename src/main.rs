use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use oil_spill_fvm::initialization::{find_configs, run_config};

/// Oil spill transport over a triangular mesh
#[derive(Parser)]
#[command(name = "oil-spill-fvm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Finite-volume oil spill simulation", long_about = None)]
struct Cli {
    /// Configuration file to run
    #[arg(short, long, default_value = "input.json")]
    config_file: PathBuf,

    /// Run every *.json configuration in --folder
    #[arg(long)]
    find_all: bool,

    /// Folder searched by --find-all
    #[arg(short, long, default_value = ".")]
    folder: PathBuf,

    /// Root folder for per-run results
    #[arg(short = 'o', long, default_value = "results")]
    results: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// The single configuration, or every one found in the folder.
fn collect_configs(cli: &Cli) -> anyhow::Result<Vec<PathBuf>> {
    if !cli.find_all {
        return Ok(vec![cli.config_file.clone()]);
    }
    let configs = find_configs(&cli.folder)
        .with_context(|| format!("cannot list configurations in {}", cli.folder.display()))?;
    if configs.is_empty() {
        bail!("no configuration files found in {}", cli.folder.display());
    }
    Ok(configs)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the log subscriber")?;

    let configs = collect_configs(&cli)?;

    let mut failed = 0;
    for config in configs.iter() {
        match run_config(config, &cli.results) {
            Ok(summary) => info!(
                config = %config.display(),
                steps = summary.steps,
                final_total = summary.final_fishing_ground_total,
                peak_total = summary.peak_fishing_ground_total,
                results = %summary.results_dir.display(),
                "finished"
            ),
            Err(e) => {
                failed += 1;
                error!(config = %config.display(), "run failed: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} runs failed", configs.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_config_by_default() {
        let cli = Cli::parse_from(["oil-spill-fvm"]);
        assert_eq!(collect_configs(&cli).unwrap(), vec![PathBuf::from("input.json")]);
    }

    #[test]
    fn test_missing_folder_carries_context() {
        let cli = Cli::parse_from(["oil-spill-fvm", "--find-all", "-f", "no/such/folder"]);
        let err = collect_configs(&cli).unwrap_err();
        assert!(format!("{err}").starts_with("cannot list configurations in no/such/folder"));
        assert!(err.chain().count() >= 2);
    }
}
