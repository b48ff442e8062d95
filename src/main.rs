use anyhow::{Context, Result};
use clap::Parser;
use signinspect::logging::{init_tracing, init_tracing_json};
use signinspect::{Platform, ScanSummary, SignatureResult, SignatureService, ValidatorConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// Inspect code signatures on executables, bundles and packages.
#[derive(Parser, Debug)]
#[command(name = "signinspect", version, about)]
struct Cli {
    /// Files to inspect.
    #[arg(required = true)]
    paths: Vec<String>,

    /// Force a backend (windows, macos, linux) instead of the host's.
    #[arg(long)]
    platform: Option<Platform>,

    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parallel validations (0 = one per CPU).
    #[arg(long, env = "SIGNINSPECT_WORKERS")]
    workers: Option<usize>,

    /// Print the scan summary as JSON.
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON on stderr.
    #[arg(long)]
    log_json: bool,
}

fn load_config(cli: &Cli) -> Result<ValidatorConfig> {
    let config = match &cli.config {
        Some(path) => ValidatorConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ValidatorConfig::default(),
    };
    let mut config = config
        .apply_env_overrides()
        .context("invalid environment override")?;
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    Ok(config)
}

fn print_result(result: &SignatureResult) {
    let status = match (result.is_signed, result.is_valid) {
        (true, true) if result.is_expired => "signed, valid, certificate expired",
        (true, true) => "signed and valid",
        (true, false) => "signed, not validated",
        (false, _) => "not signed",
    };

    println!("{}", result.file_path);
    println!("  Status:    {status}");
    if !result.signer_name.is_empty() {
        println!("  Signer:    {}", result.signer_name);
    }
    if !result.issuer_name.is_empty() {
        println!("  Issuer:    {}", result.issuer_name);
    }
    if let Some(from) = result.valid_from {
        println!("  Valid from: {}", from.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(to) = result.valid_to {
        println!("  Valid to:   {}", to.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !result.signature_algorithm.is_empty() {
        println!("  Algorithm: {}", result.signature_algorithm);
    }
    if result.has_timestamp {
        println!("  Timestamped");
    }
    if let Some(error) = &result.error_message {
        println!("  Error:     {error}");
    }
    println!();
}

fn print_summary(summary: &ScanSummary) {
    println!(
        "{} file(s): {} signed, {} unsigned, {} expired",
        summary.total_files,
        summary.signed_files,
        summary.unsigned_files,
        summary.expired_signatures
    );
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.log_json {
        init_tracing_json();
    } else {
        init_tracing();
    }

    let config = load_config(&cli)?;
    let platform = cli.platform.unwrap_or_else(Platform::host);
    debug!(%platform, ?config, "starting scan");

    let service = SignatureService::for_platform(platform, &config);
    let summary = service.scan(&cli.paths);

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize results")?;
        println!("{json}");
    } else {
        summary.results.iter().for_each(print_result);
        print_summary(&summary);
    }

    Ok(if summary.incomplete().next().is_some() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
