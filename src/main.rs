//! ktrun - Main entry point
//!
//! Thin orchestration over the library: parse the command line, merge it
//! with the configuration file, open the ledger, and hand off to the runner.

use anyhow::Context;
use log::{debug, error, info};

use ktrun::cli::Cli;
use ktrun::config::{ConfigFile, Settings};
use ktrun::ledger::Ledger;
use ktrun::runner::Runner;

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;

    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env() // Allows RUST_LOG env var to override
        .init();
}

/// Main application entry point
fn main() {
    init_logger();
    debug!("ktrun starting up");

    let cli = Cli::parse_args();

    if let Err(e) = run(cli) {
        error!("run aborted: {e:#}");
        eprintln!("✗ {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file =
        ConfigFile::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::from_sources(&cli, config_file)?;

    info!(
        "ledger {} table {}, transformations from {}",
        settings.database.display(),
        settings.table,
        settings.files.display()
    );

    let mut ledger = Ledger::open(&settings.database, &settings.table)
        .context("Failed to open the transformation ledger")?;
    let summary = Runner::new(&mut ledger, &settings).run()?;

    if settings.dry_run {
        println!(
            "✓ dry run: {} transformation(s) pending",
            summary.pending.len()
        );
        for identifier in &summary.pending {
            println!("  would apply {identifier}");
        }
    } else if summary.applied.is_empty() {
        println!("✓ Ledger is up to date, nothing to apply");
    } else {
        let applied: Vec<String> = summary.applied.iter().map(u64::to_string).collect();
        println!(
            "✓ Applied {} transformation(s): {}",
            applied.len(),
            applied.join(", ")
        );
    }
    Ok(())
}
