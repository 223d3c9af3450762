use clap::Parser;
use std::path::PathBuf;

/// ktrun - sequential Kettle transformation runner
#[derive(Parser)]
#[command(name = "ktrun")]
#[command(about = "Applies numbered .ktr transformation files in ascending order, \
recording progress in a SQLite ledger")]
#[command(version)]
pub struct Cli {
    /// Use configuration from <FILE> instead of ktrun.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SQLite database file holding the ledger table
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Ledger table name
    #[arg(short, long)]
    pub table: Option<String>,

    /// Directory containing .ktr transformation files
    #[arg(short, long)]
    pub files: Option<PathBuf>,

    /// Command run once per transformation; `{}` is replaced with the file path
    #[arg(long)]
    pub command: Option<String>,

    /// Treat every identifier missing from the ledger as pending, not just
    /// identifiers above the latest applied one
    #[arg(long)]
    pub strict: bool,

    /// Dry-run mode: report pending transformations without executing or
    /// recording anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
