//! Configuration loading and validation
//!
//! Settings come from two sources: a JSON configuration file (`ktrun.json`
//! in the working directory unless `--config` names another file) and the
//! command line, with the command line taking precedence per setting. The
//! merged result is validated once into an immutable [`Settings`] value that
//! is passed into the ledger and runner; a required setting absent from both
//! sources is a single `ConfigurationMissing` error, not a scattered exit.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::cli::Cli;
use crate::error::{KtrunError, Result};
use crate::executor::CommandTemplate;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "ktrun.json";

/// Raw configuration file contents. Every field is optional; the command
/// line may supply whatever the file leaves out. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub database: Option<PathBuf>,
    pub table: Option<String>,
    pub files: Option<PathBuf>,
    pub command: Option<String>,
}

impl ConfigFile {
    /// Load a configuration file from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        debug!("loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Resolve the configuration file for this invocation.
    ///
    /// An explicitly given path must exist; the default `ktrun.json` is only
    /// loaded when present, since the command line may cover every setting.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(KtrunError::config(format!(
                        "unable to find configuration file {}",
                        path.display()
                    )));
                }
                Ok(Some(Self::load_from_file(path)?))
            }
            None => {
                let default = Path::new(CONFIG_FILE);
                if default.exists() {
                    Ok(Some(Self::load_from_file(default)?))
                } else {
                    debug!("no {CONFIG_FILE} in working directory, using command line only");
                    Ok(None)
                }
            }
        }
    }
}

/// Validated, immutable runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file holding the ledger table
    pub database: PathBuf,
    /// Ledger table name, sanitized to `[A-Za-z0-9_]`
    pub table: String,
    /// Transformation source directory
    pub files: PathBuf,
    /// Executor command template
    pub command: CommandTemplate,
    /// Diff against the full applied set instead of only the maximum
    pub strict: bool,
    /// Discover and report without executing or recording
    pub dry_run: bool,
}

impl Settings {
    /// Merge command line over configuration file and validate.
    pub fn from_sources(cli: &Cli, file: Option<ConfigFile>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let database = cli
            .database
            .clone()
            .or(file.database)
            .ok_or(KtrunError::ConfigurationMissing("database"))?;
        let table = cli
            .table
            .clone()
            .or(file.table)
            .ok_or(KtrunError::ConfigurationMissing("database table"))?;
        let files = cli
            .files
            .clone()
            .or(file.files)
            .ok_or(KtrunError::ConfigurationMissing("transformation directory"))?;
        let command = cli
            .command
            .clone()
            .or(file.command)
            .ok_or(KtrunError::ConfigurationMissing("command"))?;

        // The table name is interpolated into DDL/DML, never bound as a
        // parameter, so it must not carry quoting or punctuation
        let table = sanitize_table_name(&table);
        if table.is_empty() {
            return Err(KtrunError::config(
                "table name is empty after removing characters outside [A-Za-z0-9_]",
            ));
        }

        let command = CommandTemplate::parse(&command)?;

        Ok(Self {
            database,
            table,
            files,
            command,
            strict: cli.strict,
            dry_run: cli.dry_run,
        })
    }
}

/// Strip everything outside `[A-Za-z0-9_]` from a table name.
pub fn sanitize_table_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}
