//! External executor invocation
//!
//! The executor is opaque to ktrun: a configured command template with a
//! single `{}` placeholder, rendered with the absolute path of each
//! transformation file and run through `sh -c`. The exit status is the only
//! success signal the runner consumes; stdout and stderr are captured for
//! logging but never inspected.

use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::error::{KtrunError, Result};

/// Placeholder replaced with the transformation file path.
pub const PATH_PLACEHOLDER: &str = "{}";

/// A validated executor command template.
///
/// Holds exactly one `{}` placeholder; validated at configuration time so a
/// malformed template never reaches the apply loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    /// Validate a raw template string.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.matches(PATH_PLACEHOLDER).count() {
            1 => Ok(Self(raw.to_string())),
            0 => Err(KtrunError::config(format!(
                "command `{raw}` has no {PATH_PLACEHOLDER} placeholder for the transformation file path"
            ))),
            n => Err(KtrunError::config(format!(
                "command `{raw}` has {n} {PATH_PLACEHOLDER} placeholders, expected exactly one"
            ))),
        }
    }

    /// Substitute the transformation file path into the template.
    pub fn render(&self, path: &Path) -> String {
        self.0
            .replacen(PATH_PLACEHOLDER, &path.display().to_string(), 1)
    }
}

/// Run the executor for one transformation and block until it exits.
///
/// Returns `Ok(())` only for a zero exit status. A non-zero exit or signal
/// termination becomes `ExecutionFailed` (signal termination is reported as
/// exit code -1), which aborts the whole run.
pub fn run_transformation(
    template: &CommandTemplate,
    identifier: u64,
    path: &Path,
) -> Result<()> {
    let rendered = template.render(path);
    info!("transformation {identifier}: `{rendered}`");

    let output = Command::new("sh")
        .arg("-c")
        .arg(&rendered)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if output.status.success() {
        debug!("transformation {identifier} completed");
        return Ok(());
    }

    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        warn!("transformation {identifier} stderr: {}", stderr.trim());
    }
    Err(KtrunError::ExecutionFailed { identifier, code })
}
