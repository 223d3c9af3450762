//! The apply loop
//!
//! Reads the ledger high-water mark once, computes the pending sequence, and
//! applies each transformation in ascending order, invoking the external
//! executor synchronously. Each application couples the command with the
//! ledger insert in one transaction: the row commits only after the command
//! exits zero, and the first failure aborts the run with everything applied
//! before it preserved. Strictly sequential; later transformations may
//! assume earlier ones already took effect.

use log::{info, warn};

use crate::config::Settings;
use crate::discover::{self, Transformation};
use crate::error::Result;
use crate::executor;
use crate::ledger::Ledger;

/// What a completed run did (or, for a dry run, would have done).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifiers that were pending when the run started, ascending.
    pub pending: Vec<u64>,
    /// Identifiers applied and recorded by this run, in application order.
    /// Empty for a dry run.
    pub applied: Vec<u64>,
}

/// Drives the apply loop over one ledger with one set of settings.
pub struct Runner<'a> {
    ledger: &'a mut Ledger,
    settings: &'a Settings,
}

impl<'a> Runner<'a> {
    pub fn new(ledger: &'a mut Ledger, settings: &'a Settings) -> Self {
        Self { ledger, settings }
    }

    /// Apply every pending transformation, or report them under dry-run.
    pub fn run(&mut self) -> Result<RunSummary> {
        let pending = self.pending()?;

        if pending.is_empty() {
            info!("ledger is up to date; nothing to apply");
            return Ok(RunSummary {
                pending: Vec::new(),
                applied: Vec::new(),
            });
        }

        let pending_ids: Vec<u64> = pending.iter().map(|t| t.identifier).collect();
        info!("{} transformation(s) pending: {pending_ids:?}", pending.len());

        if self.settings.dry_run {
            for transformation in &pending {
                info!(
                    "[DRY RUN] would apply transformation {} ({})",
                    transformation.identifier,
                    transformation.path.display()
                );
            }
            return Ok(RunSummary {
                pending: pending_ids,
                applied: Vec::new(),
            });
        }

        let mut applied = Vec::with_capacity(pending.len());
        for Transformation { identifier, path } in &pending {
            let template = &self.settings.command;
            self.ledger.apply(*identifier, || {
                executor::run_transformation(template, *identifier, path)
            })?;
            info!("transformation {identifier} applied and recorded");
            applied.push(*identifier);
        }

        Ok(RunSummary {
            pending: pending_ids,
            applied,
        })
    }

    /// Read the ledger state once, then discover and order the pending set.
    fn pending(&mut self) -> Result<Vec<Transformation>> {
        if self.settings.strict {
            let applied = self.ledger.applied_set()?;
            let candidates = discover::list_candidates(&self.settings.files)?;
            return discover::pending_missing(candidates, &applied);
        }

        let max_applied = self.ledger.max_applied()?;
        let candidates = discover::list_candidates(&self.settings.files)?;

        // The compatible policy compares against the maximum only; surface
        // the identifiers it will never pick up instead of hiding them
        if let Some(max) = max_applied {
            let applied = self.ledger.applied_set()?;
            for t in &candidates {
                if t.identifier <= max && !applied.contains(&t.identifier) {
                    warn!(
                        "transformation {} is below the ledger maximum {max} but was never \
                         applied; it will not run (use --strict to include it)",
                        t.identifier
                    );
                }
            }
        }

        discover::pending_in_order(candidates, max_applied)
    }
}
