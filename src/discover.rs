//! Transformation discovery
//!
//! Scans the source directory (non-recursively) for candidate files and
//! computes the pending sequence. A candidate is a direct child with a
//! `.ktr` extension whose stem parses as a non-negative integer; anything
//! else is skipped, not an error. Both "directory missing" and "no
//! candidates" are pre-run checks that abort before the apply loop starts.
//!
//! Pure logic beyond the directory read: the pending computations take the
//! candidate list and ledger state as values, so they are unit-testable
//! without a filesystem.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{KtrunError, Result};

/// File extension that marks a transformation file.
pub const TRANSFORMATION_EXTENSION: &str = "ktr";

/// One discovered transformation: a numeric identifier and the file behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    pub identifier: u64,
    /// Absolute path handed to the executor.
    pub path: PathBuf,
}

/// List candidate transformations in `dir`.
pub fn list_candidates(dir: &Path) -> Result<Vec<Transformation>> {
    if !dir.is_dir() {
        return Err(KtrunError::DirectoryNotFound(dir.to_path_buf()));
    }
    // The executor contract is an absolute file path
    let dir = dir.canonicalize()?;

    let mut candidates = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(TRANSFORMATION_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match stem.parse::<u64>() {
            // Identifiers are stored in an SQLite INTEGER column
            Ok(identifier) if i64::try_from(identifier).is_ok() => {
                candidates.push(Transformation { identifier, path });
            }
            _ => debug!("skipping non-numeric transformation name: {}", path.display()),
        }
    }

    if candidates.is_empty() {
        return Err(KtrunError::EmptyDirectory(dir));
    }
    debug!(
        "discovered {} candidate transformation(s) in {}",
        candidates.len(),
        dir.display()
    );
    Ok(candidates)
}

/// Filter candidates to identifiers strictly above `max_applied` (all of
/// them when the ledger is empty) and yield them in ascending order.
///
/// This is the compatible gap policy: an identifier below the current
/// maximum that was never applied stays invisible here. [`pending_missing`]
/// is the strict alternative.
pub fn pending_in_order(
    candidates: Vec<Transformation>,
    max_applied: Option<u64>,
) -> Result<Vec<Transformation>> {
    let candidates = sorted_unique(candidates)?;
    Ok(candidates
        .into_iter()
        .filter(|t| max_applied.map_or(true, |max| t.identifier > max))
        .collect())
}

/// Strict pending policy: every candidate whose identifier is missing from
/// the applied set is pending, including identifiers below the current
/// maximum. Ascending order, same duplicate check.
pub fn pending_missing(
    candidates: Vec<Transformation>,
    applied: &BTreeSet<u64>,
) -> Result<Vec<Transformation>> {
    let candidates = sorted_unique(candidates)?;
    Ok(candidates
        .into_iter()
        .filter(|t| !applied.contains(&t.identifier))
        .collect())
}

/// Sort ascending and reject identifier collisions (e.g. `7.ktr` and
/// `007.ktr` both map to 7).
fn sorted_unique(mut candidates: Vec<Transformation>) -> Result<Vec<Transformation>> {
    candidates.sort_by_key(|t| t.identifier);
    for pair in candidates.windows(2) {
        if pair[0].identifier == pair[1].identifier {
            return Err(KtrunError::DuplicateIdentifier(pair[0].identifier));
        }
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn transformation(identifier: u64) -> Transformation {
        Transformation {
            identifier,
            path: PathBuf::from(format!("/srv/ktr/{identifier}.ktr")),
        }
    }

    fn identifiers(transformations: &[Transformation]) -> Vec<u64> {
        transformations.iter().map(|t| t.identifier).collect()
    }

    // =========================================================================
    // Directory scanning
    // =========================================================================

    #[test]
    fn test_missing_directory_is_reported() {
        let err = list_candidates(Path::new("/nonexistent/ktr")).unwrap_err();
        assert!(matches!(err, KtrunError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_directory_without_candidates_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A stray non-candidate file does not count
        File::create(dir.path().join("README.md")).unwrap();
        let err = list_candidates(dir.path()).unwrap_err();
        assert!(matches!(err, KtrunError::EmptyDirectory(_)));
    }

    #[test]
    fn test_only_numeric_ktr_files_are_candidates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.ktr", "2.ktr", "notes.txt", "setup.ktr", "3.KTR", "10.ktr"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let found = list_candidates(dir.path()).unwrap();
        let mut ids = identifiers(&found);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 10]);
        assert!(found.iter().all(|t| t.path.is_absolute()));
    }

    #[test]
    fn test_subdirectories_are_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("1.ktr")).unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();
        File::create(sub.join("2.ktr")).unwrap();
        let found = list_candidates(dir.path()).unwrap();
        assert_eq!(identifiers(&found), vec![1]);
    }

    // =========================================================================
    // Pending computation
    // =========================================================================

    #[test]
    fn test_empty_ledger_makes_everything_pending() {
        let pending =
            pending_in_order(vec![transformation(2), transformation(0), transformation(1)], None)
                .unwrap();
        assert_eq!(identifiers(&pending), vec![0, 1, 2]);
    }

    #[test]
    fn test_pending_is_strictly_above_max() {
        let candidates = vec![
            transformation(1),
            transformation(4),
            transformation(2),
            transformation(3),
        ];
        let pending = pending_in_order(candidates, Some(2)).unwrap();
        assert_eq!(identifiers(&pending), vec![3, 4]);
    }

    #[test]
    fn test_duplicate_identifiers_are_rejected() {
        let candidates = vec![
            transformation(7),
            Transformation {
                identifier: 7,
                path: PathBuf::from("/srv/ktr/007.ktr"),
            },
        ];
        let err = pending_in_order(candidates, None).unwrap_err();
        assert!(matches!(err, KtrunError::DuplicateIdentifier(7)));
    }

    #[test]
    fn test_strict_policy_fills_gaps() {
        let candidates = vec![transformation(1), transformation(2), transformation(3)];
        let applied: BTreeSet<u64> = [1, 3].into_iter().collect();
        let pending = pending_missing(candidates, &applied).unwrap();
        assert_eq!(identifiers(&pending), vec![2]);
    }

    #[test]
    fn test_compatible_policy_ignores_gaps() {
        let candidates = vec![transformation(1), transformation(2), transformation(3)];
        // 2 was never applied but sits below the maximum
        let pending = pending_in_order(candidates, Some(3)).unwrap();
        assert!(pending.is_empty());
    }
}
