//! Codelist directory path resolution.

use std::path::{Path, PathBuf};

/// Environment variable for overriding the codelist directory.
pub const CODELISTS_ENV_VAR: &str = "COHORT_CODELISTS_DIR";

/// Directory used when neither a flag nor the environment names one.
pub const DEFAULT_CODELISTS_DIR: &str = "codelists";

/// Get the codelist root directory.
///
/// Resolution order:
/// 1. an explicit directory (the `--codelists-dir` flag)
/// 2. `COHORT_CODELISTS_DIR` environment variable
/// 3. `codelists/` relative to the working directory
///
/// # Example
///
/// ```rust,ignore
/// let root = cohort_codelists::codelists_root(None);
/// let ethnicity = root.join("opensafely-ethnicity.csv");
/// ```
pub fn codelists_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Ok(root) = std::env::var(CODELISTS_ENV_VAR) {
        if !root.trim().is_empty() {
            return PathBuf::from(root);
        }
    }
    PathBuf::from(DEFAULT_CODELISTS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directory_wins() {
        let dir = Path::new("/data/study/codelists");
        assert_eq!(codelists_root(Some(dir)), dir.to_path_buf());
    }
}
