use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("focusup.sqlite");

    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
        logs_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn bootstrap_creates_state_logs_and_database() {
        let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "focusup-bootstrap-tests-{}-{}",
            std::process::id(),
            sequence
        ));

        let result = bootstrap_workspace(&root).expect("bootstrap");
        assert!(result.database_path.is_file());
        assert!(result.logs_dir.is_dir());
        assert_eq!(result.database_path, root.join("state/focusup.sqlite"));

        // idempotent on an existing workspace
        bootstrap_workspace(&root).expect("bootstrap again");
        let _ = fs::remove_dir_all(&root);
    }
}
