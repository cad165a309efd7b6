use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Route id to an ordered list of values.
pub type Snapshot = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot path is empty")]
    EmptyPath,
    #[error("snapshot io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode snapshot {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes the snapshot as indented JSON, creating parent directories as needed.
pub fn save(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(SnapshotError::EmptyPath);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let data = serde_json::to_vec_pretty(snapshot).map_err(SnapshotError::Encode)?;
    fs::write(path, data).map_err(io_error(path))
}

pub fn load(path: impl AsRef<Path>) -> Result<Snapshot, SnapshotError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(SnapshotError::EmptyPath);
    }

    let raw = fs::read(path).map_err(io_error(path))?;
    serde_json::from_slice(&raw).map_err(|source| SnapshotError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> Snapshot {
        Snapshot::from([
            (
                "orders".to_string(),
                vec!["123".to_string(), "456".to_string()],
            ),
            ("payments".to_string(), vec![]),
        ])
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/snapshot.json");

        save(&path, &sample()).unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_json_eq!(written, json!({"orders": ["123", "456"], "payments": []}));
        // Indented output
        assert!(fs::read_to_string(&path).unwrap().contains("\n  \"orders\""));
    }

    #[test]
    fn test_load_reads_back_saved_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        save(&path, &sample()).unwrap();
        assert_eq!(load(&path).unwrap(), sample());
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(
            save("", &sample()),
            Err(SnapshotError::EmptyPath)
        ));
        assert!(matches!(load(""), Err(SnapshotError::EmptyPath)));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(load(&missing), Err(SnapshotError::Io { .. })));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, b"{\"orders\": 12}").unwrap();
        assert!(matches!(load(&corrupt), Err(SnapshotError::Decode { .. })));
    }
}
