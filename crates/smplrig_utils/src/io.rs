use std::path::{Path, PathBuf};

/// File whose presence marks a usable data directory.
const SENTINEL: &str = "data/models/smplx/uv.txt";
const MAX_PARENT_LEVELS: usize = 3;

/// Resolves a path relative to the data directory.
///
/// The `SMPLX_DIR` environment variable wins when it points at a directory
/// containing the sentinel file; otherwise up to three parent directories of
/// the working directory are probed. When nothing matches, the relative path
/// is returned unchanged under `data/` and the subsequent open reports
/// file-not-found.
pub fn find_data_file(data_path: &str) -> PathBuf {
    if let Ok(env_dir) = std::env::var("SMPLX_DIR") {
        let root = PathBuf::from(env_dir);
        if root.join(SENTINEL).is_file() {
            return root.join("data").join(data_path);
        }
    }
    let mut prefix = PathBuf::new();
    for _ in 0..MAX_PARENT_LEVELS {
        if prefix.join(SENTINEL).is_file() {
            return prefix.join("data").join(data_path);
        }
        prefix.push("..");
    }
    Path::new("data").join(data_path)
}

/// Resolves a data path against an explicit root, falling back to the
/// environment probe of [`find_data_file`] when none is given.
pub fn resolve_data_file(data_root: Option<&Path>, data_path: &str) -> PathBuf {
    match data_root {
        Some(root) => root.join("data").join(data_path),
        None => find_data_file(data_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_data_file(Some(dir.path()), "models/smplx/SMPLX_NEUTRAL.npz");
        assert_eq!(
            resolved,
            dir.path().join("data/models/smplx/SMPLX_NEUTRAL.npz")
        );
    }

    #[test]
    fn unresolved_lookup_keeps_relative_path() {
        // No sentinel anywhere near a fresh temp dir and no usable env var.
        let resolved = resolve_data_file(Some(Path::new("missing")), "models/smpl/uv.txt");
        assert_eq!(resolved, Path::new("missing/data/models/smpl/uv.txt"));
    }
}
