/// Dataset directory discovery
use std::path::{Path, PathBuf};

/// Sorted list of regular files in `dir` whose extension matches (case-insensitive)
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> crate::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case(extension));

        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    log::debug!("Found {} '.{}' files in {:?}", files.len(), extension, dir);

    Ok(files)
}
