use crate::error::{Result, ShakeError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = staged(path, data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Atomically create `path` with `data`, refusing to replace an existing file.
///
/// The data is staged in a tempfile next to the target, so an interrupted
/// write never leaves a partial file under the final name.
pub fn write_new(path: &Path, data: &[u8]) -> Result<()> {
    if path.exists() {
        return Err(ShakeError::ArtifactExists(path.to_path_buf()));
    }
    let tmp = staged(path, data)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(ShakeError::ArtifactExists(path.to_path_buf()))
        }
        Err(e) => Err(e.error.into()),
    }
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

fn staged(path: &Path, data: &[u8]) -> Result<NamedTempFile> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/day.mseed");
        atomic_write(&path, b"data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn write_new_refuses_to_clobber() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("day.mseed");
        write_new(&path, b"first").unwrap();

        let err = write_new(&path, b"second").unwrap_err();
        assert!(matches!(err, ShakeError::ArtifactExists(ref p) if p == &path));
        assert_eq!(std::fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn write_new_leaves_no_stray_tempfiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("day.mseed");
        write_new(&path, b"x").unwrap();
        let _ = write_new(&path, b"y");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shakefetch.yaml");
        std::fs::write(&path, b"original").unwrap();
        let written = write_if_missing(&path, b"new").unwrap();
        assert!(!written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }
}
