//! Crash-safe replacement of small files.
//!
//! Values are written to a temp file in the destination directory and renamed
//! over the target. On Windows, rename-over-existing fails, so the previous file
//! is moved aside first and restored if the second rename also fails.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// `sync_all()` the temp file before it replaces the target.
    pub sync: bool,
    /// Unix permission bits applied to the temp file and the final file.
    pub unix_mode: Option<u32>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: true,
            unix_mode: Some(0o600),
        }
    }
}

pub fn replace_file(path: &Path, bytes: &[u8], options: WriteOptions) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    #[cfg(unix)]
    if let Some(mode) = options.unix_mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))?;
    }

    tmp.write_all(bytes)?;
    if options.sync {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = path.with_extension("bak");
        let _ = std::fs::remove_file(&backup);
        std::fs::rename(path, &backup)?;
        if let Err(retry) = err.file.persist(path) {
            let _ = std::fs::rename(&backup, path);
            return Err(retry.error);
        }
        if let Err(e) = std::fs::remove_file(&backup) {
            tracing::warn!(path = %backup.display(), "Failed to remove backup after replace: {e}");
        }
    }

    #[cfg(unix)]
    if let Some(mode) = options.unix_mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{WriteOptions, replace_file};

    const FAST: WriteOptions = WriteOptions {
        sync: false,
        unix_mode: None,
    };

    #[test]
    fn replaces_existing_content_without_leaving_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdi-conversations");

        replace_file(&path, b"[]", FAST).expect("first write");
        replace_file(&path, b"[{}]", FAST).expect("second write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{}]");
        assert!(!path.with_extension("bak").exists());
    }

    #[cfg(unix)]
    #[test]
    fn default_options_restrict_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdi-device-id");
        replace_file(&path, b"device_1_abc", WriteOptions::default()).expect("write");

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
