use crate::error::{AppError, AppResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Private key material on disk for exactly as long as the guard lives.
///
/// libssh2 only authenticates from a key file; the file is created owner-only
/// and removed on drop, whichever way the caller leaves.
pub struct ScopedKeyFile {
    path: PathBuf,
}

impl ScopedKeyFile {
    pub fn write(contents: &[u8]) -> AppResult<Self> {
        Self::write_in(&std::env::temp_dir(), contents)
    }

    pub fn write_in(dir: &Path, contents: &[u8]) -> AppResult<Self> {
        let guard = Self {
            path: dir.join(format!("sftp-explorer-key-{}", uuid::Uuid::new_v4())),
        };

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        // A failed write still leaves the guard responsible for cleanup
        let mut file = options
            .open(&guard.path)
            .map_err(|e| AppError::Auth(format!("Failed to write temp key file: {}", e)))?;
        file.write_all(contents)
            .and_then(|_| file.flush())
            .map_err(|e| AppError::Auth(format!("Failed to write temp key file: {}", e)))?;

        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedKeyFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temp key file: {}", e);
            }
        }
    }
}
