use super::{filter_hidden, path, BackendKind, FileEntry, FileStat, FilesystemBackend};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::time::UNIX_EPOCH;

/// The machine this process runs on
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl FilesystemBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn session_id(&self) -> Option<String> {
        None
    }

    async fn list_directory(&self, dir: &str, include_hidden: bool) -> AppResult<Vec<FileEntry>> {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| AppError::io_at(dir, e))?;

        let mut found = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| AppError::io_at(dir, e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            found.push((entry.file_name().to_string_lossy().into_owned(), entry.path(), is_dir));
        }

        let entries = futures::future::join_all(found.into_iter().map(
            |(name, entry_path, is_dir)| async move {
                let mut entry = FileEntry::new(name, entry_path.to_string_lossy(), is_dir);
                match tokio::fs::metadata(&entry_path).await {
                    Ok(meta) => {
                        entry.size = meta.len();
                        entry.modified = modified_ms(&meta);
                    }
                    Err(e) => tracing::debug!("Could not stat {}: {}", entry.path, e),
                }
                entry
            },
        ))
        .await;

        Ok(filter_hidden(entries, include_hidden))
    }

    async fn read_file(&self, path: &str) -> AppResult<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| AppError::io_at(path, e))
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> AppResult<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| AppError::io_at(path, e))
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> AppResult<()> {
        tokio::fs::rename(old_path, new_path)
            .await
            .map_err(|e| AppError::io_at(old_path, e))
    }

    async fn delete(&self, path: &str, is_directory: bool) -> AppResult<()> {
        let result = if is_directory {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(|e| AppError::io_at(path, e))
    }

    async fn mkdir(&self, path: &str) -> AppResult<()> {
        tokio::fs::create_dir(path)
            .await
            .map_err(|e| AppError::io_at(path, e))
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn stat(&self, path: &str) -> AppResult<FileStat> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| AppError::io_at(path, e))?;
        Ok(FileStat {
            size: meta.len(),
            modified: modified_ms(&meta),
            is_directory: meta.is_dir(),
            permissions: None,
        })
    }

    async fn home_directory(&self) -> AppResult<String> {
        dirs::home_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::NotFound("home directory".to_string()))
    }

    fn join_path(&self, segments: &[&str]) -> String {
        path::native::join(segments)
    }

    fn dirname(&self, path: &str) -> String {
        path::native::dirname(path)
    }

    fn basename(&self, path: &str) -> String {
        path::native::basename(path)
    }

    async fn test_connection(&self) -> bool {
        true
    }

    async fn disconnect(&self) -> AppResult<()> {
        Ok(())
    }
}
