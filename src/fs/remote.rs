use super::{filter_hidden, path::posix, BackendKind, FileEntry, FileStat, FilesystemBackend, PermissionBits};
use crate::error::AppResult;
use crate::ssh::{ConnectionSession, RemoteAttrs, SftpTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A directory tree behind one SFTP session.
///
/// Every call borrows the session's transport for its own duration only,
/// so a health failure surfaces as `StaleConnection` on the next call.
pub struct RemoteBackend {
    session: Arc<ConnectionSession>,
    home: OnceCell<String>,
}

impl RemoteBackend {
    pub fn new(session: Arc<ConnectionSession>) -> Self {
        Self {
            session,
            home: OnceCell::new(),
        }
    }

    pub fn session(&self) -> &Arc<ConnectionSession> {
        &self.session
    }

    async fn resolve_home(&self) -> AppResult<String> {
        let sftp = self.session.transport()?;

        match sftp.realpath("~").await {
            Ok(home) if !home.is_empty() && is_dir(sftp.as_ref(), &home).await => return Ok(home),
            Ok(home) => tracing::debug!("Ignoring unusable home {:?}", home),
            Err(e) => tracing::debug!("Could not resolve ~: {}", e),
        }

        let candidates = [
            format!("/home/{}", self.session.username()),
            "/root".to_string(),
            "/home".to_string(),
        ];
        for candidate in candidates {
            if is_dir(sftp.as_ref(), &candidate).await {
                return Ok(candidate);
            }
        }
        Ok("/".to_string())
    }
}

async fn is_dir(sftp: &dyn SftpTransport, path: &str) -> bool {
    matches!(sftp.stat(path).await, Ok(attrs) if attrs.is_dir)
}

fn to_millis(attrs: &RemoteAttrs) -> i64 {
    attrs.mtime.map(|secs| secs as i64 * 1000).unwrap_or(0)
}

fn permissions_of(attrs: &RemoteAttrs) -> String {
    super::format_permissions(attrs.perm.map(PermissionBits::from_mode), attrs.is_dir)
}

#[async_trait]
impl FilesystemBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn session_id(&self) -> Option<String> {
        Some(self.session.id().to_string())
    }

    async fn list_directory(&self, dir: &str, include_hidden: bool) -> AppResult<Vec<FileEntry>> {
        let sftp = self.session.transport()?;
        let listing = sftp.read_dir(dir).await?;

        let entries = listing
            .into_iter()
            .filter(|e| e.name != "." && e.name != "..")
            .map(|e| {
                let entry_path = posix::join(&[dir, e.name.as_str()]);
                let mut entry = FileEntry::new(e.name, entry_path, e.attrs.is_dir);
                entry.size = e.attrs.size.unwrap_or(0);
                entry.modified = to_millis(&e.attrs);
                entry.permissions = Some(permissions_of(&e.attrs));
                entry
            })
            .collect();

        Ok(filter_hidden(entries, include_hidden))
    }

    async fn read_file(&self, path: &str) -> AppResult<Vec<u8>> {
        self.session.transport()?.read(path).await
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> AppResult<()> {
        self.session.transport()?.write(path, contents.to_vec()).await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> AppResult<()> {
        self.session.transport()?.rename(old_path, new_path).await
    }

    async fn delete(&self, path: &str, is_directory: bool) -> AppResult<()> {
        let sftp = self.session.transport()?;
        if !is_directory {
            return sftp.remove_file(path).await;
        }

        // Walk the tree iteratively; parents are recorded before children
        let mut pending = vec![path.to_string()];
        let mut dirs = Vec::new();
        while let Some(dir) = pending.pop() {
            for entry in sftp.read_dir(&dir).await? {
                let child = posix::join(&[dir.as_str(), entry.name.as_str()]);
                if entry.attrs.is_dir {
                    pending.push(child);
                } else {
                    sftp.remove_file(&child).await?;
                }
            }
            dirs.push(dir);
        }
        for dir in dirs.iter().rev() {
            sftp.remove_dir(dir).await?;
        }
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> AppResult<()> {
        self.session.transport()?.mkdir(path).await
    }

    async fn exists(&self, path: &str) -> bool {
        match self.session.transport() {
            Ok(sftp) => sftp.stat(path).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn stat(&self, path: &str) -> AppResult<FileStat> {
        let attrs = self.session.transport()?.stat(path).await?;
        Ok(FileStat {
            size: attrs.size.unwrap_or(0),
            modified: to_millis(&attrs),
            is_directory: attrs.is_dir,
            permissions: Some(permissions_of(&attrs)),
        })
    }

    async fn home_directory(&self) -> AppResult<String> {
        self.home
            .get_or_try_init(|| self.resolve_home())
            .await
            .cloned()
    }

    fn join_path(&self, segments: &[&str]) -> String {
        posix::join(segments)
    }

    fn dirname(&self, path: &str) -> String {
        posix::dirname(path)
    }

    fn basename(&self, path: &str) -> String {
        posix::basename(path)
    }

    async fn test_connection(&self) -> bool {
        self.session.is_healthy().await
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.session.disconnect().await;
        Ok(())
    }
}
