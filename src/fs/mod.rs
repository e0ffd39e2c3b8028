//! One filesystem contract over the local disk and remote SFTP sessions.

pub mod kind;
pub mod local;
pub mod path;
pub mod permissions;
pub mod remote;

pub use local::LocalBackend;
pub use permissions::{format_permissions, PermissionBits};
pub use remote::RemoteBackend;

use crate::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// One directory entry as shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    pub path: String,
    pub size: u64,
    /// Milliseconds since the epoch; 0 when unknown
    pub modified: i64,
    pub kind: String,
    pub is_image: bool,
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl FileEntry {
    /// Classify `name`; size and modified start at zero.
    pub fn new(name: impl Into<String>, path: impl Into<String>, is_directory: bool) -> Self {
        let name = name.into();
        Self {
            kind: kind::file_kind(&name, is_directory),
            is_image: kind::is_image(&name),
            is_hidden: kind::is_hidden(&name),
            path: path.into(),
            size: 0,
            modified: 0,
            permissions: None,
            is_directory,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    pub modified: i64,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

/// Keep hidden entries only when asked to.
pub fn filter_hidden(entries: Vec<FileEntry>, include_hidden: bool) -> Vec<FileEntry> {
    if include_hidden {
        entries
    } else {
        entries.into_iter().filter(|e| !e.is_hidden).collect()
    }
}

/// The uniform filesystem contract
#[async_trait]
pub trait FilesystemBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Backing connection id, if any
    fn session_id(&self) -> Option<String>;

    /// One level of `path`. A single unreadable entry never fails the listing.
    async fn list_directory(&self, path: &str, include_hidden: bool) -> AppResult<Vec<FileEntry>>;

    async fn read_file(&self, path: &str) -> AppResult<Vec<u8>>;

    async fn write_file(&self, path: &str, contents: &[u8]) -> AppResult<()>;

    async fn rename(&self, old_path: &str, new_path: &str) -> AppResult<()>;

    /// Directories are removed with everything below them.
    async fn delete(&self, path: &str, is_directory: bool) -> AppResult<()>;

    async fn mkdir(&self, path: &str) -> AppResult<()>;

    /// Never fails; anything that cannot be stat'ed does not exist.
    async fn exists(&self, path: &str) -> bool;

    async fn stat(&self, path: &str) -> AppResult<FileStat>;

    async fn home_directory(&self) -> AppResult<String>;

    fn parent_directory(&self, path: &str) -> String {
        self.dirname(path)
    }

    fn join_path(&self, segments: &[&str]) -> String;

    fn dirname(&self, path: &str) -> String;

    fn basename(&self, path: &str) -> String;

    async fn test_connection(&self) -> bool;

    async fn disconnect(&self) -> AppResult<()>;
}
