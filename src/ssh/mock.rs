//! In-memory connector and transport for tests.

use super::transport::{ConnectParams, Connector, RemoteAttrs, RemoteDirEntry, SftpTransport};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const MOCK_MTIME: u64 = 1_700_000_000;

#[derive(Debug, Clone, Copy)]
pub(crate) enum FailKind {
    Auth,
    Network,
}

enum Node {
    Dir,
    File(Vec<u8>),
}

/// Remote tree shared by every transport a connector hands out
pub(crate) struct MockFs {
    nodes: Mutex<BTreeMap<String, Node>>,
    healthy: AtomicBool,
    home: Mutex<Option<String>>,
    closes: AtomicUsize,
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

impl MockFs {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        for dir in ["/", "/home", "/home/deploy"] {
            nodes.insert(dir.to_string(), Node::Dir);
        }
        Self {
            nodes: Mutex::new(nodes),
            healthy: AtomicBool::new(true),
            home: Mutex::new(Some("/home/deploy".to_string())),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn add_dir(&self, path: &str) {
        self.nodes.lock().insert(path.to_string(), Node::Dir);
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.nodes.lock().insert(path.to_string(), Node::File(contents.to_vec()));
    }

    /// Drop a path and everything below it.
    pub fn remove_tree(&self, path: &str) {
        let prefix = format!("{}/", path);
        self.nodes
            .lock()
            .retain(|k, _| k != path && !k.starts_with(&prefix));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.lock().contains_key(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.lock().get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// What `realpath("~")` resolves to; `None` makes it fail.
    pub fn set_home(&self, home: Option<&str>) {
        *self.home.lock() = home.map(str::to_string);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn attrs(node: &Node) -> RemoteAttrs {
        match node {
            Node::Dir => RemoteAttrs {
                size: Some(4096),
                mtime: Some(MOCK_MTIME),
                perm: Some(0o40755),
                is_dir: true,
            },
            Node::File(data) => RemoteAttrs {
                size: Some(data.len() as u64),
                mtime: Some(MOCK_MTIME),
                perm: Some(0o100644),
                is_dir: false,
            },
        }
    }

    fn require_dir(nodes: &BTreeMap<String, Node>, path: &str) -> AppResult<()> {
        match nodes.get(path) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(AppError::Sftp(format!("{} is not a directory", path))),
            None => Err(AppError::NotFound(path.to_string())),
        }
    }
}

pub(crate) struct MockTransport {
    fs: Arc<MockFs>,
    closed: AtomicBool,
}

impl MockTransport {
    fn check(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) || !self.fs.healthy.load(Ordering::SeqCst) {
            return Err(AppError::Sftp("channel closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SftpTransport for MockTransport {
    async fn realpath(&self, path: &str) -> AppResult<String> {
        self.check()?;
        match path {
            "~" => self
                .fs
                .home
                .lock()
                .clone()
                .ok_or_else(|| AppError::Sftp("no such file".to_string())),
            "." => Ok(self.fs.home.lock().clone().unwrap_or_else(|| "/".to_string())),
            other if self.fs.contains(other) => Ok(other.to_string()),
            other => Err(AppError::NotFound(other.to_string())),
        }
    }

    async fn stat(&self, path: &str) -> AppResult<RemoteAttrs> {
        self.check()?;
        self.fs
            .nodes
            .lock()
            .get(path)
            .map(MockFs::attrs)
            .ok_or_else(|| AppError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, path: &str) -> AppResult<Vec<RemoteDirEntry>> {
        self.check()?;
        let nodes = self.fs.nodes.lock();
        MockFs::require_dir(&nodes, path)?;
        Ok(nodes
            .iter()
            .filter(|(k, _)| k.as_str() != path && parent_of(k) == path)
            .map(|(k, node)| RemoteDirEntry {
                name: k.rsplit('/').next().unwrap_or_default().to_string(),
                attrs: MockFs::attrs(node),
            })
            .collect())
    }

    async fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        self.check()?;
        match self.fs.nodes.lock().get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(AppError::Sftp(format!("{} is a directory", path))),
            None => Err(AppError::NotFound(path.to_string())),
        }
    }

    async fn write(&self, path: &str, contents: Vec<u8>) -> AppResult<()> {
        self.check()?;
        let mut nodes = self.fs.nodes.lock();
        MockFs::require_dir(&nodes, &parent_of(path))?;
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(AppError::Sftp(format!("{} is a directory", path)));
        }
        nodes.insert(path.to_string(), Node::File(contents));
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        self.check()?;
        let mut nodes = self.fs.nodes.lock();
        if !nodes.contains_key(from) {
            return Err(AppError::NotFound(from.to_string()));
        }
        MockFs::require_dir(&nodes, &parent_of(to))?;

        let prefix = format!("{}/", from);
        let moved: Vec<String> = nodes
            .keys()
            .filter(|k| k.as_str() == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = nodes.remove(&key) {
                let new_key = format!("{}{}", to, &key[from.len()..]);
                nodes.insert(new_key, node);
            }
        }
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> AppResult<()> {
        self.check()?;
        let mut nodes = self.fs.nodes.lock();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(AppError::Sftp(format!("{} is a directory", path))),
            None => Err(AppError::NotFound(path.to_string())),
        }
    }

    async fn remove_dir(&self, path: &str) -> AppResult<()> {
        self.check()?;
        let mut nodes = self.fs.nodes.lock();
        MockFs::require_dir(&nodes, path)?;
        if nodes.keys().any(|k| k.as_str() != path && parent_of(k) == path) {
            return Err(AppError::Sftp(format!("{} is not empty", path)));
        }
        nodes.remove(path);
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> AppResult<()> {
        self.check()?;
        let mut nodes = self.fs.nodes.lock();
        MockFs::require_dir(&nodes, &parent_of(path))?;
        if nodes.contains_key(path) {
            return Err(AppError::Sftp(format!("{} already exists", path)));
        }
        nodes.insert(path.to_string(), Node::Dir);
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.fs.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Connector that counts attempts and can be told to fail
pub(crate) struct MockConnector {
    fs: Arc<MockFs>,
    opens: AtomicUsize,
    failures: Mutex<VecDeque<FailKind>>,
    last_params: Mutex<Option<ConnectParams>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fs: Arc::new(MockFs::new()),
            opens: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            last_params: Mutex::new(None),
        })
    }

    pub fn fs(&self) -> Arc<MockFs> {
        self.fs.clone()
    }

    /// Fail the next `times` open attempts.
    pub fn fail_next(&self, kind: FailKind, times: usize) {
        let mut failures = self.failures.lock();
        for _ in 0..times {
            failures.push_back(kind);
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.fs.closes.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<ConnectParams> {
        self.last_params.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, params: &ConnectParams) -> AppResult<Arc<dyn SftpTransport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = Some(params.clone());

        let failure = self.failures.lock().pop_front();
        match failure {
            Some(FailKind::Auth) => Err(AppError::Auth("Password authentication failed".to_string())),
            Some(FailKind::Network) => Err(AppError::Network("connection refused".to_string())),
            None => Ok(Arc::new(MockTransport {
                fs: self.fs.clone(),
                closed: AtomicBool::new(false),
            })),
        }
    }
}
