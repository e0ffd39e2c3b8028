//! libssh2-backed transport.
//!
//! `ssh2` is blocking, so every call runs on the blocking pool behind a
//! mutex; the async side only ever sees [`SftpTransport`].

mod key_file;

pub use key_file::ScopedKeyFile;

use crate::error::{AppError, AppResult};
use crate::ssh::{AuthCredential, ConnectParams, Connector, RemoteAttrs, RemoteDirEntry, SftpTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use ssh2::{ErrorCode, FileStat, HostKeyType, Session as Ssh2Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;

/// SSH_FX_NO_SUCH_FILE
const FX_NO_SUCH_FILE: i32 = 2;

/// Opens [`SftpConnection`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

#[async_trait]
impl Connector for Ssh2Connector {
    async fn open(&self, params: &ConnectParams) -> AppResult<Arc<dyn SftpTransport>> {
        let params = params.clone();
        let conn = tokio::task::spawn_blocking(move || SftpConnection::connect(&params)).await??;
        Ok(Arc::new(conn))
    }
}

struct Ssh2Inner {
    sftp: Sftp,
    session: Ssh2Session,
}

/// An active SFTP connection
pub struct SftpConnection {
    host: String,
    inner: Arc<Mutex<Option<Ssh2Inner>>>,
}

impl SftpConnection {
    /// Connect, authenticate and open the SFTP subsystem. Blocking.
    pub fn connect(params: &ConnectParams) -> AppResult<Self> {
        let tcp = connect_tcp(&params.host, params.port, params.timeout)?;
        tcp.set_read_timeout(Some(params.timeout))
            .and_then(|_| tcp.set_write_timeout(Some(params.timeout)))
            .map_err(|e| AppError::Network(format!("Failed to configure socket: {}", e)))?;

        let mut session = Ssh2Session::new()
            .map_err(|e| AppError::Network(format!("Failed to create session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(params.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| AppError::Network(format!("SSH handshake failed: {}", e)))?;

        if let Some((key, key_type)) = session.host_key() {
            tracing::debug!(
                "Host key for {}:{}: {} {}",
                params.host,
                params.port,
                host_key_type_name(key_type),
                compute_sha256_fingerprint(key)
            );
        }

        authenticate(&session, &params.username, &params.auth)?;

        let sftp = session
            .sftp()
            .map_err(|e| AppError::Sftp(format!("Failed to open SFTP: {}", e)))?;

        tracing::debug!("SFTP subsystem open on {}:{}", params.host, params.port);
        Ok(Self {
            host: params.host.clone(),
            inner: Arc::new(Mutex::new(Some(Ssh2Inner { sftp, session }))),
        })
    }

    async fn with_sftp<F, T>(&self, op: F) -> AppResult<T>
    where
        F: FnOnce(&Sftp) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        let host = self.host.clone();
        tokio::task::spawn_blocking(move || {
            let guard = inner.lock();
            let conn = guard.as_ref().ok_or(AppError::NotConnected(host))?;
            op(&conn.sftp)
        })
        .await?
    }
}

#[async_trait]
impl SftpTransport for SftpConnection {
    async fn realpath(&self, path: &str) -> AppResult<String> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.realpath(Path::new(&path))
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|e| sftp_error("resolve", &path, e))
        })
        .await
    }

    async fn stat(&self, path: &str) -> AppResult<RemoteAttrs> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.stat(Path::new(&path))
                .map(|stat| attrs_from(&stat))
                .map_err(|e| sftp_error("stat", &path, e))
        })
        .await
    }

    async fn read_dir(&self, path: &str) -> AppResult<Vec<RemoteDirEntry>> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let entries = sftp
                .readdir(Path::new(&path))
                .map_err(|e| sftp_error("list", &path, e))?;
            Ok(entries
                .into_iter()
                .filter_map(|(entry_path, stat)| {
                    let name = entry_path.file_name()?.to_string_lossy().into_owned();
                    if name == "." || name == ".." {
                        return None;
                    }
                    Some(RemoteDirEntry {
                        name,
                        attrs: attrs_from(&stat),
                    })
                })
                .collect())
        })
        .await
    }

    async fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let mut file = sftp
                .open(Path::new(&path))
                .map_err(|e| sftp_error("open", &path, e))?;
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .map_err(|e| AppError::Sftp(format!("Failed to read {}: {}", path, e)))?;
            Ok(contents)
        })
        .await
    }

    async fn write(&self, path: &str, contents: Vec<u8>) -> AppResult<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            let mut file = sftp
                .create(Path::new(&path))
                .map_err(|e| sftp_error("create", &path, e))?;
            file.write_all(&contents)
                .map_err(|e| AppError::Sftp(format!("Failed to write {}: {}", path, e)))?;
            Ok(())
        })
        .await
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.with_sftp(move |sftp| {
            sftp.rename(Path::new(&from), Path::new(&to), None)
                .map_err(|e| sftp_error("rename", &from, e))
        })
        .await
    }

    async fn remove_file(&self, path: &str) -> AppResult<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.unlink(Path::new(&path))
                .map_err(|e| sftp_error("delete", &path, e))
        })
        .await
    }

    async fn remove_dir(&self, path: &str) -> AppResult<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.rmdir(Path::new(&path))
                .map_err(|e| sftp_error("remove directory", &path, e))
        })
        .await
    }

    async fn mkdir(&self, path: &str) -> AppResult<()> {
        let path = path.to_string();
        self.with_sftp(move |sftp| {
            sftp.mkdir(Path::new(&path), 0o755)
                .map_err(|e| sftp_error("create directory", &path, e))
        })
        .await
    }

    async fn close(&self) -> AppResult<()> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            if let Some(Ssh2Inner { sftp, session }) = inner.lock().take() {
                drop(sftp);
                if let Err(e) = session.disconnect(None, "closing", None) {
                    tracing::debug!("SSH disconnect returned: {}", e);
                }
            }
        })
        .await?;
        Ok(())
    }
}

/// First resolved address that accepts within `timeout` wins.
fn connect_tcp(host: &str, port: u16, timeout: std::time::Duration) -> AppResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| AppError::Network(format!("Could not resolve {}: {}", host, e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(AppError::Network(match last_error {
        Some(e) => format!("TCP connect failed: {}", e),
        None => format!("No addresses found for {}", host),
    }))
}

fn authenticate(session: &Ssh2Session, username: &str, auth: &AuthCredential) -> AppResult<()> {
    match auth {
        AuthCredential::Password(password) => {
            session
                .userauth_password(username, password)
                .map_err(|_| AppError::Auth("Password authentication failed".to_string()))?;
        }
        AuthCredential::PrivateKey { key, passphrase } => {
            let key_file = ScopedKeyFile::write(key)?;
            session
                .userauth_pubkey_file(username, None, key_file.path(), passphrase.as_deref())
                .map_err(|e| classify_key_error(&e))?;
        }
    }

    if !session.authenticated() {
        return Err(AppError::Auth("Authentication failed".to_string()));
    }
    Ok(())
}

fn classify_key_error(err: &ssh2::Error) -> AppError {
    let msg = err.to_string().to_lowercase();
    if msg.contains("passphrase") || msg.contains("decrypt") || msg.contains("parse") {
        AppError::Auth(
            "Invalid passphrase or key format. Ensure the key is in PEM or OpenSSH format.".to_string(),
        )
    } else if msg.contains("denied") || msg.contains("auth") {
        AppError::Auth("Private key not accepted by server".to_string())
    } else {
        AppError::Auth("Private key authentication failed".to_string())
    }
}

fn sftp_error(action: &str, path: &str, err: ssh2::Error) -> AppError {
    match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) => AppError::NotFound(path.to_string()),
        _ => AppError::Sftp(format!("Failed to {} {}: {}", action, path, err)),
    }
}

fn attrs_from(stat: &FileStat) -> RemoteAttrs {
    RemoteAttrs {
        size: stat.size,
        mtime: stat.mtime,
        perm: stat.perm,
        is_dir: stat.is_dir(),
    }
}

fn host_key_type_name(key_type: HostKeyType) -> &'static str {
    match key_type {
        HostKeyType::Rsa => "ssh-rsa",
        HostKeyType::Dss => "ssh-dss",
        HostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
        HostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
        HostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
        HostKeyType::Ed25519 => "ssh-ed25519",
        _ => "unknown",
    }
}

/// Compute SHA256 fingerprint of a key
fn compute_sha256_fingerprint(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    let result = hasher.finalize();

    let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, result);
    format!("SHA256:{}", b64.trim_end_matches('='))
}
