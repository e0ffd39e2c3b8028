use crate::config::{self, AppSettings, ProfileCatalogue};
use crate::error::{AppError, AppResult};
use crate::fs::{BackendKind, FilesystemBackend, LocalBackend, RemoteBackend};
use crate::keychain::CredentialStore;
use crate::sftp::Ssh2Connector;
use crate::ssh::ConnectionRegistry;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Explicit application context: the registry plus exactly one active backend.
pub struct Workspace {
    pub registry: Arc<ConnectionRegistry>,
    pub settings: Arc<RwLock<AppSettings>>,
    active: RwLock<Arc<dyn FilesystemBackend>>,
}

impl Workspace {
    pub fn new(registry: Arc<ConnectionRegistry>, settings: AppSettings) -> Self {
        Self {
            registry,
            settings: Arc::new(RwLock::new(settings)),
            active: RwLock::new(Arc::new(LocalBackend::new())),
        }
    }

    /// Load settings, profiles and the secret store from `config_dir`.
    pub fn open(config_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(config_dir)?;

        let settings = AppSettings::load(config_dir)?;
        let catalogue = ProfileCatalogue::load(config_dir)?;
        let credentials = CredentialStore::from_settings(
            settings.security.secret_store,
            &settings.security.credential_namespace,
            config_dir,
        );

        let registry = ConnectionRegistry::new(
            catalogue,
            credentials,
            Arc::new(Ssh2Connector),
            settings.ssh.connect_settings(),
        )
        .with_default_port(settings.ssh.default_port);

        tracing::info!("Workspace loaded from {:?}", config_dir);
        Ok(Self::new(Arc::new(registry), settings))
    }

    /// `open` against the default config directory.
    pub fn open_default() -> AppResult<Self> {
        Self::open(&config::get_config_dir()?)
    }

    pub fn backend(&self) -> Arc<dyn FilesystemBackend> {
        self.active.read().clone()
    }

    pub fn show_hidden(&self) -> bool {
        self.settings.read().explorer.show_hidden
    }

    /// Make `target` the active backend. Remote targets connect first, so a
    /// failed connect leaves the previous backend active.
    pub async fn switch_backend(
        &self,
        target: BackendKind,
        id: Option<&str>,
    ) -> AppResult<Arc<dyn FilesystemBackend>> {
        let backend: Arc<dyn FilesystemBackend> = match target {
            BackendKind::Local => Arc::new(LocalBackend::new()),
            BackendKind::Remote => {
                let id = id.ok_or_else(|| {
                    AppError::Config("A connection id is required for a remote backend".to_string())
                })?;
                let session = self.registry.connect(id).await?;
                Arc::new(RemoteBackend::new(session))
            }
        };

        *self.active.write() = backend.clone();
        tracing::info!("Active backend is now {}", target);
        Ok(backend)
    }

    /// Fall back to local if the active backend runs on connection `id`.
    pub fn release_connection(&self, id: &str) {
        let mut active = self.active.write();
        if active.session_id().as_deref() == Some(id) {
            *active = Arc::new(LocalBackend::new());
            tracing::info!("Connection {} closed; active backend is now local", id);
        }
    }

    /// Close every live session.
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
    }
}
