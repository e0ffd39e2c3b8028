//! Caller-facing command surface.
//!
//! Requests and responses are closed sum types; every failure is turned into
//! [`Response::Error`] before it leaves this module.

use crate::config::{AuthMethod, ConnectionProfile};
use crate::error::{AppError, AppResult, SerializableError};
use crate::fs::{kind, BackendKind, FileEntry, FilesystemBackend};
use crate::ssh::{ConnectionCredentials, ConnectionTestResult, NewProfile, SessionInfo};
use crate::workspace::Workspace;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    GetHomeDirectory,
    #[serde(rename_all = "camelCase")]
    OpenDirectory {
        path: String,
        #[serde(default)]
        include_hidden: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    NavigateUp {
        current_path: String,
        #[serde(default)]
        include_hidden: Option<bool>,
    },
    ReadFile {
        path: String,
    },
    GetPreview {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Rename {
        path: String,
        new_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        path: String,
        is_directory: bool,
    },
    #[serde(rename_all = "camelCase")]
    CreateFile {
        dir_path: String,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    CreateFolder {
        dir_path: String,
        name: String,
    },
    ListConnections,
    #[serde(rename_all = "camelCase")]
    TestConnection {
        host: String,
        #[serde(default)]
        port: Option<u16>,
        username: String,
        auth_method: AuthMethod,
        #[serde(default)]
        credentials: ConnectionCredentials,
    },
    CreateConnection(NewProfile),
    Connect {
        id: String,
    },
    Disconnect {
        id: String,
    },
    DeleteConnection {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameConnection {
        id: String,
        new_name: String,
    },
    SwitchBackend {
        target: BackendKind,
        #[serde(default)]
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    HomeDirectory {
        path: String,
    },
    Directory {
        path: String,
        items: Vec<FileEntry>,
    },
    FileContents {
        path: String,
        base64: String,
    },
    #[serde(rename_all = "camelCase")]
    Preview {
        path: String,
        data_url: String,
    },
    Connections {
        profiles: Vec<ConnectionProfile>,
        sessions: Vec<SessionInfo>,
    },
    ConnectionTest(ConnectionTestResult),
    ConnectionCreated {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    BackendSwitched {
        backend: BackendKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Done,
    Error(SerializableError),
}

/// Run one command against the workspace.
pub async fn dispatch(workspace: &Workspace, command: Command) -> Response {
    match execute(workspace, command).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Command failed: {}", crate::logging::sanitize(&e.to_string()));
            Response::Error(SerializableError::from(&e))
        }
    }
}

async fn execute(workspace: &Workspace, command: Command) -> AppResult<Response> {
    let fs = workspace.backend();

    match command {
        Command::GetHomeDirectory => Ok(Response::HomeDirectory {
            path: fs.home_directory().await?,
        }),

        Command::OpenDirectory { path, include_hidden } => {
            let include_hidden = include_hidden.unwrap_or_else(|| workspace.show_hidden());
            let items = fs.list_directory(&path, include_hidden).await?;
            Ok(Response::Directory { path, items })
        }

        Command::NavigateUp {
            current_path,
            include_hidden,
        } => {
            let path = fs.parent_directory(&current_path);
            let include_hidden = include_hidden.unwrap_or_else(|| workspace.show_hidden());
            let items = fs.list_directory(&path, include_hidden).await?;
            Ok(Response::Directory { path, items })
        }

        Command::ReadFile { path } => {
            let contents = fs.read_file(&path).await?;
            Ok(Response::FileContents {
                base64: base64::engine::general_purpose::STANDARD.encode(contents),
                path,
            })
        }

        Command::GetPreview { path } => {
            let contents = fs.read_file(&path).await?;
            let data_url = format!(
                "data:{};base64,{}",
                kind::image_mime(&fs.basename(&path)),
                base64::engine::general_purpose::STANDARD.encode(contents)
            );
            Ok(Response::Preview { path, data_url })
        }

        Command::Rename { path, new_name } => {
            validate_name(fs.as_ref(), &new_name)?;
            let parent = fs.dirname(&path);
            let target = fs.join_path(&[parent.as_str(), new_name.as_str()]);
            fs.rename(&path, &target).await?;
            Ok(Response::Done)
        }

        Command::Delete { path, is_directory } => {
            fs.delete(&path, is_directory).await?;
            Ok(Response::Done)
        }

        Command::CreateFile { dir_path, name } => {
            validate_name(fs.as_ref(), &name)?;
            let target = fs.join_path(&[dir_path.as_str(), name.as_str()]);
            if fs.exists(&target).await {
                return Err(AppError::AlreadyExists(target));
            }
            fs.write_file(&target, &[]).await?;
            Ok(Response::Done)
        }

        Command::CreateFolder { dir_path, name } => {
            validate_name(fs.as_ref(), &name)?;
            let target = fs.join_path(&[dir_path.as_str(), name.as_str()]);
            if fs.exists(&target).await {
                return Err(AppError::AlreadyExists(target));
            }
            fs.mkdir(&target).await?;
            Ok(Response::Done)
        }

        Command::ListConnections => Ok(Response::Connections {
            profiles: workspace.registry.list_profiles(),
            sessions: workspace.registry.list_sessions(),
        }),

        Command::TestConnection {
            host,
            port,
            username,
            auth_method,
            credentials,
        } => {
            let port = port.unwrap_or_else(|| workspace.settings.read().ssh.default_port);
            let result = workspace
                .registry
                .test_connection(&host, port, &username, auth_method, credentials)
                .await;
            Ok(Response::ConnectionTest(result))
        }

        Command::CreateConnection(request) => Ok(Response::ConnectionCreated {
            id: workspace.registry.create_profile(request)?,
        }),

        Command::Connect { id } => {
            workspace.registry.connect(&id).await?;
            Ok(Response::Done)
        }

        Command::Disconnect { id } => {
            workspace.release_connection(&id);
            workspace.registry.disconnect(&id).await;
            Ok(Response::Done)
        }

        Command::DeleteConnection { id } => {
            workspace.release_connection(&id);
            workspace.registry.delete_profile(&id).await?;
            Ok(Response::Done)
        }

        Command::RenameConnection { id, new_name } => {
            workspace.registry.rename_profile(&id, &new_name)?;
            Ok(Response::Done)
        }

        Command::SwitchBackend { target, id } => {
            let backend = workspace.switch_backend(target, id.as_deref()).await?;
            Ok(Response::BackendSwitched {
                backend: backend.kind(),
                session_id: backend.session_id(),
            })
        }
    }
}

/// A single path component under the backend's own path rules.
fn validate_name(fs: &dyn FilesystemBackend, name: &str) -> AppResult<()> {
    if name.is_empty() || name == "." || name == ".." || fs.basename(name) != name {
        return Err(AppError::Config(format!("Invalid name: {:?}", name)));
    }
    Ok(())
}
