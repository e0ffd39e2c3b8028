pub mod commands;
pub mod config;
pub mod error;
pub mod fs;
pub mod keychain;
pub mod logging;
pub mod sftp;
pub mod ssh;
pub mod workspace;

pub use commands::{dispatch, Command, Response};
pub use error::{AppError, AppResult};
pub use workspace::Workspace;
