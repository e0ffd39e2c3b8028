pub mod profiles;
pub mod settings;

pub use profiles::*;
pub use settings::*;

use crate::error::{AppError, AppResult};
use std::path::PathBuf;

/// Environment override for the config directory
pub const CONFIG_DIR_ENV: &str = "SFTP_EXPLORER_CONFIG_DIR";

/// `$SFTP_EXPLORER_CONFIG_DIR`, else `<config dir>/sftp-explorer`
pub fn get_config_dir() -> AppResult<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|base| base.join("sftp-explorer"))
        .ok_or_else(|| AppError::Config("No config directory for this user".to_string()))
}
