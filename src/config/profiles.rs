use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a profile authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    Key,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password => write!(f, "password"),
            AuthMethod::Key => write!(f, "key"),
        }
    }
}

/// Connection profile. Holds no secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub auth_method: AuthMethod,
    #[serde(default)]
    pub save_credentials: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

fn default_port() -> u16 {
    22
}

/// Profile file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: Vec<ConnectionProfile>,
}

/// Durable, ordered catalogue of connection profiles
pub struct ProfileCatalogue {
    profiles: Vec<ConnectionProfile>,
    config_path: PathBuf,
}

impl ProfileCatalogue {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("profiles.toml");
        let profiles = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file: ProfilesFile = toml::from_str(&content)?;
            file.profiles
        } else {
            Vec::new()
        };

        Ok(Self {
            profiles,
            config_path,
        })
    }

    pub fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ProfilesFile {
            profiles: self.profiles.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    pub fn list(&self) -> Vec<ConnectionProfile> {
        self.profiles.clone()
    }

    pub fn get(&self, id: &str) -> Option<ConnectionProfile> {
        self.profiles.iter().find(|p| p.id == id).cloned()
    }

    pub fn add(&mut self, profile: ConnectionProfile) -> AppResult<()> {
        if self.profiles.iter().any(|p| p.id == profile.id) {
            return Err(AppError::AlreadyExists(format!("profile {}", profile.id)));
        }
        self.profiles.push(profile);
        self.save()
    }

    pub fn rename(&mut self, id: &str, new_name: &str) -> AppResult<()> {
        let profile = self
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))?;
        profile.name = new_name.to_string();
        self.save()
    }

    /// Removes the profile; returns whether it existed.
    pub fn remove(&mut self, id: &str) -> AppResult<bool> {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.id != id);
        if self.profiles.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}
