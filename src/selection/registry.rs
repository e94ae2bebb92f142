//! Agent registry seam
//!
//! The registry is the static configuration of known agents, loaded once at
//! process start. An empty or unreadable registry is the one error allowed
//! to halt startup. Write-back of updated profiles is best-effort; the
//! selector logs and continues when it fails.

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::AgentProfile;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent registry is empty")]
    EmptyRegistry,

    #[error("invalid agent profile {id}: {reason}")]
    InvalidProfile { id: String, reason: String },

    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to persist profile: {0}")]
    Persist(String),
}

/// Source of agent profiles and sink for their updated bookkeeping.
#[async_trait]
pub trait AgentRegistry: Send + Sync + std::fmt::Debug {
    /// Load the full set of known agents. Called once at startup.
    fn load(&self) -> Result<Vec<AgentProfile>, RegistryError>;

    /// Write back an updated profile. Best-effort; callers log failures and
    /// continue.
    async fn persist(&self, profile: &AgentProfile) -> Result<(), RegistryError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    agents: Vec<AgentProfile>,
}

/// Registry backed by a static TOML file of `[[agents]]` tables.
#[derive(Debug)]
pub struct TomlAgentRegistry {
    path: PathBuf,
}

impl TomlAgentRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(&self) -> Result<RegistryFile, RegistryError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| RegistryError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| RegistryError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[async_trait]
impl AgentRegistry for TomlAgentRegistry {
    fn load(&self) -> Result<Vec<AgentProfile>, RegistryError> {
        let file = self.read_file()?;
        if file.agents.is_empty() {
            return Err(RegistryError::EmptyRegistry);
        }
        for profile in &file.agents {
            if profile.id.is_empty() {
                return Err(RegistryError::InvalidProfile {
                    id: profile.name.clone(),
                    reason: "missing id".to_string(),
                });
            }
        }
        debug!(count = file.agents.len(), path = %self.path.display(), "agent registry loaded");
        Ok(file.agents)
    }

    async fn persist(&self, profile: &AgentProfile) -> Result<(), RegistryError> {
        let mut file = self.read_file()?;
        match file.agents.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => file.agents.push(profile.clone()),
        }
        let raw = toml::to_string(&file).map_err(|e| RegistryError::Persist(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| RegistryError::Persist(e.to_string()))?;
        Ok(())
    }
}

/// In-memory registry for tests and embedded deployments. Unlike the file
/// registry it tolerates an empty agent set; the selector falls back to a
/// synthesized default agent in that case.
#[derive(Debug, Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<Vec<AgentProfile>>,
}

impl InMemoryAgentRegistry {
    pub fn new(agents: Vec<AgentProfile>) -> Self {
        Self {
            agents: RwLock::new(agents),
        }
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    fn load(&self) -> Result<Vec<AgentProfile>, RegistryError> {
        Ok(self.agents.read().unwrap().clone())
    }

    async fn persist(&self, profile: &AgentProfile) -> Result<(), RegistryError> {
        let mut agents = self.agents.write().unwrap();
        match agents.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => agents.push(profile.clone()),
        }
        Ok(())
    }
}
