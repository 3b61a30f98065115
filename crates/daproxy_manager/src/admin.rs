//! Administrative command surface.

use crate::error::{ManagerError, ManagerResult};
use crate::manager::Manager;
use crate::secondary::TargetStats;
use daproxy_storage::{DaBackend, EphemeralConfig, EphemeralConfigPatch, EphemeralStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A command from the restricted admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Read the ephemeral store's behaviour knobs.
    GetEphemeralConfig,
    /// Patch the ephemeral store's behaviour knobs.
    PatchEphemeralConfig {
        /// Fields to change.
        patch: EphemeralConfigPatch,
    },
    /// Read the active dispersal backend.
    GetDispersalBackend,
    /// Switch the active dispersal backend.
    SetDispersalBackend {
        /// New backend.
        backend: DaBackend,
    },
    /// Read secondary target counters.
    GetTargetStats,
}

/// Reply to an [`AdminCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum AdminResponse {
    /// Current ephemeral configuration.
    EphemeralConfig {
        /// Configuration after the command.
        config: EphemeralConfig,
    },
    /// Current dispersal backend.
    DispersalBackend {
        /// Backend after the command.
        backend: DaBackend,
    },
    /// Secondary target counters.
    TargetStats {
        /// One entry per target.
        targets: Vec<TargetStats>,
    },
}

/// Dispatches admin commands.
#[derive(Debug, Clone)]
pub struct Admin {
    manager: Arc<Manager>,
    ephemeral: Option<Arc<EphemeralStore>>,
}

impl Admin {
    /// Creates a dispatcher; `ephemeral` is the store behind any memstores.
    pub fn new(manager: Arc<Manager>, ephemeral: Option<Arc<EphemeralStore>>) -> Self {
        Self { manager, ephemeral }
    }

    /// Handles one command.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::UnconfiguredBackend`] for ephemeral commands without
    ///   an ephemeral store, or for switching to a backend with no store
    pub fn handle(&self, command: AdminCommand) -> ManagerResult<AdminResponse> {
        match command {
            AdminCommand::GetEphemeralConfig => Ok(AdminResponse::EphemeralConfig {
                config: self.ephemeral()?.config(),
            }),
            AdminCommand::PatchEphemeralConfig { patch } => {
                let config = self.ephemeral()?.patch_config(&patch);
                Ok(AdminResponse::EphemeralConfig { config })
            }
            AdminCommand::GetDispersalBackend => Ok(AdminResponse::DispersalBackend {
                backend: self.manager.dispersal_backend(),
            }),
            AdminCommand::SetDispersalBackend { backend } => {
                self.manager.set_dispersal_backend(backend)?;
                info!(%backend, "dispersal backend set by admin");
                Ok(AdminResponse::DispersalBackend { backend })
            }
            AdminCommand::GetTargetStats => Ok(AdminResponse::TargetStats {
                targets: self.manager.secondary().stats(),
            }),
        }
    }

    fn ephemeral(&self) -> ManagerResult<&Arc<EphemeralStore>> {
        self.ephemeral
            .as_ref()
            .ok_or_else(|| ManagerError::UnconfiguredBackend("ephemeral store".into()))
    }
}
