//! In-memory test environment.

use ovn_nb_cmd::{Command, CommandResult, NbApi, NbConfig, NbResult};
use ovn_nb_store::MemoryStore;
use std::sync::Arc;
use tracing::debug;

/// A fresh in-memory row store with an API bound to it.
pub struct NbTestEnv {
    pub store: Arc<MemoryStore>,
    pub api: NbApi<MemoryStore>,
}

impl NbTestEnv {
    /// Empty store, default configuration.
    pub fn new() -> Self {
        Self::with_config(NbConfig::default())
    }

    pub fn with_config(config: NbConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let api = NbApi::with_config(Arc::clone(&store), config);
        Self { store, api }
    }

    /// Commits `commands` as one transaction.
    pub async fn apply(&self, commands: Vec<Command>) -> NbResult<Vec<CommandResult>> {
        debug!("Applying {} test command(s)", commands.len());
        let mut txn = self.api.transaction();
        txn.extend(commands);
        txn.commit().await
    }

    /// Commits one command.
    pub async fn apply_one(&self, command: Command) -> NbResult<CommandResult> {
        self.api.execute(command).await
    }
}

impl Default for NbTestEnv {
    fn default() -> Self {
        Self::new()
    }
}
