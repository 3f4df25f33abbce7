//! Transaction coordination.
//!
//! A [`Transaction`] opens a store transaction when it is created, collects
//! commands, and on [`Transaction::commit`] runs them in order against that
//! one view before committing atomically. The first failing command aborts
//! the batch and nothing is applied.
//!
//! A concurrent change to any column that was verified surfaces as
//! [`NbError::Conflict`]. The coordinator never replays commands on its
//! own; [`crate::NbApi::commit_with_retry`] rebuilds them from fresh state.

use crate::command::{Command, CommandResult, ExecContext};
use crate::error::{NbError, NbResult, TxnStatus};
use ovn_nb_store::{CommitStatus, RowStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// An ordered batch of commands applied atomically.
pub struct Transaction<S: RowStore> {
    store: Arc<S>,
    txn: S::Txn,
    commands: Vec<Command>,
    ctx: ExecContext,
    timeout: Option<Duration>,
    log_errors: bool,
}

impl<S: RowStore> Transaction<S> {
    pub(crate) fn new(
        store: Arc<S>,
        ctx: ExecContext,
        timeout: Option<Duration>,
        log_errors: bool,
    ) -> Self {
        let txn = store.begin();
        Self {
            store,
            txn,
            commands: Vec::new(),
            ctx,
            timeout,
            log_errors,
        }
    }

    /// Appends a command.
    pub fn add(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Appends several commands, in order.
    pub fn extend(&mut self, commands: impl IntoIterator<Item = Command>) -> &mut Self {
        self.commands.extend(commands);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Overrides the configured timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides whether definitive errors are logged at error level.
    pub fn log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = log_errors;
        self
    }

    /// Runs every command and commits.
    ///
    /// Returns one result per command, in order.
    #[instrument(skip_all, fields(commands = self.commands.len()))]
    pub async fn commit(self) -> NbResult<Vec<CommandResult>> {
        let Transaction {
            store,
            txn,
            commands,
            ctx,
            timeout,
            log_errors,
        } = self;

        let work = run_and_commit(store, txn, commands, ctx);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or(Err(NbError::Timeout(limit))),
            None => work.await,
        };

        match &result {
            Ok(results) => info!("Transaction committed ({} command(s))", results.len()),
            Err(e) => match e.status() {
                TxnStatus::Aborted => warn!("Transaction aborted: {}", e),
                _ if log_errors => error!("Transaction failed: {}", e),
                _ => debug!("Transaction failed: {}", e),
            },
        }
        result
    }
}

async fn run_and_commit<S: RowStore>(
    store: Arc<S>,
    mut txn: S::Txn,
    commands: Vec<Command>,
    ctx: ExecContext,
) -> NbResult<Vec<CommandResult>> {
    let mut results = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        debug!(index, "Running {}", command);
        results.push(command.run(&mut txn, &ctx)?);
    }

    match store.commit(txn).await? {
        CommitStatus::Success | CommitStatus::Unchanged => Ok(results),
        CommitStatus::Aborted => Err(NbError::Conflict),
    }
}
