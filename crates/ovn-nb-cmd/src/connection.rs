//! Lazily established shared row store handle.

use crate::error::NbResult;
use ovn_nb_store::RowStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// A row store handle established on first use and shared afterwards.
///
/// Concurrent first callers wait for a single connection attempt. A failed
/// attempt leaves the cell empty so a later caller can try again.
pub struct NbConnection<S> {
    cell: OnceCell<Arc<S>>,
}

impl<S: RowStore> NbConnection<S> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// Returns the shared handle, running `connect` if none exists yet.
    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> NbResult<Arc<S>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = NbResult<S>>,
    {
        let store = self
            .cell
            .get_or_try_init(|| async {
                let store = connect().await?;
                info!("Row store connection established");
                Ok::<_, crate::error::NbError>(Arc::new(store))
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// Returns the handle if already established.
    pub fn get(&self) -> Option<Arc<S>> {
        self.cell.get().cloned()
    }
}

impl<S: RowStore> Default for NbConnection<S> {
    fn default() -> Self {
        Self::new()
    }
}
