//! DispatcherCell - construct-once shared dispatcher
//!
//! Created explicitly and passed to producers (usually behind an `Arc`);
//! there is no process-global instance.

use std::sync::Arc;

use contracts::{ContractError, DispatchConfig, Transport};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::error::DispatchError;

/// Holder that starts one dispatcher on first use and shares it afterwards
pub struct DispatcherCell<D> {
    inner: OnceCell<Arc<Dispatcher<D>>>,
}

impl<D> Default for DispatcherCell<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DispatcherCell<D> {
    /// Create an empty cell
    pub const fn new() -> Self {
        Self {
            inner: OnceCell::const_new(),
        }
    }

    /// The shared dispatcher, if it has been started
    pub fn get(&self) -> Option<Arc<Dispatcher<D>>> {
        self.inner.get().cloned()
    }
}

impl<D> DispatcherCell<D>
where
    D: Serialize + Send + 'static,
{
    /// Start the dispatcher on first call, return the shared instance after
    ///
    /// `transport` is only invoked by the call that actually constructs.
    /// Concurrent first calls wait for that construction.
    ///
    /// # Errors
    /// - `DispatchError::Config` if construction fails (the cell stays empty)
    /// - `DispatchError::ConfigConflict` if already started with another config
    pub async fn get_or_start<T, F>(
        &self,
        config: DispatchConfig,
        transport: F,
    ) -> Result<Arc<Dispatcher<D>>, DispatchError>
    where
        T: Transport + Send + Sync + 'static,
        F: FnOnce() -> Result<T, ContractError>,
    {
        self.get_or_start_with(config, |builder| builder.start(transport()?))
            .await
    }

    /// Like [`get_or_start`](Self::get_or_start), with full control over the builder
    pub async fn get_or_start_with<B>(
        &self,
        config: DispatchConfig,
        build: B,
    ) -> Result<Arc<Dispatcher<D>>, DispatchError>
    where
        B: FnOnce(DispatcherBuilder<D>) -> Result<Dispatcher<D>, DispatchError>,
    {
        let init = {
            let config = config.clone();
            move || async move {
                let dispatcher = build(DispatcherBuilder::new(config))?;
                info!(
                    count = dispatcher.config().rate_limit.count,
                    interval_ms = dispatcher.config().rate_limit.interval_ms,
                    "Shared dispatcher constructed"
                );
                Ok::<_, DispatchError>(Arc::new(dispatcher))
            }
        };
        let dispatcher = self.inner.get_or_try_init(init).await?;

        if dispatcher.config() != &config {
            warn!("Shared dispatcher requested with a different configuration");
            return Err(DispatchError::config_conflict(&dispatcher.config().rate_limit));
        }
        Ok(Arc::clone(dispatcher))
    }
}
