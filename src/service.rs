use crate::application::engine::DialogEngine;
use crate::config::Settings;
use crate::domain::ports::{ClockRef, SessionStoreRef};
use crate::error::Result;
use crate::infrastructure::in_memory::InMemorySessionStore;
use crate::infrastructure::marketplace::Marketplace;
use crate::infrastructure::sweeper::spawn_sweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A wired engine plus the handles the transports need around it.
pub struct Service {
    engine: Arc<DialogEngine>,
    sessions: SessionStoreRef,
    clock: ClockRef,
    sweep_interval: Duration,
}

impl Service {
    /// Loads the marketplace named by `settings` and builds in-memory stores
    /// around it.
    pub fn from_settings(settings: &Settings, clock: ClockRef) -> Result<Self> {
        settings.validate()?;
        let marketplace = match &settings.data_path {
            Some(path) => Marketplace::load(path)?,
            None => Marketplace::bundled()?,
        };
        tracing::info!(
            stores = marketplace.catalog.stores().len(),
            callers = marketplace.balances.len(),
            "Marketplace loaded"
        );

        let sessions: SessionStoreRef = Arc::new(InMemorySessionStore::new(
            clock.clone(),
            settings.session.timeout(),
        ));
        let ledger = Arc::new(marketplace.ledger(clock.clone()));
        let engine = DialogEngine::new(
            sessions.clone(),
            ledger,
            Arc::new(marketplace.catalog),
            Arc::new(marketplace.directory),
            clock.clone(),
            settings.dialog.clone(),
        );

        Ok(Self {
            engine: Arc::new(engine),
            sessions,
            clock,
            sweep_interval: settings.session.sweep_interval(),
        })
    }

    pub fn engine(&self) -> Arc<DialogEngine> {
        self.engine.clone()
    }

    /// Starts evicting idle sessions in the background.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(self.sessions.clone(), self.clock.clone(), self.sweep_interval)
    }
}
