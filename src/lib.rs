//! Fleetplane - validated, templated agent configuration with change fan-out
//!
//! The member crates do the work; this crate wires them together from a
//! [`FleetConfig`] and sets up logging.

pub mod config;
pub mod logging;

pub use config::{ChangesConfig, EventBusConfig, FleetConfig, LogFormat, LoggingConfig};
pub use logging::{init_logging, LOG_ENV};

use fleetplane_changes::{subscribe_changes, ChangeSource, ChangesOptions, ChangesSubscription};
use fleetplane_core::{Agent, Configuration, Resource};
use fleetplane_store::MemoryStore;
use std::sync::Arc;

/// A store plus the defaults its subscriptions are opened with.
pub struct FleetCore {
    config: FleetConfig,
    store: Arc<MemoryStore>,
}

impl FleetCore {
    pub fn new(config: FleetConfig) -> Self {
        let store = Arc::new(MemoryStore::with_capacity(config.eventbus.channel_capacity));
        tracing::info!(
            "Fleetplane core ready (channel capacity {}, batch size {})",
            config.eventbus.channel_capacity,
            config.changes.batch_size
        );
        Self { config, store }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Options pre-filled from the config; callers add query, selector, seed.
    pub fn changes_options(&self) -> ChangesOptions {
        self.config.changes_options()
    }

    /// Filtered changes to any stored resource kind. Must be called inside a
    /// tokio runtime.
    pub fn subscribe<R>(&self, options: ChangesOptions) -> fleetplane_changes::Result<ChangesSubscription<R>>
    where
        R: Resource,
        MemoryStore: ChangeSource<R>,
    {
        subscribe_changes(self.store.clone(), options)
    }

    pub fn agent_changes(&self, options: ChangesOptions) -> fleetplane_changes::Result<ChangesSubscription<Agent>> {
        self.subscribe(options)
    }

    pub fn configuration_changes(
        &self,
        options: ChangesOptions,
    ) -> fleetplane_changes::Result<ChangesSubscription<Configuration>> {
        self.subscribe(options)
    }
}

impl Default for FleetCore {
    fn default() -> Self {
        Self::new(FleetConfig::default())
    }
}
