//! Wiring shared by every command: store, queue, reconciler and scanner

use anyhow::{Context, Result};
use declarative::{
    ObservedState, PlanContext, ReconciliationEngine, ResourceStateStore, SharedQueue,
    WantedState, queue,
};
use shellkit::OutputBus;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RaniConfig;
use crate::engine::{CoordinatorConfig, ExecutionCoordinator};
use crate::paths;
use crate::scanner::{StoreRefresher, SystemScanner};
use crate::state::RaniState;

/// A loaded assistant: observed state plus restored overrides
pub struct App {
    pub config: RaniConfig,
    pub store: Arc<ResourceStateStore>,
    pub queue: SharedQueue,
    pub bus: OutputBus,
    scanner: SystemScanner,
    state_path: PathBuf,
}

impl App {
    /// Load config and overrides, then scan the live system
    pub async fn bootstrap() -> Result<Self> {
        let config = RaniConfig::load()?;
        let state_path = RaniState::state_file()?;
        let state = RaniState::load_from(&state_path)?;

        let scanner = SystemScanner::new(config.user.clone());
        let observed = scanner.scan().await;
        Self::assemble(config, state.wanted, observed, state_path)
    }

    /// Build an app from already-loaded pieces.
    ///
    /// Observed state goes in before the overrides, so an override that
    /// asks for a change is compared against the real system rather than
    /// an empty one. Overrides that fail validation are refused.
    pub fn assemble(
        config: RaniConfig,
        wanted: WantedState,
        observed: ObservedState,
        state_path: PathBuf,
    ) -> Result<Self> {
        let store = Arc::new(ResourceStateStore::new());
        let queue = queue::shared();
        store.subscribe(Arc::new(ReconciliationEngine::new(
            queue.clone(),
            PlanContext::new(config.user.clone()),
        )));

        store.refresh(observed);
        store
            .restore_wanted(wanted)
            .with_context(|| format!("Invalid overrides in {}", state_path.display()))?;

        let bus = OutputBus::new(config.session.output_capacity);
        let scanner = SystemScanner::new(config.user.clone());
        Ok(Self {
            config,
            store,
            queue,
            bus,
            scanner,
            state_path,
        })
    }

    /// Rescan the live system
    pub async fn rescan(&self) {
        let observed = self.scanner.scan().await;
        self.store.refresh(observed);
    }

    /// Write the current overrides back to disk
    pub fn persist(&self) -> Result<()> {
        let mut state = RaniState {
            wanted: self.store.snapshot().wanted_state(),
            ..RaniState::default()
        };
        state.save_to(&self.state_path)
    }

    /// Coordinator over this app's queue; must be called inside a tokio runtime
    pub fn coordinator(&self) -> Result<ExecutionCoordinator> {
        let config = CoordinatorConfig {
            settings: self.config.session.settings(),
            poll_interval: self.config.session.poll_interval(),
            script_path: paths::task_script_path()?,
        };
        let refresher = StoreRefresher::new(self.scanner.clone(), Arc::clone(&self.store));
        Ok(ExecutionCoordinator::new(
            self.queue.clone(),
            self.bus.clone(),
            self.config.elevator.build(),
            config,
            Arc::new(refresher),
        ))
    }
}
