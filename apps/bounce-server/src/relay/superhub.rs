//! Process-wide directory of hubs, keyed by game name.
//!
//! Attachment is reference-counted: `hub` hands out a hub and bumps its
//! count, `release` drops it. A hub whose count reaches zero is removed from
//! the registry and signalled detached, exactly once.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::task::TaskTracker;

use super::hub::Hub;

/// Default cap on clients attached to a single game.
pub const MAX_CLIENTS: usize = 50;

#[derive(Debug, Error)]
pub enum SuperhubError {
    #[error("Maximum number of clients in game")]
    GameFull,
}

pub struct Superhub {
    registry: RwLock<Registry>,
    tracker: TaskTracker,
    max_clients: usize,
}

#[derive(Default)]
struct Registry {
    /// Game name → hub.
    hubs: HashMap<String, Hub>,
    /// Hub uid → count of attached clients.
    counts: HashMap<u64, usize>,
    /// Hub uid → game name, for removal on teardown.
    names: HashMap<u64, String>,
}

impl Default for Superhub {
    fn default() -> Self {
        Self::with_max_clients(MAX_CLIENTS)
    }
}

impl Superhub {
    pub fn with_max_clients(max_clients: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            tracker: TaskTracker::new(),
            max_clients,
        }
    }

    /// Gets the hub for the given game, creating and starting one if needed.
    /// Refuses when the game already carries `max_clients` attachments.
    pub fn hub(&self, name: &str) -> Result<Hub, SuperhubError> {
        let mut reg = self.registry.write();

        if let Some(hub) = reg.hubs.get(name) {
            let hub = hub.clone();
            let count = reg
                .counts
                .get_mut(&hub.uid())
                .expect("registered hub has a count");
            if *count >= self.max_clients {
                return Err(SuperhubError::GameFull);
            }
            *count += 1;
            tracing::debug!(game = name, count = *count, "existing hub");
            return Ok(hub);
        }

        let hub = Hub::start(name, &self.tracker);
        reg.hubs.insert(name.to_string(), hub.clone());
        reg.counts.insert(hub.uid(), 1);
        reg.names.insert(hub.uid(), name.to_string());
        tracing::debug!(game = name, "new hub");
        Ok(hub)
    }

    /// Lets a client say it is done with its hub. Called exactly once per
    /// client, by its writer task's final step. When the last client departs
    /// the hub is deregistered and told it is detached.
    pub fn release(&self, hub: &Hub) {
        let mut reg = self.registry.write();

        let Some(count) = reg.counts.get_mut(&hub.uid()) else {
            tracing::warn!(game = hub.name(), "release of unregistered hub");
            return;
        };
        *count -= 1;
        if *count > 0 {
            tracing::debug!(game = hub.name(), count = *count, "released hub");
            return;
        }

        reg.counts.remove(&hub.uid());
        if let Some(name) = reg.names.remove(&hub.uid()) {
            reg.hubs.remove(&name);
        }
        hub.signal_detached();
        tracing::debug!(game = hub.name(), "hub detached");
    }

    /// Number of registered hubs.
    pub fn count(&self) -> usize {
        self.registry.read().names.len()
    }

    /// Wait group covering every hub and client task in the process.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}
