//! Service registry (usage registry).
//!
//! Holds the shared resilience state of every configured upstream service:
//! circuit breaker, rate window, usage counters and advisory health. The
//! registry is an explicit object handed to the orchestrator; nothing here is
//! process-global.

mod error;
mod service;
mod usage;

pub use error::*;
pub use service::*;
pub use usage::UsageStats;

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thread-safe map from [`ServiceId`] to its [`ServiceState`].
///
/// The map itself only guards membership; every per-service mutation goes
/// through the locks inside `ServiceState`, so two services never contend.
///
/// # Examples
///
/// ```
/// use augur::registry::{ServiceId, ServiceRegistry, ServiceSettings, ServiceState};
/// use augur::provider::EchoProvider;
/// use std::sync::Arc;
///
/// let registry = ServiceRegistry::new();
/// let state = ServiceState::new(
///     ServiceId::from("echo"),
///     Arc::new(EchoProvider::new("echo")),
///     ServiceSettings::default(),
/// );
/// registry.register(state).unwrap();
/// assert_eq!(registry.service_count(), 1);
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<ServiceId, Arc<ServiceState>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register a service.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateService` if the id is already taken.
    pub fn register(&self, state: ServiceState) -> Result<Arc<ServiceState>, RegistryError> {
        use dashmap::mapref::entry::Entry;

        match self.services.entry(state.id().clone()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateService(entry.key().to_string())),
            Entry::Vacant(entry) => {
                let state = Arc::new(state);
                entry.insert(Arc::clone(&state));
                Ok(state)
            }
        }
    }

    /// Look up a service. The returned `Arc` outlives the map guard.
    pub fn get(&self, id: &str) -> Result<Arc<ServiceState>, RegistryError> {
        self.services
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::ServiceNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    /// All services, ordered by id.
    pub fn services(&self) -> Vec<Arc<ServiceState>> {
        let mut services: Vec<_> = self
            .services
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        services.sort_by(|a, b| a.id().cmp(b.id()));
        services
    }

    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.services().iter().map(|s| s.id().clone()).collect()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn usage_stats(&self, id: &str) -> Result<UsageStats, RegistryError> {
        Ok(self.get(id)?.usage_stats())
    }

    /// Advisory availability per service.
    pub fn health_map(&self) -> BTreeMap<ServiceId, bool> {
        self.services()
            .into_iter()
            .map(|s| (s.id().clone(), s.is_available()))
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.services().iter().filter(|s| s.is_available()).count()
    }

    pub fn reset(&self, id: &str) -> Result<(), RegistryError> {
        self.get(id)?.reset();
        Ok(())
    }

    pub fn reset_all(&self) {
        for service in self.services() {
            service.reset();
        }
    }
}
