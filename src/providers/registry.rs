//! Provider registry for managing configured search providers

use super::traits::Provider;
use crate::search::ContentType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A registered provider with its position in the configured order
#[derive(Clone)]
pub struct ProviderSlot {
    /// Position in configured order, used to break ranking ties
    pub order: usize,
    pub provider: Arc<dyn Provider>,
    /// Per provider timeout override
    pub timeout: Option<Duration>,
}

impl ProviderSlot {
    pub fn id(&self) -> &str {
        self.provider.id()
    }
}

/// Registry of all configured providers, in configured order
pub struct ProviderRegistry {
    slots: Vec<ProviderSlot>,
    /// Provider id -> end of rate limit cooldown
    cooldowns: Mutex<HashMap<String, Instant>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.slots.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Register a provider at the end of the configured order.
    ///
    /// A provider whose id is already registered replaces the old one.
    pub fn register(&mut self, provider: Arc<dyn Provider>, timeout: Option<Duration>) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.id() == provider.id()) {
            warn!("Replacing provider {}", provider.id());
            slot.provider = provider;
            slot.timeout = timeout;
            return;
        }
        self.slots.push(ProviderSlot {
            order: self.slots.len(),
            provider,
            timeout,
        });
    }

    /// Get a provider by id
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Provider>> {
        self.slots.iter().find(|s| s.id() == id).map(|s| &s.provider)
    }

    /// Providers serving `content_type` that are not cooling down
    pub fn available_for(&self, content_type: ContentType) -> Vec<ProviderSlot> {
        let now = Instant::now();
        let mut cooldowns = self.cooldowns();
        cooldowns.retain(|_, until| *until > now);

        self.slots
            .iter()
            .filter(|s| s.provider.content_types().contains(&content_type))
            .filter(|s| {
                let cooling = cooldowns.contains_key(s.id());
                if cooling {
                    debug!("Skipping {}: rate limit cooldown", s.id());
                }
                !cooling
            })
            .cloned()
            .collect()
    }

    /// Skip a provider for `cooldown` after it reported rate limiting
    pub fn mark_rate_limited(&self, id: &str, cooldown: Duration) {
        warn!("Provider {} rate limited, cooling down for {:?}", id, cooldown);
        self.cooldowns()
            .insert(id.to_string(), Instant::now() + cooldown);
    }

    /// Check if a provider is cooling down
    pub fn in_cooldown(&self, id: &str) -> bool {
        self.cooldowns()
            .get(id)
            .map(|until| *until > Instant::now())
            .unwrap_or(false)
    }

    /// Get all provider ids in configured order
    pub fn ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id()).collect()
    }

    /// Get number of registered providers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn cooldowns(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.cooldowns.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SimulationProvider;

    fn sim(id: &str) -> Arc<dyn Provider> {
        Arc::new(SimulationProvider::new().with_id(id))
    }

    #[test]
    fn test_registry_keeps_order() {
        let mut registry = ProviderRegistry::new();
        registry.register(sim("b"), None);
        registry.register(sim("a"), Some(Duration::from_secs(2)));

        assert_eq!(registry.ids(), vec!["b", "a"]);
        assert!(registry.get("a").is_some());
        let available = registry.available_for(ContentType::News);
        assert_eq!(available[1].order, 1);
        assert_eq!(available[1].timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(sim("a"), None);
        registry.register(sim("a"), Some(Duration::from_secs(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cooldown_excludes_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register(sim("a"), None);
        registry.register(sim("b"), None);

        registry.mark_rate_limited("a", Duration::from_secs(600));
        assert!(registry.in_cooldown("a"));
        let ids: Vec<String> = registry
            .available_for(ContentType::Web)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b"]);

        registry.mark_rate_limited("b", Duration::ZERO);
        assert!(!registry.in_cooldown("b"));
        assert_eq!(registry.available_for(ContentType::Web).len(), 1);
    }
}
