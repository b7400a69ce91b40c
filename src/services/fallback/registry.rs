//! Provider Registry
//!
//! Holds one `LlmProvider` per configured backend, sorted by priority, plus
//! the mutable `available` flag the cascade flips off after a provider reports
//! token exhaustion. A disabled provider is re-admitted once `cooldown` has
//! passed; everything else about a provider is immutable.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use suite_gateway_core::SharedClock;
use suite_gateway_llm::{LlmProvider, ProviderDescriptor};

/// One registered backend.
pub struct RegistryEntry {
    provider: Arc<dyn LlmProvider>,
    available: AtomicBool,
    disabled_at: Mutex<Option<DateTime<Utc>>>,
}

impl RegistryEntry {
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        self.provider.descriptor()
    }
}

/// Priority-ordered set of providers.
pub struct ProviderRegistry {
    entries: Vec<RegistryEntry>,
    clock: SharedClock,
    cooldown: Duration,
}

impl ProviderRegistry {
    /// Build from providers in any order; they are sorted by ascending priority
    /// (ties keep their given order).
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, clock: SharedClock, cooldown: Duration) -> Self {
        let mut entries: Vec<RegistryEntry> = providers
            .into_iter()
            .map(|provider| RegistryEntry {
                provider,
                available: AtomicBool::new(true),
                disabled_at: Mutex::new(None),
            })
            .collect();
        entries.sort_by_key(|e| e.descriptor().priority);
        Self {
            entries,
            clock,
            cooldown,
        }
    }

    /// Cascade order: ascending priority, with `prefer` moved to the front.
    pub fn ordered(&self, prefer: Option<&str>) -> Vec<&RegistryEntry> {
        let mut order: Vec<&RegistryEntry> = self.entries.iter().collect();
        if let Some(name) = prefer {
            if let Some(pos) = order.iter().position(|e| e.name() == name) {
                let preferred = order.remove(pos);
                order.insert(0, preferred);
            } else {
                warn!(provider = name, "Preferred provider is not registered");
            }
        }
        order
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Take a provider out of rotation (token exhaustion).
    pub fn mark_unavailable(&self, name: &str) {
        if let Some(entry) = self.get(name) {
            entry.available.store(false, Ordering::SeqCst);
            *entry.disabled_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.clock.now());
            warn!(provider = name, "Provider marked unavailable");
        }
    }

    /// The `available` flag, re-enabling the provider once its cooldown elapsed.
    pub fn is_available(&self, name: &str) -> bool {
        let Some(entry) = self.get(name) else {
            return false;
        };
        if entry.available.load(Ordering::SeqCst) {
            return true;
        }

        let mut disabled_at = entry.disabled_at.lock().unwrap_or_else(|e| e.into_inner());
        let expired = disabled_at
            .map(|at| self.clock.now() - at > self.cooldown)
            .unwrap_or(true);
        if expired {
            *disabled_at = None;
            entry.available.store(true, Ordering::SeqCst);
            info!(provider = name, "Provider returned to rotation");
        }
        expired
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
