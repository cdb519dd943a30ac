//! Domain registry: one cache factory per domain id

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::CacheFactory;
use crate::cache::types::DomainCacheId;

static GLOBAL: Lazy<DomainRegistry> = Lazy::new(DomainRegistry::new);

/// Maps domain ids to their factories
#[derive(Debug, Default)]
pub struct DomainRegistry {
    factories: DashMap<DomainCacheId, Arc<CacheFactory>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static DomainRegistry {
        &GLOBAL
    }

    /// Factory for `domain`, created on first use
    pub fn factory(&self, domain: &DomainCacheId) -> Arc<CacheFactory> {
        if let Some(existing) = self.factories.get(domain) {
            return Arc::clone(existing.value());
        }
        let factory = self
            .factories
            .entry(domain.clone())
            .or_insert_with(|| {
                log::debug!("Created cache factory for domain {}", domain);
                Arc::new(CacheFactory::new(domain.clone()))
            });
        Arc::clone(factory.value())
    }

    pub fn find_factory(&self, domain: &DomainCacheId) -> Option<Arc<CacheFactory>> {
        self.factories.get(domain).map(|e| Arc::clone(e.value()))
    }

    pub fn remove_factory(&self, domain: &DomainCacheId) -> Option<Arc<CacheFactory>> {
        self.factories.remove(domain).map(|(_, factory)| factory)
    }

    /// Snapshot of every registered factory
    pub fn factories(&self) -> Vec<Arc<CacheFactory>> {
        self.factories.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_per_domain() {
        let registry = DomainRegistry::new();
        let a = registry.factory(&"fetch".into());
        let b = registry.factory(&"fetch".into());
        let c = registry.factory(&"render".into());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert!(registry.remove_factory(&"render".into()).is_some());
        assert!(registry.find_factory(&"render".into()).is_none());
    }

    #[test]
    fn test_global_is_shared() {
        let domain: DomainCacheId = "registry-global-test".into();
        let first = DomainRegistry::global().factory(&domain);
        let second = DomainRegistry::global().factory(&domain);
        assert!(Arc::ptr_eq(&first, &second));
        DomainRegistry::global().remove_factory(&domain);
    }
}
