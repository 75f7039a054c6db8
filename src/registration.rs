//! In-crate metadata provider.

use std::sync::Arc;

use crate::internal::FastHashMap;
use crate::key::ServiceId;
use crate::model::ComponentModel;
use crate::traits::MetadataProvider;

/// Component models keyed by service, immutable once the kernel is built.
///
/// Small registries are scanned linearly, larger ones fall back to a hash
/// map. Registering a service twice replaces the earlier model.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, MetadataProvider, ModelRegistry, service_of};
///
/// struct Mailer;
///
/// let mut registry = ModelRegistry::new();
/// registry.insert(ComponentModel::builder::<Mailer>().create(|_| Mailer).build().unwrap());
///
/// assert!(registry.contains(&service_of::<Mailer>()));
/// assert!(registry.model(&service_of::<Mailer>()).is_some());
/// assert_eq!(registry.len(), 1);
/// ```
pub struct ModelRegistry {
    small: Vec<(ServiceId, Arc<ComponentModel>)>,
    large: FastHashMap<ServiceId, Arc<ComponentModel>>,
    small_threshold: usize,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            small: Vec::new(),
            large: FastHashMap::default(),
            small_threshold: 16,
        }
    }

    /// Adds a model, replacing any model registered for the same service.
    pub fn insert(&mut self, model: ComponentModel) {
        let service = model.service();
        let model = Arc::new(model);

        if let Some(slot) = self.small.iter_mut().find(|(s, _)| *s == service) {
            slot.1 = model;
            return;
        }
        if self.small.len() < self.small_threshold && !self.large.contains_key(&service) {
            self.small.push((service, model));
        } else {
            self.large.insert(service, model);
        }
    }

    #[inline]
    pub fn get(&self, service: &ServiceId) -> Option<&Arc<ComponentModel>> {
        for (s, model) in &self.small {
            if s == service {
                return Some(model);
            }
        }
        self.large.get(service)
    }

    #[inline]
    pub fn contains(&self, service: &ServiceId) -> bool {
        self.get(service).is_some()
    }

    pub fn len(&self) -> usize {
        self.small.len() + self.large.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Models in registration order for the first entries, then unordered.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentModel>> {
        self.small.iter().map(|(_, m)| m).chain(self.large.values())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for ModelRegistry {
    fn model(&self, service: &ServiceId) -> Option<Arc<ComponentModel>> {
        self.get(service).cloned()
    }

    fn models(&self) -> Vec<Arc<ComponentModel>> {
        self.iter().cloned().collect()
    }
}
