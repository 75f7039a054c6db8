//! Per-model facade joining a model with its lifestyle.

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::internal::{ChildLink, CreationContext};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::lifestyle::{Lifestyle, LifestyleManager, Resolved};
use crate::model::ComponentModel;

/// Created lazily, once per model, by the kernel that resolves it.
pub(crate) struct Handler {
    pub(crate) model: Arc<ComponentModel>,
    pub(crate) lifestyle: LifestyleManager,
}

impl Handler {
    pub(crate) fn new(model: Arc<ComponentModel>, config: &KernelConfig) -> Arc<Self> {
        let lifestyle = LifestyleManager::for_model(&model, config);
        Arc::new(Self { model, lifestyle })
    }

    /// Produces an instance according to the model's lifestyle.
    pub(crate) fn resolve(
        self: &Arc<Self>,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<Resolved> {
        self.lifestyle.resolve(self, kernel, ctx)
    }

    /// Whether an external release of `instance` should decommission it now.
    pub(crate) fn release(&self, kernel: &KernelInner, instance: InstanceId) -> bool {
        self.lifestyle.release(kernel, instance)
    }

    /// How a consumer holds an instance this handler just resolved for it.
    ///
    /// Only transient instances are owned. Pooled ones go back to their pool
    /// with the consumer; everything else is merely referenced.
    pub(crate) fn link(&self, resolved: &Resolved) -> ChildLink {
        match self.lifestyle.lifestyle() {
            Lifestyle::Transient => ChildLink::Owned(resolved.burden),
            Lifestyle::Pooled => ChildLink::Returned(InstanceId::of(&resolved.instance)),
            _ => ChildLink::Shared,
        }
    }

    pub(crate) fn lifestyle(&self) -> Lifestyle {
        self.lifestyle.lifestyle()
    }
}
