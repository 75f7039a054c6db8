use std::sync::Arc;

use crate::error::{KernelError, KernelResult};
use crate::handler::Handler;
use crate::internal::{CreationContext, FastDashMap};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::traits::ScopeId;
use crate::Instance;

use super::create_tracked;
use super::slot::SharedSlot;

/// One instance per lifetime scope.
///
/// The kernel does not decide when a scope ends. Each instance is registered
/// with its scope's eviction hook, and the scope owner triggers the teardown.
/// A scope may be current on several threads at once; the first of them
/// builds the instance and the others wait for it.
pub(crate) struct ScopeLifestyle {
    slots: FastDashMap<ScopeId, Arc<SharedSlot>>,
}

impl ScopeLifestyle {
    pub(crate) fn new() -> Self {
        Self {
            slots: FastDashMap::default(),
        }
    }

    pub(crate) fn resolve(
        &self,
        handler: &Arc<Handler>,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<Instance> {
        let service = handler.model.service();
        let scope = kernel
            .current_scope()
            .ok_or(KernelError::NoActiveScope(service))?;
        let scope_id = scope.id();

        // The map guard is released before anything is built
        let slot = self
            .slots
            .entry(scope_id)
            .or_insert_with(|| Arc::new(SharedSlot::new()))
            .clone();

        let (instance, created) =
            match slot.get_or_create(kernel, ctx, |ctx| create_tracked(handler, kernel, ctx, false)) {
                Ok(filled) => filled,
                Err(err) => {
                    self.slots
                        .remove_if(&scope_id, |_, held| Arc::ptr_eq(held, &slot) && held.is_empty());
                    return Err(err);
                }
            };
        if !created {
            return Ok(instance);
        }

        let kernel_ref = kernel.downgrade();
        let handler_ref = Arc::downgrade(handler);
        let instance_id = InstanceId::of(&instance);
        scope.register_for_eviction(
            instance.clone(),
            Box::new(move || {
                if let (Some(kernel), Some(handler)) = (kernel_ref.upgrade(), handler_ref.upgrade()) {
                    kernel.evict_scoped(&handler, scope_id, instance_id);
                }
            }),
        );

        tracing::trace!(service = %service, scope = scope_id.as_u64(), "scoped instance created");
        Ok(instance)
    }

    /// Removes the scope's slot if it still holds `instance`.
    pub(crate) fn evict(&self, scope: ScopeId, instance: InstanceId) -> bool {
        self.slots
            .remove_if(&scope, |_, held| held.holds(instance))
            .is_some()
    }

    pub(crate) fn dispose(&self) {
        self.slots.clear();
    }
}
