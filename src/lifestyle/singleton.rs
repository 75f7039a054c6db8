use std::sync::Arc;

use crate::error::KernelResult;
use crate::handler::Handler;
use crate::internal::CreationContext;
use crate::kernel::KernelInner;
use crate::Instance;

use super::create_tracked;
use super::slot::SharedSlot;

/// One instance per kernel, built once under the slot's state machine.
pub(crate) struct SingletonLifestyle {
    slot: SharedSlot,
}

impl SingletonLifestyle {
    pub(crate) fn new() -> Self {
        Self {
            slot: SharedSlot::new(),
        }
    }

    pub(crate) fn resolve(
        &self,
        handler: &Arc<Handler>,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<Instance> {
        let (instance, created) = self
            .slot
            .get_or_create(kernel, ctx, |ctx| create_tracked(handler, kernel, ctx, false))?;
        if created {
            tracing::debug!(service = %handler.model.service(), "singleton created");
        }
        Ok(instance)
    }

    pub(crate) fn dispose(&self) {
        self.slot.clear();
    }
}
