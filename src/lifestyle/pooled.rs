use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::activator;
use crate::config::{ExhaustionPolicy, KernelConfig};
use crate::error::{KernelError, KernelResult};
use crate::handler::Handler;
use crate::internal::CreationContext;
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::model::ComponentModel;
use crate::pool::{GiveBack, Pool, PoolItem, Refusal};
use crate::Instance;

/// Borrow/return through a lazily created [`Pool`].
///
/// Every pooled instance keeps one burden for its whole life in the pool; it
/// is tracked by the release policy only while borrowed.
pub(crate) struct PooledLifestyle {
    pool: OnceCell<Pool>,
    initial_size: usize,
    max_size: usize,
    exhaustion: ExhaustionPolicy,
}

impl PooledLifestyle {
    pub(crate) fn new(model: &ComponentModel, config: &KernelConfig) -> Self {
        let (initial_size, max_size, exhaustion) = match model.pool_sizing() {
            Some(sizing) => (
                sizing.initial_size,
                sizing.max_size,
                sizing.exhaustion.unwrap_or(config.pool.exhaustion),
            ),
            None => (config.pool.initial_size, config.pool.max_size, config.pool.exhaustion),
        };
        Self {
            pool: OnceCell::new(),
            initial_size,
            max_size: max_size.max(1),
            exhaustion,
        }
    }

    fn pool(&self, handler: &Handler) -> &Pool {
        self.pool.get_or_init(|| {
            tracing::debug!(
                service = %handler.model.service(),
                initial_size = self.initial_size,
                max_size = self.max_size,
                "creating pool"
            );
            Pool::new(handler.model.service(), self.initial_size, self.max_size, self.exhaustion)
        })
    }

    pub(crate) fn resolve(
        &self,
        handler: &Arc<Handler>,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<Instance> {
        let pool = self.pool(handler);
        let waiter = ctx.waiter(&kernel.waits);
        let mut create = || -> KernelResult<PoolItem> {
            let burden = activator::create(handler, kernel, ctx)?;
            let instance = burden.instance.clone();
            let burden = kernel.burdens.insert(burden);
            Ok(PoolItem { instance, burden })
        };
        let checkout = match pool.request(&waiter, &mut create) {
            Ok(checkout) => checkout,
            Err(Refusal { error, orphans }) => {
                for item in orphans {
                    kernel.cascade(item.burden);
                }
                return Err(error);
            }
        };

        if checkout.reused {
            kernel.metrics.record_pool_hit();
        } else {
            kernel.metrics.record_pool_miss();
        }

        let PoolItem { instance, burden } = checkout.item;
        if !kernel.policy.track(InstanceId::of(&instance), burden) {
            // Disposed while borrowing
            if let GiveBack::Discard(item) = pool.give_back(InstanceId::of(&instance)) {
                kernel.cascade(item.burden);
            }
            return Err(KernelError::Disposed);
        }

        tracing::trace!(service = %handler.model.service(), reused = checkout.reused, "pooled instance borrowed");
        Ok(instance)
    }

    /// Hands a borrowed instance back to the pool.
    ///
    /// Removing the release-policy entry is the claim: a second release of the
    /// same borrow finds nothing and does nothing.
    pub(crate) fn release(&self, kernel: &KernelInner, instance: InstanceId) {
        let Some(pool) = self.pool.get() else {
            return;
        };
        if kernel.policy.untrack(instance).is_none() {
            return;
        }

        match pool.give_back(instance) {
            GiveBack::Returned => tracing::trace!(instance = %instance, "pooled instance returned"),
            GiveBack::Discard(item) => {
                kernel.metrics.record_pool_discard();
                tracing::debug!(instance = %instance, "pool full, discarding returned instance");
                kernel.cascade(item.burden);
            }
            GiveBack::NotBorrowed => {}
        }
    }

    /// Tears down every instance the pool still holds.
    pub(crate) fn dispose(&self, kernel: &KernelInner) {
        if let Some(pool) = self.pool.get() {
            for item in pool.dispose() {
                kernel.cascade(item.burden);
            }
        }
    }
}
