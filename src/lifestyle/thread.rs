use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use crate::error::KernelResult;
use crate::handler::Handler;
use crate::internal::{CreationContext, FastDashMap};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::Instance;

use super::{create_tracked, LifestyleManager};

/// One instance per thread, per kernel.
///
/// Slots are keyed by `ThreadId` inside the kernel that owns the handler, so
/// two kernels in one process never share a thread slot. A thread only ever
/// touches its own slot. Filling a slot registers it with the thread's exit
/// hook, which decommissions the instance when the thread ends.
pub(crate) struct ThreadLifestyle {
    slots: FastDashMap<ThreadId, Instance>,
}

impl ThreadLifestyle {
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
        let current = thread::current().id();
        if let Some(instance) = self.slots.get(&current) {
            return Ok(instance.clone());
        }

        // No map guard is held while the instance is built
        let instance = create_tracked(handler, kernel, ctx, false)?;
        self.slots.insert(current, instance.clone());
        ThreadExit::register(kernel.downgrade(), Arc::downgrade(handler), current);

        tracing::trace!(service = %handler.model.service(), thread = ?current, "thread slot filled");
        Ok(instance)
    }

    /// Clears `thread`'s slot and returns what it held.
    pub(crate) fn take(&self, thread: ThreadId) -> Option<InstanceId> {
        self.slots
            .remove(&thread)
            .map(|(_, instance)| InstanceId::of(&instance))
    }

    pub(crate) fn take_current(&self) -> Option<InstanceId> {
        self.take(thread::current().id())
    }

    pub(crate) fn dispose(&self) {
        self.slots.clear();
    }
}

struct SlotOwner {
    kernel: Weak<KernelInner>,
    handler: Weak<Handler>,
    thread: ThreadId,
}

/// Thread-local list of slots the current thread filled, torn down on exit.
struct ThreadExit {
    owners: RefCell<Vec<SlotOwner>>,
}

thread_local! {
    static THREAD_EXIT: ThreadExit = const {
        ThreadExit {
            owners: RefCell::new(Vec::new()),
        }
    };
}

impl ThreadExit {
    fn register(kernel: Weak<KernelInner>, handler: Weak<Handler>, thread: ThreadId) {
        // Ignored while the thread's locals are already being destroyed
        let _ = THREAD_EXIT.try_with(|exit| {
            let mut owners = exit.owners.borrow_mut();
            let known = owners
                .iter()
                .any(|o| Weak::ptr_eq(&o.handler, &handler) && Weak::ptr_eq(&o.kernel, &kernel));
            if !known {
                owners.push(SlotOwner {
                    kernel,
                    handler,
                    thread,
                });
            }
        });
    }
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        let owners = std::mem::take(self.owners.get_mut());
        for owner in owners.into_iter().rev() {
            let (Some(kernel), Some(handler)) = (owner.kernel.upgrade(), owner.handler.upgrade()) else {
                continue;
            };
            if let LifestyleManager::Thread(lifestyle) = &handler.lifestyle {
                if let Some(instance) = lifestyle.take(owner.thread) {
                    tracing::trace!(service = %handler.model.service(), "thread ended, releasing slot");
                    kernel.decommission(instance);
                }
            }
        }
    }
}
