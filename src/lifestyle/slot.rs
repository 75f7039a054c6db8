use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::KernelResult;
use crate::internal::{CreationContext, ResolutionId};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    /// Being built by the named resolution
    Initializing(ResolutionId),
    Ready,
}

/// A lazily built shared instance.
///
/// The published instance is read without touching the init lock. Creation is
/// guarded by an explicit state machine: the first caller moves it to
/// `Initializing` and builds the instance with no lock held, later callers
/// wait on the condition variable until it is `Ready` (or back to
/// `Uninitialized` after a failure, in which case one of them retries).
///
/// Before waiting, a caller registers with the kernel's wait graph. If the
/// builder is itself blocked on the caller, the wait is refused with
/// `Circular`.
pub(crate) struct SharedSlot {
    instance: RwLock<Option<Instance>>,
    state: Mutex<InitState>,
    ready: Condvar,
}

impl SharedSlot {
    pub(crate) fn new() -> Self {
        Self {
            instance: RwLock::new(None),
            state: Mutex::new(InitState::Uninitialized),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn get(&self) -> Option<Instance> {
        self.instance.read().clone()
    }

    pub(crate) fn holds(&self, id: InstanceId) -> bool {
        self.instance
            .read()
            .as_ref()
            .is_some_and(|instance| InstanceId::of(instance) == id)
    }

    /// Returns the instance, building it with `create` if nobody has yet.
    ///
    /// The flag is `true` when this call built it.
    pub(crate) fn get_or_create(
        &self,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
        create: impl FnOnce(&mut CreationContext) -> KernelResult<Instance>,
    ) -> KernelResult<(Instance, bool)> {
        if let Some(instance) = self.get() {
            return Ok((instance, false));
        }

        let mut state = self.state.lock();
        loop {
            match *state {
                InitState::Ready => {
                    if let Some(instance) = self.get() {
                        return Ok((instance, false));
                    }
                    // Cleared by dispose
                    *state = InitState::Uninitialized;
                }
                InitState::Initializing(owner) => {
                    let _edge = ctx.waiter(&kernel.waits).wait_for(owner)?;
                    self.ready.wait(&mut state);
                }
                InitState::Uninitialized => break,
            }
        }
        *state = InitState::Initializing(ctx.resolution());
        drop(state);

        let mut guard = InitGuard {
            owner: self,
            done: false,
        };
        let instance = create(ctx)?;
        *self.instance.write() = Some(instance.clone());
        *self.state.lock() = InitState::Ready;
        guard.done = true;
        self.ready.notify_all();
        Ok((instance, true))
    }

    /// Drops the published instance, returning it.
    pub(crate) fn clear(&self) -> Option<Instance> {
        let taken = self.instance.write().take();
        let mut state = self.state.lock();
        if *state == InitState::Ready {
            *state = InitState::Uninitialized;
        }
        taken
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.instance.read().is_none() && *self.state.lock() == InitState::Uninitialized
    }
}

/// Resets the state machine if creation fails or panics, so waiters retry.
struct InitGuard<'a> {
    owner: &'a SharedSlot,
    done: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.owner.state.lock() = InitState::Uninitialized;
            self.owner.ready.notify_all();
        }
    }
}
