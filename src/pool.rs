//! Bounded instance pool for the pooled lifestyle.
//!
//! The pool owns idle instances and remembers which ones are borrowed. Creation
//! always happens outside the pool lock with capacity reserved up front, so a
//! slow factory never blocks borrowers of already-idle instances.

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::ExhaustionPolicy;
use crate::error::{KernelError, KernelResult};
use crate::internal::{BurdenId, FastHashMap, ResolutionId, Waiter};
use crate::key::{InstanceId, ServiceId};
use crate::Instance;

/// A pooled instance and the burden that owns its dependencies.
#[derive(Clone)]
pub(crate) struct PoolItem {
    pub(crate) instance: Instance,
    pub(crate) burden: BurdenId,
}

impl PoolItem {
    pub(crate) fn id(&self) -> InstanceId {
        InstanceId::of(&self.instance)
    }
}

/// Result of a successful borrow.
pub(crate) struct Checkout {
    pub(crate) item: PoolItem,
    /// Served from an idle instance rather than freshly created
    pub(crate) reused: bool,
}

/// What happened to an instance handed back to the pool.
pub(crate) enum GiveBack {
    /// Queued as idle
    Returned,
    /// Pool already holds `max_size` idle instances; the caller destroys it
    Discard(PoolItem),
    /// Not borrowed from this pool (or already returned)
    NotBorrowed,
}

/// A failed borrow, with any instances built for the pool that it could not
/// keep. The caller tears those down.
pub(crate) struct Refusal {
    pub(crate) error: KernelError,
    pub(crate) orphans: Vec<PoolItem>,
}

impl From<KernelError> for Refusal {
    fn from(error: KernelError) -> Self {
        Self {
            error,
            orphans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    /// Initial fill running for the named resolution
    Initializing(ResolutionId),
    Ready,
    Disposed,
}

struct PoolState {
    phase: Phase,
    idle: Vec<PoolItem>,
    borrowed: FastHashMap<InstanceId, PoolItem>,
    /// Creations in flight outside the lock
    pending: usize,
    /// Resolutions running the in-flight creations past the initial fill
    creators: Vec<ResolutionId>,
}

impl PoolState {
    fn total(&self) -> usize {
        self.idle.len() + self.borrowed.len() + self.pending
    }
}

pub(crate) struct Pool {
    service: ServiceId,
    initial_size: usize,
    max_size: usize,
    exhaustion: ExhaustionPolicy,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl Pool {
    pub(crate) fn new(
        service: ServiceId,
        initial_size: usize,
        max_size: usize,
        exhaustion: ExhaustionPolicy,
    ) -> Self {
        Self {
            service,
            initial_size: initial_size.min(max_size),
            max_size,
            exhaustion,
            state: Mutex::new(PoolState {
                phase: Phase::Uninitialized,
                idle: Vec::new(),
                borrowed: FastHashMap::default(),
                pending: 0,
                creators: Vec::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// Borrows an instance, creating one with `create` if capacity allows.
    ///
    /// The first request fills the pool with `initial_size` instances. At
    /// capacity the request blocks or fails according to the exhaustion policy.
    /// Waiting for another resolution's fill goes through the wait graph, so a
    /// fill that needs this resolution fails with `Circular` instead.
    pub(crate) fn request(
        &self,
        waiter: &Waiter<'_>,
        create: &mut dyn FnMut() -> KernelResult<PoolItem>,
    ) -> Result<Checkout, Refusal> {
        let mut state = self.state.lock();
        loop {
            match state.phase {
                Phase::Disposed => return Err(KernelError::Disposed.into()),
                Phase::Initializing(owner) => {
                    let _edge = waiter.wait_for(owner)?;
                    self.available.wait(&mut state);
                    continue;
                }
                Phase::Uninitialized => {
                    self.fill(&mut state, waiter.id(), create)?;
                    continue;
                }
                Phase::Ready => {}
            }

            if let Some(item) = state.idle.pop() {
                state.borrowed.insert(item.id(), item.clone());
                return Ok(Checkout { item, reused: true });
            }

            if state.total() < self.max_size {
                state.pending += 1;
                state.creators.push(waiter.id());
                let created = MutexGuard::unlocked(&mut state, || create());
                state.pending -= 1;
                if let Some(pos) = state.creators.iter().position(|&c| c == waiter.id()) {
                    state.creators.swap_remove(pos);
                }
                return match created {
                    Ok(item) => {
                        state.borrowed.insert(item.id(), item.clone());
                        Ok(Checkout { item, reused: false })
                    }
                    Err(err) => {
                        // The reserved slot is free again
                        self.available.notify_one();
                        Err(err.into())
                    }
                };
            }

            match self.exhaustion {
                ExhaustionPolicy::Fail => {
                    return Err(KernelError::PoolExhausted {
                        service: self.service,
                        max_size: self.max_size,
                    }
                    .into())
                }
                ExhaustionPolicy::Block => {
                    // With nothing borrowed, a lone in-flight creation is the
                    // only thing that can ever free capacity
                    let _edge = match state.creators.as_slice() {
                        [creator] if state.borrowed.is_empty() => Some(waiter.wait_for(*creator)?),
                        _ => None,
                    };
                    tracing::trace!(service = %self.service, "pool exhausted, waiting for a release");
                    self.available.wait(&mut state);
                }
            }
        }
    }

    /// Creates the initial idle instances. Runs once, outside the lock.
    ///
    /// A pool disposed during the fill keeps nothing: the instances built so
    /// far come back as orphans.
    fn fill(
        &self,
        state: &mut MutexGuard<'_, PoolState>,
        owner: ResolutionId,
        create: &mut dyn FnMut() -> KernelResult<PoolItem>,
    ) -> Result<(), Refusal> {
        state.phase = Phase::Initializing(owner);
        state.pending += self.initial_size;

        let initial_size = self.initial_size;
        let (created, failure) = MutexGuard::unlocked(state, || {
            let mut created = Vec::with_capacity(initial_size);
            for _ in 0..initial_size {
                match create() {
                    Ok(item) => created.push(item),
                    Err(err) => return (created, Some(err)),
                }
            }
            (created, None)
        });

        state.pending -= self.initial_size;
        self.available.notify_all();

        if state.phase == Phase::Disposed {
            tracing::debug!(
                service = %self.service,
                orphans = created.len(),
                "pool disposed during initial fill"
            );
            return Err(Refusal {
                error: KernelError::Disposed,
                orphans: created,
            });
        }

        state.idle.extend(created);
        state.phase = Phase::Ready;
        tracing::debug!(
            service = %self.service,
            idle = state.idle.len(),
            max_size = self.max_size,
            "pool initialized"
        );

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Hands a borrowed instance back.
    pub(crate) fn give_back(&self, instance: InstanceId) -> GiveBack {
        let mut state = self.state.lock();
        let Some(item) = state.borrowed.remove(&instance) else {
            return GiveBack::NotBorrowed;
        };

        if state.phase == Phase::Disposed || state.idle.len() >= self.max_size {
            self.available.notify_one();
            return GiveBack::Discard(item);
        }

        state.idle.push(item);
        self.available.notify_one();
        GiveBack::Returned
    }

    /// Closes the pool and returns every instance it knows about, idle and
    /// borrowed. Blocked borrowers fail with `Disposed`.
    pub(crate) fn dispose(&self) -> Vec<PoolItem> {
        let mut state = self.state.lock();
        state.phase = Phase::Disposed;
        let mut items: Vec<PoolItem> = state.idle.drain(..).collect();
        items.extend(state.borrowed.drain().map(|(_, item)| item));
        self.available.notify_all();
        items
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    #[cfg(test)]
    pub(crate) fn in_use(&self) -> usize {
        self.state.lock().borrowed.len()
    }
}
