/// Lifestyle integration tests
///
/// Sharing contracts of the built-in lifestyles: singleton identity, transient
/// freshness, per-thread slots, scopes and custom strategies.
use ferrous_kernel::{
    ComponentModel, CustomLifestyle, Instance, InstanceId, KernelBuilder, KernelError,
    KernelResult, LifetimeScope, RequestScope, ScopeAccessor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Counter {
    id: usize,
}

fn next_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

#[test]
fn test_singleton_identity() {
    let mut builder = KernelBuilder::new();
    builder.add_singleton(|_| Counter { id: next_id() });
    let kernel = builder.build();

    let first = kernel.get::<Counter>().unwrap();
    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &kernel.get::<Counter>().unwrap()));
    }
    // External release of a singleton is ignored
    kernel.release(&first);
    assert!(Arc::ptr_eq(&first, &kernel.get::<Counter>().unwrap()));
}

#[test]
fn test_transient_instances_are_distinct() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .transient()
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let a = kernel.get::<Counter>().unwrap();
    let b = kernel.get::<Counter>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.id, b.id);

    // Releasing one leaves the other untouched
    kernel.release(&a);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(kernel.tracked_count(), 1);

    kernel.release(&b);
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_thread_lifestyle_one_instance_per_thread() {
    let mut builder = KernelBuilder::new();
    builder.add_thread(|_| Counter { id: next_id() });
    let kernel = builder.build();

    let main_a = kernel.get::<Counter>().unwrap();
    let main_b = kernel.get::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&main_a, &main_b));

    let kernel = &kernel;
    let other_ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(move || {
                    let a = kernel.get::<Counter>().unwrap();
                    let b = kernel.get::<Counter>().unwrap();
                    assert!(Arc::ptr_eq(&a, &b));
                    a.id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_ne!(other_ids[0], other_ids[1]);
    assert!(!other_ids.contains(&main_a.id));
}

#[test]
fn test_release_thread_instances_clears_slot() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .per_thread()
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let before = kernel.get::<Counter>().unwrap();
    kernel.release(&before);
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    kernel.release_thread_instances();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    let after = kernel.get::<Counter>().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn test_thread_instances_torn_down_when_thread_ends() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .per_thread()
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let workers: Vec<_> = (0..5)
        .map(|_| {
            let kernel = kernel.clone();
            thread::spawn(move || {
                let a = kernel.get::<Counter>().unwrap();
                let b = kernel.get::<Counter>().unwrap();
                assert!(Arc::ptr_eq(&a, &b));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(destroyed.load(Ordering::SeqCst), 5);
    assert_eq!(kernel.tracked_count(), 0);
}

#[test]
fn test_thread_ending_after_dispose_is_harmless() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .per_thread()
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let resolved = Arc::new(Barrier::new(2));
    let disposed = Arc::new(Barrier::new(2));
    let worker = {
        let kernel = kernel.clone();
        let (resolved, disposed) = (resolved.clone(), disposed.clone());
        thread::spawn(move || {
            let _counter = kernel.get::<Counter>().unwrap();
            resolved.wait();
            disposed.wait();
        })
    };

    resolved.wait();
    kernel.dispose();
    disposed.wait();
    worker.join().unwrap();

    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_thread_lifestyle_instances_are_per_kernel() {
    let build = || {
        let mut builder = KernelBuilder::new();
        builder.add_thread(|_| Counter { id: next_id() });
        builder.build()
    };
    let k1 = build();
    let k2 = build();

    assert!(!Arc::ptr_eq(
        &k1.get::<Counter>().unwrap(),
        &k2.get::<Counter>().unwrap()
    ));
}

#[test]
fn test_scope_lifestyle_requires_scope() {
    let mut builder = KernelBuilder::new();
    builder.add_scoped(|_| Counter { id: next_id() });
    let kernel = builder.build();

    assert!(matches!(
        kernel.get::<Counter>(),
        Err(KernelError::NoActiveScope(_))
    ));
}

#[test]
fn test_scope_instances_evicted_when_scope_ends() {
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .scoped()
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |c: &Counter| d.lock().unwrap().push(c.id))
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let outer_id;
    {
        let _outer = kernel.begin_scope();
        let outer = kernel.get::<Counter>().unwrap();
        outer_id = outer.id;
        {
            let _inner = kernel.begin_scope();
            let inner = kernel.get::<Counter>().unwrap();
            assert!(!Arc::ptr_eq(&outer, &inner));
            assert!(Arc::ptr_eq(&inner, &kernel.get::<Counter>().unwrap()));

            // Release from a consumer does not end the scoped instance
            kernel.release(&inner);
            assert!(destroyed.lock().unwrap().is_empty());
        }
        assert_eq!(destroyed.lock().unwrap().len(), 1);
        assert!(Arc::ptr_eq(&outer, &kernel.get::<Counter>().unwrap()));
    }

    let destroyed = destroyed.lock().unwrap();
    assert_eq!(destroyed.len(), 2);
    assert_eq!(destroyed[1], outer_id);
    assert_eq!(kernel.tracked_count(), 0);
}

#[test]
fn test_entered_external_scope() {
    let mut builder = KernelBuilder::new();
    builder.add_scoped(|_| Counter { id: next_id() });
    let kernel = builder.build();

    let scope = Arc::new(RequestScope::new());
    let first = {
        let _guard = kernel.enter_scope(scope.clone());
        kernel.get::<Counter>().unwrap()
    };
    // The guard only made it current; the scope is still alive
    assert!(!scope.is_ended());
    assert_eq!(scope.pending_evictions(), 1);

    {
        let _guard = kernel.enter_scope(scope.clone());
        assert!(Arc::ptr_eq(&first, &kernel.get::<Counter>().unwrap()));
    }

    scope.end();
    assert_eq!(scope.pending_evictions(), 0);
}

struct FixedScope(Arc<RequestScope>);

impl ScopeAccessor for FixedScope {
    fn current_scope(&self) -> Option<Arc<dyn LifetimeScope>> {
        let scope: Arc<dyn LifetimeScope> = self.0.clone();
        Some(scope)
    }
}

#[test]
fn test_scope_accessor_supplies_current_scope() {
    let scope = Arc::new(RequestScope::new());

    let mut builder = KernelBuilder::new();
    builder.add_scoped(|_| Counter { id: next_id() });
    builder.scope_accessor(Arc::new(FixedScope(scope.clone())));
    let kernel = builder.build();

    let from_main = kernel.get::<Counter>().unwrap();
    let from_thread = thread::scope(|s| s.spawn(|| kernel.get::<Counter>().unwrap()).join().unwrap());
    assert!(Arc::ptr_eq(&from_main, &from_thread));
}

#[test]
fn test_shared_scope_builds_one_instance_across_threads() {
    let scope = Arc::new(RequestScope::new());
    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let (c, d) = (created.clone(), destroyed.clone());

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .scoped()
            .create(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Counter { id: next_id() }
            })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    builder.scope_accessor(Arc::new(FixedScope(scope.clone())));
    let kernel = builder.build();

    let start = Barrier::new(2);
    let (first, second) = thread::scope(|s| {
        let a = s.spawn(|| {
            start.wait();
            kernel.get::<Counter>().unwrap()
        });
        let b = s.spawn(|| {
            start.wait();
            kernel.get::<Counter>().unwrap()
        });
        (a.join().unwrap(), b.join().unwrap())
    });

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(scope.pending_evictions(), 1);

    scope.end();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(kernel.tracked_count(), 0);
}


#[derive(Default)]
struct UntilReleased {
    current: Mutex<Option<Instance>>,
}

impl CustomLifestyle for UntilReleased {
    fn resolve(&self, create: &mut dyn FnMut() -> KernelResult<Instance>) -> KernelResult<Instance> {
        let mut current = self.current.lock().unwrap();
        if let Some(instance) = current.as_ref() {
            return Ok(instance.clone());
        }
        let instance = create()?;
        *current = Some(instance.clone());
        Ok(instance)
    }

    fn release(&self, instance: InstanceId) -> bool {
        let mut current = self.current.lock().unwrap();
        match current.as_ref() {
            Some(held) if InstanceId::of(held) == instance => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    fn dispose(&self) {
        self.current.lock().unwrap().take();
    }
}

#[test]
fn test_custom_lifestyle_controls_sharing_and_teardown() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Counter>()
            .custom_lifestyle(Arc::new(UntilReleased::default()))
            .create(|_| Counter { id: next_id() })
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let a = kernel.get::<Counter>().unwrap();
    let b = kernel.get::<Counter>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(kernel.tracked_count(), 1);

    kernel.release(&a);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    kernel.release(&b);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    let c = kernel.get::<Counter>().unwrap();
    assert!(!Arc::ptr_eq(&a, &c));

    kernel.dispose();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transient_dependency_of_singleton_lives_with_singleton() {
    struct Leaf;
    struct Holder {
        _leaf: Arc<Leaf>,
    }

    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Leaf>()
            .transient()
            .create(|_| Leaf)
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    builder.register(
        ComponentModel::builder::<Holder>()
            .singleton()
            .depends_on::<Leaf>()
            .create(|deps| Holder {
                _leaf: deps.get_required::<Leaf>(),
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    let holder = kernel.get::<Holder>().unwrap();
    kernel.release(&holder);
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    kernel.dispose();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}
