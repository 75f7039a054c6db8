use ferrous_kernel::{service_of, ComponentModel, KernelBuilder, KernelError};
use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Refused;

impl std::fmt::Display for Refused {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection refused")
    }
}

impl std::error::Error for Refused {}

#[test]
fn test_activation_failure_is_wrapped_with_model() {
    struct Database;

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Database>()
            .transient()
            .try_create(|_| Err(Refused.into()))
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    match kernel.get::<Database>() {
        Err(err @ KernelError::Activation { .. }) => {
            assert!(err.to_string().contains("Database"));
            assert_eq!(err.source().unwrap().to_string(), "connection refused");
        }
        other => panic!("expected activation failure, got {:?}", other.err()),
    }
}

#[test]
fn test_activation_failure_releases_resolved_siblings() {
    let log = Arc::new(Mutex::new(Vec::new()));

    struct First;
    struct Second;
    struct Failing;

    let mut builder = KernelBuilder::new();
    let l = log.clone();
    builder.register(
        ComponentModel::builder::<First>()
            .transient()
            .create(|_| First)
            .on_destroy(move |_| l.lock().unwrap().push("first"))
            .build()
            .unwrap(),
    );
    let l = log.clone();
    builder.register(
        ComponentModel::builder::<Second>()
            .transient()
            .create(|_| Second)
            .on_destroy(move |_| l.lock().unwrap().push("second"))
            .build()
            .unwrap(),
    );
    builder.register(
        ComponentModel::builder::<Failing>()
            .transient()
            .depends_on::<First>()
            .depends_on::<Second>()
            .try_create(|_| Err("boom".into()))
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    assert!(kernel.get::<Failing>().is_err());
    // Released newest first
    assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    assert_eq!(kernel.tracked_count(), 0);
}

#[test]
fn test_missing_required_dependency() {
    struct Missing;
    struct Consumer;

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Consumer>()
            .transient()
            .depends_on::<Missing>()
            .create(|_| Consumer)
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    match kernel.get::<Consumer>() {
        Err(KernelError::Resolution { requester, missing }) => {
            assert_eq!(requester, service_of::<Consumer>());
            assert_eq!(missing, service_of::<Missing>());
        }
        other => panic!("expected resolution error, got {:?}", other.err()),
    }
}

#[test]
fn test_missing_dependency_releases_earlier_dependencies() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let d = destroyed.clone();

    struct Present;
    struct Missing;
    struct Consumer;

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Present>()
            .transient()
            .create(|_| Present)
            .on_destroy(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );
    builder.register(
        ComponentModel::builder::<Consumer>()
            .transient()
            .depends_on::<Present>()
            .depends_on::<Missing>()
            .create(|_| Consumer)
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    assert!(matches!(
        kernel.get::<Consumer>(),
        Err(KernelError::Resolution { .. })
    ));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_optional_dependency_skipped_when_missing() {
    struct Metrics;
    struct Service {
        metrics: Option<Arc<Metrics>>,
    }

    let service_model = || {
        ComponentModel::builder::<Service>()
            .transient()
            .optional::<Metrics>()
            .create(|deps| Service {
                metrics: deps.get::<Metrics>(),
            })
            .build()
            .unwrap()
    };

    let mut builder = KernelBuilder::new();
    builder.register(service_model());
    let kernel = builder.build();
    assert!(kernel.get::<Service>().unwrap().metrics.is_none());

    let mut builder = KernelBuilder::new();
    builder.register(service_model());
    builder.add_singleton(|_| Metrics);
    let kernel = builder.build();
    assert!(kernel.get::<Service>().unwrap().metrics.is_some());
}

#[test]
fn test_failed_singleton_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();

    struct Flaky;

    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<Flaky>()
            .singleton()
            .try_create(move |_| {
                if a.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first attempt fails".into())
                } else {
                    Ok(Flaky)
                }
            })
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    assert!(kernel.get::<Flaky>().is_err());
    let first = kernel.get::<Flaky>().unwrap();
    let second = kernel.get::<Flaky>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_models_rejected() {
    struct Widget;

    assert!(matches!(
        ComponentModel::builder::<Widget>().build(),
        Err(KernelError::InvalidModel { .. })
    ));
    assert!(matches!(
        ComponentModel::builder::<Widget>().pooled(0, 0).create(|_| Widget).build(),
        Err(KernelError::InvalidModel { .. })
    ));
}

#[test]
fn test_type_mismatch_on_named_lookup() {
    let mut builder = KernelBuilder::new();
    builder.register(
        ComponentModel::builder::<u64>()
            .named("answer")
            .create(|_| 42u64)
            .build()
            .unwrap(),
    );
    let kernel = builder.build();

    assert_eq!(*kernel.get_named::<u64>("answer").unwrap(), 42);
    assert!(matches!(
        kernel.get_named::<i32>("answer"),
        Err(KernelError::TypeMismatch(_))
    ));
}

#[test]
#[should_panic(expected = "Failed to resolve")]
fn test_get_required_panics_on_missing() {
    struct Nothing;
    KernelBuilder::new().build().get_required::<Nothing>();
}
