//! 容器行为的集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wirebox::infrastructure::container::{
    ArgumentSpec, ContainerError, ContainerState, ReferenceKind, Scope, ServiceContainer,
    ServiceDefinition,
};

/// 测试用的服务
#[derive(Debug)]
struct Database {
    dsn: String,
}

#[derive(Debug)]
struct Repository {
    db: Arc<Database>,
    table: String,
}

#[derive(Debug)]
struct Request {
    id: usize,
}

fn database() -> ServiceDefinition {
    ServiceDefinition::from_fn(|args| {
        Ok(Database {
            dsn: args.str(0)?.to_string(),
        })
    })
    .arg(ArgumentSpec::parameter("dsn"))
}

fn repository() -> ServiceDefinition {
    ServiceDefinition::from_fn(|args| {
        Ok(Repository {
            db: args.service::<Database>(0)?,
            table: args.str(1)?.to_string(),
        })
    })
    .arg(ArgumentSpec::service("db"))
    .arg(ArgumentSpec::value("users"))
}

fn wired_container() -> ServiceContainer {
    let mut container = ServiceContainer::new();
    container.set_parameter("dsn", "sqlite::memory:").unwrap();
    container.register("db", database()).unwrap();
    container.register("users", repository()).unwrap();
    container
}

#[test]
fn test_dependencies_are_wired_by_reference() {
    let mut container = wired_container();
    container.compile().unwrap();

    let users = container.get_as::<Repository>("users").unwrap();
    let db = container.get_as::<Database>("db").unwrap();

    assert_eq!(users.table, "users");
    assert_eq!(users.db.dsn, "sqlite::memory:");
    assert!(Arc::ptr_eq(&users.db, &db));
}

#[test]
fn test_singleton_identity() {
    let mut container = wired_container();
    container.compile().unwrap();

    let first = container.get("users").unwrap();
    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &container.get("users").unwrap()));
    }
}

#[test]
fn test_transient_distinctness() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();
    let mut container = ServiceContainer::new();
    container
        .register(
            "request",
            ServiceDefinition::from_fn(move |_| {
                Ok(Request {
                    id: counter_clone.fetch_add(1, Ordering::SeqCst),
                })
            })
            .scope(Scope::Transient),
        )
        .unwrap();
    container.compile().unwrap();

    let a = container.get_as::<Request>("request").unwrap();
    let b = container.get_as::<Request>("request").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.id, b.id);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transient_dependency_shares_singleton() {
    let mut container = wired_container();
    container
        .register(
            "request",
            ServiceDefinition::from_fn(|args| args.service::<Repository>(0).map_err(Into::into))
                .arg(ArgumentSpec::service("users"))
                .transient(),
        )
        .unwrap();
    container.compile().unwrap();

    let a = container.get_as::<Arc<Repository>>("request").unwrap();
    let b = container.get_as::<Arc<Repository>>("request").unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&*a, &*b));
}

#[test]
fn test_cycle_detection() {
    let mut container = ServiceContainer::new();
    container
        .register("a", ServiceDefinition::from_fn(|_| Ok(())).arg(ArgumentSpec::service("b")))
        .unwrap();
    container
        .register("b", ServiceDefinition::from_fn(|_| Ok(())).arg(ArgumentSpec::service("a")))
        .unwrap();

    let err = container.compile().unwrap_err();

    match err {
        ContainerError::CyclicDependency { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
        other => panic!("expected a cycle error, got {other}"),
    }
    assert_eq!(container.state(), ContainerState::Open);
}

#[test]
fn test_transient_cycle_is_rejected() {
    let mut container = ServiceContainer::new();
    container
        .register(
            "a",
            ServiceDefinition::from_fn(|_| Ok(())).arg(ArgumentSpec::service("b")).transient(),
        )
        .unwrap();
    container
        .register("b", ServiceDefinition::from_fn(|_| Ok(())).arg(ArgumentSpec::service("a")))
        .unwrap();

    assert!(matches!(
        container.compile(),
        Err(ContainerError::CyclicDependency { .. })
    ));
}

#[test]
fn test_unresolved_reference_names_missing_id() {
    let mut container = ServiceContainer::new();
    container
        .register("a", ServiceDefinition::from_fn(|_| Ok(())).arg(ArgumentSpec::service("x")))
        .unwrap();

    let err = container.compile().unwrap_err();

    assert!(matches!(
        err,
        ContainerError::UnresolvedReference { ref service, ref reference, kind: ReferenceKind::Service }
            if service == "a" && reference == "x"
    ));
    assert!(err.to_string().contains("'x'"));
}

#[test]
fn test_register_after_compile_is_illegal() {
    let mut container = wired_container();
    container.compile().unwrap();

    let err = container
        .register("late", ServiceDefinition::from_fn(|_| Ok(())))
        .unwrap_err();

    assert!(matches!(
        err,
        ContainerError::IllegalState { state: ContainerState::Sealed, .. }
    ));
    assert!(!container.has("late"));
}

#[test]
fn test_unknown_service() {
    let mut container = wired_container();
    container.compile().unwrap();

    assert!(matches!(
        container.get("missing"),
        Err(ContainerError::UnknownService { ref id }) if id == "missing"
    ));
}

#[test]
fn test_failed_construction_is_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    let mut container = ServiceContainer::new();
    container
        .register(
            "flaky",
            ServiceDefinition::from_fn(move |_| {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(std::io::Error::other("connection refused").into())
                } else {
                    Ok(42u32)
                }
            }),
        )
        .unwrap();
    container.compile().unwrap();

    let err = container.get("flaky").unwrap_err();
    let source = err.creation_source().expect("factory error is kept");
    assert!(source.downcast_ref::<std::io::Error>().is_some());
    assert_eq!(source.to_string(), "connection refused");

    assert_eq!(*container.get_as::<u32>("flaky").unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(container.stats().failed_creations, 1);
}

#[test]
fn test_dependency_failure_propagates_unchanged() {
    let built = Arc::new(AtomicUsize::new(0));
    let built_clone = built.clone();
    let mut container = ServiceContainer::new();
    container
        .register(
            "broken",
            ServiceDefinition::from_fn(|_| -> Result<(), _> { Err("boom".into()) }),
        )
        .unwrap();
    container
        .register(
            "consumer",
            ServiceDefinition::from_fn(move |_| Ok(built_clone.fetch_add(1, Ordering::SeqCst)))
                .arg(ArgumentSpec::value(1))
                .arg(ArgumentSpec::service("broken")),
        )
        .unwrap();
    container.compile().unwrap();

    let err = container.get("consumer").unwrap_err();

    assert!(matches!(err, ContainerError::ServiceCreationFailed { ref id, .. } if id == "broken"));
    assert_eq!(built.load(Ordering::SeqCst), 0);
    assert_eq!(container.stats().active_singletons, 0);
}

#[test]
fn test_resolution_order_does_not_change_final_state() {
    let build = || {
        let mut container = wired_container();
        container
            .register("cache", ServiceDefinition::from_fn(|_| Ok(String::from("cache"))))
            .unwrap();
        container.compile().unwrap();
        container
    };
    let ids = ["db", "users", "cache"];
    let permutations = [[0, 1, 2], [1, 0, 2], [2, 1, 0], [1, 2, 0]];

    let mut observed = Vec::new();
    for order in permutations {
        let container = build();
        for index in order {
            container.get(ids[index]).unwrap();
        }
        let users = container.get_as::<Repository>("users").unwrap();
        let db = container.get_as::<Database>("db").unwrap();
        assert!(Arc::ptr_eq(&users.db, &db));
        observed.push((container.stats().active_singletons, db.dsn.clone()));
    }

    assert!(observed.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(observed[0].0, 3);
}

#[test]
fn test_compile_summary_order() {
    let mut container = wired_container();

    let summary = container.compile().unwrap();

    assert_eq!(summary.order, vec!["db", "users"]);
    assert_eq!(summary.singletons, 2);
    assert_eq!(summary.transients, 0);
    assert_eq!(summary.parameters, 1);
    assert_eq!(container.summary(), Some(&summary));
}

/// 依赖链：svc0 <- svc1 <- ... <- svc{depth-1}，每个服务的值是链上的位置
fn chain(depth: usize) -> ServiceContainer {
    let mut container = ServiceContainer::new();
    container
        .register("svc0", ServiceDefinition::from_fn(|_| Ok(0usize)))
        .unwrap();
    for i in 1..depth {
        container
            .register(
                format!("svc{}", i),
                ServiceDefinition::from_fn(|args| Ok(*args.service::<usize>(0)? + 1))
                    .arg(ArgumentSpec::service(format!("svc{}", i - 1))),
            )
            .unwrap();
    }
    container
}

#[test]
fn test_deep_singleton_chain_resolves() {
    let mut container = chain(5_000);
    container.compile().unwrap();

    assert_eq!(*container.get_as::<usize>("svc4999").unwrap(), 4_999);
    assert_eq!(container.stats().active_singletons, 5_000);
}

#[test]
fn test_deep_chain_behind_transient_resolves() {
    let mut container = chain(5_000);
    container
        .register(
            "request",
            ServiceDefinition::from_fn(|args| Ok(*args.service::<usize>(0)? * 2))
                .arg(ArgumentSpec::service("svc4999"))
                .transient(),
        )
        .unwrap();
    container.compile().unwrap();

    assert_eq!(*container.get_as::<usize>("request").unwrap(), 9_998);
}

/// 记录工厂调用顺序的服务，`fail` 为真时构造失败
fn logged(log: &Arc<Mutex<Vec<String>>>, name: &str, fail: bool) -> ServiceDefinition {
    let log = log.clone();
    let name = name.to_string();
    ServiceDefinition::from_fn(move |_| {
        log.lock().unwrap().push(name.clone());
        if fail {
            Err(format!("{} is unavailable", name).into())
        } else {
            Ok(name.clone())
        }
    })
}

#[test]
fn test_first_failing_argument_abandons_construction() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut container = ServiceContainer::new();
    container.register("first", logged(&log, "first", true)).unwrap();
    container.register("second", logged(&log, "second", false)).unwrap();
    container
        .register(
            "top",
            logged(&log, "top", false)
                .arg(ArgumentSpec::service("first"))
                .arg(ArgumentSpec::service("second")),
        )
        .unwrap();
    container.compile().unwrap();

    let err = container.get("top").unwrap_err();

    assert!(matches!(err, ContainerError::ServiceCreationFailed { ref id, .. } if id == "first"));
    assert_eq!(*log.lock().unwrap(), vec!["first"]);
    assert_eq!(container.stats().active_singletons, 0);
}

#[test]
fn test_arguments_resolve_left_to_right() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut container = ServiceContainer::new();
    // 注册顺序与参数顺序相反
    container.register("second", logged(&log, "second", false)).unwrap();
    container.register("first", logged(&log, "first", false)).unwrap();
    container.register("leaf", logged(&log, "leaf", false)).unwrap();
    container
        .register(
            "middle",
            logged(&log, "middle", false)
                .arg(ArgumentSpec::service("leaf"))
                .transient(),
        )
        .unwrap();
    container
        .register(
            "top",
            logged(&log, "top", false)
                .arg(ArgumentSpec::service("first"))
                .arg(ArgumentSpec::service("middle"))
                .arg(ArgumentSpec::service("second")),
        )
        .unwrap();
    container.compile().unwrap();

    container.get("top").unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "leaf", "middle", "second", "top"]
    );
}
