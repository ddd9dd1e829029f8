use ferrous_ioc::{
    key_of_type, AnyArc, ConfigValue, ConfigValueResolver, Dependency, DependencyParam, DiError, DiResult,
    EnvironmentConfigSource, ExternalResolver, InjectorConfig, MapConfigSource, Marker, Resolver, ServiceCollection,
    ServiceDescriptor,
};
use serial_test::serial;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Supplies `u16` values, counting how often it was asked.
struct PortResolver {
    port: u16,
    calls: AtomicUsize,
}

impl PortResolver {
    fn new(port: u16) -> Arc<Self> {
        Arc::new(Self {
            port,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExternalResolver for PortResolver {
    fn can_resolve(&self, param: &DependencyParam) -> bool {
        param.key() == &key_of_type::<u16>()
    }

    fn resolve(&self, _param: &DependencyParam) -> DiResult<AnyArc> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.port))
    }

    fn name(&self) -> &str {
        "PortResolver"
    }
}

struct Server {
    port: u16,
}

fn server(dependency: Dependency) -> ServiceDescriptor {
    ServiceDescriptor::service::<Server>()
        .depends_on(dependency)
        .constructor(|args| {
            Ok(Server {
                port: args.optional::<u16>(0).map(|p| *p).unwrap_or(0),
            })
        })
        .build()
}

#[test]
fn test_resolver_supplies_unbound_parameter() {
    let resolver = PortResolver::new(8080);
    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>()));

    let sp = sc
        .build_with(InjectorConfig::new().with_resolver(resolver.clone()))
        .unwrap();
    assert_eq!(sp.get_required::<Server>().port, 8080);
    assert_eq!(resolver.calls(), 1);

    let details = sp.service_details(&key_of_type::<Server>(), None).unwrap();
    assert!(details.state == ferrous_ioc::ServiceState::Instantiated);
}

#[test]
fn test_producers_take_precedence_over_resolvers() {
    let resolver = PortResolver::new(8080);
    let mut sc = ServiceCollection::new();
    sc.add_instance(9090u16);
    sc.add(server(Dependency::of::<u16>()));

    let sp = sc
        .build_with(InjectorConfig::new().with_resolver(resolver.clone()))
        .unwrap();
    assert_eq!(sp.get_required::<Server>().port, 9090);
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn test_first_claiming_resolver_wins() {
    let first = PortResolver::new(1);
    let second = PortResolver::new(2);
    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>()));

    let config = InjectorConfig::new()
        .with_resolver(first.clone())
        .with_resolver(second.clone());
    let sp = sc.build_with(config).unwrap();

    assert_eq!(sp.get_required::<Server>().port, 1);
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_qualified_parameter_never_reaches_resolvers() {
    let resolver = PortResolver::new(8080);
    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>().named("admin")));

    let err = sc
        .build_with(InjectorConfig::new().with_resolver(resolver.clone()))
        .unwrap_err();
    assert!(matches!(err, DiError::MissingDependency { qualifier: Some(_), .. }));
    assert!(err.to_string().ends_with("Qualifier 'admin' was not found."));
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn test_unclaimed_optional_parameter_is_absent() {
    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>().optional()));

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_required::<Server>().port, 0);
}

#[test]
fn test_reload_asks_the_resolver_again() {
    let resolver = PortResolver::new(8080);
    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>()));

    let sp = sc
        .build_with(InjectorConfig::new().with_resolver(resolver.clone()))
        .unwrap();
    sp.reload::<Server>().unwrap();
    assert_eq!(resolver.calls(), 2);
}

#[test]
fn test_config_values_from_map_source() {
    struct Database {
        url: String,
        pool: i64,
        verbose: bool,
    }

    let source = MapConfigSource::new()
        .with("db.url", ConfigValue::String("postgres://localhost".into()))
        .with("db.pool", ConfigValue::Integer(16))
        .with("db.verbose", ConfigValue::String("true".into()));
    let resolver = ConfigValueResolver::new().with_source(Arc::new(source));

    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Database>()
            .depends_on(Dependency::of::<String>().marked(Marker::value("db.url")))
            .depends_on(Dependency::of::<i64>().marked(Marker::value("db.pool")))
            .depends_on(Dependency::of::<bool>().marked(Marker::value("db.verbose")))
            .constructor(|args| {
                Ok(Database {
                    url: args.get::<String>(0)?.to_string(),
                    pool: *args.get::<i64>(1)?,
                    verbose: *args.get::<bool>(2)?,
                })
            }),
    );

    let sp = sc
        .build_with(InjectorConfig::new().with_resolver(Arc::new(resolver)))
        .unwrap();
    let db = sp.get_required::<Database>();
    assert_eq!(db.url, "postgres://localhost");
    assert_eq!(db.pool, 16);
    assert!(db.verbose);
}

#[test]
fn test_missing_config_key_is_missing_dependency() {
    struct Api;

    let resolver = ConfigValueResolver::new().with_source(Arc::new(MapConfigSource::new()));
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Api>()
            .depends_on(Dependency::of::<String>().marked(Marker::value("api.key")))
            .constructor(|_| Ok(Api)),
    );

    let err = sc
        .build_with(InjectorConfig::new().with_resolver(Arc::new(resolver)))
        .unwrap_err();
    assert!(matches!(err, DiError::MissingDependency { .. }));
}

#[test]
#[serial]
fn test_config_values_from_environment() {
    struct Worker {
        threads: i64,
        name: String,
    }

    env::set_var("IOCWORKER_WORKER_THREADS", "4");
    env::set_var("IOCWORKER_WORKER_NAME", "indexer");

    let resolver = ConfigValueResolver::new().with_source(Arc::new(EnvironmentConfigSource::with_prefix("iocworker")));
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Worker>()
            .depends_on(Dependency::of::<i64>().marked(Marker::value("worker.threads")))
            .depends_on(Dependency::of::<String>().marked(Marker::value("worker-name")))
            .constructor(|args| {
                Ok(Worker {
                    threads: *args.get::<i64>(0)?,
                    name: args.get::<String>(1)?.to_string(),
                })
            }),
    );

    let result = sc.build_with(InjectorConfig::new().with_resolver(Arc::new(resolver)));

    env::remove_var("IOCWORKER_WORKER_THREADS");
    env::remove_var("IOCWORKER_WORKER_NAME");

    let worker = result.unwrap().get_required::<Worker>();
    assert_eq!(worker.threads, 4);
    assert_eq!(worker.name, "indexer");
}

#[test]
fn test_resolver_failure_names_the_consuming_service() {
    struct UnsetPort;

    impl ExternalResolver for UnsetPort {
        fn can_resolve(&self, param: &DependencyParam) -> bool {
            param.key() == &key_of_type::<u16>()
        }

        fn resolve(&self, _param: &DependencyParam) -> DiResult<AnyArc> {
            Err(DiError::Config("port is not set".into()))
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add(server(Dependency::of::<u16>()));

    let err = sc
        .build_with(InjectorConfig::new().with_resolver(Arc::new(UnsetPort)))
        .unwrap_err();
    match &err {
        DiError::Construction { service, source } => {
            assert!(service.ends_with("Server"));
            assert!(matches!(source.downcast_ref::<DiError>(), Some(DiError::Config(_))));
        }
        other => panic!("expected construction error, got {}", other),
    }
    assert!(err.to_string().ends_with("Invalid configuration: port is not set"));
}
