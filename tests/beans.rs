use ferrous_ioc::{Dependency, DiError, Marker, Resolver, ServiceCollection, ServiceDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Pool {
    url: String,
}

struct Connection {
    url: String,
    serial: usize,
}

struct Repository {
    conn: Arc<Connection>,
}

fn repository() -> ServiceDescriptor {
    ServiceDescriptor::service::<Repository>()
        .depends_on(Dependency::of::<Connection>())
        .constructor(|args| {
            Ok(Repository {
                conn: args.get::<Connection>(0)?,
            })
        })
        .build()
}

fn pool(serials: Arc<AtomicUsize>) -> ServiceDescriptor {
    ServiceDescriptor::service::<Pool>()
        .constructor(|_| {
            Ok(Pool {
                url: "postgres://db".into(),
            })
        })
        .bean(
            move |pool: &Pool| {
                Ok(Connection {
                    url: pool.url.clone(),
                    serial: serials.fetch_add(1, Ordering::SeqCst),
                })
            },
            |b| b,
        )
        .build()
}

#[test]
fn test_bean_is_produced_from_parent() {
    let mut sc = ServiceCollection::new();
    let parent = sc.add(pool(Arc::new(AtomicUsize::new(0))));

    let sp = sc.build().unwrap();
    let conn = sp.get_required::<Connection>();
    assert_eq!(conn.url, "postgres://db");

    let beans = sp.services_by_marker(&Marker::BEAN);
    assert_eq!(beans.len(), 1);
    assert_eq!(beans[0].parent, Some(parent));
}

#[test]
fn test_consumer_registered_first_is_built_after_bean() {
    let mut sc = ServiceCollection::new();
    let repo = sc.add(repository());
    let pool_id = sc.add(pool(Arc::new(AtomicUsize::new(0))));
    let conn_id = sc.descriptor(pool_id).unwrap().beans()[0];

    let sp = sc.build().unwrap();
    assert_eq!(sp.construction_order(), &[pool_id, conn_id, repo]);
    assert!(Arc::ptr_eq(&sp.get_required::<Repository>().conn, &sp.get_required::<Connection>()));
}

#[test]
fn test_bean_qualifier_selects_bean() {
    struct Reader(Arc<Connection>);

    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Pool>()
            .constructor(|_| Ok(Pool { url: "primary".into() }))
            .bean(
                |p: &Pool| {
                    Ok(Connection {
                        url: format!("{}-rw", p.url),
                        serial: 0,
                    })
                },
                |b| b.qualifier("writer"),
            )
            .bean(
                |p: &Pool| {
                    Ok(Connection {
                        url: format!("{}-ro", p.url),
                        serial: 0,
                    })
                },
                |b| b.qualifier("reader"),
            ),
    );
    sc.add(
        ServiceDescriptor::service::<Reader>()
            .depends_on(Dependency::of::<Connection>().named("reader"))
            .constructor(|args| Ok(Reader(args.get::<Connection>(0)?))),
    );

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_required::<Reader>().0.url, "primary-ro");
    assert_eq!(sp.get_named_required::<Connection>("writer").url, "primary-rw");
    assert_eq!(sp.get_all::<Connection>().unwrap().len(), 2);
}

#[test]
fn test_reloading_parent_rebuilds_bean() {
    let serials = Arc::new(AtomicUsize::new(0));
    let mut sc = ServiceCollection::new();
    sc.add(pool(serials.clone()));
    sc.add(repository());

    let sp = sc.build().unwrap();
    let before = sp.get_required::<Connection>();
    assert_eq!(before.serial, 0);

    sp.reload::<Pool>().unwrap();
    let after = sp.get_required::<Connection>();
    assert_eq!(after.serial, 1);

    // Plain reload does not touch consumers.
    assert!(Arc::ptr_eq(&sp.get_required::<Repository>().conn, &before));
}

#[test]
fn test_cascade_from_parent_reaches_bean_consumers() {
    let serials = Arc::new(AtomicUsize::new(0));
    let mut sc = ServiceCollection::new();
    let pool_id = sc.add(pool(serials));
    let repo = sc.add(repository());

    let sp = sc.build().unwrap();
    let reloaded = sp.reload_cascade::<Pool>().unwrap();
    assert_eq!(reloaded, vec![pool_id, repo]);
    assert_eq!(sp.get_required::<Repository>().conn.serial, 1);
}

#[test]
fn test_nested_beans_follow_their_parent() {
    struct Statement(String);

    let log = Arc::new(Mutex::new(Vec::new()));
    let (lp, lc, ls) = (log.clone(), log.clone(), log.clone());

    let mut sc = ServiceCollection::new();
    let root = sc.add(
        ServiceDescriptor::service::<Pool>()
            .constructor(move |_| {
                lp.lock().unwrap().push("pool");
                Ok(Pool { url: "db".into() })
            })
            .bean(
                move |p: &Pool| {
                    lc.lock().unwrap().push("connection");
                    Ok(Connection {
                        url: p.url.clone(),
                        serial: 0,
                    })
                },
                move |b| {
                    b.bean(
                        move |c: &Connection| {
                            ls.lock().unwrap().push("statement");
                            Ok(Statement(format!("SELECT 1 -- {}", c.url)))
                        },
                        |s| s,
                    )
                },
            ),
    );

    let sp = sc.build().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["pool", "connection", "statement"]);
    assert_eq!(sp.get_required::<Statement>().0, "SELECT 1 -- db");

    let conn = sp.construction_order()[1];
    let stmt = sp.details_of(sp.construction_order()[2]).unwrap();
    assert_eq!(stmt.parent, Some(conn));
    assert_eq!(sp.details_of(conn).unwrap().parent, Some(root));
}

#[test]
fn test_bean_hooks_run() {
    let started = Arc::new(AtomicUsize::new(0));
    let s = started.clone();

    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Pool>()
            .constructor(|_| Ok(Pool { url: "db".into() }))
            .bean(
                |p: &Pool| {
                    Ok(Connection {
                        url: p.url.clone(),
                        serial: 0,
                    })
                },
                move |b| {
                    b.post_construct(move |_| {
                        s.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                },
            ),
    );

    let sp = sc.build().unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    sp.reload::<Pool>().unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[test]
fn test_bean_constructor_parameters_are_rejected() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<Pool>()
            .constructor(|_| {
                Ok(Pool {
                    url: "postgres://db".into(),
                })
            })
            .bean(
                |pool: &Pool| {
                    Ok(Connection {
                        url: pool.url.clone(),
                        serial: 0,
                    })
                },
                |b| b.depends_on(Dependency::of::<u8>()),
            ),
    );

    match sc.build() {
        Err(DiError::Construction { service, source }) => {
            assert!(service.ends_with("Connection"));
            assert!(source.to_string().contains("no constructor parameters"));
        }
        other => panic!("expected construction error, got {:?}", other.err()),
    }
}
