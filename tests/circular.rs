use ferrous_ioc::{
    resolve_dependencies, Dependency, DiError, InjectorConfig, Resolver, ServiceCollection, ServiceDescriptor,
};

struct A;
struct B;
struct C;

/// Helper: assert that building fails with a circular path whose short
/// type names are `expected_path`.
fn assert_circular(sc: ServiceCollection, expected_path: &[&str]) {
    match sc.build() {
        Err(DiError::Circular(path)) => {
            let short: Vec<&str> = path
                .iter()
                .map(|p| p.rsplit("::").next().unwrap_or(p))
                .collect();
            assert_eq!(short, expected_path, "wrong circular path");
        }
        Err(other) => panic!("expected circular error, got {}", other),
        Ok(_) => panic!("expected circular error, build succeeded"),
    }
}

#[test]
fn two_node_cycle_reports_full_path() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .depends_on(Dependency::of::<B>())
            .constructor(|_| Ok(A)),
    );
    sc.add(
        ServiceDescriptor::service::<B>()
            .depends_on(Dependency::of::<A>())
            .constructor(|_| Ok(B)),
    );

    assert_circular(sc, &["A", "B", "A"]);
}

#[test]
fn three_node_cycle_starts_at_reentered_service() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .depends_on(Dependency::of::<B>())
            .constructor(|_| Ok(A)),
    );
    sc.add(
        ServiceDescriptor::service::<B>()
            .depends_on(Dependency::of::<C>())
            .constructor(|_| Ok(B)),
    );
    sc.add(
        ServiceDescriptor::service::<C>()
            .depends_on(Dependency::of::<B>())
            .constructor(|_| Ok(C)),
    );

    // A is on the trace but not part of the loop.
    assert_circular(sc, &["B", "C", "B"]);
}

#[test]
fn self_loop_is_circular() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .depends_on(Dependency::of::<A>())
            .constructor(|_| Ok(A)),
    );

    assert_circular(sc, &["A", "A"]);
}

#[test]
fn depending_on_own_bean_is_circular() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .depends_on(Dependency::of::<B>())
            .constructor(|_| Ok(A))
            .bean(|_: &A| Ok(B), |b| b),
    );

    assert_circular(sc, &["A", "A"]);
}

#[test]
fn field_cycle_is_circular() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .field(Dependency::of::<B>(), |_, _| Ok(()))
            .constructor(|_| Ok(A)),
    );
    sc.add(
        ServiceDescriptor::service::<B>()
            .depends_on(Dependency::of::<A>())
            .constructor(|_| Ok(B)),
    );

    assert_circular(sc, &["A", "B", "A"]);
}

#[test]
fn optional_cycle_is_still_circular() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<A>()
            .depends_on(Dependency::of::<B>().optional())
            .constructor(|_| Ok(A)),
    );
    sc.add(
        ServiceDescriptor::service::<B>()
            .depends_on(Dependency::of::<A>())
            .constructor(|_| Ok(B)),
    );

    assert_circular(sc, &["A", "B", "A"]);
}

#[test]
fn circular_message_joins_path() {
    let err = DiError::Circular(vec!["A".into(), "B".into(), "A".into()]);
    assert_eq!(err.to_string(), "Circular dependency: A -> B -> A");
}

#[test]
fn depth_guard_from_settings() {
    let mut sc = ServiceCollection::new();
    sc.add(
        ServiceDescriptor::service::<C>()
            .depends_on(Dependency::of::<B>())
            .constructor(|_| Ok(C)),
    );
    sc.add(
        ServiceDescriptor::service::<B>()
            .depends_on(Dependency::of::<A>())
            .constructor(|_| Ok(B)),
    );
    sc.add(ServiceDescriptor::service::<A>().constructor(|_| Ok(A)));

    let err = sc.build_with(InjectorConfig::new().max_depth(2)).unwrap_err();
    assert!(matches!(err, DiError::DepthExceeded(2)));
}

#[test]
fn long_acyclic_chain_resolves_without_depth_limit() {
    struct Link(usize);

    const LEN: usize = 1100;
    let mut sc = ServiceCollection::new();
    for i in (0..LEN).rev() {
        let mut builder = ServiceDescriptor::service::<Link>().qualifier(format!("n{}", i));
        if i > 0 {
            builder = builder.depends_on(Dependency::of::<Link>().named(format!("n{}", i - 1)));
        }
        sc.add(builder.constructor(move |_| Ok(Link(i))));
    }

    let order = resolve_dependencies(sc.descriptors(), &[]).unwrap();
    assert_eq!(order.len(), LEN);

    let sp = sc.build().unwrap();
    assert_eq!(sp.get_named_required::<Link>("n1099").0, LEN - 1);
}
