#![no_main]

use std::sync::Arc;

use ferrous_ioc::{Dependency, DiError, ProxyHandle, Resolver, Scope, ServiceCollection, ServiceDescriptor};
use libfuzzer_sys::fuzz_target;

struct Node(usize);

trait Indexed: Send + Sync {
    fn index(&self) -> usize;
}

struct NodeFacade(ProxyHandle<Node>);

impl Indexed for NodeFacade {
    fn index(&self) -> usize {
        self.0.invoke("index", &[], |n| n.0).unwrap_or(usize::MAX)
    }
}

// Byte layout: node count, then per node a scope byte and a dependency byte.
// Each dependency byte names a target node (possibly missing or itself) and
// whether the dependency is optional.
fuzz_target!(|data: &[u8]| {
    let Some((&count, rest)) = data.split_first() else {
        return;
    };
    let count = (count % 12) as usize + 1;
    if rest.len() < count * 2 {
        return;
    }

    let mut services = ServiceCollection::new();
    for (i, spec) in rest.chunks_exact(2).take(count).enumerate() {
        let scope = match spec[0] % 3 {
            0 => Scope::Singleton,
            1 => Scope::Prototype,
            _ => Scope::Proxy,
        };
        let mut builder = ServiceDescriptor::service::<Node>()
            .qualifier(format!("n{}", i))
            .scope(scope);
        if scope == Scope::Proxy {
            builder = builder.proxy::<dyn Indexed, _>(|handle| Arc::new(NodeFacade(handle)));
        }
        if spec[1] & 0x80 != 0 {
            let target = (spec[1] & 0x0f) as usize;
            let mut dependency = Dependency::of::<Node>().named(format!("n{}", target));
            if spec[1] & 0x40 != 0 {
                dependency = dependency.optional();
            }
            builder = builder.depends_on(dependency);
        }
        services.add(builder.constructor(move |_| Ok(Node(i))));
    }

    match services.build() {
        Ok(provider) => {
            for i in 0..count {
                let node = provider
                    .get_named::<Node>(&format!("n{}", i))
                    .expect("every built node is registered");
                assert_eq!(node.0, i);
                if let Ok(facade) = provider.get_named_trait::<dyn Indexed>(&format!("n{}", i)) {
                    assert_eq!(facade.index(), i);
                }
            }
            assert_eq!(provider.construction_order().len(), count);
            provider.destroy_all().expect("no hooks to fail");
        }
        Err(DiError::Circular(path)) => {
            assert!(path.len() >= 2);
            assert_eq!(path.first(), path.last());
        }
        Err(DiError::MissingDependency { .. }) => {}
        Err(other) => panic!("unexpected bootstrap error: {}", other),
    }
});
