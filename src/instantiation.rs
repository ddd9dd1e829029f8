//! Instantiation engine: builds the resolved graph and keeps it alive.
//!
//! The engine owns the descriptor arena after bootstrap. Instances live in
//! each descriptor's [`InstanceSlots`](crate::descriptors::InstanceSlots);
//! the registry is the list of descriptor ids in registration order.

use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace, warn};

use crate::compat::is_compatible;
use crate::config::InjectorConfig;
use crate::dependency::{Arguments, DependencyParam, Injected};
use crate::descriptors::{Links, Origin, ServiceDescriptor, ServiceDetails, ServiceId, ServiceState};
use crate::error::{BoxError, DiError, DiResult, HookKind};
use crate::interception::{ChainLink, Chains, MethodAspect, ProxyFactory, ProxyParts, ProxyRequest};
use crate::key::{key_of_trait, Key};
use crate::marker::Marker;
use crate::observer::Observers;
use crate::registration::AnyArc;
use crate::resolution::{DependencyResolver, WorkItem};
use crate::scope::Scope;

pub(crate) struct Engine {
    pub(crate) arena: Vec<ServiceDescriptor>,
    registered: RwLock<Vec<ServiceId>>,
    /// Construction order, each service followed by its beans.
    order: Vec<ServiceId>,
    proxy_factory: Arc<dyn ProxyFactory>,
    observers: Observers,
}

/// Resolves, materializes and starts the graph.
#[instrument(skip_all, fields(services = arena.len()))]
pub(crate) fn bootstrap(mut arena: Vec<ServiceDescriptor>, config: InjectorConfig) -> DiResult<Engine> {
    let started = Instant::now();
    let items = DependencyResolver::new(&arena, &config.resolvers, config.settings.max_depth).resolve()?;
    for item in &items {
        attach_links(&mut arena, item);
    }

    let order: Vec<ServiceId> = items
        .iter()
        .flat_map(WorkItem::flatten)
        .map(WorkItem::id)
        .collect();

    let engine = Engine {
        registered: RwLock::new(Vec::with_capacity(arena.len())),
        arena,
        order,
        proxy_factory: config.proxy_factory.clone(),
        observers: Observers::new(config.observers.clone()),
    };

    if engine.observers.has_observers() {
        for (position, id) in engine.order.iter().enumerate() {
            engine.observers.resolved(&engine.details(*id), position);
        }
    }

    engine.materialize(&items)?;
    engine.run_startup_hooks()?;

    info!(
        services = engine.order.len(),
        registered = engine.registered.read().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "container ready"
    );
    Ok(engine)
}

fn attach_links(arena: &mut [ServiceDescriptor], item: &WorkItem) {
    arena[item.id.0].links = Some(item.links.clone());
    for bean in item.beans() {
        attach_links(arena, bean);
    }
}

impl Engine {
    /// Instantiates every work item in order, beans right after their parent.
    pub(crate) fn materialize(&self, items: &[WorkItem]) -> DiResult<()> {
        for item in items {
            self.renew(item.id)?;
        }
        Ok(())
    }

    fn run_startup_hooks(&self) -> DiResult<()> {
        for id in &self.order {
            let d = &self.arena[id.0];
            let (Some(hook), Some(instance)) = (&d.startup, d.slots.instance()) else {
                continue;
            };
            trace!(service = %d.label(), "startup hook");
            hook(&instance).map_err(|e| self.hook_error(d, HookKind::Startup, e))?;
        }
        Ok(())
    }

    pub(crate) fn descriptor(&self, id: ServiceId) -> DiResult<&ServiceDescriptor> {
        self.arena
            .get(id.0)
            .ok_or_else(|| DiError::NotFound(id.to_string()))
    }

    pub(crate) fn details(&self, id: ServiceId) -> ServiceDetails {
        ServiceDetails::from(&self.arena[id.0])
    }

    pub(crate) fn order(&self) -> &[ServiceId] {
        &self.order
    }

    fn links_of(d: &ServiceDescriptor) -> Arc<Links> {
        d.links.clone().unwrap_or_default()
    }

    /// Builds a new instance of `id` and publishes it, then does the same
    /// for its beans.
    fn renew(&self, id: ServiceId) -> DiResult<()> {
        let started = Instant::now();
        let d = &self.arena[id.0];

        let instance = self.build(d)?;
        *d.slots.instance.write() = Some(instance);
        self.attach_proxy(d)?;
        self.register(id);
        d.slots.set_state(ServiceState::Instantiated);

        debug!(service = %d.label(), scope = %d.scope, "instantiated");
        if self.observers.has_observers() {
            self.observers.instantiated(&ServiceDetails::from(d), started.elapsed());
        }

        for bean in &d.beans {
            self.renew(*bean)?;
        }
        Ok(())
    }

    /// Construction, field injection and post-construct, without publishing.
    fn build(&self, d: &ServiceDescriptor) -> DiResult<AnyArc> {
        let links = Self::links_of(d);
        let instance = self.construct(d, &links)?;
        self.complete(d, &links, &instance)?;
        Ok(instance)
    }

    fn construct(&self, d: &ServiceDescriptor, links: &Links) -> DiResult<AnyArc> {
        match &d.origin {
            Origin::Constructor(ctor) => {
                let values = links
                    .params
                    .iter()
                    .map(|p| self.gather(d, p))
                    .collect::<DiResult<Vec<_>>>()?;
                ctor(&Arguments::new(values)).map_err(|e| DiError::construction(d.label(), e))
            }
            Origin::Factory(factory) => {
                let parent = d
                    .parent
                    .and_then(|p| self.arena[p.0].slots.instance())
                    .ok_or_else(|| DiError::construction(d.label(), "parent service is not instantiated".into()))?;
                factory(&parent).map_err(|e| DiError::construction(d.label(), e))
            }
            Origin::Provided(value) => Ok(value.clone()),
            Origin::Unset => Err(DiError::construction(d.label(), "no constructor registered".into())),
        }
    }

    fn complete(&self, d: &ServiceDescriptor, links: &Links, instance: &AnyArc) -> DiResult<()> {
        for (point, param) in d.fields.iter().zip(links.fields.iter()) {
            let value = self.gather(d, param)?;
            (point.setter)(instance, &value).map_err(|e| DiError::construction(d.label(), e))?;
        }
        if let Some(hook) = &d.post_construct {
            hook(instance).map_err(|e| self.hook_error(d, HookKind::PostConstruct, e))?;
        }
        Ok(())
    }

    /// Value of one linked parameter, in the storage shape of its key.
    fn gather(&self, owner: &ServiceDescriptor, param: &DependencyParam) -> DiResult<Injected> {
        if let Some(resolver) = param.resolver() {
            trace!(service = %owner.label(), resolver = resolver.name(), "external value");
            return resolver
                .resolve(param)
                .map(Injected::One)
                .map_err(|e| DiError::construction(owner.label(), Box::new(e)));
        }

        if param.is_collection() {
            if param.eligible().is_empty() {
                return Ok(Injected::Absent);
            }
            return param
                .eligible()
                .iter()
                .map(|id| self.value_for(*id, param.key()))
                .collect::<DiResult<Vec<_>>>()
                .map(Injected::Many);
        }

        match param.producers().first() {
            Some(id) => self.value_for(*id, param.key()).map(Injected::One),
            None => Ok(Injected::Absent),
        }
    }

    /// What consumers of `key` receive from descriptor `id`.
    ///
    /// The façade for a proxy's façade key, a fresh instance for
    /// prototypes, the shared instance otherwise.
    pub(crate) fn value_for(&self, id: ServiceId, key: &Key) -> DiResult<AnyArc> {
        let d = &self.arena[id.0];

        if let Some(facade) = d.slots.facade_for(key) {
            return Ok(facade);
        }

        let instance = match d.scope {
            Scope::Prototype => self.fresh_instance(id)?,
            _ => d.slots.instance().ok_or_else(|| DiError::NotFound(d.label()))?,
        };
        d.view(&instance, key)
            .ok_or(DiError::TypeMismatch(key.display_name()))
    }

    /// A new unregistered instance of `id`: constructed, wired and
    /// post-constructed.
    pub(crate) fn fresh_instance(&self, id: ServiceId) -> DiResult<AnyArc> {
        let d = &self.arena[id.0];
        trace!(service = %d.label(), "fresh instance");
        self.build(d)
    }

    fn attach_proxy(&self, d: &ServiceDescriptor) -> DiResult<()> {
        if d.scope != Scope::Proxy || d.slots.facade.read().is_some() {
            return Ok(());
        }

        let links = Self::links_of(d);
        let aspect_key = key_of_trait::<dyn MethodAspect>();
        let mut chains: Chains = HashMap::new();
        for link in &links.aspects {
            let value = self.value_for(link.aspect, &aspect_key)?;
            let aspect = value
                .downcast_ref::<Arc<dyn MethodAspect>>()
                .cloned()
                .ok_or(DiError::TypeMismatch(type_name::<dyn MethodAspect>()))?;
            chains.entry(link.method.clone()).or_default().push(ChainLink {
                aspect,
                marker: link.marker.clone(),
            });
        }

        let parts = ProxyParts {
            service: d.type_name(),
            slots: d.slots.clone(),
            chains: Arc::new(chains),
        };
        let facade = self.proxy_factory.create_proxy(&ProxyRequest::new(d, parts))?;
        debug!(service = %d.label(), facade = %facade.key(), aspects = links.aspects.len(), "proxy attached");
        *d.slots.facade.write() = Some(facade);
        Ok(())
    }

    fn register(&self, id: ServiceId) {
        let mut registered = self.registered.write();
        if !registered.contains(&id) {
            registered.push(id);
        }
    }

    fn hook_error(&self, d: &ServiceDescriptor, hook: HookKind, source: BoxError) -> DiError {
        let error = DiError::hook(d.label(), hook, source);
        if self.observers.has_observers() {
            self.observers.hook_failed(&ServiceDetails::from(d), hook, &error.to_string());
        }
        error
    }

    /// Runs pre-destroy on the current instance, keeping it in its slot.
    fn retire(&self, id: ServiceId) -> DiResult<()> {
        let d = &self.arena[id.0];
        let Some(instance) = d.slots.instance() else {
            return Ok(());
        };
        if d.state() == ServiceState::Destroyed {
            return Ok(());
        }

        let result = match &d.pre_destroy {
            Some(hook) => hook(&instance).map_err(|e| self.hook_error(d, HookKind::PreDestroy, e)),
            None => Ok(()),
        };
        d.slots.set_state(ServiceState::Destroyed);
        debug!(service = %d.label(), "destroyed");
        if self.observers.has_observers() {
            self.observers.destroyed(&ServiceDetails::from(d));
        }
        result
    }

    /// Retires the beans of `id`, deepest first, then `id` itself.
    fn retire_tree(&self, id: ServiceId, include_self: bool) -> DiResult<()> {
        let mut first = None;
        for bean in self.arena[id.0].beans.iter().rev() {
            if let Err(e) = self.retire_tree(*bean, true) {
                first.get_or_insert(e);
            }
        }
        if include_self {
            if let Err(e) = self.retire(id) {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Destroys and re-instantiates `id` against its stored links.
    ///
    /// Provided instances are left untouched. A failing pre-destroy hook is
    /// logged and does not stop the reload.
    #[instrument(skip(self), fields(id = %id))]
    pub(crate) fn reload(&self, id: ServiceId) -> DiResult<()> {
        let d = self.descriptor(id)?;
        if d.is_provided() {
            debug!("provided instance left untouched");
            return Ok(());
        }

        let _guard = d.slots.reload.lock();
        if let Err(e) = self.retire_tree(id, true) {
            warn!(error = %e, "pre-destroy failed during reload");
        }
        self.renew(id)?;

        if self.observers.has_observers() {
            self.observers.reloaded(&ServiceDetails::from(d));
        }
        Ok(())
    }

    /// Reloads `id`, then every instantiated service linked to something
    /// reloaded, in construction order.
    ///
    /// A reloaded proxy does not propagate further: its façade already
    /// forwards to the new instance.
    pub(crate) fn reload_cascade(&self, id: ServiceId) -> DiResult<Vec<ServiceId>> {
        let mut changed: HashSet<ServiceId> = HashSet::new();
        let mut reloaded = Vec::new();

        self.reload(id)?;
        self.mark_changed(id, &mut changed);
        reloaded.push(id);

        for other in &self.order {
            let d = &self.arena[other.0];
            if *other == id || d.is_bean() || !d.is_instantiated() {
                continue;
            }
            if !self.tree_references(*other, &changed) {
                continue;
            }
            self.reload(*other)?;
            self.mark_changed(*other, &mut changed);
            reloaded.push(*other);
        }

        debug!(root = %self.arena[id.0].label(), reloaded = reloaded.len(), "cascade complete");
        Ok(reloaded)
    }

    fn mark_changed(&self, id: ServiceId, changed: &mut HashSet<ServiceId>) {
        let d = &self.arena[id.0];
        if d.scope != Scope::Proxy && !d.is_provided() {
            changed.insert(id);
        }
        for bean in &d.beans {
            changed.insert(*bean);
            self.mark_changed(*bean, changed);
        }
    }

    /// Whether `id` or one of its beans links to a changed descriptor.
    fn tree_references(&self, id: ServiceId, changed: &HashSet<ServiceId>) -> bool {
        let d = &self.arena[id.0];
        let own = d
            .links
            .as_ref()
            .is_some_and(|links| changed.iter().any(|c| links.references(*c)));
        own || d.beans.iter().any(|bean| self.tree_references(*bean, changed))
    }

    /// Replaces the instance of `id` with `instance`.
    ///
    /// Fields are re-injected and post-construct re-runs on the new instance,
    /// beans are rebuilt from it. A façade keeps pointing at the slot, so
    /// proxy consumers see the new instance on their next call.
    #[instrument(skip(self, instance), fields(id = %id))]
    pub(crate) fn update(&self, id: ServiceId, instance: AnyArc, destroy_old: bool) -> DiResult<()> {
        let d = self.descriptor(id)?;
        let _guard = d.slots.reload.lock();

        if let Err(e) = self.retire_tree(id, destroy_old) {
            warn!(error = %e, "pre-destroy failed during update");
        }

        let links = Self::links_of(d);
        self.complete(d, &links, &instance)?;
        *d.slots.instance.write() = Some(instance);
        self.attach_proxy(d)?;
        self.register(id);
        d.slots.set_state(ServiceState::Instantiated);

        for bean in &d.beans {
            self.renew(*bean)?;
        }

        if self.observers.has_observers() {
            self.observers.reloaded(&ServiceDetails::from(d));
        }
        Ok(())
    }

    /// Runs every pre-destroy hook in reverse construction order and clears
    /// the instances. Returns the first failure after all hooks ran.
    #[instrument(skip(self))]
    pub(crate) fn destroy_all(&self) -> DiResult<()> {
        let mut first = None;
        for id in self.order.iter().rev() {
            let d = &self.arena[id.0];
            if let Err(e) = self.retire(*id) {
                warn!(service = %d.label(), error = %e, "pre-destroy failed");
                first.get_or_insert(e);
            }
            *d.slots.instance.write() = None;
        }
        info!(services = self.order.len(), "container destroyed");
        first.map_or(Ok(()), Err)
    }

    /// Registered ids compatible with `key`, in registration order.
    pub(crate) fn find_registered(&self, key: &Key, qualifier: Option<&str>) -> Vec<ServiceId> {
        self.registered
            .read()
            .iter()
            .copied()
            .filter(|id| {
                let d = &self.arena[id.0];
                d.is_instantiated() && is_compatible(d, key, qualifier)
            })
            .collect()
    }

    pub(crate) fn first_registered(&self, key: &Key, qualifier: Option<&str>) -> DiResult<ServiceId> {
        self.find_registered(key, qualifier)
            .first()
            .copied()
            .ok_or_else(|| DiError::NotFound(lookup_name(key, qualifier)))
    }

    pub(crate) fn lookup(&self, key: &Key, qualifier: Option<&str>) -> DiResult<AnyArc> {
        let id = self.first_registered(key, qualifier)?;
        self.value_for(id, key)
    }

    pub(crate) fn lookup_all(&self, key: &Key, qualifier: Option<&str>) -> DiResult<Vec<AnyArc>> {
        self.find_registered(key, qualifier)
            .into_iter()
            .map(|id| self.value_for(id, key))
            .collect()
    }

    pub(crate) fn registered(&self) -> Vec<ServiceId> {
        self.registered.read().clone()
    }

    pub(crate) fn by_marker(&self, marker: &Marker) -> Vec<ServiceId> {
        self.registered
            .read()
            .iter()
            .copied()
            .filter(|id| {
                self.arena[id.0].markers.iter().any(|m| {
                    m.is(marker.name()) && (marker.argument().is_none() || m.argument() == marker.argument())
                })
            })
            .collect()
    }
}

fn lookup_name(key: &Key, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) => format!("{}(\"{}\")", key.display_name(), q),
        None => key.display_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dependency, ServiceCollection};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);
    struct Holder(Arc<Counter>);

    fn engine(sc: ServiceCollection) -> Engine {
        bootstrap(sc.into_descriptors(), InjectorConfig::new()).unwrap()
    }

    #[test]
    fn prototype_producer_yields_fresh_values() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = built.clone();

        let mut sc = ServiceCollection::new();
        let id = sc.add(
            ServiceDescriptor::service::<Counter>()
                .scope(Scope::Prototype)
                .constructor(move |_| Ok(Counter(b.fetch_add(1, Ordering::SeqCst)))),
        );
        let engine = engine(sc);

        // One instance at bootstrap.
        assert_eq!(built.load(Ordering::SeqCst), 1);
        let key = crate::key_of_type::<Counter>();
        let first = engine.value_for(id, &key).unwrap();
        let second = engine.value_for(id, &key).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reload_replaces_only_the_target() {
        let mut sc = ServiceCollection::new();
        let counter = sc.add(ServiceDescriptor::service::<Counter>().constructor(|_| Ok(Counter(1))));
        let holder = sc.add(
            ServiceDescriptor::service::<Holder>()
                .depends_on(Dependency::of::<Counter>())
                .constructor(|args| Ok(Holder(args.get::<Counter>(0)?))),
        );
        let engine = engine(sc);

        let before = engine.arena[holder.0].slots.instance().unwrap();
        let old_counter = engine.arena[counter.0].slots.instance().unwrap();
        engine.reload(counter).unwrap();

        let after = engine.arena[holder.0].slots.instance().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!Arc::ptr_eq(&old_counter, &engine.arena[counter.0].slots.instance().unwrap()));
    }

    #[test]
    fn cascade_reloads_consumers_in_order() {
        let mut sc = ServiceCollection::new();
        let counter = sc.add(ServiceDescriptor::service::<Counter>().constructor(|_| Ok(Counter(1))));
        let holder = sc.add(
            ServiceDescriptor::service::<Holder>()
                .depends_on(Dependency::of::<Counter>())
                .constructor(|args| Ok(Holder(args.get::<Counter>(0)?))),
        );
        let engine = engine(sc);

        let reloaded = engine.reload_cascade(counter).unwrap();
        assert_eq!(reloaded, vec![counter, holder]);

        let holder_value = engine.arena[holder.0].slots.instance().unwrap();
        let counter_value = engine.arena[counter.0].slots.instance().unwrap();
        let holder_value = holder_value.downcast_ref::<Holder>().unwrap();
        let counter_value = counter_value.downcast::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&holder_value.0, &counter_value));
    }

    #[test]
    fn destroy_all_clears_registry_lookups() {
        let mut sc = ServiceCollection::new();
        sc.add(ServiceDescriptor::service::<Counter>().constructor(|_| Ok(Counter(1))));
        let engine = engine(sc);

        let key = crate::key_of_type::<Counter>();
        assert!(engine.lookup(&key, None).is_ok());
        engine.destroy_all().unwrap();
        assert!(matches!(engine.lookup(&key, None), Err(DiError::NotFound(_))));
    }
}
