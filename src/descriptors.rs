//! Service descriptors: the arena entries the resolver and engine work on.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::dependency::{Dependency, DependencyParam};
use crate::interception::{Facade, MethodAspect, ProxyParts};
use crate::key::Key;
use crate::marker::Marker;
use crate::registration::{AnyArc, BeanFactory, Ctor, FieldSetter, Hook, ServiceBuilder, Upcast};
use crate::scope::Scope;

/// Stable index of a descriptor in the container's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub(crate) usize);

impl ServiceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a descriptor's instance comes from.
#[derive(Clone)]
pub(crate) enum Origin {
    Constructor(Ctor),
    /// Bean factory invoked with the parent instance.
    Factory(BeanFactory),
    /// Pre-built instance supplied at registration.
    Provided(AnyArc),
    Unset,
}

#[derive(Clone)]
pub(crate) struct Provision {
    pub(crate) key: Key,
    pub(crate) upcast: Upcast,
}

#[derive(Clone)]
pub(crate) struct FieldPoint {
    pub(crate) dependency: Dependency,
    pub(crate) setter: FieldSetter,
}

#[derive(Debug, Clone)]
pub(crate) struct Interception {
    pub(crate) method: String,
    pub(crate) aspect: Key,
    pub(crate) marker: Marker,
}

#[derive(Clone)]
pub(crate) struct FacadeSpec {
    pub(crate) key: Key,
    pub(crate) build: Arc<dyn Fn(ProxyParts) -> Facade + Send + Sync>,
}

/// Lifecycle of one descriptor.
///
/// `Discovered -> Resolving -> Resolved -> Instantiated -> (Destroyed -> Instantiated)*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Discovered,
    /// Only observable while the resolver has the descriptor on its trace.
    Resolving,
    Resolved,
    Instantiated,
    Destroyed,
}

/// Mutable per-descriptor state shared with proxy handles.
pub(crate) struct InstanceSlots {
    pub(crate) instance: RwLock<Option<AnyArc>>,
    pub(crate) facade: RwLock<Option<Facade>>,
    pub(crate) state: RwLock<ServiceState>,
    /// Serializes reload and update of this descriptor.
    pub(crate) reload: Mutex<()>,
}

impl InstanceSlots {
    pub(crate) fn new() -> Self {
        Self {
            instance: RwLock::new(None),
            facade: RwLock::new(None),
            state: RwLock::new(ServiceState::Discovered),
            reload: Mutex::new(()),
        }
    }

    pub(crate) fn set_state(&self, state: ServiceState) {
        *self.state.write() = state;
    }

    pub(crate) fn instance(&self) -> Option<AnyArc> {
        self.instance.read().clone()
    }

    pub(crate) fn facade_key(&self) -> Option<Key> {
        self.facade.read().as_ref().map(|f| *f.key())
    }

    /// The façade, when one is attached under `key`.
    pub(crate) fn facade_for(&self, key: &Key) -> Option<AnyArc> {
        self.facade
            .read()
            .as_ref()
            .filter(|f| f.key() == key)
            .map(Facade::value)
    }
}

/// An aspect bound to a method, resolved to its producing descriptor.
#[derive(Debug, Clone)]
pub struct AspectLink {
    pub(crate) method: String,
    pub(crate) aspect: ServiceId,
    pub(crate) marker: Marker,
}

impl AspectLink {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn aspect(&self) -> ServiceId {
        self.aspect
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }
}

/// Resolved links of one descriptor, kept for reload.
#[derive(Debug, Clone, Default)]
pub struct Links {
    pub(crate) params: Vec<DependencyParam>,
    pub(crate) fields: Vec<DependencyParam>,
    pub(crate) aspects: Vec<AspectLink>,
}

impl Links {
    pub fn params(&self) -> &[DependencyParam] {
        &self.params
    }

    pub fn fields(&self) -> &[DependencyParam] {
        &self.fields
    }

    pub fn aspects(&self) -> &[AspectLink] {
        &self.aspects
    }

    /// Whether any parameter, field or aspect is produced by `id`.
    pub fn references(&self, id: ServiceId) -> bool {
        self.params
            .iter()
            .chain(self.fields.iter())
            .any(|p| p.producers().contains(&id))
            || self.aspects.iter().any(|a| a.aspect == id)
    }
}

/// Service descriptor
///
/// Metadata plus mutable instance holder for one injectable type. Built
/// through [`ServiceDescriptor::service`] and owned by the container's arena
/// once added to a [`ServiceCollection`](crate::ServiceCollection).
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Marker, Scope, ServiceCollection, ServiceDescriptor};
///
/// struct Mailer;
///
/// let mut services = ServiceCollection::new();
/// let id = services.add(
///     ServiceDescriptor::service::<Mailer>()
///         .qualifier("smtp")
///         .marker(Marker::new("Outbound"))
///         .constructor(|_| Ok(Mailer)),
/// );
///
/// let d = services.descriptor(id).unwrap();
/// assert_eq!(d.qualifier(), Some("smtp"));
/// assert_eq!(d.scope(), Scope::Singleton);
/// assert!(d.has_marker("service"));
/// assert!(d.has_marker("outbound"));
/// ```
pub struct ServiceDescriptor {
    pub(crate) id: ServiceId,
    pub(crate) key: Key,
    pub(crate) markers: Vec<Marker>,
    pub(crate) provisions: Vec<Provision>,
    pub(crate) params: Vec<Dependency>,
    pub(crate) fields: Vec<FieldPoint>,
    pub(crate) origin: Origin,
    pub(crate) qualifier: Option<String>,
    pub(crate) scope: Scope,
    pub(crate) post_construct: Option<Hook>,
    pub(crate) pre_destroy: Option<Hook>,
    pub(crate) startup: Option<Hook>,
    pub(crate) interceptions: Vec<Interception>,
    pub(crate) facade: Option<FacadeSpec>,
    pub(crate) parent: Option<ServiceId>,
    pub(crate) beans: Vec<ServiceId>,
    /// Bean descriptors waiting for an arena id.
    pub(crate) pending_beans: Vec<ServiceDescriptor>,
    pub(crate) links: Option<Arc<Links>>,
    pub(crate) slots: Arc<InstanceSlots>,
}

impl ServiceDescriptor {
    /// Starts a descriptor for the service type `T`.
    pub fn service<T: Send + Sync + 'static>() -> ServiceBuilder<T> {
        ServiceBuilder::new(Origin::Unset, Marker::SERVICE)
    }

    /// Starts a descriptor for an aspect service, injectable as `dyn MethodAspect`.
    pub fn aspect<A: MethodAspect + 'static>() -> ServiceBuilder<A> {
        ServiceBuilder::new(Origin::Unset, Marker::ASPECT).provides::<dyn MethodAspect>(|a| a)
    }

    pub(crate) fn empty(key: Key, origin: Origin) -> Self {
        Self {
            id: ServiceId(usize::MAX),
            key,
            markers: Vec::new(),
            provisions: Vec::new(),
            params: Vec::new(),
            fields: Vec::new(),
            origin,
            qualifier: None,
            scope: Scope::Singleton,
            post_construct: None,
            pre_destroy: None,
            startup: None,
            interceptions: Vec::new(),
            facade: None,
            parent: None,
            beans: Vec::new(),
            pending_beans: Vec::new(),
            links: None,
            slots: Arc::new(InstanceSlots::new()),
        }
    }

    /// A descriptor wrapping an already built value stored under `key`.
    pub(crate) fn provided(key: Key, value: AnyArc) -> Self {
        let mut descriptor = Self::empty(key, Origin::Provided(value));
        descriptor.markers.push(Marker::PROVIDED);
        descriptor
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Concrete key of the service.
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Case-insensitive marker lookup by name.
    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.iter().any(|m| m.is(name))
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Declared constructor dependencies.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.params
    }

    /// Declared field dependencies.
    pub fn field_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.fields.iter().map(|f| &f.dependency)
    }

    /// Every key this service can be injected as, concrete key first, then
    /// provided traits and the façade trait.
    pub fn assignable_keys(&self) -> impl Iterator<Item = &Key> {
        std::iter::once(&self.key)
            .chain(self.provisions.iter().map(|p| &p.key))
            .chain(self.facade.iter().map(|f| &f.key))
    }

    pub fn parent(&self) -> Option<ServiceId> {
        self.parent
    }

    pub fn beans(&self) -> &[ServiceId] {
        &self.beans
    }

    pub fn is_bean(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_provided(&self) -> bool {
        matches!(self.origin, Origin::Provided(_))
    }

    pub fn has_interceptions(&self) -> bool {
        !self.interceptions.is_empty()
    }

    pub fn links(&self) -> Option<&Links> {
        self.links.as_deref()
    }

    pub fn state(&self) -> ServiceState {
        *self.slots.state.read()
    }

    pub fn is_instantiated(&self) -> bool {
        self.slots.instance.read().is_some()
    }

    /// Display name with the qualifier, e.g. `app::Pool("main")`.
    pub fn label(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}(\"{}\")", self.type_name(), q),
            None => self.type_name().to_string(),
        }
    }

    /// Converts an instance of this service into the value stored for `key`.
    pub(crate) fn view(&self, instance: &AnyArc, key: &Key) -> Option<AnyArc> {
        if *key == self.key {
            return Some(instance.clone());
        }
        if let Some(p) = self.provisions.iter().find(|p| p.key == *key) {
            return (p.upcast)(instance);
        }
        // Runtime type of a provided or updated instance.
        if !key.is_trait() && (**instance).type_id() == key.type_id() {
            return Some(instance.clone());
        }
        None
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("qualifier", &self.qualifier)
            .field("scope", &self.scope)
            .field("markers", &self.markers)
            .field("params", &self.params.len())
            .field("fields", &self.fields.len())
            .field("beans", &self.beans)
            .field("parent", &self.parent)
            .field("state", &self.state())
            .finish()
    }
}

/// Read-only snapshot of a descriptor for the post-bootstrap facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetails {
    pub id: ServiceId,
    pub type_name: &'static str,
    pub qualifier: Option<String>,
    pub scope: Scope,
    pub markers: Vec<Marker>,
    pub state: ServiceState,
    pub parent: Option<ServiceId>,
    pub proxied: bool,
}

impl From<&ServiceDescriptor> for ServiceDetails {
    fn from(d: &ServiceDescriptor) -> Self {
        Self {
            id: d.id,
            type_name: d.type_name(),
            qualifier: d.qualifier.clone(),
            scope: d.scope,
            markers: d.markers.clone(),
            state: d.state(),
            parent: d.parent,
            proxied: d.slots.facade.read().is_some(),
        }
    }
}
