//! External resolver hook.

use crate::dependency::DependencyParam;
use crate::error::DiResult;
use crate::registration::AnyArc;

/// Strategy that supplies a dependency value from outside the graph.
///
/// Resolvers are consulted in configuration order, and only after producer
/// lookup found nothing. The first one whose [`can_resolve`] returns `true`
/// is bound to the parameter. Its [`resolve`] runs at instantiation time and
/// again on every reload of the consumer.
///
/// The returned value must use the storage shape of the parameter's key:
/// `Arc<T>` for concrete types, `Arc<Arc<dyn Trait>>` for trait objects.
///
/// [`can_resolve`]: ExternalResolver::can_resolve
/// [`resolve`]: ExternalResolver::resolve
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{
///     AnyArc, Dependency, DependencyParam, DiResult, ExternalResolver, InjectorConfig, Resolver,
///     ServiceCollection, ServiceDescriptor,
/// };
/// use std::sync::Arc;
///
/// struct Port(u16);
///
/// struct PortResolver;
///
/// impl ExternalResolver for PortResolver {
///     fn can_resolve(&self, param: &DependencyParam) -> bool {
///         param.key() == &ferrous_ioc::key_of_type::<u16>()
///     }
///
///     fn resolve(&self, _param: &DependencyParam) -> DiResult<AnyArc> {
///         Ok(Arc::new(8080u16))
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::service::<Port>()
///         .depends_on(Dependency::of::<u16>())
///         .constructor(|args| Ok(Port(*args.get::<u16>(0)?))),
/// );
///
/// let config = InjectorConfig::new().with_resolver(Arc::new(PortResolver));
/// let provider = services.build_with(config).unwrap();
/// assert_eq!(provider.get_required::<Port>().0, 8080);
/// ```
pub trait ExternalResolver: Send + Sync {
    /// Whether this resolver claims the parameter.
    fn can_resolve(&self, param: &DependencyParam) -> bool;

    /// Produces the value for a claimed parameter.
    fn resolve(&self, param: &DependencyParam) -> DiResult<AnyArc>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
