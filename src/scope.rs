//! Service scope definitions.

/// Service scopes controlling instance reuse and interception
///
/// Every descriptor is constructed once at bootstrap whatever its scope.
/// The scope decides what consumers and lookups receive afterwards.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Resolver, Scope, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Ticket(usize);
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let c = counter.clone();
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::service::<Ticket>()
///         .scope(Scope::Prototype)
///         .constructor(move |_| Ok(Ticket(c.fetch_add(1, Ordering::SeqCst)))),
/// );
///
/// let provider = services.build().unwrap();
/// let a = provider.get::<Ticket>().unwrap();
/// let b = provider.get::<Ticket>().unwrap();
/// assert_ne!(a.0, b.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Scope {
    /// One instance, shared by every consumer and lookup
    #[default]
    Singleton,
    /// A fresh instance for every consumer and every lookup
    ///
    /// The instance built at bootstrap is kept only to produce beans.
    Prototype,
    /// One instance behind an intercepting façade
    ///
    /// Consumers of the façade's trait receive the façade. Calls walk the
    /// interception chain before reaching the current instance, so the
    /// instance can be reloaded or replaced without touching consumers.
    Proxy,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Prototype => f.write_str("prototype"),
            Scope::Proxy => f.write_str("proxy"),
        }
    }
}
