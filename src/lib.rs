//! # ferrous-ioc
//!
//! A resolve-then-instantiate dependency injection container. Services are
//! declared up front, the whole graph is resolved into a construction order,
//! then everything is built, wired and started in one pass.
//!
//! ## Features
//!
//! - **Whole-graph resolution**: missing, ambiguous and circular dependencies
//!   fail the build with the offending path, before anything is constructed
//! - **Qualifiers and collections**: select one producer by name, or inject
//!   every producer of a type in discovery order
//! - **Beans**: services produced by another service's instance
//! - **Scopes**: singleton, prototype, and proxy with method interception
//! - **Reload and update**: rebuild one service (optionally cascading to its
//!   consumers) or swap its instance at runtime
//! - **External resolvers**: feed parameters from outside the graph, e.g.
//!   configuration values
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{Dependency, Resolver, ServiceCollection, ServiceDescriptor};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add(
//!     ServiceDescriptor::service::<UserService>()
//!         .depends_on(Dependency::of::<Database>())
//!         .constructor(|args| Ok(UserService { db: args.get::<Database>(0)? })),
//! );
//!
//! let provider = services.build().unwrap();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Proxies and Aspects
//!
//! A proxy-scoped service reaches its consumers through a façade. Calls on
//! the façade walk the aspects bound to the method before reaching the real
//! instance.
//!
//! ```rust
//! use ferrous_ioc::{
//!     CallResult, Dependency, DiError, DiResult, Marker, MethodAspect, MethodCall, Next,
//!     ProxyHandle, Resolver, ServiceCollection, ServiceDescriptor,
//! };
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self, name: &str) -> String { format!("Hello, {}", name) }
//! }
//!
//! struct GreeterProxy(ProxyHandle<English>);
//! impl Greeter for GreeterProxy {
//!     fn greet(&self, name: &str) -> String {
//!         let owned = name.to_string();
//!         self.0.invoke("greet", &[&owned], |g| g.greet(&owned)).unwrap_or_default()
//!     }
//! }
//!
//! struct Shout;
//! impl MethodAspect for Shout {
//!     fn proceed(&self, _marker: &Marker, _call: &MethodCall<'_>, next: Next<'_>) -> DiResult<CallResult> {
//!         let text = next
//!             .proceed()?
//!             .downcast::<String>()
//!             .map_err(|_| DiError::TypeMismatch("String"))?;
//!         Ok(Box::new(text.to_uppercase()))
//!     }
//! }
//!
//! struct Front { greeter: Arc<dyn Greeter> }
//!
//! let mut services = ServiceCollection::new();
//! services.add(ServiceDescriptor::aspect::<Shout>().constructor(|_| Ok(Shout)));
//! services.add(
//!     ServiceDescriptor::service::<English>()
//!         .provides::<dyn Greeter>(|e| e)
//!         .intercept::<Shout>("greet", Marker::new("Shout"))
//!         .proxy::<dyn Greeter, _>(|handle| Arc::new(GreeterProxy(handle)))
//!         .constructor(|_| Ok(English)),
//! );
//! services.add(
//!     ServiceDescriptor::service::<Front>()
//!         .depends_on(Dependency::of_trait::<dyn Greeter>())
//!         .constructor(|args| Ok(Front { greeter: args.get_trait::<dyn Greeter>(0)? })),
//! );
//!
//! let provider = services.build().unwrap();
//! assert_eq!(provider.get_required::<Front>().greeter.greet("ada"), "HELLO, ADA");
//! ```
//!
//! ## Logging
//!
//! The container logs through `tracing`: bootstrap and reload spans, one
//! event per resolved and instantiated service, warnings for failed
//! teardown hooks. Install any subscriber to see them.

// Module declarations
pub mod collection;
pub mod compat;
pub mod config;
pub mod dependency;
pub mod descriptors;
pub mod error;
pub mod interception;
pub mod key;
pub mod marker;
pub mod observer;
pub mod provider;
pub mod resolution;
pub mod scope;
pub mod traits;
pub mod validation;

#[cfg(feature = "graph-export")]
pub mod graph_export;

// Internal modules
mod instantiation;
mod internal;
mod registration;

pub use collection::ServiceCollection;
pub use config::{
    ConfigSource, ConfigValue, ConfigValueResolver, EnvironmentConfigSource, GeneralSettings, InjectorConfig,
    MapConfigSource,
};
pub use dependency::{Arguments, Dependency, DependencyParam, Injected, Multiplicity};
pub use descriptors::{AspectLink, Links, ServiceDescriptor, ServiceDetails, ServiceId, ServiceState};
pub use error::{BoxError, DiError, DiResult, HookKind};
pub use interception::{
    CallResult, DelegatingProxyFactory, Facade, MethodAspect, MethodCall, Next, ProxyFactory, ProxyHandle,
    ProxyRequest, TracingAspect,
};
pub use key::{key_of_trait, key_of_type, Key};
pub use marker::Marker;
pub use observer::{DiObserver, LoggingObserver, MetricsObserver};
pub use provider::ServiceProvider;
pub use registration::{AnyArc, ServiceBuilder};
pub use resolution::{resolve_dependencies, WorkItem};
pub use scope::Scope;
pub use traits::{ExternalResolver, Resolver, ResolverCore};
pub use validation::{validate, ValidationResult, ValidationWarning};
