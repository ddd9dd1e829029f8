//! Core traits for the dependency injection container.

mod external;
mod resolver;

pub use external::ExternalResolver;
pub use resolver::{Resolver, ResolverCore};
