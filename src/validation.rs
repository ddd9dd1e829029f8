//! Pre-build validation of a service collection.
//!
//! [`validate`] runs the dependency resolver over a collection without
//! constructing anything, and reports configuration smells that resolve
//! fine but probably do not do what was intended.

use std::collections::HashMap;
use std::fmt;

use crate::collection::ServiceCollection;
use crate::config::InjectorConfig;
use crate::descriptors::{Origin, ServiceDescriptor};
use crate::error::DiError;
use crate::resolution::{DependencyResolver, WorkItem};
use crate::scope::Scope;

/// Result of validating a collection.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that make [`ServiceCollection::build`] fail.
    pub errors: Vec<DiError>,
    /// Configurations that build but are likely mistakes.
    pub warnings: Vec<ValidationWarning>,
}

/// A validation warning about potentially problematic configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A singleton is wired once with a prototype, so it never sees a
    /// second instance.
    SingletonCapturesPrototype { singleton: String, prototype: String },
    /// Proxy scope without any method interception.
    ProxyWithoutInterception { service: String },
    /// Two services share type and qualifier; qualified lookups always pick
    /// the first.
    DuplicateQualifier { type_name: &'static str, qualifier: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::SingletonCapturesPrototype { singleton, prototype } => write!(
                f,
                "Singleton '{}' captures prototype '{}' once at construction",
                singleton, prototype
            ),
            ValidationWarning::ProxyWithoutInterception { service } => {
                write!(f, "Proxy service '{}' has no intercepted methods", service)
            }
            ValidationWarning::DuplicateQualifier { type_name, qualifier } => write!(
                f,
                "Qualifier '{}' is used more than once for '{}'",
                qualifier, type_name
            ),
        }
    }
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// One issue per line, errors first.
    pub fn format_issues(&self) -> String {
        let mut output = String::new();
        for error in &self.errors {
            output.push_str(&format!("error: {}\n", error));
        }
        for warning in &self.warnings {
            output.push_str(&format!("warning: {}\n", warning));
        }
        output
    }
}

/// Validates `services` with the default configuration.
pub fn validate(services: &ServiceCollection) -> ValidationResult {
    validate_with(services, &InjectorConfig::new())
}

/// Validates `services` against the resolvers and depth guard of `config`.
///
/// Nothing is constructed. Resolution stops at its first error, so at most
/// one resolution error is reported.
///
/// ```rust
/// use ferrous_ioc::validation::{validate, ValidationWarning};
/// use ferrous_ioc::{Dependency, Scope, ServiceCollection, ServiceDescriptor};
///
/// struct Token;
/// struct Client;
///
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::service::<Token>().scope(Scope::Prototype).constructor(|_| Ok(Token)));
/// services.add(
///     ServiceDescriptor::service::<Client>()
///         .depends_on(Dependency::of::<Token>())
///         .constructor(|_| Ok(Client)),
/// );
///
/// let result = validate(&services);
/// assert!(result.is_valid());
/// assert!(matches!(
///     result.warnings.as_slice(),
///     [ValidationWarning::SingletonCapturesPrototype { .. }]
/// ));
/// ```
pub fn validate_with(services: &ServiceCollection, config: &InjectorConfig) -> ValidationResult {
    let arena = services.descriptors();
    let mut result = ValidationResult::default();

    for d in arena {
        if matches!(d.origin, Origin::Unset) {
            result
                .errors
                .push(DiError::construction(d.label(), "no constructor registered".into()));
        }
    }

    match DependencyResolver::new(arena, &config.resolvers, config.settings.max_depth).resolve() {
        Ok(items) => {
            for item in items.iter().flat_map(WorkItem::flatten) {
                captured_prototypes(arena, item, &mut result.warnings);
            }
        }
        Err(e) => result.errors.push(e),
    }

    for d in arena {
        if d.scope == Scope::Proxy && d.interceptions.is_empty() {
            result.warnings.push(ValidationWarning::ProxyWithoutInterception { service: d.label() });
        }
    }
    duplicate_qualifiers(arena, &mut result.warnings);

    result
}

fn captured_prototypes(arena: &[ServiceDescriptor], item: &WorkItem, warnings: &mut Vec<ValidationWarning>) {
    let consumer = &arena[item.id().index()];
    if consumer.scope != Scope::Singleton {
        return;
    }
    let links = item.links();
    for param in links.params().iter().chain(links.fields()) {
        for producer in param.producers() {
            let producer = &arena[producer.index()];
            if producer.scope == Scope::Prototype {
                warnings.push(ValidationWarning::SingletonCapturesPrototype {
                    singleton: consumer.label(),
                    prototype: producer.label(),
                });
            }
        }
    }
}

fn duplicate_qualifiers(arena: &[ServiceDescriptor], warnings: &mut Vec<ValidationWarning>) {
    let mut seen: HashMap<(crate::Key, String), usize> = HashMap::new();
    for d in arena {
        if let Some(q) = d.qualifier() {
            *seen.entry((*d.key(), q.to_lowercase())).or_default() += 1;
        }
    }
    let mut duplicates: Vec<_> = seen.into_iter().filter(|(_, count)| *count > 1).collect();
    duplicates.sort_by(|a, b| a.0 .0.display_name().cmp(b.0 .0.display_name()).then(a.0 .1.cmp(&b.0 .1)));
    for ((key, qualifier), _) in duplicates {
        warnings.push(ValidationWarning::DuplicateQualifier {
            type_name: key.display_name(),
            qualifier,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dependency, ServiceDescriptor};

    struct A;
    struct B;

    #[test]
    fn missing_constructor_and_dependency_are_errors() {
        let mut sc = ServiceCollection::new();
        sc.add(ServiceDescriptor::service::<A>());
        sc.add(
            ServiceDescriptor::service::<B>()
                .depends_on(Dependency::of::<u64>())
                .constructor(|_| Ok(B)),
        );

        let result = validate(&sc);
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 2);
        assert!(matches!(result.errors[0], DiError::Construction { .. }));
        assert!(matches!(result.errors[1], DiError::MissingDependency { .. }));
        assert!(result.format_issues().lines().all(|l| l.starts_with("error: ")));
    }

    #[test]
    fn duplicate_qualifiers_ignore_case() {
        let mut sc = ServiceCollection::new();
        sc.add(ServiceDescriptor::service::<A>().qualifier("Main").constructor(|_| Ok(A)));
        sc.add(ServiceDescriptor::service::<A>().qualifier("main").constructor(|_| Ok(A)));
        sc.add(ServiceDescriptor::service::<B>().qualifier("main").constructor(|_| Ok(B)));

        let result = validate(&sc);
        assert!(result.is_valid());
        assert_eq!(
            result.warnings,
            vec![ValidationWarning::DuplicateQualifier {
                type_name: std::any::type_name::<A>(),
                qualifier: "main".into(),
            }]
        );
    }

    #[test]
    fn proxy_without_interception_is_flagged() {
        let mut sc = ServiceCollection::new();
        sc.add(ServiceDescriptor::service::<A>().scope(Scope::Proxy).constructor(|_| Ok(A)));

        let result = validate(&sc);
        assert!(result.has_warnings());
        assert!(result.warnings[0].to_string().contains("no intercepted methods"));
    }
}
