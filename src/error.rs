//! Error types for the dependency injection container.

use std::fmt;
use thiserror::Error;

/// Boxed error returned by user constructors, factories and lifecycle hooks.
///
/// Any error type converts into it with `?`, including [`DiError`] coming
/// back from argument accessors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which lifecycle hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs after construction and field injection.
    PostConstruct,
    /// Runs before an instance is dropped by destroy or reload.
    PreDestroy,
    /// Runs once after the whole graph is materialized.
    Startup,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::PostConstruct => f.write_str("post-construct"),
            HookKind::PreDestroy => f.write_str("pre-destroy"),
            HookKind::Startup => f.write_str("startup"),
        }
    }
}

/// Dependency injection errors
///
/// Every bootstrap error is fatal: no partially built provider is returned.
/// Errors raised by reload and update only concern the service being
/// reloaded.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::DiError;
///
/// let missing = DiError::MissingDependency {
///     service: "app::UserService".into(),
///     dependency: "app::Database".into(),
///     qualifier: None,
/// };
/// assert_eq!(
///     missing.to_string(),
///     "Could not create instance of 'app::UserService'. Parameter 'app::Database' implementation was not found"
/// );
///
/// let circular = DiError::Circular(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Error)]
pub enum DiError {
    /// A required parameter has no producer and no external resolver claimed it.
    #[error("{}", missing_message(.service, .dependency, .qualifier.as_deref()))]
    MissingDependency {
        service: String,
        dependency: String,
        qualifier: Option<String>,
    },

    /// An unqualified single parameter matches several producers.
    #[error(
        "Could not create instance of '{service}'. Parameter '{dependency}' has {} candidates ({}). Add a qualifier to select one",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousDependency {
        service: String,
        dependency: String,
        candidates: Vec<String>,
    },

    /// A service was reached again while still on the resolution trace.
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),

    /// The constructor or factory of a service failed.
    #[error("Could not create instance of '{service}': {source}")]
    Construction {
        service: String,
        #[source]
        source: BoxError,
    },

    /// A post-construct, pre-destroy or startup hook failed.
    #[error("{hook} hook of '{service}' failed: {source}")]
    LifecycleHook {
        service: String,
        hook: HookKind,
        #[source]
        source: BoxError,
    },

    /// Service not registered
    #[error("Service \"{0}\" was not found.")]
    NotFound(String),

    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// The bootstrap worker thread did not complete.
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// Settings or a configuration value could not be read.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn missing_message(service: &str, dependency: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) => format!(
            "Could not create instance of '{}'. Qualifier '{}' was not found.",
            service, q
        ),
        None => format!(
            "Could not create instance of '{}'. Parameter '{}' implementation was not found",
            service, dependency
        ),
    }
}

impl DiError {
    /// Wraps a constructor failure with the owning service's identity.
    pub(crate) fn construction(service: impl Into<String>, source: BoxError) -> Self {
        DiError::Construction {
            service: service.into(),
            source,
        }
    }

    /// Wraps a hook failure with the owning service's identity.
    pub(crate) fn hook(service: impl Into<String>, hook: HookKind, source: BoxError) -> Self {
        DiError::LifecycleHook {
            service: service.into(),
            hook,
            source,
        }
    }
}

/// Result type for DI operations
///
/// A convenience alias for `Result<T, DiError>` used throughout ferrous-ioc.
///
/// ```rust
/// use ferrous_ioc::{DiResult, DiError};
///
/// fn lookup() -> DiResult<()> {
///     Err(DiError::NotFound("app::Mailer".into()))
/// }
///
/// assert_eq!(lookup().unwrap_err().to_string(), "Service \"app::Mailer\" was not found.");
/// ```
pub type DiResult<T> = Result<T, DiError>;
