//! Capability markers attached to services and dependency parameters.

use std::borrow::Cow;
use std::fmt;

/// A named tag with an optional argument.
///
/// Services carry the markers they were registered under and can be queried
/// by them after bootstrap. Parameters carry markers that external resolvers
/// inspect, such as [`Marker::value`] for configuration keys. Aspect bindings
/// hand their marker to the aspect on every intercepted call.
///
/// ```rust
/// use ferrous_ioc::Marker;
///
/// let m = Marker::value("db.url");
/// assert_eq!(m.name(), "Value");
/// assert_eq!(m.argument(), Some("db.url"));
/// assert!(Marker::SERVICE.is("service"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    name: Cow<'static, str>,
    argument: Option<Cow<'static, str>>,
}

impl Marker {
    /// Default marker of services added through the builder.
    pub const SERVICE: Marker = Marker::new("Service");
    /// Default marker of factory-produced beans.
    pub const BEAN: Marker = Marker::new("Bean");
    /// Marker of services that implement [`MethodAspect`](crate::MethodAspect).
    pub const ASPECT: Marker = Marker::new("Aspect");
    /// Marker of pre-built instances added with `add_instance`.
    pub const PROVIDED: Marker = Marker::new("Provided");

    /// A marker without argument.
    pub const fn new(name: &'static str) -> Self {
        Marker {
            name: Cow::Borrowed(name),
            argument: None,
        }
    }

    /// A marker with an argument, e.g. `Marker::with_argument("Timed", "db")`.
    pub fn with_argument(
        name: impl Into<Cow<'static, str>>,
        argument: impl Into<Cow<'static, str>>,
    ) -> Self {
        Marker {
            name: name.into(),
            argument: Some(argument.into()),
        }
    }

    /// Marks a parameter as a configuration value looked up by `key`.
    pub fn value(key: impl Into<Cow<'static, str>>) -> Self {
        Marker::with_argument("Value", key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "@{}({})", self.name, arg),
            None => write!(f, "@{}", self.name),
        }
    }
}
