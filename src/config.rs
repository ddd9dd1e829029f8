//! Container configuration and configuration-value injection.
//!
//! [`InjectorConfig`] carries the bootstrap settings, the ordered external
//! resolvers, the proxy factory and the observers. The second half of the
//! module provides [`ConfigValueResolver`], an external resolver that feeds
//! parameters marked with [`Marker::value`](crate::Marker::value) from
//! configuration sources.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::dependency::DependencyParam;
use crate::error::{DiError, DiResult};
use crate::interception::{DelegatingProxyFactory, ProxyFactory};
use crate::key::{key_of_type, Key};
use crate::observer::DiObserver;
use crate::registration::AnyArc;
use crate::traits::ExternalResolver;

/// Plain bootstrap settings.
///
/// Deserializable from JSON with the `config` feature; missing fields keep
/// their defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct GeneralSettings {
    /// Run resolution and instantiation on a dedicated worker thread.
    pub run_in_new_thread: bool,
    /// Optional resolution depth guard. Unbounded when `None`.
    pub max_depth: Option<usize>,
}

/// Configuration for building a container.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{InjectorConfig, LoggingObserver};
/// use std::sync::Arc;
///
/// let config = InjectorConfig::new()
///     .run_in_new_thread(true)
///     .max_depth(64)
///     .with_observer(Arc::new(LoggingObserver::new()));
///
/// assert!(config.settings().run_in_new_thread);
/// assert_eq!(config.settings().max_depth, Some(64));
/// ```
#[derive(Clone)]
pub struct InjectorConfig {
    pub(crate) settings: GeneralSettings,
    pub(crate) resolvers: Vec<Arc<dyn ExternalResolver>>,
    pub(crate) proxy_factory: Arc<dyn ProxyFactory>,
    pub(crate) observers: Vec<Arc<dyn DiObserver>>,
}

impl InjectorConfig {
    pub fn new() -> Self {
        Self {
            settings: GeneralSettings::default(),
            resolvers: Vec::new(),
            proxy_factory: Arc::new(DelegatingProxyFactory),
            observers: Vec::new(),
        }
    }

    /// Loads [`GeneralSettings`] from JSON.
    ///
    /// ```rust
    /// use ferrous_ioc::InjectorConfig;
    ///
    /// let config = InjectorConfig::from_json_str(r#"{ "max_depth": 16 }"#).unwrap();
    /// assert_eq!(config.settings().max_depth, Some(16));
    /// assert!(!config.settings().run_in_new_thread);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let settings: GeneralSettings =
            serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))?;
        Ok(Self::new().with_settings(settings))
    }

    pub fn with_settings(mut self, settings: GeneralSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn run_in_new_thread(mut self, enabled: bool) -> Self {
        self.settings.run_in_new_thread = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.settings.max_depth = Some(depth);
        self
    }

    /// Appends an external resolver. Resolvers are consulted in the order
    /// they were added.
    pub fn with_resolver(mut self, resolver: Arc<dyn ExternalResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn with_proxy_factory(mut self, factory: Arc<dyn ProxyFactory>) -> Self {
        self.proxy_factory = factory;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn settings(&self) -> &GeneralSettings {
        &self.settings
    }

    pub fn resolvers(&self) -> &[Arc<dyn ExternalResolver>] {
        &self.resolvers
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InjectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorConfig")
            .field("settings", &self.settings)
            .field("resolvers", &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Parses raw text: integer, then float, then boolean, else string.
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            ConfigValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ConfigValue::Float(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Boolean(b)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    /// Scalars render as text; arrays and objects do not.
    pub fn as_string(&self) -> DiResult<String> {
        match self {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Boolean(b) => Ok(b.to_string()),
            _ => Err(DiError::TypeMismatch("Config value is not a scalar")),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DiError::TypeMismatch("Config value is not an integer")),
            _ => Err(DiError::TypeMismatch("Config value is not an integer")),
        }
    }

    pub fn as_f64(&self) -> DiResult<f64> {
        match self {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            ConfigValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DiError::TypeMismatch("Config value is not a number")),
            _ => Err(DiError::TypeMismatch("Config value is not a number")),
        }
    }

    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| DiError::TypeMismatch("Config value is not a boolean")),
            _ => Err(DiError::TypeMismatch("Config value is not a boolean")),
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;
}

/// In-memory source, mostly for tests and defaults.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Environment variable configuration source
///
/// Keys map to upper-cased variable names with `.` and `-` replaced by `_`,
/// e.g. `db.url` with prefix `app` reads `APP_DB_URL`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable(&self, key: &str) -> String {
        let key = key.replace(['.', '-'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable(key)).ok().map(|raw| ConfigValue::parse(&raw))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let prefix = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&prefix).map(str::to_lowercase)
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// Supplies parameters marked `Marker::value("key")` from configuration.
///
/// Claims a parameter when it carries a `Value` marker, its type is
/// `String`, `i64`, `f64`, `bool` or [`ConfigValue`], and one of the sources
/// has the key. Sources are searched in the order they were added.
///
/// ```rust
/// use ferrous_ioc::{
///     ConfigValue, ConfigValueResolver, Dependency, InjectorConfig, Marker, MapConfigSource,
///     Resolver, ServiceCollection, ServiceDescriptor,
/// };
/// use std::sync::Arc;
///
/// struct Server { port: i64 }
///
/// let source = MapConfigSource::new().with("server.port", ConfigValue::Integer(8080));
/// let resolver = ConfigValueResolver::new().with_source(Arc::new(source));
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::service::<Server>()
///         .depends_on(Dependency::of::<i64>().marked(Marker::value("server.port")))
///         .constructor(|args| Ok(Server { port: *args.get::<i64>(0)? })),
/// );
///
/// let config = InjectorConfig::new().with_resolver(Arc::new(resolver));
/// let provider = services.build_with(config).unwrap();
/// assert_eq!(provider.get_required::<Server>().port, 8080);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ConfigValueResolver {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl ConfigValueResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// First value for `key` across the sources.
    pub fn lookup(&self, key: &str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|s| s.get(key))
    }

    fn value_key(param: &DependencyParam) -> Option<&str> {
        param.marker("Value").and_then(|m| m.argument())
    }
}

fn supported(key: &Key) -> bool {
    [
        key_of_type::<String>(),
        key_of_type::<i64>(),
        key_of_type::<f64>(),
        key_of_type::<bool>(),
        key_of_type::<ConfigValue>(),
    ]
    .contains(key)
}

impl ExternalResolver for ConfigValueResolver {
    fn can_resolve(&self, param: &DependencyParam) -> bool {
        supported(param.key())
            && Self::value_key(param).is_some_and(|k| self.lookup(k).is_some())
    }

    fn resolve(&self, param: &DependencyParam) -> DiResult<AnyArc> {
        let key = Self::value_key(param)
            .ok_or_else(|| DiError::NotFound(format!("value marker on {}", param.key())))?;
        let value = self
            .lookup(key)
            .ok_or_else(|| DiError::Config(format!("no value for '{}'", key)))?;

        let target = param.key();
        if *target == key_of_type::<String>() {
            Ok(Arc::new(value.as_string()?))
        } else if *target == key_of_type::<i64>() {
            Ok(Arc::new(value.as_i64()?))
        } else if *target == key_of_type::<f64>() {
            Ok(Arc::new(value.as_f64()?))
        } else if *target == key_of_type::<bool>() {
            Ok(Arc::new(value.as_bool()?))
        } else if *target == key_of_type::<ConfigValue>() {
            Ok(Arc::new(value))
        } else {
            Err(DiError::TypeMismatch(target.display_name()))
        }
    }

    fn name(&self) -> &str {
        "ConfigValueResolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dependency, Marker};
    use serial_test::serial;

    fn param(dependency: Dependency) -> DependencyParam {
        DependencyParam::new(dependency)
    }

    #[test]
    #[serial]
    fn environment_source_maps_dotted_keys() {
        env::set_var("IOCTEST_DB_URL", "postgres://localhost");
        env::set_var("IOCTEST_POOL_SIZE", "8");

        let source = EnvironmentConfigSource::with_prefix("ioctest");
        assert_eq!(
            source.get("db.url"),
            Some(ConfigValue::String("postgres://localhost".to_string()))
        );
        assert_eq!(source.get("pool-size"), Some(ConfigValue::Integer(8)));
        assert!(source.keys().contains(&"db_url".to_string()));

        env::remove_var("IOCTEST_DB_URL");
        env::remove_var("IOCTEST_POOL_SIZE");
    }

    #[test]
    fn config_value_conversions() {
        assert_eq!(ConfigValue::parse("42"), ConfigValue::Integer(42));
        assert_eq!(ConfigValue::parse("1.5"), ConfigValue::Float(1.5));
        assert_eq!(ConfigValue::parse("true"), ConfigValue::Boolean(true));
        assert_eq!(ConfigValue::parse("x"), ConfigValue::String("x".into()));

        assert_eq!(ConfigValue::Integer(3).as_string().unwrap(), "3");
        assert_eq!(ConfigValue::Integer(3).as_f64().unwrap(), 3.0);
        assert_eq!(ConfigValue::String(" 7 ".into()).as_i64().unwrap(), 7);
        assert!(ConfigValue::Array(vec![]).as_string().is_err());
        assert!(ConfigValue::String("nope".into()).as_bool().is_err());
    }

    #[test]
    fn resolver_claims_marked_supported_params_only() {
        let resolver = ConfigValueResolver::new()
            .with_source(Arc::new(MapConfigSource::new().with("name", ConfigValue::String("ada".into()))));

        assert!(resolver.can_resolve(&param(Dependency::of::<String>().marked(Marker::value("name")))));
        // unmarked
        assert!(!resolver.can_resolve(&param(Dependency::of::<String>())));
        // unknown key
        assert!(!resolver.can_resolve(&param(Dependency::of::<String>().marked(Marker::value("other")))));
        // unsupported type
        assert!(!resolver.can_resolve(&param(Dependency::of::<u8>().marked(Marker::value("name")))));
    }

    #[test]
    fn first_source_wins() {
        let resolver = ConfigValueResolver::new()
            .with_source(Arc::new(MapConfigSource::new().with("level", ConfigValue::String("debug".into()))))
            .with_source(Arc::new(MapConfigSource::new().with("level", ConfigValue::String("info".into()))));

        let value = resolver
            .resolve(&param(Dependency::of::<String>().marked(Marker::value("level"))))
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("debug"));
    }

    #[test]
    fn unconvertible_value_is_a_type_mismatch() {
        let resolver = ConfigValueResolver::new()
            .with_source(Arc::new(MapConfigSource::new().with("port", ConfigValue::String("eighty".into()))));
        let result = resolver.resolve(&param(Dependency::of::<i64>().marked(Marker::value("port"))));
        assert!(matches!(result, Err(DiError::TypeMismatch(_))));
    }

    #[cfg(feature = "config")]
    #[test]
    fn settings_round_trip_through_json() {
        let config = InjectorConfig::from_json_str(r#"{"run_in_new_thread": true}"#).unwrap();
        assert!(config.settings().run_in_new_thread);
        assert_eq!(config.settings().max_depth, None);
        assert!(matches!(InjectorConfig::from_json_str("{"), Err(DiError::Config(_))));
    }
}
