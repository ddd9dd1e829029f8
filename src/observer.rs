//! Diagnostic observers for container lifecycle events.
//!
//! Observers receive a callback for every resolved, instantiated, reloaded
//! and destroyed service. They complement the crate's own `tracing` output
//! with a programmatic hook, e.g. for metrics or test assertions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::descriptors::ServiceDetails;
use crate::error::HookKind;

/// Observer for container lifecycle events.
///
/// All methods have empty default bodies.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{DiObserver, InjectorConfig, ServiceCollection, ServiceDescriptor, ServiceDetails};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<&'static str>>);
///
/// impl DiObserver for Recorder {
///     fn instantiated(&self, service: &ServiceDetails, _took: Duration) {
///         self.0.lock().unwrap().push(service.type_name);
///     }
/// }
///
/// struct Clock;
///
/// let recorder = Arc::new(Recorder::default());
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::service::<Clock>().constructor(|_| Ok(Clock)));
///
/// let config = InjectorConfig::new().with_observer(recorder.clone());
/// services.build_with(config).unwrap();
/// assert_eq!(recorder.0.lock().unwrap().len(), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// A service took its place in the construction order.
    fn resolved(&self, service: &ServiceDetails, position: usize) {
        let _ = (service, position);
    }

    /// A service was constructed, wired and registered.
    fn instantiated(&self, service: &ServiceDetails, duration: Duration) {
        let _ = (service, duration);
    }

    fn reloaded(&self, service: &ServiceDetails) {
        let _ = service;
    }

    fn destroyed(&self, service: &ServiceDetails) {
        let _ = service;
    }

    fn hook_failed(&self, service: &ServiceDetails, hook: HookKind, message: &str) {
        let _ = (service, hook, message);
    }
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new(observers: Vec<Arc<dyn DiObserver>>) -> Self {
        Self { observers }
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn resolved(&self, service: &ServiceDetails, position: usize) {
        for observer in &self.observers {
            observer.resolved(service, position);
        }
    }

    pub(crate) fn instantiated(&self, service: &ServiceDetails, duration: Duration) {
        for observer in &self.observers {
            observer.instantiated(service, duration);
        }
    }

    pub(crate) fn reloaded(&self, service: &ServiceDetails) {
        for observer in &self.observers {
            observer.reloaded(service);
        }
    }

    pub(crate) fn destroyed(&self, service: &ServiceDetails) {
        for observer in &self.observers {
            observer.destroyed(service);
        }
    }

    pub(crate) fn hook_failed(&self, service: &ServiceDetails, hook: HookKind, message: &str) {
        for observer in &self.observers {
            observer.hook_failed(service, hook, message);
        }
    }
}

/// Observer forwarding every event to `tracing` under a fixed target prefix.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-ioc]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolved(&self, service: &ServiceDetails, position: usize) {
        debug!(prefix = %self.prefix, service = service.type_name, position, "resolved");
    }

    fn instantiated(&self, service: &ServiceDetails, duration: Duration) {
        info!(
            prefix = %self.prefix,
            service = service.type_name,
            scope = %service.scope,
            elapsed_us = duration.as_micros() as u64,
            "instantiated"
        );
    }

    fn reloaded(&self, service: &ServiceDetails) {
        info!(prefix = %self.prefix, service = service.type_name, "reloaded");
    }

    fn destroyed(&self, service: &ServiceDetails) {
        debug!(prefix = %self.prefix, service = service.type_name, "destroyed");
    }

    fn hook_failed(&self, service: &ServiceDetails, hook: HookKind, message: &str) {
        warn!(prefix = %self.prefix, service = service.type_name, %hook, message, "hook failed");
    }
}

/// Observer collecting counters with relaxed atomics.
pub struct MetricsObserver {
    pub instantiation_count: AtomicU64,
    pub total_instantiation_time: AtomicU64,
    pub reload_count: AtomicU64,
    pub destroy_count: AtomicU64,
    pub hook_failure_count: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self {
            instantiation_count: AtomicU64::new(0),
            total_instantiation_time: AtomicU64::new(0),
            reload_count: AtomicU64::new(0),
            destroy_count: AtomicU64::new(0),
            hook_failure_count: AtomicU64::new(0),
        }
    }

    pub fn instantiation_count(&self) -> u64 {
        self.instantiation_count.load(Ordering::Relaxed)
    }

    pub fn average_instantiation_time(&self) -> Option<Duration> {
        let count = self.instantiation_count();
        if count == 0 {
            return None;
        }
        let total_ns = self.total_instantiation_time.load(Ordering::Relaxed);
        Some(Duration::from_nanos(total_ns / count))
    }

    pub fn reload_count(&self) -> u64 {
        self.reload_count.load(Ordering::Relaxed)
    }

    pub fn destroy_count(&self) -> u64 {
        self.destroy_count.load(Ordering::Relaxed)
    }

    pub fn hook_failure_count(&self) -> u64 {
        self.hook_failure_count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.instantiation_count.store(0, Ordering::Relaxed);
        self.total_instantiation_time.store(0, Ordering::Relaxed);
        self.reload_count.store(0, Ordering::Relaxed);
        self.destroy_count.store(0, Ordering::Relaxed);
        self.hook_failure_count.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for MetricsObserver {
    fn instantiated(&self, _service: &ServiceDetails, duration: Duration) {
        self.instantiation_count.fetch_add(1, Ordering::Relaxed);
        self.total_instantiation_time
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn reloaded(&self, _service: &ServiceDetails) {
        self.reload_count.fetch_add(1, Ordering::Relaxed);
    }

    fn destroyed(&self, _service: &ServiceDetails) {
        self.destroy_count.fetch_add(1, Ordering::Relaxed);
    }

    fn hook_failed(&self, _service: &ServiceDetails, _hook: HookKind, _message: &str) {
        self.hook_failure_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{ServiceId, ServiceState};
    use crate::Scope;

    fn details() -> ServiceDetails {
        ServiceDetails {
            id: ServiceId(0),
            type_name: "app::Mailer",
            qualifier: None,
            scope: Scope::Singleton,
            markers: Vec::new(),
            state: ServiceState::Instantiated,
            parent: None,
            proxied: false,
        }
    }

    #[test]
    fn metrics_observer_counts_events() {
        let metrics = MetricsObserver::new();
        let d = details();

        metrics.instantiated(&d, Duration::from_micros(10));
        metrics.instantiated(&d, Duration::from_micros(30));
        metrics.reloaded(&d);
        metrics.destroyed(&d);
        metrics.hook_failed(&d, HookKind::PreDestroy, "boom");

        assert_eq!(metrics.instantiation_count(), 2);
        assert_eq!(metrics.average_instantiation_time(), Some(Duration::from_micros(20)));
        assert_eq!(metrics.reload_count(), 1);
        assert_eq!(metrics.destroy_count(), 1);
        assert_eq!(metrics.hook_failure_count(), 1);

        metrics.reset();
        assert_eq!(metrics.instantiation_count(), 0);
        assert_eq!(metrics.average_instantiation_time(), None);
    }

    #[test]
    fn observers_fan_out_to_every_observer() {
        let a = Arc::new(MetricsObserver::new());
        let b = Arc::new(MetricsObserver::new());
        let observers = Observers::new(vec![a.clone(), b.clone()]);
        assert!(observers.has_observers());

        observers.reloaded(&details());
        assert_eq!(a.reload_count(), 1);
        assert_eq!(b.reload_count(), 1);
    }

    #[test]
    fn logging_observer_accepts_every_event() {
        let logger = LoggingObserver::with_prefix("[test]");
        let d = details();
        logger.resolved(&d, 0);
        logger.instantiated(&d, Duration::from_millis(1));
        logger.reloaded(&d);
        logger.destroyed(&d);
        logger.hook_failed(&d, HookKind::PostConstruct, "nope");
    }
}
