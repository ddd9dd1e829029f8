//! Method interception for proxy-scoped services.
//!
//! A proxy-scoped service is handed to consumers through a façade: a small
//! delegating type that implements the consumer-facing trait and forwards
//! every call to [`ProxyHandle::invoke`]. The handle walks the ordered aspect
//! chain bound to the method, each aspect receiving a [`Next`] continuation
//! for the rest of the chain, and finally calls the current real instance.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::descriptors::{InstanceSlots, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, Key};
use crate::marker::Marker;
use crate::registration::AnyArc;

/// Erased return value travelling through the chain.
pub type CallResult = Box<dyn Any + Send>;

/// One intercepted call.
pub struct MethodCall<'a> {
    service: &'a str,
    method: &'a str,
    args: &'a [&'a dyn Any],
}

impl<'a> MethodCall<'a> {
    /// Type name of the proxied service.
    pub fn service(&self) -> &str {
        self.service
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn args(&self) -> &[&'a dyn Any] {
        self.args
    }

    /// Argument `index` downcast to `A`.
    pub fn arg<A: 'static>(&self, index: usize) -> Option<&A> {
        self.args.get(index).and_then(|a| a.downcast_ref::<A>())
    }
}

impl fmt::Debug for MethodCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("service", &self.service)
            .field("method", &self.method)
            .field("args", &self.args.len())
            .finish()
    }
}

/// An interceptor wrapping calls on proxy-scoped services.
///
/// Register the aspect as a service (see [`ServiceDescriptor::aspect`]) and
/// bind it with [`ServiceBuilder::intercept`](crate::ServiceBuilder::intercept).
/// An aspect may inspect or replace the result, short-circuit by not calling
/// `next`, or call `next` more than once.
///
/// ```rust
/// use ferrous_ioc::{CallResult, DiResult, Marker, MethodAspect, MethodCall, Next};
///
/// struct Deny;
///
/// impl MethodAspect for Deny {
///     fn proceed(&self, marker: &Marker, call: &MethodCall<'_>, next: Next<'_>) -> DiResult<CallResult> {
///         if marker.argument() == Some(call.method()) {
///             return Ok(Box::new(String::from("denied")));
///         }
///         next.proceed()
///     }
/// }
/// ```
pub trait MethodAspect: Send + Sync {
    fn proceed(&self, marker: &Marker, call: &MethodCall<'_>, next: Next<'_>) -> DiResult<CallResult>;
}

#[derive(Clone)]
pub(crate) struct ChainLink {
    pub(crate) aspect: Arc<dyn MethodAspect>,
    pub(crate) marker: Marker,
}

/// Continuation representing the rest of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    links: &'a [ChainLink],
    call: &'a MethodCall<'a>,
    terminal: &'a dyn Fn() -> DiResult<CallResult>,
}

impl<'a> Next<'a> {
    /// Runs the remaining aspects, then the real method.
    pub fn proceed(&self) -> DiResult<CallResult> {
        match self.links.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    links: rest,
                    call: self.call,
                    terminal: self.terminal,
                };
                head.aspect.proceed(&head.marker, self.call, next)
            }
            None => (self.terminal)(),
        }
    }

    /// Aspects left before the real method.
    pub fn remaining(&self) -> usize {
        self.links.len()
    }
}

pub(crate) type Chains = HashMap<String, Vec<ChainLink>>;

/// Raw pieces a façade is built from.
#[derive(Clone)]
pub struct ProxyParts {
    pub(crate) service: &'static str,
    pub(crate) slots: Arc<InstanceSlots>,
    pub(crate) chains: Arc<Chains>,
}

/// Handle a façade uses to reach the real instance through the chain.
///
/// The handle reads the descriptor's instance slot on every call, so a
/// reloaded or updated instance is picked up without rebuilding the façade.
pub struct ProxyHandle<T> {
    parts: ProxyParts,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ProxyHandle<T> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> ProxyHandle<T> {
    pub(crate) fn from_parts(parts: ProxyParts) -> Self {
        Self {
            parts,
            _marker: PhantomData,
        }
    }

    /// The current real instance.
    pub fn target(&self) -> DiResult<Arc<T>> {
        let instance = self
            .parts
            .slots
            .instance()
            .ok_or_else(|| DiError::NotFound(self.parts.service.to_string()))?;
        instance
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
    }

    /// Names of the intercepted methods.
    pub fn intercepted_methods(&self) -> impl Iterator<Item = &str> {
        self.parts.chains.keys().map(String::as_str)
    }

    /// Calls `f` on the real instance through the aspects bound to `method`.
    ///
    /// Methods without bindings call straight through.
    pub fn invoke<R, F>(&self, method: &str, args: &[&dyn Any], f: F) -> DiResult<R>
    where
        R: Send + 'static,
        F: Fn(&T) -> R,
    {
        let target = self.target()?;
        let links = match self.parts.chains.get(method) {
            Some(links) if !links.is_empty() => links.as_slice(),
            _ => return Ok(f(&target)),
        };

        let call = MethodCall {
            service: self.parts.service,
            method,
            args,
        };
        let terminal = || -> DiResult<CallResult> { Ok(Box::new(f(&target))) };
        let next = Next {
            links,
            call: &call,
            terminal: &terminal,
        };

        next.proceed()?
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| DiError::TypeMismatch(type_name::<R>()))
    }
}

/// A façade together with the trait key consumers request it by.
#[derive(Clone)]
pub struct Facade {
    key: Key,
    value: AnyArc,
}

impl Facade {
    /// Wraps `facade`, stored the way trait values are: `Arc<Arc<dyn I>>`.
    pub fn new<I: ?Sized + Send + Sync + 'static>(facade: Arc<I>) -> Self {
        Self {
            key: key_of_trait::<I>(),
            value: Arc::new(facade) as AnyArc,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub(crate) fn value(&self) -> AnyArc {
        self.value.clone()
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade").field("key", &self.key).finish()
    }
}

/// Everything a [`ProxyFactory`] needs to build one façade.
pub struct ProxyRequest<'a> {
    descriptor: &'a ServiceDescriptor,
    parts: ProxyParts,
}

impl<'a> ProxyRequest<'a> {
    pub(crate) fn new(descriptor: &'a ServiceDescriptor, parts: ProxyParts) -> Self {
        Self { descriptor, parts }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        self.descriptor
    }

    /// A typed handle for hand-written façades.
    pub fn handle<T: Send + Sync + 'static>(&self) -> ProxyHandle<T> {
        ProxyHandle::from_parts(self.parts.clone())
    }

    /// Builds the façade registered with [`ServiceBuilder::proxy`](crate::ServiceBuilder::proxy),
    /// if any.
    pub fn build_registered(&self) -> Option<Facade> {
        self.descriptor
            .facade
            .as_ref()
            .map(|spec| (spec.build)(self.parts.clone()))
    }
}

/// Produces façades for proxy-scoped services.
///
/// Called once for every proxy-scoped service after its first instance is
/// built. Consumers requesting the façade's key receive the façade; every
/// other key is served from the real instance.
pub trait ProxyFactory: Send + Sync {
    fn create_proxy(&self, request: &ProxyRequest<'_>) -> DiResult<Facade>;
}

/// Default factory: uses the façade builder declared on the descriptor and
/// fails the build when there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelegatingProxyFactory;

impl ProxyFactory for DelegatingProxyFactory {
    fn create_proxy(&self, request: &ProxyRequest<'_>) -> DiResult<Facade> {
        request.build_registered().ok_or_else(|| {
            DiError::construction(
                request.descriptor().label(),
                "proxy scope without a registered facade".into(),
            )
        })
    }
}

/// Aspect logging entry, exit and failures of intercepted calls with `tracing`.
///
/// The marker argument, when present, is used as a label.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAspect;

impl MethodAspect for TracingAspect {
    fn proceed(&self, marker: &Marker, call: &MethodCall<'_>, next: Next<'_>) -> DiResult<CallResult> {
        let label = marker.argument().unwrap_or(call.method());
        let started = Instant::now();
        debug!(service = call.service(), method = call.method(), label, "enter");
        let result = next.proceed();
        match &result {
            Ok(_) => debug!(
                service = call.service(),
                method = call.method(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "exit"
            ),
            Err(e) => warn!(service = call.service(), method = call.method(), error = %e, "failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MethodAspect for Recorder {
        fn proceed(&self, _marker: &Marker, call: &MethodCall<'_>, next: Next<'_>) -> DiResult<CallResult> {
            self.log.lock().push(format!("{}>{}", self.name, call.method()));
            let out = next.proceed();
            self.log.lock().push(format!("{}<", self.name));
            out
        }
    }

    struct ShortCircuit;

    impl MethodAspect for ShortCircuit {
        fn proceed(&self, _marker: &Marker, _call: &MethodCall<'_>, _next: Next<'_>) -> DiResult<CallResult> {
            Ok(Box::new(0usize))
        }
    }

    fn parts(chains: Chains, value: usize) -> ProxyParts {
        let slots = Arc::new(InstanceSlots::new());
        *slots.instance.write() = Some(Arc::new(value) as AnyArc);
        ProxyParts {
            service: "usize",
            slots,
            chains: Arc::new(chains),
        }
    }

    fn link(aspect: impl MethodAspect + 'static) -> ChainLink {
        ChainLink {
            aspect: Arc::new(aspect),
            marker: Marker::new("Test"),
        }
    }

    #[test]
    fn chain_runs_in_declaration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chains = Chains::new();
        chains.insert(
            "double".into(),
            vec![
                link(Recorder { name: "a", log: log.clone() }),
                link(Recorder { name: "b", log: log.clone() }),
            ],
        );

        let handle = ProxyHandle::<usize>::from_parts(parts(chains, 21));
        let out = handle.invoke("double", &[], |v| *v * 2).unwrap();

        assert_eq!(out, 42);
        assert_eq!(*log.lock(), vec!["a>double", "b>double", "b<", "a<"]);
    }

    #[test]
    fn unbound_method_calls_straight_through() {
        let handle = ProxyHandle::<usize>::from_parts(parts(Chains::new(), 7));
        assert_eq!(handle.invoke("get", &[], |v| *v).unwrap(), 7);
    }

    #[test]
    fn aspect_can_short_circuit() {
        let mut chains = Chains::new();
        chains.insert("get".into(), vec![link(ShortCircuit)]);
        let handle = ProxyHandle::<usize>::from_parts(parts(chains, 7));
        assert_eq!(handle.invoke("get", &[], |v| *v).unwrap(), 0);
    }

    #[test]
    fn wrong_result_type_is_a_mismatch() {
        let mut chains = Chains::new();
        chains.insert("get".into(), vec![link(ShortCircuit)]);
        let handle = ProxyHandle::<usize>::from_parts(parts(chains, 7));
        let result = handle.invoke("get", &[], |v| v.to_string());
        assert!(matches!(result, Err(DiError::TypeMismatch(_))));
    }

    #[test]
    fn call_exposes_typed_arguments() {
        let name = String::from("ada");
        let args: [&dyn Any; 2] = [&name, &3u8];
        let call = MethodCall { service: "svc", method: "m", args: &args };
        assert_eq!(call.arg::<String>(0).map(String::as_str), Some("ada"));
        assert_eq!(call.arg::<u8>(1), Some(&3));
        assert!(call.arg::<u8>(0).is_none());
    }
}
