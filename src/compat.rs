//! Compatibility matching between dependency requirements and descriptors.

use crate::descriptors::{ServiceDescriptor, ServiceId};
use crate::key::Key;

/// Whether `descriptor` satisfies a requirement for `required` with an
/// optional qualifier.
///
/// The descriptor matches when `required` is one of its assignable keys (or
/// the runtime type of its live instance, or the key of its attached façade) and the qualifier is absent or
/// equal to the descriptor's, ignoring case. Beans are matched on their own,
/// independently of their parent. Has no side effects.
///
/// ```rust
/// use ferrous_ioc::{compat, key_of_type, ServiceCollection, ServiceDescriptor};
///
/// struct Pool;
///
/// let mut services = ServiceCollection::new();
/// let id = services.add(
///     ServiceDescriptor::service::<Pool>().qualifier("Main").constructor(|_| Ok(Pool)),
/// );
/// let d = services.descriptor(id).unwrap();
///
/// assert!(compat::is_compatible(d, &key_of_type::<Pool>(), None));
/// assert!(compat::is_compatible(d, &key_of_type::<Pool>(), Some("main")));
/// assert!(!compat::is_compatible(d, &key_of_type::<Pool>(), Some("replica")));
/// assert!(!compat::is_compatible(d, &key_of_type::<u8>(), None));
/// ```
pub fn is_compatible(descriptor: &ServiceDescriptor, required: &Key, qualifier: Option<&str>) -> bool {
    if let Some(q) = qualifier {
        match descriptor.qualifier() {
            Some(own) if own.eq_ignore_ascii_case(q) => {}
            _ => return false,
        }
    }

    if descriptor.assignable_keys().any(|k| k == required) {
        return true;
    }
    if descriptor.slots.facade_key().as_ref() == Some(required) {
        return true;
    }

    match descriptor.slots.instance() {
        Some(instance) => !required.is_trait() && (*instance).type_id() == required.type_id(),
        None => false,
    }
}

/// Every compatible descriptor, in discovery order.
pub fn find_compatible(arena: &[ServiceDescriptor], required: &Key, qualifier: Option<&str>) -> Vec<ServiceId> {
    arena
        .iter()
        .filter(|d| is_compatible(d, required, qualifier))
        .map(|d| d.id())
        .collect()
}
