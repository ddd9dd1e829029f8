//! Type keys used to match dependencies against service descriptors.

use std::any::TypeId;

/// Key identifying a type a service can be injected as.
///
/// Every descriptor is reachable through its concrete `Key::Type`, plus one
/// `Key::Trait` per trait object it declares with
/// [`ServiceBuilder::provides`](crate::ServiceBuilder::provides).
/// Qualifiers live on descriptors and parameters, not on keys.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{key_of_trait, key_of_type, Key};
///
/// trait Clock: Send + Sync {}
///
/// let k = key_of_type::<u32>();
/// assert_eq!(k.display_name(), "u32");
/// assert!(!k.is_trait());
///
/// let t = key_of_trait::<dyn Clock>();
/// assert!(t.is_trait());
/// assert_ne!(k, t);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    ///
    /// Values for this key are stored as `Arc<T>`.
    Type(TypeId, &'static str),
    /// Trait object key with the TypeId of `dyn Trait`
    ///
    /// Values for this key are stored as `Arc<Arc<dyn Trait>>` so they can
    /// travel through `dyn Any`.
    Trait(TypeId, &'static str),
}

impl Key {
    /// Get the type or trait name for display
    ///
    /// ```rust
    /// use ferrous_ioc::Key;
    /// use std::any::TypeId;
    ///
    /// let type_key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    /// assert_eq!(type_key.display_name(), "alloc::string::String");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(_, name) => name,
        }
    }

    /// The `TypeId` behind this key.
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::Trait(id, _) => *id,
        }
    }

    /// Whether values for this key are double-wrapped trait objects.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_, _))
    }
}

// Names are for diagnostics only; identity is the TypeId.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a, _), Key::Trait(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(id, _) => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a trait object type such as `dyn Logger`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(TypeId::of::<T>(), std::any::type_name::<T>())
}
