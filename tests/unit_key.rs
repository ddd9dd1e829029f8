/// Unit tests for Key type methods

use ferrous_ioc::{key_of_trait, key_of_type, Key};
use std::any::TypeId;
use std::collections::HashSet;

trait Logger: Send + Sync {}

#[test]
fn test_key_display_name_type() {
    let key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    assert_eq!(key.display_name(), "alloc::string::String");
    assert_eq!(key.to_string(), "alloc::string::String");
}

#[test]
fn test_key_display_name_trait() {
    let key = key_of_trait::<dyn Logger>();
    assert!(key.display_name().ends_with("Logger"));
    assert!(key.is_trait());
}

#[test]
fn test_keys_compare_by_type_id() {
    let a = Key::Type(TypeId::of::<u32>(), "u32");
    let b = Key::Type(TypeId::of::<u32>(), "renamed");
    assert_eq!(a, b);
    assert_eq!(a, key_of_type::<u32>());
    assert_ne!(a, key_of_type::<u64>());
}

#[test]
fn test_type_and_trait_keys_never_match() {
    let id = TypeId::of::<dyn Logger>();
    let as_type = Key::Type(id, "x");
    let as_trait = Key::Trait(id, "x");
    assert_ne!(as_type, as_trait);
    assert_eq!(as_trait.type_id(), id);
}

#[test]
fn test_key_hash_agrees_with_eq() {
    let mut set = HashSet::new();
    set.insert(key_of_type::<String>());
    set.insert(Key::Type(TypeId::of::<String>(), "alias"));
    set.insert(key_of_trait::<dyn Logger>());
    assert_eq!(set.len(), 2);
}
