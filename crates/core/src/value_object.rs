//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute
/// values are interchangeable. They are immutable; "modifying" one means
/// constructing a new value.
///
/// - **Value Object**: `Money(29800)`, a shipping address
/// - **Entity**: `InventoryItem { id: ItemId(..), .. }`
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
