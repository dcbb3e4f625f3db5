//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Stores key persisted records by `id()` when merging a collection, so two
/// records with the same id are the same entity regardless of their fields.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
