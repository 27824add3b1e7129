//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every normalized record (user, profile, supplier, reseller) is an entity
/// keyed by its own strongly-typed identifier.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
