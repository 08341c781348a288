//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**; to "modify" one,
/// build a new one. `Amount` is the main example in this workspace: two
/// purchases of `1.5` litres carry equal amounts regardless of which batch
/// they belong to.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
