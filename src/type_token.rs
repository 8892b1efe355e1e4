//! Runtime type tags for edge endpoints.
//!
//! The typed builder layer guarantees at compile time that a producer's
//! output row type matches its consumer's input row type. The graph arena is
//! type-erased, however, so every unit also carries a [`TypeTag`] per
//! endpoint. Linking asserts tag equality, which catches the few dynamic
//! construction paths (cursor rewinds, hand-wired edges) that the type
//! system cannot see through.

use std::any::{type_name, Any, TypeId};

/// A lightweight runtime type tag for debugging and assertions.
///
/// `TypeTag` carries the `TypeId` and a readable type name. It is attached
/// to both endpoints of every unit so the linking layer and the scheduler
/// can reason about row types without a generic parameter.
///
/// ```
/// use rowflow::type_token::TypeTag;
/// let tag = TypeTag::of::<(u32, char)>();
/// assert_eq!(tag, TypeTag::of::<(u32, char)>());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    /// Construct a tag for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Check a type-erased value against this tag.
    pub fn matches(&self, v: &dyn Any) -> bool {
        v.type_id() == self.id
    }
}
