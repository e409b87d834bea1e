//! Compile-time type identity.
//!
//! [`TypeInfo`] pairs Rust's [`TypeId`] with a readable type name. It is the
//! key the registry uses for identity-based lookup, and it is what a type
//! descriptor reports through `info()` even when the type itself was never
//! registered in a context (a base type, a member's value type).

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a compile-time type.
///
/// Equality and hashing use the [`TypeId`] only; the name is informational.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Get the identity of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, as reported by [`std::any::type_name`].
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this is the identity of `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// Get the identity of `T`.
///
/// ```
/// use typemeta_core::{type_id, TypeInfo};
///
/// assert_eq!(type_id::<i32>(), TypeInfo::of::<i32>());
/// assert_ne!(type_id::<i32>(), type_id::<u32>());
/// ```
#[inline]
pub fn type_id<T: ?Sized + 'static>() -> TypeInfo {
    TypeInfo::of::<T>()
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialEq<TypeId> for TypeInfo {
    fn eq(&self, other: &TypeId) -> bool {
        self.id == *other
    }
}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeInfo({})", self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
