//! Deterministic hashed identifiers.
//!
//! This module provides [`Id`], the 64-bit key used for every name-based
//! lookup in the registry: type names, data member names and function names.
//! Identifiers are computed deterministically from a name, so the same name
//! always yields the same key and no registration order is involved.
//!
//! # Hash Computation
//!
//! The default hasher is XXHash64 with a fixed seed. It is a `const fn`, so
//! identifiers can be computed at compile time and used as constants.
//!
//! The registry never hashes names itself; it only stores and compares `Id`s.
//! Callers that need a different hash function can supply their own through
//! [`Id::with_hasher`] or [`Id::from_raw`].
//!
//! # Examples
//!
//! ```
//! use typemeta_core::Id;
//!
//! const MARKER: Id = Id::from_name("marker");
//!
//! assert_eq!(MARKER, Id::from_name("marker"));
//! assert_ne!(MARKER, Id::from_name("value"));
//! assert_eq!(Id::from("marker"), MARKER);
//! ```

use std::fmt;
use xxhash_rust::const_xxh64::xxh64;

/// Seed for the default name hasher.
const SEED: u64 = 0;

/// A deterministic 64-bit identifier derived from a name.
///
/// Uniqueness is required for types within a context and for data/function
/// names within a type. Collisions are not detected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Id(pub u64);

impl Id {
    /// Empty/invalid identifier constant.
    pub const EMPTY: Id = Id(0);

    /// Create an identifier from a name with the default hasher.
    ///
    /// The same name always produces the same identifier.
    ///
    /// ```
    /// use typemeta_core::Id;
    ///
    /// let a = Id::from_name("foo");
    /// let b = Id::from_name("foo");
    /// assert_eq!(a, b);
    /// ```
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        Id(xxh64(name.as_bytes(), SEED))
    }

    /// Create an identifier from a name with a caller-supplied hash function.
    ///
    /// ```
    /// use typemeta_core::Id;
    ///
    /// let fnv = |bytes: &[u8]| {
    ///     bytes.iter().fold(0xcbf29ce484222325u64, |h, b| (h ^ *b as u64).wrapping_mul(0x100000001b3))
    /// };
    /// assert_eq!(Id::with_hasher("foo", fnv), Id::with_hasher("foo", fnv));
    /// ```
    #[inline]
    pub fn with_hasher<F>(name: &str, hasher: F) -> Self
    where
        F: Fn(&[u8]) -> u64,
    {
        Id(hasher(name.as_bytes()))
    }

    /// Wrap a precomputed hash value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Id(raw)
    }

    /// Check if this is the empty identifier.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<&str> for Id {
    #[inline]
    fn from(name: &str) -> Self {
        Id::from_name(name)
    }
}

impl From<u64> for Id {
    #[inline]
    fn from(raw: u64) -> Self {
        Id(raw)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:#018x})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
