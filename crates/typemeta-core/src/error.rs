//! Error taxonomy for reflective operations.
//!
//! Every failure is local to the call that produced it and is returned to the
//! caller as a value; nothing in the registry panics or aborts on a lookup,
//! binding or conversion failure.
//!
//! ## Error Kinds
//!
//! ```text
//! MetaError
//! ├── NotFound        - identifier not registered in the queried context
//! ├── TypeMismatch    - value type incompatible and no conversion route
//! ├── ArityMismatch   - argument count matches no registered signature
//! ├── ConstViolation  - write through a const member or const handle
//! ├── InvalidType     - descriptor or value invalidated by a context reset
//! └── EmptyValue      - operation on an empty value or handle
//! ```

use thiserror::Error;

use crate::Id;

/// What kind of entity a [`MetaError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A type descriptor.
    Type,
    /// A data member.
    Data,
    /// A member or free function.
    Func,
    /// A constructor.
    Ctor,
}

impl MemberKind {
    /// Human-readable name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Type => "type",
            MemberKind::Data => "data member",
            MemberKind::Func => "function",
            MemberKind::Ctor => "constructor",
        }
    }
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by reflective get/set/invoke/construct/cast operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// The identifier is not registered in the queried context.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: MemberKind,
        /// The identifier that was looked up.
        id: Id,
    },

    /// A value's runtime type does not match the declared type and no
    /// conversion route exists.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The declared type name.
        expected: &'static str,
        /// The runtime type name.
        actual: &'static str,
    },

    /// Argument count matches no registered signature.
    #[error("arity mismatch: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Declared arity (for constructors, the closest registered arity).
        expected: usize,
        /// Number of arguments supplied.
        got: usize,
    },

    /// Write attempted through a const member or a const handle.
    #[error("cannot mutate through const {member}")]
    ConstViolation {
        /// The member or handle that is const.
        member: &'static str,
    },

    /// The descriptor, or the registration a value was created under, was
    /// invalidated by a context reset.
    #[error("invalid type: {type_name} is no longer registered in this context")]
    InvalidType {
        /// The type whose descriptor is gone.
        type_name: &'static str,
    },

    /// The value or handle holds nothing.
    #[error("operation on an empty value")]
    EmptyValue,
}

impl MetaError {
    /// Shorthand for a type mismatch between two named types.
    pub fn mismatch(expected: &'static str, actual: &'static str) -> Self {
        MetaError::TypeMismatch { expected, actual }
    }
}

/// Result alias used across the registry.
pub type MetaResult<T> = Result<T, MetaError>;
