//! Leaf types shared by the typemeta crates.
//!
//! - [`Id`]: hashed identifier used for every name-based lookup
//! - [`TypeInfo`]: compile-time type identity
//! - [`MetaError`]: error taxonomy for reflective operations

mod error;
mod id;
mod type_info;

pub use error::{MemberKind, MetaError, MetaResult};
pub use id::Id;
pub use type_info::{TypeInfo, type_id};
