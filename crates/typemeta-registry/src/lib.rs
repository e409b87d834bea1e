//! Context-scoped type descriptors for typemeta.
//!
//! This crate holds everything that lives inside a [`MetaCtx`]:
//!
//! - [`MetaFactory`]: registers types, bases, constructors, destructor hooks,
//!   data members, functions and conversions
//! - [`MetaType`], [`MetaData`], [`MetaFunc`]: descriptors obtained by resolution
//! - [`MetaAny`], [`MetaHandle`]: the owning and borrowing type-erased values
//!   every reflective operation consumes and produces
//!
//! # Example
//!
//! ```
//! use typemeta_registry::{Id, MetaCtx, MetaFactory, MetaHandle};
//!
//! let global = MetaCtx::new();
//! let local = MetaCtx::new();
//!
//! MetaFactory::<i32>::new_in(&global).data_const(Id::from_name("marker"), 1);
//! MetaFactory::<i32>::new_in(&local).data_const(Id::from_name("marker"), 42);
//!
//! let read = |ctx: &MetaCtx| {
//!     ctx.resolve::<i32>()
//!         .and_then(|ty| ty.data(Id::from_name("marker")))
//!         .and_then(|data| data.get(MetaHandle::empty_in(ctx)).ok())
//!         .and_then(|value| value.cast::<i32>().ok())
//! };
//!
//! assert_eq!(read(&global), Some(1));
//! assert_eq!(read(&local), Some(42));
//! ```

mod any;
mod binding;
mod context;
mod factory;
mod meta_data;
mod meta_func;
mod meta_type;
mod native_fn;
mod registry;
mod resolve;

pub use any::{MetaAny, MetaHandle};
pub use context::MetaCtx;
pub use factory::MetaFactory;
pub use meta_data::MetaData;
pub use meta_func::MetaFunc;
pub use meta_type::MetaType;
pub use native_fn::{BoxedAny, IntoConstMethod, IntoFreeFn, IntoMethod, Invoker, Receiver};
pub use registry::MetaTraits;

pub use typemeta_core::{Id, MemberKind, MetaError, MetaResult, TypeInfo, type_id};
