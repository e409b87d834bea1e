//! Context-scoped runtime type reflection.
//!
//! `typemeta` lets a program describe its types at runtime (names, bases,
//! data members, functions, constructors, destructor hooks and implicit
//! conversions) and then query and use those descriptions without knowing the
//! concrete types at compile time.
//!
//! Every description lives in a [`MetaCtx`]. The same Rust type can be
//! registered in several contexts with a different shape in each; nothing
//! registered in one context leaks into another. A process-wide default
//! context backs the context-less functions ([`meta`], [`resolve`], ...), and
//! each of them has an `_in` counterpart taking an explicit context.
//!
//! # Example
//!
//! ```
//! use typemeta::prelude::*;
//!
//! #[derive(Default)]
//! struct Player {
//!     health: i32,
//! }
//!
//! let ctx = create_context();
//! meta_in::<Player>(&ctx)
//!     .name(Id::from_name("Player"))
//!     .default_ctor()
//!     .data(
//!         Id::from_name("health"),
//!         |p: &Player| p.health,
//!         |p: &mut Player, v: i32| p.health = v,
//!     );
//!
//! let ty = resolve_id_in(&ctx, Id::from_name("Player")).unwrap();
//! let mut player = ty.construct(vec![]).unwrap();
//!
//! let health = ty.data(Id::from_name("health")).unwrap();
//! assert!(health.set(player.as_handle(), wrap(&ctx, 80)));
//! assert_eq!(player.try_cast::<Player>().map(|p| p.health), Some(80));
//!
//! // Nothing leaks into the default context.
//! assert!(resolve::<Player>().is_none());
//! ```
//!
//! # Crates
//!
//! - `typemeta-core`: [`Id`], [`TypeInfo`], [`MetaError`]
//! - `typemeta-registry`: contexts, descriptors, values and the registration factory
//!
//! # Features
//!
//! - `profiling`: instrument resolution, construction, get/set and invoke
//!   with the `profiling` crate
//! - `profile-with-puffin`: route those scopes to puffin

pub use typemeta_core::{Id, MemberKind, MetaError, MetaResult, TypeInfo, type_id};
pub use typemeta_registry::{
    IntoConstMethod, IntoFreeFn, IntoMethod, MetaAny, MetaCtx, MetaData, MetaFactory, MetaFunc,
    MetaHandle, MetaTraits, MetaType, Receiver,
};

/// Everything needed to register and query types.
pub mod prelude {
    pub use crate::{
        Id, MetaAny, MetaCtx, MetaData, MetaError, MetaFactory, MetaFunc, MetaHandle, MetaResult,
        MetaType, TypeInfo, as_handle, create_context, default_context, meta, meta_in, reset,
        reset_default, resolve, resolve_all, resolve_all_in, resolve_id, resolve_id_in,
        resolve_in, resolve_info, resolve_info_in, type_id, wrap,
    };
}

// ==========================================================================
// Contexts
// ==========================================================================

/// Create a new, empty context.
pub fn create_context() -> MetaCtx {
    MetaCtx::new()
}

/// The process-wide default context.
pub fn default_context() -> MetaCtx {
    MetaCtx::global()
}

/// Drop every descriptor registered in `ctx`. Other contexts are unaffected.
pub fn reset(ctx: &MetaCtx) {
    ctx.reset();
}

/// Drop every descriptor registered in the default context.
pub fn reset_default() {
    MetaCtx::global().reset();
}

// ==========================================================================
// Registration
// ==========================================================================

/// Start registering `T` in the default context.
pub fn meta<T: 'static>() -> MetaFactory<T> {
    MetaFactory::new()
}

/// Start registering `T` in `ctx`.
pub fn meta_in<T: 'static>(ctx: &MetaCtx) -> MetaFactory<T> {
    MetaFactory::new_in(ctx)
}

// ==========================================================================
// Resolution
// ==========================================================================

/// Descriptor for `T` in the default context.
pub fn resolve<T: ?Sized + 'static>() -> Option<MetaType> {
    MetaCtx::global().resolve::<T>()
}

/// Descriptor for `T` in `ctx`.
pub fn resolve_in<T: ?Sized + 'static>(ctx: &MetaCtx) -> Option<MetaType> {
    ctx.resolve::<T>()
}

/// Descriptor for the type named `id` in the default context.
pub fn resolve_id(id: Id) -> Option<MetaType> {
    MetaCtx::global().resolve_id(id)
}

/// Descriptor for the type named `id` in `ctx`.
pub fn resolve_id_in(ctx: &MetaCtx, id: Id) -> Option<MetaType> {
    ctx.resolve_id(id)
}

/// Descriptor for the type identified by `info` in the default context.
pub fn resolve_info(info: &TypeInfo) -> Option<MetaType> {
    MetaCtx::global().resolve_info(info)
}

/// Descriptor for the type identified by `info` in `ctx`.
pub fn resolve_info_in(ctx: &MetaCtx, info: &TypeInfo) -> Option<MetaType> {
    ctx.resolve_info(info)
}

/// Every type registered in the default context.
pub fn resolve_all() -> Vec<MetaType> {
    MetaCtx::global().resolve_all()
}

/// Every type registered in `ctx`.
pub fn resolve_all_in(ctx: &MetaCtx) -> Vec<MetaType> {
    ctx.resolve_all()
}

// ==========================================================================
// Values
// ==========================================================================

/// Take ownership of `value` as a type-erased value bound to `ctx`.
pub fn wrap<T: 'static>(ctx: &MetaCtx, value: T) -> MetaAny {
    MetaAny::new_in(ctx, value)
}

/// Borrow `value` as a type-erased handle bound to `ctx`.
pub fn as_handle<'a, T: 'static>(ctx: &MetaCtx, value: &'a mut T) -> MetaHandle<'a> {
    MetaHandle::new_in(ctx, value)
}
