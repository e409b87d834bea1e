//! Isolated registration namespaces.
//!
//! A [`MetaCtx`] owns one [`Registry`]. The same compile-time type can be
//! registered in any number of contexts with a different shape in each, and
//! nothing registered in one context is ever visible from another.
//!
//! A process-wide default context is created lazily and returned by
//! [`MetaCtx::global`]. It behaves exactly like an explicit context.
//!
//! # Example
//!
//! ```
//! use typemeta_registry::{MetaCtx, MetaFactory};
//!
//! let ctx = MetaCtx::new();
//! MetaFactory::<i32>::new_in(&ctx).name("int".into());
//!
//! assert!(ctx.resolve::<i32>().is_some());
//! assert!(MetaCtx::new().resolve::<i32>().is_none());
//!
//! ctx.reset();
//! assert!(ctx.is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use typemeta_core::{Id, TypeInfo};

use crate::registry::Registry;

lazy_static! {
    static ref DEFAULT_CTX: MetaCtx = MetaCtx::new();
}

struct CtxInner {
    registry: RwLock<Registry>,
}

/// A registration namespace.
///
/// Cloning yields another handle to the same context. Two handles compare
/// equal only if they refer to the same context.
#[derive(Clone)]
pub struct MetaCtx {
    inner: Arc<CtxInner>,
}

#[allow(clippy::new_without_default)]
impl MetaCtx {
    /// Create a new, empty context.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CtxInner {
                registry: RwLock::new(Registry::new()),
            }),
        }
    }

    /// The process-wide default context.
    pub fn global() -> Self {
        DEFAULT_CTX.clone()
    }

    /// Check whether this is the default context.
    pub fn is_global(&self) -> bool {
        Arc::ptr_eq(&self.inner, &DEFAULT_CTX.inner)
    }

    /// Number of types registered in this context.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no types are registered in this context.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every descriptor registered in this context.
    ///
    /// Descriptors obtained before the reset fail with `InvalidType` from then
    /// on, even if the same types are registered again. Values and handles
    /// created before it lose their conversions and destructor hooks. Other
    /// contexts are unaffected.
    pub fn reset(&self) {
        let removed = self.write().drain();
        tracing::debug!(
            target: "typemeta::context",
            global = self.is_global(),
            removed = removed.len(),
            "context reset"
        );
        // Captured state of user callables is released here, outside the lock.
        drop(removed);
    }

    /// Drop the descriptor of `T` only. Returns whether one was registered.
    pub fn reset_type<T: ?Sized + 'static>(&self) -> bool {
        let info = TypeInfo::of::<T>();
        let removed = self.write().remove(info.id());
        tracing::debug!(
            target: "typemeta::context",
            type_name = info.name(),
            removed = removed.is_some(),
            "type reset"
        );
        removed.is_some()
    }

    /// Drop the descriptor of the type named `id`. Returns whether one was registered.
    pub fn reset_id(&self, id: Id) -> bool {
        let removed = self.write().remove_by_name(id);
        tracing::debug!(
            target: "typemeta::context",
            %id,
            removed = removed.is_some(),
            "type reset"
        );
        removed.is_some()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.registry.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.registry.write()
    }
}

impl PartialEq for MetaCtx {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MetaCtx {}

impl fmt::Debug for MetaCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaCtx")
            .field("global", &self.is_global())
            .field("types", &self.len())
            .finish()
    }
}
