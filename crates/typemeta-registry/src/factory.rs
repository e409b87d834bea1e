//! MetaFactory for registering types with a context.
//!
//! MetaFactory provides a fluent API that records one fact about a type at a
//! time: its name, a base, a constructor, the destructor hook, a data member,
//! a function or a conversion. Each call writes straight into the context's
//! registry, so a partially built chain is already visible to resolution.
//!
//! # Example
//!
//! ```
//! use typemeta_registry::{Id, MetaAny, MetaCtx, MetaFactory, MetaHandle};
//!
//! #[derive(Default)]
//! struct Vec2 {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let ctx = MetaCtx::new();
//! MetaFactory::<Vec2>::new_in(&ctx)
//!     .name(Id::from_name("Vec2"))
//!     .default_ctor()
//!     .ctor(|x: f32, y: f32| Vec2 { x, y })
//!     .data(Id::from_name("x"), |v: &Vec2| v.x, |v: &mut Vec2, x: f32| v.x = x)
//!     .func_const(Id::from_name("length"), |v: &Vec2| (v.x * v.x + v.y * v.y).sqrt());
//!
//! let ty = ctx.resolve_id(Id::from_name("Vec2")).unwrap();
//! let v = ty
//!     .construct(vec![MetaAny::new_in(&ctx, 3.0f32), MetaAny::new_in(&ctx, 4.0f32)])
//!     .unwrap();
//! let length = ty
//!     .func(Id::from_name("length"))
//!     .unwrap()
//!     .invoke(v.as_const_handle(), vec![])
//!     .unwrap();
//! assert_eq!(length.cast::<f32>(), Ok(5.0));
//! ```
//!
//! # Overwriting
//!
//! Registering a data member or function under an identifier that is already
//! in use replaces it. The same holds for the destructor hook, for a
//! constructor with an identical signature, for a base type and for a
//! conversion to the same target type.

use std::any::TypeId;
use std::marker::PhantomData;

use typemeta_core::{Id, TypeInfo};

use crate::context::MetaCtx;
use crate::native_fn::{
    IntoConstMethod, IntoFreeFn, IntoMethod, erase_constant, erase_converter, erase_destructor,
    erase_getter, erase_setter, upcast, upcast_mut,
};
use crate::registry::{BaseNode, ConvNode, CtorNode, DataNode, FuncNode, MetaTraits, TypeNode};

/// Builder that registers facts about `T` in one context.
///
/// Created with [`MetaFactory::new`] (default context) or
/// [`MetaFactory::new_in`]. Creating a factory registers `T` with an empty
/// descriptor if it is not registered yet.
pub struct MetaFactory<T: 'static> {
    ctx: MetaCtx,
    _marker: PhantomData<fn() -> T>,
}

#[allow(clippy::new_without_default)]
impl<T: 'static> MetaFactory<T> {
    /// Start registering `T` in the default context.
    pub fn new() -> Self {
        Self::new_in(&MetaCtx::global())
    }

    /// Start registering `T` in `ctx`.
    pub fn new_in(ctx: &MetaCtx) -> Self {
        ctx.write().get_or_insert(TypeInfo::of::<T>());
        Self {
            ctx: ctx.clone(),
            _marker: PhantomData,
        }
    }

    /// The context this factory writes into.
    pub fn context(&self) -> &MetaCtx {
        &self.ctx
    }

    /// Apply one change to the node of `T`. Whatever the change hands back
    /// (typically a replaced entry) is dropped after the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut TypeNode) -> R) -> R {
        let mut reg = self.ctx.write();
        f(reg.get_or_insert(TypeInfo::of::<T>()))
    }

    // ==========================================================================
    // Identity and hierarchy
    // ==========================================================================

    /// Give `T` a hashed name in this context, replacing any previous name.
    pub fn name(self, id: Id) -> Self {
        {
            let mut reg = self.ctx.write();
            reg.get_or_insert(TypeInfo::of::<T>());
            reg.set_name(TypeId::of::<T>(), id);
        }
        self
    }

    /// Declare `B` as a base of `T`.
    ///
    /// `B` does not need to be registered itself. Values of `T` can then be
    /// viewed as `B`, and members of `B` (if registered) are found through `T`.
    pub fn base<B: 'static>(self) -> Self
    where
        T: AsRef<B> + AsMut<B>,
    {
        let base = BaseNode {
            info: TypeInfo::of::<B>(),
            cast: upcast::<T, B>,
            cast_mut: upcast_mut::<T, B>,
        };
        self.update(|node| {
            match node.bases.iter_mut().find(|existing| existing.info == base.info) {
                Some(existing) => *existing = base,
                None => node.bases.push(base),
            }
        });
        self
    }

    // ==========================================================================
    // Construction and destruction
    // ==========================================================================

    /// Register a constructor taking the closure's argument types.
    pub fn ctor<Args, F>(self, f: F) -> Self
    where
        F: IntoFreeFn<Args, T>,
    {
        let ctor = CtorNode {
            args: F::signature(),
            invoke: f.into_invoker(),
        };
        let replaced = self.update(|node| {
            match node.ctors.iter_mut().find(|existing| existing.args == ctor.args) {
                Some(existing) => Some(std::mem::replace(existing, ctor)),
                None => {
                    node.ctors.push(ctor);
                    None
                }
            }
        });
        drop(replaced);
        self
    }

    /// Register `T::default` as the zero-argument constructor.
    pub fn default_ctor(self) -> Self
    where
        T: Default,
    {
        self.ctor(T::default)
    }

    /// Set the hook run when an owning value of `T` bound to this context is destroyed.
    pub fn dtor<D>(self, hook: D) -> Self
    where
        D: Fn(&mut T) + Send + Sync + 'static,
    {
        let hook = erase_destructor(hook);
        let replaced = self.update(|node| node.dtor.replace(hook));
        drop(replaced);
        self
    }

    // ==========================================================================
    // Data members
    // ==========================================================================

    /// Register a read-write data member.
    pub fn data<V, G, S>(self, id: Id, get: G, set: S) -> Self
    where
        V: 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.insert_data(DataNode {
            id,
            value_type: TypeInfo::of::<V>(),
            traits: MetaTraits::empty(),
            get: erase_getter(get),
            set: Some(erase_setter(set)),
        })
    }

    /// Register a data member with a getter only.
    pub fn data_readonly<V, G>(self, id: Id, get: G) -> Self
    where
        V: 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.insert_data(DataNode {
            id,
            value_type: TypeInfo::of::<V>(),
            traits: MetaTraits::CONST,
            get: erase_getter::<T, V, G>(get),
            set: None,
        })
    }

    /// Register a constant readable without an instance.
    pub fn data_const<V>(self, id: Id, value: V) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        self.insert_data(DataNode {
            id,
            value_type: TypeInfo::of::<V>(),
            traits: MetaTraits::CONST | MetaTraits::STATIC,
            get: erase_constant(value),
            set: None,
        })
    }

    fn insert_data(self, data: DataNode) -> Self {
        let replaced = self.update(|node| node.data.insert(data.id, data));
        drop(replaced);
        self
    }

    // ==========================================================================
    // Functions
    // ==========================================================================

    /// Register a member function taking `&mut T`.
    pub fn func<Args, R, F>(self, id: Id, f: F) -> Self
    where
        R: 'static,
        F: IntoMethod<T, Args, R>,
    {
        self.insert_func(FuncNode {
            id,
            args: F::signature(),
            ret: TypeInfo::of::<R>(),
            traits: MetaTraits::empty(),
            invoke: f.into_invoker(),
        })
    }

    /// Register a member function taking `&T`.
    pub fn func_const<Args, R, F>(self, id: Id, f: F) -> Self
    where
        R: 'static,
        F: IntoConstMethod<T, Args, R>,
    {
        self.insert_func(FuncNode {
            id,
            args: F::signature(),
            ret: TypeInfo::of::<R>(),
            traits: MetaTraits::CONST,
            invoke: f.into_invoker(),
        })
    }

    /// Register a free function under `T`.
    pub fn func_static<Args, R, F>(self, id: Id, f: F) -> Self
    where
        R: 'static,
        F: IntoFreeFn<Args, R>,
    {
        self.insert_func(FuncNode {
            id,
            args: F::signature(),
            ret: TypeInfo::of::<R>(),
            traits: MetaTraits::STATIC,
            invoke: f.into_invoker(),
        })
    }

    fn insert_func(self, func: FuncNode) -> Self {
        let replaced = self.update(|node| node.funcs.insert(func.id, func));
        drop(replaced);
        self
    }

    // ==========================================================================
    // Conversions
    // ==========================================================================

    /// Register an implicit conversion from `T` to `U`.
    pub fn conv<U, C>(self, convert: C) -> Self
    where
        U: 'static,
        C: Fn(&T) -> U + Send + Sync + 'static,
    {
        let conv = ConvNode {
            target: TypeInfo::of::<U>(),
            convert: erase_converter(convert),
        };
        let replaced = self.update(|node| node.convs.insert(TypeId::of::<U>(), conv));
        drop(replaced);
        self
    }

    /// Register the conversion given by `T: Into<U>`.
    pub fn conv_into<U: 'static>(self) -> Self
    where
        T: Clone + Into<U>,
    {
        self.conv(|value: &T| -> U { value.clone().into() })
    }
}
