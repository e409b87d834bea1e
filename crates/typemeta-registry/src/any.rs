//! Type-erased values and handles.
//!
//! [`MetaAny`] owns a value of any `'static` type; [`MetaHandle`] borrows one.
//! Both are tagged with the value's [`TypeInfo`] and bound to exactly one
//! [`MetaCtx`]: every cast, conversion and destructor lookup they perform goes
//! through that context's registrations and no other.
//!
//! # Casting
//!
//! - `try_cast::<T>()` succeeds when the value is a `T`, or when `T` is reachable
//!   through base links registered in the bound context.
//! - `cast::<T>()` additionally falls back to a registered conversion route.
//! - `convert::<T>()` only uses conversion routes and yields a new value.
//!
//! # Destruction
//!
//! Dropping (or [`reset`](MetaAny::reset)ting) a non-empty `MetaAny` runs the
//! destructor hook registered for its type in its bound context, if any.
//! Moving the value out with [`take`](MetaAny::take) or passing it as an
//! argument does not.
//!
//! # Invalidation
//!
//! A value or handle remembers the registration its type had in the bound
//! context when it was created. Once that registration is reset, conversions
//! fail with [`MetaError::InvalidType`], upcasts and `allow_cast` report
//! nothing, and dropping the value runs no destructor hook. A plain downcast
//! to the exact stored type keeps working.

use std::any::{Any, TypeId};
use std::fmt;

use typemeta_core::{MetaError, MetaResult, TypeInfo};

use crate::context::MetaCtx;
use crate::meta_type::MetaType;
use crate::native_fn::BoxedAny;
use crate::registry::{Registry, apply_upcasts, apply_upcasts_mut};

struct Owned {
    info: TypeInfo,
    /// Epoch of the type's registration at creation, `None` if unregistered.
    epoch: Option<u64>,
    value: BoxedAny,
}

/// An owning, type-erased value bound to a context.
pub struct MetaAny {
    ctx: MetaCtx,
    owned: Option<Owned>,
}

impl MetaAny {
    /// Wrap `value` in the default context.
    pub fn new<T: 'static>(value: T) -> Self {
        Self::new_in(&MetaCtx::global(), value)
    }

    /// Wrap `value` in `ctx`.
    pub fn new_in<T: 'static>(ctx: &MetaCtx, value: T) -> Self {
        Self::from_boxed(ctx.clone(), TypeInfo::of::<T>(), Box::new(value))
    }

    /// An empty value bound to `ctx`.
    pub fn empty_in(ctx: &MetaCtx) -> Self {
        Self {
            ctx: ctx.clone(),
            owned: None,
        }
    }

    /// `info` must describe the boxed value, not the box.
    pub(crate) fn from_boxed(ctx: MetaCtx, info: TypeInfo, value: BoxedAny) -> Self {
        let epoch = registered_epoch(&ctx, info);
        Self {
            ctx,
            owned: Some(Owned { info, epoch, value }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    /// Type of the held value.
    pub fn info(&self) -> Option<TypeInfo> {
        self.owned.as_ref().map(|owned| owned.info)
    }

    pub fn context(&self) -> &MetaCtx {
        &self.ctx
    }

    /// Descriptor of the held value's type in the bound context.
    pub fn type_(&self) -> Option<MetaType> {
        let owned = self.owned.as_ref()?;
        live_type(&self.ctx, owned.info, owned.epoch)
    }

    pub fn try_cast<T: 'static>(&self) -> Option<&T> {
        let owned = self.owned.as_ref()?;
        cast_ref(&self.ctx, owned.info, owned.epoch, &*owned.value)
    }

    pub fn try_cast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let owned = self.owned.as_mut()?;
        cast_mut(&self.ctx, owned.info, owned.epoch, &mut *owned.value)
    }

    /// Check whether [`cast`](Self::cast) to `T` would succeed.
    pub fn allow_cast<T: 'static>(&self) -> bool {
        self.owned.as_ref().is_some_and(|owned| {
            allow_cast::<T>(&self.ctx, owned.info, owned.epoch, &*owned.value)
        })
    }

    /// Copy out the value as a `T`, upcasting or converting as registered.
    pub fn cast<T: Clone + 'static>(&self) -> MetaResult<T> {
        let owned = self.owned.as_ref().ok_or(MetaError::EmptyValue)?;
        cast_value(&self.ctx, owned.info, owned.epoch, &*owned.value)
    }

    /// Produce a new value of type `T` through a registered conversion route.
    pub fn convert<T: 'static>(&self) -> MetaResult<MetaAny> {
        let owned = self.owned.as_ref().ok_or(MetaError::EmptyValue)?;
        convert_value(
            &self.ctx,
            owned.info,
            owned.epoch,
            &*owned.value,
            TypeInfo::of::<T>(),
        )
    }

    /// Move the value out if it is exactly a `T`, giving `self` back otherwise.
    pub fn take<T: 'static>(mut self) -> Result<T, MetaAny> {
        let Some(owned) = self.owned.take() else {
            return Err(self);
        };
        match owned.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                self.owned = Some(Owned {
                    info: owned.info,
                    epoch: owned.epoch,
                    value,
                });
                Err(self)
            }
        }
    }

    /// Destroy the held value, running its destructor hook, and leave `self` empty.
    pub fn reset(&mut self) {
        if let Some(mut owned) = self.owned.take() {
            let hook = self
                .ctx
                .read()
                .get_live(owned.info.id(), owned.epoch)
                .and_then(|node| node.dtor.clone());
            if let Some(hook) = hook {
                hook(&mut *owned.value);
            }
        }
    }

    /// Borrow the value mutably as a handle bound to the same context.
    pub fn as_handle(&mut self) -> MetaHandle<'_> {
        let (epoch, slot) = match self.owned.as_mut() {
            Some(owned) => (owned.epoch, Slot::Mut(owned.info, &mut *owned.value)),
            None => (None, Slot::Empty),
        };
        MetaHandle {
            ctx: self.ctx.clone(),
            epoch,
            slot,
        }
    }

    /// Borrow the value as a const handle bound to the same context.
    pub fn as_const_handle(&self) -> MetaHandle<'_> {
        let (epoch, slot) = match self.owned.as_ref() {
            Some(owned) => (owned.epoch, Slot::Ref(owned.info, &*owned.value)),
            None => (None, Slot::Empty),
        };
        MetaHandle {
            ctx: self.ctx.clone(),
            epoch,
            slot,
        }
    }

    pub(crate) fn view(&self) -> Option<(TypeInfo, &dyn Any)> {
        self.owned
            .as_ref()
            .map(|owned| (owned.info, &*owned.value))
    }

    /// Release the storage without running the destructor hook.
    pub(crate) fn into_boxed(mut self) -> Option<BoxedAny> {
        self.owned.take().map(|owned| owned.value)
    }
}

impl Default for MetaAny {
    fn default() -> Self {
        Self::empty_in(&MetaCtx::global())
    }
}

impl Drop for MetaAny {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for MetaAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaAny")
            .field("info", &self.info())
            .field("global", &self.ctx.is_global())
            .finish()
    }
}

enum Slot<'a> {
    Empty,
    Ref(TypeInfo, &'a dyn Any),
    Mut(TypeInfo, &'a mut dyn Any),
}

/// A non-owning, type-erased reference bound to a context.
pub struct MetaHandle<'a> {
    ctx: MetaCtx,
    epoch: Option<u64>,
    slot: Slot<'a>,
}

impl<'a> MetaHandle<'a> {
    /// Borrow `value` mutably in the default context.
    pub fn new<T: 'static>(value: &'a mut T) -> Self {
        Self::new_in(&MetaCtx::global(), value)
    }

    /// Borrow `value` mutably in `ctx`.
    pub fn new_in<T: 'static>(ctx: &MetaCtx, value: &'a mut T) -> Self {
        let info = TypeInfo::of::<T>();
        Self {
            ctx: ctx.clone(),
            epoch: registered_epoch(ctx, info),
            slot: Slot::Mut(info, value),
        }
    }

    /// Borrow `value` immutably in the default context.
    pub fn new_const<T: 'static>(value: &'a T) -> Self {
        Self::new_const_in(&MetaCtx::global(), value)
    }

    /// Borrow `value` immutably in `ctx`.
    pub fn new_const_in<T: 'static>(ctx: &MetaCtx, value: &'a T) -> Self {
        let info = TypeInfo::of::<T>();
        Self {
            ctx: ctx.clone(),
            epoch: registered_epoch(ctx, info),
            slot: Slot::Ref(info, value),
        }
    }

    /// A handle to nothing, in the default context. Used for static members.
    pub fn empty() -> Self {
        Self::empty_in(&MetaCtx::global())
    }

    pub fn empty_in(ctx: &MetaCtx) -> Self {
        Self {
            ctx: ctx.clone(),
            epoch: None,
            slot: Slot::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.slot, Slot::Empty)
    }

    /// Whether the referent can only be read through this handle.
    pub fn is_const(&self) -> bool {
        matches!(self.slot, Slot::Ref(..))
    }

    pub fn info(&self) -> Option<TypeInfo> {
        self.view().map(|(info, _)| info)
    }

    pub fn context(&self) -> &MetaCtx {
        &self.ctx
    }

    pub fn type_(&self) -> Option<MetaType> {
        live_type(&self.ctx, self.info()?, self.epoch)
    }

    pub fn try_cast<T: 'static>(&self) -> Option<&T> {
        let (info, value) = self.view()?;
        cast_ref(&self.ctx, info, self.epoch, value)
    }

    /// Fails on const handles.
    pub fn try_cast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        match &mut self.slot {
            Slot::Mut(info, value) => cast_mut(&self.ctx, *info, self.epoch, &mut **value),
            _ => None,
        }
    }

    pub fn allow_cast<T: 'static>(&self) -> bool {
        self.view()
            .is_some_and(|(info, value)| allow_cast::<T>(&self.ctx, info, self.epoch, value))
    }

    pub fn cast<T: Clone + 'static>(&self) -> MetaResult<T> {
        let (info, value) = self.view().ok_or(MetaError::EmptyValue)?;
        cast_value(&self.ctx, info, self.epoch, value)
    }

    pub fn convert<T: 'static>(&self) -> MetaResult<MetaAny> {
        let (info, value) = self.view().ok_or(MetaError::EmptyValue)?;
        convert_value(&self.ctx, info, self.epoch, value, TypeInfo::of::<T>())
    }

    pub(crate) fn view(&self) -> Option<(TypeInfo, &dyn Any)> {
        match &self.slot {
            Slot::Empty => None,
            Slot::Ref(info, value) => Some((*info, *value)),
            Slot::Mut(info, value) => Some((*info, &**value)),
        }
    }

    pub(crate) fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    pub(crate) fn view_mut(&mut self) -> MetaResult<(TypeInfo, &mut dyn Any)> {
        match &mut self.slot {
            Slot::Empty => Err(MetaError::EmptyValue),
            Slot::Ref(..) => Err(MetaError::ConstViolation { member: "handle" }),
            Slot::Mut(info, value) => Ok((*info, &mut **value)),
        }
    }
}

impl fmt::Debug for MetaHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaHandle")
            .field("info", &self.info())
            .field("const", &self.is_const())
            .field("global", &self.ctx.is_global())
            .finish()
    }
}

// ==========================================================================
// Shared cast machinery
// ==========================================================================

fn registered_epoch(ctx: &MetaCtx, info: TypeInfo) -> Option<u64> {
    ctx.read().get(info.id()).map(|node| node.epoch)
}

/// Fails when the registration a value was tagged with has been reset.
pub(crate) fn check_live(reg: &Registry, info: TypeInfo, epoch: Option<u64>) -> MetaResult<()> {
    match epoch {
        Some(epoch) if reg.get_live(info.id(), Some(epoch)).is_none() => {
            Err(MetaError::InvalidType {
                type_name: info.name(),
            })
        }
        _ => Ok(()),
    }
}

fn live_type(ctx: &MetaCtx, info: TypeInfo, epoch: Option<u64>) -> Option<MetaType> {
    let epoch = ctx.read().get_live(info.id(), epoch)?.epoch;
    Some(MetaType::bound(ctx.clone(), info, epoch))
}

fn cast_ref<'v, T: 'static>(
    ctx: &MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
    value: &'v dyn Any,
) -> Option<&'v T> {
    if info.is::<T>() {
        return value.downcast_ref::<T>();
    }
    let path = {
        let reg = ctx.read();
        check_live(&reg, info, epoch).ok()?;
        reg.upcast_path(info.id(), TypeId::of::<T>())?
    };
    apply_upcasts(value, &path)?.downcast_ref::<T>()
}

fn cast_mut<'v, T: 'static>(
    ctx: &MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
    value: &'v mut dyn Any,
) -> Option<&'v mut T> {
    if info.is::<T>() {
        return value.downcast_mut::<T>();
    }
    let path = {
        let reg = ctx.read();
        check_live(&reg, info, epoch).ok()?;
        reg.upcast_path(info.id(), TypeId::of::<T>())?
    };
    apply_upcasts_mut(value, &path)?.downcast_mut::<T>()
}

fn allow_cast<T: 'static>(
    ctx: &MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
    value: &dyn Any,
) -> bool {
    if cast_ref::<T>(ctx, info, epoch, value).is_some() {
        return true;
    }
    let reg = ctx.read();
    check_live(&reg, info, epoch).is_ok()
        && reg.find_conversion(info.id(), TypeId::of::<T>()).is_some()
}

fn cast_value<T: Clone + 'static>(
    ctx: &MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
    value: &dyn Any,
) -> MetaResult<T> {
    if let Some(found) = cast_ref::<T>(ctx, info, epoch, value) {
        return Ok(found.clone());
    }
    convert_value(ctx, info, epoch, value, TypeInfo::of::<T>())?
        .take::<T>()
        .map_err(|other| {
            MetaError::mismatch(
                std::any::type_name::<T>(),
                other.info().map_or("<empty>", |info| info.name()),
            )
        })
}

fn convert_value(
    ctx: &MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
    value: &dyn Any,
    target: TypeInfo,
) -> MetaResult<MetaAny> {
    let route = {
        let reg = ctx.read();
        check_live(&reg, info, epoch)?;
        reg.find_conversion(info.id(), target.id())
    }
    .ok_or_else(|| MetaError::mismatch(target.name(), info.name()))?;
    let converted = route.apply(value)?;
    Ok(MetaAny::from_boxed(ctx.clone(), route.target, converted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::MetaFactory;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Base {
        tag: i32,
    }

    #[derive(Clone, Default)]
    struct Derived {
        base: Base,
        extra: i32,
    }

    impl AsRef<Base> for Derived {
        fn as_ref(&self) -> &Base {
            &self.base
        }
    }

    impl AsMut<Base> for Derived {
        fn as_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    fn setup() -> MetaCtx {
        let ctx = MetaCtx::new();
        MetaFactory::<Derived>::new_in(&ctx)
            .base::<Base>()
            .conv(|d: &Derived| d.extra as i64);
        ctx
    }

    #[test]
    fn exact_cast() {
        let ctx = MetaCtx::new();
        let any = MetaAny::new_in(&ctx, 5i32);
        assert_eq!(any.try_cast::<i32>(), Some(&5));
        assert_eq!(any.cast::<i32>(), Ok(5));
        assert!(any.try_cast::<u32>().is_none());
        assert!(!any.allow_cast::<u32>());
    }

    #[test]
    fn upcast_through_registered_base() {
        let ctx = setup();
        let mut any = MetaAny::new_in(
            &ctx,
            Derived {
                base: Base { tag: 3 },
                extra: 0,
            },
        );
        assert_eq!(any.try_cast::<Base>().map(|b| b.tag), Some(3));

        if let Some(base) = any.try_cast_mut::<Base>() {
            base.tag = 8;
        }
        assert_eq!(any.cast::<Base>().map(|b| b.tag), Ok(8));
    }

    #[test]
    fn base_link_is_context_scoped() {
        let _ctx = setup();
        let other = MetaCtx::new();
        let any = MetaAny::new_in(&other, Derived::default());
        assert!(any.try_cast::<Base>().is_none());
    }

    #[test]
    fn conversion_route() {
        let ctx = setup();
        let any = MetaAny::new_in(
            &ctx,
            Derived {
                base: Base::default(),
                extra: 11,
            },
        );

        assert!(any.allow_cast::<i64>());
        assert_eq!(any.cast::<i64>(), Ok(11));

        let converted = any.convert::<i64>().unwrap();
        assert_eq!(converted.info(), Some(TypeInfo::of::<i64>()));
        assert_eq!(converted.context(), &ctx);

        assert!(matches!(
            any.cast::<u8>(),
            Err(MetaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn take_exact_type_only() {
        let ctx = MetaCtx::new();
        let any = MetaAny::new_in(&ctx, String::from("moved"));
        let any = any.take::<i32>().unwrap_err();
        assert_eq!(any.take::<String>().unwrap(), "moved");
    }

    #[test]
    fn drop_runs_context_hook() {
        let ctx = MetaCtx::new();
        let drops = Arc::new(AtomicUsize::new(0));
        let counter = drops.clone();
        MetaFactory::<Base>::new_in(&ctx).dtor(move |_: &mut Base| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut any = MetaAny::new_in(&ctx, Base::default());
        any.reset();
        assert!(any.is_empty());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        drop(MetaAny::new_in(&ctx, Base::default()));
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        let taken = MetaAny::new_in(&ctx, Base::default()).take::<Base>();
        assert!(taken.is_ok());
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        drop(MetaAny::new_in(&MetaCtx::new(), Base::default()));
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handles() {
        let ctx = setup();
        let mut value = Derived {
            base: Base { tag: 1 },
            extra: 2,
        };

        {
            let mut handle = MetaHandle::new_in(&ctx, &mut value);
            assert!(!handle.is_const());
            assert_eq!(handle.info(), Some(TypeInfo::of::<Derived>()));
            if let Some(base) = handle.try_cast_mut::<Base>() {
                base.tag = 4;
            }
            assert_eq!(handle.cast::<i64>(), Ok(2));
        }
        assert_eq!(value.base.tag, 4);

        let mut handle = MetaHandle::new_const_in(&ctx, &value);
        assert!(handle.is_const());
        assert!(handle.try_cast_mut::<Derived>().is_none());
        assert!(handle.try_cast::<Base>().is_some());
        assert!(matches!(
            handle.view_mut(),
            Err(MetaError::ConstViolation { .. })
        ));

        let empty = MetaHandle::empty_in(&ctx);
        assert!(empty.is_empty());
        assert_eq!(empty.cast::<i32>(), Err(MetaError::EmptyValue));
    }

    #[test]
    fn any_as_handle_shares_context() {
        let ctx = MetaCtx::new();
        let mut any = MetaAny::new_in(&ctx, 9u8);
        {
            let mut handle = any.as_handle();
            assert_eq!(handle.context(), &ctx);
            if let Some(v) = handle.try_cast_mut::<u8>() {
                *v = 10;
            }
        }
        assert_eq!(any.as_const_handle().cast::<u8>(), Ok(10));
        assert!(MetaAny::empty_in(&ctx).as_handle().is_empty());
    }

    #[test]
    fn type_resolves_in_bound_context() {
        let ctx = setup();
        assert!(MetaAny::new_in(&ctx, Derived::default()).type_().is_some());
        assert!(
            MetaAny::new_in(&MetaCtx::new(), Derived::default())
                .type_()
                .is_none()
        );
        assert!(MetaAny::empty_in(&ctx).type_().is_none());
    }

    #[test]
    fn values_outlive_their_registration() {
        let ctx = setup();
        let drops = Arc::new(AtomicUsize::new(0));
        let counter = drops.clone();
        MetaFactory::<Derived>::new_in(&ctx).dtor(move |_: &mut Derived| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let value = Derived {
            base: Base { tag: 6 },
            extra: 7,
        };
        let mut any = MetaAny::new_in(&ctx, value.clone());
        let handle = MetaHandle::new_const_in(&ctx, &value);
        assert!(any.allow_cast::<i64>());
        assert!(handle.allow_cast::<i64>());
        ctx.reset();

        assert!(matches!(
            any.cast::<i64>(),
            Err(MetaError::InvalidType { .. })
        ));
        assert!(matches!(
            any.convert::<i64>(),
            Err(MetaError::InvalidType { .. })
        ));
        assert!(!any.allow_cast::<i64>());
        assert!(any.try_cast::<Base>().is_none());
        assert!(any.type_().is_none());
        assert_eq!(any.try_cast::<Derived>().map(|d| d.extra), Some(7));

        assert!(matches!(
            handle.cast::<i64>(),
            Err(MetaError::InvalidType { .. })
        ));

        any.reset();
        assert!(any.is_empty());
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reregistration_does_not_revive_values() {
        let ctx = setup();
        let drops = Arc::new(AtomicUsize::new(0));
        let stale = MetaAny::new_in(&ctx, Derived::default());
        let mut value = Derived::default();
        let mut handle = MetaHandle::new_in(&ctx, &mut value);
        assert!(ctx.reset_type::<Derived>());

        let counter = drops.clone();
        MetaFactory::<Derived>::new_in(&ctx)
            .base::<Base>()
            .conv(|d: &Derived| d.extra as i64)
            .dtor(move |_: &mut Derived| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        assert!(!stale.allow_cast::<i64>());
        assert!(handle.try_cast_mut::<Base>().is_none());
        assert!(matches!(
            handle.convert::<i64>(),
            Err(MetaError::InvalidType { .. })
        ));
        drop(stale);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        let fresh = MetaAny::new_in(&ctx, Derived::default());
        assert_eq!(fresh.cast::<i64>(), Ok(0));
        drop(fresh);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
