//! Type-erased storage for registered callables.
//!
//! Every operation a descriptor can perform (construct, destroy, get, set,
//! invoke, convert, upcast) is stored as a uniform erased callable so that
//! descriptors of different types live side by side in one registry.
//!
//! Typed closures are turned into erased callables by three traits, one per
//! receiver kind:
//!
//! - [`IntoMethod`]: `Fn(&mut T, A0, .., An) -> R`
//! - [`IntoConstMethod`]: `Fn(&T, A0, .., An) -> R`
//! - [`IntoFreeFn`]: `Fn(A0, .., An) -> R` (free functions and constructors)
//!
//! Each is implemented for closures of up to six arguments. The erased form
//! only downcasts: by the time it runs, the caller has already bound every
//! argument to exactly the declared type (see `binding`).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use typemeta_core::{MetaError, MetaResult, TypeInfo};

/// An owned, type-erased value.
pub type BoxedAny = Box<dyn Any>;

/// Erased member/free function or constructor.
pub type Invoker =
    Arc<dyn for<'a> Fn(Receiver<'a>, Vec<BoxedAny>) -> MetaResult<BoxedAny> + Send + Sync>;

/// Erased data getter. Static data ignores the instance.
pub(crate) type Getter = Arc<dyn Fn(Option<&dyn Any>) -> MetaResult<BoxedAny> + Send + Sync>;

/// Erased data setter.
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, BoxedAny) -> MetaResult<()> + Send + Sync>;

/// Erased conversion from the owning type to a target type.
pub(crate) type Converter = Arc<dyn Fn(&dyn Any) -> MetaResult<BoxedAny> + Send + Sync>;

/// Erased destructor hook.
pub(crate) type Destructor = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// Upcast from a derived value to one of its bases.
pub(crate) type UpCast = fn(&dyn Any) -> Option<&dyn Any>;

/// Mutable upcast from a derived value to one of its bases.
pub(crate) type UpCastMut = fn(&mut dyn Any) -> Option<&mut dyn Any>;

/// The instance an erased invoker runs against.
pub enum Receiver<'a> {
    /// No instance (free functions, constructors).
    None,
    /// Shared instance (const methods).
    Ref(&'a dyn Any),
    /// Exclusive instance (non-const methods).
    Mut(&'a mut dyn Any),
}

impl<'a> Receiver<'a> {
    /// Downcast to a shared reference. A mutable receiver is reborrowed as shared.
    pub fn downcast_ref<T: 'static>(self) -> MetaResult<&'a T> {
        let value: &'a dyn Any = match self {
            Receiver::None => return Err(MetaError::EmptyValue),
            Receiver::Ref(value) => value,
            Receiver::Mut(value) => value,
        };
        value
            .downcast_ref::<T>()
            .ok_or_else(|| MetaError::mismatch(std::any::type_name::<T>(), "<erased receiver>"))
    }

    /// Downcast to an exclusive reference.
    pub fn downcast_mut<T: 'static>(self) -> MetaResult<&'a mut T> {
        match self {
            Receiver::None => Err(MetaError::EmptyValue),
            Receiver::Ref(_) => Err(MetaError::ConstViolation { member: "receiver" }),
            Receiver::Mut(value) => value
                .downcast_mut::<T>()
                .ok_or_else(|| MetaError::mismatch(std::any::type_name::<T>(), "<erased receiver>")),
        }
    }
}

impl fmt::Debug for Receiver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receiver::None => write!(f, "None"),
            Receiver::Ref(_) => write!(f, "Ref(..)"),
            Receiver::Mut(_) => write!(f, "Mut(..)"),
        }
    }
}

/// Pull the next bound argument and downcast it to its declared type.
fn take_arg<A: 'static>(args: &mut impl Iterator<Item = BoxedAny>, index: usize) -> MetaResult<A> {
    let boxed = args.next().ok_or(MetaError::ArityMismatch {
        expected: index + 1,
        got: index,
    })?;
    boxed
        .downcast::<A>()
        .map(|value| *value)
        .map_err(|_| MetaError::mismatch(std::any::type_name::<A>(), "<erased argument>"))
}

/// Closures usable as non-const member functions of `T`.
pub trait IntoMethod<T, Args, R>: Send + Sync + 'static {
    /// Declared argument types, in order.
    fn signature() -> Vec<TypeInfo>;

    /// Erase this closure.
    #[doc(hidden)]
    fn into_invoker(self) -> Invoker;
}

/// Closures usable as const member functions of `T`.
pub trait IntoConstMethod<T, Args, R>: Send + Sync + 'static {
    /// Declared argument types, in order.
    fn signature() -> Vec<TypeInfo>;

    /// Erase this closure.
    #[doc(hidden)]
    fn into_invoker(self) -> Invoker;
}

/// Closures usable as free functions or constructors.
pub trait IntoFreeFn<Args, R>: Send + Sync + 'static {
    /// Declared argument types, in order.
    fn signature() -> Vec<TypeInfo>;

    /// Erase this closure.
    #[doc(hidden)]
    fn into_invoker(self) -> Invoker;
}

macro_rules! impl_callables {
    ($(($arg:ident, $var:ident, $idx:tt)),*) => {
        impl<T, R, F, $($arg,)*> IntoMethod<T, ($($arg,)*), R> for F
        where
            T: 'static,
            R: 'static,
            $($arg: 'static,)*
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
        {
            fn signature() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn into_invoker(self) -> Invoker {
                Arc::new(move |receiver: Receiver<'_>, args: Vec<BoxedAny>| {
                    let this = receiver.downcast_mut::<T>()?;
                    let mut args = args.into_iter();
                    $(let $var = take_arg::<$arg>(&mut args, $idx)?;)*
                    Ok(Box::new((self)(this, $($var),*)) as BoxedAny)
                })
            }
        }

        impl<T, R, F, $($arg,)*> IntoConstMethod<T, ($($arg,)*), R> for F
        where
            T: 'static,
            R: 'static,
            $($arg: 'static,)*
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
        {
            fn signature() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn into_invoker(self) -> Invoker {
                Arc::new(move |receiver: Receiver<'_>, args: Vec<BoxedAny>| {
                    let this = receiver.downcast_ref::<T>()?;
                    let mut args = args.into_iter();
                    $(let $var = take_arg::<$arg>(&mut args, $idx)?;)*
                    Ok(Box::new((self)(this, $($var),*)) as BoxedAny)
                })
            }
        }

        impl<R, F, $($arg,)*> IntoFreeFn<($($arg,)*), R> for F
        where
            R: 'static,
            $($arg: 'static,)*
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
        {
            fn signature() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$arg>()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn into_invoker(self) -> Invoker {
                Arc::new(move |_receiver: Receiver<'_>, args: Vec<BoxedAny>| {
                    let mut args = args.into_iter();
                    $(let $var = take_arg::<$arg>(&mut args, $idx)?;)*
                    Ok(Box::new((self)($($var),*)) as BoxedAny)
                })
            }
        }
    };
}

impl_callables!();
impl_callables!((A0, a0, 0));
impl_callables!((A0, a0, 0), (A1, a1, 1));
impl_callables!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2));
impl_callables!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2), (A3, a3, 3));
impl_callables!((A0, a0, 0), (A1, a1, 1), (A2, a2, 2), (A3, a3, 3), (A4, a4, 4));
impl_callables!(
    (A0, a0, 0),
    (A1, a1, 1),
    (A2, a2, 2),
    (A3, a3, 3),
    (A4, a4, 4),
    (A5, a5, 5)
);

/// Build a getter from a typed accessor.
pub(crate) fn erase_getter<T, V, G>(getter: G) -> Getter
where
    T: 'static,
    V: 'static,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |instance: Option<&dyn Any>| {
        let this = instance
            .ok_or(MetaError::EmptyValue)?
            .downcast_ref::<T>()
            .ok_or_else(|| MetaError::mismatch(std::any::type_name::<T>(), "<erased instance>"))?;
        Ok(Box::new(getter(this)) as BoxedAny)
    })
}

/// Build a getter for a static constant.
pub(crate) fn erase_constant<V>(value: V) -> Getter
where
    V: Clone + Send + Sync + 'static,
{
    Arc::new(move |_: Option<&dyn Any>| Ok(Box::new(value.clone()) as BoxedAny))
}

/// Build a setter from a typed mutator.
pub(crate) fn erase_setter<T, V, S>(setter: S) -> Setter
where
    T: 'static,
    V: 'static,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Arc::new(move |instance: &mut dyn Any, value: BoxedAny| {
        let this = instance
            .downcast_mut::<T>()
            .ok_or_else(|| MetaError::mismatch(std::any::type_name::<T>(), "<erased instance>"))?;
        let value = value
            .downcast::<V>()
            .map_err(|_| MetaError::mismatch(std::any::type_name::<V>(), "<erased value>"))?;
        setter(this, *value);
        Ok(())
    })
}

/// Build a conversion from a typed function.
pub(crate) fn erase_converter<T, U, C>(convert: C) -> Converter
where
    T: 'static,
    U: 'static,
    C: Fn(&T) -> U + Send + Sync + 'static,
{
    Arc::new(move |value: &dyn Any| {
        let this = value
            .downcast_ref::<T>()
            .ok_or_else(|| MetaError::mismatch(std::any::type_name::<T>(), "<erased value>"))?;
        Ok(Box::new(convert(this)) as BoxedAny)
    })
}

/// Build a destructor hook from a typed function. Values of any other type are ignored.
pub(crate) fn erase_destructor<T, D>(hook: D) -> Destructor
where
    T: 'static,
    D: Fn(&mut T) + Send + Sync + 'static,
{
    Arc::new(move |value: &mut dyn Any| {
        if let Some(this) = value.downcast_mut::<T>() {
            hook(this);
        }
    })
}

/// Upcast `&T` to `&B` through `AsRef`.
pub(crate) fn upcast<T, B>(value: &dyn Any) -> Option<&dyn Any>
where
    T: AsRef<B> + 'static,
    B: 'static,
{
    value
        .downcast_ref::<T>()
        .map(|this| <T as AsRef<B>>::as_ref(this) as &dyn Any)
}

/// Upcast `&mut T` to `&mut B` through `AsMut`.
pub(crate) fn upcast_mut<T, B>(value: &mut dyn Any) -> Option<&mut dyn Any>
where
    T: AsMut<B> + 'static,
    B: 'static,
{
    value
        .downcast_mut::<T>()
        .map(|this| <T as AsMut<B>>::as_mut(this) as &mut dyn Any)
}
