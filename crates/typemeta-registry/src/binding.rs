//! Argument and receiver binding shared by construct, invoke, get and set.
//!
//! Binding runs in two phases. Planning inspects every argument against the
//! declared signature under a registry read lock and decides, per argument,
//! whether it moves in as is or goes through a conversion route. Only when
//! every argument has a plan are the values consumed, after the lock has been
//! released, so a failed binding never leaves arguments half-consumed.

use std::any::Any;

use typemeta_core::{MetaError, MetaResult, TypeInfo};

use crate::any::{MetaAny, MetaHandle, check_live};
use crate::native_fn::BoxedAny;
use crate::registry::{ConvPath, Registry, apply_upcasts, apply_upcasts_mut};

/// How one argument reaches its parameter.
pub(crate) enum ArgPlan {
    /// Same type as declared: hand the storage over.
    Move,
    /// Run a conversion route registered for the argument's type.
    Convert(ConvPath),
}

/// Check every argument against `params` without consuming anything.
pub(crate) fn plan_args(
    registry: &Registry,
    args: &[MetaAny],
    params: &[TypeInfo],
) -> MetaResult<Vec<ArgPlan>> {
    if args.len() != params.len() {
        return Err(MetaError::ArityMismatch {
            expected: params.len(),
            got: args.len(),
        });
    }

    args.iter()
        .zip(params)
        .map(|(arg, param)| {
            let info = arg.info().ok_or(MetaError::EmptyValue)?;
            if info == *param {
                return Ok(ArgPlan::Move);
            }
            registry
                .find_conversion(info.id(), param.id())
                .map(ArgPlan::Convert)
                .ok_or_else(|| MetaError::mismatch(param.name(), info.name()))
        })
        .collect()
}

/// Consume the arguments according to a plan from [`plan_args`].
pub(crate) fn bind_args(args: Vec<MetaAny>, plan: &[ArgPlan]) -> MetaResult<Vec<BoxedAny>> {
    args.into_iter()
        .zip(plan)
        .map(|(arg, plan)| match plan {
            ArgPlan::Move => arg.into_boxed().ok_or(MetaError::EmptyValue),
            ArgPlan::Convert(route) => {
                let (_, value) = arg.view().ok_or(MetaError::EmptyValue)?;
                route.apply(value)
            }
        })
        .collect()
}

/// A receiver borrowed from a handle, or a temporary converted from it.
pub(crate) enum Instance<'h> {
    Borrowed(&'h dyn Any),
    Converted(MetaAny),
}

impl Instance<'_> {
    pub fn as_any(&self) -> Option<&dyn Any> {
        match self {
            Instance::Borrowed(value) => Some(*value),
            Instance::Converted(any) => any.view().map(|(_, value)| value),
        }
    }
}

/// Bind a handle as a shared receiver of type `owner`: exact match, upcast
/// through bases registered in the handle's context, or conversion into a
/// temporary.
pub(crate) fn bind_ref<'h>(handle: &'h MetaHandle<'_>, owner: TypeInfo) -> MetaResult<Instance<'h>> {
    let (info, value) = handle.view().ok_or(MetaError::EmptyValue)?;
    if info == owner {
        return Ok(Instance::Borrowed(value));
    }

    let (path, route) = {
        let reg = handle.context().read();
        check_live(&reg, info, handle.epoch())?;
        match reg.upcast_path(info.id(), owner.id()) {
            Some(path) => (Some(path), None),
            None => (None, reg.find_conversion(info.id(), owner.id())),
        }
    };

    if let Some(path) = path {
        return apply_upcasts(value, &path)
            .map(Instance::Borrowed)
            .ok_or_else(|| MetaError::mismatch(owner.name(), info.name()));
    }

    let route = route.ok_or_else(|| MetaError::mismatch(owner.name(), info.name()))?;
    let converted = route.apply(value)?;
    Ok(Instance::Converted(MetaAny::from_boxed(
        handle.context().clone(),
        owner,
        converted,
    )))
}

/// Bind a handle as an exclusive receiver of type `owner`: exact match or
/// upcast through bases registered in the handle's context.
pub(crate) fn bind_mut<'h>(
    handle: &'h mut MetaHandle<'_>,
    owner: TypeInfo,
) -> MetaResult<&'h mut dyn Any> {
    let ctx = handle.context().clone();
    let epoch = handle.epoch();
    let (info, value) = handle.view_mut()?;
    if info == owner {
        return Ok(value);
    }

    let path = {
        let reg = ctx.read();
        check_live(&reg, info, epoch)?;
        reg.upcast_path(info.id(), owner.id())
    }
    .ok_or_else(|| MetaError::mismatch(owner.name(), info.name()))?;
    apply_upcasts_mut(value, &path).ok_or_else(|| MetaError::mismatch(owner.name(), info.name()))
}
