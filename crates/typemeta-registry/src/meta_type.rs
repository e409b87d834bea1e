//! Type descriptors.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use typemeta_core::{Id, MemberKind, MetaError, MetaResult, TypeInfo};

use crate::any::MetaAny;
use crate::binding::{bind_args, plan_args};
use crate::context::MetaCtx;
use crate::meta_data::MetaData;
use crate::meta_func::MetaFunc;
use crate::native_fn::Receiver;
use crate::registry::TypeNode;

/// The reflected shape of one type within one context.
///
/// A descriptor obtained through resolution is *bound*: it remembers the
/// registration it came from and fails with [`MetaError::InvalidType`] once
/// that registration is reset. Descriptors derived from members (a data
/// member's type, a function's argument or return type, a base) are *lazy*:
/// they look the type up in the owning context each time they are used, so
/// they report whatever that context holds for the type at that moment.
#[derive(Clone)]
pub struct MetaType {
    ctx: MetaCtx,
    info: TypeInfo,
    epoch: Option<u64>,
}

impl MetaType {
    pub(crate) fn bound(ctx: MetaCtx, info: TypeInfo, epoch: u64) -> Self {
        Self {
            ctx,
            info,
            epoch: Some(epoch),
        }
    }

    pub(crate) fn lazy(ctx: MetaCtx, info: TypeInfo) -> Self {
        Self {
            ctx,
            info,
            epoch: None,
        }
    }

    /// Run `f` against the live registry node, or fail if it is gone.
    fn with_node<R>(&self, f: impl FnOnce(&TypeNode) -> R) -> MetaResult<R> {
        let reg = self.ctx.read();
        reg.get_live(self.info.id(), self.epoch)
            .map(f)
            .ok_or(MetaError::InvalidType {
                type_name: self.info.name(),
            })
    }

    /// Identity of the described type. Available even when the type is not
    /// registered in the context.
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn context(&self) -> &MetaCtx {
        &self.ctx
    }

    /// Whether the context still holds the registration this descriptor refers to.
    pub fn is_valid(&self) -> bool {
        self.with_node(|_| ()).is_ok()
    }

    /// The hashed name given to the type in this context, if any.
    pub fn id(&self) -> Option<Id> {
        self.with_node(|node| node.id).ok().flatten()
    }

    /// Registered bases, in registration order.
    pub fn base(&self) -> Vec<(TypeId, MetaType)> {
        self.with_node(|node| {
            node.bases
                .iter()
                .map(|base| (base.info.id(), MetaType::lazy(self.ctx.clone(), base.info)))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Look up a data member on this type or, failing that, on its bases.
    pub fn data(&self, id: Id) -> Option<MetaData> {
        let reg = self.ctx.read();
        reg.get_live(self.info.id(), self.epoch)?;
        let owner = reg.find_in_hierarchy(self.info.id(), |node| node.data.contains_key(&id))?;
        Some(MetaData::new(self.ctx.clone(), owner.info, owner.epoch, id))
    }

    /// Data members registered directly on this type.
    pub fn data_all(&self) -> Vec<MetaData> {
        self.with_node(|node| {
            node.data
                .values()
                .map(|data| MetaData::new(self.ctx.clone(), node.info, node.epoch, data.id))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Look up a function on this type or, failing that, on its bases.
    pub fn func(&self, id: Id) -> Option<MetaFunc> {
        let reg = self.ctx.read();
        reg.get_live(self.info.id(), self.epoch)?;
        let owner = reg.find_in_hierarchy(self.info.id(), |node| node.funcs.contains_key(&id))?;
        Some(MetaFunc::new(self.ctx.clone(), owner.info, owner.epoch, id))
    }

    /// Functions registered directly on this type.
    pub fn func_all(&self) -> Vec<MetaFunc> {
        self.with_node(|node| {
            node.funcs
                .values()
                .map(|func| MetaFunc::new(self.ctx.clone(), node.info, node.epoch, func.id))
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn ctor_count(&self) -> usize {
        self.with_node(|node| node.ctors.len()).unwrap_or(0)
    }

    pub fn has_dtor(&self) -> bool {
        self.with_node(|node| node.dtor.is_some()).unwrap_or(false)
    }

    /// Whether a value of this type can be viewed as `other`: same type, or
    /// `other` is reachable through bases registered in this context.
    pub fn can_cast(&self, other: &MetaType) -> bool {
        self.info == other.info
            || self
                .ctx
                .read()
                .upcast_path(self.info.id(), other.info.id())
                .is_some()
    }

    /// Whether a value of this type can be cast or converted to `other` in this context.
    pub fn can_convert(&self, other: &MetaType) -> bool {
        self.can_cast(other)
            || self
                .ctx
                .read()
                .find_conversion(self.info.id(), other.info.id())
                .is_some()
    }

    /// Construct a value with the first registered constructor that accepts `args`.
    ///
    /// Returns `None` if no constructor matches. See [`try_construct`](Self::try_construct).
    pub fn construct(&self, args: Vec<MetaAny>) -> Option<MetaAny> {
        self.try_construct(args).ok()
    }

    /// Construct a value, reporting why no constructor matched.
    ///
    /// Constructors are tried in registration order. Arguments bind by exact
    /// type or through conversion routes registered in this context. The new
    /// value is bound to this context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn try_construct(&self, args: Vec<MetaAny>) -> MetaResult<MetaAny> {
        let ctors = self.with_node(|node| node.ctors.clone())?;

        let mut failure = None;
        for ctor in &ctors {
            let plan = {
                let reg = self.ctx.read();
                plan_args(&reg, &args, &ctor.args)
            };
            match plan {
                Ok(plan) => {
                    let bound = bind_args(args, &plan)?;
                    let value = (ctor.invoke)(Receiver::None, bound)?;
                    return Ok(MetaAny::from_boxed(self.ctx.clone(), self.info, value));
                }
                Err(err) => {
                    let replace = match (&failure, &err) {
                        (None, _) => true,
                        (Some(MetaError::ArityMismatch { .. }), MetaError::TypeMismatch { .. }) => {
                            true
                        }
                        _ => false,
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }

        let err = failure.unwrap_or(MetaError::NotFound {
            kind: MemberKind::Ctor,
            id: self.id().unwrap_or_default(),
        });
        tracing::trace!(
            target: "typemeta::registry",
            type_name = self.info.name(),
            args = args.len(),
            error = %err,
            "no constructor matched"
        );
        Err(err)
    }
}

impl PartialEq for MetaType {
    fn eq(&self, other: &Self) -> bool {
        self.ctx == other.ctx && self.info == other.info
    }
}

impl Eq for MetaType {}

impl Hash for MetaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.hash(state);
    }
}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaType")
            .field("info", &self.info)
            .field("id", &self.id())
            .field("valid", &self.is_valid())
            .finish()
    }
}
