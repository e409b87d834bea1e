//! Data member descriptors.

use std::fmt;

use typemeta_core::{Id, MemberKind, MetaError, MetaResult, TypeInfo};

use crate::any::{MetaAny, MetaHandle};
use crate::binding::{bind_args, bind_mut, bind_ref, plan_args};
use crate::context::MetaCtx;
use crate::meta_type::MetaType;
use crate::registry::{DataNode, MetaTraits};

/// A data member registered on a type in one context.
#[derive(Clone)]
pub struct MetaData {
    ctx: MetaCtx,
    owner: TypeInfo,
    epoch: u64,
    id: Id,
}

impl MetaData {
    pub(crate) fn new(ctx: MetaCtx, owner: TypeInfo, epoch: u64, id: Id) -> Self {
        Self {
            ctx,
            owner,
            epoch,
            id,
        }
    }

    fn node(&self) -> MetaResult<DataNode> {
        let reg = self.ctx.read();
        let owner = reg
            .get_live(self.owner.id(), Some(self.epoch))
            .ok_or(MetaError::InvalidType {
                type_name: self.owner.name(),
            })?;
        owner.data.get(&self.id).cloned().ok_or(MetaError::NotFound {
            kind: MemberKind::Data,
            id: self.id,
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// The type that declares this member.
    pub fn owner(&self) -> MetaType {
        MetaType::bound(self.ctx.clone(), self.owner, self.epoch)
    }

    /// The member's value type as currently registered, resolved against the
    /// owning context. `None` once the descriptor is stale.
    pub fn type_(&self) -> Option<MetaType> {
        let node = self.node().ok()?;
        Some(MetaType::lazy(self.ctx.clone(), node.value_type))
    }

    /// Number of arguments the setter takes: 1 if writable, otherwise 0.
    pub fn arity(&self) -> usize {
        usize::from(!self.is_const())
    }

    /// Setter argument type, resolved against the owning context.
    pub fn arg(&self, index: usize) -> Option<MetaType> {
        (index < self.arity()).then(|| self.type_()).flatten()
    }

    /// Read-only members (no setter) are const.
    pub fn is_const(&self) -> bool {
        self.node()
            .map(|node| node.set.is_none() || node.traits.contains(MetaTraits::CONST))
            .unwrap_or(true)
    }

    /// Qualifiers as registered. Empty once the descriptor is stale.
    pub fn traits(&self) -> MetaTraits {
        self.node().map(|node| node.traits).unwrap_or_default()
    }

    pub fn is_static(&self) -> bool {
        self.node()
            .map(|node| node.traits.contains(MetaTraits::STATIC))
            .unwrap_or(false)
    }

    /// Read the member from the referent of `handle`.
    ///
    /// Static members ignore the handle. The result is bound to the handle's
    /// context, or to the owning context when the handle is empty.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn get(&self, handle: MetaHandle<'_>) -> MetaResult<MetaAny> {
        let node = self.node()?;
        let value = if node.traits.contains(MetaTraits::STATIC) {
            (node.get)(None)?
        } else {
            let instance = bind_ref(&handle, self.owner)?;
            (node.get)(instance.as_any())?
        };

        let ctx = if handle.is_empty() {
            self.ctx.clone()
        } else {
            handle.context().clone()
        };
        Ok(MetaAny::from_boxed(ctx, node.value_type, value))
    }

    /// Write `value` into the referent of `handle`. Returns `false` without
    /// mutating anything if the write is not possible.
    pub fn set(&self, handle: MetaHandle<'_>, value: MetaAny) -> bool {
        self.try_set(handle, value).is_ok()
    }

    /// Write `value` into the referent of `handle`, reporting why it failed.
    ///
    /// `value` binds by exact type or through a conversion route registered in
    /// the handle's context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn try_set(&self, mut handle: MetaHandle<'_>, value: MetaAny) -> MetaResult<()> {
        let node = self.node()?;
        let setter = match &node.set {
            Some(setter) if !node.traits.contains(MetaTraits::CONST) => setter.clone(),
            _ => {
                return Err(MetaError::ConstViolation {
                    member: "data member",
                });
            }
        };

        let args = vec![value];
        let plan = {
            let reg = handle.context().read();
            plan_args(&reg, &args, std::slice::from_ref(&node.value_type))?
        };
        let instance = bind_mut(&mut handle, self.owner)?;
        let value = bind_args(args, &plan)?
            .pop()
            .ok_or(MetaError::EmptyValue)?;
        setter(instance, value)
    }
}

impl PartialEq for MetaData {
    fn eq(&self, other: &Self) -> bool {
        self.ctx == other.ctx && self.owner == other.owner && self.id == other.id
    }
}

impl Eq for MetaData {}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaData")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("type", &self.node().ok().map(|node| node.value_type))
            .finish()
    }
}
