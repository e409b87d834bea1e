//! Function descriptors.

use std::fmt;

use typemeta_core::{Id, MemberKind, MetaError, MetaResult, TypeInfo};

use crate::any::{MetaAny, MetaHandle};
use crate::binding::{bind_args, bind_mut, bind_ref, plan_args};
use crate::context::MetaCtx;
use crate::meta_type::MetaType;
use crate::native_fn::Receiver;
use crate::registry::{FuncNode, MetaTraits};

/// A member or free function registered on a type in one context.
#[derive(Clone)]
pub struct MetaFunc {
    ctx: MetaCtx,
    owner: TypeInfo,
    epoch: u64,
    id: Id,
}

impl MetaFunc {
    pub(crate) fn new(ctx: MetaCtx, owner: TypeInfo, epoch: u64, id: Id) -> Self {
        Self {
            ctx,
            owner,
            epoch,
            id,
        }
    }

    fn node(&self) -> MetaResult<FuncNode> {
        let reg = self.ctx.read();
        let owner = reg
            .get_live(self.owner.id(), Some(self.epoch))
            .ok_or(MetaError::InvalidType {
                type_name: self.owner.name(),
            })?;
        owner.funcs.get(&self.id).cloned().ok_or(MetaError::NotFound {
            kind: MemberKind::Func,
            id: self.id,
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn owner(&self) -> MetaType {
        MetaType::bound(self.ctx.clone(), self.owner, self.epoch)
    }

    /// Number of declared arguments, not counting the receiver.
    pub fn arity(&self) -> usize {
        self.node().map(|node| node.args.len()).unwrap_or(0)
    }

    /// Type of argument `index`, resolved against the owning context.
    pub fn arg(&self, index: usize) -> Option<MetaType> {
        let node = self.node().ok()?;
        let info = *node.args.get(index)?;
        Some(MetaType::lazy(self.ctx.clone(), info))
    }

    /// Return type of the function as currently registered, resolved
    /// against the owning context. `None` once the descriptor is stale.
    pub fn ret(&self) -> Option<MetaType> {
        let node = self.node().ok()?;
        Some(MetaType::lazy(self.ctx.clone(), node.ret))
    }

    /// Const functions take the receiver by shared reference.
    pub fn is_const(&self) -> bool {
        self.node()
            .map(|node| node.traits.contains(MetaTraits::CONST))
            .unwrap_or(false)
    }

    /// Qualifiers as registered. Empty once the descriptor is stale.
    pub fn traits(&self) -> MetaTraits {
        self.node().map(|node| node.traits).unwrap_or_default()
    }

    /// Static functions take no receiver.
    pub fn is_static(&self) -> bool {
        self.node()
            .map(|node| node.traits.contains(MetaTraits::STATIC))
            .unwrap_or(false)
    }

    /// Call the function on the referent of `handle`.
    ///
    /// Arguments bind by exact type or through conversion routes registered
    /// in the handle's context. Non-const functions need a mutable handle.
    /// The result is bound to the handle's context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(&self, mut handle: MetaHandle<'_>, args: Vec<MetaAny>) -> MetaResult<MetaAny> {
        let node = self.node()?;
        let ctx = handle.context().clone();

        let plan = {
            let reg = ctx.read();
            plan_args(&reg, &args, &node.args)
        }
        .inspect_err(|err| {
            tracing::trace!(
                target: "typemeta::registry",
                func = %self.id,
                owner = self.owner.name(),
                error = %err,
                "argument binding failed"
            );
        })?;

        let result = if node.traits.contains(MetaTraits::STATIC) {
            let bound = bind_args(args, &plan)?;
            (node.invoke)(Receiver::None, bound)?
        } else if node.traits.contains(MetaTraits::CONST) {
            let instance = bind_ref(&handle, self.owner)?;
            let receiver = instance.as_any().ok_or(MetaError::EmptyValue)?;
            let bound = bind_args(args, &plan)?;
            (node.invoke)(Receiver::Ref(receiver), bound)?
        } else {
            let instance = bind_mut(&mut handle, self.owner)?;
            let bound = bind_args(args, &plan)?;
            (node.invoke)(Receiver::Mut(instance), bound)?
        };

        Ok(MetaAny::from_boxed(ctx, node.ret, result))
    }
}

impl PartialEq for MetaFunc {
    fn eq(&self, other: &Self) -> bool {
        self.ctx == other.ctx && self.owner == other.owner && self.id == other.id
    }
}

impl Eq for MetaFunc {}

impl fmt::Debug for MetaFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaFunc")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("ret", &self.node().ok().map(|node| node.ret))
            .finish()
    }
}
