//! Per-context descriptor storage.
//!
//! This module provides [`Registry`], the table behind every [`MetaCtx`]. It
//! owns one [`TypeNode`] per registered compile-time type and indexes them by
//! type identity and by hashed name.
//!
//! # Storage Model
//!
//! - **Types**: one node per `TypeId`, holding everything registered for that
//!   type in this context (name, bases, data, functions, constructors,
//!   destructor, conversions).
//! - **Names**: a secondary `Id -> TypeId` index, rebuilt whenever a type is
//!   (re)named or removed.
//! - **Epochs**: every node is stamped with a fresh epoch from a per-registry
//!   counter when it is created. Descriptors remember the epoch they were
//!   obtained under, so a node that was removed and registered again is never
//!   mistaken for the old one.
//!
//! # Thread Safety
//!
//! `Registry` itself is not synchronised. [`MetaCtx`] wraps it in a
//! `parking_lot::RwLock`; callers never hold the guard while running user
//! code, so every erased callable is cloned out before it is invoked.
//!
//! [`MetaCtx`]: crate::MetaCtx

use std::any::{Any, TypeId};

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use typemeta_core::{Id, MetaError, MetaResult, TypeInfo};

use crate::native_fn::{
    BoxedAny, Converter, Destructor, Getter, Invoker, Setter, UpCast, UpCastMut,
};

bitflags! {
    /// Qualifiers attached to data members and functions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MetaTraits: u8 {
        /// Cannot mutate its owner (read-only data, `&self` functions).
        const CONST = 1 << 0;
        /// Does not need an instance (constants, free functions).
        const STATIC = 1 << 1;
    }
}

/// A registered "is-a" link to a base type.
#[derive(Clone)]
pub(crate) struct BaseNode {
    pub info: TypeInfo,
    pub cast: UpCast,
    pub cast_mut: UpCastMut,
}

/// A registered implicit conversion to `target`.
#[derive(Clone)]
pub(crate) struct ConvNode {
    pub target: TypeInfo,
    pub convert: Converter,
}

#[derive(Clone)]
pub(crate) struct CtorNode {
    pub args: Vec<TypeInfo>,
    pub invoke: Invoker,
}

#[derive(Clone)]
pub(crate) struct DataNode {
    pub id: Id,
    pub value_type: TypeInfo,
    pub traits: MetaTraits,
    pub get: Getter,
    /// `None` for read-only members.
    pub set: Option<Setter>,
}

#[derive(Clone)]
pub(crate) struct FuncNode {
    pub id: Id,
    pub args: Vec<TypeInfo>,
    pub ret: TypeInfo,
    pub traits: MetaTraits,
    pub invoke: Invoker,
}

/// Everything one context knows about one type.
#[derive(Clone)]
pub(crate) struct TypeNode {
    pub info: TypeInfo,
    pub id: Option<Id>,
    pub epoch: u64,
    /// Registration order is preserved; re-registering a base replaces it in place.
    pub bases: Vec<BaseNode>,
    pub data: FxHashMap<Id, DataNode>,
    pub funcs: FxHashMap<Id, FuncNode>,
    /// Tried in registration order.
    pub ctors: Vec<CtorNode>,
    pub dtor: Option<Destructor>,
    pub convs: FxHashMap<TypeId, ConvNode>,
}

impl TypeNode {
    fn new(info: TypeInfo, epoch: u64) -> Self {
        Self {
            info,
            id: None,
            epoch,
            bases: Vec::new(),
            data: FxHashMap::default(),
            funcs: FxHashMap::default(),
            ctors: Vec::new(),
            dtor: None,
            convs: FxHashMap::default(),
        }
    }
}

/// A conversion found through [`Registry::find_conversion`]: upcast along
/// `casts`, then run `convert`.
#[derive(Clone)]
pub(crate) struct ConvPath {
    pub casts: Vec<UpCast>,
    pub target: TypeInfo,
    pub convert: Converter,
}

impl ConvPath {
    /// Run this conversion against a value of the route's source type.
    pub fn apply(&self, value: &dyn Any) -> MetaResult<BoxedAny> {
        let source = self
            .casts
            .iter()
            .try_fold(value, |current, cast| cast(current))
            .ok_or_else(|| MetaError::mismatch(self.target.name(), "<unconvertible source>"))?;
        (self.convert)(source)
    }
}

/// Walk an upcast path over a shared reference.
pub(crate) fn apply_upcasts<'v>(value: &'v dyn Any, path: &[BaseNode]) -> Option<&'v dyn Any> {
    path.iter().try_fold(value, |current, base| (base.cast)(current))
}

/// Walk an upcast path over an exclusive reference.
pub(crate) fn apply_upcasts_mut<'v>(
    value: &'v mut dyn Any,
    path: &[BaseNode],
) -> Option<&'v mut dyn Any> {
    path.iter()
        .try_fold(value, |current, base| (base.cast_mut)(current))
}

/// Descriptor table of one context.
#[derive(Default)]
pub(crate) struct Registry {
    types: FxHashMap<TypeId, TypeNode>,
    names: FxHashMap<Id, TypeId>,
    next_epoch: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.types.get(&id)
    }

    /// Look up a node, rejecting it if it was created under a different epoch.
    pub fn get_live(&self, id: TypeId, epoch: Option<u64>) -> Option<&TypeNode> {
        self.types
            .get(&id)
            .filter(|node| epoch.is_none_or(|epoch| node.epoch == epoch))
    }

    pub fn get_by_name(&self, id: Id) -> Option<&TypeNode> {
        self.names.get(&id).and_then(|type_id| self.types.get(type_id))
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeNode> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Get the node for `info`, creating an empty one under a fresh epoch.
    pub fn get_or_insert(&mut self, info: TypeInfo) -> &mut TypeNode {
        let next_epoch = &mut self.next_epoch;
        self.types.entry(info.id()).or_insert_with(|| {
            *next_epoch += 1;
            tracing::debug!(
                target: "typemeta::registry",
                type_name = info.name(),
                epoch = *next_epoch,
                "type created"
            );
            TypeNode::new(info, *next_epoch)
        })
    }

    /// Bind `id` to `type_id`, replacing any previous name of that type.
    ///
    /// If `id` already names a different type, the index is taken over and the
    /// other type keeps its (now unreachable) name.
    pub fn set_name(&mut self, type_id: TypeId, id: Id) {
        let Some(node) = self.types.get_mut(&type_id) else {
            return;
        };

        if let Some(old) = node.id.replace(id)
            && old != id
            && self.names.get(&old) == Some(&type_id)
        {
            self.names.remove(&old);
        }

        if let Some(previous) = self.names.insert(id, type_id)
            && previous != type_id
        {
            let stolen_from = self.types.get(&previous).map(|node| node.info.name());
            tracing::warn!(
                target: "typemeta::registry",
                %id,
                stolen_from,
                "type identifier already bound in this context, rebinding"
            );
        }

        tracing::debug!(target: "typemeta::registry", %id, "type named");
    }

    /// Remove the node for `type_id` along with its name.
    pub fn remove(&mut self, type_id: TypeId) -> Option<TypeNode> {
        let node = self.types.remove(&type_id)?;
        if let Some(id) = node.id
            && self.names.get(&id) == Some(&type_id)
        {
            self.names.remove(&id);
        }
        Some(node)
    }

    pub fn remove_by_name(&mut self, id: Id) -> Option<TypeNode> {
        let type_id = *self.names.get(&id)?;
        self.remove(type_id)
    }

    /// Remove every node, handing them back so they can be dropped outside any lock.
    ///
    /// The epoch counter survives, so nodes created afterwards never reuse an
    /// epoch handed out before.
    pub fn drain(&mut self) -> Vec<TypeNode> {
        self.names.clear();
        self.types.drain().map(|(_, node)| node).collect()
    }

    // ==========================================================================
    // Graph queries
    // ==========================================================================

    /// Find the chain of base links from `from` up to `to`.
    ///
    /// Returns `Some(vec![])` when the types are the same. Intermediate types
    /// must be registered in this registry for their own bases to be followed.
    pub fn upcast_path(&self, from: TypeId, to: TypeId) -> Option<Vec<BaseNode>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut visited = FxHashSet::default();
        let mut path = Vec::new();
        self.upcast_dfs(from, to, &mut visited, &mut path)
            .then_some(path)
    }

    fn upcast_dfs(
        &self,
        current: TypeId,
        target: TypeId,
        visited: &mut FxHashSet<TypeId>,
        path: &mut Vec<BaseNode>,
    ) -> bool {
        if !visited.insert(current) {
            return false;
        }
        let Some(node) = self.types.get(&current) else {
            return false;
        };

        for base in &node.bases {
            path.push(base.clone());
            if base.info.id() == target || self.upcast_dfs(base.info.id(), target, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Find the first node, starting at `from` and then through its registered
    /// bases depth first, that satisfies `pred`.
    pub fn find_in_hierarchy(
        &self,
        from: TypeId,
        pred: impl Fn(&TypeNode) -> bool,
    ) -> Option<&TypeNode> {
        let mut visited = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = self.types.get(&current) else {
                continue;
            };
            if pred(node) {
                return Some(node);
            }
            stack.extend(node.bases.iter().rev().map(|base| base.info.id()));
        }
        None
    }

    /// Find a conversion route from `from` to `to`: the type's own routes
    /// first, then those of its bases, depth first in registration order.
    pub fn find_conversion(&self, from: TypeId, to: TypeId) -> Option<ConvPath> {
        let mut visited = FxHashSet::default();
        self.conversion_dfs(from, to, &mut visited)
    }

    fn conversion_dfs(
        &self,
        current: TypeId,
        target: TypeId,
        visited: &mut FxHashSet<TypeId>,
    ) -> Option<ConvPath> {
        if !visited.insert(current) {
            return None;
        }
        let node = self.types.get(&current)?;

        if let Some(conv) = node.convs.get(&target) {
            return Some(ConvPath {
                casts: Vec::new(),
                target: conv.target,
                convert: conv.convert.clone(),
            });
        }

        node.bases.iter().find_map(|base| {
            let mut route = self.conversion_dfs(base.info.id(), target, visited)?;
            route.casts.insert(0, base.cast);
            Some(route)
        })
    }
}
