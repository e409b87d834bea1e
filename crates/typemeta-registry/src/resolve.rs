//! Type resolution within a context.
//!
//! Resolution never crosses contexts: a type registered only in the default
//! context is not found through an explicit one, and vice versa.

use typemeta_core::{Id, TypeInfo};

use crate::context::MetaCtx;
use crate::meta_type::MetaType;

impl MetaCtx {
    /// Descriptor for `T`, if `T` is registered in this context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve<T: ?Sized + 'static>(&self) -> Option<MetaType> {
        self.resolve_info(&TypeInfo::of::<T>())
    }

    /// Descriptor for the type identified by `info`.
    pub fn resolve_info(&self, info: &TypeInfo) -> Option<MetaType> {
        let epoch = self.read().get(info.id())?.epoch;
        Some(MetaType::bound(self.clone(), *info, epoch))
    }

    /// Descriptor for the type named `id` in this context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve_id(&self, id: Id) -> Option<MetaType> {
        let (info, epoch) = {
            let reg = self.read();
            let node = reg.get_by_name(id)?;
            (node.info, node.epoch)
        };
        Some(MetaType::bound(self.clone(), info, epoch))
    }

    /// Snapshot of every type registered in this context.
    pub fn resolve_all(&self) -> Vec<MetaType> {
        self.read()
            .types()
            .map(|node| MetaType::bound(self.clone(), node.info, node.epoch))
            .collect()
    }
}
