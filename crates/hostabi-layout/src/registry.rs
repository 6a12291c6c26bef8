//! Memoized layouts keyed by record type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::layout::Layout;
use crate::record::Record;

type AnyLayout = Arc<dyn Any + Send + Sync>;

/// Cache of derived layouts, one per record type.
///
/// Lookups take a shared lock. A miss derives the layout without holding
/// any lock and installs it unless another thread got there first, in which
/// case the installed layout wins and the fresh one is dropped.
#[derive(Default)]
pub struct LayoutRegistry {
    layouts: RwLock<HashMap<TypeId, AnyLayout>>,
}

static GLOBAL: OnceLock<LayoutRegistry> = OnceLock::new();

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the record object codecs.
    pub fn global() -> &'static LayoutRegistry {
        GLOBAL.get_or_init(LayoutRegistry::new)
    }

    /// Returns the layout of `T`, deriving it on first use.
    pub fn layout<T: Record>(&self) -> Arc<Layout<T>> {
        if let Some(layout) = self.cached::<T>() {
            return layout;
        }

        let layout = Arc::new(Layout::<T>::derive());
        debug!(
            record = type_name::<T>(),
            size = layout.size(),
            fields = layout.fields().len(),
            "derived record layout"
        );

        let installed = {
            let mut layouts = self.layouts.write().unwrap_or_else(PoisonError::into_inner);
            layouts
                .entry(TypeId::of::<T>())
                .or_insert_with(|| layout.clone() as AnyLayout)
                .clone()
        };
        installed.downcast::<Layout<T>>().unwrap_or(layout)
    }

    fn cached<T: Record>(&self) -> Option<Arc<Layout<T>>> {
        let layouts = self.layouts.read().unwrap_or_else(PoisonError::into_inner);
        layouts.get(&TypeId::of::<T>())?.clone().downcast().ok()
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.layouts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached layout. Layouts already handed out stay valid.
    pub fn clear(&self) {
        self.layouts.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
