//! Per-instantiation registry of live module instances.
//!
//! A guest module is instantiated against an [`InstantiationContext`], which
//! owns one [`InstanceRegistry`]. Every call the guest makes into a host
//! function carries a [`CallContext`] sharing that registry; the bound
//! function looks up its receiver there by module type. Calls only read the
//! registry; it changes on instantiation and close.

use std::any::{type_name, Any, TypeId};
use std::collections::hash_map::{Entry as MapEntry, HashMap};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use hostabi_types::Trap;
use tracing::{debug, warn};

use crate::error::{Error, HostResult};
use crate::module::{Configure, HostModule, Module};

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Entry {
    module: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
    closer: Arc<dyn Module>,
    closed: Arc<AtomicBool>,
}

impl Entry {
    fn new<M: Module>(instance: Arc<M>, closed: Arc<AtomicBool>) -> Self {
        Self {
            module: type_name::<M>(),
            instance: instance.clone(),
            closer: instance,
            closed,
        }
    }

    /// Closes the instance unless it was closed already.
    fn close(&self) -> HostResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(module = self.module, "closing module instance");
        self.closer.close().map_err(|e| Error::Close {
            module: self.module,
            message: e.to_string(),
        })
    }
}

#[derive(Default)]
struct Entries {
    instances: HashMap<TypeId, Entry>,
    closed: bool,
}

/// Live module instances keyed by module type.
#[derive(Default)]
pub struct InstanceRegistry {
    entries: RwLock<Entries>,
}

impl InstanceRegistry {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, entry: Entry, key: TypeId) -> HostResult<()> {
        let mut entries = self.write();
        if entries.closed {
            return Err(Error::Closed);
        }
        match entries.instances.entry(key) {
            MapEntry::Occupied(_) => Err(Error::AlreadyInstantiated {
                module: entry.module,
            }),
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Removes the entry of `M` if it still refers to `instance`.
    fn remove<M: Module>(&self, instance: &Arc<M>) -> Option<Entry> {
        let mut entries = self.write();
        let key = TypeId::of::<M>();
        let current = entries.instances.get(&key)?;
        let same = current
            .instance
            .clone()
            .downcast::<M>()
            .is_ok_and(|m| Arc::ptr_eq(&m, instance));
        if same {
            entries.instances.remove(&key)
        } else {
            None
        }
    }

    fn get<M: Module>(&self) -> Option<Arc<M>> {
        let entries = self.read();
        let entry = entries.instances.get(&TypeId::of::<M>())?;
        entry.instance.clone().downcast::<M>().ok()
    }

    fn close(&self) -> Vec<Entry> {
        let mut entries = self.write();
        entries.closed = true;
        entries.instances.drain().map(|(_, e)| e).collect()
    }

    fn snapshot(&self) -> HashMap<TypeId, Entry> {
        self.read().instances.clone()
    }

    pub fn len(&self) -> usize {
        self.read().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.read();
        let mut modules: Vec<_> = entries.instances.values().map(|e| e.module).collect();
        modules.sort_unstable();
        f.debug_struct("InstanceRegistry")
            .field("modules", &modules)
            .field("closed", &entries.closed)
            .finish()
    }
}

// ── Call context ─────────────────────────────────────────────────────────────

/// The scope of a guest call: resolves module types to their live instance.
#[derive(Clone, Default, Debug)]
pub struct CallContext {
    registry: Arc<InstanceRegistry>,
}

impl CallContext {
    /// A context with no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live instance of `M`, if any.
    pub fn instance<M: Module>(&self) -> Option<Arc<M>> {
        self.registry.get::<M>()
    }

    /// Receiver of a call bound to module type `M`.
    pub fn receiver<M: Module>(&self) -> Result<Arc<M>, Trap> {
        self.instance::<M>().ok_or(Trap::UnboundModule {
            module: type_name::<M>(),
        })
    }

    /// Derives a context holding every instance of this one plus `instance`,
    /// which replaces any instance of the same type.
    ///
    /// The derived context owns its own registry: closing it, or dropping it,
    /// leaves this one untouched. `instance` is never closed by this context.
    pub fn with_instance<M: Module>(&self, instance: M) -> (CallContext, Arc<M>) {
        let instance = Arc::new(instance);
        let entry = Entry::new(instance.clone(), Arc::new(AtomicBool::new(false)));
        (self.layered(entry, TypeId::of::<M>()), instance)
    }

    /// Like [`with_instance`](Self::with_instance), but creates the instance
    /// from `host` and `options`.
    ///
    /// The returned [`Instance`] closes the new instance and unbinds it from
    /// the derived context. Inherited instances are never closed through it.
    pub fn with_module<H: HostModule>(
        &self,
        host: &H,
        options: &[Box<dyn Configure<H::Instance>>],
    ) -> HostResult<(CallContext, Instance<H::Instance>)> {
        let instance = create(host, options)?;
        let entry = Entry::new(instance.clone(), Arc::new(AtomicBool::new(false)));
        let context = self.layered(entry.clone(), TypeId::of::<H::Instance>());
        debug!(module = host.name(), "instantiated host module in derived context");
        let instance = Instance {
            instance,
            registry: Arc::downgrade(&context.registry),
            entry,
        };
        Ok((context, instance))
    }

    fn layered(&self, entry: Entry, key: TypeId) -> CallContext {
        let mut instances = self.registry.snapshot();
        instances.insert(key, entry);
        let registry = InstanceRegistry {
            entries: RwLock::new(Entries {
                instances,
                closed: false,
            }),
        };
        CallContext {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }
}

impl AsRef<CallContext> for CallContext {
    fn as_ref(&self) -> &CallContext {
        self
    }
}

// ── Instantiation context ────────────────────────────────────────────────────

fn create<H: HostModule>(
    host: &H,
    options: &[Box<dyn Configure<H::Instance>>],
) -> HostResult<Arc<H::Instance>> {
    host.instantiate(options)
        .map(Arc::new)
        .map_err(|e| Error::Instantiation {
            module: host.name().to_owned(),
            message: e.to_string(),
        })
}

/// Owns the instances created for one guest module load.
///
/// Closing the context closes every instance still registered in it and
/// makes it reject further instantiation.
#[derive(Debug, Default)]
pub struct InstantiationContext {
    registry: Arc<InstanceRegistry>,
}

impl InstantiationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context under which guest calls must run.
    pub fn call_context(&self) -> CallContext {
        CallContext {
            registry: Arc::clone(&self.registry),
        }
    }

    /// Creates an instance of `host` and registers it under its type.
    ///
    /// At most one live instance per module type is allowed in a context;
    /// instantiating a second one fails with
    /// [`Error::AlreadyInstantiated`].
    pub fn instantiate<H: HostModule>(
        &self,
        host: &H,
        options: &[Box<dyn Configure<H::Instance>>],
    ) -> HostResult<Instance<H::Instance>> {
        if self.registry.is_closed() {
            return Err(Error::Closed);
        }
        let instance = create(host, options)?;
        let closed = Arc::new(AtomicBool::new(false));
        let entry = Entry::new(instance.clone(), closed.clone());

        if let Err(err) = self.registry.insert(entry.clone(), TypeId::of::<H::Instance>()) {
            // Never registered: close it right away.
            if let Err(close) = entry.close() {
                warn!(module = entry.module, error = %close, "rejected module instance failed to close");
            }
            return Err(err);
        }
        debug!(module = host.name(), "instantiated host module");

        Ok(Instance {
            instance,
            registry: Arc::downgrade(&self.registry),
            entry,
        })
    }

    /// Closes every registered instance.
    ///
    /// All instances are closed even when some fail; the first failure is
    /// returned.
    pub fn close(&self) -> HostResult<()> {
        let mut first = None;
        for entry in self.registry.close() {
            if let Err(err) = entry.close() {
                warn!(module = entry.module, error = %err, "module instance failed to close");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }
}

/// Handle to an instance registered in an [`InstantiationContext`].
pub struct Instance<M: Module> {
    instance: Arc<M>,
    registry: Weak<InstanceRegistry>,
    entry: Entry,
}

impl<M: Module> Instance<M> {
    pub fn get(&self) -> &Arc<M> {
        &self.instance
    }

    /// Unregisters the instance and closes it.
    ///
    /// Closing an instance whose context was already closed does nothing.
    pub fn close(self) -> HostResult<()> {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.instance);
        }
        self.entry.close()
    }
}

impl<M: Module> Deref for Instance<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.instance
    }
}

impl<M: Module> fmt::Debug for Instance<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.entry.module)
            .field("closed", &self.entry.closed.load(Ordering::Acquire))
            .finish()
    }
}
