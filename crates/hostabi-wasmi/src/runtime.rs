//! A ready-to-use guest runtime over `wasmi`.

use hostabi::{build, CallContext, Decorator, HostModule, InstantiationContext, ModuleDefinition};
use hostabi_types::{Memory, MemoryView};
use tracing::debug;
use wasmi::{Engine, Linker, Store, WasmParams, WasmResults};

use crate::error::{Error, Result};
use crate::link::define;

/// An engine plus the host modules guests link against.
///
/// Host modules are registered once; every guest instantiated afterwards
/// gets its own [`CallContext`] as store data, so guests share definitions
/// but never instances.
pub struct Runtime {
    engine: Engine,
    linker: Linker<CallContext>,
}

impl Runtime {
    /// Runtime over `engine`, which carries the interpreter configuration.
    pub fn new(engine: &Engine) -> Self {
        Self {
            engine: engine.clone(),
            linker: Linker::new(engine),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Builds `host` and makes its functions importable.
    pub fn register<H: HostModule>(
        &mut self,
        host: &H,
        decorators: &[&dyn Decorator<H::Instance>],
    ) -> Result<ModuleDefinition> {
        let definition = build(host, decorators);
        self.define(&definition)?;
        Ok(definition)
    }

    pub fn define(&mut self, definition: &ModuleDefinition) -> Result<()> {
        define(&mut self.linker, definition)
    }

    /// Compiles, links and starts a guest module.
    ///
    /// Host calls made by the guest resolve their receivers in `context`;
    /// the host module instances must be created there beforehand.
    pub fn instantiate(&self, wasm: &[u8], context: &InstantiationContext) -> Result<Guest> {
        if context.is_closed() {
            return Err(hostabi::Error::Closed.into());
        }
        let module = wasmi::Module::new(&self.engine, wasm).map_err(Error::Compile)?;
        let mut store = Store::new(&self.engine, context.call_context());
        let instance = self
            .linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(Error::Instantiate)?;
        debug!(bytes = wasm.len(), "instantiated guest module");
        Ok(Guest { store, instance })
    }
}

/// A started guest module.
pub struct Guest {
    store: Store<CallContext>,
    instance: wasmi::Instance,
}

impl Guest {
    /// Calls the exported function `name`.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_typed_func::<P, R>(&self.store, name)
            .map_err(|source| Error::Export {
                name: name.to_owned(),
                source,
            })?;
        func.call(&mut self.store, params).map_err(Error::Call)
    }

    pub fn context(&self) -> &CallContext {
        self.store.data()
    }

    /// Copies `bytes` into guest memory at `offset`.
    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        let memory = self
            .instance
            .get_memory(&self.store, "memory")
            .ok_or(Error::NoMemory)?;
        let mut view = MemoryView::new(memory.data_mut(&mut self.store));
        view.write(offset, bytes)?;
        Ok(())
    }

    /// Copies `length` bytes of guest memory at `offset`.
    pub fn read_memory(&mut self, offset: u32, length: u32) -> Result<Vec<u8>> {
        let memory = self
            .instance
            .get_memory(&self.store, "memory")
            .ok_or(Error::NoMemory)?;
        let view = MemoryView::new(memory.data_mut(&mut self.store));
        Ok(view.read(offset, length)?.to_vec())
    }
}
