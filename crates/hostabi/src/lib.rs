//! Type-safe host modules for WebAssembly guests.
//!
//! A host module is a named set of functions over one stateful instance
//! type. Each function is written against ordinary Rust types and bound to
//! the flat stack calling convention with one of the [`f0`]..[`f12`]
//! binders:
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use hostabi::types::{BoxError, Bytes, Optional, Trap};
//! use hostabi::{f0, f1, Caller, Configure, Functions, HostModule, Module};
//!
//! #[derive(Default)]
//! struct Counter {
//!     total: AtomicU64,
//! }
//!
//! impl Module for Counter {}
//!
//! struct CounterModule;
//!
//! impl HostModule for CounterModule {
//!     type Instance = Counter;
//!
//!     fn name(&self) -> &str {
//!         "counter"
//!     }
//!
//!     fn functions(&self) -> Functions<Counter> {
//!         let mut functions = Functions::new();
//!         functions
//!             .insert("total", f0(|this: &Counter, _: &mut Caller<'_>| {
//!                 this.total.load(Ordering::Relaxed)
//!             }))
//!             .insert("feed", f1(|this: &Counter, caller: &mut Caller<'_>, b: Bytes| -> Result<_, Trap> {
//!                 let n = b.as_slice(caller.memory())?.len() as u64;
//!                 this.total.fetch_add(n, Ordering::Relaxed);
//!                 Ok(Optional::res(n))
//!             }));
//!         functions
//!     }
//!
//!     fn instantiate(&self, options: &[Box<dyn Configure<Counter>>]) -> Result<Counter, BoxError> {
//!         let mut counter = Counter::default();
//!         hostabi::configure(&mut counter, options);
//!         Ok(counter)
//!     }
//! }
//!
//! let log: &dyn hostabi::Decorator<Counter> = &hostabi::Log;
//! let definition = hostabi::build(&CounterModule, &[log]);
//! assert_eq!(definition.function("feed").unwrap().param_types().len(), 2);
//! ```
//!
//! [`build`] turns the module into a [`ModuleDefinition`] a guest runtime
//! can link. Instances live in an [`InstantiationContext`]; on every call
//! the bound function resolves its receiver from the caller's
//! [`CallContext`], so one definition serves any number of concurrent
//! guests.

pub mod binder;
pub mod build;
pub mod context;
pub mod decorator;
pub mod error;
pub mod function;
pub mod manifest;
pub mod module;
pub mod testing;

pub use binder::{f0, f1, f10, f11, f12, f2, f3, f4, f5, f6, f7, f8, f9};
pub use build::{build, HostCall, HostFunction, ModuleDefinition};
pub use context::{CallContext, Instance, InstanceRegistry, InstantiationContext};
pub use decorator::{decorator, Decorator, DecoratorFn, Log, CALL_TARGET};
pub use error::{Error, HostResult};
pub use function::{Caller, Function, Functions, Thunk};
pub use manifest::{FunctionManifest, ModuleManifest};
pub use module::{configure, option, Configure, HostModule, Module};

pub use hostabi_layout as layout;
pub use hostabi_layout::record;
pub use hostabi_types as types;
