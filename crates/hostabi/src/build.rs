//! Turning a host module into runtime-loadable definitions.

use std::fmt;
use std::sync::Arc;

use hostabi_types::{Trap, ValueInfo, ValueType};
use tracing::debug;

use crate::decorator::Decorator;
use crate::function::{Caller, Function};
use crate::manifest::{FunctionManifest, ModuleManifest};
use crate::module::{HostModule, Module};

/// Receiver-free entry point of a built function.
pub type HostCall = Arc<dyn Fn(&mut Caller<'_>, &mut [u64]) -> Result<(), Trap> + Send + Sync>;

/// A host function ready to be linked into a guest runtime.
///
/// The receiver is resolved from the caller's context on every call, so one
/// definition serves every instantiation.
#[derive(Clone)]
pub struct HostFunction {
    export: String,
    name: String,
    params: Vec<ValueInfo>,
    results: Vec<ValueInfo>,
    param_types: Vec<ValueType>,
    result_types: Vec<ValueType>,
    call: HostCall,
}

impl HostFunction {
    pub fn export(&self) -> &str {
        &self.export
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueInfo] {
        &self.params
    }

    pub fn results(&self) -> &[ValueInfo] {
        &self.results
    }

    pub fn param_types(&self) -> &[ValueType] {
        &self.param_types
    }

    pub fn result_types(&self) -> &[ValueType] {
        &self.result_types
    }

    /// Words the stack passed to [`call`](Self::call) must hold.
    pub fn stack_size(&self) -> usize {
        self.param_types.len().max(self.result_types.len())
    }

    /// Runs the function. `stack` holds the parameter words on entry and the
    /// result words on return.
    pub fn call(&self, caller: &mut Caller<'_>, stack: &mut [u64]) -> Result<(), Trap> {
        (self.call)(caller, stack)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("export", &self.export)
            .field("name", &self.name)
            .field("param_types", &self.param_types)
            .field("result_types", &self.result_types)
            .finish_non_exhaustive()
    }
}

/// The built form of a host module: its import name and functions.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    name: String,
    functions: Vec<HostFunction>,
}

impl ModuleDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Functions in export name order.
    pub fn functions(&self) -> &[HostFunction] {
        &self.functions
    }

    pub fn function(&self, export: &str) -> Option<&HostFunction> {
        self.functions.iter().find(|f| f.export == export)
    }

    pub fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            module: self.name.clone(),
            functions: self
                .functions
                .iter()
                .map(|f| FunctionManifest {
                    export: f.export.clone(),
                    name: f.name.clone(),
                    params: f.param_types.clone(),
                    results: f.result_types.clone(),
                })
                .collect(),
        }
    }
}

/// Builds `host` into a [`ModuleDefinition`].
///
/// Every function takes its export name as debug name when it has none, then
/// goes through `decorators` in order.
pub fn build<H: HostModule>(host: &H, decorators: &[&dyn Decorator<H::Instance>]) -> ModuleDefinition {
    let module = host.name().to_owned();
    let functions = host
        .functions()
        .into_iter()
        .map(|(export, mut function)| {
            if function.name.is_empty() {
                function.name.clone_from(&export);
            }
            let function = decorators
                .iter()
                .fold(function, |f, decorator| decorator.decorate(&module, f));
            bind(export, function)
        })
        .collect::<Vec<_>>();

    debug!(module = %module, functions = functions.len(), "built host module");
    ModuleDefinition {
        name: module,
        functions,
    }
}

fn bind<M: Module>(export: String, function: Function<M>) -> HostFunction {
    let Function {
        name,
        params,
        results,
        func,
    } = function;
    let param_types = hostabi_types::concat_value_types(&params);
    let result_types = hostabi_types::concat_value_types(&results);

    let call = move |caller: &mut Caller<'_>, stack: &mut [u64]| -> Result<(), Trap> {
        let this = caller.context().receiver::<M>()?;
        func(&*this, caller, stack)
    };

    HostFunction {
        export,
        name,
        params,
        results,
        param_types,
        result_types,
        call: Arc::new(call),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InstantiationContext;
    use crate::decorator::decorator;
    use crate::function::Functions;
    use crate::module::Configure;
    use crate::{f0, f1};
    use hostabi_types::{BoxError, FixedMemory};

    struct Answer(u32);
    impl Module for Answer {}

    struct AnswerModule;

    impl HostModule for AnswerModule {
        type Instance = Answer;

        fn name(&self) -> &str {
            "answer"
        }

        fn functions(&self) -> Functions<Answer> {
            let mut functions = Functions::new();
            functions
                .insert("get", f0(|this: &Answer, _: &mut Caller<'_>| this.0))
                .insert(
                    "add",
                    f1(|this: &Answer, _: &mut Caller<'_>, v: u64| u64::from(this.0) + v).with_name("plus"),
                );
            functions
        }

        fn instantiate(&self, _: &[Box<dyn Configure<Answer>>]) -> Result<Answer, BoxError> {
            Ok(Answer(42))
        }
    }

    #[test]
    fn test_build_defaults_names_and_shapes() {
        let definition = build(&AnswerModule, &[]);
        assert_eq!(definition.name(), "answer");
        let exports: Vec<_> = definition.functions().iter().map(|f| f.export()).collect();
        assert_eq!(exports, ["add", "get"]);

        let get = definition.function("get").unwrap();
        assert_eq!(get.name(), "get");
        assert!(get.param_types().is_empty());
        assert_eq!(get.result_types(), [ValueType::I32]);

        let add = definition.function("add").unwrap();
        assert_eq!(add.name(), "plus");
        assert_eq!(add.param_types(), [ValueType::I64]);
    }

    #[test]
    fn test_decorators_apply_in_order() {
        let first = decorator(|_: &str, f: Function<Answer>| {
            let name = format!("{}+a", f.name);
            f.with_name(name)
        });
        let second = decorator(|_: &str, f: Function<Answer>| {
            let name = format!("{}+b", f.name);
            f.with_name(name)
        });
        let decorators: [&dyn Decorator<Answer>; 2] = [&first, &second];
        let definition = build(&AnswerModule, &decorators);
        assert_eq!(definition.function("get").unwrap().name(), "get+a+b");
    }

    #[test]
    fn test_call_resolves_receiver_from_context() {
        let definition = build(&AnswerModule, &[]);
        let add = definition.function("add").unwrap();
        let mut memory = FixedMemory::pages(1);

        let unbound = crate::CallContext::new();
        let mut caller = Caller::new(&unbound, &mut memory);
        let mut stack = [1u64];
        assert!(matches!(
            add.call(&mut caller, &mut stack),
            Err(Trap::UnboundModule { .. })
        ));

        let ctx = InstantiationContext::new();
        let _instance = ctx.instantiate(&AnswerModule, &[]).unwrap();
        let call = ctx.call_context();
        let mut caller = Caller::new(&call, &mut memory);
        add.call(&mut caller, &mut stack).unwrap();
        assert_eq!(stack, [43]);
    }

    #[test]
    fn test_manifest_lists_word_signatures() {
        let manifest = build(&AnswerModule, &[]).manifest();
        assert_eq!(manifest.module, "answer");
        assert_eq!(manifest.functions[0].export, "add");
        assert_eq!(manifest.functions[0].params, vec![ValueType::I64]);
        assert_eq!(manifest.functions[0].results, vec![ValueType::I64]);
    }
}
