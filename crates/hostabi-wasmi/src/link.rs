//! Defining built host modules in a `wasmi` linker.

use hostabi::{CallContext, Caller, HostFunction, ModuleDefinition};
use hostabi_types::{MemoryView, ValueType, Word};
use tracing::debug;
use wasmi::core::{ValType, F32, F64};
use wasmi::{Extern, FuncType, Linker, Val};

use crate::error::{Error, HostTrap, Result};

/// Interpreter type of a stack word kind.
pub fn val_type(ty: ValueType) -> ValType {
    match ty {
        ValueType::I32 => ValType::I32,
        ValueType::I64 => ValType::I64,
        ValueType::F32 => ValType::F32,
        ValueType::F64 => ValType::F64,
    }
}

/// Stack word of an interpreter value. Reference values have no word form
/// and map to zero.
pub fn to_word(val: &Val) -> u64 {
    match val {
        Val::I32(v) => Word::I32(*v).bits(),
        Val::I64(v) => Word::I64(*v).bits(),
        Val::F32(v) => u64::from(v.to_bits()),
        Val::F64(v) => v.to_bits(),
        _ => 0,
    }
}

/// Interpreter value of a stack word of kind `ty`.
pub fn from_word(ty: ValueType, word: u64) -> Val {
    match ty.load(word) {
        Word::I32(v) => Val::I32(v),
        Word::I64(v) => Val::I64(v),
        Word::F32(v) => Val::F32(F32::from(v)),
        Word::F64(v) => Val::F64(F64::from(v)),
    }
}

/// Defines every function of `definition` under its module name.
///
/// The store data must expose the [`CallContext`] of the guest, through
/// which each call resolves its receiver. Guest memory is the export named
/// `memory`; without one, host functions see an empty memory.
pub fn define<T>(linker: &mut Linker<T>, definition: &ModuleDefinition) -> Result<()>
where
    T: AsRef<CallContext> + 'static,
{
    let module = definition.name();
    for function in definition.functions() {
        define_function(linker, module, function)?;
    }
    debug!(
        module,
        functions = definition.functions().len(),
        "linked host module"
    );
    Ok(())
}

fn define_function<T>(linker: &mut Linker<T>, module: &str, function: &HostFunction) -> Result<()>
where
    T: AsRef<CallContext> + 'static,
{
    let ty = FuncType::new(
        function.param_types().iter().copied().map(val_type),
        function.result_types().iter().copied().map(val_type),
    );
    let host = function.clone();

    linker
        .func_new(
            module,
            function.export(),
            ty,
            move |mut caller: wasmi::Caller<'_, T>, params: &[Val], results: &mut [Val]| -> std::result::Result<(), wasmi::Error> {
                let mut stack = vec![0u64; host.stack_size()];
                for (word, param) in stack.iter_mut().zip(params) {
                    *word = to_word(param);
                }

                let outcome = match caller.get_export("memory").and_then(Extern::into_memory) {
                    Some(memory) => {
                        let (bytes, data) = memory.data_and_store_mut(&mut caller);
                        let mut view = MemoryView::new(bytes);
                        let mut call = Caller::new(AsRef::<CallContext>::as_ref(&*data), &mut view);
                        host.call(&mut call, &mut stack)
                    }
                    None => {
                        let mut empty: [u8; 0] = [];
                        let mut view = MemoryView::new(&mut empty);
                        let mut call = Caller::new(AsRef::<CallContext>::as_ref(caller.data()), &mut view);
                        host.call(&mut call, &mut stack)
                    }
                };
                outcome.map_err(|trap| wasmi::Error::host(HostTrap(trap)))?;

                for ((result, &ty), &word) in results.iter_mut().zip(host.result_types()).zip(&stack) {
                    *result = from_word(ty, word);
                }
                Ok(())
            },
        )
        .map_err(|e| Error::Link {
            module: module.to_owned(),
            name: function.export().to_owned(),
            message: e.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_roundtrip_through_vals() {
        let cases = [
            (ValueType::I32, 0xffff_fffe),
            (ValueType::I64, u64::MAX - 1),
            (ValueType::F32, u64::from(1.5f32.to_bits())),
            (ValueType::F64, (-0.25f64).to_bits()),
        ];
        for (ty, word) in cases {
            assert_eq!(to_word(&from_word(ty, word)), word);
        }
    }

    #[test]
    fn test_i32_val_zero_extends() {
        assert_eq!(to_word(&Val::I32(-1)), 0xffff_ffff);
    }

    #[test]
    fn test_val_types_map_one_to_one() {
        assert_eq!(val_type(ValueType::I32), ValType::I32);
        assert_eq!(val_type(ValueType::F64), ValType::F64);
    }
}
