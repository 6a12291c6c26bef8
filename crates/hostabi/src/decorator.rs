//! Function decorators.
//!
//! A decorator rewrites a [`Function`] when its host module is built, usually
//! by wrapping its thunk. [`Log`] traces every call.

use std::fmt::{self, Write};
use std::sync::Arc;

use hostabi_types::format::format_list;
use hostabi_types::{Memory, Trap, ValueInfo};
use tracing::{debug, Level};

use crate::function::{slot_boundaries, Caller, Function};

/// Tracing target of call logs.
pub const CALL_TARGET: &str = "hostabi::call";

/// Rewrites the functions of a host module as it is built.
pub trait Decorator<M>: Send + Sync {
    fn decorate(&self, module: &str, function: Function<M>) -> Function<M>;
}

/// Decorator backed by a closure; see [`decorator`].
#[derive(Debug, Clone, Copy)]
pub struct DecoratorFn<F>(F);

/// Wraps a closure as a [`Decorator`].
pub fn decorator<M, F>(f: F) -> DecoratorFn<F>
where
    F: Fn(&str, Function<M>) -> Function<M> + Send + Sync,
{
    DecoratorFn(f)
}

impl<M, F> Decorator<M> for DecoratorFn<F>
where
    F: Fn(&str, Function<M>) -> Function<M> + Send + Sync,
{
    fn decorate(&self, module: &str, function: Function<M>) -> Function<M> {
        (self.0)(module, function)
    }
}

/// Logs every call as `module::name(params) → results` at debug level
/// under the [`CALL_TARGET`] target.
///
/// Parameter words are captured before the call, since results overwrite
/// them. When the target is disabled the call goes straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl<M: 'static> Decorator<M> for Log {
    fn decorate(&self, module: &str, function: Function<M>) -> Function<M> {
        let call = format!("{module}::{}", function.name);
        let params = function.params.clone();
        let results = function.results.clone();
        let inner = Arc::clone(&function.func);

        let thunk = move |this: &M, caller: &mut Caller<'_>, stack: &mut [u64]| -> Result<(), Trap> {
            if !tracing::enabled!(target: "hostabi::call", Level::DEBUG) {
                return inner(this, caller, stack);
            }
            let snapshot = stack.to_vec();
            let outcome = inner(this, caller, stack);

            let mut line = String::new();
            let written = write_call(
                &mut line,
                &call,
                &params,
                &results,
                caller.memory(),
                &snapshot,
                stack,
                outcome.as_ref().err(),
            );
            if written.is_ok() {
                debug!(target: "hostabi::call", "{line}");
            }
            outcome
        };

        Function {
            func: Arc::new(thunk),
            ..function
        }
    }
}

/// Renders one call log line.
///
/// `params_stack` holds the words as passed in, `results_stack` the words
/// after the call returned. A trap replaces the results.
#[allow(clippy::too_many_arguments)]
pub fn write_call(
    w: &mut dyn Write,
    call: &str,
    params: &[ValueInfo],
    results: &[ValueInfo],
    memory: &dyn Memory,
    params_stack: &[u64],
    results_stack: &[u64],
    trap: Option<&Trap>,
) -> fmt::Result {
    write!(w, "{call}(")?;
    let bounds = slot_boundaries(params);
    format_list(w, ", ", params.iter().enumerate(), |w, (i, param)| {
        param.format(w, memory, window(params_stack, bounds[i], bounds[i + 1]))
    })?;
    w.write_str(") → ")?;

    if let Some(trap) = trap {
        return write!(w, "trap: {trap}");
    }
    let bounds = slot_boundaries(results);
    format_list(w, ", ", results.iter().enumerate(), |w, (i, result)| {
        result.format(w, memory, window(results_stack, bounds[i], bounds[i + 1]))
    })
}

fn window(stack: &[u64], start: usize, end: usize) -> &[u64] {
    stack.get(start..end).unwrap_or(&[])
}
