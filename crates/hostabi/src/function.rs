//! Bound host functions.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use hostabi_types::{Memory, Trap, ValueInfo, ValueType};

use crate::context::CallContext;

/// What a host function sees of the call in progress.
pub struct Caller<'a> {
    context: &'a CallContext,
    memory: &'a mut dyn Memory,
}

impl<'a> Caller<'a> {
    pub fn new(context: &'a CallContext, memory: &'a mut dyn Memory) -> Self {
        Self { context, memory }
    }

    /// Context the call runs under; resolves sibling module instances.
    pub fn context(&self) -> &'a CallContext {
        self.context
    }

    /// Linear memory of the calling guest.
    pub fn memory(&self) -> &dyn Memory {
        &*self.memory
    }

    pub fn memory_mut(&mut self) -> &mut dyn Memory {
        &mut *self.memory
    }
}

/// Stack-level entry point of a bound function.
///
/// Receives the module instance, the caller, and the operand stack holding
/// the parameters on entry and the results on return.
pub type Thunk<M> = Arc<dyn Fn(&M, &mut Caller<'_>, &mut [u64]) -> Result<(), Trap> + Send + Sync>;

/// A host function bound to the stack calling convention.
///
/// Built by the [`f0`](crate::f0)..[`f12`](crate::f12) binders.
pub struct Function<M> {
    /// Debug name. Defaults to the export name when empty.
    pub name: String,
    pub params: Vec<ValueInfo>,
    pub results: Vec<ValueInfo>,
    pub func: Thunk<M>,
}

impl<M> Function<M> {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Flat parameter stack layout.
    pub fn param_types(&self) -> Vec<ValueType> {
        hostabi_types::concat_value_types(&self.params)
    }

    /// Flat result stack layout.
    pub fn result_types(&self) -> Vec<ValueType> {
        hostabi_types::concat_value_types(&self.results)
    }

    /// Stack window of each parameter.
    pub fn param_slots(&self) -> Vec<Range<usize>> {
        let bounds = slot_boundaries(&self.params);
        bounds.windows(2).map(|w| w[0]..w[1]).collect()
    }

    /// Words needed on the stack: parameters and results share it.
    pub fn stack_size(&self) -> usize {
        let params: usize = self.params.iter().map(ValueInfo::stack_size).sum();
        let results: usize = self.results.iter().map(ValueInfo::stack_size).sum();
        params.max(results)
    }

    /// Calls the thunk on `stack`, which must hold `stack_size()` words.
    pub fn call(&self, this: &M, caller: &mut Caller<'_>, stack: &mut [u64]) -> Result<(), Trap> {
        (self.func)(this, caller, stack)
    }
}

impl<M> Clone for Function<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            results: self.results.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<M> fmt::Debug for Function<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// Prefix sums of the parameter word counts: `[0, a, a+b, ...]`.
pub(crate) fn slot_boundaries(params: &[ValueInfo]) -> Vec<usize> {
    let mut bounds = Vec::with_capacity(params.len() + 1);
    bounds.push(0);
    let mut total = 0;
    for param in params {
        total += param.stack_size();
        bounds.push(total);
    }
    bounds
}

/// Functions exported by a host module, keyed by export name.
pub struct Functions<M>(BTreeMap<String, Function<M>>);

impl<M> Functions<M> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, export: impl Into<String>, function: Function<M>) -> &mut Self {
        self.0.insert(export.into(), function);
        self
    }

    pub fn get(&self, export: &str) -> Option<&Function<M>> {
        self.0.get(export)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Function<M>> {
        self.0.iter()
    }
}

impl<M> Default for Functions<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Functions<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M, S: Into<String>> FromIterator<(S, Function<M>)> for Functions<M> {
    fn from_iter<I: IntoIterator<Item = (S, Function<M>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<M> IntoIterator for Functions<M> {
    type Item = (String, Function<M>);
    type IntoIter = btree_map::IntoIter<String, Function<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
