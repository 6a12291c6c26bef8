//! Arity-specialized binders.
//!
//! `fN` turns a host function over `N` typed parameters into a [`Function`]
//! driven by the operand stack. The stack window of every parameter is
//! computed once, when binding; a call only slices, decodes, invokes, and
//! encodes the result back from word 0.
//!
//! ```
//! use hostabi::{f2, Caller, Module};
//!
//! struct Calculator;
//! impl Module for Calculator {}
//!
//! let add = f2(|_: &Calculator, _: &mut Caller<'_>, a: i32, b: i64| i64::from(a) + b);
//! assert_eq!(add.param_slots(), vec![0..1, 1..2]);
//! ```

use std::sync::Arc;

use hostabi_types::{IntoReturn, Param, Return, Trap, ValueInfo};

use crate::function::{slot_boundaries, Caller, Function};

macro_rules! binders {
    ($($(#[$doc:meta])* $name:ident($($param:ident $index:tt),*);)*) => {$(
        $(#[$doc])*
        #[allow(unused_variables)]
        pub fn $name<M, $($param,)* R, F>(func: F) -> Function<M>
        where
            M: 'static,
            $($param: Param + 'static,)*
            R: IntoReturn + 'static,
            F: Fn(&M, &mut Caller<'_>, $($param),*) -> R + Send + Sync + 'static,
        {
            let params = vec![$(ValueInfo::of::<$param>()),*];
            let results = vec![ValueInfo::of::<R::Output>()];
            let bounds = slot_boundaries(&params);

            let thunk = move |this: &M, caller: &mut Caller<'_>, stack: &mut [u64]| -> Result<(), Trap> {
                let args = ($(
                    <$param as Param>::decode(
                        caller.memory(),
                        &stack[bounds[$index]..bounds[$index + 1]],
                    )?,
                )*);
                let result = func(this, caller, $(args.$index),*).into_return()?;
                result.encode(caller.memory_mut(), stack)
            };

            Function {
                name: String::new(),
                params,
                results,
                func: Arc::new(thunk),
            }
        }
    )*};
}

binders! {
    /// Binds a host function without parameters.
    f0();
    /// Binds a host function of one parameter.
    f1(P1 0);
    f2(P1 0, P2 1);
    f3(P1 0, P2 1, P3 2);
    f4(P1 0, P2 1, P3 2, P4 3);
    f5(P1 0, P2 1, P3 2, P4 3, P5 4);
    f6(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5);
    f7(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6);
    f8(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7);
    f9(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8);
    f10(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8, P10 9);
    f11(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8, P10 9, P11 10);
    f12(P1 0, P2 1, P3 2, P4 3, P5 4, P6 5, P7 6, P8 7, P9 8, P10 9, P11 10, P12 11);
}
