//! End-to-end tests running host modules under wasmi.
//!
//! Guest modules are assembled with wasm-encoder: each one imports every
//! function of a host module and re-exports a forwarding function of the
//! same name and signature, plus optionally a one-page memory.
//!
//! Tests validate:
//! - Guests in separate instantiation contexts reach separate instances
//! - Byte buffers and strings are read from guest memory
//! - Host traps abort the guest call and surface as typed traps
//! - Optional results arrive as payload plus error code
//! - Closing a context unbinds its instances

use std::sync::atomic::{AtomicU32, Ordering};

use hostabi::types::{BoxError, Bytes, Errno, Optional, Trap, ValueType};
use hostabi::{f0, f1, f2, Caller, Configure, Functions, HostModule, InstantiationContext, ModuleDefinition, Module};
use hostabi_wasmi::{Error, Runtime};
use wasm_encoder::{
    CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection, ImportSection,
    Instruction, MemorySection, MemoryType, TypeSection,
};

// ══════════════════════════════════════════════════════════════════════════════
// Host modules
// ══════════════════════════════════════════════════════════════════════════════

struct Answer {
    value: u32,
    calls: AtomicU32,
}

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
            .insert(
                "get",
                f0(|this: &Answer, _: &mut Caller<'_>| {
                    this.calls.fetch_add(1, Ordering::Relaxed);
                    this.value
                }),
            )
            .insert(
                "div",
                f2(|this: &Answer, _: &mut Caller<'_>, a: i32, b: i32| {
                    if b == 0 {
                        Optional::err(Errno(33))
                    } else {
                        Optional::res(a / b + this.value as i32)
                    }
                }),
            );
        functions
    }

    fn instantiate(&self, options: &[Box<dyn Configure<Answer>>]) -> Result<Answer, BoxError> {
        let mut answer = Answer {
            value: 0,
            calls: AtomicU32::new(0),
        };
        hostabi::configure(&mut answer, options);
        Ok(answer)
    }
}

struct Text;

impl Module for Text {}

struct TextModule;

impl HostModule for TextModule {
    type Instance = Text;

    fn name(&self) -> &str {
        "text"
    }

    fn functions(&self) -> Functions<Text> {
        let mut functions = Functions::new();
        functions
            .insert(
                "count",
                f2(|_: &Text, caller: &mut Caller<'_>, b: Bytes, c: u8| -> Result<u32, Trap> {
                    let bytes = b.as_slice(caller.memory())?;
                    Ok(bytes.iter().filter(|&&x| x == c).count() as u32)
                }),
            )
            .insert(
                "chars",
                f1(|_: &Text, _: &mut Caller<'_>, s: String| s.chars().count() as u32),
            )
            .insert(
                "upper",
                f1(|_: &Text, caller: &mut Caller<'_>, b: Bytes| -> Result<(), Trap> {
                    b.as_mut_slice(caller.memory_mut())?.make_ascii_uppercase();
                    Ok(())
                }),
            );
        functions
    }

    fn instantiate(&self, _: &[Box<dyn Configure<Text>>]) -> Result<Text, BoxError> {
        Ok(Text)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn enc_type(ty: ValueType) -> wasm_encoder::ValType {
    match ty {
        ValueType::I32 => wasm_encoder::ValType::I32,
        ValueType::I64 => wasm_encoder::ValType::I64,
        ValueType::F32 => wasm_encoder::ValType::F32,
        ValueType::F64 => wasm_encoder::ValType::F64,
    }
}

/// Guest importing every function of `definition` and re-exporting each
/// under its own name.
fn forwarding_guest(definition: &ModuleDefinition, with_memory: bool) -> Vec<u8> {
    let functions = definition.functions();
    let count = functions.len() as u32;

    let mut types = TypeSection::new();
    let mut imports = ImportSection::new();
    let mut func_section = FunctionSection::new();
    let mut exports = ExportSection::new();
    let mut code = CodeSection::new();

    for (i, function) in functions.iter().enumerate() {
        let i = i as u32;
        types.ty().function(
            function.param_types().iter().copied().map(enc_type),
            function.result_types().iter().copied().map(enc_type),
        );
        imports.import(definition.name(), function.export(), EntityType::Function(i));
        func_section.function(i);
        exports.export(function.export(), ExportKind::Func, count + i);

        let mut body = Function::new(vec![]);
        for param in 0..function.param_types().len() as u32 {
            body.instruction(&Instruction::LocalGet(param));
        }
        body.instruction(&Instruction::Call(i));
        body.instruction(&Instruction::End);
        code.function(&body);
    }

    let mut memory = MemorySection::new();
    if with_memory {
        memory.memory(MemoryType {
            minimum: 1,
            maximum: Some(1),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        exports.export("memory", ExportKind::Memory, 0);
    }

    let mut module = wasm_encoder::Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&func_section);
    if with_memory {
        module.section(&memory);
    }
    module.section(&exports);
    module.section(&code);
    let wasm = module.finish();

    wasmparser::validate(&wasm).expect("guest module is valid");
    wasm
}

fn answer(value: u32) -> Box<dyn Configure<Answer>> {
    hostabi::option(move |a: &mut Answer| a.value = value)
}

fn runtime() -> (Runtime, ModuleDefinition, ModuleDefinition) {
    let engine = wasmi::Engine::default();
    let mut runtime = Runtime::new(&engine);
    let answers = runtime.register(&AnswerModule, &[]).unwrap();
    let log: &dyn hostabi::Decorator<Text> = &hostabi::Log;
    let text = runtime.register(&TextModule, &[log]).unwrap();
    (runtime, answers, text)
}

// ══════════════════════════════════════════════════════════════════════════════
// Dispatch
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn guests_reach_the_instance_of_their_own_context() {
    let (runtime, answers, _) = runtime();
    let wasm = forwarding_guest(&answers, false);

    let contexts: Vec<_> = [0u32, 21, 42]
        .into_iter()
        .map(|value| {
            let ctx = InstantiationContext::new();
            let instance = ctx.instantiate(&AnswerModule, &[answer(value)]).unwrap();
            (ctx, instance)
        })
        .collect();
    let mut guests: Vec<_> = contexts
        .iter()
        .map(|(ctx, _)| runtime.instantiate(&wasm, ctx).unwrap())
        .collect();

    for _ in 0..3 {
        for (guest, expected) in guests.iter_mut().zip([0, 21, 42]) {
            assert_eq!(guest.call::<(), i32>("get", ()).unwrap(), expected);
        }
    }
    for (_, instance) in &contexts {
        assert_eq!(instance.calls.load(Ordering::Relaxed), 3);
    }
}

#[test]
fn guest_without_instance_traps_unbound() {
    let (runtime, answers, _) = runtime();
    let ctx = InstantiationContext::new();
    let mut guest = runtime.instantiate(&forwarding_guest(&answers, false), &ctx).unwrap();

    let err = guest.call::<(), i32>("get", ()).unwrap_err();
    assert!(matches!(err, Error::Call(_)));
    assert!(matches!(err.trap(), Some(Trap::UnboundModule { .. })));
}

#[test]
fn closing_context_unbinds_instances() {
    let (runtime, answers, _) = runtime();
    let ctx = InstantiationContext::new();
    let _instance = ctx.instantiate(&AnswerModule, &[answer(7)]).unwrap();
    let mut guest = runtime.instantiate(&forwarding_guest(&answers, false), &ctx).unwrap();
    assert_eq!(guest.call::<(), i32>("get", ()).unwrap(), 7);

    ctx.close().unwrap();
    let err = guest.call::<(), i32>("get", ()).unwrap_err();
    assert!(matches!(err.trap(), Some(Trap::UnboundModule { .. })));
    assert!(matches!(
        runtime.instantiate(&forwarding_guest(&answers, false), &ctx),
        Err(Error::Host(hostabi::Error::Closed))
    ));
}

#[test]
fn optional_result_arrives_as_payload_and_code() {
    let (runtime, answers, _) = runtime();
    let ctx = InstantiationContext::new();
    let _instance = ctx.instantiate(&AnswerModule, &[answer(1)]).unwrap();
    let mut guest = runtime.instantiate(&forwarding_guest(&answers, false), &ctx).unwrap();

    assert_eq!(guest.call::<(i32, i32), (i32, i32)>("div", (9, 3)).unwrap(), (4, 0));
    assert_eq!(guest.call::<(i32, i32), (i32, i32)>("div", (9, 0)).unwrap(), (0, 33));
}

// ══════════════════════════════════════════════════════════════════════════════
// Memory
// ══════════════════════════════════════════════════════════════════════════════

fn text_guest() -> (hostabi_wasmi::Guest, InstantiationContext) {
    let (runtime, _, text) = runtime();
    let ctx = InstantiationContext::new();
    ctx.instantiate(&TextModule, &[]).unwrap();
    let guest = runtime.instantiate(&forwarding_guest(&text, true), &ctx).unwrap();
    (guest, ctx)
}

#[test]
fn bytes_are_read_from_guest_memory() {
    let (mut guest, _ctx) = text_guest();
    guest.write_memory(100, b"banana").unwrap();
    let n = guest
        .call::<(i32, i32, i32), i32>("count", (100, 6, i32::from(b'a')))
        .unwrap();
    assert_eq!(n, 3);
}

#[test]
fn host_writes_are_visible_to_guest() {
    let (mut guest, _ctx) = text_guest();
    guest.write_memory(8, b"quiet").unwrap();
    guest.call::<(i32, i32), ()>("upper", (8, 5)).unwrap();
    assert_eq!(guest.read_memory(8, 5).unwrap(), b"QUIET");
}

#[test]
fn string_params_decode_utf8() {
    let (mut guest, _ctx) = text_guest();
    guest.write_memory(0, "héllo".as_bytes()).unwrap();
    assert_eq!(guest.call::<(i32, i32), i32>("chars", (0, 6)).unwrap(), 5);

    guest.write_memory(16, &[0xff, 0xfe]).unwrap();
    let err = guest.call::<(i32, i32), i32>("chars", (16, 2)).unwrap_err();
    assert!(matches!(err.trap(), Some(Trap::InvalidUtf8 { .. })));
}

#[test]
fn out_of_range_buffer_traps_with_segfault() {
    let (mut guest, _ctx) = text_guest();
    let err = guest
        .call::<(i32, i32, i32), i32>("count", (65530, 10, 0))
        .unwrap_err();
    assert_eq!(
        err.trap(),
        Some(&Trap::Segfault {
            offset: 65530,
            length: 10
        })
    );
    assert!(err.to_string().contains("segmentation fault: @0000fffa/10"));
}

#[test]
fn guest_without_memory_sees_empty_memory() {
    let (runtime, _, text) = runtime();
    let ctx = InstantiationContext::new();
    ctx.instantiate(&TextModule, &[]).unwrap();
    let mut guest = runtime.instantiate(&forwarding_guest(&text, false), &ctx).unwrap();

    let err = guest.call::<(i32, i32, i32), i32>("count", (0, 1, 0)).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::Segfault { offset: 0, length: 1 }));
    assert!(matches!(guest.write_memory(0, b"x"), Err(Error::NoMemory)));
}

#[test]
fn missing_export_is_reported() {
    let (mut guest, _ctx) = text_guest();
    let err = guest.call::<(), ()>("nope", ()).unwrap_err();
    assert!(matches!(err, Error::Export { ref name, .. } if name == "nope"));
}
