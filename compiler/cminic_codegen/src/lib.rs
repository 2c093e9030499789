//! Tree-walking, stack-machine code generator emitting `.intel_syntax
//! noprefix` assembly text for an x86-64 System V target. Every expression
//! node leaves exactly one 8-byte value on the stack; `gen`/`gen_addr`/
//! `load` mirror the three-function split the code generator this was
//! ported from uses for rvalue/lvalue-address/dereference-after-address.

mod data;
mod function;
mod regs;

use std::fmt::Write as _;

use cminic_ast::Program;
use cminic_session::Diagnostic;
use tracing::instrument;

/// Accumulates the emitted assembly text and the monotonic label counters
/// that would otherwise be process-wide globals (`label_if_count`,
/// `label_loop_count` in the source compiler).
pub(crate) struct Emitter {
    buf: String,
    if_count: u32,
    loop_count: u32,
    /// Stack of enclosing loops' label numbers, innermost last — used by
    /// `break`/`continue` to find the loop they target. Replaces the source
    /// compiler's single `now_loop_count` global plus "subtract one because
    /// it's already the next depth" arithmetic with an explicit stack.
    loop_labels: Vec<u32>,
    current_fn_name: String,
}

impl Emitter {
    fn new() -> Self {
        Emitter {
            buf: String::new(),
            if_count: 0,
            loop_count: 0,
            loop_labels: Vec::new(),
            current_fn_name: String::new(),
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        self.buf.push_str("  ");
        self.buf.write_fmt(args).expect("writing to a String cannot fail");
        self.buf.push('\n');
    }

    fn label(&mut self, args: std::fmt::Arguments<'_>) {
        self.buf.write_fmt(args).expect("writing to a String cannot fail");
        self.buf.push('\n');
    }

    fn push(&mut self) {
        self.line(format_args!("push rax"));
    }

    fn push_rdi(&mut self) {
        self.line(format_args!("push rdi"));
    }

    fn push_num(&mut self, n: i64) {
        self.line(format_args!("mov rax, {n}"));
        self.push();
    }

    fn pop(&mut self) {
        self.line(format_args!("pop rax"));
    }

    fn pop_rdi(&mut self) {
        self.line(format_args!("pop rdi"));
    }

    fn next_if_label(&mut self) -> u32 {
        let n = self.if_count;
        self.if_count += 1;
        n
    }

    fn next_loop_label(&mut self) -> u32 {
        let n = self.loop_count;
        self.loop_count += 1;
        n
    }
}

/// Emits a full translation unit: prototype elimination, frame-offset
/// assignment (already done by the parser's symbol tables), `.data`, then
/// `.text` with one prologue/body/epilogue per surviving function.
#[instrument(skip(program))]
pub fn codegen(program: &Program) -> Result<String, Diagnostic> {
    let mut em = Emitter::new();
    em.label(format_args!(".intel_syntax noprefix"));
    data::emit_data_section(&mut em, program)?;
    em.label(format_args!(".text"));
    for (id, func) in program.funcs.iter() {
        if func.is_prototype {
            continue;
        }
        function::emit_function(&mut em, program, id, func)?;
    }
    Ok(em.buf)
}
