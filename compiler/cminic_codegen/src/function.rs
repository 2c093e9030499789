//! Per-function code generation: prologue/epilogue, parameter spill, the
//! varargs save area, and the `gen`/`gen_addr`/`load` stack-machine walk
//! ported from `codegen.c`'s single `gen` dispatch (split here into one
//! function per `NodeKind` group instead of one long `if`/`else if` chain).

use cminic_ast::{Function, FuncId, Node, NodeKind, Program, VarRef};
use cminic_session::{Diagnostic, Span};
use cminic_types::Type;
use cminic_utils::idx::Idx;

use crate::regs::{self, RegKind};
use crate::Emitter;

/// Emits one function's `.globl`/label, prologue, body, and epilogue.
/// Prototype functions are filtered out by the caller before this is
/// reached (`codegen`'s `delete_prototype_func` equivalent).
pub(crate) fn emit_function(
    em: &mut Emitter,
    program: &Program,
    _id: FuncId,
    func: &Function,
) -> Result<(), Diagnostic> {
    em.current_fn_name = func.name.clone();
    em.label(format_args!(".globl {}", func.name));
    em.label(format_args!("{}:", func.name));

    em.line(format_args!("push rbp"));
    em.line(format_args!("mov rbp, rsp"));
    em.line(format_args!("sub rsp, {}", func.stack_size()));

    for (j, &id) in func.params.iter().enumerate() {
        let var = func.locals.get(id);
        em.line(format_args!("mov rax, rbp"));
        em.line(format_args!("sub rax, {}", var.offset));
        let reg = regs::argreg(j, &var.ty, Span::point(0))?;
        em.line(format_args!("mov [rax], {}", reg));
    }

    if let Some(off) = func.va_area_offset {
        emit_va_area_init(em, func, off);
    }

    gen_block_items(em, program, func, &func.body)?;
    // The body's own trailing dummy (every Block leaves one value) is
    // discarded here, matching the single `pop()` codegen() issues after
    // `gen(current_fn->body)`.
    em.pop();

    em.label(format_args!(".L.return.{}:", em.current_fn_name.clone()));
    em.line(format_args!("mov rsp, rbp"));
    em.line(format_args!("pop rbp"));
    em.line(format_args!("ret"));
    Ok(())
}

/// Spills the six integer argument registers and eight SSE registers into
/// the 136-byte varargs save area, and writes the `__builtin_va_list`
/// header (`gp_offset`, `fp_offset`, `reg_save_area`) at its front. `off`
/// is the offset (below `rbp`) of the byte one past the end of the area —
/// matches `Function::va_area_offset` and `LocalTable::reserve_va_area`.
fn emit_va_area_init(em: &mut Emitter, func: &Function, off: usize) {
    let gp = func.params.len();
    em.line(format_args!("mov DWORD PTR [rbp-{}], {}", off, gp * 8));
    em.line(format_args!("mov DWORD PTR [rbp-{}], 0", off - 4));
    em.line(format_args!("mov [rbp-{}], rbp", off - 16));
    em.line(format_args!("sub QWORD PTR [rbp-{}], {}", off - 16, off - 24));
    em.line(format_args!("mov [rbp-{}], rdi", off - 24));
    em.line(format_args!("mov [rbp-{}], rsi", off - 32));
    em.line(format_args!("mov [rbp-{}], rdx", off - 40));
    em.line(format_args!("mov [rbp-{}], rcx", off - 48));
    em.line(format_args!("mov [rbp-{}], r8", off - 56));
    em.line(format_args!("mov [rbp-{}], r9", off - 64));
    em.line(format_args!("movsd [rbp-{}], xmm0", off - 72));
    em.line(format_args!("movsd [rbp-{}], xmm1", off - 80));
    em.line(format_args!("movsd [rbp-{}], xmm2", off - 88));
    em.line(format_args!("movsd [rbp-{}], xmm3", off - 96));
    em.line(format_args!("movsd [rbp-{}], xmm4", off - 104));
    em.line(format_args!("movsd [rbp-{}], xmm5", off - 112));
    em.line(format_args!("movsd [rbp-{}], xmm6", off - 120));
    em.line(format_args!("movsd [rbp-{}], xmm7", off - 128));
}

/// `gen(Block|StmtExpr|Suger)`: every statement leaves one value, which is
/// popped immediately; the sequence as a whole then pushes its own trailing
/// dummy. A value-returning statement expression therefore always yields
/// that dummy, never the last statement's value (see SPEC_FULL's Open
/// Question log).
fn gen_block_items(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    items: &[Node],
) -> Result<(), Diagnostic> {
    for item in items {
        gen(em, program, func, item)?;
        em.pop();
    }
    em.push();
    Ok(())
}

/// `gen_addr`: pushes the address an lvalue form denotes. Anything not in
/// this list cannot have its address taken — the parser's `check_lvalue`
/// already rejects assignment targets outside `Var`/`Deref`/`StructMember`,
/// so the remaining arms exist only to mirror the source generator's own
/// (wider) `gen_addr` dispatch for nodes reachable as a `Deref`'s or
/// `StructMember`'s base.
fn gen_addr(em: &mut Emitter, program: &Program, func: &Function, node: &Node) -> Result<(), Diagnostic> {
    match &node.kind {
        NodeKind::Var(vref) => {
            gen_lval(em, program, func, vref);
            Ok(())
        }
        NodeKind::Deref(inner) => gen(em, program, func, inner),
        NodeKind::StructMember { base, offset } => {
            gen_addr(em, program, func, base)?;
            em.pop();
            em.line(format_args!("add rax, {}", offset));
            em.push();
            Ok(())
        }
        _ => Err(Diagnostic::new(node.span, "expression is not an lvalue (its address cannot be taken)")),
    }
}

/// `gen_lval`: a local's frame-relative address, or a global's RIP-relative
/// address.
fn gen_lval(em: &mut Emitter, program: &Program, func: &Function, vref: &VarRef) {
    match vref {
        VarRef::Local(id) => {
            let var = func.locals.get(*id);
            em.line(format_args!("mov rax, rbp"));
            em.line(format_args!("sub rax, {}", var.offset));
        }
        VarRef::Global(id) => {
            let var = program.globals.get(*id);
            em.line(format_args!("lea rax, [rip+{}]", var.name));
        }
    }
    em.push();
}

/// `load`: turns the address currently on the stack into the value it
/// addresses. Arrays and structs are left as their address (the "value" of
/// an array or struct expression is where it lives); scalars and pointers
/// are read and sign-extended to fill the full 64-bit accumulator.
fn load(em: &mut Emitter, ty: &Type, span: Span) -> Result<(), Diagnostic> {
    if ty.is_array() || ty.is_struct() {
        return Ok(());
    }
    if matches!(ty, Type::Char) {
        em.line(format_args!("movsx eax, BYTE PTR [rax]"));
        return Ok(());
    }
    let reg = regs::proper_register(ty, RegKind::Rax, span)?;
    em.line(format_args!("mov {}, [rax]", reg));
    match ty.size_of() {
        4 => em.line(format_args!("cdqe")),
        2 => em.line(format_args!("cwde")),
        1 => em.line(format_args!("cbw")),
        _ => {}
    }
    Ok(())
}

/// The tree-walking `gen` dispatch: every arm leaves exactly one value on
/// the stack (§3's expression-contract invariant).
fn gen(em: &mut Emitter, program: &Program, func: &Function, node: &Node) -> Result<(), Diagnostic> {
    match &node.kind {
        NodeKind::Null => {
            em.push();
            Ok(())
        }
        NodeKind::Num(v) => {
            em.push_num(*v);
            Ok(())
        }
        NodeKind::StrLiteral(id) => {
            em.line(format_args!("lea rax, [rip+.LC{}]", id.idx()));
            em.push();
            Ok(())
        }
        NodeKind::Var(_) => {
            gen_addr(em, program, func, node)?;
            em.pop();
            load(em, &node.ty, node.span)?;
            em.push();
            Ok(())
        }
        NodeKind::StructMember { .. } => {
            gen_addr(em, program, func, node)?;
            em.pop();
            load(em, &node.ty, node.span)?;
            em.push();
            Ok(())
        }
        NodeKind::Addr(inner) => gen_addr(em, program, func, inner),
        NodeKind::Deref(inner) => {
            gen(em, program, func, inner)?;
            em.pop();
            load(em, &node.ty, node.span)?;
            em.push();
            Ok(())
        }
        NodeKind::Assign(lhs, rhs) => gen_assign(em, program, func, node, lhs, rhs),
        NodeKind::Return(value) => gen_return(em, program, func, node, value.as_deref()),
        NodeKind::If { cond, then, els } => gen_if(em, program, func, cond, then, els.as_deref()),
        NodeKind::Ternary { cond, then, els } => gen_ternary(em, program, func, cond, then, els),
        NodeKind::While { cond, body } => gen_while(em, program, func, cond, body),
        NodeKind::For { init, cond, inc, body } => {
            gen_for(em, program, func, init.as_deref(), cond.as_deref(), inc.as_deref(), body)
        }
        NodeKind::Break => gen_break(em, node.span),
        NodeKind::Continue => gen_continue(em, node.span),
        NodeKind::Block(items) | NodeKind::StmtExpr(items) | NodeKind::Suger(items) => {
            gen_block_items(em, program, func, items)
        }
        NodeKind::Call { name, args, .. } => gen_call(em, program, func, node, name, args),
        NodeKind::LogicalNot(inner) => {
            gen(em, program, func, inner)?;
            em.pop();
            em.line(format_args!("test rax, rax"));
            em.line(format_args!("sete al"));
            em.line(format_args!("movzb rax, al"));
            em.push();
            Ok(())
        }
        NodeKind::BitNot(inner) => {
            gen(em, program, func, inner)?;
            em.pop();
            em.line(format_args!("not rax"));
            em.push();
            Ok(())
        }
        NodeKind::Cast { inner, .. } => gen_cast(em, program, func, node, inner),
        NodeKind::Add(l, r) => gen_binary(em, program, func, l, r, "add rax, rdi"),
        NodeKind::Sub(l, r) => gen_binary(em, program, func, l, r, "sub rax, rdi"),
        NodeKind::Mul(l, r) => gen_binary(em, program, func, l, r, "imul rax, rdi"),
        NodeKind::Div(l, r) => gen_div_mod(em, program, func, l, r, false),
        NodeKind::Mod(l, r) => gen_div_mod(em, program, func, l, r, true),
        NodeKind::BitAnd(l, r) => gen_binary(em, program, func, l, r, "and rax, rdi"),
        NodeKind::BitOr(l, r) => gen_binary(em, program, func, l, r, "or rax, rdi"),
        NodeKind::BitXor(l, r) => gen_binary(em, program, func, l, r, "xor rax, rdi"),
        NodeKind::Lshift(l, r) => gen_shift(em, program, func, l, r, "sal"),
        NodeKind::Rshift(l, r) => gen_shift(em, program, func, l, r, "sar"),
        NodeKind::Eq(l, r) => gen_compare(em, program, func, l, r, "sete"),
        NodeKind::Ne(l, r) => gen_compare(em, program, func, l, r, "setne"),
        NodeKind::Lt(l, r) => gen_compare(em, program, func, l, r, "setl"),
        NodeKind::Le(l, r) => gen_compare(em, program, func, l, r, "setle"),
        NodeKind::LogicalAnd(l, r) => gen_logical(em, program, func, l, r, "and rax, rdi"),
        NodeKind::LogicalOr(l, r) => gen_logical(em, program, func, l, r, "or rax, rdi"),
    }
}

fn gen_binary(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    l: &Node,
    r: &Node,
    instr: &str,
) -> Result<(), Diagnostic> {
    gen(em, program, func, l)?;
    gen(em, program, func, r)?;
    em.pop_rdi();
    em.pop();
    em.line(format_args!("{instr}"));
    em.push();
    Ok(())
}

fn gen_div_mod(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    l: &Node,
    r: &Node,
    is_mod: bool,
) -> Result<(), Diagnostic> {
    gen(em, program, func, l)?;
    gen(em, program, func, r)?;
    em.pop_rdi();
    em.pop();
    em.line(format_args!("cqo"));
    em.line(format_args!("idiv rdi"));
    if is_mod {
        em.line(format_args!("mov rax, rdx"));
    }
    em.push();
    Ok(())
}

fn gen_shift(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    l: &Node,
    r: &Node,
    instr: &str,
) -> Result<(), Diagnostic> {
    gen(em, program, func, l)?;
    gen(em, program, func, r)?;
    em.pop_rdi();
    em.pop();
    em.line(format_args!("mov rcx, rdi"));
    em.line(format_args!("{instr} rax, cl"));
    em.push();
    Ok(())
}

fn gen_compare(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    l: &Node,
    r: &Node,
    setcc: &str,
) -> Result<(), Diagnostic> {
    gen(em, program, func, l)?;
    gen(em, program, func, r)?;
    em.pop_rdi();
    em.pop();
    em.line(format_args!("cmp rax, rdi"));
    em.line(format_args!("{setcc} al"));
    em.line(format_args!("movzb rax, al"));
    em.push();
    Ok(())
}

/// `&&`/`||`: each operand is reduced to a 0/1 boolean before combining, so
/// nonzero operands other than exactly 1 still compare correctly.
fn gen_logical(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    l: &Node,
    r: &Node,
    instr: &str,
) -> Result<(), Diagnostic> {
    gen(em, program, func, l)?;
    gen(em, program, func, r)?;
    em.pop_rdi();
    em.pop();
    em.line(format_args!("cmp rax, 0"));
    em.line(format_args!("setne al"));
    em.line(format_args!("movzb rax, al"));
    em.line(format_args!("cmp rdi, 0"));
    em.line(format_args!("setne dil"));
    em.line(format_args!("movzb rdi, dil"));
    em.line(format_args!("{instr}"));
    em.push();
    Ok(())
}

fn gen_cast(em: &mut Emitter, program: &Program, func: &Function, node: &Node, inner: &Node) -> Result<(), Diagnostic> {
    gen(em, program, func, inner)?;
    em.pop();
    match node.ty.size_of() {
        8 => {}
        4 => em.line(format_args!("movsxd rax, eax")),
        _ => {
            let reg = regs::proper_register(&node.ty, RegKind::Rax, node.span)?;
            em.line(format_args!("movsx rax, {}", reg));
        }
    }
    em.push();
    Ok(())
}

/// `new_assign`'s codegen counterpart. A struct-typed assignment copies
/// byte-by-byte over the struct's size (§4.5 "Struct assignment"); every
/// other type moves exactly its own width through the width-correct alias
/// of `rdi`.
fn gen_assign(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    node: &Node,
    lhs: &Node,
    rhs: &Node,
) -> Result<(), Diagnostic> {
    gen_addr(em, program, func, lhs)?;
    gen(em, program, func, rhs)?;
    em.pop_rdi();
    em.pop();
    if node.ty.is_struct() {
        for i in 0..node.ty.size_of() {
            em.line(format_args!("mov r8b, [rdi+{}]", i));
            em.line(format_args!("mov [rax+{}], r8b", i));
        }
    } else {
        let reg = regs::proper_register(&lhs.ty, RegKind::Rdi, node.span)?;
        em.line(format_args!("mov [rax], {}", reg));
    }
    em.push_rdi();
    Ok(())
}

/// `ND_RETURN`: widens the returned value into `rax` per the function's
/// declared return type, then jumps to the shared epilogue. A `void`
/// function's return value is still evaluated for side effects but never
/// moved into `rax` (§9: the source silently discards it; this port does
/// the same rather than rejecting `return expr;` in a `void` function).
/// Unlike every other statement, this emits no trailing `pop`-balancing
/// value of its own — the `jmp` makes the code after it in the enclosing
/// block unreachable, so the block's per-statement `pop()` becomes dead
/// code rather than a real imbalance.
fn gen_return(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    node: &Node,
    value: Option<&Node>,
) -> Result<(), Diagnostic> {
    match value {
        Some(v) => {
            gen(em, program, func, v)?;
            em.pop_rdi();
        }
        None => em.line(format_args!("mov rdi, 0")),
    }

    match func.ret_type.as_ref() {
        Type::Void => {}
        ty if ty.is_struct() || ty.is_array() => {
            return Err(Diagnostic::new(node.span, "returning a struct or array by value is not supported"));
        }
        ty if ty.size_of() == 8 => em.line(format_args!("mov rax, rdi")),
        ty => {
            let reg = regs::proper_register(ty, RegKind::Rdi, node.span)?;
            em.line(format_args!("movsx rax, {}", reg));
        }
    }

    em.line(format_args!("jmp .L.return.{}", em.current_fn_name.clone()));
    Ok(())
}

/// `ND_IF`: with an `else`, both arms independently leave one value (no
/// extra balancing needed). Without one, the `then` arm's value is
/// discarded and a fresh dummy takes its place, so the whole `if` always
/// leaves exactly one value regardless of which path ran.
fn gen_if(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    cond: &Node,
    then: &Node,
    els: Option<&Node>,
) -> Result<(), Diagnostic> {
    let n = em.next_if_label();
    gen(em, program, func, cond)?;
    em.pop();
    em.line(format_args!("cmp rax, 0"));
    match els {
        Some(els) => {
            em.line(format_args!("je  .Lifelse{:04}", n));
            gen(em, program, func, then)?;
            em.line(format_args!("jmp .Lifend{:04}", n));
            em.label(format_args!(".Lifelse{:04}:", n));
            gen(em, program, func, els)?;
            em.label(format_args!(".Lifend{:04}:", n));
        }
        None => {
            em.line(format_args!("je  .Lifend{:04}", n));
            gen(em, program, func, then)?;
            em.pop();
            em.label(format_args!(".Lifend{:04}:", n));
            em.push();
        }
    }
    Ok(())
}

/// `ND_TERNARY`: always has both arms, so it's `gen_if`'s else-arm shape
/// without the no-else fallback; shares the same label counter as `if`.
fn gen_ternary(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    cond: &Node,
    then: &Node,
    els: &Node,
) -> Result<(), Diagnostic> {
    let n = em.next_if_label();
    gen(em, program, func, cond)?;
    em.pop();
    em.line(format_args!("cmp rax, 0"));
    em.line(format_args!("je  .Lifelse{:04}", n));
    gen(em, program, func, then)?;
    em.line(format_args!("jmp .Lifend{:04}", n));
    em.label(format_args!(".Lifelse{:04}:", n));
    gen(em, program, func, els)?;
    em.label(format_args!(".Lifend{:04}:", n));
    Ok(())
}

/// `ND_WHILE`. The source generator never pops the body's trailing value
/// between iterations, so it leaks one stack slot per iteration (and the
/// whole loop never balances to one value at all) — harmless only because
/// nothing ever runs enough iterations to notice. This port pops the body
/// each iteration and pushes a single dummy once the loop exits, so `while`
/// satisfies the same one-value-per-expression contract as everything else
/// (required for §8 property 1, stack balance).
fn gen_while(em: &mut Emitter, program: &Program, func: &Function, cond: &Node, body: &Node) -> Result<(), Diagnostic> {
    let n = em.next_loop_label();
    em.label(format_args!(".Lloopbegin{:04}:", n));
    gen(em, program, func, cond)?;
    em.pop();
    em.line(format_args!("cmp rax, 0"));
    em.line(format_args!("je  .Lloopend{:04}", n));

    em.loop_labels.push(n);
    gen(em, program, func, body)?;
    em.pop();
    em.loop_labels.pop();

    em.label(format_args!(".Lloopinc{:04}:", n));
    em.line(format_args!("jmp .Lloopbegin{:04}", n));
    em.label(format_args!(".Lloopend{:04}:", n));
    em.push();
    Ok(())
}

/// `ND_FOR`: same per-iteration balancing as `gen_while`, plus an optional
/// `init`/`cond`/`inc`.
#[allow(clippy::too_many_arguments)]
fn gen_for(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    init: Option<&Node>,
    cond: Option<&Node>,
    inc: Option<&Node>,
    body: &Node,
) -> Result<(), Diagnostic> {
    let n = em.next_loop_label();
    if let Some(init) = init {
        gen(em, program, func, init)?;
        em.pop();
    }

    em.label(format_args!(".Lloopbegin{:04}:", n));
    if let Some(cond) = cond {
        gen(em, program, func, cond)?;
        em.pop();
        em.line(format_args!("cmp rax, 0"));
        em.line(format_args!("je  .Lloopend{:04}", n));
    }

    em.loop_labels.push(n);
    gen(em, program, func, body)?;
    em.pop();
    em.loop_labels.pop();

    em.label(format_args!(".Lloopinc{:04}:", n));
    if let Some(inc) = inc {
        gen(em, program, func, inc)?;
        em.pop();
    }
    em.line(format_args!("jmp .Lloopbegin{:04}", n));
    em.label(format_args!(".Lloopend{:04}:", n));
    em.push();
    Ok(())
}

/// `break`/`continue` target the innermost enclosing loop's label number,
/// which the parser's `require_loop` already guaranteed exists; the
/// `Diagnostic` here is a backend-level backstop, not a reachable user error.
fn gen_break(em: &mut Emitter, span: Span) -> Result<(), Diagnostic> {
    let n = *em
        .loop_labels
        .last()
        .ok_or_else(|| Diagnostic::new(span, "break used outside a loop"))?;
    em.push();
    em.line(format_args!("jmp .Lloopend{:04}", n));
    Ok(())
}

fn gen_continue(em: &mut Emitter, span: Span) -> Result<(), Diagnostic> {
    let n = *em
        .loop_labels
        .last()
        .ok_or_else(|| Diagnostic::new(span, "continue used outside a loop"))?;
    em.push();
    em.line(format_args!("jmp .Lloopinc{:04}", n));
    Ok(())
}

/// `ND_CALL`: System V integer calling convention. Arguments are evaluated
/// left-to-right (each leaving one value), then popped in reverse into
/// their argument registers; `rsp` is forced 16-byte aligned around the
/// `call` by stashing `rbp` and masking, independent of whatever alignment
/// this function's own frame left it at.
fn gen_call(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    node: &Node,
    name: &str,
    args: &[Node],
) -> Result<(), Diagnostic> {
    if name == "va_start" {
        return gen_va_start(em, program, func, args, node.span);
    }
    if args.len() > 6 {
        return Err(Diagnostic::new(
            node.span,
            format!("call to '{name}' passes {} arguments; only 6 are supported", args.len()),
        ));
    }

    for arg in args {
        gen(em, program, func, arg)?;
    }
    for i in (0..args.len()).rev() {
        em.line(format_args!("pop {}", regs::argreg64(i)));
    }

    em.line(format_args!("mov rax, 0"));
    em.line(format_args!("push rbp"));
    em.line(format_args!("mov rbp, rsp"));
    em.line(format_args!("and rsp, -16"));
    em.line(format_args!("call {name}"));
    em.line(format_args!("mov rsp, rbp"));
    em.line(format_args!("pop rbp"));
    em.push();
    Ok(())
}

/// `va_start(ap, fmt)`: rather than a real call, copies the 24-byte
/// `__builtin_va_list` header this function's prologue wrote into its
/// `va_area` into `*ap`. `fmt` is evaluated for its declared role in the
/// call syntax only — the source's own `va_start` interception never reads
/// it either, since the header already encodes where the saved registers
/// begin.
fn gen_va_start(
    em: &mut Emitter,
    program: &Program,
    func: &Function,
    args: &[Node],
    span: Span,
) -> Result<(), Diagnostic> {
    let ap = args
        .first()
        .ok_or_else(|| Diagnostic::new(span, "va_start requires an 'ap' argument"))?;
    let va_off = func
        .va_area_offset
        .ok_or_else(|| Diagnostic::new(span, "va_start used outside a variadic function"))?;

    gen_addr(em, program, func, ap)?;
    em.pop();
    em.line(format_args!("mov rdi, rax"));
    for i in (0..24).step_by(8) {
        em.line(format_args!("mov r8, [rbp-{}]", va_off - i));
        em.line(format_args!("mov [rdi+{}], r8", i));
    }
    em.push_rdi();
    Ok(())
}
