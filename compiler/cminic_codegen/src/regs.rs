//! Width-indexed argument/accumulator register tables, ported byte-for-byte
//! from the code generator's own `argreg64`/`argreg32`/`argreg16`/`argreg8`
//! and `raxreg`/`rdireg` arrays.

use cminic_session::{Diagnostic, Span};
use cminic_types::Type;

const ARGREG64: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
const ARGREG32: [&str; 6] = ["edi", "esi", "edx", "ecx", "r8d", "r9d"];
const ARGREG16: [&str; 6] = ["di", "si", "dx", "cx", "r8w", "r9w"];
const ARGREG8: [&str; 6] = ["dil", "sil", "dl", "cl", "r8b", "r9b"];

const RAXREG: [&str; 4] = ["rax", "eax", "ax", "al"];
const RDIREG: [&str; 4] = ["rdi", "edi", "di", "dil"];

pub enum RegKind {
    Rax,
    Rdi,
}

fn size_to_regindex(size: usize, span: Span) -> Result<usize, Diagnostic> {
    match size {
        8 => Ok(0),
        4 => Ok(1),
        2 => Ok(2),
        1 => Ok(3),
        other => Err(Diagnostic::new(span, format!("unsupported register size {other}"))),
    }
}

/// The `index`-th 64-bit integer argument register, used for call-site
/// argument passing (every argument is popped into its full-width register
/// regardless of the callee parameter's declared width).
pub fn argreg64(index: usize) -> &'static str {
    ARGREG64[index]
}

/// The argument register to use for the `index`-th integer argument, sized
/// to the callee parameter's type. Arrays always pass as a 64-bit pointer.
pub fn argreg(index: usize, ty: &Type, span: Span) -> Result<&'static str, Diagnostic> {
    if ty.is_array() {
        return Ok(ARGREG64[index]);
    }
    match ty.size_of() {
        8 => Ok(ARGREG64[index]),
        4 => Ok(ARGREG32[index]),
        2 => Ok(ARGREG16[index]),
        1 => Ok(ARGREG8[index]),
        other => Err(Diagnostic::new(span, format!("unsupported argument size {other}"))),
    }
}

/// `proper_register`: the width-appropriate name for `rax`/`rdi`, sized to
/// `ty` (arrays resolve through their element type, matching the source
/// compiler's `while (ty->ptr_to) ty = ty->ptr_to;` walk).
pub fn proper_register(ty: &Type, kind: RegKind, span: Span) -> Result<&'static str, Diagnostic> {
    let mut t = ty;
    while t.is_array() {
        t = t.pointee();
    }
    let index = size_to_regindex(t.size_of(), span)?;
    Ok(match kind {
        RegKind::Rax => RAXREG[index],
        RegKind::Rdi => RDIREG[index],
    })
}
