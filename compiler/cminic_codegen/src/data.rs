//! `.data` section emission: string literal labels and global variables.

use cminic_ast::{GInitElement, Program};
use cminic_session::Diagnostic;
use cminic_types::Type;

use crate::Emitter;

/// The directive width for a numeric global initializer element: an array's
/// base scalar size (walking through any nesting), or the variable's own
/// size for a plain scalar.
fn array_base_type_size(ty: &Type) -> usize {
    match ty {
        Type::Array { of, .. } => array_base_type_size(of),
        other => other.size_of(),
    }
}

pub(crate) fn emit_data_section(em: &mut Emitter, program: &Program) -> Result<(), Diagnostic> {
    em.label(format_args!(".data"));

    for (id, text) in program.strings.iter() {
        em.label(format_args!(".LC{}:", cminic_utils::idx::Idx::idx(&id)));
        em.line(format_args!(".string \"{}\"", escape_asm_string(text)));
    }

    for (_, var) in program.globals.iter() {
        if var.is_extern {
            continue;
        }
        em.label(format_args!("{}:", var.name));
        if var.ginit.is_empty() {
            em.line(format_args!(".zero {}", var.ty.size_of()));
            continue;
        }
        let base_size = array_base_type_size(&var.ty);
        for el in &var.ginit {
            match el {
                GInitElement::Symbol(sym) => em.line(format_args!(".quad {sym}")),
                GInitElement::Num(v) => match base_size {
                    8 => em.line(format_args!(".quad {v}")),
                    4 => em.line(format_args!(".long {v}")),
                    2 => em.line(format_args!(".value {v}")),
                    1 => em.line(format_args!(".byte {v}")),
                    other => {
                        return Err(Diagnostic::new(
                            cminic_session::Span::point(0),
                            format!("unsupported global initializer element size {other}"),
                        ));
                    }
                },
            }
        }
    }
    Ok(())
}

fn escape_asm_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\000"),
            _ => out.push(c),
        }
    }
    out
}
