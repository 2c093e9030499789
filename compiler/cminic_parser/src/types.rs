//! `type_specifier`, `pointer`, `type_suffix`, and struct declarations.

use std::rc::Rc;

use cminic_ast::{Node, NodeKind};
use cminic_lexer::{LexType, TokenKind};
use cminic_session::Diagnostic;
use cminic_types::{Member, Type};
use cminic_utils::idx::Idx;

use crate::Parser;

impl<'a> Parser<'a> {
    /// `type_specifier = "int" | "char" | "void" | "struct" ident ( "{" struct_decl* "}" )?`
    pub(crate) fn type_specifier(&mut self) -> Result<Rc<Type>, Diagnostic> {
        let tok = self.cur().clone();
        let lex_ty = match &tok.kind {
            TokenKind::Type(t) => t.clone(),
            _ => return Err(self.err_here("expected a type")),
        };
        self.bump();

        match lex_ty {
            LexType::Void => Ok(Rc::new(Type::Void)),
            LexType::Char => Ok(Rc::new(Type::Char)),
            LexType::Int => Ok(Rc::new(Type::Int)),
            LexType::Struct(_) => {
                let name = self.expect_ident("expected a struct tag")?;
                if self.eat_punct('{') {
                    if self.struct_types.contains_key(&name) {
                        return Err(self.err_here(format!("struct {name} already declared")));
                    }
                    let mut members = Vec::new();
                    let mut size = 0usize;
                    while !self.eat_punct('}') {
                        let member_ty = self.type_specifier()?;
                        let member_ty = self.pointer(member_ty)?;
                        let member_name = self.expect_ident("expected a struct member name")?;
                        let member_ty = self.type_suffix(member_ty)?;
                        self.expect_punct(';')?;
                        let offset = size;
                        size += member_ty.size_of();
                        members.push(Member { name: member_name, ty: member_ty, offset });
                    }
                    let ty = Rc::new(Type::Struct { name: name.clone(), members, size });
                    self.struct_types.insert(name, ty.clone());
                    Ok(ty)
                } else {
                    self.struct_types
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| self.err_here(format!("struct {name} is not declared")))
                }
            }
        }
    }

    /// `pointer = "*"*`
    pub(crate) fn pointer(&mut self, mut ty: Rc<Type>) -> Result<Rc<Type>, Diagnostic> {
        while self.eat_punct('*') {
            ty = Type::new_pointer(ty);
        }
        Ok(ty)
    }

    /// `type_suffix = ( "[" num "]" )*`, wrapped right-to-left so
    /// `int a[2][3]` becomes `Array(Array(Int, 3), 2)`.
    pub(crate) fn type_suffix(&mut self, ty: Rc<Type>) -> Result<Rc<Type>, Diagnostic> {
        if self.eat_punct('[') {
            let len = self.expect_num("expected an array length")?;
            self.expect_punct(']')?;
            let inner = self.type_suffix(ty)?;
            Ok(Type::new_array(inner, len as usize))
        } else {
            Ok(ty)
        }
    }

    /// Evaluates a `sizeof` operand as a bare type name, when one appears
    /// instead of an expression (`sizeof(int)`, `sizeof(struct Foo *)`).
    pub(crate) fn looking_at_type(&self) -> bool {
        matches!(self.cur().kind, TokenKind::Type(_))
    }

    /// Constant-folds a global initializer element: an integer literal
    /// (optionally negated), the address of another global, or a string
    /// literal (emitted as a reference to its `.LC<i>` label).
    pub(crate) fn const_global_init(&mut self, node: &Node) -> Result<cminic_ast::GInitElement, Diagnostic> {
        match &node.kind {
            NodeKind::Num(v) => Ok(cminic_ast::GInitElement::Num(*v)),
            NodeKind::Addr(inner) => match &inner.kind {
                NodeKind::Var(cminic_ast::VarRef::Global(id)) => {
                    Ok(cminic_ast::GInitElement::Symbol(self.program.globals.get(*id).name.clone()))
                }
                _ => Err(Diagnostic::new(node.span, "global initializer must take the address of a global")),
            },
            NodeKind::StrLiteral(id) => Ok(cminic_ast::GInitElement::Symbol(format!(".LC{}", id.idx()))),
            _ => Err(Diagnostic::new(node.span, "global initializer is not a compile-time constant")),
        }
    }
}
