//! Expression grammar: `expr` down through `primary`, plus the `++`/`--`
//! desugaring and struct member resolution that live at `unary`/`postfix`.

use cminic_ast::{Node, NodeKind, VarRef};
use cminic_lexer::TokenKind;
use cminic_session::{Diagnostic, Span};
use cminic_utils::idx::Idx;

use crate::constructors as c;
use crate::Parser;

impl<'a> Parser<'a> {
    /// `expr = declaration | assign`
    pub(crate) fn expr(&mut self) -> Result<Node, Diagnostic> {
        if self.looking_at_type() {
            self.declaration_as_expr()
        } else {
            self.assign()
        }
    }

    /// `assign = logical ( "=" assign | ("+="|"-="|"*="|"/="|"%=") logical )?`
    pub(crate) fn assign(&mut self) -> Result<Node, Diagnostic> {
        let node = self.ternary()?;
        let span = node.span;
        if self.eat_punct('=') {
            let rhs = self.assign()?;
            self.check_lvalue(&node)?;
            return c::new_assign(node, rhs, span);
        }
        for (kind, build) in [
            (TokenKind::AddEq, c::new_add as fn(Node, Node, Span) -> Result<Node, Diagnostic>),
            (TokenKind::SubEq, c::new_sub),
            (TokenKind::MulEq, c::new_mul),
            (TokenKind::DivEq, c::new_div),
            (TokenKind::ModEq, c::new_mod),
        ] {
            if self.eat_kind(&kind) {
                self.check_lvalue(&node)?;
                let rhs = self.ternary()?;
                let combined = build(node.clone(), rhs, span)?;
                return c::new_assign(node, combined, span);
            }
        }
        Ok(node)
    }

    /// Enrichment beyond the original grammar (ternary is in the node
    /// set the code generator already supports): `a ? b : c`.
    pub(crate) fn ternary(&mut self) -> Result<Node, Diagnostic> {
        let cond = self.logical_expression()?;
        if self.eat_punct('?') {
            let span = cond.span;
            let then = self.expr()?;
            self.expect_punct(':')?;
            let els = self.ternary()?;
            let ty = then.ty.clone();
            return Ok(Node::new(
                NodeKind::Ternary { cond: Box::new(cond), then: Box::new(then), els: Box::new(els) },
                span,
                ty,
            ));
        }
        Ok(cond)
    }

    /// `logical = equality ( ("&&"|"||") equality )*` — both operators
    /// share a precedence level, matching the loop the source compiler
    /// uses for both.
    pub(crate) fn logical_expression(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.bit_or()?;
        loop {
            let span = node.span;
            if self.eat_kind(&TokenKind::LogicalAnd) {
                node = c::new_logical_and(node, self.bit_or()?, span);
            } else if self.eat_kind(&TokenKind::LogicalOr) {
                node = c::new_logical_or(node, self.bit_or()?, span);
            } else {
                return Ok(node);
            }
        }
    }

    /// Enrichment: bitwise `|`/`^`/`&` slotted between `logical` and
    /// `equality`, the positions the code generator's `ND_OR`/`ND_XOR`/
    /// `ND_AND` imply but the distilled grammar never wired a parse path to.
    pub(crate) fn bit_or(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.bit_xor()?;
        while self.at_punct('|') && self.peek_nth(1).kind != TokenKind::Punct('|') {
            let span = node.span;
            self.bump();
            node = c::new_bit_or(node, self.bit_xor()?, span)?;
        }
        Ok(node)
    }

    pub(crate) fn bit_xor(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.bit_and()?;
        while self.eat_punct('^') {
            let span = node.span;
            node = c::new_bit_xor(node, self.bit_and()?, span)?;
        }
        Ok(node)
    }

    pub(crate) fn bit_and(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.equality()?;
        while self.at_punct('&') && self.peek_nth(1).kind != TokenKind::Punct('&') {
            let span = node.span;
            self.bump();
            node = c::new_bit_and(node, self.equality()?, span)?;
        }
        Ok(node)
    }

    /// `equality = relational ( ("=="|"!=") relational )*`
    pub(crate) fn equality(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.relational()?;
        loop {
            let span = node.span;
            if self.eat_kind(&TokenKind::Eq) {
                node = c::new_eq(node, self.relational()?, span);
            } else if self.eat_kind(&TokenKind::Ne) {
                node = c::new_ne(node, self.relational()?, span);
            } else {
                return Ok(node);
            }
        }
    }

    /// `relational = shift ( ("<"|"<="|">"|">=") shift )*`
    pub(crate) fn relational(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.shift()?;
        loop {
            let span = node.span;
            if self.eat_punct('<') {
                node = c::new_lt(node, self.shift()?, span);
            } else if self.eat_kind(&TokenKind::Le) {
                node = c::new_le(node, self.shift()?, span);
            } else if self.eat_punct('>') {
                node = c::new_lt(self.shift()?, node, span);
            } else if self.eat_kind(&TokenKind::Ge) {
                node = c::new_le(self.shift()?, node, span);
            } else {
                return Ok(node);
            }
        }
    }

    /// Enrichment: `<<`/`>>` between `relational` and `add`.
    pub(crate) fn shift(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.add()?;
        loop {
            let span = node.span;
            if self.at_punct('<') && self.peek_nth(1).kind == TokenKind::Punct('<') {
                self.bump();
                self.bump();
                node = c::new_lshift(node, self.add()?, span)?;
            } else if self.at_punct('>') && self.peek_nth(1).kind == TokenKind::Punct('>') {
                self.bump();
                self.bump();
                node = c::new_rshift(node, self.add()?, span)?;
            } else {
                return Ok(node);
            }
        }
    }

    /// `add = mul ( ("+"|"-") mul )*`
    pub(crate) fn add(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.mul()?;
        loop {
            let span = node.span;
            if self.eat_punct('+') {
                node = c::new_add(node, self.mul()?, span)?;
            } else if self.eat_punct('-') {
                node = c::new_sub(node, self.mul()?, span)?;
            } else {
                return Ok(node);
            }
        }
    }

    /// `mul = unary ( ("*"|"/"|"%") unary )*`
    pub(crate) fn mul(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.unary()?;
        loop {
            let span = node.span;
            if self.eat_punct('*') {
                node = c::new_mul(node, self.unary()?, span)?;
            } else if self.eat_punct('/') {
                node = c::new_div(node, self.unary()?, span)?;
            } else if self.eat_punct('%') {
                node = c::new_mod(node, self.unary()?, span)?;
            } else {
                return Ok(node);
            }
        }
    }

    /// `unary = ("+"|"-"|"*"|"&"|"!"|"~"|"sizeof"|"++"|"--") unary? | postfix ("++"|"--")?`
    pub(crate) fn unary(&mut self) -> Result<Node, Diagnostic> {
        let span = self.cur().span;
        if self.at_punct('(') && matches!(self.peek_nth(1).kind, TokenKind::Type(_)) {
            self.bump();
            let ty = self.type_specifier()?;
            let ty = self.pointer(ty)?;
            self.expect_punct(')')?;
            let inner = self.unary()?;
            return Ok(c::new_cast(inner, ty, span));
        }
        if self.eat_punct('+') {
            return self.postfix();
        }
        if self.eat_punct('-') {
            return c::new_sub(c::num(0, span), self.postfix()?, span);
        }
        if self.eat_punct('*') {
            let inner = self.unary()?;
            return c::new_deref(inner, span);
        }
        if self.eat_punct('&') {
            let inner = self.postfix()?;
            return Ok(c::new_addr(inner, span));
        }
        if self.eat_punct('!') {
            let inner = self.unary()?;
            return Ok(c::new_logical_not(inner, span));
        }
        if self.eat_punct('~') {
            let inner = self.unary()?;
            return c::new_bit_not(inner, span);
        }
        if self.eat_kind(&TokenKind::Sizeof) {
            let val = if self.looking_at_type() {
                let ty = self.type_specifier()?;
                let ty = self.pointer(ty)?;
                ty.size_of() as i64
            } else {
                self.unary()?.ty.size_of() as i64
            };
            return Ok(c::num(val, span));
        }
        if self.eat_kind(&TokenKind::Inc) {
            let node = self.postfix()?;
            self.check_lvalue(&node)?;
            let incremented = c::new_add(node.clone(), c::num(1, span), span)?;
            return c::new_assign(node, incremented, span);
        }
        if self.eat_kind(&TokenKind::Dec) {
            let node = self.postfix()?;
            self.check_lvalue(&node)?;
            let decremented = c::new_sub(node.clone(), c::num(1, span), span)?;
            return c::new_assign(node, decremented, span);
        }

        let node = self.postfix()?;
        if self.eat_kind(&TokenKind::Inc) {
            self.check_lvalue(&node)?;
            let bumped = c::new_add(node.clone(), c::num(1, span), span)?;
            let saved = c::new_assign(node, bumped, span)?;
            return c::new_sub(saved, c::num(1, span), span);
        }
        if self.eat_kind(&TokenKind::Dec) {
            self.check_lvalue(&node)?;
            let bumped = c::new_sub(node.clone(), c::num(1, span), span)?;
            let saved = c::new_assign(node, bumped, span)?;
            return c::new_add(saved, c::num(1, span), span);
        }
        Ok(node)
    }

    /// An lvalue is a `Var`, a `Deref`, a `StructMember`, or the pointer
    /// arithmetic node produced while lowering `a[i]` — `Add`/`Sub` chains
    /// that themselves terminate in one of those.
    pub(crate) fn check_lvalue(&self, node: &Node) -> Result<(), Diagnostic> {
        fn is_lvalue(n: &Node) -> bool {
            matches!(
                n.kind,
                NodeKind::Var(_) | NodeKind::Deref(_) | NodeKind::StructMember { .. }
            )
        }
        if is_lvalue(node) {
            Ok(())
        } else {
            Err(self.err_at(node.span, "expression is not assignable"))
        }
    }

    /// `postfix = primary ( "[" expr "]" | "." ident | "->" ident )*`
    pub(crate) fn postfix(&mut self) -> Result<Node, Diagnostic> {
        let mut node = self.primary()?;
        loop {
            let span = node.span;
            if self.eat_kind(&TokenKind::Arrow) {
                node = c::new_deref(node, span)?;
                node = self.struct_member(node, span)?;
                continue;
            }
            if self.eat_punct('.') {
                node = self.struct_member(node, span)?;
                continue;
            }
            if self.eat_punct('[') {
                let index = self.expr()?;
                self.expect_punct(']')?;
                let addr = c::new_add(node, index, span)?;
                node = c::new_deref(addr, span)?;
                continue;
            }
            break;
        }
        Ok(node)
    }

    /// `a.m`: look up `m` by name in the struct registered for `a`'s type
    /// and produce a `StructMember` carrying the resolved byte offset.
    fn struct_member(&mut self, base: Node, span: Span) -> Result<Node, Diagnostic> {
        let name = self.expect_ident("expected a struct member name")?;
        let struct_name = match base.ty.as_ref() {
            cminic_types::Type::Struct { name, .. } => name.clone(),
            _ => return Err(self.err_at(span, "member access on a non-struct type")),
        };
        let struct_ty = self
            .struct_types
            .get(&struct_name)
            .cloned()
            .ok_or_else(|| self.err_at(span, format!("struct {struct_name} is not declared")))?;
        let member = match struct_ty.as_ref() {
            cminic_types::Type::Struct { members, .. } => {
                members.iter().find(|m| m.name == name).cloned()
            }
            _ => None,
        };
        let member = member.ok_or_else(|| {
            self.err_at(span, format!("struct {struct_name} has no member named {name}"))
        })?;
        Ok(Node::new(
            NodeKind::StructMember { base: Box::new(base), offset: member.offset },
            span,
            member.ty,
        ))
    }

    /// `funcall = "(" (expr ("," expr)*)? ")"`
    fn funcall(&mut self, name: String, span: Span) -> Result<Node, Diagnostic> {
        self.expect_punct('(')?;
        let mut args = Vec::new();
        while !self.eat_punct(')') {
            if !args.is_empty() {
                self.expect_punct(',')?;
            }
            args.push(self.expr()?);
        }
        let ret_ty = self
            .program
            .funcs
            .find(&name)
            .map(|id| self.program.funcs.get(id).ret_type.clone())
            .unwrap_or_else(|| std::rc::Rc::new(cminic_types::Type::Int));
        Ok(Node::new(NodeKind::Call { name, args, ret_ty: ret_ty.clone() }, span, ret_ty))
    }

    /// `primary = "(" expr ")" | num | string | ident ( "(" args? ")" )?`
    pub(crate) fn primary(&mut self) -> Result<Node, Diagnostic> {
        let span = self.cur().span;

        if self.eat_punct('(') {
            let node = self.expr()?;
            self.expect_punct(')')?;
            return Ok(node);
        }

        if let TokenKind::Ident(name) = self.cur().kind.clone() {
            self.bump();
            if self.at_punct('(') {
                return self.funcall(name, span);
            }
            return self.lookup_var(&name, span);
        }

        if let TokenKind::Str(_, idx) = self.cur().kind.clone() {
            self.bump();
            let ty = cminic_types::Type::new_pointer(std::rc::Rc::new(cminic_types::Type::Char));
            return Ok(Node::new(NodeKind::StrLiteral(cminic_ast::StrId::new(idx)), span, ty));
        }

        if let TokenKind::Num(v) = self.cur().kind {
            self.bump();
            return Ok(c::num(v, span));
        }

        if self.at_eof() {
            return Err(self.err_here("unexpected end of input"));
        }
        Err(self.err_here("expected an expression"))
    }

    /// `get_node_ident`: locals shadow globals.
    pub(crate) fn lookup_var(&self, name: &str, span: Span) -> Result<Node, Diagnostic> {
        if let Some(scope) = &self.func {
            if let Some(id) = scope.locals.find(name) {
                let ty = scope.locals.get(id).ty.clone();
                return Ok(Node::new(NodeKind::Var(VarRef::Local(id)), span, ty));
            }
        }
        if let Some(id) = self.program.globals.find(name) {
            let ty = self.program.globals.get(id).ty.clone();
            return Ok(Node::new(NodeKind::Var(VarRef::Global(id)), span, ty));
        }
        Err(self.err_at(span, format!("'{name}' is not declared")))
    }
}

/// Structural lowering properties from spec.md §8: array subscript vs.
/// pointer-arithmetic equivalence (property 4), prefix/postfix desugaring
/// (property 5), and pointee-size scaling (property 6). These parse a full
/// `main` body and compare the shape of the resulting nodes rather than
/// their generated assembly, since the AST is where the properties actually
/// live (codegen just walks whatever shape the parser already produced).
#[cfg(test)]
mod lowering_tests {
    use cminic_ast::{Node, NodeKind, VarRef};
    use cminic_utils::idx::Idx;

    fn main_body(stmts: &str) -> Vec<Node> {
        let src = format!("int main() {{ {stmts} }}");
        let (tokens, strings) = cminic_lexer::tokenize(&src).unwrap();
        let program = crate::parse(&tokens, strings).unwrap();
        let id = program.funcs.find("main").unwrap();
        program.funcs.get(id).body.clone()
    }

    /// A span-insensitive rendering of a node's shape, deep enough to cover
    /// the arithmetic/assignment/control nodes these tests exercise.
    fn shape(n: &Node) -> String {
        use NodeKind::*;
        match &n.kind {
            Num(v) => format!("Num({v})"),
            Var(VarRef::Local(id)) => format!("VarL({})", id.idx()),
            Var(VarRef::Global(id)) => format!("VarG({})", id.idx()),
            Add(l, r) => format!("Add({},{})", shape(l), shape(r)),
            Sub(l, r) => format!("Sub({},{})", shape(l), shape(r)),
            Mul(l, r) => format!("Mul({},{})", shape(l), shape(r)),
            Deref(x) => format!("Deref({})", shape(x)),
            Assign(l, r) => format!("Assign({},{})", shape(l), shape(r)),
            Return(Some(x)) => format!("Return({})", shape(x)),
            other => format!("{other:?}"),
        }
    }

    #[test]
    fn array_subscript_matches_pointer_arithmetic_deref() {
        let subscript = main_body("int a[3]; return a[1];");
        let pointer_arith = main_body("int a[3]; return *(a+1);");
        assert_eq!(shape(&subscript[1]), shape(&pointer_arith[1]));
    }

    #[test]
    fn postfix_increment_yields_original_value_then_increments() {
        let body = main_body("int x=3; int y=x++;");
        assert_eq!(
            shape(&body[1]),
            "Assign(VarL(1),Sub(Assign(VarL(0),Add(VarL(0),Num(1))),Num(1)))"
        );
    }

    #[test]
    fn prefix_increment_yields_incremented_value() {
        let body = main_body("int x=3; int y=++x;");
        assert_eq!(
            shape(&body[1]),
            "Assign(VarL(1),Assign(VarL(0),Add(VarL(0),Num(1))))"
        );
    }

    #[test]
    fn pointer_scaling_uses_the_pointee_size() {
        let int_ptr = main_body("int *p; return p+1;");
        assert_eq!(shape(&int_ptr[1]), "Return(Add(Mul(Num(1),Num(4)),VarL(0)))");

        let char_ptr = main_body("char *q; return q+1;");
        assert_eq!(shape(&char_ptr[1]), "Return(Add(Mul(Num(1),Num(1)),VarL(0)))");
    }
}
