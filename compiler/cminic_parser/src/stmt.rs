//! Statements, declarations, function definitions, and the top-level
//! `program` loop that tells a function definition apart from a global
//! declaration by peeking one token past the declarator.

use std::rc::Rc;

use cminic_ast::{Function, Node, NodeKind, VarRef};
use cminic_lexer::{LexType, TokenKind};
use cminic_session::Diagnostic;
use cminic_types::Type;

use crate::constructors as c;
use crate::{FuncScope, Parser};

impl<'a> Parser<'a> {
    /// True when the type specifier sitting at the cursor is a struct tag
    /// immediately followed by a `{` — a struct-body declaration, as
    /// opposed to a bare reference to an already-declared struct type.
    fn struct_has_body_here(&self) -> bool {
        matches!(self.cur().kind, TokenKind::Type(LexType::Struct(_)))
            && matches!(self.peek_nth(2).kind, TokenKind::Punct('{'))
    }

    /// `program = ( declaration_global | func_define )*`
    pub(crate) fn parse_program(&mut self) -> Result<(), Diagnostic> {
        while !self.at_eof() {
            if self.struct_has_body_here() {
                // A top-level `struct Foo { ... };` declares only the type.
                self.type_specifier()?;
                self.expect_punct(';')?;
                continue;
            }
            let ty = self.type_specifier()?;
            let ty = self.pointer(ty)?;
            if self.peek_nth(1).kind == TokenKind::Punct('(') {
                self.func_define(ty)?;
            } else {
                self.declaration_global(ty)?;
            }
        }
        Ok(())
    }

    /// `declaration_global = declaration ";"`
    fn declaration_global(&mut self, ty: Rc<Type>) -> Result<(), Diagnostic> {
        self.declaration(ty, true)?;
        self.expect_punct(';')?;
        Ok(())
    }

    /// One declarator: `pointer ident type_suffix ( "=" initialize )?`
    fn declaration_var(&mut self, mut ty: Rc<Type>, is_global: bool) -> Result<Node, Diagnostic> {
        ty = self.pointer(ty)?;
        let span = self.cur().span;
        let name = self.expect_ident("expected a declarator name")?;

        if is_global {
            if self.program.globals.find(&name).is_some() {
                return Err(self.err_at(span, format!("'{name}' is already declared")));
            }
            if self.at_punct('[') {
                ty = self.type_suffix(ty)?;
            }
            let id = self.program.globals.push(name, ty.clone());
            let node = Node::new(NodeKind::Var(VarRef::Global(id)), span, ty);
            if self.eat_punct('=') {
                let init = self.initialize()?;
                let elem = self.const_global_init(&init)?;
                self.program.globals.get_mut(id).ginit.push(elem);
            }
            return Ok(node);
        }

        let scope = self.func.as_mut().expect("declaration_var: local outside a function");
        if scope.locals.find(&name).is_some() {
            return Err(self.err_at(span, format!("'{name}' is already declared")));
        }
        if self.at_punct('[') {
            ty = self.type_suffix(ty)?;
        }
        let id = scope.locals.push(name, ty.clone());
        let node = Node::new(NodeKind::Var(VarRef::Local(id)), span, ty);
        if self.eat_punct('=') {
            let init = self.initialize()?;
            return c::new_assign(node, init, span);
        }
        Ok(node)
    }

    /// `initialize = assign` (array-initializer lists are a declared
    /// non-goal, matching the upstream `TODO` this was never finished from).
    fn initialize(&mut self) -> Result<Node, Diagnostic> {
        self.assign()
    }

    /// `declaration = declaration_var ("," declaration_var)*`, flattened
    /// into a `Suger` node when more than one declarator is present.
    fn declaration(&mut self, ty: Rc<Type>, is_global: bool) -> Result<Node, Diagnostic> {
        let span = self.cur().span;
        let first = self.declaration_var(ty.clone(), is_global)?;
        if !self.at_punct(',') {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(',') {
            items.push(self.declaration_var(ty.clone(), is_global)?);
        }
        Ok(Node::new(NodeKind::Suger(items), span, Rc::new(Type::Int)))
    }

    /// `expr`'s declaration branch: a local declaration appearing where an
    /// expression is expected (only reachable inside a `compound_stmt`, via
    /// `stmt`'s fallthrough to `expr`). A struct-with-body declares only the
    /// type and introduces no variable, matching `struct Foo { ... };` being
    /// unable to also declare a variable in the same statement.
    pub(crate) fn declaration_as_expr(&mut self) -> Result<Node, Diagnostic> {
        let span = self.cur().span;
        if self.struct_has_body_here() {
            self.type_specifier()?;
            return Ok(Node::new(NodeKind::Null, span, Rc::new(Type::Int)));
        }
        let ty = self.type_specifier()?;
        self.declaration(ty, false)
    }

    /// `declaration_param = type_specifier pointer ident type_suffix`.
    /// Array parameters decay to pointer-to-element.
    fn declaration_param(&mut self) -> Result<(String, Rc<Type>), Diagnostic> {
        let ty = self.type_specifier()?;
        let mut ty = self.pointer(ty)?;
        let name = self.expect_ident("expected a parameter name")?;
        if self.at_punct('[') {
            ty = self.type_suffix(ty)?;
        }
        if let Type::Array { of, .. } = ty.as_ref() {
            ty = Type::new_pointer(of.clone());
        }
        Ok((name, ty))
    }

    /// `func_define = type_specifier pointer ident "(" params? ")" compound_stmt`
    fn func_define(&mut self, ret_type: Rc<Type>) -> Result<(), Diagnostic> {
        let span = self.cur().span;
        let name = self.expect_ident("expected a function name")?;
        self.expect_punct('(')?;

        let mut locals = cminic_ast::LocalTable::new();
        let mut params = Vec::new();
        let mut is_variadic = false;
        while !self.eat_punct(')') {
            if !params.is_empty() {
                self.expect_punct(',')?;
            }
            if self.eat_punct('.') {
                // `...`: the lexer emits three separate `.` punctuation
                // tokens since ellipsis has no dedicated token kind.
                self.expect_punct('.')?;
                self.expect_punct('.')?;
                is_variadic = true;
                continue;
            }
            let (pname, pty) = self.declaration_param()?;
            let id = locals.push(pname, pty);
            params.push(id);
        }

        let is_prototype = self.eat_punct(';');
        if is_prototype {
            self.program.funcs.push(Function {
                name,
                params,
                locals,
                body: Vec::new(),
                ret_type,
                is_prototype: true,
                is_variadic,
                va_area_offset: None,
            });
            return Ok(());
        }

        let va_area_offset = if is_variadic { Some(locals.reserve_va_area()) } else { None };

        self.func = Some(FuncScope { locals, ret_type: ret_type.clone(), is_variadic, loop_depth: 0 });
        let body = self.compound_stmt()?;
        let scope = self.func.take().expect("func scope set above");

        let body_items = match body.kind {
            NodeKind::Block(items) => items,
            _ => return Err(self.err_at(span, "function body must be a block")),
        };

        self.program.funcs.push(Function {
            name,
            params,
            locals: scope.locals,
            body: body_items,
            ret_type,
            is_prototype: false,
            is_variadic,
            va_area_offset,
        });
        Ok(())
    }

    /// `compound_stmt = "{" stmt* "}"`. Flattens `Suger` children and turns
    /// variable-only declarators into `Null` (declarations alone emit no
    /// code; assignment-initializers remain as `Assign` nodes).
    pub(crate) fn compound_stmt(&mut self) -> Result<Node, Diagnostic> {
        let span = self.cur().span;
        self.expect_punct('{')?;
        let mut stmts = Vec::new();
        while !self.eat_punct('}') {
            let n = self.stmt()?;
            self.push_flattened(&mut stmts, n);
        }
        Ok(Node::new(NodeKind::Block(stmts), span, Rc::new(Type::Int)))
    }

    fn push_flattened(&self, out: &mut Vec<Node>, node: Node) {
        match node.kind {
            NodeKind::Suger(items) => {
                for item in items {
                    self.push_flattened(out, item);
                }
            }
            NodeKind::Var(_) => {
                out.push(Node::new(NodeKind::Null, node.span, node.ty));
            }
            other => out.push(Node::new(other, node.span, node.ty)),
        }
    }

    /// ```text
    /// stmt = "return" expr? ";" | if | while | for | break ";" | continue ";"
    ///      | compound_stmt | ";" | expr ";"
    /// ```
    pub(crate) fn stmt(&mut self) -> Result<Node, Diagnostic> {
        let span = self.cur().span;

        if self.eat_kind(&TokenKind::Return) {
            return self.return_stmt(span);
        }
        if self.eat_kind(&TokenKind::If) {
            self.expect_punct('(')?;
            let cond = self.expr()?;
            self.expect_punct(')')?;
            let then = Box::new(self.stmt()?);
            let els = if self.eat_kind(&TokenKind::Else) {
                Some(Box::new(self.stmt()?))
            } else {
                None
            };
            return Ok(Node::new(NodeKind::If { cond: Box::new(cond), then, els }, span, Rc::new(Type::Int)));
        }
        if self.eat_kind(&TokenKind::While) {
            self.expect_punct('(')?;
            let cond = self.expr()?;
            self.expect_punct(')')?;
            self.enter_loop();
            let body = self.stmt()?;
            self.exit_loop();
            return Ok(Node::new(
                NodeKind::While { cond: Box::new(cond), body: Box::new(body) },
                span,
                Rc::new(Type::Int),
            ));
        }
        if self.eat_kind(&TokenKind::For) {
            self.expect_punct('(')?;
            let init = if !self.eat_punct(';') {
                let e = self.expr()?;
                self.expect_punct(';')?;
                Some(Box::new(e))
            } else {
                None
            };
            let cond = if !self.eat_punct(';') {
                let e = self.expr()?;
                self.expect_punct(';')?;
                Some(Box::new(e))
            } else {
                None
            };
            let inc = if !self.eat_punct(')') {
                let e = self.expr()?;
                self.expect_punct(')')?;
                Some(Box::new(e))
            } else {
                None
            };
            self.enter_loop();
            let body = Box::new(self.stmt()?);
            self.exit_loop();
            return Ok(Node::new(NodeKind::For { init, cond, inc, body }, span, Rc::new(Type::Int)));
        }
        if self.at_punct('{') {
            return self.compound_stmt();
        }
        if self.eat_kind(&TokenKind::Break) {
            self.require_loop("break")?;
            self.expect_punct(';')?;
            return Ok(Node::new(NodeKind::Break, span, Rc::new(Type::Int)));
        }
        if self.eat_kind(&TokenKind::Continue) {
            self.require_loop("continue")?;
            self.expect_punct(';')?;
            return Ok(Node::new(NodeKind::Continue, span, Rc::new(Type::Int)));
        }
        if self.eat_punct(';') {
            return Ok(Node::new(NodeKind::Block(Vec::new()), span, Rc::new(Type::Int)));
        }

        let node = self.expr()?;
        self.expect_punct(';')?;
        Ok(node)
    }

    fn return_stmt(&mut self, span: cminic_session::Span) -> Result<Node, Diagnostic> {
        if self.eat_punct(';') {
            return Ok(Node::new(NodeKind::Return(Some(Box::new(c::num(0, span)))), span, Rc::new(Type::Int)));
        }
        let value = self.expr()?;
        let ret_type = self
            .func
            .as_ref()
            .expect("return outside a function")
            .ret_type
            .clone();
        if !value.ty.can_cast_to(&ret_type) {
            return Err(self.err_at(span, "return value cannot be cast to the function's return type"));
        }
        self.expect_punct(';')?;
        // A void function's return value is still evaluated for its side
        // effects; the code generator is the one that discards the result
        // (it never moves it into rax) — not a bug, see `cminic_codegen`.
        Ok(Node::new(NodeKind::Return(Some(Box::new(value))), span, Rc::new(Type::Int)))
    }

    fn enter_loop(&mut self) {
        if let Some(scope) = &mut self.func {
            scope.loop_depth += 1;
        }
    }

    fn exit_loop(&mut self) {
        if let Some(scope) = &mut self.func {
            scope.loop_depth -= 1;
        }
    }

    fn require_loop(&self, what: &str) -> Result<(), Diagnostic> {
        let in_loop = self.func.as_ref().map(|s| s.loop_depth > 0).unwrap_or(false);
        if in_loop {
            Ok(())
        } else {
            Err(self.err_here(format!("{what} used outside a loop")))
        }
    }
}
