//! `Var` and `Function` symbol records, and the tables that own them.

use std::collections::HashMap;
use std::rc::Rc;

use cminic_types::Type;
use cminic_utils::index_vec::IdxVec;

use crate::ids::{FuncId, GlobalId, LocalId, StrId};
use crate::node::Node;

/// A single named variable: a local, a parameter, or a global.
///
/// `offset` is only meaningful for locals/parameters (the byte offset of
/// the variable's last byte below `rbp`, per `new_lvar`'s running total —
/// see [`LocalTable::push`] for why this is *not* aligned to the
/// variable's own size, matching the source compiler's quirk rather than
/// fixing it).
#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub ty: Rc<Type>,
    pub offset: usize,
    pub is_extern: bool,
    /// Compile-time initializer elements, globals only. Empty means
    /// `.zero size` (a plain declaration); `extern` globals are never
    /// emitted at all regardless of this list.
    pub ginit: Vec<GInitElement>,
}

/// One element of a global's compile-time initializer, written out as a
/// `.quad`/`.long`/`.value`/`.byte` directive (`Num`, sized by the
/// variable's base element size) or a `.quad <symbol>` (`Symbol`, for
/// `&other_global` / string-literal initializers).
#[derive(Debug, Clone)]
pub enum GInitElement {
    Num(i64),
    Symbol(String),
}

impl Var {
    fn plain(name: String, ty: Rc<Type>, offset: usize) -> Self {
        Var { name, ty, offset, is_extern: false, ginit: Vec::new() }
    }
}

/// A function's local variable table. Declaration order is preserved (it
/// drives the running `offset` total), and names resolve to the most
/// recently declared shadowing match, exactly like walking the original
/// compiler's `locals` list head-first.
#[derive(Debug, Default)]
pub struct LocalTable {
    vars: IdxVec<LocalId, Var>,
    by_name: HashMap<String, Vec<LocalId>>,
    next_offset: usize,
}

impl LocalTable {
    pub fn new() -> Self {
        LocalTable::default()
    }

    /// Declares a new local, or parameter, bumping the running stack
    /// offset by the size of its type. Mirrors `new_lvar`'s
    /// `locals->offset + sizeOfType(type)`.
    pub fn push(&mut self, name: String, ty: Rc<Type>) -> LocalId {
        self.next_offset += ty.size_of();
        let offset = self.next_offset;
        let id = self.vars.push(Var::plain(name.clone(), ty, offset));
        self.by_name.entry(name).or_default().push(id);
        id
    }

    /// `find_var(tok, false)`: most recently declared local with this name.
    pub fn find(&self, name: &str) -> Option<LocalId> {
        self.by_name.get(name).and_then(|ids| ids.last().copied())
    }

    pub fn get(&self, id: LocalId) -> &Var {
        &self.vars[id]
    }

    pub fn get_mut(&mut self, id: LocalId) -> &mut Var {
        &mut self.vars[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalId, &Var)> {
        self.vars.iter_enumerated()
    }

    /// The stack frame size a function needs: the highest offset reached.
    /// Not rounded to 16 bytes here — `rsp` alignment at `call` sites is
    /// handled separately, at the call, not at frame allocation.
    pub fn frame_size(&self) -> usize {
        self.next_offset
    }

    /// Reserves the 136-byte `__builtin_va_list` + register save area for a
    /// variadic function and returns the offset (below `rbp`) of its first
    /// byte, i.e. the running total after the reservation.
    pub fn reserve_va_area(&mut self) -> usize {
        self.next_offset += 136;
        self.next_offset
    }
}

/// The program-wide table of global variables.
#[derive(Debug, Default)]
pub struct GlobalTable {
    vars: IdxVec<GlobalId, Var>,
    by_name: HashMap<String, GlobalId>,
}

impl GlobalTable {
    pub fn new() -> Self {
        GlobalTable::default()
    }

    pub fn push(&mut self, name: String, ty: Rc<Type>) -> GlobalId {
        let id = self.vars.push(Var::plain(name.clone(), ty, 0));
        self.by_name.insert(name, id);
        id
    }

    pub fn find(&self, name: &str) -> Option<GlobalId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: GlobalId) -> &Var {
        &self.vars[id]
    }

    pub fn get_mut(&mut self, id: GlobalId) -> &mut Var {
        &mut self.vars[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (GlobalId, &Var)> {
        self.vars.iter_enumerated()
    }
}

/// The program-wide table of string literals; `StrId` is the `.LC<id>`
/// suffix used when emitting it.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: IdxVec<StrId, String>,
}

impl StringTable {
    pub fn new() -> Self {
        StringTable::default()
    }

    pub fn intern(&mut self, s: String) -> StrId {
        self.strings.push(s)
    }

    pub fn get(&self, id: StrId) -> &str {
        &self.strings[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrId, &String)> {
        self.strings.iter_enumerated()
    }
}

/// A defined or declared function. `is_prototype` functions are dropped
/// before emission (see the code generator's prototype-elimination pass).
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<LocalId>,
    pub locals: LocalTable,
    pub body: Vec<Node>,
    pub ret_type: Rc<Type>,
    pub is_prototype: bool,
    pub is_variadic: bool,
    /// Offset (below `rbp`) of the byte one past the end of the reserved
    /// 136-byte varargs save area, set only for variadic functions.
    pub va_area_offset: Option<usize>,
}

impl Function {
    pub fn stack_size(&self) -> usize {
        self.locals.frame_size()
    }
}

/// The program-wide function table.
#[derive(Debug, Default)]
pub struct FuncTable {
    funcs: IdxVec<FuncId, Function>,
    by_name: HashMap<String, FuncId>,
}

impl FuncTable {
    pub fn new() -> Self {
        FuncTable::default()
    }

    pub fn push(&mut self, func: Function) -> FuncId {
        let name = func.name.clone();
        let id = self.funcs.push(func);
        self.by_name.insert(name, id);
        id
    }

    pub fn find(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: FuncId) -> &Function {
        &self.funcs[id]
    }

    pub fn get_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs.iter_enumerated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_offsets_accumulate_in_declaration_order() {
        let mut locals = LocalTable::new();
        let a = locals.push("a".into(), Rc::new(Type::Int));
        let b = locals.push("b".into(), Rc::new(Type::Char));
        assert_eq!(locals.get(a).offset, 4);
        assert_eq!(locals.get(b).offset, 5);
    }

    #[test]
    fn find_resolves_to_most_recent_shadowing_declaration() {
        let mut locals = LocalTable::new();
        locals.push("x".into(), Rc::new(Type::Int));
        let shadow = locals.push("x".into(), Rc::new(Type::Char));
        assert_eq!(locals.find("x"), Some(shadow));
    }
}
