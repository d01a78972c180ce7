//! Symbol tables for the Glint IR.
//!
//! Tables form a parent chain mirroring lexical scope. Entries are kept in
//! insertion order so that emission and diagnostics are deterministic. A
//! table also records the array types it has taken ownership of: an array
//! type instance belongs to exactly one table, so copying an array-typed
//! entity into another scope requires re-parenting a fresh type instance.

use indexmap::IndexMap;
use la_arena::Idx;

use super::nodes::{FunctionId, Program, VarId};
use super::types::TypeId;

/// Type-safe index into the symbol-table arena.
pub type SymbolTableId = Idx<SymbolTable>;

/// A symbol-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Variable(VarId),
    Function(FunctionId),
    Type(TypeId),
}

/// An ordered mapping from name to symbol, with a parent pointer.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub parent: Option<SymbolTableId>,
    symbols: IndexMap<String, Symbol>,
    owned_types: Vec<TypeId>,
}

impl SymbolTable {
    pub fn new(parent: Option<SymbolTableId>) -> Self {
        SymbolTable {
            parent,
            symbols: IndexMap::new(),
            owned_types: Vec::new(),
        }
    }

    /// Looks up a name in this table only (no parent chain).
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Installs a symbol. Shadowing a same-name entry replaces it; callers
    /// that must reject duplicates check `contains` first.
    pub fn insert(&mut self, name: String, symbol: Symbol) {
        self.symbols.insert(name, symbol);
    }

    /// Records this table as the unique owner of an array type instance.
    pub fn take_ownership_of_type(&mut self, ty: TypeId) {
        self.owned_types.push(ty);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.symbols.iter().map(|(name, sym)| (name.as_str(), sym))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Program {
    /// Resolves a name through the lexical chain starting at `table`.
    pub fn lookup(&self, table: SymbolTableId, name: &str) -> Option<Symbol> {
        let mut current = Some(table);
        while let Some(id) = current {
            let table = &self.symbol_tables[id];
            if let Some(&symbol) = table.get(name) {
                return Some(symbol);
            }
            current = table.parent;
        }
        None
    }

    /// Creates a child table under `parent`.
    pub fn child_table(&mut self, parent: SymbolTableId) -> SymbolTableId {
        self.symbol_tables.alloc(SymbolTable::new(Some(parent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Modifiers;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut program = Program::new();
        let root = program.root_symbols;
        let inner = program.child_table(root);

        let int = program.context.int_type;
        let var = program
            .define_local(root, "x", int, Modifiers::empty())
            .expect("defining x failed");

        assert_eq!(program.lookup(inner, "x"), Some(Symbol::Variable(var)));
        assert_eq!(program.lookup(inner, "y"), None);
    }

    #[test]
    fn test_shadowing_resolves_to_innermost() {
        let mut program = Program::new();
        let root = program.root_symbols;
        let inner = program.child_table(root);

        let outer_var = program
            .define_local(root, "v", program.context.int_type, Modifiers::empty())
            .expect("defining outer v failed");
        let inner_var = program
            .define_local(inner, "v", program.context.float_type, Modifiers::empty())
            .expect("defining inner v failed");

        assert_eq!(program.lookup(inner, "v"), Some(Symbol::Variable(inner_var)));
        assert_eq!(program.lookup(root, "v"), Some(Symbol::Variable(outer_var)));
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut program = Program::new();
        let root = program.root_symbols;
        for name in ["c", "a", "b"] {
            program
                .define_local(root, name, program.context.int_type, Modifiers::empty())
                .expect("defining variable failed");
        }
        let names: Vec<&str> = program.symbol_tables[root]
            .entries()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
