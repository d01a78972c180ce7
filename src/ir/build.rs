//! Construction API for the Glint IR.
//!
//! This is the surface an upstream parser or IR generator targets: it
//! installs symbols into the right tables, keeps function call counts
//! current, and rejects malformed programs (duplicate names, arity
//! mismatches) before a tree ever reaches the passes.

use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;

use super::nodes::{
    BinaryOp, ExprId, ExprKind, FunctionDeclaration, FunctionDefinition, FunctionId, Program,
    ProgramElement, RefKind, StmtId, StmtKind, SwizzleComponent, UnaryOp, VarId, Variable,
};
use super::symbols::{Symbol, SymbolTableId};
use super::types::{Field, Modifiers, Type, TypeId, TypeKind, VariableStorage};
use crate::{GlintError, Result};

impl Program {
    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Interns an array type. The caller decides which symbol table owns it.
    pub fn define_array_type(&mut self, component: TypeId, size: Option<usize>) -> TypeId {
        let name = match size {
            Some(n) => format!("{}[{}]", self.types[component].name, n),
            None => format!("{}[]", self.types[component].name),
        };
        self.types.alloc(Type::new(name, TypeKind::Array { component, size }))
    }

    /// Interns a vector type such as `float4`.
    pub fn define_vector_type(&mut self, component: TypeId, columns: u8) -> TypeId {
        let name = format!("{}{}", self.types[component].name, columns);
        self.types
            .alloc(Type::new(name, TypeKind::Vector { component, columns }))
    }

    /// Interns a struct type and installs it in the root table.
    pub fn define_struct_type(&mut self, name: &str, fields: Vec<Field>) -> Result<TypeId> {
        if self.symbol_tables[self.root_symbols].contains(name) {
            return Err(GlintError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        let ty = self
            .types
            .alloc(Type::new(name, TypeKind::Struct { fields }));
        self.symbol_tables[self.root_symbols].insert(name.to_string(), Symbol::Type(ty));
        Ok(ty)
    }

    // ------------------------------------------------------------------
    // Variables and functions
    // ------------------------------------------------------------------

    /// Declares a variable in `table`. Duplicate names within one table are
    /// rejected; shadowing an outer scope is fine.
    pub fn define_variable(
        &mut self,
        table: SymbolTableId,
        name: &str,
        ty: TypeId,
        modifiers: Modifiers,
        storage: VariableStorage,
    ) -> Result<VarId> {
        if self.symbol_tables[table].contains(name) {
            return Err(GlintError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        let var = self.vars.alloc(Variable {
            name: name.to_string(),
            ty,
            modifiers,
            storage,
            initial_value: None,
        });
        self.symbol_tables[table].insert(name.to_string(), Symbol::Variable(var));
        Ok(var)
    }

    pub fn define_local(
        &mut self,
        table: SymbolTableId,
        name: &str,
        ty: TypeId,
        modifiers: Modifiers,
    ) -> Result<VarId> {
        self.define_variable(table, name, ty, modifiers, VariableStorage::Local)
    }

    pub fn define_parameter(
        &mut self,
        table: SymbolTableId,
        name: &str,
        ty: TypeId,
        modifiers: Modifiers,
    ) -> Result<VarId> {
        self.define_variable(table, name, ty, modifiers, VariableStorage::Parameter)
    }

    pub fn define_global(
        &mut self,
        name: &str,
        ty: TypeId,
        modifiers: Modifiers,
    ) -> Result<VarId> {
        self.define_variable(
            self.root_symbols,
            name,
            ty,
            modifiers,
            VariableStorage::Global,
        )
    }

    /// Declares a function in the root table. The declaration starts out
    /// definition-less (builtin/forward); attach a body separately.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: TypeId,
        parameters: Vec<VarId>,
        modifiers: Modifiers,
    ) -> Result<FunctionId> {
        if self.symbol_tables[self.root_symbols].contains(name) {
            return Err(GlintError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        let function = self.functions.alloc(FunctionDeclaration {
            name: name.to_string(),
            return_type,
            parameters,
            modifiers,
            definition: None,
            call_count: AtomicU32::new(0),
        });
        self.symbol_tables[self.root_symbols].insert(name.to_string(), Symbol::Function(function));
        Ok(function)
    }

    /// Attaches a body block to a declaration and appends the definition to
    /// the program elements.
    pub fn define_function_body(&mut self, function: FunctionId, body: StmtId) -> Result<()> {
        let decl = &mut self.functions[function];
        if decl.definition.is_some() {
            return Err(GlintError::DuplicateDefinition {
                name: decl.name.clone(),
            });
        }
        decl.definition = Some(body);
        self.elements.push(ProgramElement::Function(FunctionDefinition {
            declaration: function,
            body,
        }));
        Ok(())
    }

    /// Appends a global variable declaration element.
    pub fn append_global_var(&mut self, declaration: StmtId) {
        self.elements.push(ProgramElement::GlobalVar { declaration });
    }

    /// Appends an interface block element.
    pub fn append_interface_block(&mut self, var: VarId) {
        self.elements.push(ProgramElement::InterfaceBlock { var });
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn bool_literal(&mut self, offset: u32, value: bool) -> ExprId {
        let ty = self.context.bool_type;
        self.alloc_expr(offset, ty, ExprKind::BoolLiteral(value))
    }

    pub fn int_literal(&mut self, offset: u32, value: i64) -> ExprId {
        let ty = self.context.int_type;
        self.alloc_expr(offset, ty, ExprKind::IntLiteral(value))
    }

    pub fn float_literal(&mut self, offset: u32, value: f64) -> ExprId {
        let ty = self.context.float_type;
        self.alloc_expr(offset, ty, ExprKind::FloatLiteral(value))
    }

    pub fn var_ref(&mut self, offset: u32, var: VarId, ref_kind: RefKind) -> ExprId {
        let ty = self.vars[var].ty;
        self.alloc_expr(offset, ty, ExprKind::VariableReference { var, ref_kind })
    }

    pub fn field_access(&mut self, offset: u32, base: ExprId, field_index: usize) -> ExprId {
        let base_ty = self.exprs[base].ty;
        let ty = match &self.types[base_ty].kind {
            TypeKind::Struct { fields } => fields[field_index].ty,
            _ => base_ty,
        };
        self.alloc_expr(offset, ty, ExprKind::FieldAccess { base, field_index })
    }

    pub fn index(&mut self, offset: u32, base: ExprId, index: ExprId) -> ExprId {
        let base_ty = self.exprs[base].ty;
        let ty = match self.types[base_ty].kind {
            TypeKind::Array { component, .. } | TypeKind::Vector { component, .. } => component,
            _ => base_ty,
        };
        self.alloc_expr(offset, ty, ExprKind::Index { base, index })
    }

    pub fn swizzle(
        &mut self,
        offset: u32,
        base: ExprId,
        components: &[SwizzleComponent],
        ty: TypeId,
    ) -> ExprId {
        let components: SmallVec<[SwizzleComponent; 4]> = components.iter().copied().collect();
        self.alloc_expr(offset, ty, ExprKind::Swizzle { base, components })
    }

    pub fn constructor(&mut self, offset: u32, ty: TypeId, arguments: Vec<ExprId>) -> ExprId {
        self.alloc_expr(offset, ty, ExprKind::Constructor { arguments })
    }

    pub fn prefix(&mut self, offset: u32, op: UnaryOp, operand: ExprId) -> ExprId {
        let ty = self.exprs[operand].ty;
        self.alloc_expr(offset, ty, ExprKind::Prefix { op, operand })
    }

    pub fn postfix(&mut self, offset: u32, operand: ExprId, op: UnaryOp) -> ExprId {
        let ty = self.exprs[operand].ty;
        self.alloc_expr(offset, ty, ExprKind::Postfix { operand, op })
    }

    pub fn binary(
        &mut self,
        offset: u32,
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
        ty: TypeId,
    ) -> ExprId {
        self.alloc_expr(offset, ty, ExprKind::Binary { left, op, right })
    }

    pub fn ternary(
        &mut self,
        offset: u32,
        test: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    ) -> ExprId {
        let ty = self.exprs[if_true].ty;
        self.alloc_expr(
            offset,
            ty,
            ExprKind::Ternary {
                test,
                if_true,
                if_false,
            },
        )
    }

    /// Builds a call to a declared function and bumps its call count.
    pub fn call(
        &mut self,
        offset: u32,
        function: FunctionId,
        arguments: Vec<ExprId>,
    ) -> Result<ExprId> {
        let decl = &self.functions[function];
        if decl.parameters.len() != arguments.len() {
            return Err(GlintError::ArityMismatch {
                name: decl.name.clone(),
                expected: decl.parameters.len(),
                got: arguments.len(),
            });
        }
        let ty = decl.return_type;
        decl.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.alloc_expr(
            offset,
            ty,
            ExprKind::FunctionCall {
                function,
                arguments,
            },
        ))
    }

    pub fn external_call(
        &mut self,
        offset: u32,
        name: &str,
        ty: TypeId,
        arguments: Vec<ExprId>,
    ) -> ExprId {
        self.alloc_expr(
            offset,
            ty,
            ExprKind::ExternalFunctionCall {
                name: name.to_string(),
                arguments,
            },
        )
    }

    pub fn setting(&mut self, offset: u32, name: &str, ty: TypeId) -> ExprId {
        self.alloc_expr(
            offset,
            ty,
            ExprKind::Setting {
                name: name.to_string(),
            },
        )
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn block(
        &mut self,
        offset: u32,
        statements: Vec<StmtId>,
        symbols: Option<SymbolTableId>,
        is_scope: bool,
    ) -> StmtId {
        self.alloc_stmt(
            offset,
            StmtKind::Block {
                statements,
                symbols,
                is_scope,
            },
        )
    }

    pub fn expr_stmt(&mut self, expression: ExprId) -> StmtId {
        let offset = self.exprs[expression].offset;
        self.alloc_stmt(offset, StmtKind::Expression { expression })
    }

    /// A single variable declaration wrapped in its typed group, the shape
    /// the parser emits for `int x = e;`.
    pub fn var_decl_stmt(&mut self, offset: u32, var: VarId, value: Option<ExprId>) -> StmtId {
        self.vars[var].initial_value = value;
        let base_type = self.vars[var].ty;
        let decl = self.alloc_stmt(
            offset,
            StmtKind::VarDeclaration {
                var,
                sizes: Vec::new(),
                value,
            },
        );
        self.alloc_stmt(
            offset,
            StmtKind::VarDeclarations {
                base_type,
                declarations: vec![decl],
            },
        )
    }

    pub fn if_stmt(
        &mut self,
        offset: u32,
        test: ExprId,
        if_true: StmtId,
        if_false: Option<StmtId>,
    ) -> StmtId {
        self.alloc_stmt(
            offset,
            StmtKind::If {
                test,
                if_true,
                if_false,
            },
        )
    }

    pub fn for_stmt(
        &mut self,
        offset: u32,
        initializer: Option<StmtId>,
        test: Option<ExprId>,
        next: Option<ExprId>,
        body: StmtId,
        symbols: Option<SymbolTableId>,
    ) -> StmtId {
        self.alloc_stmt(
            offset,
            StmtKind::For {
                initializer,
                test,
                next,
                body,
                symbols,
            },
        )
    }

    pub fn while_stmt(&mut self, offset: u32, test: ExprId, body: StmtId) -> StmtId {
        self.alloc_stmt(offset, StmtKind::While { test, body })
    }

    pub fn do_stmt(&mut self, offset: u32, body: StmtId, test: ExprId) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Do { body, test })
    }

    pub fn switch_stmt(
        &mut self,
        offset: u32,
        value: ExprId,
        cases: Vec<StmtId>,
        symbols: Option<SymbolTableId>,
    ) -> StmtId {
        self.alloc_stmt(
            offset,
            StmtKind::Switch {
                value,
                cases,
                symbols,
            },
        )
    }

    pub fn switch_case(
        &mut self,
        offset: u32,
        value: Option<ExprId>,
        statements: Vec<StmtId>,
    ) -> StmtId {
        self.alloc_stmt(offset, StmtKind::SwitchCase { value, statements })
    }

    pub fn return_stmt(&mut self, offset: u32, expression: Option<ExprId>) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Return { expression })
    }

    pub fn break_stmt(&mut self, offset: u32) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Break)
    }

    pub fn continue_stmt(&mut self, offset: u32) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Continue)
    }

    pub fn discard_stmt(&mut self, offset: u32) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Discard)
    }

    pub fn nop(&mut self, offset: u32) -> StmtId {
        self.alloc_stmt(offset, StmtKind::Nop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_symbol_is_rejected() {
        let mut program = Program::new();
        let root = program.root_symbols;
        let int = program.context.int_type;
        program
            .define_local(root, "x", int, Modifiers::empty())
            .expect("first definition failed");
        let err = program
            .define_local(root, "x", int, Modifiers::empty())
            .expect_err("duplicate definition was accepted");
        assert!(matches!(err, GlintError::DuplicateSymbol { .. }));
    }

    #[test]
    fn test_call_bumps_call_count() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let f = program
            .declare_function("f", int, vec![], Modifiers::empty())
            .expect("declaring f failed");
        assert_eq!(program.functions[f].call_count.load(Ordering::Relaxed), 0);

        program.call(0, f, vec![]).expect("building call failed");
        program.call(1, f, vec![]).expect("building call failed");
        assert_eq!(program.functions[f].call_count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_call_arity_is_checked() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let fn_symbols = program.child_table(program.root_symbols);
        let p = program
            .define_parameter(fn_symbols, "a", int, Modifiers::empty())
            .expect("defining parameter failed");
        let f = program
            .declare_function("g", int, vec![p], Modifiers::empty())
            .expect("declaring g failed");

        let err = program.call(0, f, vec![]).expect_err("bad arity accepted");
        assert!(matches!(err, GlintError::ArityMismatch { expected: 1, got: 0, .. }));
    }

    #[test]
    fn test_double_definition_is_rejected() {
        let mut program = Program::new();
        let void = program.context.void_type;
        let f = program
            .declare_function("f", void, vec![], Modifiers::empty())
            .expect("declaring f failed");
        let body_a = program.block(0, vec![], None, true);
        let body_b = program.block(0, vec![], None, true);
        program
            .define_function_body(f, body_a)
            .expect("first body failed");
        let err = program
            .define_function_body(f, body_b)
            .expect_err("second body was accepted");
        assert!(matches!(err, GlintError::DuplicateDefinition { .. }));
    }
}
