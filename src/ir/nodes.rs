//! IR node definitions for Glint.
//!
//! The tree is flattened into typed arenas owned by [`Program`]; nodes refer
//! to their children through ids. An id doubles as a *slot*: replacing the
//! content stored at an id rewrites the tree in place while every other id
//! stays valid. That property is what lets the inliner record call sites
//! during one traversal and rewrite them afterwards.

use std::mem;
use std::sync::atomic::AtomicU32;

use la_arena::{Arena, Idx};
use smallvec::SmallVec;

use super::symbols::{SymbolTable, SymbolTableId};
use super::types::{
    Context, Modifiers, ScalarKind, Type, TypeId, TypeKind, VariableStorage,
};

/// Type-safe index into the expression arena.
pub type ExprId = Idx<Expression>;

/// Type-safe index into the statement arena.
pub type StmtId = Idx<Statement>;

/// Type-safe index into the variable arena.
pub type VarId = Idx<Variable>;

/// Type-safe index into the function-declaration arena.
pub type FunctionId = Idx<FunctionDeclaration>;

/// An expression node. Every expression carries its source offset and a
/// resolved type.
#[derive(Debug, Clone)]
pub struct Expression {
    pub offset: u32,
    pub ty: TypeId,
    pub kind: ExprKind,
}

/// The closed set of expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    BoolLiteral(bool),
    IntLiteral(i64),
    FloatLiteral(f64),
    NullLiteral,
    VariableReference {
        var: VarId,
        ref_kind: RefKind,
    },
    FieldAccess {
        base: ExprId,
        field_index: usize,
    },
    Index {
        base: ExprId,
        index: ExprId,
    },
    Swizzle {
        base: ExprId,
        components: SmallVec<[SwizzleComponent; 4]>,
    },
    Constructor {
        arguments: Vec<ExprId>,
    },
    Prefix {
        op: UnaryOp,
        operand: ExprId,
    },
    Postfix {
        operand: ExprId,
        op: UnaryOp,
    },
    Binary {
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
    },
    Ternary {
        test: ExprId,
        if_true: ExprId,
        if_false: ExprId,
    },
    FunctionCall {
        function: FunctionId,
        arguments: Vec<ExprId>,
    },
    ExternalFunctionCall {
        name: String,
        arguments: Vec<ExprId>,
    },
    ExternalValue {
        name: String,
    },
    FunctionReference {
        function: FunctionId,
    },
    TypeReference {
        referenced: TypeId,
    },
    /// A build-time scalar resolved during code generation.
    Setting {
        name: String,
    },
}

/// How a variable reference uses its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Read,
    Write,
    ReadWrite,
}

/// One lane of a swizzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwizzleComponent {
    X,
    Y,
    Z,
    W,
}

impl SwizzleComponent {
    pub fn letter(self) -> char {
        match self {
            SwizzleComponent::X => 'x',
            SwizzleComponent::Y => 'y',
            SwizzleComponent::Z => 'z',
            SwizzleComponent::W => 'w',
        }
    }
}

/// Unary operators, usable in prefix or postfix position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    Increment,
    Decrement,
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    /// `&&` and `||` elide evaluation of their right operand.
    pub fn is_short_circuiting(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Statement {
    pub offset: u32,
    pub kind: StmtKind,
}

/// The closed set of statement variants.
#[derive(Debug, Clone)]
pub enum StmtKind {
    Block {
        statements: Vec<StmtId>,
        symbols: Option<SymbolTableId>,
        /// True iff the block introduces a lexical scope. Scopeless blocks
        /// are invisible to textual emitters.
        is_scope: bool,
    },
    Expression {
        expression: ExprId,
    },
    VarDeclaration {
        var: VarId,
        sizes: Vec<Option<ExprId>>,
        value: Option<ExprId>,
    },
    /// A typed group of variable declarations (`int x = 1, y;`).
    VarDeclarations {
        base_type: TypeId,
        declarations: Vec<StmtId>,
    },
    If {
        test: ExprId,
        if_true: StmtId,
        if_false: Option<StmtId>,
    },
    For {
        initializer: Option<StmtId>,
        test: Option<ExprId>,
        next: Option<ExprId>,
        body: StmtId,
        symbols: Option<SymbolTableId>,
    },
    While {
        test: ExprId,
        body: StmtId,
    },
    Do {
        body: StmtId,
        test: ExprId,
    },
    Switch {
        value: ExprId,
        cases: Vec<StmtId>,
        symbols: Option<SymbolTableId>,
    },
    /// A case label and its statements; `value` is absent for `default:`.
    SwitchCase {
        value: Option<ExprId>,
        statements: Vec<StmtId>,
    },
    Return {
        expression: Option<ExprId>,
    },
    Break,
    Continue,
    Discard,
    /// Semantic no-op recording an inlined callee, emitted at each inlined
    /// call site. Also how recursion through already-inlined bodies is
    /// detected.
    InlineMarker {
        function: FunctionId,
    },
    Nop,
}

/// A declared variable. Owned by the symbol table that declares it.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: TypeId,
    pub modifiers: Modifiers,
    pub storage: VariableStorage,
    pub initial_value: Option<ExprId>,
}

/// A function declaration. The `call_count` is maintained by the upstream
/// parser (here, the construction API) and only ever loaded by passes.
#[derive(Debug)]
pub struct FunctionDeclaration {
    pub name: String,
    pub return_type: TypeId,
    pub parameters: Vec<VarId>,
    pub modifiers: Modifiers,
    /// Body block, once a definition has been attached. `None` for builtin
    /// and forward declarations.
    pub definition: Option<StmtId>,
    pub call_count: AtomicU32,
}

/// A function definition: a declaration plus its body block.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDefinition {
    pub declaration: FunctionId,
    pub body: StmtId,
}

/// Top-level program elements. Only function definitions carry code the
/// inliner operates on.
#[derive(Debug, Clone, Copy)]
pub enum ProgramElement {
    Function(FunctionDefinition),
    GlobalVar { declaration: StmtId },
    InterfaceBlock { var: VarId },
}

/// A whole program: the arenas, the ordered program elements, and the root
/// symbol table.
#[derive(Debug)]
pub struct Program {
    pub exprs: Arena<Expression>,
    pub stmts: Arena<Statement>,
    pub vars: Arena<Variable>,
    pub types: Arena<Type>,
    pub functions: Arena<FunctionDeclaration>,
    pub symbol_tables: Arena<SymbolTable>,
    pub elements: Vec<ProgramElement>,
    pub root_symbols: SymbolTableId,
    pub context: Context,
}

impl Program {
    /// Creates an empty program with the builtin types installed.
    pub fn new() -> Self {
        let mut types = Arena::default();
        let void_type = types.alloc(Type::new("void", TypeKind::Void));
        let bool_type = types.alloc(Type::new("bool", TypeKind::Scalar(ScalarKind::Bool)));
        let int_type = types.alloc(Type::new("int", TypeKind::Scalar(ScalarKind::Int)));
        let float_type = types.alloc(Type::new("float", TypeKind::Scalar(ScalarKind::Float)));
        let int_literal_type =
            types.alloc(Type::new("$intLiteral", TypeKind::Scalar(ScalarKind::Int)));
        let float_literal_type =
            types.alloc(Type::new("$floatLiteral", TypeKind::Scalar(ScalarKind::Float)));

        let mut symbol_tables = Arena::default();
        let root_symbols = symbol_tables.alloc(SymbolTable::new(None));

        Program {
            exprs: Arena::default(),
            stmts: Arena::default(),
            vars: Arena::default(),
            types,
            functions: Arena::default(),
            symbol_tables,
            elements: Vec::new(),
            root_symbols,
            context: Context {
                void_type,
                bool_type,
                int_type,
                float_type,
                int_literal_type,
                float_literal_type,
            },
        }
    }

    /// Allocates an expression node.
    pub fn alloc_expr(&mut self, offset: u32, ty: TypeId, kind: ExprKind) -> ExprId {
        self.exprs.alloc(Expression { offset, ty, kind })
    }

    /// Allocates a statement node.
    pub fn alloc_stmt(&mut self, offset: u32, kind: StmtKind) -> StmtId {
        self.stmts.alloc(Statement { offset, kind })
    }

    /// Moves a statement out of its slot, leaving a nop behind.
    pub fn take_stmt(&mut self, id: StmtId) -> Statement {
        let offset = self.stmts[id].offset;
        mem::replace(
            &mut self.stmts[id],
            Statement {
                offset,
                kind: StmtKind::Nop,
            },
        )
    }

    /// Overwrites the statement stored in a slot.
    pub fn set_stmt(&mut self, id: StmtId, stmt: Statement) {
        self.stmts[id] = stmt;
    }

    /// Moves an expression out of its slot, leaving a `false` literal behind.
    pub fn take_expr(&mut self, id: ExprId) -> Expression {
        let offset = self.exprs[id].offset;
        let bool_type = self.context.bool_type;
        mem::replace(
            &mut self.exprs[id],
            Expression {
                offset,
                ty: bool_type,
                kind: ExprKind::BoolLiteral(false),
            },
        )
    }

    /// Overwrites the expression stored in a slot.
    pub fn set_expr(&mut self, id: ExprId, expr: Expression) {
        self.exprs[id] = expr;
    }

    /// Deep-copies an expression tree, preserving offsets, types and
    /// reference roles.
    pub fn clone_expr(&mut self, expr: ExprId) -> ExprId {
        let Expression { offset, ty, kind } = self.exprs[expr].clone();
        let kind = match kind {
            ExprKind::BoolLiteral(_)
            | ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::NullLiteral
            | ExprKind::VariableReference { .. }
            | ExprKind::ExternalValue { .. }
            | ExprKind::FunctionReference { .. }
            | ExprKind::TypeReference { .. }
            | ExprKind::Setting { .. } => kind,
            ExprKind::FieldAccess { base, field_index } => ExprKind::FieldAccess {
                base: self.clone_expr(base),
                field_index,
            },
            ExprKind::Index { base, index } => ExprKind::Index {
                base: self.clone_expr(base),
                index: self.clone_expr(index),
            },
            ExprKind::Swizzle { base, components } => ExprKind::Swizzle {
                base: self.clone_expr(base),
                components,
            },
            ExprKind::Constructor { arguments } => ExprKind::Constructor {
                arguments: arguments.iter().map(|&a| self.clone_expr(a)).collect(),
            },
            ExprKind::Prefix { op, operand } => ExprKind::Prefix {
                op,
                operand: self.clone_expr(operand),
            },
            ExprKind::Postfix { operand, op } => ExprKind::Postfix {
                operand: self.clone_expr(operand),
                op,
            },
            ExprKind::Binary { left, op, right } => ExprKind::Binary {
                left: self.clone_expr(left),
                op,
                right: self.clone_expr(right),
            },
            ExprKind::Ternary {
                test,
                if_true,
                if_false,
            } => ExprKind::Ternary {
                test: self.clone_expr(test),
                if_true: self.clone_expr(if_true),
                if_false: self.clone_expr(if_false),
            },
            ExprKind::FunctionCall {
                function,
                arguments,
            } => ExprKind::FunctionCall {
                function,
                arguments: arguments.iter().map(|&a| self.clone_expr(a)).collect(),
            },
            ExprKind::ExternalFunctionCall { name, arguments } => {
                ExprKind::ExternalFunctionCall {
                    name,
                    arguments: arguments.iter().map(|&a| self.clone_expr(a)).collect(),
                }
            }
        };
        self.exprs.alloc(Expression { offset, ty, kind })
    }

    /// The function definitions in program order.
    pub fn function_definitions(&self) -> impl Iterator<Item = FunctionDefinition> + '_ {
        self.elements.iter().filter_map(|element| match element {
            ProgramElement::Function(def) => Some(*def),
            _ => None,
        })
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_replacement_keeps_ids_stable() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let one = program.alloc_expr(0, int, ExprKind::IntLiteral(1));
        let stmt = program.alloc_stmt(0, StmtKind::Expression { expression: one });

        let taken = program.take_stmt(stmt);
        assert!(matches!(taken.kind, StmtKind::Expression { .. }));
        assert!(matches!(program.stmts[stmt].kind, StmtKind::Nop));

        program.set_stmt(stmt, taken);
        assert!(matches!(
            program.stmts[stmt].kind,
            StmtKind::Expression { .. }
        ));
    }

    #[test]
    fn test_clone_expr_is_deep() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let two = program.alloc_expr(7, int, ExprKind::IntLiteral(2));
        let three = program.alloc_expr(7, int, ExprKind::IntLiteral(3));
        let sum = program.alloc_expr(
            7,
            int,
            ExprKind::Binary {
                left: two,
                op: BinaryOp::Add,
                right: three,
            },
        );

        let copy = program.clone_expr(sum);
        assert_ne!(copy, sum);
        let ExprKind::Binary { left, right, .. } = program.exprs[copy].kind else {
            panic!("clone changed the expression shape");
        };
        assert_ne!(left, two);
        assert_ne!(right, three);
        assert_eq!(program.exprs[copy].offset, 7);
    }

    #[test]
    fn test_take_expr_leaves_placeholder() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let lit = program.alloc_expr(3, int, ExprKind::IntLiteral(9));
        let taken = program.take_expr(lit);
        assert!(matches!(taken.kind, ExprKind::IntLiteral(9)));
        assert!(matches!(
            program.exprs[lit].kind,
            ExprKind::BoolLiteral(false)
        ));
    }
}
