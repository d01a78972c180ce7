//! Generic IR traversal.
//!
//! The walk uses the early-exit protocol: a visitor method returning `true`
//! aborts the traversal and propagates `true` to the caller. Overriding
//! `visit_statement`/`visit_expression` and delegating back to the `walk_*`
//! functions yields a recursive traversal with custom behavior at selected
//! node kinds.

use super::nodes::{ExprId, ExprKind, Program, StmtId, StmtKind};

/// An IR visitor. Both methods default to a full recursive walk.
pub trait Visitor {
    fn visit_expression(&mut self, program: &Program, expr: ExprId) -> bool {
        walk_expression(self, program, expr)
    }

    fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
        walk_statement(self, program, stmt)
    }
}

/// Recurses into an expression's children. Returns `true` as soon as any
/// child visit does.
pub fn walk_expression<V: Visitor + ?Sized>(
    visitor: &mut V,
    program: &Program,
    expr: ExprId,
) -> bool {
    match &program.exprs[expr].kind {
        // Leaf expressions.
        ExprKind::BoolLiteral(_)
        | ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::NullLiteral
        | ExprKind::VariableReference { .. }
        | ExprKind::FieldAccess { .. }
        | ExprKind::ExternalValue { .. }
        | ExprKind::FunctionReference { .. }
        | ExprKind::TypeReference { .. }
        | ExprKind::Setting { .. } => false,
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expression(program, *left) || visitor.visit_expression(program, *right)
        }
        ExprKind::Constructor { arguments }
        | ExprKind::FunctionCall { arguments, .. }
        | ExprKind::ExternalFunctionCall { arguments, .. } => arguments
            .iter()
            .any(|&arg| visitor.visit_expression(program, arg)),
        ExprKind::Index { base, index } => {
            visitor.visit_expression(program, *base) || visitor.visit_expression(program, *index)
        }
        ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } => {
            visitor.visit_expression(program, *operand)
        }
        ExprKind::Swizzle { base, .. } => visitor.visit_expression(program, *base),
        ExprKind::Ternary {
            test,
            if_true,
            if_false,
        } => {
            visitor.visit_expression(program, *test)
                || visitor.visit_expression(program, *if_true)
                || visitor.visit_expression(program, *if_false)
        }
    }
}

/// Recurses into a statement's children. Returns `true` as soon as any
/// child visit does.
pub fn walk_statement<V: Visitor + ?Sized>(
    visitor: &mut V,
    program: &Program,
    stmt: StmtId,
) -> bool {
    match &program.stmts[stmt].kind {
        // Leaf statements.
        StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Discard
        | StmtKind::InlineMarker { .. }
        | StmtKind::Nop => false,
        StmtKind::Block { statements, .. } => statements
            .iter()
            .any(|&child| visitor.visit_statement(program, child)),
        StmtKind::Do { body, test } => {
            visitor.visit_expression(program, *test) || visitor.visit_statement(program, *body)
        }
        StmtKind::Expression { expression } => visitor.visit_expression(program, *expression),
        StmtKind::For {
            initializer,
            test,
            next,
            body,
            ..
        } => {
            initializer.is_some_and(|init| visitor.visit_statement(program, init))
                || test.is_some_and(|test| visitor.visit_expression(program, test))
                || next.is_some_and(|next| visitor.visit_expression(program, next))
                || visitor.visit_statement(program, *body)
        }
        StmtKind::If {
            test,
            if_true,
            if_false,
        } => {
            visitor.visit_expression(program, *test)
                || visitor.visit_statement(program, *if_true)
                || if_false.is_some_and(|stmt| visitor.visit_statement(program, stmt))
        }
        StmtKind::Return { expression } => {
            expression.is_some_and(|expr| visitor.visit_expression(program, expr))
        }
        StmtKind::Switch { value, cases, .. } => {
            visitor.visit_expression(program, *value)
                || cases
                    .iter()
                    .any(|&case| visitor.visit_statement(program, case))
        }
        StmtKind::SwitchCase { value, statements } => {
            value.is_some_and(|value| visitor.visit_expression(program, value))
                || statements
                    .iter()
                    .any(|&child| visitor.visit_statement(program, child))
        }
        StmtKind::VarDeclaration { sizes, value, .. } => {
            sizes
                .iter()
                .any(|size| size.is_some_and(|size| visitor.visit_expression(program, size)))
                || value.is_some_and(|value| visitor.visit_expression(program, value))
        }
        StmtKind::VarDeclarations { declarations, .. } => declarations
            .iter()
            .any(|&decl| visitor.visit_statement(program, decl)),
        StmtKind::While { test, body } => {
            visitor.visit_expression(program, *test) || visitor.visit_statement(program, *body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::nodes::BinaryOp;

    struct IntLiteralCollector {
        values: Vec<i64>,
    }

    impl Visitor for IntLiteralCollector {
        fn visit_expression(&mut self, program: &Program, expr: ExprId) -> bool {
            if let ExprKind::IntLiteral(v) = program.exprs[expr].kind {
                self.values.push(v);
            }
            walk_expression(self, program, expr)
        }
    }

    struct StopAtFirstReturn {
        seen: usize,
    }

    impl Visitor for StopAtFirstReturn {
        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            if matches!(program.stmts[stmt].kind, StmtKind::Return { .. }) {
                self.seen += 1;
                return true;
            }
            walk_statement(self, program, stmt)
        }
    }

    #[test]
    fn test_walk_reaches_nested_expressions() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let one = program.int_literal(0, 1);
        let two = program.int_literal(0, 2);
        let three = program.int_literal(0, 3);
        let sum = program.binary(0, one, BinaryOp::Add, two, int);
        let product = program.binary(0, sum, BinaryOp::Mul, three, int);
        let stmt = program.expr_stmt(product);

        let mut collector = IntLiteralCollector { values: Vec::new() };
        collector.visit_statement(&program, stmt);
        assert_eq!(collector.values, vec![1, 2, 3]);
    }

    #[test]
    fn test_early_exit_stops_the_walk() {
        let mut program = Program::new();
        let first = program.return_stmt(0, None);
        let second = program.return_stmt(1, None);
        let block = program.block(0, vec![first, second], None, true);

        let mut visitor = StopAtFirstReturn { seen: 0 };
        assert!(visitor.visit_statement(&program, block));
        assert_eq!(visitor.seen, 1);
    }
}
