//! Compact source rendering of IR nodes.
//!
//! Used by debug logging and by tests asserting on the shape of rewritten
//! trees. Statements render on one line; blocks honor the `is_scope` flag
//! (a scopeless block emits its children bare).

use super::nodes::{ExprId, ExprKind, Program, StmtId, StmtKind};
use super::types::TypeKind;

/// Renders an expression.
pub fn expression(program: &Program, expr: ExprId) -> String {
    let node = &program.exprs[expr];
    match &node.kind {
        ExprKind::BoolLiteral(v) => v.to_string(),
        ExprKind::IntLiteral(v) => v.to_string(),
        ExprKind::FloatLiteral(v) => format!("{:?}", v),
        ExprKind::NullLiteral => "null".to_string(),
        ExprKind::VariableReference { var, .. } => program.vars[*var].name.clone(),
        ExprKind::FieldAccess { base, field_index } => {
            let base_ty = program.exprs[*base].ty;
            let field = match &program.types[base_ty].kind {
                TypeKind::Struct { fields } => fields[*field_index].name.clone(),
                _ => format!("<field {}>", field_index),
            };
            format!("{}.{}", expression(program, *base), field)
        }
        ExprKind::Index { base, index } => format!(
            "{}[{}]",
            expression(program, *base),
            expression(program, *index)
        ),
        ExprKind::Swizzle { base, components } => {
            let lanes: String = components.iter().map(|c| c.letter()).collect();
            format!("{}.{}", expression(program, *base), lanes)
        }
        ExprKind::Constructor { arguments } => format!(
            "{}({})",
            program.types[node.ty].name,
            comma_separated(program, arguments)
        ),
        ExprKind::Prefix { op, operand } => {
            format!("{}{}", op.token(), expression(program, *operand))
        }
        ExprKind::Postfix { operand, op } => {
            format!("{}{}", expression(program, *operand), op.token())
        }
        ExprKind::Binary { left, op, right } => format!(
            "({} {} {})",
            expression(program, *left),
            op.token(),
            expression(program, *right)
        ),
        ExprKind::Ternary {
            test,
            if_true,
            if_false,
        } => format!(
            "({} ? {} : {})",
            expression(program, *test),
            expression(program, *if_true),
            expression(program, *if_false)
        ),
        ExprKind::FunctionCall {
            function,
            arguments,
        } => format!(
            "{}({})",
            program.functions[*function].name,
            comma_separated(program, arguments)
        ),
        ExprKind::ExternalFunctionCall { name, arguments } => {
            format!("{}({})", name, comma_separated(program, arguments))
        }
        ExprKind::ExternalValue { name } => name.clone(),
        ExprKind::FunctionReference { function } => program.functions[*function].name.clone(),
        ExprKind::TypeReference { referenced } => program.types[*referenced].name.clone(),
        ExprKind::Setting { name } => name.clone(),
    }
}

/// Renders a statement.
pub fn statement(program: &Program, stmt: StmtId) -> String {
    match &program.stmts[stmt].kind {
        StmtKind::Block {
            statements,
            is_scope,
            ..
        } => {
            let inner = statements
                .iter()
                .map(|&child| statement(program, child))
                .collect::<Vec<_>>()
                .join(" ");
            if *is_scope {
                if inner.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", inner)
                }
            } else {
                inner
            }
        }
        StmtKind::Expression { expression: expr } => {
            format!("{};", expression(program, *expr))
        }
        StmtKind::VarDeclaration { var, sizes, value } => {
            let v = &program.vars[*var];
            let mut out = format!(
                "{}{} {}",
                v.modifiers.description(),
                program.types[v.ty].name,
                v.name
            );
            for size in sizes {
                match size {
                    Some(size) => out.push_str(&format!("[{}]", expression(program, *size))),
                    None => out.push_str("[]"),
                }
            }
            if let Some(value) = value {
                out.push_str(&format!(" = {}", expression(program, *value)));
            }
            out.push(';');
            out
        }
        StmtKind::VarDeclarations { declarations, .. } => declarations
            .iter()
            .map(|&decl| statement(program, decl))
            .collect::<Vec<_>>()
            .join(" "),
        StmtKind::If {
            test,
            if_true,
            if_false,
        } => {
            let mut out = format!(
                "if ({}) {}",
                expression(program, *test),
                statement(program, *if_true)
            );
            if let Some(if_false) = if_false {
                out.push_str(&format!(" else {}", statement(program, *if_false)));
            }
            out
        }
        StmtKind::For {
            initializer,
            test,
            next,
            body,
            ..
        } => {
            let init = match initializer {
                Some(init) => statement(program, *init),
                None => ";".to_string(),
            };
            let test = test
                .map(|t| expression(program, t))
                .unwrap_or_default();
            let next = next
                .map(|n| expression(program, n))
                .unwrap_or_default();
            format!(
                "for ({} {}; {}) {}",
                init,
                test,
                next,
                statement(program, *body)
            )
        }
        StmtKind::While { test, body } => format!(
            "while ({}) {}",
            expression(program, *test),
            statement(program, *body)
        ),
        StmtKind::Do { body, test } => format!(
            "do {} while ({});",
            statement(program, *body),
            expression(program, *test)
        ),
        StmtKind::Switch { value, cases, .. } => {
            let rendered = cases
                .iter()
                .map(|&case| statement(program, case))
                .collect::<Vec<_>>()
                .join(" ");
            format!("switch ({}) {{ {} }}", expression(program, *value), rendered)
        }
        StmtKind::SwitchCase { value, statements } => {
            let label = match value {
                Some(value) => format!("case {}:", expression(program, *value)),
                None => "default:".to_string(),
            };
            let inner = statements
                .iter()
                .map(|&child| statement(program, child))
                .collect::<Vec<_>>()
                .join(" ");
            if inner.is_empty() {
                label
            } else {
                format!("{} {}", label, inner)
            }
        }
        StmtKind::Return { expression: expr } => match expr {
            Some(expr) => format!("return {};", expression(program, *expr)),
            None => "return;".to_string(),
        },
        StmtKind::Break => "break;".to_string(),
        StmtKind::Continue => "continue;".to_string(),
        StmtKind::Discard => "discard;".to_string(),
        StmtKind::InlineMarker { function } => {
            format!("/* inlined: {} */", program.functions[*function].name)
        }
        StmtKind::Nop => ";".to_string(),
    }
}

fn comma_separated(program: &Program, arguments: &[ExprId]) -> String {
    arguments
        .iter()
        .map(|&arg| expression(program, arg))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::nodes::{BinaryOp, RefKind};
    use crate::ir::types::Modifiers;

    #[test]
    fn test_expression_rendering() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let root = program.root_symbols;
        let x = program
            .define_local(root, "x", int, Modifiers::empty())
            .expect("defining x failed");
        let x_ref = program.var_ref(0, x, RefKind::Read);
        let two = program.int_literal(0, 2);
        let sum = program.binary(0, x_ref, BinaryOp::Add, two, int);
        assert_eq!(expression(&program, sum), "(x + 2)");

        let half = program.float_literal(0, 0.5);
        assert_eq!(expression(&program, half), "0.5");
        let one = program.float_literal(0, 1.0);
        assert_eq!(expression(&program, one), "1.0");
    }

    #[test]
    fn test_var_declaration_rendering() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let root = program.root_symbols;
        let n = program
            .define_local(root, "n", int, Modifiers::empty())
            .expect("defining n failed");
        let five = program.int_literal(0, 5);
        let decl = program.var_decl_stmt(0, n, Some(five));
        assert_eq!(statement(&program, decl), "int n = 5;");
    }

    #[test]
    fn test_scopeless_block_renders_bare() {
        let mut program = Program::new();
        let a = program.nop(0);
        let b = program.break_stmt(0);
        let scoped = program.block(0, vec![a, b], None, true);
        assert_eq!(statement(&program, scoped), "{ ; break; }");

        let c = program.nop(0);
        let d = program.continue_stmt(0);
        let bare = program.block(0, vec![c, d], None, false);
        assert_eq!(statement(&program, bare), "; continue;");
    }

    #[test]
    fn test_control_flow_rendering() {
        let mut program = Program::new();
        let cond = program.bool_literal(0, true);
        let body = program.discard_stmt(0);
        let if_stmt = program.if_stmt(0, cond, body, None);
        assert_eq!(statement(&program, if_stmt), "if (true) discard;");

        let test = program.bool_literal(0, false);
        let inner = program.break_stmt(0);
        let block = program.block(0, vec![inner], None, true);
        let do_stmt = program.do_stmt(0, block, test);
        assert_eq!(statement(&program, do_stmt), "do { break; } while (false);");
    }
}
