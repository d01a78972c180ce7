//! Static queries over function bodies.
//!
//! Everything here is a pure read-only pass built on the generic visitor:
//! return-statement accounting (which drives early-return emulation), node
//! counting (which drives the inline threshold), write detection (which
//! drives argument materialization) and recursion detection.

use crate::ir::{
    walk_expression, walk_statement, ExprId, ExprKind, FunctionId, Program, RefKind, StmtId,
    StmtKind, VarId, Visitor,
};

/// Counts every `return` anywhere in the body.
pub fn count_all_returns(program: &Program, body: StmtId) -> usize {
    struct CountAllReturns {
        count: usize,
    }

    impl Visitor for CountAllReturns {
        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            if matches!(program.stmts[stmt].kind, StmtKind::Return { .. }) {
                self.count += 1;
            }
            walk_statement(self, program, stmt)
        }
    }

    let mut visitor = CountAllReturns { count: 0 };
    visitor.visit_statement(program, body);
    visitor.count
}

/// Counts `return`s at the syntactic tail of linear control flow: recurse
/// into the last statement of each block, never into switches or loops.
pub fn count_returns_at_end_of_control_flow(program: &Program, body: StmtId) -> usize {
    struct CountTailReturns {
        count: usize,
    }

    impl Visitor for CountTailReturns {
        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            match &program.stmts[stmt].kind {
                StmtKind::Block { statements, .. } => match statements.last() {
                    Some(&last) => self.visit_statement(program, last),
                    None => false,
                },
                // Switches and loops are opaque here.
                StmtKind::Switch { .. }
                | StmtKind::While { .. }
                | StmtKind::Do { .. }
                | StmtKind::For { .. } => false,
                StmtKind::Return { .. } => {
                    self.count += 1;
                    walk_statement(self, program, stmt)
                }
                _ => walk_statement(self, program, stmt),
            }
        }
    }

    let mut visitor = CountTailReturns { count: 0 };
    visitor.visit_statement(program, body);
    visitor.count
}

/// Counts `return`s lexically inside at least one breakable construct
/// (switch/for/while/do).
pub fn count_returns_in_breakable_constructs(program: &Program, body: StmtId) -> usize {
    struct CountBreakableReturns {
        count: usize,
        inside_breakable: usize,
    }

    impl Visitor for CountBreakableReturns {
        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            match &program.stmts[stmt].kind {
                StmtKind::Switch { .. }
                | StmtKind::While { .. }
                | StmtKind::Do { .. }
                | StmtKind::For { .. } => {
                    self.inside_breakable += 1;
                    let result = walk_statement(self, program, stmt);
                    self.inside_breakable -= 1;
                    result
                }
                StmtKind::Return { .. } => {
                    if self.inside_breakable > 0 {
                        self.count += 1;
                    }
                    walk_statement(self, program, stmt)
                }
                _ => walk_statement(self, program, stmt),
            }
        }
    }

    let mut visitor = CountBreakableReturns {
        count: 0,
        inside_breakable: 0,
    };
    visitor.visit_statement(program, body);
    visitor.count
}

/// True iff some `return` is not at the syntactic tail of control flow. A
/// function that only returns from a single tail position needs no break
/// emulation.
pub fn has_early_return(program: &Program, body: StmtId) -> bool {
    let return_count = count_all_returns(program, body);
    if return_count == 0 {
        return false;
    }
    return_count > count_returns_at_end_of_control_flow(program, body)
}

/// True iff the function's body calls the function itself, directly or via
/// an inline marker left behind by a previous pass.
pub fn contains_recursive_call(program: &Program, function: FunctionId) -> bool {
    struct RecursiveCallFinder {
        target: FunctionId,
    }

    impl Visitor for RecursiveCallFinder {
        fn visit_expression(&mut self, program: &Program, expr: ExprId) -> bool {
            if let ExprKind::FunctionCall { function, .. } = program.exprs[expr].kind {
                if function == self.target {
                    return true;
                }
            }
            walk_expression(self, program, expr)
        }

        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            if let StmtKind::InlineMarker { function } = program.stmts[stmt].kind {
                if function == self.target {
                    return true;
                }
            }
            walk_statement(self, program, stmt)
        }
    }

    let Some(body) = program.functions[function].definition else {
        return false;
    };
    let mut visitor = RecursiveCallFinder { target: function };
    visitor.visit_statement(program, body)
}

/// Counts IR nodes (statements and expressions) in a body.
pub fn node_count(program: &Program, body: StmtId) -> usize {
    struct NodeCounter {
        count: usize,
    }

    impl Visitor for NodeCounter {
        fn visit_expression(&mut self, program: &Program, expr: ExprId) -> bool {
            self.count += 1;
            walk_expression(self, program, expr)
        }

        fn visit_statement(&mut self, program: &Program, stmt: StmtId) -> bool {
            self.count += 1;
            walk_statement(self, program, stmt)
        }
    }

    let mut visitor = NodeCounter { count: 0 };
    visitor.visit_statement(program, body);
    visitor.count
}

/// True iff the statement contains a write (or read-write) reference to the
/// variable.
pub fn statement_writes_to_variable(program: &Program, stmt: StmtId, var: VarId) -> bool {
    struct VariableWriteFinder {
        target: VarId,
    }

    impl Visitor for VariableWriteFinder {
        fn visit_expression(&mut self, program: &Program, expr: ExprId) -> bool {
            if let ExprKind::VariableReference { var, ref_kind } = program.exprs[expr].kind {
                if var == self.target && ref_kind != RefKind::Read {
                    return true;
                }
            }
            walk_expression(self, program, expr)
        }
    }

    let mut visitor = VariableWriteFinder { target: var };
    visitor.visit_statement(program, stmt)
}
