//! Function-call inlining.
//!
//! Two constraints shape this pass: the IR stays high-level, so statements
//! cannot be dropped into the middle of an expression, and the emission
//! targets have no `goto`. The inlined body therefore runs as extra
//! statements sequenced *before* the statement containing the call (relying
//! on the language's lack of evaluation-order guarantees), and early returns
//! are emulated by wrapping the body in `do { ... } while (false)` and
//! lowering each `return` to a `break`.
//!
//! One `analyze` pass rewrites a disjoint set of call sites; the driver
//! re-runs passes until nothing changes, since inlined code can expose new
//! candidates and two candidates sharing an enclosing statement defer one of
//! them to the next pass.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::analysis;
use crate::ir::{
    BinaryOp, Context, ExprId, ExprKind, FunctionId, Modifiers, Program, ProgramElement, RefKind,
    StmtId, StmtKind, Symbol, SymbolTableId, TypeId, VarId, Variable, VariableStorage,
};
use crate::settings::Settings;

/// Cap on fixpoint passes, scaled by the number of function definitions.
const MAX_INLINE_PASSES_PER_FUNCTION: usize = 8;

/// Maps a callee's variables (parameters and locals) to their replacements
/// at the call site.
pub type VariableRewriteMap = HashMap<VarId, VarId>;

/// The product of inlining one call: a scopeless block of statements to run
/// before the enclosing statement, and the expression that stands in for the
/// consumed call.
pub struct InlinedCall {
    pub inlined_body: StmtId,
    pub replacement_expr: ExprId,
}

/// A call site worth considering, together with the lexical information
/// needed to substitute it.
struct InlineCandidate {
    /// Symbol table in scope at the call.
    symbols: SymbolTableId,
    /// Whether the nearest real parent statement is an if/for/while/do, in
    /// which case the substituted body needs an explicit scope.
    parent_is_control_flow: bool,
    /// Slot of the statement the inlined body will be sequenced before.
    enclosing_stmt: StmtId,
    /// Slot of the call expression itself.
    candidate_expr: ExprId,
}

/// The inliner. Configure with [`Inliner::reset`], then run
/// [`Inliner::analyze`] per pass (or use [`inline_program`] to run to
/// fixpoint).
pub struct Inliner {
    context: Context,
    settings: Settings,
    inline_var_counter: usize,
}

impl Inliner {
    pub fn new(context: Context, settings: Settings) -> Self {
        Inliner {
            context,
            settings,
            inline_var_counter: 0,
        }
    }

    /// Reconfigures the inliner and restarts the temporary-name counter.
    pub fn reset(&mut self, context: Context, settings: Settings) {
        self.context = context;
        self.settings = settings;
        self.inline_var_counter = 0;
    }

    /// Produces a name that is unused in the lexical chain of `symbols`.
    ///
    /// The shading language forbids two consecutive underscores anywhere in
    /// an identifier, so when the base name already starts with one the
    /// splitter is dropped.
    fn unique_name_for_inline_var(
        &mut self,
        program: &Program,
        base_name: &str,
        symbols: SymbolTableId,
    ) -> String {
        let splitter = if base_name.starts_with('_') { "" } else { "_" };
        loop {
            let candidate = format!("_{}{}{}", self.inline_var_counter, splitter, base_name);
            self.inline_var_counter += 1;
            if program.lookup(symbols, &candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Deep-copies an expression, retargeting variable references through
    /// `var_map` and stamping every new node with the call-site offset.
    fn inline_expression(
        &mut self,
        program: &mut Program,
        offset: u32,
        var_map: &VariableRewriteMap,
        expr: ExprId,
    ) -> ExprId {
        let node = program.exprs[expr].clone();
        let ty = node.ty;
        match node.kind {
            ExprKind::BoolLiteral(_)
            | ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::NullLiteral
            | ExprKind::ExternalValue { .. }
            | ExprKind::FunctionReference { .. }
            | ExprKind::TypeReference { .. }
            | ExprKind::Setting { .. } => program.alloc_expr(offset, ty, node.kind),
            ExprKind::VariableReference { var, ref_kind } => match var_map.get(&var) {
                Some(&replacement) => {
                    let replacement_ty = program.vars[replacement].ty;
                    program.alloc_expr(
                        offset,
                        replacement_ty,
                        ExprKind::VariableReference {
                            var: replacement,
                            ref_kind,
                        },
                    )
                }
                None => program.alloc_expr(offset, ty, ExprKind::VariableReference { var, ref_kind }),
            },
            ExprKind::FieldAccess { base, field_index } => {
                let base = self.inline_expression(program, offset, var_map, base);
                program.alloc_expr(offset, ty, ExprKind::FieldAccess { base, field_index })
            }
            ExprKind::Index { base, index } => {
                let base = self.inline_expression(program, offset, var_map, base);
                let index = self.inline_expression(program, offset, var_map, index);
                program.alloc_expr(offset, ty, ExprKind::Index { base, index })
            }
            ExprKind::Swizzle { base, components } => {
                let base = self.inline_expression(program, offset, var_map, base);
                program.alloc_expr(offset, ty, ExprKind::Swizzle { base, components })
            }
            ExprKind::Constructor { arguments } => {
                let arguments = self.inline_expr_list(program, offset, var_map, &arguments);
                program.alloc_expr(offset, ty, ExprKind::Constructor { arguments })
            }
            ExprKind::Prefix { op, operand } => {
                let operand = self.inline_expression(program, offset, var_map, operand);
                program.alloc_expr(offset, ty, ExprKind::Prefix { op, operand })
            }
            ExprKind::Postfix { operand, op } => {
                let operand = self.inline_expression(program, offset, var_map, operand);
                program.alloc_expr(offset, ty, ExprKind::Postfix { operand, op })
            }
            ExprKind::Binary { left, op, right } => {
                let left = self.inline_expression(program, offset, var_map, left);
                let right = self.inline_expression(program, offset, var_map, right);
                program.alloc_expr(offset, ty, ExprKind::Binary { left, op, right })
            }
            ExprKind::Ternary {
                test,
                if_true,
                if_false,
            } => {
                let test = self.inline_expression(program, offset, var_map, test);
                let if_true = self.inline_expression(program, offset, var_map, if_true);
                let if_false = self.inline_expression(program, offset, var_map, if_false);
                program.alloc_expr(
                    offset,
                    ty,
                    ExprKind::Ternary {
                        test,
                        if_true,
                        if_false,
                    },
                )
            }
            ExprKind::FunctionCall {
                function,
                arguments,
            } => {
                let arguments = self.inline_expr_list(program, offset, var_map, &arguments);
                program.alloc_expr(
                    offset,
                    ty,
                    ExprKind::FunctionCall {
                        function,
                        arguments,
                    },
                )
            }
            ExprKind::ExternalFunctionCall { name, arguments } => {
                let arguments = self.inline_expr_list(program, offset, var_map, &arguments);
                program.alloc_expr(
                    offset,
                    ty,
                    ExprKind::ExternalFunctionCall { name, arguments },
                )
            }
        }
    }

    fn inline_expr_list(
        &mut self,
        program: &mut Program,
        offset: u32,
        var_map: &VariableRewriteMap,
        exprs: &[ExprId],
    ) -> Vec<ExprId> {
        exprs
            .iter()
            .map(|&e| self.inline_expression(program, offset, var_map, e))
            .collect()
    }

    /// Deep-copies a statement for substitution at a call site. Declared
    /// variables are renamed and installed into `symbols`; `return` is
    /// lowered to an assignment to `result_var` and, when the callee has
    /// early returns, a `break` out of the emulation loop.
    fn inline_statement(
        &mut self,
        program: &mut Program,
        offset: u32,
        var_map: &mut VariableRewriteMap,
        symbols: SymbolTableId,
        result_var: Option<VarId>,
        have_early_returns: bool,
        stmt: StmtId,
    ) -> StmtId {
        let kind = program.stmts[stmt].kind.clone();
        match kind {
            StmtKind::Block {
                statements,
                symbols: block_symbols,
                is_scope,
            } => {
                let statements = self.inline_stmt_list(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    &statements,
                );
                program.alloc_stmt(
                    offset,
                    StmtKind::Block {
                        statements,
                        symbols: block_symbols,
                        is_scope,
                    },
                )
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Discard => {
                program.alloc_stmt(offset, kind)
            }
            StmtKind::InlineMarker { .. } | StmtKind::Nop => program.alloc_stmt(offset, kind),
            StmtKind::Do { body, test } => {
                let body = self.inline_statement(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    body,
                );
                let test = self.inline_expression(program, offset, var_map, test);
                program.alloc_stmt(offset, StmtKind::Do { body, test })
            }
            StmtKind::Expression { expression } => {
                let expression = self.inline_expression(program, offset, var_map, expression);
                program.alloc_stmt(offset, StmtKind::Expression { expression })
            }
            StmtKind::For {
                initializer,
                test,
                next,
                body,
                symbols: for_symbols,
            } => {
                // The initializer must be cloned first so its declarations
                // are already remapped when the test and next are cloned.
                let initializer = initializer.map(|init| {
                    self.inline_statement(
                        program,
                        offset,
                        var_map,
                        symbols,
                        result_var,
                        have_early_returns,
                        init,
                    )
                });
                let test = test.map(|t| self.inline_expression(program, offset, var_map, t));
                let next = next.map(|n| self.inline_expression(program, offset, var_map, n));
                let body = self.inline_statement(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    body,
                );
                program.alloc_stmt(
                    offset,
                    StmtKind::For {
                        initializer,
                        test,
                        next,
                        body,
                        symbols: for_symbols,
                    },
                )
            }
            StmtKind::If {
                test,
                if_true,
                if_false,
            } => {
                let test = self.inline_expression(program, offset, var_map, test);
                let if_true = self.inline_statement(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    if_true,
                );
                let if_false = if_false.map(|stmt| {
                    self.inline_statement(
                        program,
                        offset,
                        var_map,
                        symbols,
                        result_var,
                        have_early_returns,
                        stmt,
                    )
                });
                program.alloc_stmt(
                    offset,
                    StmtKind::If {
                        test,
                        if_true,
                        if_false,
                    },
                )
            }
            StmtKind::Return { expression } => {
                self.lower_return(
                    program,
                    offset,
                    var_map,
                    result_var,
                    have_early_returns,
                    expression,
                )
            }
            StmtKind::Switch {
                value,
                cases,
                symbols: switch_symbols,
            } => {
                let value = self.inline_expression(program, offset, var_map, value);
                let cases = self.inline_stmt_list(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    &cases,
                );
                program.alloc_stmt(
                    offset,
                    StmtKind::Switch {
                        value,
                        cases,
                        symbols: switch_symbols,
                    },
                )
            }
            StmtKind::SwitchCase { value, statements } => {
                let value = value.map(|v| self.inline_expression(program, offset, var_map, v));
                let statements = self.inline_stmt_list(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    &statements,
                );
                program.alloc_stmt(offset, StmtKind::SwitchCase { value, statements })
            }
            StmtKind::VarDeclaration { var, sizes, value } => {
                let sizes = sizes
                    .iter()
                    .map(|size| {
                        size.map(|s| self.inline_expression(program, offset, var_map, s))
                    })
                    .collect();
                let value =
                    value.map(|v| self.inline_expression(program, offset, var_map, v));
                // Inlined variables get unique names; scopes hide most name
                // overlap, but generated code is not always emitted
                // top-to-bottom, so uniqueness matters.
                let old = &program.vars[var];
                let modifiers = old.modifiers;
                let storage = old.storage;
                let base_name = old.name.clone();
                let old_ty = old.ty;
                let name = self.unique_name_for_inline_var(program, &base_name, symbols);
                let ty = copy_type_if_needed(program, old_ty, symbols);
                let replacement = program.vars.alloc(Variable {
                    name: name.clone(),
                    ty,
                    modifiers,
                    storage,
                    initial_value: value,
                });
                program.symbol_tables[symbols].insert(name, Symbol::Variable(replacement));
                var_map.insert(var, replacement);
                program.alloc_stmt(
                    offset,
                    StmtKind::VarDeclaration {
                        var: replacement,
                        sizes,
                        value,
                    },
                )
            }
            StmtKind::VarDeclarations {
                base_type,
                declarations,
            } => {
                let declarations = self.inline_stmt_list(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    &declarations,
                );
                let base_type = copy_type_if_needed(program, base_type, symbols);
                program.alloc_stmt(
                    offset,
                    StmtKind::VarDeclarations {
                        base_type,
                        declarations,
                    },
                )
            }
            StmtKind::While { test, body } => {
                let test = self.inline_expression(program, offset, var_map, test);
                let body = self.inline_statement(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    body,
                );
                program.alloc_stmt(offset, StmtKind::While { test, body })
            }
        }
    }

    fn inline_stmt_list(
        &mut self,
        program: &mut Program,
        offset: u32,
        var_map: &mut VariableRewriteMap,
        symbols: SymbolTableId,
        result_var: Option<VarId>,
        have_early_returns: bool,
        stmts: &[StmtId],
    ) -> Vec<StmtId> {
        stmts
            .iter()
            .map(|&s| {
                self.inline_statement(
                    program,
                    offset,
                    var_map,
                    symbols,
                    result_var,
                    have_early_returns,
                    s,
                )
            })
            .collect()
    }

    /// Lowers `return E` within a cloned body.
    ///
    /// | case                      | replacement                          |
    /// |---------------------------|--------------------------------------|
    /// | value, no early returns   | `result = E;`                        |
    /// | value, early returns      | `{ result = E; break; }`             |
    /// | void, no early returns    | nop                                  |
    /// | void, early returns       | `break;`                             |
    fn lower_return(
        &mut self,
        program: &mut Program,
        offset: u32,
        var_map: &VariableRewriteMap,
        result_var: Option<VarId>,
        have_early_returns: bool,
        expression: Option<ExprId>,
    ) -> StmtId {
        match expression {
            Some(expression) => {
                let result_var =
                    result_var.expect("non-void return encountered while inlining a void callee");
                let result_ty = program.vars[result_var].ty;
                let lhs = program.alloc_expr(
                    offset,
                    result_ty,
                    ExprKind::VariableReference {
                        var: result_var,
                        ref_kind: RefKind::Write,
                    },
                );
                let rhs = self.inline_expression(program, offset, var_map, expression);
                let assign = program.alloc_expr(
                    offset,
                    result_ty,
                    ExprKind::Binary {
                        left: lhs,
                        op: BinaryOp::Assign,
                        right: rhs,
                    },
                );
                let assignment =
                    program.alloc_stmt(offset, StmtKind::Expression { expression: assign });
                if have_early_returns {
                    let brk = program.alloc_stmt(offset, StmtKind::Break);
                    program.alloc_stmt(
                        offset,
                        StmtKind::Block {
                            statements: vec![assignment, brk],
                            symbols: None,
                            is_scope: true,
                        },
                    )
                } else {
                    assignment
                }
            }
            None => {
                if have_early_returns {
                    program.alloc_stmt(offset, StmtKind::Break)
                } else {
                    program.alloc_stmt(offset, StmtKind::Nop)
                }
            }
        }
    }

    /// Declares a fresh local for an inlined temporary, installs it into the
    /// call-site symbol table and appends its declaration to the inlined
    /// body. For `out` parameters the declaration is initialized from a
    /// clone, preserving the original argument for the copy-back.
    #[allow(clippy::too_many_arguments)]
    fn make_inline_var(
        &mut self,
        program: &mut Program,
        offset: u32,
        symbols: SymbolTableId,
        base_name: &str,
        mut ty: TypeId,
        modifiers: Modifiers,
        initial_value: Option<ExprId>,
        is_out_param: bool,
        inlined_stmts: &mut Vec<StmtId>,
    ) -> VarId {
        // The literal-kind placeholder types cannot be used for scratch
        // variables; seeing one here means a coercion was missed upstream.
        if ty == self.context.float_literal_type {
            debug_assert!(false, "found a $floatLiteral type while inlining");
            ty = self.context.float_type;
        } else if ty == self.context.int_literal_type {
            debug_assert!(false, "found an $intLiteral type while inlining");
            ty = self.context.int_type;
        }

        let name = self.unique_name_for_inline_var(program, base_name, symbols);
        let value = match initial_value {
            Some(value) if is_out_param => Some(program.clone_expr(value)),
            other => other,
        };
        let var = program.vars.alloc(Variable {
            name: name.clone(),
            ty,
            modifiers,
            storage: VariableStorage::Local,
            initial_value: value,
        });
        program.symbol_tables[symbols].insert(name, Symbol::Variable(var));

        let decl = program.alloc_stmt(
            offset,
            StmtKind::VarDeclaration {
                var,
                sizes: Vec::new(),
                value,
            },
        );
        let group = program.alloc_stmt(
            offset,
            StmtKind::VarDeclarations {
                base_type: ty,
                declarations: vec![decl],
            },
        );
        inlined_stmts.push(group);
        var
    }

    /// Builds the inlined replacement for one safe call site.
    pub fn inline_call(
        &mut self,
        program: &mut Program,
        call: ExprId,
        symbols: SymbolTableId,
    ) -> InlinedCall {
        debug_assert!(self.is_safe_to_inline(program, call, usize::MAX));

        let (offset, function, arguments) = match &program.exprs[call].kind {
            ExprKind::FunctionCall {
                function,
                arguments,
            } => (program.exprs[call].offset, *function, arguments.clone()),
            _ => unreachable!("inline_call invoked on a non-call expression"),
        };
        let decl = &program.functions[function];
        let body = decl
            .definition
            .expect("inlining a function without a definition");
        let return_type = decl.return_type;
        let function_name = decl.name.clone();
        let parameters = decl.parameters.clone();
        let has_early_return = analysis::has_early_return(program, body);

        let mut inlined_stmts: Vec<StmtId> = Vec::with_capacity(
            1 +                     // inline marker
            1 +                     // result variable
            arguments.len() +       // argument temporaries
            arguments.len() +       // out-parameter copy-back
            1, // inlined code (block or do-while loop)
        );
        inlined_stmts.push(program.alloc_stmt(offset, StmtKind::InlineMarker { function }));

        // A variable to hold the result (excepting void).
        let result_var = if return_type != self.context.void_type {
            Some(self.make_inline_var(
                program,
                offset,
                symbols,
                &function_name,
                return_type,
                Modifiers::empty(),
                None,
                false,
                &mut inlined_stmts,
            ))
        } else {
            None
        };

        // Map parameters to arguments, materializing temporaries when the
        // argument cannot be used directly.
        let mut var_map = VariableRewriteMap::new();
        for (i, &argument) in arguments.iter().enumerate() {
            let param = parameters[i];
            let param_modifiers = program.vars[param].modifiers;
            let is_out = param_modifiers.contains(Modifiers::OUT);

            if let ExprKind::VariableReference { var: arg_var, .. } = program.exprs[argument].kind
            {
                // A plain variable can be used as-is when the parameter is
                // never written and carries no write-back obligation.
                if !is_out && !analysis::statement_writes_to_variable(program, body, param) {
                    var_map.insert(param, arg_var);
                    continue;
                }
            }

            let arg_ty = program.exprs[argument].ty;
            let param_name = program.vars[param].name.clone();
            let temp = self.make_inline_var(
                program,
                offset,
                symbols,
                &param_name,
                arg_ty,
                param_modifiers,
                Some(argument),
                is_out,
                &mut inlined_stmts,
            );
            var_map.insert(param, temp);
        }

        // Clone the body with the rewrite map applied.
        debug_assert!(matches!(program.stmts[body].kind, StmtKind::Block { .. }));
        let body_statements = match &program.stmts[body].kind {
            StmtKind::Block { statements, .. } => statements.clone(),
            _ => vec![body],
        };
        let cloned = self.inline_stmt_list(
            program,
            offset,
            &mut var_map,
            symbols,
            result_var,
            has_early_return,
            &body_statements,
        );
        let inline_block = program.alloc_stmt(
            offset,
            StmtKind::Block {
                statements: cloned,
                symbols: None,
                is_scope: true,
            },
        );
        if has_early_return {
            // No goto on the targets: fake the early exit by wrapping the
            // body in a one-shot loop so lowered returns can `break` to the
            // end.
            let false_literal = program.alloc_expr(
                offset,
                self.context.bool_type,
                ExprKind::BoolLiteral(false),
            );
            inlined_stmts.push(program.alloc_stmt(
                offset,
                StmtKind::Do {
                    body: inline_block,
                    test: false_literal,
                },
            ));
        } else {
            // The block is kept either way so the callee's locals stay
            // scoped away from the caller's.
            inlined_stmts.push(inline_block);
        }

        // Copy the values of out parameters back into their destinations.
        for (i, &argument) in arguments.iter().enumerate() {
            let param = parameters[i];
            if !program.vars[param].modifiers.contains(Modifiers::OUT) {
                continue;
            }
            let mapped = *var_map
                .get(&param)
                .expect("out parameter missing from the rewrite map");
            if let ExprKind::VariableReference { var: arg_var, .. } = program.exprs[argument].kind
            {
                if arg_var == mapped {
                    // No temporary was created, so there is nothing to copy
                    // back out.
                    continue;
                }
            }
            let arg_ty = program.exprs[argument].ty;
            let lhs = program.clone_expr(argument);
            let rhs = program.alloc_expr(
                offset,
                program.vars[mapped].ty,
                ExprKind::VariableReference {
                    var: mapped,
                    ref_kind: RefKind::Read,
                },
            );
            let assign = program.alloc_expr(
                offset,
                arg_ty,
                ExprKind::Binary {
                    left: lhs,
                    op: BinaryOp::Assign,
                    right: rhs,
                },
            );
            let stmt = program.alloc_stmt(offset, StmtKind::Expression { expression: assign });
            inlined_stmts.push(stmt);
        }

        let replacement_expr = match result_var {
            Some(result_var) => program.alloc_expr(
                offset,
                program.vars[result_var].ty,
                ExprKind::VariableReference {
                    var: result_var,
                    ref_kind: RefKind::Read,
                },
            ),
            // A void call produces nothing, but the consumed expression slot
            // still needs a stand-in.
            None => program.alloc_expr(
                offset,
                self.context.bool_type,
                ExprKind::BoolLiteral(false),
            ),
        };

        let inlined_body = program.alloc_stmt(
            offset,
            StmtKind::Block {
                statements: inlined_stmts,
                symbols: None,
                is_scope: false,
            },
        );
        InlinedCall {
            inlined_body,
            replacement_expr,
        }
    }

    /// Decides whether a call site can be inlined under `inline_threshold`.
    pub fn is_safe_to_inline(
        &self,
        program: &Program,
        call: ExprId,
        inline_threshold: usize,
    ) -> bool {
        let ExprKind::FunctionCall { function, .. } = program.exprs[call].kind else {
            return false;
        };
        let decl = &program.functions[function];
        let Some(body) = decl.definition else {
            // Can't inline something without its definition.
            return false;
        };
        if inline_threshold < usize::MAX
            && !decl.modifiers.contains(Modifiers::INLINE)
            && analysis::node_count(program, body) >= inline_threshold
        {
            // The function exceeds the maximum inline size and is not
            // flagged 'inline'.
            return false;
        }
        if !self.settings.caps.can_use_do_loops() {
            // Without do-while loops there is no way to simulate early
            // returns.
            let has_early_return = analysis::has_early_return(program, body);
            debug_assert!(
                has_early_return
                    || analysis::count_returns_in_breakable_constructs(program, body) == 0
            );
            return !has_early_return;
        }
        // An early return inside a breakable construct cannot be lowered:
        // the inner `break` would not exit the emulation loop.
        let has_return_in_breakable =
            analysis::count_returns_in_breakable_constructs(program, body) > 0;
        debug_assert!(!has_return_in_breakable || analysis::has_early_return(program, body));
        !has_return_in_breakable
    }

    /// Runs one inlining pass over the whole program. Returns whether any
    /// call was rewritten.
    pub fn analyze(&mut self, program: &mut Program) -> bool {
        let mut analyzer = InlineCandidateAnalyzer::default();
        analyzer.visit(program);

        // Check each candidate callee once, memoized: single-use callees are
        // tried size-insensitively, everything else against the configured
        // threshold.
        let mut inlinable: HashMap<FunctionId, bool> = HashMap::new();
        for candidate in &analyzer.candidates {
            let Some(function) = candidate_function(program, candidate.candidate_expr) else {
                continue;
            };
            if !inlinable.contains_key(&function) {
                let call_count = program.functions[function]
                    .call_count
                    .load(std::sync::atomic::Ordering::Relaxed);
                let threshold = if call_count > 1 {
                    self.settings.inline_threshold
                } else {
                    usize::MAX
                };
                let safe = self.is_safe_to_inline(program, candidate.candidate_expr, threshold)
                    && !analysis::contains_recursive_call(program, function);
                if !safe {
                    trace!(
                        "not inlining '{}' (unsafe or over threshold)",
                        program.functions[function].name
                    );
                }
                inlinable.insert(function, safe);
            }
        }

        // Rewrite the candidates determined to be safe. Two rewrites through
        // one enclosing statement in a single pass are not supported; the
        // second is picked up next pass.
        let mut used_slots: HashSet<StmtId> = HashSet::new();
        let mut made_changes = false;
        for candidate in &analyzer.candidates {
            let Some(function) = candidate_function(program, candidate.candidate_expr) else {
                continue;
            };
            if !inlinable[&function] {
                continue;
            }
            if !used_slots.insert(candidate.enclosing_stmt) {
                continue;
            }

            let inlined = self.inline_call(program, candidate.candidate_expr, candidate.symbols);
            ensure_scoped_blocks(program, inlined.inlined_body, candidate.parent_is_control_flow);

            // Move the enclosing statement to the end of the scopeless block
            // holding the inlined code, then overwrite both slots. Nothing
            // is destroyed except the call expression; every other node
            // stays live inside the rewritten tree.
            let original = program.take_stmt(candidate.enclosing_stmt);
            let moved = program.stmts.alloc(original);
            if let StmtKind::Block { statements, .. } =
                &mut program.stmts[inlined.inlined_body].kind
            {
                statements.push(moved);
            }
            let body = program.take_stmt(inlined.inlined_body);
            program.set_stmt(candidate.enclosing_stmt, body);

            let replacement = program.take_expr(inlined.replacement_expr);
            program.set_expr(candidate.candidate_expr, replacement);

            debug!("inlined call to '{}'", program.functions[function].name);
            made_changes = true;
        }

        made_changes
    }
}

/// Array types are uniquely owned; cloning one into a new scope re-parents a
/// fresh instance into the receiving table.
fn copy_type_if_needed(program: &mut Program, ty: TypeId, symbols: SymbolTableId) -> TypeId {
    if program.types[ty].is_array() {
        let copy = program.types[ty].clone();
        let copy = program.types.alloc(copy);
        program.symbol_tables[symbols].take_ownership_of_type(copy);
        return copy;
    }
    ty
}

fn candidate_function(program: &Program, expr: ExprId) -> Option<FunctionId> {
    match program.exprs[expr].kind {
        ExprKind::FunctionCall { function, .. } => Some(function),
        _ => None,
    }
}

/// Forces an explicit scope onto an inlined body that lands in the body slot
/// of an if/for/while/do, so a following statement cannot be absorbed into
/// the control flow by a textual emitter.
fn ensure_scoped_blocks(program: &mut Program, inlined_body: StmtId, parent_is_control_flow: bool) {
    if !parent_is_control_flow {
        return;
    }
    let mut nested = inlined_body;
    loop {
        let only_child = match &program.stmts[nested].kind {
            // An explicit scope; all is well.
            StmtKind::Block { is_scope: true, .. } => return,
            StmtKind::Block { statements, .. } if statements.len() == 1 => statements[0],
            // Multiple (or zero) statements but no scope: scope the
            // outermost block.
            StmtKind::Block { .. } => {
                if let StmtKind::Block { is_scope, .. } = &mut program.stmts[inlined_body].kind {
                    *is_scope = true;
                }
                return;
            }
            _ => return,
        };
        if !matches!(program.stmts[only_child].kind, StmtKind::Block { .. }) {
            // Exactly one non-block child; nothing to scope.
            return;
        }
        nested = only_child;
    }
}

/// Phase-1 traversal: collects candidate call sites along with the lexical
/// symbol table and the statement slots needed to substitute them later.
#[derive(Default)]
struct InlineCandidateAnalyzer {
    candidates: Vec<InlineCandidate>,
    /// Shallower than the enclosing-statement stack; most nodes have no
    /// symbol table of their own.
    symbol_table_stack: Vec<SymbolTableId>,
    /// Statements suitable for sequencing new statements in front of. Not
    /// every statement qualifies (e.g. a for-loop initializer).
    enclosing_stmt_stack: Vec<StmtId>,
}

impl InlineCandidateAnalyzer {
    fn visit(&mut self, program: &Program) {
        self.symbol_table_stack.push(program.root_symbols);
        for element in &program.elements {
            // The inliner can't operate outside of a function's scope.
            if let ProgramElement::Function(def) = element {
                self.visit_statement(program, def.body, true);
            }
        }
        self.symbol_table_stack.pop();
    }

    fn visit_statement(&mut self, program: &Program, stmt: StmtId, viable_as_enclosing: bool) {
        let old_enclosing_len = self.enclosing_stmt_stack.len();
        let old_symbols_len = self.symbol_table_stack.len();

        if viable_as_enclosing {
            self.enclosing_stmt_stack.push(stmt);
        }

        match &program.stmts[stmt].kind {
            StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Discard
            | StmtKind::InlineMarker { .. }
            | StmtKind::Nop => {}
            StmtKind::Block {
                statements,
                symbols,
                ..
            } => {
                if let Some(symbols) = symbols {
                    self.symbol_table_stack.push(*symbols);
                }
                for &child in statements {
                    self.visit_statement(program, child, true);
                }
            }
            StmtKind::Do { body, .. } => {
                // The loop body is a candidate; the test is not, since the
                // inlined block would have to run at the end of every
                // iteration and `continue` would skip it.
                self.visit_statement(program, *body, true);
            }
            StmtKind::Expression { expression } => {
                self.visit_expression(program, *expression);
            }
            StmtKind::For {
                initializer,
                body,
                symbols,
                ..
            } => {
                if let Some(symbols) = symbols {
                    self.symbol_table_stack.push(*symbols);
                }
                // The initializer is visited but is no place to insert new
                // statements; the test and next expressions have no legal
                // insertion slot at all without restructuring the loop.
                if let Some(initializer) = initializer {
                    self.visit_statement(program, *initializer, false);
                }
                self.visit_statement(program, *body, true);
            }
            StmtKind::If {
                test,
                if_true,
                if_false,
            } => {
                self.visit_expression(program, *test);
                self.visit_statement(program, *if_true, true);
                if let Some(if_false) = if_false {
                    self.visit_statement(program, *if_false, true);
                }
            }
            StmtKind::Return { expression } => {
                if let Some(expression) = expression {
                    self.visit_expression(program, *expression);
                }
            }
            StmtKind::Switch {
                value,
                cases,
                symbols,
            } => {
                if let Some(symbols) = symbols {
                    self.symbol_table_stack.push(*symbols);
                }
                self.visit_expression(program, *value);
                for &case in cases {
                    // A case value must be a literal; only the case body is
                    // scanned.
                    if let StmtKind::SwitchCase { statements, .. } = &program.stmts[case].kind {
                        for &child in statements {
                            self.visit_statement(program, child, true);
                        }
                    }
                }
            }
            StmtKind::SwitchCase { value, statements } => {
                if let Some(value) = value {
                    self.visit_expression(program, *value);
                }
                for &child in statements {
                    self.visit_statement(program, child, true);
                }
            }
            StmtKind::VarDeclaration { value, .. } => {
                // Declaration sizes are always literals; only the
                // initializer can contain a call.
                if let Some(value) = value {
                    self.visit_expression(program, *value);
                }
            }
            StmtKind::VarDeclarations { declarations, .. } => {
                for &declaration in declarations {
                    self.visit_statement(program, declaration, false);
                }
            }
            StmtKind::While { body, .. } => {
                // As with do-loops, the test has no legal insertion slot.
                self.visit_statement(program, *body, true);
            }
        }

        self.symbol_table_stack.truncate(old_symbols_len);
        self.enclosing_stmt_stack.truncate(old_enclosing_len);
    }

    fn visit_expression(&mut self, program: &Program, expr: ExprId) {
        match &program.exprs[expr].kind {
            ExprKind::BoolLiteral(_)
            | ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::NullLiteral
            | ExprKind::VariableReference { .. }
            | ExprKind::FieldAccess { .. }
            | ExprKind::ExternalValue { .. }
            | ExprKind::FunctionReference { .. }
            | ExprKind::TypeReference { .. }
            | ExprKind::Setting { .. } => {
                // Nothing to scan here.
            }
            ExprKind::Binary { left, op, right } => {
                self.visit_expression(program, *left);
                // Inlining the right side of `&&` or `||` would materialize
                // side effects the language's short-circuiting elides.
                if !op.is_short_circuiting() {
                    self.visit_expression(program, *right);
                }
            }
            ExprKind::Constructor { arguments }
            | ExprKind::ExternalFunctionCall { arguments, .. } => {
                for &argument in arguments {
                    self.visit_expression(program, argument);
                }
            }
            ExprKind::FunctionCall { arguments, .. } => {
                // Arguments first, so an inner call is inlined before the
                // call that consumes it.
                for &argument in arguments {
                    self.visit_expression(program, argument);
                }
                self.add_candidate(program, expr);
            }
            ExprKind::Index { base, index } => {
                self.visit_expression(program, *base);
                self.visit_expression(program, *index);
            }
            ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } => {
                self.visit_expression(program, *operand);
            }
            ExprKind::Swizzle { base, .. } => {
                self.visit_expression(program, *base);
            }
            ExprKind::Ternary { test, .. } => {
                // Only one arm may be evaluated, so neither arm can host an
                // inlined body; the test is fair game.
                self.visit_expression(program, *test);
            }
        }
    }

    fn add_candidate(&mut self, program: &Program, expr: ExprId) {
        let symbols = *self
            .symbol_table_stack
            .last()
            .expect("symbol-table stack is empty");
        let enclosing_stmt = *self
            .enclosing_stmt_stack
            .last()
            .expect("enclosing-statement stack is empty");
        let parent_is_control_flow = self
            .find_parent_statement(program)
            .map(|parent| {
                matches!(
                    program.stmts[parent].kind,
                    StmtKind::If { .. }
                        | StmtKind::For { .. }
                        | StmtKind::While { .. }
                        | StmtKind::Do { .. }
                )
            })
            .unwrap_or(false);
        self.candidates.push(InlineCandidate {
            symbols,
            parent_is_control_flow,
            enclosing_stmt,
            candidate_expr: expr,
        });
    }

    /// Walks the enclosing-statement stack from the back, skipping the
    /// enclosing statement itself. Anything counts as a parent other than a
    /// scopeless block.
    fn find_parent_statement(&self, program: &Program) -> Option<StmtId> {
        self.enclosing_stmt_stack
            .iter()
            .rev()
            .skip(1)
            .copied()
            .find(|&stmt| {
                !matches!(
                    program.stmts[stmt].kind,
                    StmtKind::Block { is_scope: false, .. }
                )
            })
    }
}

/// Runs the inliner to fixpoint (or until the pass cap is reached, which
/// bounds pathological growth when single-use callees chain deeply).
pub fn inline_program(program: &mut Program, settings: &Settings) -> bool {
    let mut inliner = Inliner::new(program.context, settings.clone());
    let function_count = program.function_definitions().count();
    let max_passes = MAX_INLINE_PASSES_PER_FUNCTION * function_count.max(1);

    let mut made_changes = false;
    for pass in 0..max_passes {
        if !inliner.analyze(program) {
            debug!("inlining converged after {} pass(es)", pass);
            break;
        }
        made_changes = true;
    }
    made_changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Caps;

    fn test_inliner(program: &Program) -> Inliner {
        Inliner::new(program.context, Settings::default())
    }

    #[test]
    fn test_unique_names_avoid_double_underscores() {
        let program = Program::new();
        let mut inliner = test_inliner(&program);
        let root = program.root_symbols;

        let name = inliner.unique_name_for_inline_var(&program, "_coords", root);
        assert_eq!(name, "_0_coords");
        assert!(!name.contains("__"));

        let name = inliner.unique_name_for_inline_var(&program, "pos", root);
        assert_eq!(name, "_1_pos");
    }

    #[test]
    fn test_unique_name_retries_past_taken_names() {
        let mut program = Program::new();
        let root = program.root_symbols;
        let int = program.context.int_type;
        program
            .define_local(root, "_0_x", int, Modifiers::empty())
            .expect("defining _0_x failed");

        let mut inliner = test_inliner(&program);
        assert_eq!(inliner.unique_name_for_inline_var(&program, "x", root), "_1_x");
    }

    #[test]
    fn test_name_counter_persists_across_call_sites() {
        let program = Program::new();
        let root = program.root_symbols;
        let mut inliner = test_inliner(&program);

        assert_eq!(inliner.unique_name_for_inline_var(&program, "a", root), "_0_a");
        assert_eq!(inliner.unique_name_for_inline_var(&program, "b", root), "_1_b");
        inliner.reset(program.context, Settings::default());
        assert_eq!(inliner.unique_name_for_inline_var(&program, "c", root), "_0_c");
    }

    #[test]
    fn test_scope_repair_forces_scope_under_control_flow() {
        let mut program = Program::new();
        let a = program.nop(0);
        let b = program.nop(0);
        let body = program.block(0, vec![a, b], None, false);

        ensure_scoped_blocks(&mut program, body, true);
        assert!(matches!(
            program.stmts[body].kind,
            StmtKind::Block { is_scope: true, .. }
        ));
    }

    #[test]
    fn test_scope_repair_leaves_non_control_flow_parents_alone() {
        let mut program = Program::new();
        let a = program.nop(0);
        let b = program.nop(0);
        let body = program.block(0, vec![a, b], None, false);

        ensure_scoped_blocks(&mut program, body, false);
        assert!(matches!(
            program.stmts[body].kind,
            StmtKind::Block { is_scope: false, .. }
        ));
    }

    #[test]
    fn test_scope_repair_descends_into_single_scoped_child() {
        let mut program = Program::new();
        let stmt = program.nop(0);
        let inner = program.block(0, vec![stmt], None, true);
        let outer = program.block(0, vec![inner], None, false);

        // The nested block already provides the scope.
        ensure_scoped_blocks(&mut program, outer, true);
        assert!(matches!(
            program.stmts[outer].kind,
            StmtKind::Block { is_scope: false, .. }
        ));
    }

    #[test]
    fn test_scope_repair_scopes_single_non_scope_child_chain() {
        let mut program = Program::new();
        let a = program.nop(0);
        let b = program.nop(0);
        let inner = program.block(0, vec![a, b], None, false);
        let outer = program.block(0, vec![inner], None, false);

        ensure_scoped_blocks(&mut program, outer, true);
        assert!(matches!(
            program.stmts[outer].kind,
            StmtKind::Block { is_scope: true, .. }
        ));
    }

    #[test]
    fn test_not_safe_without_a_definition() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let f = program
            .declare_function("extern_fn", int, vec![], Modifiers::empty())
            .expect("declaring extern_fn failed");
        let call = program.call(0, f, vec![]).expect("building call failed");

        let inliner = test_inliner(&program);
        assert!(!inliner.is_safe_to_inline(&program, call, usize::MAX));
    }

    #[test]
    fn test_threshold_blocks_large_unmarked_functions() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let f = program
            .declare_function("big", int, vec![], Modifiers::empty())
            .expect("declaring big failed");
        let zero = program.int_literal(0, 0);
        let ret = program.return_stmt(0, Some(zero));
        let body = program.block(0, vec![ret], None, true);
        program
            .define_function_body(f, body)
            .expect("defining body failed");
        let call = program.call(0, f, vec![]).expect("building call failed");

        let inliner = test_inliner(&program);
        // block + return + literal = 3 nodes
        assert!(!inliner.is_safe_to_inline(&program, call, 3));
        assert!(inliner.is_safe_to_inline(&program, call, 4));
        // A speculative pass ignores size entirely.
        assert!(inliner.is_safe_to_inline(&program, call, usize::MAX));
    }

    #[test]
    fn test_inline_modifier_overrides_threshold() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let f = program
            .declare_function("forced", int, vec![], Modifiers::INLINE)
            .expect("declaring forced failed");
        let zero = program.int_literal(0, 0);
        let ret = program.return_stmt(0, Some(zero));
        let body = program.block(0, vec![ret], None, true);
        program
            .define_function_body(f, body)
            .expect("defining body failed");
        let call = program.call(0, f, vec![]).expect("building call failed");

        let inliner = test_inliner(&program);
        assert!(inliner.is_safe_to_inline(&program, call, 1));
    }

    #[test]
    fn test_no_do_loops_blocks_early_returns() {
        let mut program = Program::new();
        let void = program.context.void_type;
        let bool_type = program.context.bool_type;
        let c = program
            .define_global("c", bool_type, Modifiers::empty())
            .expect("defining c failed");
        let f = program
            .declare_function("maybe", void, vec![], Modifiers::empty())
            .expect("declaring maybe failed");

        // The trailing discard keeps the return away from the tail position.
        let c_ref = program.var_ref(0, c, RefKind::Read);
        let early = program.return_stmt(0, None);
        let if_stmt = program.if_stmt(0, c_ref, early, None);
        let discard = program.discard_stmt(0);
        let body = program.block(0, vec![if_stmt, discard], None, true);
        program
            .define_function_body(f, body)
            .expect("defining body failed");
        let call = program.call(0, f, vec![]).expect("building call failed");

        let restricted = Inliner::new(program.context, Settings::with_caps(Caps::no_do_loops()));
        assert!(!restricted.is_safe_to_inline(&program, call, usize::MAX));

        let permissive = test_inliner(&program);
        assert!(permissive.is_safe_to_inline(&program, call, usize::MAX));
    }

    #[test]
    fn test_non_function_elements_are_skipped() {
        let mut program = Program::new();
        let int = program.context.int_type;
        let g = program
            .define_global("g", int, Modifiers::UNIFORM)
            .expect("defining g failed");
        let decl = program.var_decl_stmt(0, g, None);
        program.append_global_var(decl);
        program.append_interface_block(g);

        let mut inliner = test_inliner(&program);
        assert!(!inliner.analyze(&mut program));
    }

    #[test]
    fn test_return_inside_breakable_blocks_inlining() {
        let mut program = Program::new();
        let void = program.context.void_type;
        let f = program
            .declare_function("loopy", void, vec![], Modifiers::empty())
            .expect("declaring loopy failed");

        let cond = program.bool_literal(0, true);
        let ret = program.return_stmt(0, None);
        let loop_body = program.block(0, vec![ret], None, true);
        let while_stmt = program.while_stmt(0, cond, loop_body);
        let body = program.block(0, vec![while_stmt], None, true);
        program
            .define_function_body(f, body)
            .expect("defining body failed");
        let call = program.call(0, f, vec![]).expect("building call failed");

        // Even with do-loops available there is no way to lower a return
        // from inside a breakable construct.
        let inliner = test_inliner(&program);
        assert!(!inliner.is_safe_to_inline(&program, call, usize::MAX));
    }
}
