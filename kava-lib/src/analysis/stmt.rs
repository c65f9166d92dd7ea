use std::collections::{BTreeMap, BTreeSet, HashMap};

use lattice::dv::{Dv, PropertyMap};
use lattice::props::{Modification, Nullness, PropertyKind, PropertyValue};

use super::eval::{Evaluator, MethodOutcome, resolve_receiver};
use super::flow::{ConditionManager, FlowData, Interrupt, Precondition, Reachability};
use super::link::{links_for_value, propagate_modification};
use super::results::AnalysisRegistry;
use super::state::{
    Environment, Receiver, VariableId, VariableInfo, VariableInfoContainer, merge_info,
};
use super::value::Value;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::sema::{Block, Expr, ExprId, FieldId, MethodId, Stmt, StmtId, Type, Unit};

/// Per-statement record kept across iterations: the three-level variable
/// state and the flow facts of the latest iteration.
#[derive(Debug, Clone, Default)]
pub struct StatementAnalysis {
    pub containers: BTreeMap<VariableId, VariableInfoContainer>,
    pub flow: Option<FlowData>,
}

/// What one iteration over a method produces, beyond diagnostics: the
/// outcome collected by the evaluator, the exit state of every variable,
/// and the recognized eventual immutability pattern.
#[derive(Debug, Clone)]
pub struct MethodSummary {
    pub outcome: MethodOutcome,
    pub exit_env: Environment,
    pub precondition: Option<Precondition>,
    pub marks: Option<FieldId>,
}

/// How a block hands control back to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockExit {
    /// The interrupt that is guaranteed to fire, if any; `None` means the
    /// block can fall through.
    interrupt: Option<Interrupt>,
    /// Whether a `break` may fire somewhere in the block.
    may_break: bool,
}

impl BlockExit {
    fn falls_through(&self) -> bool {
        self.interrupt.is_none()
    }
}

/// Walks one method body once, in evaluation order, threading the
/// environment through statements, forking it at branches, and merging it
/// back at join points.
pub struct MethodAnalyser<'a, 'st> {
    evaluator: Evaluator<'a>,
    method: MethodId,
    iteration: usize,
    statements: &'st mut HashMap<StmtId, StatementAnalysis>,
}

pub fn analyse_method<'a>(
    unit: &'a Unit,
    registry: &'a AnalysisRegistry,
    diags: &'a mut Diagnostics,
    method: MethodId,
    iteration: usize,
    statements: &mut HashMap<StmtId, StatementAnalysis>,
) -> MethodSummary {
    let mut analyser = MethodAnalyser {
        evaluator: Evaluator::new(unit, registry, diags, method),
        method,
        iteration,
        statements,
    };
    analyser.run()
}

impl MethodAnalyser<'_, '_> {
    fn unit(&self) -> &Unit {
        self.evaluator.unit
    }

    fn run(&mut self) -> MethodSummary {
        let unit = self.evaluator.unit;
        let mut env = Environment::new();
        for &param in &unit.method(self.method).params {
            env.ensure(VariableId::Param(param), unit);
        }
        let mut cond = ConditionManager::new();
        let mut out = MethodOutcome::new();

        let body = unit.method(self.method).body.clone();
        self.analyse_block(&body, &mut env, &mut cond, Reachability::Always, &mut out);

        let precondition = self.detect_precondition();
        let marks = precondition.and_then(|p| self.detect_marks(p.field, &out));

        self.report_unused_variables(&env);
        self.report_useless_assignments(&env);

        MethodSummary {
            outcome: out,
            exit_env: env,
            precondition,
            marks,
        }
    }

    fn analyse_block(
        &mut self,
        block: &Block,
        env: &mut Environment,
        cond: &mut ConditionManager,
        reach: Reachability,
        out: &mut MethodOutcome,
    ) -> BlockExit {
        let mut exit = BlockExit {
            interrupt: None,
            may_break: false,
        };
        let mut reported_unreachable = false;
        for &stmt in &block.stmts {
            if exit.interrupt.is_some() || reach == Reachability::Never {
                if !reported_unreachable {
                    self.evaluator.diags.report(
                        self.unit().stmt(stmt).line,
                        DiagnosticKind::UnreachableStatement,
                        "This statement is never executed.",
                    );
                    reported_unreachable = true;
                }
                if exit.interrupt.is_some() {
                    continue;
                }
            }
            let stmt_exit = self.analyse_stmt(stmt, env, cond, reach, out);
            exit.may_break |= stmt_exit.may_break;
            exit.interrupt = stmt_exit.interrupt;
        }
        exit
    }

    fn analyse_stmt(
        &mut self,
        stmt: StmtId,
        env: &mut Environment,
        cond: &mut ConditionManager,
        reach: Reachability,
        out: &mut MethodOutcome,
    ) -> BlockExit {
        let unit = self.evaluator.unit;
        let line = unit.stmt(stmt).line;
        let before = env.vars.clone();
        let mut merged_vars: BTreeSet<VariableId> = BTreeSet::new();
        let mut exit = BlockExit {
            interrupt: None,
            may_break: false,
        };

        match unit.stmt(stmt).stmt.clone() {
            Stmt::Local { local, init } => {
                let var = VariableId::Local(local);
                match init {
                    Some(init) => {
                        let value = self.evaluator.eval(init, env, cond, out);
                        let ty = unit.local(local).ty.clone();
                        let props = self.evaluator.props_for_assignment(&value, &ty, env, cond);
                        let linked =
                            links_for_value(unit, self.evaluator.registry, &value, &ty);
                        env.assign(var, value, props, linked, unit, line);
                    }
                    None => {
                        env.ensure(var, unit);
                    }
                }
            }
            Stmt::Expr { expr } => {
                self.evaluator.eval(expr, env, cond, out);
            }
            Stmt::If {
                cond: c,
                then_block,
                else_block,
            } => {
                exit = self.analyse_if(
                    c,
                    &then_block,
                    else_block.as_ref(),
                    env,
                    cond,
                    reach,
                    out,
                    line,
                    &mut merged_vars,
                );
            }
            Stmt::While { cond: c, body } => {
                exit = self.analyse_while(stmt, c, &body, env, cond, reach, out, line, &mut merged_vars);
            }
            Stmt::ForEach {
                local,
                iterable,
                body,
            } => {
                exit = self.analyse_foreach(
                    stmt,
                    local,
                    iterable,
                    &body,
                    env,
                    cond,
                    reach,
                    out,
                    line,
                    &mut merged_vars,
                );
            }
            Stmt::Return { value } => {
                let returned = match value {
                    Some(value) => self.evaluator.eval(value, env, cond, out),
                    None => Value::Instance { ty: Type::Void },
                };
                out.returns.push((cond.absolute().clone(), returned));
                exit.interrupt = Some(Interrupt::Return);
            }
            Stmt::Throw { value } => {
                self.evaluator.eval(value, env, cond, out);
                exit.interrupt = Some(Interrupt::Throw);
            }
            Stmt::Break => {
                exit.interrupt = Some(Interrupt::Break);
                exit.may_break = true;
            }
            Stmt::Continue => {
                exit.interrupt = Some(Interrupt::Continue);
            }
        }

        propagate_modification(env, unit);
        self.record_statement(stmt, &before, env, &merged_vars, reach, exit.interrupt);
        exit
    }

    #[allow(clippy::too_many_arguments)]
    fn analyse_if(
        &mut self,
        c: ExprId,
        then_block: &Block,
        else_block: Option<&Block>,
        env: &mut Environment,
        cond: &mut ConditionManager,
        reach: Reachability,
        out: &mut MethodOutcome,
        line: u32,
        merged_vars: &mut BTreeSet<VariableId>,
    ) -> BlockExit {
        let cond_value = self.evaluator.eval(c, env, cond, out);
        self.evaluator.check_constant_condition(&cond_value, line);
        let negated = cond_value.negated();

        let then_reach = match cond_value.as_bool() {
            Some(true) => reach,
            Some(false) => Reachability::Never,
            None => reach.nested(Reachability::Conditionally),
        };
        let else_reach = match cond_value.as_bool() {
            Some(true) => Reachability::Never,
            Some(false) => reach,
            None => reach.nested(Reachability::Conditionally),
        };

        let mut then_env = env.clone();
        let mut then_cond = cond.enter(&cond_value);
        let then_exit =
            self.analyse_block(then_block, &mut then_env, &mut then_cond, then_reach, out);

        let mut else_env = env.clone();
        let mut else_cond = cond.enter(&negated);
        let else_exit = match else_block {
            Some(block) => self.analyse_block(block, &mut else_env, &mut else_cond, else_reach, out),
            None => BlockExit {
                interrupt: None,
                may_break: false,
            },
        };

        let may_break = then_exit.may_break || else_exit.may_break;

        // A branch on a constant condition contributes its state alone.
        match cond_value.as_bool() {
            Some(true) => {
                *env = then_env;
                cond.adopt(&then_cond);
                return BlockExit {
                    interrupt: then_exit.interrupt,
                    may_break,
                };
            }
            Some(false) => {
                *env = else_env;
                cond.adopt(&else_cond);
                return BlockExit {
                    interrupt: else_exit.interrupt,
                    may_break,
                };
            }
            None => {}
        }

        match (then_exit.falls_through(), else_exit.falls_through()) {
            (true, true) => {
                let mut touched: BTreeSet<VariableId> = BTreeSet::new();
                touched.extend(changed_vars(env, &then_env));
                touched.extend(changed_vars(env, &else_env));
                for var in touched {
                    let symbolic = || {
                        VariableInfo::symbolic(var.clone(), &var.declared_type(self.unit()))
                    };
                    let then_info = then_env.get(&var).cloned().unwrap_or_else(symbolic);
                    let else_info = else_env.get(&var).cloned().unwrap_or_else(symbolic);
                    let merged = merge_info(&cond_value, &then_info, &else_info);
                    env.vars.insert(var.clone(), merged);
                    merged_vars.insert(var);
                }
                env.seq = then_env.seq.max(else_env.seq);
                BlockExit {
                    interrupt: None,
                    may_break,
                }
            }
            (true, false) => {
                // Only the then branch rejoins; its narrowings hold from
                // here on.
                *env = then_env;
                cond.adopt(&then_cond);
                BlockExit {
                    interrupt: None,
                    may_break,
                }
            }
            (false, true) => {
                *env = else_env;
                cond.adopt(&else_cond);
                BlockExit {
                    interrupt: None,
                    may_break,
                }
            }
            (false, false) => BlockExit {
                interrupt: combine_interrupts(then_exit.interrupt, else_exit.interrupt),
                may_break,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn analyse_while(
        &mut self,
        stmt: StmtId,
        c: ExprId,
        body: &Block,
        env: &mut Environment,
        cond: &mut ConditionManager,
        reach: Reachability,
        out: &mut MethodOutcome,
        line: u32,
        merged_vars: &mut BTreeSet<VariableId>,
    ) -> BlockExit {
        let cond_value = self.evaluator.eval(c, env, cond, out);

        if cond_value.as_bool() == Some(false) {
            self.evaluator.diags.report(
                line,
                DiagnosticKind::EmptyLoop,
                "The loop is never entered; its condition is always false.",
            );
            let mut dead_env = env.clone();
            let mut dead_cond = cond.enter(&cond_value);
            self.analyse_block(body, &mut dead_env, &mut dead_cond, Reachability::Never, out);
            return BlockExit {
                interrupt: None,
                may_break: false,
            };
        }

        let assigned = assigned_vars(self.unit(), body);
        let mut body_env = env.clone();
        body_env.in_loop = true;
        self.widen_loop_vars(stmt, &assigned, &mut body_env);

        let body_reach = match cond_value.as_bool() {
            Some(true) => reach,
            _ => reach.nested(Reachability::Conditionally),
        };
        let mut body_cond = cond.enter(&cond_value);
        let body_exit = self.analyse_block(body, &mut body_env, &mut body_cond, body_reach, out);

        self.merge_after_loop(stmt, &assigned, &BTreeSet::new(), env, &body_env, merged_vars);

        // An always-true condition with no way to break never lets
        // control continue past the loop.
        let interrupt = if cond_value.as_bool() == Some(true) && !body_exit.may_break {
            Some(Interrupt::Return)
        } else {
            None
        };
        BlockExit {
            interrupt,
            may_break: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn analyse_foreach(
        &mut self,
        stmt: StmtId,
        local: crate::sema::LocalId,
        iterable: ExprId,
        body: &Block,
        env: &mut Environment,
        cond: &mut ConditionManager,
        reach: Reachability,
        out: &mut MethodOutcome,
        line: u32,
        merged_vars: &mut BTreeSet<VariableId>,
    ) -> BlockExit {
        let unit = self.evaluator.unit;
        let iter_value = self.evaluator.eval(iterable, env, cond, out);

        if iter_value == Value::ListOf(Vec::new()) {
            self.evaluator.diags.report(
                line,
                DiagnosticKind::EmptyLoop,
                "The loop is never entered; the collection is always empty.",
            );
            let mut dead_env = env.clone();
            // Returns inside the dead body must not contribute to the
            // method's value; give them an unsatisfiable path condition.
            let mut dead_cond = cond.enter(&Value::BoolConst(false));
            self.analyse_block(body, &mut dead_env, &mut dead_cond, Reachability::Never, out);
            return BlockExit {
                interrupt: None,
                may_break: false,
            };
        }

        let guaranteed_entry = matches!(&iter_value, Value::ListOf(elems) if !elems.is_empty());

        let mut assigned = assigned_vars(unit, body);
        assigned.insert(VariableId::Local(local));
        let mut body_env = env.clone();
        body_env.in_loop = true;
        self.widen_loop_vars(stmt, &assigned, &mut body_env);

        // The loop variable starts every iteration holding some element
        // of the collection.
        let loop_var = VariableId::Local(local);
        let elem_ty = unit.local(local).ty.clone();
        let elem_value = match &iter_value {
            Value::ListOf(elems) if elems.len() == 1 => elems[0].clone(),
            _ => Value::Variable(VariableId::LoopCopy {
                base: Box::new(loop_var.clone()),
                stmt,
            }),
        };
        let mut props = PropertyMap::new();
        if elem_ty.is_nullable() {
            let nullness = match elem_value.nullness() {
                Some(nullness) => Dv::Resolved(PropertyValue::Nullness(nullness)),
                None => Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)),
            };
            props.set(PropertyKind::NotNull, nullness);
        }
        props.set_resolved(
            PropertyKind::Modified,
            PropertyValue::Modification(Modification::NotModified),
        );
        let linked = links_for_value(unit, self.evaluator.registry, &iter_value, &elem_ty);
        body_env.vars.insert(
            loop_var,
            VariableInfo::with_value(elem_value, props, linked),
        );

        let body_reach = if guaranteed_entry {
            reach
        } else {
            reach.nested(Reachability::Conditionally)
        };
        let mut body_cond = cond.clone();
        self.analyse_block(body, &mut body_env, &mut body_cond, body_reach, out);

        let fold_definite = guaranteed_entry;
        let definite = if fold_definite {
            definitely_assigned(unit, body)
        } else {
            BTreeSet::new()
        };
        self.merge_after_loop(stmt, &assigned, &definite, env, &body_env, merged_vars);

        BlockExit {
            interrupt: None,
            may_break: false,
        }
    }

    /// Variables assigned in a loop body lose their known value inside the
    /// body: each iteration starts from an unknown per-iteration copy.
    fn widen_loop_vars(
        &mut self,
        stmt: StmtId,
        assigned: &BTreeSet<VariableId>,
        body_env: &mut Environment,
    ) {
        let unit = self.evaluator.unit;
        for var in assigned {
            let copy = VariableId::LoopCopy {
                base: Box::new(var.clone()),
                stmt,
            };
            let info = body_env.ensure(var.clone(), unit);
            let marks = (info.reads.clone(), info.assignments.clone());
            let mut widened = VariableInfo::symbolic(copy, &var.declared_type(unit));
            widened.reads = marks.0;
            widened.assignments = marks.1;
            body_env.vars.insert(var.clone(), widened);
        }
    }

    /// After a loop, a variable assigned in the body holds the value of
    /// some iteration. Variables in `definite` were assigned by a body
    /// that provably ran, so their final body value survives as is; the
    /// rest widen to an unknown loop copy.
    fn merge_after_loop(
        &mut self,
        stmt: StmtId,
        assigned: &BTreeSet<VariableId>,
        definite: &BTreeSet<VariableId>,
        env: &mut Environment,
        body_env: &Environment,
        merged_vars: &mut BTreeSet<VariableId>,
    ) {
        let unit = self.evaluator.unit;
        for (var, body_info) in &body_env.vars {
            if matches!(var, VariableId::LoopCopy { .. }) {
                continue;
            }
            if let VariableId::Local(local) = var {
                // Locals scoped to the body (including the loop variable)
                // do not survive the loop.
                let declared_inside = !env.vars.contains_key(var)
                    && unit.local(*local).method == self.method;
                if declared_inside {
                    continue;
                }
            }
            let mut merged = body_info.clone();
            if assigned.contains(var) && !definite.contains(var) {
                let body_value_known = !matches!(
                    &body_info.value,
                    Value::Variable(VariableId::LoopCopy { .. })
                );
                let base = env.get(var).cloned().unwrap_or_else(|| {
                    VariableInfo::symbolic(var.clone(), &var.declared_type(unit))
                });
                if body_value_known && body_info.value == base.value {
                    merged.value = base.value.clone();
                } else {
                    merged.value = Value::Variable(VariableId::LoopCopy {
                        base: Box::new(var.clone()),
                        stmt,
                    });
                }
                merged.props = merged.props.join_with(&base.props);
                merged.linked = merged.linked.merged_with(&base.linked);
            }
            env.vars.insert(var.clone(), merged);
            merged_vars.insert(var.clone());
        }
        env.seq = env.seq.max(body_env.seq);
    }

    //
    // Pattern recognition for eventual immutability.
    //

    /// `if (this.flag) { throw ...; }` as the first statement proves the
    /// precondition "flag is unset on entry".
    fn detect_precondition(&self) -> Option<Precondition> {
        let unit = self.evaluator.unit;
        let body = &unit.method(self.method).body;
        let &first = body.stmts.first()?;
        let node = unit.stmt(first);
        let Stmt::If {
            cond,
            then_block,
            else_block: None,
        } = &node.stmt
        else {
            return None;
        };
        let Expr::FieldGet { receiver, field } = &unit.expr(*cond).expr else {
            return None;
        };
        if resolve_receiver(unit, *receiver) != Some(Receiver::This) {
            return None;
        }
        if unit.field(*field).ty != Type::Bool {
            return None;
        }
        let throws = then_block
            .stmts
            .iter()
            .any(|&s| matches!(unit.stmt(s).stmt, Stmt::Throw { .. }));
        throws.then_some(Precondition {
            field: *field,
            line: node.line,
        })
    }

    /// A method with a guard precondition that then raises the flag is the
    /// marker operation of its class.
    fn detect_marks(&self, field: FieldId, out: &MethodOutcome) -> Option<FieldId> {
        out.field_writes
            .iter()
            .any(|write| write.field == field && write.value == Value::BoolConst(true))
            .then_some(field)
    }

    //
    // Liveness diagnostics from the access marks of the exit state.
    //

    fn report_unused_variables(&mut self, env: &Environment) {
        let unit = self.evaluator.unit;
        for (var, info) in &env.vars {
            let VariableId::Local(local) = var else {
                continue;
            };
            if unit.local(*local).method != self.method {
                continue;
            }
            if info.reads.is_empty() {
                self.evaluator.diags.report(
                    unit.local(*local).line,
                    DiagnosticKind::UnusedVariable,
                    format!("'{}' is never read.", unit.local_name(*local)),
                );
            }
        }
    }

    fn report_useless_assignments(&mut self, env: &Environment) {
        let unit = self.evaluator.unit;
        for (var, info) in &env.vars {
            match var {
                VariableId::Local(_) | VariableId::Param(_) => {}
                VariableId::Field {
                    receiver: Receiver::This,
                    ..
                } => {}
                _ => continue,
            }
            let mut assignments = info.assignments.clone();
            assignments.sort();
            for pair in assignments.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                if first.in_loop || second.in_loop || first.merged || second.merged {
                    continue;
                }
                let read_between = info
                    .reads
                    .iter()
                    .any(|r| r.seq > first.seq && r.seq < second.seq);
                if !read_between {
                    self.evaluator.diags.report(
                        first.line,
                        DiagnosticKind::UselessAssignment,
                        format!(
                            "The value assigned to '{}' is overwritten before it is read.",
                            var.print(unit)
                        ),
                    );
                }
            }
        }
    }

    /// Stores the per-statement containers: variables the statement's own
    /// evaluation changed go to the evaluation level, variables changed by
    /// merging child branches go to the merge level.
    fn record_statement(
        &mut self,
        stmt: StmtId,
        before: &BTreeMap<VariableId, VariableInfo>,
        env: &Environment,
        merged_vars: &BTreeSet<VariableId>,
        reach: Reachability,
        interrupt: Option<Interrupt>,
    ) {
        let entry = self.statements.entry(stmt).or_default();
        entry.flow = Some(FlowData {
            reachability: reach,
            interrupt,
        });
        for (var, info) in &env.vars {
            if before.get(var) == Some(info) {
                continue;
            }
            let initial = before.get(var).cloned().unwrap_or_else(|| {
                VariableInfo::symbolic(var.clone(), &var.declared_type(self.evaluator.unit))
            });
            let container = entry
                .containers
                .entry(var.clone())
                .and_modify(|c| c.restart(initial.clone()))
                .or_insert_with(|| VariableInfoContainer::new(initial.clone()));
            if merged_vars.contains(var) {
                container.set_merge(info.clone());
            } else {
                container.set_evaluation(self.iteration, info.clone());
            }
        }
    }
}

fn combine_interrupts(a: Option<Interrupt>, b: Option<Interrupt>) -> Option<Interrupt> {
    match (a?, b?) {
        (x, y) if x == y => Some(x),
        (Interrupt::Break, _) | (_, Interrupt::Break) => Some(Interrupt::Break),
        (Interrupt::Continue, _) | (_, Interrupt::Continue) => Some(Interrupt::Continue),
        _ => Some(Interrupt::Return),
    }
}

fn changed_vars(base: &Environment, branch: &Environment) -> Vec<VariableId> {
    branch
        .vars
        .iter()
        .filter(|(var, info)| base.get(var) != Some(info))
        .map(|(var, _)| var.clone())
        .collect()
}

/// Syntactic scan for the storage locations a block may assign, including
/// nested blocks.
pub fn assigned_vars(unit: &Unit, block: &Block) -> BTreeSet<VariableId> {
    let mut result = BTreeSet::new();
    collect_assigned(unit, block, &mut result);
    result
}

fn collect_assigned(unit: &Unit, block: &Block, out: &mut BTreeSet<VariableId>) {
    for &stmt in &block.stmts {
        match &unit.stmt(stmt).stmt {
            Stmt::Local { init, .. } => {
                if let Some(init) = init {
                    collect_assigned_expr(unit, *init, out);
                }
            }
            Stmt::Expr { expr } => collect_assigned_expr(unit, *expr, out),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                collect_assigned_expr(unit, *cond, out);
                collect_assigned(unit, then_block, out);
                if let Some(else_block) = else_block {
                    collect_assigned(unit, else_block, out);
                }
            }
            Stmt::While { cond, body } => {
                collect_assigned_expr(unit, *cond, out);
                collect_assigned(unit, body, out);
            }
            Stmt::ForEach {
                iterable, body, ..
            } => {
                collect_assigned_expr(unit, *iterable, out);
                collect_assigned(unit, body, out);
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    collect_assigned_expr(unit, *value, out);
                }
            }
            Stmt::Throw { value } => collect_assigned_expr(unit, *value, out),
            Stmt::Break | Stmt::Continue => {}
        }
    }
}

fn collect_assigned_expr(unit: &Unit, expr: ExprId, out: &mut BTreeSet<VariableId>) {
    match &unit.expr(expr).expr {
        Expr::Assign { target, value } => {
            match &unit.expr(*target).expr {
                Expr::Local(local) => {
                    out.insert(VariableId::Local(*local));
                }
                Expr::Param(param) => {
                    out.insert(VariableId::Param(*param));
                }
                Expr::FieldGet { receiver, field } => {
                    if let Some(scope) = resolve_receiver(unit, *receiver) {
                        out.insert(VariableId::Field {
                            field: *field,
                            receiver: scope,
                        });
                    }
                }
                _ => {}
            }
            collect_assigned_expr(unit, *value, out);
        }
        Expr::ListLit(elems) => {
            for &elem in elems {
                collect_assigned_expr(unit, elem, out);
            }
        }
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                collect_assigned_expr(unit, *receiver, out);
            }
            for &arg in args {
                collect_assigned_expr(unit, arg, out);
            }
        }
        Expr::New { args, .. } => {
            for &arg in args {
                collect_assigned_expr(unit, arg, out);
            }
        }
        Expr::Unary { operand, .. } => collect_assigned_expr(unit, *operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_assigned_expr(unit, *lhs, out);
            collect_assigned_expr(unit, *rhs, out);
        }
        Expr::Cond {
            cond,
            then_val,
            else_val,
        } => {
            collect_assigned_expr(unit, *cond, out);
            collect_assigned_expr(unit, *then_val, out);
            collect_assigned_expr(unit, *else_val, out);
        }
        Expr::FieldGet { receiver, .. } => collect_assigned_expr(unit, *receiver, out),
        _ => {}
    }
}

/// Locations assigned by every full execution of the block: top level
/// assignments only, stopping at the first statement that can interrupt.
fn definitely_assigned(unit: &Unit, block: &Block) -> BTreeSet<VariableId> {
    let mut result = BTreeSet::new();
    for &stmt in &block.stmts {
        match &unit.stmt(stmt).stmt {
            Stmt::Expr { expr } => {
                if let Expr::Assign { target, .. } = &unit.expr(*expr).expr {
                    match &unit.expr(*target).expr {
                        Expr::Local(local) => {
                            result.insert(VariableId::Local(*local));
                        }
                        Expr::Param(param) => {
                            result.insert(VariableId::Param(*param));
                        }
                        Expr::FieldGet { receiver, field } => {
                            if let Some(scope) = resolve_receiver(unit, *receiver) {
                                result.insert(VariableId::Field {
                                    field: *field,
                                    receiver: scope,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            Stmt::Local { .. } => {}
            _ => break,
        }
    }
    result
}
