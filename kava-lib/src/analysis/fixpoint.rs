use std::cmp::Reverse;
use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use lattice::dv::{CauseSet, Dv};
use lattice::props::{
    Finality, Immutability, Independence, Modification, Nullness, PropertyKind, PropertyValue,
};
use priority_queue::PriorityQueue;

use super::link::{LinkLevel, links_for_value};
use super::results::AnalysisRegistry;
use super::state::{Environment, Receiver, VariableId};
use super::stmt::{MethodSummary, StatementAnalysis, analyse_method};
use super::value::{CalleeRef, Value};
use super::{ElementRef, describe_cause, property_cause, unpack_cause, value_cause};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::facts::builtin_facts;
use crate::sema::{Block, Expr, ExprId, MethodId, Stmt, Type, Unit};

pub struct AnalysisOptions {
    /// Hard ceiling on fixpoint iterations; facts still delayed when it is
    /// reached are reported instead of resolved.
    pub max_iterations: usize,
}

impl Default for AnalysisOptions {
    fn default() -> AnalysisOptions {
        AnalysisOptions { max_iterations: 20 }
    }
}

/// Everything the fixpoint produced: the frozen registry of derived facts,
/// the accumulated diagnostics, the per-statement variable states of the
/// last iteration, and the exit state of every method body.
pub struct AnalysisResult {
    pub registry: AnalysisRegistry,
    pub diagnostics: Diagnostics,
    pub statements: HashMap<crate::sema::StmtId, StatementAnalysis>,
    pub exit_envs: HashMap<MethodId, Environment>,
    pub iterations: usize,
    pub converged: bool,
}

/// Runs the whole-program analysis to a global fixpoint. Every iteration
/// walks all method bodies in dependency order (callees before callers,
/// cycles share a rank) and republishes the derived facts; the loop stops
/// when everything resolved, when an iteration makes no progress, or at
/// the iteration ceiling.
pub fn analyze(unit: &Unit, options: &AnalysisOptions) -> AnalysisResult {
    let mut registry = AnalysisRegistry::new(unit);
    let mut diagnostics = Diagnostics::new();
    let mut statements: HashMap<crate::sema::StmtId, StatementAnalysis> = HashMap::new();
    let mut exit_envs: HashMap<MethodId, Environment> = HashMap::new();

    seed_value_type_facts(unit, &mut registry);
    let ranks = dependency_ranks(unit);

    let mut iterations = 0;
    let mut converged = false;
    for iteration in 0..options.max_iterations {
        iterations = iteration + 1;
        // Path-sensitive diagnostics consult the registry while walking the
        // bodies, so once everything is resolved one more full walk runs
        // before the loop stops.
        let resolved_at_start = registry.is_fully_resolved();
        let progress_before = registry.resolved_fact_count();
        registry.clear_field_values();
        let mut written = FixedBitSet::with_capacity(unit.fields.len());
        let mut written_outside_ctor = FixedBitSet::with_capacity(unit.fields.len());

        let mut worklist: PriorityQueue<MethodId, Reverse<(usize, usize)>> = PriorityQueue::new();
        for method in unit.method_iter() {
            worklist.push(method, Reverse((ranks[method.0], method.0)));
        }
        while let Some((method, _)) = worklist.pop() {
            let summary = analyse_method(
                unit,
                &registry,
                &mut diagnostics,
                method,
                iteration,
                &mut statements,
            );
            apply_method_facts(
                unit,
                &mut registry,
                method,
                &summary,
                &mut written,
                &mut written_outside_ctor,
            );
            exit_envs.insert(method, summary.exit_env);
        }

        apply_field_facts(unit, &mut registry, &written, &written_outside_ctor, &exit_envs);
        apply_class_facts(unit, &mut registry);

        if resolved_at_start {
            converged = true;
            break;
        }
        if registry.is_fully_resolved() {
            continue;
        }
        if registry.resolved_fact_count() == progress_before {
            // No fact resolved in a whole iteration: the remaining delays
            // form a dependency cycle that another pass cannot break.
            break;
        }
    }

    if !converged {
        report_delayed_facts(unit, &registry, &mut diagnostics);
    }
    registry.freeze();

    AnalysisResult {
        registry,
        diagnostics,
        statements,
        exit_envs,
        iterations,
        converged,
    }
}

/// Value types carry no object identity, so their modification and
/// independence dimensions are settled before the first iteration.
fn seed_value_type_facts(unit: &Unit, registry: &mut AnalysisRegistry) {
    for param in unit.param_iter() {
        if unit.param(param).ty.is_value_type() {
            registry.update_param_prop(
                param,
                PropertyKind::Modified,
                Dv::Resolved(PropertyValue::Modification(Modification::NotModified)),
            );
            registry.update_param_prop(
                param,
                PropertyKind::Independent,
                Dv::Resolved(PropertyValue::NotInvolved),
            );
        }
    }
    for method in unit.method_iter() {
        if unit.method(method).ret.is_value_type() {
            registry.update_method_prop(
                method,
                PropertyKind::Independent,
                Dv::Resolved(PropertyValue::NotInvolved),
            );
        }
    }
}

//
// Analysis order.
//

/// Ranks methods so that callees are analysed before their callers within
/// one iteration; members of a call cycle end up on a shared capped rank.
fn dependency_ranks(unit: &Unit) -> Vec<usize> {
    let method_count = unit.methods.len();
    let callees: Vec<FixedBitSet> = unit
        .method_iter()
        .map(|method| direct_callees(unit, method))
        .collect();
    let mut ranks = vec![0usize; method_count];
    for _ in 0..method_count {
        let mut changed = false;
        for caller in 0..method_count {
            for callee in callees[caller].ones() {
                if callee == caller {
                    continue;
                }
                let candidate = (ranks[callee] + 1).min(method_count);
                if candidate > ranks[caller] {
                    ranks[caller] = candidate;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    ranks
}

fn direct_callees(unit: &Unit, method: MethodId) -> FixedBitSet {
    let mut callees = FixedBitSet::with_capacity(unit.methods.len());
    collect_callees_block(unit, &unit.method(method).body, &mut callees);
    callees
}

fn collect_callees_block(unit: &Unit, block: &Block, out: &mut FixedBitSet) {
    for &stmt in &block.stmts {
        match &unit.stmt(stmt).stmt {
            Stmt::Local { init, .. } => {
                if let Some(init) = init {
                    collect_callees_expr(unit, *init, out);
                }
            }
            Stmt::Expr { expr } => collect_callees_expr(unit, *expr, out),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                collect_callees_expr(unit, *cond, out);
                collect_callees_block(unit, then_block, out);
                if let Some(else_block) = else_block {
                    collect_callees_block(unit, else_block, out);
                }
            }
            Stmt::While { cond, body } => {
                collect_callees_expr(unit, *cond, out);
                collect_callees_block(unit, body, out);
            }
            Stmt::ForEach {
                iterable, body, ..
            } => {
                collect_callees_expr(unit, *iterable, out);
                collect_callees_block(unit, body, out);
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    collect_callees_expr(unit, *value, out);
                }
            }
            Stmt::Throw { value } => collect_callees_expr(unit, *value, out),
            Stmt::Break | Stmt::Continue => {}
        }
    }
}

fn collect_callees_expr(unit: &Unit, expr: ExprId, out: &mut FixedBitSet) {
    match &unit.expr(expr).expr {
        Expr::ListLit(elems) => {
            for &elem in elems {
                collect_callees_expr(unit, elem, out);
            }
        }
        Expr::FieldGet { receiver, .. } => collect_callees_expr(unit, *receiver, out),
        Expr::Call {
            receiver,
            callee,
            args,
        } => {
            if let crate::sema::Callee::Method(method) = callee {
                out.insert(method.0);
            }
            if let Some(receiver) = receiver {
                collect_callees_expr(unit, *receiver, out);
            }
            for &arg in args {
                collect_callees_expr(unit, arg, out);
            }
        }
        Expr::New { ctor, args, .. } => {
            out.insert(ctor.0);
            for &arg in args {
                collect_callees_expr(unit, arg, out);
            }
        }
        Expr::Unary { operand, .. } => collect_callees_expr(unit, *operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_callees_expr(unit, *lhs, out);
            collect_callees_expr(unit, *rhs, out);
        }
        Expr::Cond {
            cond,
            then_val,
            else_val,
        } => {
            collect_callees_expr(unit, *cond, out);
            collect_callees_expr(unit, *then_val, out);
            collect_callees_expr(unit, *else_val, out);
        }
        Expr::Assign { target, value } => {
            collect_callees_expr(unit, *target, out);
            collect_callees_expr(unit, *value, out);
        }
        _ => {}
    }
}

//
// Publishing method facts.
//

fn apply_method_facts(
    unit: &Unit,
    registry: &mut AnalysisRegistry,
    method: MethodId,
    summary: &MethodSummary,
    written: &mut FixedBitSet,
    written_outside_ctor: &mut FixedBitSet,
) {
    let decl = unit.method(method);

    // Receiver modification: what the body reported directly, joined with
    // the modification state of every field of `this` at exit.
    let mut modified = summary.outcome.this_modified.clone();
    for (var, info) in &summary.exit_env.vars {
        if matches!(
            var.unwrap_loop_copy(),
            VariableId::Field {
                receiver: Receiver::This,
                ..
            }
        ) {
            if let Some(field_modified) = info.props.get(PropertyKind::Modified) {
                modified = modified.join(field_modified);
            }
        }
    }
    let modified = drop_self_delay(
        modified,
        property_cause(ElementRef::Method(method), PropertyKind::Modified),
        PropertyKind::Modified,
    );
    registry.update_method_prop(method, PropertyKind::Modified, modified);

    for &param in &decl.params {
        let ty = &unit.param(param).ty;
        if ty.is_value_type() {
            continue;
        }
        let var = VariableId::Param(param);
        let info = summary.exit_env.get(&var);

        let param_modified = info
            .and_then(|i| i.props.get(PropertyKind::Modified))
            .cloned()
            .unwrap_or(Dv::Resolved(PropertyValue::Modification(
                Modification::NotModified,
            )));
        let param_modified = drop_self_delay(
            param_modified,
            property_cause(ElementRef::Param(param), PropertyKind::Modified),
            PropertyKind::Modified,
        );
        registry.update_param_prop(param, PropertyKind::Modified, param_modified);

        // A parameter narrowed to not-null on every path was dereferenced
        // unconditionally; callers must not pass null for it. Once the body
        // reassigns the parameter its exit state describes the new content,
        // not the incoming value, so no contract is published.
        let reassigned = info.is_some_and(|i| !i.assignments.is_empty());
        let nullness = if reassigned {
            Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable))
        } else {
            info.and_then(|i| i.props.get(PropertyKind::NotNull))
                .cloned()
                .unwrap_or(Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)))
        };
        registry.update_param_prop(param, PropertyKind::NotNull, nullness);

        let level = stored_link_level(&summary.exit_env, &var);
        let independence = drop_self_delay(
            level_to_independence(level),
            property_cause(ElementRef::Param(param), PropertyKind::Independent),
            PropertyKind::Independent,
        );
        registry.update_param_prop(param, PropertyKind::Independent, independence);
    }

    if !decl.ret.is_value_type() {
        apply_return_facts(unit, registry, method, summary);
    }
    apply_method_value(unit, registry, method, summary);

    if let Some(precondition) = summary.precondition {
        registry.set_precondition(method, precondition);
    }
    if let Some(field) = summary.marks {
        registry.set_marks(method, field);
    }

    // Field write bookkeeping for finality, and the written values for the
    // field analysis.
    for write in &summary.outcome.field_writes {
        registry.add_field_value(write.field, write.value.clone());
    }
    for (var, info) in &summary.exit_env.vars {
        let VariableId::Field { field, receiver } = var.unwrap_loop_copy() else {
            continue;
        };
        if info.assignments.is_empty() {
            continue;
        }
        written.insert(field.0);
        let in_own_ctor = decl.is_constructor && *receiver == Receiver::This;
        if !in_own_ctor {
            written_outside_ctor.insert(field.0);
        }
    }
}

/// Return value nullness and independence of a reference-returning method.
fn apply_return_facts(
    unit: &Unit,
    registry: &mut AnalysisRegistry,
    method: MethodId,
    summary: &MethodSummary,
) {
    let ret_ty = &unit.method(method).ret;

    let nullness = Dv::join_all(
        summary
            .outcome
            .returns
            .iter()
            .map(|(_, value)| value_nullness(unit, registry, value))
            .collect::<Vec<_>>()
            .iter(),
    )
    .unwrap_or(Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)));
    let nullness = drop_self_delay(
        nullness,
        property_cause(ElementRef::Method(method), PropertyKind::NotNull),
        PropertyKind::NotNull,
    );
    registry.update_method_prop(method, PropertyKind::NotNull, nullness);

    let mut level = Dv::Resolved(LinkLevel::Independent);
    for (_, value) in &summary.outcome.returns {
        let links = links_for_value(unit, registry, value, ret_ty);
        for (var, link) in links.iter() {
            if matches!(
                var.unwrap_loop_copy(),
                VariableId::Field {
                    receiver: Receiver::This,
                    ..
                }
            ) {
                level = level.meet(link);
            }
        }
        let delays = value.delays();
        if !delays.is_empty() {
            level = level.meet(&Dv::delayed_on(delays));
        }
    }
    let independence = drop_self_delay(
        level_to_independence(level),
        property_cause(ElementRef::Method(method), PropertyKind::Independent),
        PropertyKind::Independent,
    );
    registry.update_method_prop(method, PropertyKind::Independent, independence);
}

/// Resolves the method's computed return value once no part of it is
/// blocked. Direct recursion only blocks on the method itself; it resolves
/// to "no computable value" and call sites keep the call symbolic.
fn apply_method_value(
    unit: &Unit,
    registry: &mut AnalysisRegistry,
    method: MethodId,
    summary: &MethodSummary,
) {
    if registry.method(method).value_resolved {
        return;
    }
    let mut delays = CauseSet::new();
    for (path_cond, value) in &summary.outcome.returns {
        delays.merge(&path_cond.delays());
        delays.merge(&value.delays());
    }
    let own = value_cause(method);
    let self_recursive = delays.contains(own);
    let remaining: CauseSet = delays.iter().filter(|&cause| cause != own).collect();
    if !remaining.is_empty() {
        return;
    }
    if self_recursive || unit.method(method).ret == Type::Void {
        registry.set_method_value(method, None, None);
        return;
    }

    let mut returned: Option<Value> = None;
    for (path_cond, value) in summary.outcome.returns.iter().rev() {
        returned = Some(match returned {
            None => value.clone(),
            Some(rest) => Value::cond(path_cond.clone(), value.clone(), rest),
        });
    }
    let inlined = returned
        .clone()
        .filter(|value| summary.outcome.pure && value.mentions_only_params());
    registry.set_method_value(method, returned, inlined);
}

//
// Publishing field and class facts.
//

fn apply_field_facts(
    unit: &Unit,
    registry: &mut AnalysisRegistry,
    written: &FixedBitSet,
    written_outside_ctor: &FixedBitSet,
    exit_envs: &HashMap<MethodId, Environment>,
) {
    for field in unit.field_iter() {
        let ty = unit.field(field).ty.clone();

        let finality = if written_outside_ctor.contains(field.0) {
            Finality::Variable
        } else {
            Finality::Final
        };
        registry.update_field_prop(
            field,
            PropertyKind::Final,
            Dv::Resolved(PropertyValue::Finality(finality)),
        );

        if ty.is_value_type() {
            registry.update_field_prop(
                field,
                PropertyKind::Modified,
                Dv::Resolved(PropertyValue::Modification(Modification::NotModified)),
            );
            continue;
        }

        // Content modification anywhere in the program, spread through the
        // per-method exit states.
        let mut modified = Dv::Resolved(PropertyValue::Modification(Modification::NotModified));
        for env in exit_envs.values() {
            for (var, info) in &env.vars {
                let VariableId::Field { field: f, .. } = var.unwrap_loop_copy() else {
                    continue;
                };
                if *f != field {
                    continue;
                }
                if let Some(m) = info.props.get(PropertyKind::Modified) {
                    modified = modified.join(m);
                }
            }
        }
        let modified = drop_self_delay(
            modified,
            property_cause(ElementRef::Field(field), PropertyKind::Modified),
            PropertyKind::Modified,
        );
        registry.update_field_prop(field, PropertyKind::Modified, modified);

        // Nullness: the join over every assigned value; a field nobody
        // assigns keeps its default null content.
        let nullness = if !written.contains(field.0) {
            Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable))
        } else {
            let values = registry.field(field).values.clone();
            Dv::join_all(
                values
                    .iter()
                    .map(|value| value_nullness(unit, registry, value))
                    .collect::<Vec<_>>()
                    .iter(),
            )
            .unwrap_or(Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)))
        };
        let nullness = drop_self_delay(
            nullness,
            property_cause(ElementRef::Field(field), PropertyKind::NotNull),
            PropertyKind::NotNull,
        );
        registry.update_field_prop(field, PropertyKind::NotNull, nullness);
    }
}

fn apply_class_facts(unit: &Unit, registry: &mut AnalysisRegistry) {
    for class in unit.class_iter() {
        // A marker method makes the class eventually immutable; its
        // instances are graded per call site instead of globally.
        let marks = unit
            .class(class)
            .methods
            .iter()
            .find_map(|&method| registry.method(method).marks);
        if let Some(field) = marks {
            if registry.class(class).eventual.is_none() {
                registry.set_class_eventual(class, field);
            }
            registry.update_class_prop(
                class,
                PropertyKind::Immutable,
                Dv::Resolved(PropertyValue::Immutability(Immutability::EventualBefore)),
            );
            continue;
        }

        let mut causes = CauseSet::new();
        let mut mutable = false;
        let mut recursive = true;
        for &field in &unit.class(class).fields {
            match registry.field(field).props.get_or_delayed(
                PropertyKind::Final,
                property_cause(ElementRef::Field(field), PropertyKind::Final),
            ) {
                Dv::Resolved(PropertyValue::Finality(Finality::Variable)) => mutable = true,
                Dv::Resolved(_) => {}
                Dv::Delayed(more) => causes.merge(&more),
            }
            match registry.field(field).props.get_or_delayed(
                PropertyKind::Modified,
                property_cause(ElementRef::Field(field), PropertyKind::Modified),
            ) {
                Dv::Resolved(PropertyValue::Modification(Modification::Modified)) => mutable = true,
                Dv::Resolved(_) => {}
                Dv::Delayed(more) => causes.merge(&more),
            }
            match type_immutability(registry, class, &unit.field(field).ty) {
                Dv::Resolved(deep) => recursive &= deep,
                Dv::Delayed(more) => causes.merge(&more),
            }
        }

        let immutability = if mutable {
            Dv::Resolved(PropertyValue::Immutability(Immutability::Mutable))
        } else if !causes.is_empty() {
            Dv::delayed_on(causes)
        } else if recursive {
            Dv::Resolved(PropertyValue::Immutability(Immutability::Recursive))
        } else {
            Dv::Resolved(PropertyValue::Immutability(Immutability::Effective))
        };
        registry.update_class_prop(class, PropertyKind::Immutable, immutability);
    }
}

/// Whether values of the type are immutable all the way down. Recursion
/// into the class under grading is taken as immutable; only an actual
/// mutable reachable part breaks the grade.
fn type_immutability(
    registry: &AnalysisRegistry,
    grading: crate::sema::ClassId,
    ty: &Type,
) -> Dv<bool> {
    match ty {
        Type::Int | Type::Bool | Type::Str | Type::Void | Type::Null => Dv::Resolved(true),
        // The list container itself is mutable content.
        Type::List(_) => Dv::Resolved(false),
        Type::Class(class) => {
            if *class == grading {
                return Dv::Resolved(true);
            }
            match registry.class(*class).props.get_or_delayed(
                PropertyKind::Immutable,
                property_cause(ElementRef::Class(*class), PropertyKind::Immutable),
            ) {
                Dv::Resolved(PropertyValue::Immutability(Immutability::Recursive)) => {
                    Dv::Resolved(true)
                }
                Dv::Resolved(_) => Dv::Resolved(false),
                Dv::Delayed(causes) => Dv::Delayed(causes),
            }
        }
    }
}

//
// Shared helpers.
//

/// Nullness of a stored or returned value, consulting the registry for the
/// symbolic parts.
fn value_nullness(unit: &Unit, registry: &AnalysisRegistry, value: &Value) -> Dv<PropertyValue> {
    if let Some(nullness) = value.nullness() {
        return Dv::Resolved(PropertyValue::Nullness(nullness));
    }
    match value {
        Value::Variable(var) => match var.unwrap_loop_copy() {
            VariableId::Field { field, .. } if unit.field(*field).ty.is_nullable() => registry
                .field(*field)
                .props
                .get_or_delayed(
                    PropertyKind::NotNull,
                    property_cause(ElementRef::Field(*field), PropertyKind::NotNull),
                ),
            _ => Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)),
        },
        Value::ReturnOf {
            callee: CalleeRef::Method(method),
            ..
        } => {
            if unit.method(*method).is_constructor {
                return Dv::Resolved(PropertyValue::Nullness(Nullness::NotNull));
            }
            registry.method(*method).props.get_or_delayed(
                PropertyKind::NotNull,
                property_cause(ElementRef::Method(*method), PropertyKind::NotNull),
            )
        }
        Value::ReturnOf {
            callee: CalleeRef::Builtin(builtin),
            ..
        } => match builtin_facts(*builtin).result_nullness {
            Some(nullness) => Dv::Resolved(PropertyValue::Nullness(nullness)),
            None => Dv::Resolved(PropertyValue::Nullness(Nullness::NotNull)),
        },
        Value::Cond {
            then_val, else_val, ..
        } => value_nullness(unit, registry, then_val)
            .join(&value_nullness(unit, registry, else_val)),
        Value::Delayed(causes) => Dv::delayed_on(causes.clone()),
        _ => Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)),
    }
}

/// The strongest tie between the given variable and any field of `this`,
/// i.e. how strongly the object's state captured it.
fn stored_link_level(env: &Environment, target: &VariableId) -> Dv<LinkLevel> {
    let mut level = Dv::Resolved(LinkLevel::Independent);
    for (var, info) in &env.vars {
        if !matches!(
            var.unwrap_loop_copy(),
            VariableId::Field {
                receiver: Receiver::This,
                ..
            }
        ) {
            continue;
        }
        if let Some(link) = info.linked.get(target) {
            level = level.meet(link);
        }
        let delays = info.value.delays();
        if !delays.is_empty() {
            level = level.meet(&Dv::delayed_on(delays));
        }
    }
    level
}

fn level_to_independence(level: Dv<LinkLevel>) -> Dv<PropertyValue> {
    match level {
        Dv::Resolved(LinkLevel::Identity) | Dv::Resolved(LinkLevel::Dependent) => {
            Dv::Resolved(PropertyValue::Independence(Independence::Dependent))
        }
        Dv::Resolved(LinkLevel::HiddenContent) => {
            Dv::Resolved(PropertyValue::Independence(Independence::HiddenContent))
        }
        Dv::Resolved(LinkLevel::Independent) => {
            Dv::Resolved(PropertyValue::Independence(Independence::Independent))
        }
        Dv::Delayed(causes) => Dv::Delayed(causes),
    }
}

/// An element whose fact is blocked only on that very fact depends on
/// nothing else; the cycle of one resolves to the dimension's best value.
/// Remaining foreign causes keep the delay alive.
fn drop_self_delay(
    value: Dv<PropertyValue>,
    own: lattice::dv::Cause,
    kind: PropertyKind,
) -> Dv<PropertyValue> {
    match value {
        Dv::Delayed(causes) if causes.contains(own) => {
            let remaining: CauseSet = causes.iter().filter(|&cause| cause != own).collect();
            if remaining.is_empty() {
                Dv::Resolved(PropertyValue::best_of(kind))
            } else {
                Dv::Delayed(remaining)
            }
        }
        other => other,
    }
}

fn report_delayed_facts(unit: &Unit, registry: &AnalysisRegistry, diags: &mut Diagnostics) {
    for cause in registry.all_delays().iter() {
        let (element, _) = unpack_cause(cause);
        let line = match element {
            ElementRef::Class(id) => unit.class(id).line,
            ElementRef::Field(id) => unit.field(id).line,
            ElementRef::Method(id) => unit.method(id).line,
            ElementRef::Param(id) => unit.param(id).line,
        };
        diags.report(
            line,
            DiagnosticKind::DelayedFacts,
            format!(
                "The analysis could not resolve {}; it is part of a dependency cycle.",
                describe_cause(unit, cause)
            ),
        );
    }
    for method in unit.method_iter() {
        if !registry.method(method).value_resolved {
            diags.report(
                unit.method(method).line,
                DiagnosticKind::DelayedFacts,
                format!(
                    "The analysis could not resolve {}.",
                    describe_cause(unit, value_cause(method))
                ),
            );
        }
    }
}
