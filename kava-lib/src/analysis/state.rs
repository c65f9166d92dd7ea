use std::collections::BTreeMap;

use lattice::dv::{Dv, PropertyMap};
use lattice::props::{Nullness, PropertyKind, PropertyValue};

use super::link::LinkedVariables;
use super::value::Value;
use crate::sema::{FieldId, LocalId, MethodId, ParamId, StmtId, Type, Unit};

/// The object a field lives on, as far as the evaluator could resolve the
/// receiver expression. Field accesses through distinct receivers are
/// distinct storage locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Receiver {
    This,
    Local(LocalId),
    Param(ParamId),
}

/// Structural identity of a storage location within one analysed method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariableId {
    Local(LocalId),
    Param(ParamId),
    Field { field: FieldId, receiver: Receiver },
    /// The value the enclosing method returns.
    Return(MethodId),
    /// Per-iteration copy of a variable assigned inside a loop; its
    /// initial value is unknown because it depends on the iteration.
    LoopCopy { base: Box<VariableId>, stmt: StmtId },
}

impl VariableId {
    pub fn field_on_this(field: FieldId) -> VariableId {
        VariableId::Field {
            field,
            receiver: Receiver::This,
        }
    }

    /// The local or field identity behind loop copies.
    pub fn unwrap_loop_copy(&self) -> &VariableId {
        match self {
            VariableId::LoopCopy { base, .. } => base.unwrap_loop_copy(),
            other => other,
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self.unwrap_loop_copy(), VariableId::Field { .. })
    }

    pub fn declared_type(&self, unit: &Unit) -> Type {
        match self {
            VariableId::Local(local) => unit.local(*local).ty.clone(),
            VariableId::Param(param) => unit.param(*param).ty.clone(),
            VariableId::Field { field, .. } => unit.field(*field).ty.clone(),
            VariableId::Return(method) => unit.method(*method).ret.clone(),
            VariableId::LoopCopy { base, .. } => base.declared_type(unit),
        }
    }

    pub fn print(&self, unit: &Unit) -> String {
        match self {
            VariableId::Local(local) => unit.local_name(*local).to_owned(),
            VariableId::Param(param) => unit.param_name(*param).to_owned(),
            VariableId::Field { field, receiver } => {
                let receiver = match receiver {
                    Receiver::This => "this".to_owned(),
                    Receiver::Local(local) => unit.local_name(*local).to_owned(),
                    Receiver::Param(param) => unit.param_name(*param).to_owned(),
                };
                format!("{receiver}.{}", unit.field_name(*field))
            }
            VariableId::Return(method) => format!("return of {}", unit.method_name(*method)),
            VariableId::LoopCopy { base, .. } => format!("{}'", base.print(unit)),
        }
    }
}

/// A read or write of a variable: its position in the evaluation order of
/// the method and the source line, for liveness style diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccessMark {
    pub seq: u32,
    pub line: u32,
    /// Marks made inside a loop body recur on every iteration even though
    /// the body is walked once; liveness diagnostics must not trust their
    /// ordering.
    pub in_loop: bool,
    /// Marks that survived a branch merge without a counterpart in the
    /// other branch; they are not sequenced against marks outside their
    /// branch.
    pub merged: bool,
}

/// Everything the analysis knows about one variable at one program point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub value: Value,
    pub props: PropertyMap,
    pub linked: LinkedVariables,
    pub reads: Vec<AccessMark>,
    pub assignments: Vec<AccessMark>,
}

impl VariableInfo {
    /// Info for a location whose content is only known symbolically: the
    /// value is a reference to the location itself.
    pub fn symbolic(var: VariableId, ty: &Type) -> VariableInfo {
        let mut props = PropertyMap::new();
        if ty.is_nullable() {
            props.set_resolved(
                PropertyKind::NotNull,
                PropertyValue::Nullness(Nullness::Nullable),
            );
        }
        VariableInfo {
            value: Value::Variable(var),
            props,
            linked: LinkedVariables::new(),
            reads: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn with_value(value: Value, props: PropertyMap, linked: LinkedVariables) -> VariableInfo {
        VariableInfo {
            value,
            props,
            linked,
            reads: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn property(&self, kind: PropertyKind) -> Option<&Dv<PropertyValue>> {
        self.props.get(kind)
    }
}

/// The three levels of knowledge about a variable at one statement: the
/// state inherited from the previous statement, the state after evaluating
/// this statement, and the state after merging sub-block branches. Queries
/// return the most refined level that exists.
#[derive(Debug, Clone)]
pub struct VariableInfoContainer {
    initial: VariableInfo,
    evaluation: Option<VariableInfo>,
    merge: Option<VariableInfo>,
    evaluation_iteration: Option<usize>,
}

impl VariableInfoContainer {
    pub fn new(initial: VariableInfo) -> VariableInfoContainer {
        VariableInfoContainer {
            initial,
            evaluation: None,
            merge: None,
            evaluation_iteration: None,
        }
    }

    pub fn initial(&self) -> &VariableInfo {
        &self.initial
    }

    pub fn evaluation(&self) -> Option<&VariableInfo> {
        self.evaluation.as_ref()
    }

    pub fn merge(&self) -> Option<&VariableInfo> {
        self.merge.as_ref()
    }

    /// The most refined level: merge, else evaluation, else initial.
    pub fn best(&self) -> &VariableInfo {
        self.merge
            .as_ref()
            .or(self.evaluation.as_ref())
            .unwrap_or(&self.initial)
    }

    /// A later iteration starts over from a fresh initial state. The
    /// previous evaluation level is kept until it is overwritten so the
    /// monotonicity of refinements can be checked across iterations.
    pub fn restart(&mut self, initial: VariableInfo) {
        self.initial = initial;
        self.merge = None;
        self.evaluation_iteration = None;
    }

    /// The evaluation level is written at most once per iteration, and
    /// across iterations a resolved property may only stay or improve.
    pub fn set_evaluation(&mut self, iteration: usize, info: VariableInfo) {
        debug_assert_ne!(
            self.evaluation_iteration,
            Some(iteration),
            "The evaluation level must be written at most once per iteration."
        );
        if let Some(previous) = &self.evaluation {
            debug_assert!(
                info.props.improves_upon(&previous.props),
                "A refined variable state must not regress."
            );
        }
        self.evaluation = Some(info);
        self.evaluation_iteration = Some(iteration);
    }

    pub fn set_merge(&mut self, info: VariableInfo) {
        self.merge = Some(info);
    }
}

/// The mutable working state while walking one method body: the current
/// info of every variable touched so far, and the evaluation order
/// counter that produces access marks.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub vars: BTreeMap<VariableId, VariableInfo>,
    pub seq: u32,
    pub in_loop: bool,
}

impl Environment {
    pub fn new() -> Environment {
        Environment::default()
    }

    pub fn get(&self, var: &VariableId) -> Option<&VariableInfo> {
        self.vars.get(var)
    }

    /// The variable's info, creating a symbolic entry on first contact.
    pub fn ensure(&mut self, var: VariableId, unit: &Unit) -> &mut VariableInfo {
        let ty = var.declared_type(unit);
        self.vars
            .entry(var.clone())
            .or_insert_with(|| VariableInfo::symbolic(var, &ty))
    }

    pub fn next_mark(&mut self, line: u32) -> AccessMark {
        self.seq += 1;
        AccessMark {
            seq: self.seq,
            line,
            in_loop: self.in_loop,
            merged: false,
        }
    }

    pub fn record_read(&mut self, var: &VariableId, unit: &Unit, line: u32) {
        let mark = self.next_mark(line);
        self.ensure(var.clone(), unit).reads.push(mark);
    }

    /// Overwrites the variable's content. Links are replaced, not merged:
    /// an assignment severs everything the previous value was linked to.
    pub fn assign(
        &mut self,
        var: VariableId,
        value: Value,
        props: PropertyMap,
        linked: LinkedVariables,
        unit: &Unit,
        line: u32,
    ) {
        let mark = self.next_mark(line);
        let info = self.ensure(var, unit);
        info.value = value;
        info.props = props;
        info.linked = linked;
        info.assignments.push(mark);
    }
}

/// Combines the variable states of two branches under the branch condition.
/// Used for if/else merges and conditional expression results.
pub fn merge_info(cond: &Value, then_info: &VariableInfo, else_info: &VariableInfo) -> VariableInfo {
    let mut reads = then_info.reads.clone();
    for &mark in &else_info.reads {
        if !reads.contains(&mark) {
            reads.push(mark);
        }
    }
    reads.sort();
    // Assignments common to both branches stay ordinary; branch-local ones
    // are tagged so they are never sequenced against the outside.
    let mut assignments = Vec::new();
    for &mark in &then_info.assignments {
        let mut mark = mark;
        if !else_info.assignments.contains(&mark) {
            mark.merged = true;
        }
        if !assignments.contains(&mark) {
            assignments.push(mark);
        }
    }
    for &mark in &else_info.assignments {
        let mut mark = mark;
        if !then_info.assignments.contains(&mark) {
            mark.merged = true;
        }
        if !assignments.contains(&mark) {
            assignments.push(mark);
        }
    }
    assignments.sort();

    VariableInfo {
        value: Value::cond(
            cond.clone(),
            then_info.value.clone(),
            else_info.value.clone(),
        ),
        props: then_info.props.join_with(&else_info.props),
        linked: then_info.linked.merged_with(&else_info.linked),
        reads,
        assignments,
    }
}
