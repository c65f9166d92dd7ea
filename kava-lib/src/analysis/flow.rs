use std::collections::BTreeSet;

use super::state::VariableId;
use super::value::Value;
use crate::sema::{BinOp, FieldId};

/// How certain the engine is that control reaches a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reachability {
    Always,
    Conditionally,
    Never,
}

impl Reachability {
    /// Reachability of a nested statement given the reachability of its
    /// parent context.
    pub fn nested(self, child: Reachability) -> Reachability {
        match (self, child) {
            (Reachability::Never, _) | (_, Reachability::Never) => Reachability::Never,
            (Reachability::Always, Reachability::Always) => Reachability::Always,
            _ => Reachability::Conditionally,
        }
    }
}

/// Why control does not fall through to the next statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    Return,
    Break,
    Continue,
    Throw,
}

/// Flow facts of one statement in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowData {
    pub reachability: Reachability,
    /// Set when the statement itself ends the enclosing flow.
    pub interrupt: Option<Interrupt>,
}

impl FlowData {
    pub fn reached(reachability: Reachability) -> FlowData {
        FlowData {
            reachability,
            interrupt: None,
        }
    }

    pub fn falls_through(&self) -> bool {
        self.interrupt.is_none() && self.reachability != Reachability::Never
    }
}

/// A precondition proven from enforced code: the boolean flag field must
/// be unset when the method is entered, or the guard throws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    pub field: FieldId,
    pub line: u32,
}

/// The path condition of the statement being evaluated: the branch
/// condition relative to the parent, the accumulated absolute condition
/// from method entry, and the narrowings extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionManager {
    condition: Value,
    absolute: Value,
    not_null: BTreeSet<VariableId>,
}

impl Default for ConditionManager {
    fn default() -> Self {
        ConditionManager {
            condition: Value::BoolConst(true),
            absolute: Value::BoolConst(true),
            not_null: BTreeSet::new(),
        }
    }
}

impl ConditionManager {
    pub fn new() -> ConditionManager {
        ConditionManager::default()
    }

    /// The manager of a branch guarded by `cond`. Narrowings the condition
    /// implies are added on top of the ones inherited from the parent.
    pub fn enter(&self, cond: &Value) -> ConditionManager {
        let absolute = match self.absolute.as_bool() {
            Some(true) => cond.clone(),
            _ => Value::Binary {
                op: BinOp::And,
                lhs: Box::new(self.absolute.clone()),
                rhs: Box::new(cond.clone()),
            },
        };
        let mut not_null = self.not_null.clone();
        collect_not_null(cond, &mut not_null);
        ConditionManager {
            condition: cond.clone(),
            absolute,
            not_null,
        }
    }

    pub fn condition(&self) -> &Value {
        &self.condition
    }

    pub fn absolute(&self) -> &Value {
        &self.absolute
    }

    /// Records that the location was dereferenced, so it is non-null for
    /// the rest of the path.
    pub fn add_not_null(&mut self, var: VariableId) {
        self.not_null.insert(var);
    }

    pub fn is_not_null(&self, var: &VariableId) -> bool {
        self.not_null.contains(var)
    }

    /// Takes over the narrowings of a branch that is the only way control
    /// can continue, e.g. after an early return in the other branch.
    pub fn adopt(&mut self, branch: &ConditionManager) {
        for var in &branch.not_null {
            self.not_null.insert(var.clone());
        }
    }
}

/// Extracts the locations a condition proves non-null when it holds:
/// `x != null`, and conjunctions thereof.
fn collect_not_null(cond: &Value, out: &mut BTreeSet<VariableId>) {
    if let Value::Binary { op, lhs, rhs } = cond {
        match op {
            BinOp::Ne => {
                if let (Value::Variable(var), Value::Null) = (lhs.as_ref(), rhs.as_ref()) {
                    out.insert(var.clone());
                }
                if let (Value::Null, Value::Variable(var)) = (lhs.as_ref(), rhs.as_ref()) {
                    out.insert(var.clone());
                }
            }
            BinOp::And => {
                collect_not_null(lhs, out);
                collect_not_null(rhs, out);
            }
            _ => {}
        }
    }
}
