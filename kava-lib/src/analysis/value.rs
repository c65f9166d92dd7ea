use std::collections::BTreeMap;

use lattice::dv::CauseSet;
use lattice::props::Nullness;

use super::state::VariableId;
use crate::sema::{BinOp, Builtin, MethodId, Type, UnOp, Unit, bin_op_symbol};

/// Symbolic value of an expression or a storage location. Values are
/// expression trees over constants, opaque instances, and the initial
/// contents of storage locations; the evaluator folds them eagerly, so a
/// value that can be a constant is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    IntConst(i64),
    BoolConst(bool),
    StrConst(String),
    Null,
    /// An opaque object of a known type with no further structure, e.g. a
    /// freshly constructed instance or an unknown call result.
    Instance { ty: Type },
    /// A list with statically known elements; an empty vector is a list
    /// that is provably empty.
    ListOf(Vec<Value>),
    /// Whatever the named storage location held when the enclosing method
    /// started (or, for loop copies, when the iteration started).
    Variable(VariableId),
    /// An unevaluated call; kept symbolic when the callee cannot be
    /// inlined.
    ReturnOf {
        callee: CalleeRef,
        receiver: Option<Box<Value>>,
        args: Vec<Value>,
    },
    Unary { op: UnOp, operand: Box<Value> },
    Binary {
        op: BinOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },
    Cond {
        cond: Box<Value>,
        then_val: Box<Value>,
        else_val: Box<Value>,
    },
    /// Placeholder for a value blocked on not-yet-resolved facts; replaced
    /// by a later iteration of the fixpoint.
    Delayed(CauseSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalleeRef {
    Method(MethodId),
    Builtin(Builtin),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::BoolConst(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_delayed(&self) -> bool {
        !self.delays().is_empty()
    }

    /// All causes blocking any part of this value.
    pub fn delays(&self) -> CauseSet {
        let mut result = CauseSet::new();
        self.collect_delays(&mut result);
        result
    }

    fn collect_delays(&self, out: &mut CauseSet) {
        match self {
            Value::Delayed(causes) => out.merge(causes),
            Value::ListOf(elems) => {
                for elem in elems {
                    elem.collect_delays(out);
                }
            }
            Value::ReturnOf { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    receiver.collect_delays(out);
                }
                for arg in args {
                    arg.collect_delays(out);
                }
            }
            Value::Unary { operand, .. } => operand.collect_delays(out),
            Value::Binary { lhs, rhs, .. } => {
                lhs.collect_delays(out);
                rhs.collect_delays(out);
            }
            Value::Cond {
                cond,
                then_val,
                else_val,
            } => {
                cond.collect_delays(out);
                then_val.collect_delays(out);
                else_val.collect_delays(out);
            }
            _ => {}
        }
    }

    pub fn is_definitely_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Nullness evident from the value's shape; `None` when the value
    /// gives no verdict and the property map has to decide.
    pub fn nullness(&self) -> Option<Nullness> {
        match self {
            Value::Null => Some(Nullness::Nullable),
            Value::IntConst(_)
            | Value::BoolConst(_)
            | Value::StrConst(_)
            | Value::Instance { .. }
            | Value::ListOf(_)
            | Value::Unary { .. }
            | Value::Binary { .. } => Some(Nullness::NotNull),
            Value::Cond {
                then_val, else_val, ..
            } => match (then_val.nullness(), else_val.nullness()) {
                (Some(a), Some(b)) => Some(if a == b { a } else { Nullness::Nullable }),
                _ => None,
            },
            Value::Variable(_) | Value::ReturnOf { .. } | Value::Delayed(_) => None,
        }
    }

    /// Logical negation with structural simplification, used to build the
    /// path condition of else branches.
    pub fn negated(&self) -> Value {
        match self {
            Value::BoolConst(b) => Value::BoolConst(!b),
            Value::Unary {
                op: UnOp::Not,
                operand,
            } => operand.as_ref().clone(),
            Value::Binary { op, lhs, rhs } => {
                let flipped = match op {
                    BinOp::Eq => Some(BinOp::Ne),
                    BinOp::Ne => Some(BinOp::Eq),
                    BinOp::Lt => Some(BinOp::Ge),
                    BinOp::Ge => Some(BinOp::Lt),
                    BinOp::Gt => Some(BinOp::Le),
                    BinOp::Le => Some(BinOp::Gt),
                    _ => None,
                };
                match flipped {
                    Some(op) => Value::Binary {
                        op,
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                    },
                    None => Value::Unary {
                        op: UnOp::Not,
                        operand: Box::new(self.clone()),
                    },
                }
            }
            _ => Value::Unary {
                op: UnOp::Not,
                operand: Box::new(self.clone()),
            },
        }
    }

    /// Conditional value with the degenerate cases folded away.
    pub fn cond(cond: Value, then_val: Value, else_val: Value) -> Value {
        match cond.as_bool() {
            Some(true) => then_val,
            Some(false) => else_val,
            None => {
                if then_val == else_val {
                    then_val
                } else {
                    Value::Cond {
                        cond: Box::new(cond),
                        then_val: Box::new(then_val),
                        else_val: Box::new(else_val),
                    }
                }
            }
        }
    }

    /// Replaces storage references by the values of the given map; used
    /// when inlining a callee's computed return value at a call site.
    pub fn substituted(&self, map: &BTreeMap<VariableId, Value>) -> Value {
        match self {
            Value::Variable(var) => map.get(var).cloned().unwrap_or_else(|| self.clone()),
            Value::ListOf(elems) => {
                Value::ListOf(elems.iter().map(|e| e.substituted(map)).collect())
            }
            Value::ReturnOf {
                callee,
                receiver,
                args,
            } => Value::ReturnOf {
                callee: *callee,
                receiver: receiver.as_ref().map(|r| Box::new(r.substituted(map))),
                args: args.iter().map(|a| a.substituted(map)).collect(),
            },
            Value::Unary { op, operand } => fold_unary(*op, &operand.substituted(map))
                .unwrap_or_else(|| Value::Unary {
                    op: *op,
                    operand: Box::new(operand.substituted(map)),
                }),
            Value::Binary { op, lhs, rhs } => {
                let lhs = lhs.substituted(map);
                let rhs = rhs.substituted(map);
                fold_binary(*op, &lhs, &rhs).unwrap_or(Value::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Value::Cond {
                cond,
                then_val,
                else_val,
            } => Value::cond(
                cond.substituted(map),
                then_val.substituted(map),
                else_val.substituted(map),
            ),
            _ => self.clone(),
        }
    }

    /// True when the value only depends on the given method's parameters
    /// and constants, i.e. it can be transplanted to any call site.
    pub fn mentions_only_params(&self) -> bool {
        match self {
            Value::Variable(var) => matches!(var, VariableId::Param(_)),
            Value::ListOf(elems) => elems.iter().all(Value::mentions_only_params),
            Value::ReturnOf { .. } | Value::Delayed(_) | Value::Instance { .. } => false,
            Value::Unary { operand, .. } => operand.mentions_only_params(),
            Value::Binary { lhs, rhs, .. } => {
                lhs.mentions_only_params() && rhs.mentions_only_params()
            }
            Value::Cond {
                cond,
                then_val,
                else_val,
            } => {
                cond.mentions_only_params()
                    && then_val.mentions_only_params()
                    && else_val.mentions_only_params()
            }
            _ => true,
        }
    }

    /// Storage locations mentioned anywhere in the value.
    pub fn variables(&self) -> Vec<&VariableId> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables<'v>(&'v self, out: &mut Vec<&'v VariableId>) {
        match self {
            Value::Variable(var) => out.push(var),
            Value::ListOf(elems) => {
                for elem in elems {
                    elem.collect_variables(out);
                }
            }
            Value::ReturnOf { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    receiver.collect_variables(out);
                }
                for arg in args {
                    arg.collect_variables(out);
                }
            }
            Value::Unary { operand, .. } => operand.collect_variables(out),
            Value::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Value::Cond {
                cond,
                then_val,
                else_val,
            } => {
                cond.collect_variables(out);
                then_val.collect_variables(out);
                else_val.collect_variables(out);
            }
            _ => {}
        }
    }

    pub fn print(&self, unit: &Unit) -> String {
        match self {
            Value::IntConst(v) => v.to_string(),
            Value::BoolConst(v) => v.to_string(),
            Value::StrConst(v) => format!("{v:?}"),
            Value::Null => "null".to_owned(),
            Value::Instance { ty } => format!("instance of {}", unit.type_name(ty)),
            Value::ListOf(elems) => {
                let elems = elems
                    .iter()
                    .map(|e| e.print(unit))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{elems}]")
            }
            Value::Variable(var) => var.print(unit),
            Value::ReturnOf {
                callee,
                receiver,
                args,
            } => {
                let name = match callee {
                    CalleeRef::Method(m) => unit.method_name(*m),
                    CalleeRef::Builtin(b) => b.name().to_owned(),
                };
                let args = args
                    .iter()
                    .map(|a| a.print(unit))
                    .collect::<Vec<_>>()
                    .join(", ");
                match receiver {
                    Some(receiver) => format!("{}.{name}({args})", receiver.print(unit)),
                    None => format!("{name}({args})"),
                }
            }
            Value::Unary { op, operand } => {
                let op = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                };
                format!("{op}{}", operand.print(unit))
            }
            Value::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                lhs.print(unit),
                bin_op_symbol(*op),
                rhs.print(unit)
            ),
            Value::Cond {
                cond,
                then_val,
                else_val,
            } => format!(
                "{} ? {} : {}",
                cond.print(unit),
                then_val.print(unit),
                else_val.print(unit)
            ),
            Value::Delayed(causes) => format!("<delayed on {} facts>", causes.len()),
        }
    }
}

/// Constant folding for unary operators. `None` means the operand is not
/// constant enough.
pub fn fold_unary(op: UnOp, operand: &Value) -> Option<Value> {
    match (op, operand) {
        (UnOp::Neg, Value::IntConst(v)) => Some(Value::IntConst(-v)),
        (UnOp::Not, Value::BoolConst(v)) => Some(Value::BoolConst(!v)),
        _ => None,
    }
}

/// Constant folding for binary operators. Division and modulo by a
/// constant zero fold to nothing; the evaluator diagnoses them.
pub fn fold_binary(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    use BinOp::*;
    if let (Value::IntConst(a), Value::IntConst(b)) = (lhs, rhs) {
        return match op {
            Add => Some(Value::IntConst(a.wrapping_add(*b))),
            Sub => Some(Value::IntConst(a.wrapping_sub(*b))),
            Mul => Some(Value::IntConst(a.wrapping_mul(*b))),
            Div => (*b != 0).then(|| Value::IntConst(a.wrapping_div(*b))),
            Mod => (*b != 0).then(|| Value::IntConst(a.wrapping_rem(*b))),
            Eq => Some(Value::BoolConst(a == b)),
            Ne => Some(Value::BoolConst(a != b)),
            Lt => Some(Value::BoolConst(a < b)),
            Le => Some(Value::BoolConst(a <= b)),
            Gt => Some(Value::BoolConst(a > b)),
            Ge => Some(Value::BoolConst(a >= b)),
            And | Or => None,
        };
    }

    match (op, lhs, rhs) {
        (And, Value::BoolConst(false), _) | (And, _, Value::BoolConst(false)) => {
            Some(Value::BoolConst(false))
        }
        (And, Value::BoolConst(true), other) | (And, other, Value::BoolConst(true)) => {
            Some(other.clone())
        }
        (Or, Value::BoolConst(true), _) | (Or, _, Value::BoolConst(true)) => {
            Some(Value::BoolConst(true))
        }
        (Or, Value::BoolConst(false), other) | (Or, other, Value::BoolConst(false)) => {
            Some(other.clone())
        }
        (Eq, Value::BoolConst(a), Value::BoolConst(b)) => Some(Value::BoolConst(a == b)),
        (Ne, Value::BoolConst(a), Value::BoolConst(b)) => Some(Value::BoolConst(a != b)),
        (Eq, Value::StrConst(a), Value::StrConst(b)) => Some(Value::BoolConst(a == b)),
        (Ne, Value::StrConst(a), Value::StrConst(b)) => Some(Value::BoolConst(a != b)),
        (Eq, Value::Null, Value::Null) => Some(Value::BoolConst(true)),
        (Ne, Value::Null, Value::Null) => Some(Value::BoolConst(false)),
        // A value of known non-null shape compared against null.
        (Eq, Value::Null, other) | (Eq, other, Value::Null) => {
            (other.nullness() == Some(Nullness::NotNull)).then_some(Value::BoolConst(false))
        }
        (Ne, Value::Null, other) | (Ne, other, Value::Null) => {
            (other.nullness() == Some(Nullness::NotNull)).then_some(Value::BoolConst(true))
        }
        // The same storage location read twice yields the same value.
        (Eq, a @ Value::Variable(_), b) if a == b => Some(Value::BoolConst(true)),
        (Ne, a @ Value::Variable(_), b) if a == b => Some(Value::BoolConst(false)),
        _ => None,
    }
}
