use std::collections::BTreeMap;

use lattice::dv::{Dv, PropertyMap};
use lattice::props::{Immutability, Modification, Nullness, PropertyKind, PropertyValue};

use lattice::dv::CauseSet;

use super::flow::{ConditionManager, Precondition};
use super::link::links_for_value;
use super::results::AnalysisRegistry;
use super::state::{Environment, Receiver, VariableId};
use super::value::{CalleeRef, Value, fold_binary, fold_unary};
use super::{ElementRef, property_cause, value_cause};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::facts::builtin_facts;
use crate::sema::{BinOp, Builtin, Callee, Expr, ExprId, FieldId, MethodId, Type, Unit};

/// What one walk of a method body found out about the method itself.
#[derive(Debug, Clone)]
pub struct MethodOutcome {
    /// `(absolute path condition, value)` of every executed return.
    pub returns: Vec<(Value, Value)>,
    /// False once the body performed any observable side effect; only pure
    /// methods are candidates for inlining their return value.
    pub pure: bool,
    /// Values assigned to fields of `this`, for field analysis.
    pub field_writes: Vec<FieldWrite>,
    /// Modification of the receiver observed so far, beyond what the
    /// environment's field variables capture.
    pub this_modified: Dv<PropertyValue>,
}

#[derive(Debug, Clone)]
pub struct FieldWrite {
    pub field: FieldId,
    pub value: Value,
    pub line: u32,
}

impl MethodOutcome {
    pub fn new() -> MethodOutcome {
        MethodOutcome {
            returns: Vec::new(),
            pure: true,
            field_writes: Vec::new(),
            this_modified: Dv::Resolved(PropertyValue::Modification(Modification::NotModified)),
        }
    }

    fn record_this_modified(&mut self, modified: Dv<PropertyValue>) {
        self.this_modified = self.this_modified.join(&modified);
    }
}

/// Evaluates expressions to symbolic values, updating the environment and
/// raising value-level diagnostics. One evaluator instance walks one
/// method in one iteration; cross-element facts come from the registry as
/// resolved or delayed values.
pub struct Evaluator<'a> {
    pub unit: &'a Unit,
    pub registry: &'a AnalysisRegistry,
    pub diags: &'a mut Diagnostics,
    pub method: MethodId,
    pub in_ctor: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        unit: &'a Unit,
        registry: &'a AnalysisRegistry,
        diags: &'a mut Diagnostics,
        method: MethodId,
    ) -> Evaluator<'a> {
        let in_ctor = unit.method(method).is_constructor;
        Evaluator {
            unit,
            registry,
            diags,
            method,
            in_ctor,
        }
    }

    pub fn eval(
        &mut self,
        expr: ExprId,
        env: &mut Environment,
        cond: &mut ConditionManager,
        out: &mut MethodOutcome,
    ) -> Value {
        let line = self.unit.expr(expr).line;
        match &self.unit.expr(expr).expr {
            Expr::IntLit(v) => Value::IntConst(*v),
            Expr::BoolLit(v) => Value::BoolConst(*v),
            Expr::StrLit(v) => Value::StrConst(v.clone()),
            Expr::NullLit => Value::Null,
            Expr::This => Value::Instance {
                ty: self.unit.expr(expr).ty.clone(),
            },
            Expr::ListLit(elems) => {
                let elems = elems.clone();
                Value::ListOf(
                    elems
                        .iter()
                        .map(|&e| self.eval(e, env, cond, out))
                        .collect(),
                )
            }
            Expr::Local(local) => self.read_variable(VariableId::Local(*local), env, line),
            Expr::Param(param) => self.read_variable(VariableId::Param(*param), env, line),
            Expr::FieldGet { receiver, field } => {
                let (receiver, field) = (*receiver, *field);
                let receiver_value = self.eval(receiver, env, cond, out);
                self.check_receiver(receiver, &receiver_value, env, cond, line);
                match resolve_receiver(self.unit, receiver) {
                    Some(scope) => {
                        let var = VariableId::Field {
                            field,
                            receiver: scope,
                        };
                        self.touch_field_var(&var, field, env);
                        self.read_variable(var, env, line)
                    }
                    // The receiver has no stable identity; the content is
                    // an opaque instance of the field's type.
                    None => Value::Instance {
                        ty: self.unit.field(field).ty.clone(),
                    },
                }
            }
            Expr::Unary { op, operand } => {
                let (op, operand) = (*op, *operand);
                let operand = self.eval(operand, env, cond, out);
                fold_unary(op, &operand).unwrap_or(Value::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                let lhs = self.eval(lhs, env, cond, out);
                let rhs = self.eval(rhs, env, cond, out);
                if matches!(op, BinOp::Div | BinOp::Mod) && rhs == Value::IntConst(0) {
                    self.diags.report(
                        line,
                        DiagnosticKind::DivisionByZero,
                        "The divisor is always zero.",
                    );
                    return Value::Instance { ty: Type::Int };
                }
                fold_binary(op, &lhs, &rhs).unwrap_or(Value::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Expr::Cond {
                cond: c,
                then_val,
                else_val,
            } => {
                let (c, then_val, else_val) = (*c, *then_val, *else_val);
                let cond_value = self.eval(c, env, cond, out);
                self.check_constant_condition(&cond_value, line);
                let then_value = self.eval(then_val, env, cond, out);
                let else_value = self.eval(else_val, env, cond, out);
                Value::cond(cond_value, then_value, else_value)
            }
            Expr::Assign { target, value } => {
                let (target, value) = (*target, *value);
                let value = self.eval(value, env, cond, out);
                self.assign(target, value, env, cond, out, line)
            }
            Expr::Call {
                receiver,
                callee,
                args,
            } => {
                let (receiver, callee, args) = (*receiver, *callee, args.clone());
                let receiver_value = receiver.map(|r| self.eval(r, env, cond, out));
                let args: Vec<Value> = args
                    .iter()
                    .map(|&a| self.eval(a, env, cond, out))
                    .collect();
                if let (Some(r), Some(rv)) = (receiver, receiver_value.as_ref()) {
                    self.check_receiver(r, rv, env, cond, line);
                }
                match callee {
                    Callee::Builtin(builtin) => {
                        self.eval_builtin_call(builtin, receiver, receiver_value, args, env, out)
                    }
                    Callee::Method(method) => self.eval_method_call(
                        method,
                        receiver,
                        receiver_value,
                        args,
                        env,
                        out,
                        line,
                    ),
                }
            }
            Expr::New { ctor, args, .. } => {
                let (ctor, args) = (*ctor, args.clone());
                let args: Vec<Value> = args
                    .iter()
                    .map(|&a| self.eval(a, env, cond, out))
                    .collect();
                self.check_argument_contracts(ctor, &args, env, out, line);
                Value::ReturnOf {
                    callee: CalleeRef::Method(ctor),
                    receiver: None,
                    args,
                }
            }
        }
    }

    fn read_variable(&mut self, var: VariableId, env: &mut Environment, line: u32) -> Value {
        env.record_read(&var, self.unit, line);
        env.ensure(var, self.unit).value.clone()
    }

    /// Field variables are seeded from the registry on first contact, so
    /// field nullness flows into the method that reads the field.
    fn touch_field_var(&mut self, var: &VariableId, field: FieldId, env: &mut Environment) {
        if env.get(var).is_some() {
            return;
        }
        let info = env.ensure(var.clone(), self.unit);
        if self.unit.field(field).ty.is_nullable() {
            let nullness = self.registry.field(field).props.get_or_delayed(
                PropertyKind::NotNull,
                property_cause(ElementRef::Field(field), PropertyKind::NotNull),
            );
            info.props.set(PropertyKind::NotNull, nullness);
        }
    }

    fn assign(
        &mut self,
        target: ExprId,
        value: Value,
        env: &mut Environment,
        cond: &mut ConditionManager,
        out: &mut MethodOutcome,
        line: u32,
    ) -> Value {
        let Some(var) = self.resolve_target(target, env, cond, out, line) else {
            return value;
        };

        if value == Value::Variable(var.clone()) {
            self.diags.report(
                line,
                DiagnosticKind::SelfAssignment,
                format!("'{}' is assigned to itself.", var.print(self.unit)),
            );
        }

        if let VariableId::Field { field, receiver } = &var {
            out.pure = false;
            if *receiver == Receiver::This {
                out.field_writes.push(FieldWrite {
                    field: *field,
                    value: value.clone(),
                    line,
                });
                out.record_this_modified(Dv::Resolved(PropertyValue::Modification(
                    Modification::Modified,
                )));
                self.check_final_field_write(*field, line);
            }
        }

        let ty = var.declared_type(self.unit);
        let props = self.props_for_assignment(&value, &ty, env, cond);
        let linked = links_for_value(self.unit, self.registry, &value, &ty);
        env.assign(var, value.clone(), props, linked, self.unit, line);
        value
    }

    fn resolve_target(
        &mut self,
        target: ExprId,
        env: &mut Environment,
        cond: &mut ConditionManager,
        out: &mut MethodOutcome,
        line: u32,
    ) -> Option<VariableId> {
        match &self.unit.expr(target).expr {
            Expr::Local(local) => Some(VariableId::Local(*local)),
            Expr::Param(param) => Some(VariableId::Param(*param)),
            Expr::FieldGet { receiver, field } => {
                let (receiver, field) = (*receiver, *field);
                let receiver_value = self.eval(receiver, env, cond, out);
                self.check_receiver(receiver, &receiver_value, env, cond, line);
                resolve_receiver(self.unit, receiver).map(|scope| {
                    let var = VariableId::Field {
                        field,
                        receiver: scope,
                    };
                    self.touch_field_var(&var, field, env);
                    var
                })
            }
            _ => None,
        }
    }

    /// Writing a field outside a constructor on an effectively immutable
    /// class is an error; field finality itself is derived later from the
    /// collected writes.
    fn check_final_field_write(&mut self, field: FieldId, line: u32) {
        if self.in_ctor {
            return;
        }
        let owner = self.unit.field(field).owner;
        if let Some(Dv::Resolved(PropertyValue::Immutability(grade))) =
            self.registry.class(owner).props.get(PropertyKind::Immutable)
        {
            if *grade <= Immutability::Effective {
                self.diags.report(
                    line,
                    DiagnosticKind::ModifyingImmutable,
                    format!(
                        "Field '{}' of an immutable class is written outside a constructor.",
                        self.unit.field_name(field)
                    ),
                );
            }
        }
    }

    fn eval_builtin_call(
        &mut self,
        builtin: Builtin,
        receiver: Option<ExprId>,
        receiver_value: Option<Value>,
        args: Vec<Value>,
        env: &mut Environment,
        out: &mut MethodOutcome,
    ) -> Value {
        let facts = builtin_facts(builtin);
        if facts.modifies_receiver == Modification::Modified {
            out.pure = false;
            if let Some(receiver) = receiver {
                self.mark_receiver_modified(
                    receiver,
                    Dv::Resolved(PropertyValue::Modification(Modification::Modified)),
                    env,
                    out,
                );
            }
        }

        // Results over statically known lists fold to concrete values.
        if let Some(receiver_value) = &receiver_value {
            match (builtin, receiver_value) {
                (Builtin::ListSize, Value::ListOf(elems)) => {
                    return Value::IntConst(elems.len() as i64);
                }
                (Builtin::ListIsEmpty, Value::ListOf(elems)) => {
                    return Value::BoolConst(elems.is_empty());
                }
                (Builtin::ListGet, Value::ListOf(elems)) => {
                    if let Some(Value::IntConst(index)) = args.first() {
                        if let Some(elem) = usize::try_from(*index).ok().and_then(|i| elems.get(i))
                        {
                            return elem.clone();
                        }
                    }
                }
                (Builtin::StrLength, Value::StrConst(s)) => {
                    return Value::IntConst(s.len() as i64);
                }
                (Builtin::StrConcat, Value::StrConst(a)) => {
                    if let Some(Value::StrConst(b)) = args.first() {
                        return Value::StrConst(format!("{a}{b}"));
                    }
                }
                _ => {}
            }
        }

        Value::ReturnOf {
            callee: CalleeRef::Builtin(builtin),
            receiver: receiver_value.map(Box::new),
            args,
        }
    }

    fn eval_method_call(
        &mut self,
        method: MethodId,
        receiver: Option<ExprId>,
        receiver_value: Option<Value>,
        args: Vec<Value>,
        env: &mut Environment,
        out: &mut MethodOutcome,
        line: u32,
    ) -> Value {
        let callee = self.registry.method(method);
        let modified = callee.props.get_or_delayed(
            PropertyKind::Modified,
            property_cause(ElementRef::Method(method), PropertyKind::Modified),
        );
        let callee_precondition = callee.precondition;
        let callee_marks = callee.marks;

        let may_modify = !matches!(
            modified,
            Dv::Resolved(PropertyValue::Modification(Modification::NotModified))
        );
        if may_modify {
            out.pure = false;
            if let Some(receiver) = receiver {
                self.mark_receiver_modified(receiver, modified.clone(), env, out);
            }
        }

        self.check_argument_contracts(method, &args, env, out, line);

        if let Some(receiver) = receiver {
            self.check_eventual_state(method, receiver, callee_marks, callee_precondition, env, line);
        }

        let callee = self.registry.method(method);
        if !callee.value_resolved {
            return Value::Delayed(CauseSet::singleton(value_cause(method)));
        }
        if let Some(inlined) = &callee.inlined {
            let mut map = BTreeMap::new();
            for (index, arg) in args.iter().enumerate() {
                if let Some(&param) = self.unit.method(method).params.get(index) {
                    map.insert(VariableId::Param(param), arg.clone());
                }
            }
            return inlined.substituted(&map);
        }
        Value::ReturnOf {
            callee: CalleeRef::Method(method),
            receiver: receiver_value.map(Box::new),
            args,
        }
    }

    /// Applies the callee's parameter contracts to the argument values:
    /// modification marks the argument's variables, and passing a definite
    /// null to a non-null parameter is a contract violation.
    fn check_argument_contracts(
        &mut self,
        method: MethodId,
        args: &[Value],
        env: &mut Environment,
        out: &mut MethodOutcome,
        line: u32,
    ) {
        let params = self.unit.method(method).params.clone();
        for (&param, arg) in params.iter().zip(args.iter()) {
            let modified = self.registry.param(param).props.get_or_delayed(
                PropertyKind::Modified,
                property_cause(ElementRef::Param(param), PropertyKind::Modified),
            );
            let may_modify = !matches!(
                modified,
                Dv::Resolved(PropertyValue::Modification(Modification::NotModified))
            );
            if may_modify {
                out.pure = false;
                for var in arg.variables() {
                    let var = var.clone();
                    self.join_modified(&var, modified.clone(), env);
                }
            }

            if arg.is_definitely_null() {
                if let Some(Dv::Resolved(PropertyValue::Nullness(Nullness::NotNull))) =
                    self.registry.param(param).props.get(PropertyKind::NotNull)
                {
                    self.diags.report(
                        line,
                        DiagnosticKind::PreconditionViolation,
                        format!(
                            "'null' is passed for parameter '{}', which must not be null.",
                            self.unit.param_name(param)
                        ),
                    );
                }
            }
        }
    }

    /// Tracks the before/after state of eventually immutable objects
    /// through marker calls and rejects operations whose precondition the
    /// current state contradicts.
    fn check_eventual_state(
        &mut self,
        method: MethodId,
        receiver: ExprId,
        callee_marks: Option<FieldId>,
        callee_precondition: Option<Precondition>,
        env: &mut Environment,
        line: u32,
    ) {
        let Some(var) = receiver_variable(self.unit, receiver) else {
            return;
        };
        let state = env
            .get(&var)
            .and_then(|info| info.props.get(PropertyKind::Immutable))
            .cloned();
        let after = matches!(
            state,
            Some(Dv::Resolved(PropertyValue::Immutability(
                Immutability::EventualAfter
            )))
        );

        if let Some(field) = callee_marks {
            if after {
                self.diags.report(
                    line,
                    DiagnosticKind::PreconditionViolation,
                    format!(
                        "'{}' was already marked; '{}' requires '{}' to be unset.",
                        var.print(self.unit),
                        self.unit.method_name(method),
                        self.unit.field_name(field)
                    ),
                );
            } else {
                env.ensure(var, self.unit).props.set_resolved(
                    PropertyKind::Immutable,
                    PropertyValue::Immutability(Immutability::EventualAfter),
                );
            }
            return;
        }

        if after && callee_precondition.is_some() {
            self.diags.report(
                line,
                DiagnosticKind::ModifyingImmutable,
                format!(
                    "'{}' reached its immutable state; '{}' may no longer be called on it.",
                    var.print(self.unit),
                    self.unit.method_name(method)
                ),
            );
        }
    }

    fn mark_receiver_modified(
        &mut self,
        receiver: ExprId,
        modified: Dv<PropertyValue>,
        env: &mut Environment,
        out: &mut MethodOutcome,
    ) {
        match receiver_variable(self.unit, receiver) {
            Some(var) => {
                if var.is_field() {
                    // Modifying a field's content modifies the object
                    // holding the field.
                    if matches!(&var, VariableId::Field { receiver: Receiver::This, .. }) {
                        out.record_this_modified(modified.clone());
                    }
                }
                self.join_modified(&var, modified, env);
            }
            None => {
                if matches!(self.unit.expr(receiver).expr, Expr::This) {
                    out.record_this_modified(modified);
                }
            }
        }
    }

    fn join_modified(&mut self, var: &VariableId, modified: Dv<PropertyValue>, env: &mut Environment) {
        if var.declared_type(self.unit).is_value_type() {
            return;
        }
        let info = env.ensure(var.clone(), self.unit);
        let current = info
            .props
            .get(PropertyKind::Modified)
            .cloned()
            .unwrap_or(Dv::Resolved(PropertyValue::Modification(
                Modification::NotModified,
            )));
        info.props
            .set(PropertyKind::Modified, current.join(&modified));
    }

    /// Null checks at dereference sites. A dereference also narrows: the
    /// receiver is non-null for the rest of the path, so one missing check
    /// is reported once.
    fn check_receiver(
        &mut self,
        receiver: ExprId,
        receiver_value: &Value,
        env: &mut Environment,
        cond: &mut ConditionManager,
        line: u32,
    ) {
        if receiver_value.is_definitely_null() {
            self.diags.report(
                line,
                DiagnosticKind::MissingNullCheck,
                "The receiver is always null here.",
            );
            return;
        }
        let Some(var) = receiver_variable(self.unit, receiver) else {
            return;
        };
        if !var.declared_type(self.unit).is_nullable() || cond.is_not_null(&var) {
            return;
        }
        let nullness = env
            .get(&var)
            .and_then(|info| info.props.get(PropertyKind::NotNull))
            .cloned();
        if matches!(
            nullness,
            Some(Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)))
        ) && receiver_value.nullness() != Some(Nullness::NotNull)
        {
            self.diags.report(
                line,
                DiagnosticKind::MissingNullCheck,
                format!(
                    "'{}' may be null when it is dereferenced.",
                    var.print(self.unit)
                ),
            );
        }
        cond.add_not_null(var.clone());
        env.ensure(var, self.unit).props.set_resolved(
            PropertyKind::NotNull,
            PropertyValue::Nullness(Nullness::NotNull),
        );
    }

    pub fn check_constant_condition(&mut self, cond_value: &Value, line: u32) {
        match cond_value.as_bool() {
            Some(true) => self.diags.report(
                line,
                DiagnosticKind::ConditionAlwaysTrue,
                "The condition always evaluates to true.",
            ),
            Some(false) => self.diags.report(
                line,
                DiagnosticKind::ConditionAlwaysFalse,
                "The condition always evaluates to false.",
            ),
            None => {}
        }
    }

    /// Property map of a freshly assigned location: nullness inferred from
    /// the value, modification reset, other dimensions untouched.
    pub fn props_for_assignment(
        &self,
        value: &Value,
        ty: &Type,
        env: &Environment,
        cond: &ConditionManager,
    ) -> PropertyMap {
        let mut props = PropertyMap::new();
        if ty.is_nullable() {
            props.set(PropertyKind::NotNull, self.nullness_of(value, env, cond));
        }
        props.set_resolved(
            PropertyKind::Modified,
            PropertyValue::Modification(Modification::NotModified),
        );
        props
    }

    /// Nullness of a value, consulting the environment for symbolic reads
    /// and the registry for unresolved call results.
    pub fn nullness_of(
        &self,
        value: &Value,
        env: &Environment,
        cond: &ConditionManager,
    ) -> Dv<PropertyValue> {
        if let Some(nullness) = value.nullness() {
            return Dv::Resolved(PropertyValue::Nullness(nullness));
        }
        match value {
            Value::Variable(var) => {
                if cond.is_not_null(var) {
                    return Dv::Resolved(PropertyValue::Nullness(Nullness::NotNull));
                }
                env.get(var)
                    .and_then(|info| info.props.get(PropertyKind::NotNull))
                    .cloned()
                    .unwrap_or(Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)))
            }
            Value::ReturnOf {
                callee: CalleeRef::Method(method),
                ..
            } => {
                if self.unit.method(*method).is_constructor {
                    return Dv::Resolved(PropertyValue::Nullness(Nullness::NotNull));
                }
                self.registry.method(*method).props.get_or_delayed(
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
            } => self
                .nullness_of(then_val, env, cond)
                .join(&self.nullness_of(else_val, env, cond)),
            Value::Delayed(causes) => Dv::delayed_on(causes.clone()),
            _ => Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)),
        }
    }
}

/// The storage location behind a receiver expression, when it has one.
pub fn receiver_variable(unit: &Unit, expr: ExprId) -> Option<VariableId> {
    match &unit.expr(expr).expr {
        Expr::Local(local) => Some(VariableId::Local(*local)),
        Expr::Param(param) => Some(VariableId::Param(*param)),
        Expr::FieldGet { receiver, field } => {
            resolve_receiver(unit, *receiver).map(|scope| VariableId::Field {
                field: *field,
                receiver: scope,
            })
        }
        _ => None,
    }
}

/// The evaluated scope of a field access: fields are storage locations
/// only when their receiver is `this` or a named variable.
pub fn resolve_receiver(unit: &Unit, expr: ExprId) -> Option<Receiver> {
    match &unit.expr(expr).expr {
        Expr::This => Some(Receiver::This),
        Expr::Local(local) => Some(Receiver::Local(*local)),
        Expr::Param(param) => Some(Receiver::Param(*param)),
        _ => None,
    }
}
