use lattice::dv::{CauseSet, Dv, PropertyMap};
use lattice::props::{PropertyKind, PropertyValue};

use super::flow::Precondition;
use super::value::Value;
use crate::sema::{ClassId, FieldId, MethodId, ParamId, Unit};

/// Published facts about one method: the receiver's modification, the
/// return value's nullness and independence, and the computed return
/// value itself when the method is simple enough to inline.
#[derive(Debug, Clone, Default)]
pub struct MethodAnalysis {
    pub props: PropertyMap,
    /// Join of the values of all return statements, once computable.
    pub returned: Option<Value>,
    /// A return value that only mentions parameters and constants; call
    /// sites substitute their arguments into it.
    pub inlined: Option<Value>,
    /// Set once the decision about `returned`/`inlined` is final, so call
    /// sites can stop delaying on this method's value.
    pub value_resolved: bool,
    pub precondition: Option<Precondition>,
    /// The flag field this method sets, making it the marker operation of
    /// an eventually immutable type.
    pub marks: Option<FieldId>,
}

#[derive(Debug, Clone, Default)]
pub struct ParamAnalysis {
    pub props: PropertyMap,
}

#[derive(Debug, Clone, Default)]
pub struct FieldAnalysis {
    pub props: PropertyMap,
    /// Every value ever assigned to the field, across all methods.
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassAnalysis {
    pub props: PropertyMap,
    /// The flag field guarding the eventual immutability of the class.
    pub eventual: Option<FieldId>,
}

/// The shared registry of derived facts, written once per iteration and
/// read by the evaluator when methods reference each other. Updates are
/// monotone: a delayed fact may resolve, a resolved fact may only stay or
/// improve, and nothing changes after the registry is frozen.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRegistry {
    methods: Vec<MethodAnalysis>,
    params: Vec<ParamAnalysis>,
    fields: Vec<FieldAnalysis>,
    classes: Vec<ClassAnalysis>,
    resolved_facts: usize,
    frozen: bool,
}

impl AnalysisRegistry {
    pub fn new(unit: &Unit) -> AnalysisRegistry {
        AnalysisRegistry {
            methods: vec![MethodAnalysis::default(); unit.methods.len()],
            params: vec![ParamAnalysis::default(); unit.params.len()],
            fields: vec![FieldAnalysis::default(); unit.fields.len()],
            classes: vec![ClassAnalysis::default(); unit.classes.len()],
            resolved_facts: 0,
            frozen: false,
        }
    }

    pub fn method(&self, id: MethodId) -> &MethodAnalysis {
        &self.methods[id.0]
    }

    pub fn param(&self, id: ParamId) -> &ParamAnalysis {
        &self.params[id.0]
    }

    pub fn field(&self, id: FieldId) -> &FieldAnalysis {
        &self.fields[id.0]
    }

    pub fn class(&self, id: ClassId) -> &ClassAnalysis {
        &self.classes[id.0]
    }

    pub fn update_method_prop(&mut self, id: MethodId, kind: PropertyKind, value: Dv<PropertyValue>) {
        let resolved = Self::store(&mut self.methods[id.0].props, kind, value, self.frozen);
        self.resolved_facts += resolved;
    }

    pub fn update_param_prop(&mut self, id: ParamId, kind: PropertyKind, value: Dv<PropertyValue>) {
        let resolved = Self::store(&mut self.params[id.0].props, kind, value, self.frozen);
        self.resolved_facts += resolved;
    }

    pub fn update_field_prop(&mut self, id: FieldId, kind: PropertyKind, value: Dv<PropertyValue>) {
        let resolved = Self::store(&mut self.fields[id.0].props, kind, value, self.frozen);
        self.resolved_facts += resolved;
    }

    pub fn update_class_prop(&mut self, id: ClassId, kind: PropertyKind, value: Dv<PropertyValue>) {
        let resolved = Self::store(&mut self.classes[id.0].props, kind, value, self.frozen);
        self.resolved_facts += resolved;
    }

    fn store(
        props: &mut PropertyMap,
        kind: PropertyKind,
        value: Dv<PropertyValue>,
        frozen: bool,
    ) -> usize {
        debug_assert!(!frozen, "The registry must not change after freezing.");
        let was_resolved = props.get(kind).is_some_and(Dv::is_resolved);
        if let Some(previous) = props.get(kind) {
            debug_assert!(
                value.improves_upon(previous),
                "Registry updates must be monotone."
            );
        }
        let now_resolved = value.is_resolved();
        props.set(kind, value);
        usize::from(now_resolved && !was_resolved)
    }

    pub fn set_method_value(&mut self, id: MethodId, returned: Option<Value>, inlined: Option<Value>) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        let entry = &mut self.methods[id.0];
        if !entry.value_resolved {
            self.resolved_facts += 1;
        }
        entry.returned = returned;
        entry.inlined = inlined;
        entry.value_resolved = true;
    }

    pub fn set_precondition(&mut self, id: MethodId, precondition: Precondition) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        self.methods[id.0].precondition = Some(precondition);
    }

    pub fn set_marks(&mut self, id: MethodId, field: FieldId) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        self.methods[id.0].marks = Some(field);
    }

    pub fn add_field_value(&mut self, id: FieldId, value: Value) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        let values = &mut self.fields[id.0].values;
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn clear_field_values(&mut self) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        for field in &mut self.fields {
            field.values.clear();
        }
    }

    pub fn set_class_eventual(&mut self, id: ClassId, field: FieldId) {
        debug_assert!(!self.frozen, "The registry must not change after freezing.");
        self.classes[id.0].eventual = Some(field);
    }

    /// Total number of facts that have transitioned from delayed or absent
    /// to resolved; the fixpoint driver's progress measure.
    pub fn resolved_fact_count(&self) -> usize {
        self.resolved_facts
    }

    /// Causes of every fact that is still delayed anywhere.
    pub fn all_delays(&self) -> CauseSet {
        let mut result = CauseSet::new();
        for entry in &self.methods {
            result.merge(&entry.props.delays());
        }
        for entry in &self.params {
            result.merge(&entry.props.delays());
        }
        for entry in &self.fields {
            result.merge(&entry.props.delays());
        }
        for entry in &self.classes {
            result.merge(&entry.props.delays());
        }
        result
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.all_delays().is_empty()
            && self.methods.iter().all(|m| m.value_resolved)
    }

    /// No further updates are accepted; the results are final.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
