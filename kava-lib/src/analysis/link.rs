use std::collections::BTreeMap;

use lattice::dv::{CauseSet, Dv};
use lattice::props::{JoinSemiLattice, Lattice, PropertyKind, PropertyValue};
use lattice::props::{Independence, Modification};

use super::results::AnalysisRegistry;
use super::state::{Environment, VariableId};
use super::value::{CalleeRef, Value};
use super::property_cause;
use crate::facts::builtin_facts;
use crate::sema::{Type, Unit};

/// How strongly two storage locations are tied to the same object graph.
/// Ordered from strongest claim to none; this is a separate lattice from
/// [`Independence`], which grades the same relation from the point of view
/// of a method's contract and therefore has the opposite best element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkLevel {
    /// The two locations hold the very same object.
    Identity,
    /// Modifying one modifies the other.
    Dependent,
    /// They share hidden content: mutation of elements is visible through
    /// both, mutation of the container itself is not.
    HiddenContent,
    /// No relation.
    Independent,
}

impl JoinSemiLattice for LinkLevel {
    fn bottom() -> Self {
        LinkLevel::Identity
    }

    fn join(&self, other: &Self) -> Self {
        *self.max(other)
    }
}

impl Lattice for LinkLevel {
    fn top() -> Self {
        LinkLevel::Independent
    }

    fn meet(&self, other: &Self) -> Self {
        *self.min(other)
    }
}

impl core::fmt::Display for LinkLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkLevel::Identity => write!(f, "identity"),
            LinkLevel::Dependent => write!(f, "dependent"),
            LinkLevel::HiddenContent => write!(f, "hidden-content"),
            LinkLevel::Independent => write!(f, "independent"),
        }
    }
}

impl LinkLevel {
    /// Whether a modification of the linked object counts as a
    /// modification of this one.
    pub fn propagates_modification(&self) -> bool {
        matches!(self, LinkLevel::Identity | LinkLevel::Dependent)
    }
}

/// The linking state of one variable: every other location its current
/// content is tied to, with the (possibly still delayed) strength of the
/// tie. Absent entries mean provably independent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkedVariables(BTreeMap<VariableId, Dv<LinkLevel>>);

impl LinkedVariables {
    pub fn new() -> LinkedVariables {
        LinkedVariables::default()
    }

    pub fn get(&self, var: &VariableId) -> Option<&Dv<LinkLevel>> {
        self.0.get(var)
    }

    /// Records a link, keeping the stronger claim when one exists.
    pub fn insert(&mut self, var: VariableId, level: Dv<LinkLevel>) {
        match self.0.get(&var) {
            Some(existing) => {
                let met = existing.meet(&level);
                self.0.insert(var, met);
            }
            None => {
                self.0.insert(var, level);
            }
        }
    }

    /// Conservative union for branch merges: a link established in either
    /// branch may hold afterwards, and common links keep the stronger
    /// claim.
    pub fn merged_with(&self, other: &LinkedVariables) -> LinkedVariables {
        let mut result = self.clone();
        for (var, level) in &other.0 {
            result.insert(var.clone(), level.clone());
        }
        result
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariableId, &Dv<LinkLevel>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn delays(&self) -> CauseSet {
        let mut result = CauseSet::new();
        for level in self.0.values() {
            if let Dv::Delayed(causes) = level {
                result.merge(causes);
            }
        }
        result
    }
}

/// Derives the links an assignment target acquires from the assigned
/// value. Value types cannot be aliased, so they never link.
pub fn links_for_value(
    unit: &Unit,
    registry: &AnalysisRegistry,
    value: &Value,
    target_ty: &Type,
) -> LinkedVariables {
    if target_ty.is_value_type() {
        return LinkedVariables::new();
    }
    let mut result = LinkedVariables::new();
    collect_links(unit, registry, value, Dv::Resolved(LinkLevel::Identity), &mut result);
    result
}

fn collect_links(
    unit: &Unit,
    registry: &AnalysisRegistry,
    value: &Value,
    level: Dv<LinkLevel>,
    out: &mut LinkedVariables,
) {
    match value {
        Value::Variable(var) => {
            if !var.declared_type(unit).is_value_type() {
                out.insert(var.clone(), level);
            }
        }
        Value::ListOf(elems) => {
            for elem in elems {
                collect_links(
                    unit,
                    registry,
                    elem,
                    weaken(&level, LinkLevel::HiddenContent),
                    out,
                );
            }
        }
        Value::Cond {
            then_val, else_val, ..
        } => {
            collect_links(unit, registry, then_val, level.clone(), out);
            collect_links(unit, registry, else_val, level, out);
        }
        Value::ReturnOf {
            callee,
            receiver,
            args,
        } => match callee {
            CalleeRef::Builtin(builtin) => {
                if let Some(receiver) = receiver {
                    let strength = independence_to_level(builtin_facts(*builtin).result_independence);
                    if let Some(strength) = strength {
                        collect_links(unit, registry, receiver, weaken(&level, strength), out);
                    }
                }
            }
            CalleeRef::Method(method) => {
                if let Some(receiver) = receiver {
                    let independence = registry.method(*method).props.get_or_delayed(
                        PropertyKind::Independent,
                        property_cause(
                            super::ElementRef::Method(*method),
                            PropertyKind::Independent,
                        ),
                    );
                    link_by_independence(unit, registry, receiver, &independence, &level, out);
                }
                for (index, arg) in args.iter().enumerate() {
                    let Some(&param) = unit.method(*method).params.get(index) else {
                        continue;
                    };
                    let independence = registry.param(param).props.get_or_delayed(
                        PropertyKind::Independent,
                        property_cause(super::ElementRef::Param(param), PropertyKind::Independent),
                    );
                    link_by_independence(unit, registry, arg, &independence, &level, out);
                }
            }
        },
        // Constants, fresh instances, and still-delayed values contribute
        // no links; delays surface through the property maps instead.
        _ => {}
    }
}

fn link_by_independence(
    unit: &Unit,
    registry: &AnalysisRegistry,
    value: &Value,
    independence: &Dv<PropertyValue>,
    level: &Dv<LinkLevel>,
    out: &mut LinkedVariables,
) {
    match independence {
        Dv::Resolved(PropertyValue::Independence(grade)) => {
            if let Some(strength) = independence_to_level(*grade) {
                collect_links(unit, registry, value, weaken(level, strength), out);
            }
        }
        Dv::Resolved(_) => {}
        Dv::Delayed(causes) => {
            collect_links(unit, registry, value, Dv::delayed_on(causes.clone()), out);
        }
    }
}

/// A link through an operation can only be as strong as the operation's
/// independence contract allows.
fn weaken(level: &Dv<LinkLevel>, cap: LinkLevel) -> Dv<LinkLevel> {
    level.join(&Dv::Resolved(cap))
}

fn independence_to_level(grade: Independence) -> Option<LinkLevel> {
    match grade {
        Independence::Independent => None,
        Independence::HiddenContent => Some(LinkLevel::HiddenContent),
        Independence::Dependent => Some(LinkLevel::Dependent),
    }
}

/// Spreads modification facts along links: when a variable was modified,
/// every location its content is identical to or dependent on was modified
/// as well. Links whose strength is still delayed mark the linked variable
/// with a delayed modification.
pub fn propagate_modification(env: &mut Environment, unit: &Unit) {
    let mut updates: Vec<(VariableId, Dv<PropertyValue>)> = Vec::new();
    for (var, info) in &env.vars {
        let Some(modified) = info.props.get(PropertyKind::Modified) else {
            continue;
        };
        let is_modified = matches!(
            modified,
            Dv::Resolved(PropertyValue::Modification(Modification::Modified)) | Dv::Delayed(_)
        );
        if !is_modified {
            continue;
        }
        for (linked, level) in info.linked.iter() {
            if linked == var {
                continue;
            }
            match level {
                Dv::Resolved(level) if level.propagates_modification() => {
                    updates.push((linked.clone(), modified.clone()));
                }
                Dv::Resolved(_) => {}
                Dv::Delayed(causes) => {
                    let mut causes = causes.clone();
                    if let Dv::Delayed(more) = modified {
                        causes.merge(more);
                    }
                    updates.push((linked.clone(), Dv::delayed_on(causes)));
                }
            }
        }
    }
    for (var, modified) in updates {
        let info = env.ensure(var, unit);
        let current = info
            .props
            .get(PropertyKind::Modified)
            .cloned()
            .unwrap_or(Dv::Resolved(PropertyValue::Modification(
                Modification::NotModified,
            )));
        info.props.set(PropertyKind::Modified, current.join(&modified));
    }
}
