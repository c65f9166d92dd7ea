//! The whole-program property analysis. The engine derives modification,
//! nullability, immutability, independence, and finality facts for every
//! method, parameter, field, and class of a [`crate::sema::Unit`] by
//! iterating all method bodies to a global fixpoint. Facts that depend on
//! not-yet-analysed elements circulate as delayed values and are filled in
//! by later iterations.

pub mod eval;
pub mod fixpoint;
pub mod flow;
pub mod link;
pub mod results;
pub mod state;
pub mod stmt;
pub mod value;

use lattice::dv::Cause;
use lattice::props::PropertyKind;

use crate::sema::{ClassId, FieldId, MethodId, ParamId, Unit};

pub use fixpoint::{AnalysisOptions, AnalysisResult, analyze};

/// The program elements facts can be blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementRef {
    Class(ClassId),
    Field(FieldId),
    Method(MethodId),
    Param(ParamId),
}

const CAUSE_VALUE_TAG: u64 = 0x3f;

/// Causes are packed element + property dimension pairs so the lattice
/// crate can treat them as opaque ordered payloads.
pub fn property_cause(element: ElementRef, kind: PropertyKind) -> Cause {
    pack_cause(element, kind as u64)
}

/// A delay on the computed value of a method rather than on one of its
/// property dimensions, raised while the callee's return value is unknown.
pub fn value_cause(method: MethodId) -> Cause {
    pack_cause(ElementRef::Method(method), CAUSE_VALUE_TAG)
}

fn pack_cause(element: ElementRef, prop: u64) -> Cause {
    let (tag, index) = match element {
        ElementRef::Class(id) => (0u64, id.0 as u64),
        ElementRef::Field(id) => (1, id.0 as u64),
        ElementRef::Method(id) => (2, id.0 as u64),
        ElementRef::Param(id) => (3, id.0 as u64),
    };
    Cause((tag << 62) | (index << 6) | prop)
}

pub fn unpack_cause(cause: Cause) -> (ElementRef, Option<PropertyKind>) {
    let index = ((cause.0 >> 6) & ((1 << 56) - 1)) as usize;
    let element = match cause.0 >> 62 {
        0 => ElementRef::Class(ClassId(index)),
        1 => ElementRef::Field(FieldId(index)),
        2 => ElementRef::Method(MethodId(index)),
        _ => ElementRef::Param(ParamId(index)),
    };
    let kind = PropertyKind::ALL.into_iter().find(|&k| k as u64 == cause.0 & 0x3f);
    (element, kind)
}

/// Human readable rendering of a blocking cause for delay diagnostics.
pub fn describe_cause(unit: &Unit, cause: Cause) -> String {
    let (element, kind) = unpack_cause(cause);
    let name = match element {
        ElementRef::Class(id) => format!("class {}", unit.class_name(id)),
        ElementRef::Field(id) => format!("field {}", unit.field_name(id)),
        ElementRef::Method(id) => format!("method {}", unit.method_name(id)),
        ElementRef::Param(id) => format!("parameter {}", unit.param_name(id)),
    };
    match kind {
        Some(kind) => format!("{name}: {kind}"),
        None => format!("{name}: value"),
    }
}
