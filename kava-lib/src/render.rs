//! Textual rendering of the derived facts, one line per program element.
//! The driver prints this after the fixpoint; the tests match on it.

use itertools::Itertools;

use crate::analysis::AnalysisResult;
use crate::sema::Unit;
use lattice::dv::{Dv, PropertyMap};

pub fn render_facts(unit: &Unit, result: &AnalysisResult) -> String {
    let mut out = String::new();
    let registry = &result.registry;
    for class_id in unit.class_iter() {
        let class = unit.class(class_id);
        out.push_str(&format!(
            "class {}: {}\n",
            unit.class_name(class_id),
            render_props(&registry.class(class_id).props)
        ));
        if let Some(field) = registry.class(class_id).eventual {
            out.push_str(&format!(
                "  eventually immutable once '{}' is set\n",
                unit.field_name(field)
            ));
        }
        for &field in &class.fields {
            out.push_str(&format!(
                "  field {}: {}\n",
                unit.field_name(field),
                render_props(&registry.field(field).props)
            ));
        }
        for &method_id in &class.methods {
            let method = unit.method(method_id);
            let analysis = registry.method(method_id);
            let name = if method.is_constructor {
                "constructor".to_owned()
            } else {
                unit.identifiers.get_name(method.name).to_owned()
            };
            out.push_str(&format!(
                "  method {name}: {}\n",
                render_props(&analysis.props)
            ));
            if let Some(inlined) = &analysis.inlined {
                out.push_str(&format!("    value: {}\n", inlined.print(unit)));
            }
            if let Some(precondition) = &analysis.precondition {
                out.push_str(&format!(
                    "    precondition: '{}' is unset\n",
                    unit.field_name(precondition.field)
                ));
            }
            if let Some(field) = &analysis.marks {
                out.push_str(&format!("    marks: '{}'\n", unit.field_name(*field)));
            }
            for &param in &method.params {
                out.push_str(&format!(
                    "    param {}: {}\n",
                    unit.param_name(param),
                    render_props(&registry.param(param).props)
                ));
            }
        }
    }
    out
}

fn render_props(props: &PropertyMap) -> String {
    if props.iter().next().is_none() {
        return "no facts".to_owned();
    }
    props
        .iter()
        .map(|(kind, value)| match value {
            Dv::Resolved(value) => format!("{kind} = {value}"),
            Dv::Delayed(causes) => format!("{kind} = delayed({})", causes.len()),
        })
        .join(", ")
}
