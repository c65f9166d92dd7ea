use lattice::props::{Independence, Modification, Nullness};

use crate::sema::Builtin;

/// Behavioral contract of a built-in operation. Builtins have no analysed
/// body; their facts are axiomatic and never delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFacts {
    /// Whether the call modifies the object it is invoked on.
    pub modifies_receiver: Modification,
    /// Nullness of the returned value; `None` for value-typed or void
    /// results, which cannot be null.
    pub result_nullness: Option<Nullness>,
    /// How the returned value relates to the receiver's object graph.
    pub result_independence: Independence,
}

pub fn builtin_facts(builtin: Builtin) -> BuiltinFacts {
    use Builtin::*;
    match builtin {
        ListAdd => BuiltinFacts {
            modifies_receiver: Modification::Modified,
            result_nullness: None,
            result_independence: Independence::Independent,
        },
        // Elements handed out by a list are part of its hidden content;
        // absent element guarantees, the result may be null.
        ListGet => BuiltinFacts {
            modifies_receiver: Modification::NotModified,
            result_nullness: Some(Nullness::Nullable),
            result_independence: Independence::HiddenContent,
        },
        ListSize | ListIsEmpty | ListContains | StrLength => BuiltinFacts {
            modifies_receiver: Modification::NotModified,
            result_nullness: None,
            result_independence: Independence::Independent,
        },
        StrConcat => BuiltinFacts {
            modifies_receiver: Modification::NotModified,
            result_nullness: None,
            result_independence: Independence::Independent,
        },
    }
}
