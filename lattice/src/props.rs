use core::cmp::Ordering;
use core::fmt::Debug;
use core::fmt::Display;

//////////////////////////
// Traits for lattices. //
//////////////////////////

/// A join semi-lattice is a partially ordered set where the least upper
/// bound exists for every subset. In this crate the ordering runs from the
/// most precise guarantee (bottom) to the weakest one (top): merging the
/// outcomes of control flow branches joins them, so the merged state never
/// promises more than any branch did.
pub trait JoinSemiLattice: Eq + PartialOrd + Clone + Debug {
    /// The most precise element, unit of the join operation.
    ///
    /// Requirements:
    /// * Bottom is the smallest element according to the ordering.
    fn bottom() -> Self;

    /// The least upper bound of the two elements.
    ///
    /// Requirements:
    /// * Reflexive: a.join(a) == a
    /// * Commutative: a.join(b) == b.join(a)
    /// * Bottom is unit: bottom.join(b) == b
    /// * Upper bound: a.join(b) >= a and a.join(b) >= b
    /// * Ordering is respected: a <= b => a.join(b) == b
    fn join(&self, other: &Self) -> Self;
}

/// A lattice also has the greatest lower bound (meet) for all subsets.
/// The meet is used when a path condition narrows what is known, e.g. a
/// null check narrowing a nullable value to not-null on one branch.
pub trait Lattice: JoinSemiLattice {
    /// The weakest element, unit of the meet operation.
    fn top() -> Self;

    /// The greatest lower bound of the two elements.
    ///
    /// Requirements:
    /// * Reflexive: a.meet(a) == a
    /// * Commutative: a.meet(b) == b.meet(a)
    /// * Top is unit: top.meet(b) == b
    /// * Lower bound: a.meet(b) <= a and a.meet(b) <= b
    /// * Ordering is respected: a <= b => a.meet(b) == a
    fn meet(&self, other: &Self) -> Self;
}

/// All the property dimensions are small totally ordered enums, the lattice
/// operations follow from the derived [`Ord`].
macro_rules! graded_lattice {
    ($name:ident) => {
        impl JoinSemiLattice for $name {
            fn bottom() -> Self {
                Self::BOTTOM
            }

            fn join(&self, other: &Self) -> Self {
                *self.max(other)
            }
        }

        impl Lattice for $name {
            fn top() -> Self {
                Self::TOP
            }

            fn meet(&self, other: &Self) -> Self {
                *self.min(other)
            }
        }
    };
}

////////////////////////////
// The tracked properties //
////////////////////////////

/// Whether a value can be null. `NotNull` is the precise guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Nullness {
    NotNull,
    Nullable,
}

impl Nullness {
    const BOTTOM: Self = Nullness::NotNull;
    const TOP: Self = Nullness::Nullable;
}

graded_lattice!(Nullness);

/// Whether an operation mutates the element (a method its receiver, a
/// parameter the object passed in), or whether a variable's object is
/// mutated. `NotModified` is the precise guarantee; once a modification is
/// observed the value is `Modified` and absorbs everything under join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modification {
    NotModified,
    Modified,
}

impl Modification {
    const BOTTOM: Self = Modification::NotModified;
    const TOP: Self = Modification::Modified;
}

graded_lattice!(Modification);

/// The immutability grade ladder. Totally ordered from the strongest
/// guarantee to none:
/// * `Recursive`: the object and everything reachable from it is immutable.
/// * `Effective`: the externally visible state cannot change after
///   construction, but hidden content may be mutable.
/// * `EventualAfter`: an eventually immutable object past its mark
///   transition, the designated fields are now fixed.
/// * `EventualBefore`: an eventually immutable object that has not been
///   marked yet.
/// * `Mutable`: no immutability guarantee at all.
///
/// "Dimension does not apply" is expressed by
/// [`PropertyValue::NotInvolved`], "not yet computed" by a delayed value;
/// neither is comparable to the grades above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Immutability {
    Recursive,
    Effective,
    EventualAfter,
    EventualBefore,
    Mutable,
}

impl Immutability {
    const BOTTOM: Self = Immutability::Recursive;
    const TOP: Self = Immutability::Mutable;
}

graded_lattice!(Immutability);

/// How strongly a returned value or stored argument can expose the internal
/// state of an object. `Independent` means no overlap at all,
/// `HiddenContent` means only nested content is shared (relevant to the
/// recursive immutability grade), `Dependent` means mutations are visible
/// through the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Independence {
    Independent,
    HiddenContent,
    Dependent,
}

impl Independence {
    const BOTTOM: Self = Independence::Independent;
    const TOP: Self = Independence::Dependent;
}

graded_lattice!(Independence);

/// Whether a field is effectively final: assigned in constructors only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Finality {
    Final,
    Variable,
}

impl Finality {
    const BOTTOM: Self = Finality::Final;
    const TOP: Self = Finality::Variable;
}

graded_lattice!(Finality);

/// The property dimensions tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKind {
    NotNull,
    Modified,
    Immutable,
    Independent,
    Final,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 5] = [
        PropertyKind::NotNull,
        PropertyKind::Modified,
        PropertyKind::Immutable,
        PropertyKind::Independent,
        PropertyKind::Final,
    ];
}

impl Display for PropertyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PropertyKind::NotNull => write!(f, "not-null"),
            PropertyKind::Modified => write!(f, "modified"),
            PropertyKind::Immutable => write!(f, "immutable"),
            PropertyKind::Independent => write!(f, "independent"),
            PropertyKind::Final => write!(f, "final"),
        }
    }
}

/// A value in one of the property dimensions, or the sentinel for a
/// dimension that does not apply to the element at all (e.g. modification
/// of a primitive value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    NotInvolved,
    Nullness(Nullness),
    Modification(Modification),
    Immutability(Immutability),
    Independence(Independence),
    Finality(Finality),
}

impl PropertyValue {
    /// The dimension this value belongs to; `None` for the sentinel.
    pub fn kind(&self) -> Option<PropertyKind> {
        match self {
            PropertyValue::NotInvolved => None,
            PropertyValue::Nullness(_) => Some(PropertyKind::NotNull),
            PropertyValue::Modification(_) => Some(PropertyKind::Modified),
            PropertyValue::Immutability(_) => Some(PropertyKind::Immutable),
            PropertyValue::Independence(_) => Some(PropertyKind::Independent),
            PropertyValue::Finality(_) => Some(PropertyKind::Final),
        }
    }

    /// The most precise value of the given dimension.
    pub fn best_of(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::NotNull => PropertyValue::Nullness(Nullness::bottom()),
            PropertyKind::Modified => PropertyValue::Modification(Modification::bottom()),
            PropertyKind::Immutable => PropertyValue::Immutability(Immutability::bottom()),
            PropertyKind::Independent => PropertyValue::Independence(Independence::bottom()),
            PropertyKind::Final => PropertyValue::Finality(Finality::bottom()),
        }
    }

    /// The weakest value of the given dimension.
    pub fn worst_of(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::NotNull => PropertyValue::Nullness(Nullness::top()),
            PropertyKind::Modified => PropertyValue::Modification(Modification::top()),
            PropertyKind::Immutable => PropertyValue::Immutability(Immutability::top()),
            PropertyKind::Independent => PropertyValue::Independence(Independence::top()),
            PropertyKind::Final => PropertyValue::Finality(Finality::top()),
        }
    }

    /// Join within one dimension; the sentinel is neutral so that a branch
    /// where the dimension does not apply never weakens the other branch.
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (PropertyValue::NotInvolved, v) | (v, PropertyValue::NotInvolved) => *v,
            (PropertyValue::Nullness(a), PropertyValue::Nullness(b)) => {
                PropertyValue::Nullness(a.join(b))
            }
            (PropertyValue::Modification(a), PropertyValue::Modification(b)) => {
                PropertyValue::Modification(a.join(b))
            }
            (PropertyValue::Immutability(a), PropertyValue::Immutability(b)) => {
                PropertyValue::Immutability(a.join(b))
            }
            (PropertyValue::Independence(a), PropertyValue::Independence(b)) => {
                PropertyValue::Independence(a.join(b))
            }
            (PropertyValue::Finality(a), PropertyValue::Finality(b)) => {
                PropertyValue::Finality(a.join(b))
            }
            (a, b) => {
                debug_assert!(false, "Joining values of different dimensions: {a:?}, {b:?}");
                *a
            }
        }
    }

    /// Meet within one dimension, the dual of [`PropertyValue::join`].
    pub fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (PropertyValue::NotInvolved, v) | (v, PropertyValue::NotInvolved) => *v,
            (PropertyValue::Nullness(a), PropertyValue::Nullness(b)) => {
                PropertyValue::Nullness(a.meet(b))
            }
            (PropertyValue::Modification(a), PropertyValue::Modification(b)) => {
                PropertyValue::Modification(a.meet(b))
            }
            (PropertyValue::Immutability(a), PropertyValue::Immutability(b)) => {
                PropertyValue::Immutability(a.meet(b))
            }
            (PropertyValue::Independence(a), PropertyValue::Independence(b)) => {
                PropertyValue::Independence(a.meet(b))
            }
            (PropertyValue::Finality(a), PropertyValue::Finality(b)) => {
                PropertyValue::Finality(a.meet(b))
            }
            (a, b) => {
                debug_assert!(false, "Meeting values of different dimensions: {a:?}, {b:?}");
                *a
            }
        }
    }

    /// True when this value absorbs every other operand of a join, i.e. it
    /// is the weakest value of its dimension. A delayed second operand
    /// cannot change the outcome then.
    pub fn is_join_absorbing(&self) -> bool {
        self.kind().is_some_and(|k| *self == Self::worst_of(k))
    }

    /// True when this value absorbs every other operand of a meet.
    pub fn is_meet_absorbing(&self) -> bool {
        self.kind().is_some_and(|k| *self == Self::best_of(k))
    }
}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (PropertyValue::NotInvolved, PropertyValue::NotInvolved) => Some(Ordering::Equal),
            (PropertyValue::Nullness(a), PropertyValue::Nullness(b)) => a.partial_cmp(b),
            (PropertyValue::Modification(a), PropertyValue::Modification(b)) => a.partial_cmp(b),
            (PropertyValue::Immutability(a), PropertyValue::Immutability(b)) => a.partial_cmp(b),
            (PropertyValue::Independence(a), PropertyValue::Independence(b)) => a.partial_cmp(b),
            (PropertyValue::Finality(a), PropertyValue::Finality(b)) => a.partial_cmp(b),
            (_, _) => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PropertyValue::NotInvolved => write!(f, "not-involved"),
            PropertyValue::Nullness(Nullness::NotNull) => write!(f, "not-null"),
            PropertyValue::Nullness(Nullness::Nullable) => write!(f, "nullable"),
            PropertyValue::Modification(Modification::NotModified) => write!(f, "not-modified"),
            PropertyValue::Modification(Modification::Modified) => write!(f, "modified"),
            PropertyValue::Immutability(Immutability::Recursive) => write!(f, "recursively-immutable"),
            PropertyValue::Immutability(Immutability::Effective) => write!(f, "effectively-immutable"),
            PropertyValue::Immutability(Immutability::EventualAfter) => write!(f, "eventual-after"),
            PropertyValue::Immutability(Immutability::EventualBefore) => write!(f, "eventual-before"),
            PropertyValue::Immutability(Immutability::Mutable) => write!(f, "mutable"),
            PropertyValue::Independence(Independence::Independent) => write!(f, "independent"),
            PropertyValue::Independence(Independence::HiddenContent) => write!(f, "hidden-content"),
            PropertyValue::Independence(Independence::Dependent) => write!(f, "dependent"),
            PropertyValue::Finality(Finality::Final) => write!(f, "final"),
            PropertyValue::Finality(Finality::Variable) => write!(f, "variable"),
        }
    }
}
