use core::fmt::Debug;
use core::fmt::Display;

use smallvec::SmallVec;

use crate::props::{JoinSemiLattice, Lattice, PropertyKind, PropertyValue};

/// Opaque identifier of a fact that a delayed value is blocked on. The
/// engine packs the identity of a program element and a property dimension
/// into the payload; this crate never needs to look inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cause(pub u64);

/// A non-empty, ordered set of blocking causes. Kept sorted and unique so
/// that delay propagation is deterministic and cheap to compare.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CauseSet(SmallVec<[Cause; 2]>);

impl CauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(cause: Cause) -> Self {
        Self(SmallVec::from_slice(&[cause]))
    }

    pub fn insert(&mut self, cause: Cause) {
        if let Err(pos) = self.0.binary_search(&cause) {
            self.0.insert(pos, cause);
        }
    }

    pub fn merge(&mut self, other: &CauseSet) {
        for &cause in &other.0 {
            self.insert(cause);
        }
    }

    pub fn union(&self, other: &CauseSet) -> CauseSet {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    pub fn contains(&self, cause: Cause) -> bool {
        self.0.binary_search(&cause).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Cause> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Cause> for CauseSet {
    fn from_iter<T: IntoIterator<Item = Cause>>(iter: T) -> Self {
        let mut result = CauseSet::new();
        for cause in iter {
            result.insert(cause);
        }
        result
    }
}

/// The operations [`Dv`] needs from the underlying value space. There is a
/// blanket implementation for every [`Lattice`]; [`PropertyValue`] gets its
/// own because it is a sum of lattices rather than a single one.
pub trait Combine: Clone + Eq + Debug {
    fn combined(&self, op: CombineOp, other: &Self) -> Self;

    /// True when the value forces the outcome of `op` regardless of the
    /// other operand, so a delayed operand can be short-circuited away.
    fn is_absorbing(&self, op: CombineOp) -> bool;
}

impl<L: Lattice> Combine for L {
    fn combined(&self, op: CombineOp, other: &Self) -> Self {
        match op {
            CombineOp::Join => self.join(other),
            CombineOp::Meet => self.meet(other),
        }
    }

    fn is_absorbing(&self, op: CombineOp) -> bool {
        match op {
            CombineOp::Join => *self == L::top(),
            CombineOp::Meet => *self == L::bottom(),
        }
    }
}

impl Combine for PropertyValue {
    fn combined(&self, op: CombineOp, other: &Self) -> Self {
        match op {
            CombineOp::Join => self.join(other),
            CombineOp::Meet => self.meet(other),
        }
    }

    fn is_absorbing(&self, op: CombineOp) -> bool {
        match op {
            CombineOp::Join => self.is_join_absorbing(),
            CombineOp::Meet => self.is_meet_absorbing(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombineOp {
    Join,
    Meet,
}

/// A delayed value: either a concrete value of the underlying space, or a
/// placeholder blocked on a set of facts. Delayed values are first-class
/// data; they flow through every computation and never abort anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dv<V> {
    Resolved(V),
    Delayed(CauseSet),
}

impl<V> Dv<V> {
    pub fn delayed(cause: Cause) -> Self {
        Dv::Delayed(CauseSet::singleton(cause))
    }

    pub fn delayed_on(causes: CauseSet) -> Self {
        debug_assert!(!causes.is_empty(), "A delay needs at least one cause.");
        Dv::Delayed(causes)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Dv::Resolved(_))
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self, Dv::Delayed(_))
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Dv::Resolved(v) => Some(v),
            Dv::Delayed(_) => None,
        }
    }

    /// The blocking fact set of a delayed value, used for progress tracking
    /// and delay cycle detection.
    pub fn causes(&self) -> Option<&CauseSet> {
        match self {
            Dv::Resolved(_) => None,
            Dv::Delayed(causes) => Some(causes),
        }
    }
}

impl<V: Combine> Dv<V> {
    /// Combine two delayed values under the given lattice operation. The
    /// result stays delayed until all operands resolve, except when a
    /// resolved absorbing operand decides the outcome on its own.
    pub fn combine(op: CombineOp, lhs: &Dv<V>, rhs: &Dv<V>) -> Dv<V> {
        match (lhs, rhs) {
            (Dv::Resolved(a), Dv::Resolved(b)) => Dv::Resolved(a.combined(op, b)),
            (Dv::Resolved(v), Dv::Delayed(causes)) | (Dv::Delayed(causes), Dv::Resolved(v)) => {
                if v.is_absorbing(op) {
                    Dv::Resolved(v.clone())
                } else {
                    Dv::Delayed(causes.clone())
                }
            }
            (Dv::Delayed(a), Dv::Delayed(b)) => Dv::Delayed(a.union(b)),
        }
    }

    pub fn join(&self, other: &Dv<V>) -> Dv<V> {
        Self::combine(CombineOp::Join, self, other)
    }

    pub fn meet(&self, other: &Dv<V>) -> Dv<V> {
        Self::combine(CombineOp::Meet, self, other)
    }

    /// Join of arbitrarily many operands; `None` for an empty sequence.
    pub fn join_all<'a>(values: impl IntoIterator<Item = &'a Dv<V>>) -> Option<Dv<V>>
    where
        V: 'a,
    {
        values
            .into_iter()
            .fold(None, |acc: Option<Dv<V>>, v| match acc {
                None => Some(v.clone()),
                Some(acc) => Some(acc.join(v)),
            })
    }
}

impl<V: Combine + PartialOrd> Dv<V> {
    /// The monotonicity relation of the fixpoint iteration: a delayed value
    /// may become anything, a resolved value may only stay equal or become
    /// more precise (lattice-smaller). Never true for resolved-to-delayed
    /// regressions.
    pub fn improves_upon(&self, previous: &Dv<V>) -> bool {
        match (previous, self) {
            (Dv::Delayed(_), _) => true,
            (Dv::Resolved(old), Dv::Resolved(new)) => new <= old,
            (Dv::Resolved(_), Dv::Delayed(_)) => false,
        }
    }
}

impl<V: Display> Display for Dv<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Dv::Resolved(v) => write!(f, "{v}"),
            Dv::Delayed(causes) => write!(f, "delayed({})", causes.len()),
        }
    }
}

/// Mapping from property dimensions to their (possibly delayed) values for
/// one program element or variable snapshot. Kept sorted by kind; absent
/// kinds mean "not yet computed".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyMap(SmallVec<[(PropertyKind, Dv<PropertyValue>); 5]>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: PropertyKind) -> Option<&Dv<PropertyValue>> {
        self.0
            .binary_search_by_key(&kind, |&(k, _)| k)
            .ok()
            .map(|pos| &self.0[pos].1)
    }

    /// The value for the dimension, treating "not yet computed" as a delay
    /// on the given cause.
    pub fn get_or_delayed(&self, kind: PropertyKind, cause: Cause) -> Dv<PropertyValue> {
        self.get(kind)
            .cloned()
            .unwrap_or_else(|| Dv::delayed(cause))
    }

    pub fn set(&mut self, kind: PropertyKind, value: Dv<PropertyValue>) {
        match self.0.binary_search_by_key(&kind, |&(k, _)| k) {
            Ok(pos) => self.0[pos].1 = value,
            Err(pos) => self.0.insert(pos, (kind, value)),
        }
    }

    pub fn set_resolved(&mut self, kind: PropertyKind, value: PropertyValue) {
        self.set(kind, Dv::Resolved(value));
    }

    /// Per-dimension join with the other map, used when merging control
    /// flow branches. Dimensions present on one side only keep their value.
    pub fn join_with(&self, other: &PropertyMap) -> PropertyMap {
        let mut result = self.clone();
        for (kind, value) in &other.0 {
            match result.get(*kind) {
                Some(existing) => {
                    let joined = existing.join(value);
                    result.set(*kind, joined);
                }
                None => result.set(*kind, value.clone()),
            }
        }
        result
    }

    /// True when every dimension respects the monotonicity relation
    /// against the previous iteration's map.
    pub fn improves_upon(&self, previous: &PropertyMap) -> bool {
        previous.0.iter().all(|(kind, old)| match self.get(*kind) {
            Some(new) => new.improves_upon(old),
            None => false,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyKind, &Dv<PropertyValue>)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Causes of every still-delayed dimension in the map.
    pub fn delays(&self) -> CauseSet {
        let mut result = CauseSet::new();
        for (_, value) in &self.0 {
            if let Dv::Delayed(causes) = value {
                result.merge(causes);
            }
        }
        result
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.0.iter().all(|(_, v)| v.is_resolved())
    }
}

impl FromIterator<(PropertyKind, Dv<PropertyValue>)> for PropertyMap {
    fn from_iter<T: IntoIterator<Item = (PropertyKind, Dv<PropertyValue>)>>(iter: T) -> Self {
        let mut result = PropertyMap::new();
        for (kind, value) in iter {
            result.set(kind, value);
        }
        result
    }
}
