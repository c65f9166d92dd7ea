use super::dv::*;
use super::props::*;

use itertools::Itertools;

fn resolved(v: PropertyValue) -> Dv<PropertyValue> {
    Dv::Resolved(v)
}

#[test]
fn cause_sets_are_sorted_and_unique() {
    let mut causes = CauseSet::new();
    causes.insert(Cause(3));
    causes.insert(Cause(1));
    causes.insert(Cause(3));
    causes.insert(Cause(2));

    assert_eq!(causes.len(), 3);
    assert_eq!(
        causes.iter().collect_vec(),
        vec![Cause(1), Cause(2), Cause(3)]
    );
    assert!(causes.contains(Cause(2)));
    assert!(!causes.contains(Cause(4)));

    let other: CauseSet = [Cause(4), Cause(1)].into_iter().collect();
    let union = causes.union(&other);
    assert_eq!(union.len(), 4);
}

#[test]
fn combine_resolved_operands() {
    let not_null = resolved(PropertyValue::Nullness(Nullness::NotNull));
    let nullable = resolved(PropertyValue::Nullness(Nullness::Nullable));

    assert_eq!(not_null.join(&nullable), nullable);
    assert_eq!(not_null.meet(&nullable), not_null);
}

#[test]
fn combine_stays_delayed_without_absorption() {
    let not_null = resolved(PropertyValue::Nullness(Nullness::NotNull));
    let delayed = Dv::delayed(Cause(7));

    // The outcome of the join still depends on the delayed operand.
    let joined = not_null.join(&delayed);
    assert!(joined.is_delayed());
    assert!(joined.causes().unwrap().contains(Cause(7)));

    // Two delays merge their causes.
    let other: Dv<PropertyValue> = Dv::delayed(Cause(9));
    let both = delayed.join(&other);
    assert_eq!(both.causes().unwrap().len(), 2);
}

#[test]
fn absorbing_operand_short_circuits_a_delay() {
    let modified = resolved(PropertyValue::Modification(Modification::Modified));
    let delayed = Dv::delayed(Cause(1));

    // A resolved worst value decides the join on its own.
    assert_eq!(modified.join(&delayed), modified);
    assert_eq!(delayed.join(&modified), modified);

    // Dually, a resolved best value decides the meet.
    let not_modified = resolved(PropertyValue::Modification(Modification::NotModified));
    assert_eq!(not_modified.meet(&delayed), not_modified);
}

#[test]
fn join_all_folds() {
    let values = vec![
        resolved(PropertyValue::Immutability(Immutability::Recursive)),
        resolved(PropertyValue::Immutability(Immutability::Effective)),
        resolved(PropertyValue::Immutability(Immutability::EventualBefore)),
    ];
    assert_eq!(
        Dv::join_all(&values),
        Some(resolved(PropertyValue::Immutability(
            Immutability::EventualBefore
        )))
    );
    assert_eq!(Dv::<PropertyValue>::join_all([]), None);
}

#[test]
fn improvement_relation() {
    let delayed: Dv<PropertyValue> = Dv::delayed(Cause(1));
    let nullable = resolved(PropertyValue::Nullness(Nullness::Nullable));
    let not_null = resolved(PropertyValue::Nullness(Nullness::NotNull));

    // Delayed may become anything.
    assert!(nullable.improves_upon(&delayed));
    assert!(delayed.improves_upon(&delayed));

    // Resolved may stay equal or become more precise, never regress.
    assert!(nullable.improves_upon(&nullable));
    assert!(not_null.improves_upon(&nullable));
    assert!(!nullable.improves_upon(&not_null));
    assert!(!delayed.improves_upon(&nullable));
}

#[test]
fn property_map_basics() {
    let mut map = PropertyMap::new();
    assert!(map.get(PropertyKind::NotNull).is_none());
    assert_eq!(
        map.get_or_delayed(PropertyKind::NotNull, Cause(5)),
        Dv::delayed(Cause(5))
    );

    map.set_resolved(
        PropertyKind::NotNull,
        PropertyValue::Nullness(Nullness::NotNull),
    );
    map.set(PropertyKind::Modified, Dv::delayed(Cause(2)));

    assert!(!map.is_fully_resolved());
    assert_eq!(map.delays().iter().collect_vec(), vec![Cause(2)]);

    map.set_resolved(
        PropertyKind::Modified,
        PropertyValue::Modification(Modification::NotModified),
    );
    assert!(map.is_fully_resolved());
}

#[test]
fn property_map_join() {
    let mut lhs = PropertyMap::new();
    lhs.set_resolved(
        PropertyKind::NotNull,
        PropertyValue::Nullness(Nullness::NotNull),
    );
    lhs.set_resolved(
        PropertyKind::Modified,
        PropertyValue::Modification(Modification::NotModified),
    );

    let mut rhs = PropertyMap::new();
    rhs.set_resolved(
        PropertyKind::NotNull,
        PropertyValue::Nullness(Nullness::Nullable),
    );

    let joined = lhs.join_with(&rhs);
    assert_eq!(
        joined.get(PropertyKind::NotNull),
        Some(&Dv::Resolved(PropertyValue::Nullness(Nullness::Nullable)))
    );
    // Dimensions present on one side only keep their value.
    assert_eq!(
        joined.get(PropertyKind::Modified),
        Some(&Dv::Resolved(PropertyValue::Modification(
            Modification::NotModified
        )))
    );
}

#[test]
fn property_map_improvement() {
    let mut previous = PropertyMap::new();
    previous.set(PropertyKind::NotNull, Dv::delayed(Cause(1)));
    previous.set_resolved(
        PropertyKind::Modified,
        PropertyValue::Modification(Modification::Modified),
    );

    let mut next = PropertyMap::new();
    next.set_resolved(
        PropertyKind::NotNull,
        PropertyValue::Nullness(Nullness::NotNull),
    );
    next.set_resolved(
        PropertyKind::Modified,
        PropertyValue::Modification(Modification::Modified),
    );
    assert!(next.improves_upon(&previous));

    // Dropping a previously resolved dimension is a regression.
    let empty = PropertyMap::new();
    assert!(!empty.improves_upon(&previous));
}
