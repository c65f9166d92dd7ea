use super::props::*;

#[test]
fn graded_lattices_respect_ordering() {
    assert!(Nullness::NotNull < Nullness::Nullable);
    assert!(Modification::NotModified < Modification::Modified);
    assert!(Finality::Final < Finality::Variable);
    assert!(Independence::Independent < Independence::HiddenContent);
    assert!(Independence::HiddenContent < Independence::Dependent);

    assert_eq!(Nullness::bottom(), Nullness::NotNull);
    assert_eq!(Nullness::top(), Nullness::Nullable);
    assert_eq!(Modification::bottom(), Modification::NotModified);
    assert_eq!(Modification::top(), Modification::Modified);
}

#[test]
fn graded_lattices_join_meet() {
    assert_eq!(
        Nullness::NotNull.join(&Nullness::Nullable),
        Nullness::Nullable
    );
    assert_eq!(
        Nullness::NotNull.meet(&Nullness::Nullable),
        Nullness::NotNull
    );
    assert_eq!(
        Modification::Modified.join(&Modification::NotModified),
        Modification::Modified
    );
    assert_eq!(
        Independence::Dependent.meet(&Independence::HiddenContent),
        Independence::HiddenContent
    );
}

#[test]
fn immutability_ladder_is_totally_ordered() {
    let ladder = [
        Immutability::Recursive,
        Immutability::Effective,
        Immutability::EventualAfter,
        Immutability::EventualBefore,
        Immutability::Mutable,
    ];
    for window in ladder.windows(2) {
        assert!(window[0] < window[1]);
        assert_eq!(window[0].join(&window[1]), window[1]);
        assert_eq!(window[0].meet(&window[1]), window[0]);
    }
    assert_eq!(Immutability::bottom(), Immutability::Recursive);
    assert_eq!(Immutability::top(), Immutability::Mutable);
}

#[test]
fn property_value_dimensions() {
    let not_null = PropertyValue::Nullness(Nullness::NotNull);
    let nullable = PropertyValue::Nullness(Nullness::Nullable);
    let modified = PropertyValue::Modification(Modification::Modified);

    assert_eq!(not_null.kind(), Some(PropertyKind::NotNull));
    assert_eq!(modified.kind(), Some(PropertyKind::Modified));
    assert_eq!(PropertyValue::NotInvolved.kind(), None);

    assert_eq!(not_null.join(&nullable), nullable);
    assert_eq!(not_null.meet(&nullable), not_null);

    // The sentinel is neutral in both directions.
    assert_eq!(PropertyValue::NotInvolved.join(&not_null), not_null);
    assert_eq!(modified.meet(&PropertyValue::NotInvolved), modified);

    // Values of different dimensions are not comparable.
    assert_eq!(not_null.partial_cmp(&modified), None);
    assert_eq!(nullable.partial_cmp(&PropertyValue::NotInvolved), None);
}

#[test]
fn absorbing_values() {
    assert!(PropertyValue::Nullness(Nullness::Nullable).is_join_absorbing());
    assert!(PropertyValue::Modification(Modification::Modified).is_join_absorbing());
    assert!(PropertyValue::Immutability(Immutability::Mutable).is_join_absorbing());
    assert!(!PropertyValue::Nullness(Nullness::NotNull).is_join_absorbing());
    assert!(!PropertyValue::NotInvolved.is_join_absorbing());

    assert!(PropertyValue::Nullness(Nullness::NotNull).is_meet_absorbing());
    assert!(PropertyValue::Modification(Modification::NotModified).is_meet_absorbing());
    assert!(!PropertyValue::Immutability(Immutability::Mutable).is_meet_absorbing());
}

#[test]
fn best_and_worst_per_dimension() {
    for kind in PropertyKind::ALL {
        let best = PropertyValue::best_of(kind);
        let worst = PropertyValue::worst_of(kind);
        assert!(best < worst);
        assert_eq!(best.join(&worst), worst);
        assert_eq!(best.meet(&worst), best);
    }
}

#[test]
fn pretty_printing() {
    assert_eq!(PropertyKind::NotNull.to_string(), "not-null");
    assert_eq!(
        PropertyValue::Immutability(Immutability::EventualBefore).to_string(),
        "eventual-before"
    );
    assert_eq!(PropertyValue::NotInvolved.to_string(), "not-involved");
}
