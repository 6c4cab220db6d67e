//! Integration tests for expression serialization and the isomorphism
//! engine, exercised end to end through the public API.

use uuid::Uuid;

use glossa::logic::node::ConceptRef;
use glossa::logic::{decode, encode, DataTarget, NodeKind};
use glossa::{
    find_isomorphisms, ExpressionBuilder, IdentifierService, LogicalExpression,
    MemoryIdentifierService, Nid,
};

/// concept ∧ (role ∃ value), one sufficient set.
fn clinical_finding(identifiers: &MemoryIdentifierService) -> LogicalExpression {
    let parent = identifiers.nid_for_uuid(Uuid::new_v4());
    let role = identifiers.nid_for_uuid(Uuid::new_v4());
    let site = identifiers.nid_for_uuid(Uuid::new_v4());

    let mut b = ExpressionBuilder::new().for_concept(identifiers.nid_for_uuid(Uuid::new_v4()));
    let isa = b.concept(ConceptRef::Nid(parent));
    let value = b.concept(ConceptRef::Nid(site));
    let restriction = b.role_some(ConceptRef::Nid(role), value);
    let and = b.and(vec![isa, restriction]);
    b.sufficient_set(and);
    b.build().unwrap()
}

fn with_parents(parents: &[Nid]) -> LogicalExpression {
    let mut b = ExpressionBuilder::new();
    let leaves: Vec<_> = parents
        .iter()
        .map(|p| b.concept(ConceptRef::Nid(*p)))
        .collect();
    let and = b.and(leaves);
    b.necessary_set(and);
    b.build().unwrap()
}

#[test]
fn internal_serialization_round_trips() {
    let identifiers = MemoryIdentifierService::new();
    let expression = clinical_finding(&identifiers);

    let bytes = encode(&expression);
    let decoded = decode(bytes, DataTarget::Internal).unwrap();
    assert_eq!(decoded, expression);
}

#[test]
fn external_conversion_is_stable_after_one_round_trip() {
    let identifiers = MemoryIdentifierService::new();
    let expression = clinical_finding(&identifiers);

    let external = expression.to_external(&identifiers).unwrap();
    let internal = external.to_internal(&identifiers).unwrap();
    assert_eq!(internal, expression);
    assert_eq!(internal.to_external(&identifiers).unwrap(), external);

    // External form serializes and round-trips too.
    let bytes = encode(&external);
    assert_eq!(decode(bytes, DataTarget::External).unwrap(), external);
}

#[test]
fn equality_ignores_commutative_child_order() {
    let left = with_parents(&[Nid(10), Nid(11)]);
    let right = with_parents(&[Nid(11), Nid(10)]);
    assert_eq!(left, right);
}

#[test]
fn self_isomorphism_maps_every_node() {
    let identifiers = MemoryIdentifierService::new();
    let expression = clinical_finding(&identifiers);

    let results = find_isomorphisms(&expression, &expression);
    assert_eq!(results.solution.score(), expression.node_count());
    assert_eq!(
        results.isomorphic_expression.node_count(),
        expression.node_count()
    );
    assert!(results.additions.is_empty());
    assert!(results.deletions.is_empty());
    assert!(results.added_relationship_roots.is_empty());
    assert!(results.deleted_relationship_roots.is_empty());
}

#[test]
fn single_leaf_change_reports_one_root_each_way() {
    let reference = with_parents(&[Nid(10), Nid(11), Nid(12)]);
    let comparison = with_parents(&[Nid(10), Nid(11), Nid(13)]);

    let results = find_isomorphisms(&reference, &comparison);
    assert_eq!(results.added_relationship_roots.len(), 1);
    assert_eq!(results.deleted_relationship_roots.len(), 1);
    // All ancestors of the changed leaf still match.
    assert_eq!(
        results.isomorphic_expression.node_count(),
        reference.node_count() - 1
    );

    let added = results.added_relationship_roots[0];
    assert!(matches!(
        reference.node(added).kind,
        NodeKind::Concept {
            concept: ConceptRef::Nid(Nid(12))
        }
    ));
    let deleted = results.deleted_relationship_roots[0];
    assert!(matches!(
        comparison.node(deleted).kind,
        NodeKind::Concept {
            concept: ConceptRef::Nid(Nid(13))
        }
    ));
}

#[test]
fn merged_expression_carries_both_definitions() {
    let reference = with_parents(&[Nid(10), Nid(11)]);
    let comparison = with_parents(&[Nid(10), Nid(12)]);

    let results = find_isomorphisms(&reference, &comparison);
    assert_eq!(
        results.merged_expression.isa_target_nids(),
        vec![Nid(10), Nid(11), Nid(12)]
    );
}

#[test]
fn repeated_runs_are_deterministic() {
    // Symmetric definitions admit several maximal mappings.
    let reference = with_parents(&[Nid(10), Nid(10), Nid(11)]);
    let comparison = with_parents(&[Nid(11), Nid(10), Nid(10)]);

    let first = find_isomorphisms(&reference, &comparison);
    for _ in 0..10 {
        let again = find_isomorphisms(&reference, &comparison);
        assert_eq!(again.solution, first.solution);
        assert_eq!(again.merged_expression, first.merged_expression);
    }
}
