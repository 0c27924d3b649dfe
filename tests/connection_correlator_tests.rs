use frameguard::connection::Correlator;
use frameguard::core::{Destination, PageId, StreamId, SubmissionId};
use std::time::Duration;
use tokio::time::Instant;

fn destination(page: u64, stream: &str) -> Destination {
    Destination::new(PageId::new(page), StreamId::new(stream))
}

#[test]
fn test_register_then_resolve_leaves_table_empty() {
    let mut correlator = Correlator::new(Duration::from_secs(30));
    let id = SubmissionId::new("f-1");

    correlator.register(id.clone(), destination(1, "vid-a"));
    assert_eq!(correlator.len(), 1);

    assert_eq!(correlator.resolve(&id), Some(destination(1, "vid-a")));
    assert!(correlator.is_empty());
}

#[test]
fn test_resolve_is_exactly_once() {
    let mut correlator = Correlator::new(Duration::from_secs(30));
    let id = SubmissionId::new("f-1");
    correlator.register(id.clone(), destination(1, "vid-a"));

    assert!(correlator.resolve(&id).is_some());
    assert!(correlator.resolve(&id).is_none());
}

#[test]
fn test_resolve_unregistered_is_unknown() {
    let mut correlator = Correlator::new(Duration::from_secs(30));
    assert!(correlator.resolve(&SubmissionId::new("never-sent")).is_none());
}

#[test]
fn test_expired_entry_resolves_as_unknown() {
    let mut correlator = Correlator::new(Duration::from_secs(30));
    let id = SubmissionId::new("f-late");
    let created = Instant::now();
    correlator.register_at(id.clone(), destination(2, "vid-b"), created);

    assert!(correlator
        .resolve_at(&id, created + Duration::from_secs(31))
        .is_none());
    assert!(correlator.is_empty());
}

#[test]
fn test_sweep_evicts_only_expired_entries() {
    let mut correlator = Correlator::new(Duration::from_secs(30));
    let start = Instant::now();
    correlator.register_at(SubmissionId::new("old"), destination(1, "vid-a"), start);
    correlator.register_at(
        SubmissionId::new("fresh"),
        destination(1, "vid-a"),
        start + Duration::from_secs(20),
    );

    let evicted = correlator.sweep(start + Duration::from_secs(40));
    assert_eq!(evicted, 1);
    assert_eq!(correlator.len(), 1);
    assert!(correlator
        .resolve_at(&SubmissionId::new("fresh"), start + Duration::from_secs(40))
        .is_some());
}
