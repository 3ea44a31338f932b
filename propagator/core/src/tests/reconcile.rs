use super::*;
use crate::{Error, EventType, Outcome, Reconciler, State};
use ingress_propagator_k8s_api::{has_finalizer, FINALIZER};
use pretty_assertions::assert_eq;

type TestReconciler = Reconciler<FakeSource, FakeTarget, FakeEvents>;

struct Harness {
    source: FakeSource,
    target: FakeTarget,
    events: FakeEvents,
    reconciler: TestReconciler,
}

fn harness() -> Harness {
    let source = FakeSource::default()
        .with_class(mk_class("propagated", CONTROLLER_CLASS))
        .with_class(mk_class("nginx", "k8s.io/ingress-nginx"))
        .with_service(mk_service("cart", &[(Some("http"), 80)], Some("10.0.0.5")))
        .with_service(mk_service("posts", &[(Some("http"), 8080)], Some("10.0.0.7")))
        .with_ingress(mk_ingress(
            "shop",
            "propagated",
            &[("shop.example.com", "cart", Port::Number(80))],
        ))
        .with_ingress(mk_ingress(
            "blog",
            "propagated",
            &[("blog.example.com", "posts", Port::Name("http"))],
        ));
    let target = FakeTarget::default();
    let events = FakeEvents::default();
    let reconciler = Reconciler::new(
        Arc::new(mk_config()),
        source.clone(),
        target.clone(),
        events.clone(),
    );
    Harness {
        source,
        target,
        events,
        reconciler,
    }
}

impl Harness {
    async fn reconcile(&self, name: &str) -> Result<Outcome, Error> {
        self.reconciler.reconcile(SOURCE_NS, name).await
    }

    fn finalized(&self, name: &str) -> bool {
        self.source
            .ingress(name)
            .map(|ingress| has_finalizer(&ingress, FINALIZER))
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn lifecycle() {
    let h = harness();

    let outcome = h.reconcile("shop").await.expect("propagation must succeed");
    assert_eq!(outcome, Outcome::Propagated);
    assert!(h.finalized("shop"));
    assert_eq!(h.target.derived("edge", "shop").len(), 3);
    let events = h.events.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "shop");
    assert_eq!(events[0].1.type_, EventType::Normal);
    assert_eq!(events[0].1.reason, PropagationEvent::PROPAGATED);

    // Nothing changes when nothing changed.
    let snapshot = h.target.snapshot();
    let version = h.source.ingress("shop").and_then(|i| i.metadata.resource_version);
    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Propagated));
    assert_eq!(h.target.snapshot(), snapshot);
    assert_eq!(
        h.source.ingress("shop").and_then(|i| i.metadata.resource_version),
        version
    );

    h.source.request_deletion("shop");
    let outcome = h.reconcile("shop").await.expect("removal must succeed");
    assert_eq!(outcome, Outcome::Unpropagated);
    assert!(h.target.snapshot().is_empty());
    // Releasing the finalizer lets the source cluster delete the ingress.
    assert!(h.source.ingress("shop").is_none());
    assert_eq!(
        h.events.reasons(),
        vec![PropagationEvent::PROPAGATED, PropagationEvent::UNPROPAGATED]
    );

    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Absent));
}

#[tokio::test]
async fn missing_ingress_is_absent() {
    let h = harness();
    assert_eq!(h.reconcile("nope").await.ok(), Some(Outcome::Absent));
    assert!(h.target.snapshot().is_empty());
}

#[tokio::test]
async fn unmanaged_ingress_is_never_mutated() {
    let h = harness();
    let mut ingress = mk_ingress(
        "admin",
        "nginx",
        &[("admin.example.com", "cart", Port::Number(80))],
    );
    ingress.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
    h.source.put_ingress(ingress);
    let before = h.source.ingress("admin");

    assert_eq!(h.reconcile("admin").await.ok(), Some(Outcome::Unmanaged));

    // Even a leftover finalizer on a deleting ingress is left alone.
    h.source.request_deletion("admin");
    let deleting = h.source.ingress("admin");
    assert_eq!(h.reconcile("admin").await.ok(), Some(Outcome::Unmanaged));

    assert_ne!(before, deleting);
    assert_eq!(h.source.ingress("admin"), deleting);
    assert!(h.finalized("admin"));
    assert!(h.target.snapshot().is_empty());
    assert!(h.events.take().is_empty());
}

#[tokio::test]
async fn released_ingress_is_left_alone() {
    let h = harness();
    let mut ingress = h.source.ingress("shop").expect("ingress must exist");
    ingress.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
    h.source.put_ingress(ingress);
    h.source.request_deletion("shop");
    let before = h.source.ingress("shop");

    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Released));
    assert_eq!(h.source.ingress("shop"), before);
    assert!(h.events.take().is_empty());
}

#[tokio::test]
async fn invalid_ingress_is_finalized_but_not_propagated() {
    let h = harness();
    h.source.put_ingress(mk_ingress(
        "shop",
        "propagated",
        &[("", "cart", Port::Number(80))],
    ));

    let error = h.reconcile("shop").await.expect_err("empty host");
    assert_eq!(error.reason(), "empty_host");
    assert!(h.finalized("shop"));
    assert!(h.target.snapshot().is_empty());

    let events = h.events.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.type_, EventType::Warning);
    assert_eq!(events[0].1.reason, PropagationEvent::PROPAGATION_FAILED);
    assert!(
        events[0]
            .1
            .note
            .starts_with("failed to extract propagation from ingress"),
        "{}",
        events[0].1.note
    );
}

#[tokio::test]
async fn unresolved_backend_keeps_previous_bundle() {
    let h = harness();
    h.reconcile("shop").await.expect("propagation must succeed");
    let snapshot = h.target.snapshot();

    // The load balancer loses its address.
    let pending = mk_service("cart", &[(Some("http"), 80)], None);
    h.source
        .state()
        .services
        .insert((SOURCE_NS.to_string(), "cart".to_string()), pending);

    let error = h.reconcile("shop").await.expect_err("backend is unresolved");
    assert!(
        matches!(
            error,
            Error::TransformInvalid(crate::TransformError::BackendUnresolved { .. })
        ),
        "{error:?}"
    );
    assert_eq!(h.target.snapshot(), snapshot);
    assert!(h.finalized("shop"));
    assert_eq!(
        h.events.reasons(),
        vec![
            PropagationEvent::PROPAGATED,
            PropagationEvent::PROPAGATION_FAILED
        ]
    );
}

#[tokio::test]
async fn failed_removal_keeps_finalizer() {
    let h = harness();
    h.reconcile("shop").await.expect("propagation must succeed");

    h.source.request_deletion("shop");
    h.target.state().fail_deletes = true;
    let error = h.reconcile("shop").await.expect_err("delete must fail");
    assert_eq!(error.reason(), "target_remove");
    assert!(h.finalized("shop"));
    assert_eq!(
        h.events.reasons().last().copied(),
        Some(PropagationEvent::UNPROPAGATION_FAILED)
    );

    // The next attempt completes the removal.
    h.target.state().fail_deletes = false;
    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Unpropagated));
    assert!(h.source.ingress("shop").is_none());
    assert!(h.target.snapshot().is_empty());
}

#[tokio::test]
async fn finalizer_conflict_writes_nothing() {
    let h = harness();
    h.source.state().fail_replace = true;

    let error = h.reconcile("shop").await.expect_err("finalizer write must fail");
    assert!(
        matches!(error, Error::FinalizerPersistFailed { .. }),
        "{error:?}"
    );
    assert!(!h.finalized("shop"));
    assert!(h.target.snapshot().is_empty());
    assert!(h.events.take().is_empty());
}

#[tokio::test]
async fn propagations_are_independent() {
    let h = harness();
    h.reconcile("shop").await.expect("shop must propagate");
    h.reconcile("blog").await.expect("blog must propagate");
    let blog = h.target.derived("edge", "blog");
    assert_eq!(blog.len(), 3);

    h.source.request_deletion("shop");
    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Unpropagated));
    assert!(h.target.derived("edge", "shop").is_empty());
    assert_eq!(h.target.derived("edge", "blog"), blog);
}

#[test]
fn lifecycle_states() {
    let mut ingress = mk_ingress("shop", "propagated", &[]);
    assert_eq!(State::of(&ingress, false), State::Unmanaged);
    assert_eq!(State::of(&ingress, true), State::ManagedActive);

    ingress.metadata.deletion_timestamp =
        Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
    assert_eq!(State::of(&ingress, true), State::Released);
    assert_eq!(State::of(&ingress, false), State::Unmanaged);

    ingress.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
    assert_eq!(State::of(&ingress, true), State::ManagedDeleting);
}

#[test]
fn retries_after_configured_backoff() {
    let h = harness();
    assert_eq!(h.reconciler.retry_after(), time::Duration::from_secs(60));
    assert_eq!(h.reconciler.config().identifier, "edge");
}

#[tokio::test]
async fn dropped_backend_is_pruned() {
    let h = harness();
    h.source.put_ingress(mk_ingress(
        "shop",
        "propagated",
        &[
            ("shop.example.com", "cart", Port::Number(80)),
            ("blog.example.com", "posts", Port::Name("http")),
        ],
    ));
    h.reconcile("shop").await.expect("propagation must succeed");
    assert_eq!(h.target.derived("edge", "shop").len(), 5);

    let mut ingress = h.source.ingress("shop").expect("ingress must exist");
    if let Some(rules) = ingress.spec.as_mut().and_then(|s| s.rules.as_mut()) {
        rules.retain(|rule| rule.host.as_deref() == Some("shop.example.com"));
    }
    h.source.put_ingress(ingress);
    assert_eq!(h.reconcile("shop").await.ok(), Some(Outcome::Propagated));

    let mut remaining = h
        .target
        .derived("edge", "shop")
        .into_iter()
        .map(|obj| (obj.kind(), obj.name()))
        .collect::<Vec<_>>();
    remaining.sort();
    let mut expected = vec![
        (TargetKind::Ingress, "edge-shop".to_string()),
        (TargetKind::Service, "cart".to_string()),
        (TargetKind::Endpoints, "cart".to_string()),
    ];
    expected.sort();
    assert_eq!(remaining, expected);
}
