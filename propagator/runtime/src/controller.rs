use crate::{
    core::{Error, EventSink, Outcome, Reconciler, SourceApi, TargetApi},
    k8s::{Ingress, ResourceExt},
    metrics::ReconcileMetrics,
};
use kube::runtime::controller::Action;
use std::sync::Arc;
use tokio::time;

/// Shared by every reconcile driven by the controller.
pub(crate) struct Context<S, T, E> {
    reconciler: Reconciler<S, T, E>,
    metrics: ReconcileMetrics,
    resync: time::Duration,
}

// === impl Context ===

impl<S, T, E> Context<S, T, E> {
    pub(crate) fn new(
        reconciler: Reconciler<S, T, E>,
        metrics: ReconcileMetrics,
        resync: time::Duration,
    ) -> Self {
        Self {
            reconciler,
            metrics,
            resync,
        }
    }
}

pub(crate) async fn reconcile<S, T, E>(
    ingress: Arc<Ingress>,
    ctx: Arc<Context<S, T, E>>,
) -> Result<Action, Error>
where
    S: SourceApi,
    T: TargetApi,
    E: EventSink,
{
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();

    let start = time::Instant::now();
    let res = ctx
        .reconciler
        .reconcile(&namespace, &name)
        .await;
    ctx.metrics.observe(&res, start.elapsed());

    res.map(|outcome| action(outcome, ctx.resync))
}

pub(crate) fn error_policy<S, T, E>(
    ingress: Arc<Ingress>,
    error: &Error,
    ctx: Arc<Context<S, T, E>>,
) -> Action
where
    S: SourceApi,
    T: TargetApi,
    E: EventSink,
{
    let retry = ctx.reconciler.retry_after();
    tracing::warn!(
        namespace = %ingress.namespace().unwrap_or_default(),
        name = %ingress.name_any(),
        reason = error.reason(),
        %error,
        ?retry,
        "Reconcile failed",
    );
    Action::requeue(retry)
}

fn action(outcome: Outcome, resync: time::Duration) -> Action {
    match outcome {
        // Backend services are not watched, so load balancer address changes
        // are only picked up by periodically propagating again.
        Outcome::Propagated => Action::requeue(resync),
        Outcome::Absent | Outcome::Unmanaged | Outcome::Unpropagated | Outcome::Released => {
            Action::await_change()
        }
    }
}
