use crate::core::{Error, Outcome};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    reconciles: Family<OutcomeLabels, Counter>,
    duration: Histogram,
    failures: Family<FailureLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct FailureLabels {
    reason: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "reconciles",
            "Count of completed reconciles by outcome",
            reconciles.clone(),
        );

        // Reconciles are bounded by a handful of API calls, each with its
        // own request timeout.
        let duration = Histogram::new([0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]);
        reg.register_with_unit(
            "reconcile_duration",
            "Histogram of reconcile latencies",
            Unit::Seconds,
            duration.clone(),
        );

        let failures = Family::<FailureLabels, Counter>::default();
        reg.register(
            "propagation_failures",
            "Count of failed reconciles by reason",
            failures.clone(),
        );

        Self {
            reconciles,
            duration,
            failures,
        }
    }

    pub(crate) fn observe(&self, res: &Result<Outcome, Error>, elapsed: time::Duration) {
        self.duration.observe(elapsed.as_secs_f64());
        let outcome = match res {
            Ok(outcome) => outcome_str(*outcome),
            Err(error) => {
                self.failures
                    .get_or_create(&FailureLabels {
                        reason: error.reason(),
                    })
                    .inc();
                "error"
            }
        };
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Absent => "absent",
        Outcome::Unmanaged => "unmanaged",
        Outcome::Propagated => "propagated",
        Outcome::Unpropagated => "unpropagated",
        Outcome::Released => "released",
    }
}
