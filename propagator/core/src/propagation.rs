use crate::store::{TargetKind, TargetObject};
use ingress_propagator_k8s_api::{Endpoints, Ingress, Selector, Service};

/// The set of target objects computed from one source ingress.
///
/// A propagation is rebuilt on every reconcile and is never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Propagation {
    pub source_name: String,

    /// Derived from the propagator identifier and `source_name` only, so
    /// every reconcile of the same source addresses the same target ingress.
    pub target_name: String,

    /// Matches every derived service and endpoints object.
    pub selector: Selector,

    /// A snapshot of the ingress this propagation was computed from.
    pub source: Ingress,

    /// Absent when deletion of the source has been requested.
    pub bundle: Option<Bundle>,
}

/// The objects to publish in the target namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle {
    pub ingress: Ingress,

    /// One per distinct backend service, in the order first referenced.
    pub services: Vec<Service>,

    /// One per entry in `services`, in the same order.
    pub endpoints: Vec<Endpoints>,
}

// === impl Propagation ===

impl Propagation {
    pub fn is_deleted(&self) -> bool {
        self.bundle.is_none()
    }
}

// === impl Bundle ===

impl Bundle {
    /// The objects that reference the target ingress as their owner.
    pub fn dependents(&self) -> impl Iterator<Item = TargetObject> + '_ {
        self.services
            .iter()
            .cloned()
            .map(TargetObject::from)
            .chain(self.endpoints.iter().cloned().map(TargetObject::from))
    }

    /// Whether the bundle holds an object of `kind` named `name`.
    pub fn contains(&self, kind: TargetKind, name: &str) -> bool {
        match kind {
            TargetKind::Ingress => self.ingress.metadata.name.as_deref() == Some(name),
            TargetKind::Service => self
                .services
                .iter()
                .any(|svc| svc.metadata.name.as_deref() == Some(name)),
            TargetKind::Endpoints => self
                .endpoints
                .iter()
                .any(|ep| ep.metadata.name.as_deref() == Some(name)),
        }
    }
}
