//! The interfaces the reconciler requires from the source and target clusters.

use async_trait::async_trait;
use ingress_propagator_k8s_api::{
    Endpoints, Ingress, IngressClass, ObjectMeta, OwnerReference, Resource, ResourceExt,
    Selector, Service,
};
use std::fmt;
use tokio::time;

/// Read and write access to the cluster that declares the ingresses.
#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, StoreError>;

    /// Persists the ingress's metadata. Fails on a resource version conflict.
    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError>;

    async fn list_ingress_classes(&self) -> Result<Vec<IngressClass>, StoreError>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError>;
}

/// Access to the target namespace that receives derived objects.
#[async_trait]
pub trait TargetApi: Send + Sync {
    async fn create(&self, obj: &TargetObject) -> Result<TargetObject, StoreError>;

    async fn update(&self, obj: &TargetObject) -> Result<TargetObject, StoreError>;

    async fn get(&self, kind: TargetKind, name: &str) -> Result<TargetObject, StoreError>;

    async fn delete(&self, kind: TargetKind, name: &str) -> Result<(), StoreError>;

    async fn list(
        &self,
        kind: TargetKind,
        selector: &Selector,
    ) -> Result<Vec<TargetObject>, StoreError>;
}

/// Records human-readable events against a source ingress.
///
/// Publishing is best-effort: implementations log failures instead of
/// returning them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, ingress: &Ingress, event: PropagationEvent);
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("request timed out after {0:?}")]
    Timeout(time::Duration),

    #[error(transparent)]
    Api(kube::Error),
}

/// One of the object kinds written to the target cluster.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetObject {
    Ingress(Ingress),
    Service(Service),
    Endpoints(Endpoints),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Ingress,
    Service,
    Endpoints,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropagationEvent {
    pub type_: EventType,
    pub reason: &'static str,
    pub note: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

// === impl StoreError ===

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref rsp) if rsp.code == 404 => Self::NotFound,
            error => Self::Api(error),
        }
    }
}

// === impl TargetObject ===

impl TargetObject {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Ingress(_) => TargetKind::Ingress,
            Self::Service(_) => TargetKind::Service,
            Self::Endpoints(_) => TargetKind::Endpoints,
        }
    }

    pub fn name(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Ingress(obj) => obj.meta(),
            Self::Service(obj) => obj.meta(),
            Self::Endpoints(obj) => obj.meta(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Ingress(obj) => obj.meta_mut(),
            Self::Service(obj) => obj.meta_mut(),
            Self::Endpoints(obj) => obj.meta_mut(),
        }
    }

    pub fn uid(&self) -> Option<String> {
        match self {
            Self::Ingress(obj) => obj.uid(),
            Self::Service(obj) => obj.uid(),
            Self::Endpoints(obj) => obj.uid(),
        }
    }

    /// A non-controller owner reference to this object, if it has been
    /// persisted and carries a uid.
    pub fn owner_ref(&self) -> Option<OwnerReference> {
        match self {
            Self::Ingress(obj) => obj.owner_ref(&()),
            Self::Service(obj) => obj.owner_ref(&()),
            Self::Endpoints(obj) => obj.owner_ref(&()),
        }
    }
}

impl From<Ingress> for TargetObject {
    fn from(obj: Ingress) -> Self {
        Self::Ingress(obj)
    }
}

impl From<Service> for TargetObject {
    fn from(obj: Service) -> Self {
        Self::Service(obj)
    }
}

impl From<Endpoints> for TargetObject {
    fn from(obj: Endpoints) -> Self {
        Self::Endpoints(obj)
    }
}

// === impl TargetKind ===

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => f.write_str("Ingress"),
            Self::Service => f.write_str("Service"),
            Self::Endpoints => f.write_str("Endpoints"),
        }
    }
}

// === impl PropagationEvent ===

impl PropagationEvent {
    pub const PROPAGATED: &'static str = "IngressPropagated";
    pub const UNPROPAGATED: &'static str = "IngressUnpropagated";
    pub const PROPAGATION_FAILED: &'static str = "PropagationFailed";
    pub const UNPROPAGATION_FAILED: &'static str = "UnpropagationFailed";

    pub fn normal(reason: &'static str, note: impl ToString) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            note: note.to_string(),
        }
    }

    pub fn warning(reason: &'static str, note: impl ToString) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            note: note.to_string(),
        }
    }
}
