use crate::store::{StoreError, TargetKind};

/// Errors that fail a single reconcile.
///
/// Every error is scoped to one source ingress and is resolved by a later
/// reconcile of that same ingress.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch ingress {namespace}/{name}: {source}")]
    SourceFetchFailed {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to list ingress classes: {0}")]
    OwnershipLookupFailed(#[source] StoreError),

    #[error(transparent)]
    TransformInvalid(#[from] TransformError),

    #[error("failed to apply {kind} {name}: {source}")]
    TargetApplyFailed {
        kind: TargetKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("target ingress {0} has no uid")]
    TargetIdentityMissing(String),

    #[error("failed to remove {kind} {name}: {source}")]
    TargetRemoveFailed {
        kind: TargetKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to update finalizers of ingress {namespace}/{name}: {source}")]
    FinalizerPersistFailed {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Reasons a source ingress cannot be turned into a propagation.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("ingress {namespace}/{name} has a rule with an empty host")]
    EmptyHost { namespace: String, name: String },

    #[error("backend service {namespace}/{service} is not resolvable: {reason}")]
    BackendUnresolved {
        namespace: String,
        service: String,
        reason: Unresolved,
    },

    #[error("failed to fetch service {namespace}/{service}: {source}")]
    BackendFetch {
        namespace: String,
        service: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("no load balancer address has been assigned")]
    NoLoadBalancer,

    #[error("no port named {0:?}")]
    NoNamedPort(String),

    #[error("the backend does not specify a port")]
    NoPort,

    #[error("only service backends can be propagated")]
    NotAService,
}

// === impl Error ===

impl Error {
    /// A short, stable label describing the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SourceFetchFailed { .. } => "source_fetch",
            Self::OwnershipLookupFailed(_) => "ownership_lookup",
            Self::TransformInvalid(TransformError::EmptyHost { .. }) => "empty_host",
            Self::TransformInvalid(TransformError::BackendUnresolved { .. }) => {
                "backend_unresolved"
            }
            Self::TransformInvalid(TransformError::BackendFetch { .. }) => "backend_fetch",
            Self::TargetApplyFailed { .. } | Self::TargetIdentityMissing(_) => "target_apply",
            Self::TargetRemoveFailed { .. } => "target_remove",
            Self::FinalizerPersistFailed { .. } => "finalizer_persist",
        }
    }
}
