use ingress_propagator_k8s_api::{Selector, CLUSTER_ISSUER_ANNOTATION, ISSUER_ANNOTATION};
use tokio::time;

/// Holds the settings of one propagator instance.
///
/// Built once at startup and shared read-only by every reconcile.
#[derive(Clone, Debug)]
pub struct Config {
    /// Distinguishes this instance from other propagators publishing into the
    /// same target namespace. Written as the managed-by label and used as
    /// the prefix of every target ingress name.
    pub identifier: String,

    /// Matched against the legacy `kubernetes.io/ingress.class` annotation.
    pub ingress_class: String,

    /// Matched against `IngressClass.spec.controller` to discover the
    /// classes this instance controls.
    pub controller_class: String,

    /// The ingress class set on every target ingress.
    pub target_ingress_class: String,

    /// The namespace in the target cluster that receives derived objects.
    pub target_namespace: String,

    /// When set, each target ingress requests a certificate from this
    /// cert-manager issuer.
    pub issuer: Option<Issuer>,

    /// Copy the source ingress's TLS block verbatim.
    pub respect_tls: bool,

    /// How long to wait before retrying a failed reconcile.
    pub retry_backoff: time::Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issuer {
    pub name: String,
    pub scope: IssuerScope,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IssuerScope {
    Namespaced,
    Cluster,
}

// === impl Config ===

impl Config {
    /// The name of the target ingress derived from the source ingress `source`.
    pub fn target_name(&self, source: &str) -> String {
        format!("{}-{}", self.identifier, source)
    }

    /// Selects every target object derived from the source ingress `source`.
    pub fn selector(&self, source: &str) -> Selector {
        Selector::propagation(&self.identifier, source)
    }
}

// === impl Issuer ===

impl Issuer {
    pub fn annotation(&self) -> &'static str {
        match self.scope {
            IssuerScope::Namespaced => ISSUER_ANNOTATION,
            IssuerScope::Cluster => CLUSTER_ISSUER_ANNOTATION,
        }
    }
}
