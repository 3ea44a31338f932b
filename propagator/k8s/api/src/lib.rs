#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;

pub use self::labels::{Labels, Selector};
pub use k8s_openapi::{
    api::{
        core::v1::{
            EndpointAddress, EndpointPort, EndpointSubset, Endpoints, LoadBalancerIngress,
            LoadBalancerStatus, Service, ServicePort, ServiceSpec, ServiceStatus,
        },
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressClass,
            IngressClassSpec, IngressRule, IngressServiceBackend, IngressSpec, IngressTLS,
            ServiceBackendPort,
        },
    },
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time},
};
pub use kube::{Resource, ResourceExt};

/// Held by every source ingress while derived objects may exist in the
/// target cluster.
pub const FINALIZER: &str = "svc-ingress-propagator.buttah.cloud/propagated-ingress";

/// The pre-`IngressClass` way of selecting an ingress controller.
pub const LEGACY_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

pub const ISSUER_ANNOTATION: &str = "cert-manager.io/issuer";
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

pub const INGRESS_API_VERSION: &str = "networking.k8s.io/v1";
pub const INGRESS_KIND: &str = "Ingress";

/// Returns true if the object's finalizer list contains `finalizer`.
pub fn has_finalizer<K: ResourceExt>(obj: &K, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}
