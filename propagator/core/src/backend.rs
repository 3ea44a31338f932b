use crate::{
    error::{TransformError, Unresolved},
    store::SourceApi,
};
use ingress_propagator_k8s_api::{
    EndpointAddress, LoadBalancerIngress, Service, ServiceBackendPort, ServicePort,
};

/// A backend reference resolved against the service it names.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBackend {
    /// The service as read from the source cluster.
    pub service: Service,

    pub port: i32,

    /// Never empty.
    pub addresses: Vec<Address>,
}

/// An externally reachable address of a load-balanced service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Ip(String),
    Hostname(String),
}

/// Resolves the backend `name`:`port` in `namespace` to the port and
/// load balancer addresses traffic should be sent to.
pub async fn resolve<S>(
    source: &S,
    namespace: &str,
    name: &str,
    port: Option<&ServiceBackendPort>,
) -> Result<ResolvedBackend, TransformError>
where
    S: SourceApi + ?Sized,
{
    let unresolved = |reason| TransformError::BackendUnresolved {
        namespace: namespace.to_string(),
        service: name.to_string(),
        reason,
    };

    let service = source.get_service(namespace, name).await.map_err(|source| {
        TransformError::BackendFetch {
            namespace: namespace.to_string(),
            service: name.to_string(),
            source,
        }
    })?;

    let addresses = load_balancer_addresses(&service);
    if addresses.is_empty() {
        return Err(unresolved(Unresolved::NoLoadBalancer));
    }

    let port = match port {
        Some(ServiceBackendPort {
            name: Some(port_name),
            ..
        }) if !port_name.is_empty() => {
            let ports = service
                .spec
                .as_ref()
                .and_then(|spec| spec.ports.as_deref())
                .unwrap_or_default();
            named_port(ports, port_name)
                .ok_or_else(|| unresolved(Unresolved::NoNamedPort(port_name.clone())))?
        }
        // Numeric ports are trusted as given.
        Some(ServiceBackendPort {
            number: Some(number),
            ..
        }) => *number,
        _ => return Err(unresolved(Unresolved::NoPort)),
    };

    Ok(ResolvedBackend {
        service,
        port,
        addresses,
    })
}

/// Finds the port number of the service port named `name`. Names are
/// compared case-sensitively.
pub fn named_port(ports: &[ServicePort], name: &str) -> Option<i32> {
    ports
        .iter()
        .find(|p| p.name.as_deref() == Some(name))
        .map(|p| p.port)
}

fn load_balancer_addresses(service: &Service) -> Vec<Address> {
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_deref())
        .unwrap_or_default()
        .iter()
        .filter_map(Address::from_load_balancer)
        .collect()
}

// === impl Address ===

impl Address {
    fn from_load_balancer(ingress: &LoadBalancerIngress) -> Option<Self> {
        match (ingress.ip.as_deref(), ingress.hostname.as_deref()) {
            (Some(ip), _) if !ip.is_empty() => Some(Self::Ip(ip.to_string())),
            (_, Some(hostname)) if !hostname.is_empty() => {
                Some(Self::Hostname(hostname.to_string()))
            }
            _ => None,
        }
    }

    pub fn to_endpoint_address(&self) -> EndpointAddress {
        match self {
            Self::Ip(ip) => EndpointAddress {
                ip: ip.clone(),
                ..Default::default()
            },
            Self::Hostname(hostname) => EndpointAddress {
                hostname: Some(hostname.clone()),
                ..Default::default()
            },
        }
    }
}
