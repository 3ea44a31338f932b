use crate::{
    backend::{self, ResolvedBackend},
    config::Config,
    error::{TransformError, Unresolved},
    propagation::{Bundle, Propagation},
    store::SourceApi,
};
use ingress_propagator_k8s_api::{
    EndpointPort, EndpointSubset, Endpoints, Ingress, IngressBackend, IngressServiceBackend,
    IngressSpec, IngressTLS, ObjectMeta, ResourceExt, Selector, Service, ServiceBackendPort,
    ServiceSpec, LEGACY_CLASS_ANNOTATION,
};
use tracing::debug;

/// Computes the propagation of the source ingress `ingress`.
///
/// Every backend is resolved before anything is returned: an ingress with a
/// single unresolvable backend or empty host yields no bundle at all.
pub async fn transform<S>(
    config: &Config,
    source: &S,
    ingress: &Ingress,
) -> Result<Propagation, TransformError>
where
    S: SourceApi + ?Sized,
{
    let source_name = ingress.name_any();
    let target_name = config.target_name(&source_name);
    let selector = config.selector(&source_name);

    if ingress.metadata.deletion_timestamp.is_some() {
        return Ok(Propagation {
            source_name,
            target_name,
            selector,
            source: ingress.clone(),
            bundle: None,
        });
    }

    let namespace = ingress.namespace().unwrap_or_default();
    let spec = ingress.spec.clone().unwrap_or_default();

    let mut rules = spec.rules.unwrap_or_default();
    let mut hosts = Vec::<String>::new();
    let mut backends = Vec::<ResolvedBackend>::new();
    for rule in &mut rules {
        let host = match rule.host.as_deref() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => {
                return Err(TransformError::EmptyHost {
                    namespace,
                    name: source_name,
                })
            }
        };

        for path in rule.http.iter_mut().flat_map(|http| http.paths.iter_mut()) {
            let IngressServiceBackend { name, port } =
                path.backend.service.clone().ok_or_else(|| {
                    TransformError::BackendUnresolved {
                        namespace: namespace.clone(),
                        service: String::new(),
                        reason: Unresolved::NotAService,
                    }
                })?;

            let resolved = backend::resolve(source, &namespace, &name, port.as_ref()).await?;
            debug!(service = %name, port = resolved.port, "Resolved backend");

            path.backend = IngressBackend {
                service: Some(IngressServiceBackend {
                    name: name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(resolved.port),
                        name: None,
                    }),
                }),
                resource: None,
            };

            if !backends.iter().any(|b| b.service.name_any() == name) {
                backends.push(resolved);
            }
        }

        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }

    let mut labels = ingress.labels().clone();
    labels.extend(selector.to_map());

    let mut annotations = ingress.annotations().clone();
    // The API server rejects an ingress that sets both the class annotation
    // and `spec.ingressClassName`.
    annotations.remove(LEGACY_CLASS_ANNOTATION);

    let mut tls = Vec::new();
    if config.respect_tls {
        tls.extend(spec.tls.into_iter().flatten());
    }
    if let Some(issuer) = config.issuer.as_ref() {
        annotations.insert(issuer.annotation().to_string(), issuer.name.clone());
        tls.push(IngressTLS {
            hosts: Some(hosts),
            secret_name: Some(target_name.clone()),
        });
    }

    let target_ingress = Ingress {
        metadata: ObjectMeta {
            name: Some(target_name.clone()),
            namespace: Some(config.target_namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some(config.target_ingress_class.clone()),
            rules: Some(rules),
            tls: if tls.is_empty() { None } else { Some(tls) },
            default_backend: None,
        }),
        status: None,
    };

    let (services, endpoints) = backends
        .iter()
        .map(|backend| {
            (
                derive_service(config, &selector, backend),
                derive_endpoints(config, &selector, backend),
            )
        })
        .unzip();

    Ok(Propagation {
        source_name,
        target_name,
        selector,
        source: ingress.clone(),
        bundle: Some(Bundle {
            ingress: target_ingress,
            services,
            endpoints,
        }),
    })
}

fn derived_meta(config: &Config, selector: &Selector, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(config.target_namespace.clone()),
        labels: Some(selector.to_map()),
        ..Default::default()
    }
}

/// A selector-less `ClusterIP` service exposing the source service's ports.
fn derive_service(config: &Config, selector: &Selector, backend: &ResolvedBackend) -> Service {
    let mut ports = backend
        .service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.clone())
        .unwrap_or_default();
    // Node ports are allocated per cluster.
    for port in &mut ports {
        port.node_port = None;
    }

    Service {
        metadata: derived_meta(config, selector, backend.service.name_any()),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(ports),
            ..Default::default()
        }),
        status: None,
    }
}

/// Endpoints pointing every service port at the load balancer addresses.
fn derive_endpoints(
    config: &Config,
    selector: &Selector,
    backend: &ResolvedBackend,
) -> Endpoints {
    let addresses = backend
        .addresses
        .iter()
        .map(|addr| addr.to_endpoint_address())
        .collect::<Vec<_>>();

    let subsets = backend
        .service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default()
        .iter()
        .map(|port| EndpointSubset {
            addresses: Some(addresses.clone()),
            ports: Some(vec![EndpointPort {
                name: port.name.clone(),
                port: port.port,
                protocol: port.protocol.clone(),
                app_protocol: None,
            }]),
            not_ready_addresses: None,
        })
        .collect::<Vec<_>>();

    Endpoints {
        metadata: derived_meta(config, selector, backend.service.name_any()),
        subsets: Some(subsets),
    }
}
