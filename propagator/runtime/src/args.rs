use crate::{
    controller::{self, Context},
    core::{Config, Issuer, IssuerScope, Reconciler},
    k8s::{Ingress, IngressClass},
    metrics::ReconcileMetrics,
    store::{KubeEvents, KubeSource, KubeTarget},
};
use anyhow::{bail, ensure, Context as _, Result};
use clap::Parser;
use futures::prelude::*;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    runtime::{controller as kube_controller, reflector::ObjectRef, watcher, Controller},
    Api,
};
use prometheus_client::registry::Registry;
use std::{path::PathBuf, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-propagator",
    about = "Propagates ingresses into a namespace of another cluster"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_propagator=info,warn",
        env = "INGRESS_PROPAGATOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Distinguishes this propagator from others publishing into the same
    /// target namespace.
    #[clap(long, env = "INGRESS_PROPAGATOR_IDENTIFIER")]
    identifier: String,

    /// Ingresses annotated with this legacy ingress class are propagated.
    #[clap(
        long,
        default_value = "propagated",
        env = "INGRESS_PROPAGATOR_INGRESS_CLASS"
    )]
    ingress_class: String,

    /// Ingresses whose IngressClass names this controller are propagated.
    #[clap(
        long,
        default_value = "ingress-propagator.buttah.cloud/controller",
        env = "INGRESS_PROPAGATOR_CONTROLLER_CLASS"
    )]
    controller_class: String,

    /// The ingress class of every ingress written to the target cluster.
    #[clap(long, env = "INGRESS_PROPAGATOR_TARGET_INGRESS_CLASS")]
    target_ingress_class: String,

    #[clap(
        long,
        default_value = "default",
        env = "INGRESS_PROPAGATOR_TARGET_NAMESPACE"
    )]
    target_namespace: String,

    /// The kubeconfig used to reach the target cluster. The default client
    /// configuration is used when unset.
    #[clap(long, env = "INGRESS_PROPAGATOR_TARGET_KUBECONFIG")]
    target_kubeconfig: Option<PathBuf>,

    #[clap(long, env = "INGRESS_PROPAGATOR_TARGET_CONTEXT")]
    target_context: Option<String>,

    /// A cert-manager issuer to request certificates from for every
    /// propagated host.
    #[clap(long, env = "INGRESS_PROPAGATOR_TARGET_ISSUER")]
    target_issuer: Option<String>,

    /// Treats `--target-issuer` as a namespaced Issuer rather than a
    /// ClusterIssuer.
    #[clap(long, env = "INGRESS_PROPAGATOR_TARGET_ISSUER_NAMESPACED")]
    target_issuer_namespaced: bool,

    /// Copies the TLS configuration of source ingresses.
    #[clap(long, env = "INGRESS_PROPAGATOR_RESPECT_TLS")]
    respect_tls: bool,

    #[clap(
        long,
        default_value = "5000",
        env = "INGRESS_PROPAGATOR_REQUEST_TIMEOUT_MS"
    )]
    request_timeout_ms: u64,

    #[clap(
        long,
        default_value = "60",
        env = "INGRESS_PROPAGATOR_RETRY_BACKOFF_SECS"
    )]
    retry_backoff_secs: u64,

    /// How often propagated ingresses are propagated again, picking up
    /// changes to their backends' load balancer addresses.
    #[clap(
        long,
        default_value = "600",
        env = "INGRESS_PROPAGATOR_RESYNC_INTERVAL_SECS"
    )]
    resync_interval_secs: u64,

    #[clap(
        long,
        default_value = "8",
        env = "INGRESS_PROPAGATOR_RECONCILE_CONCURRENCY"
    )]
    reconcile_concurrency: u16,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let config = Arc::new(self.propagator_config()?);

        let Self {
            admin,
            client,
            log_level,
            log_format,
            target_kubeconfig,
            target_context,
            request_timeout_ms,
            resync_interval_secs,
            reconcile_concurrency,
            ..
        } = self;
        let request_timeout = Duration::from_millis(request_timeout_ms);

        let mut prom = <Registry>::default();
        let metrics =
            ReconcileMetrics::register(prom.sub_registry_with_prefix("ingress_propagator"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let target_client = target_client(target_kubeconfig, target_context).await?;
        info!(
            identifier = %config.identifier,
            target_namespace = %config.target_namespace,
            "Propagating ingresses"
        );

        let source_client = runtime.client();
        let reconciler = Reconciler::new(
            config.clone(),
            KubeSource::new(source_client.clone(), request_timeout),
            KubeTarget::new(target_client, &config.target_namespace, request_timeout),
            KubeEvents::new(source_client.clone(), &config.controller_class, request_timeout),
        );
        let ctx = Arc::new(Context::new(
            reconciler,
            metrics,
            Duration::from_secs(resync_interval_secs),
        ));

        let ingresses = Api::<Ingress>::all(source_client.clone());
        let classes = Api::<IngressClass>::all(source_client);
        let ctrl = Controller::new(ingresses, watcher::Config::default());
        // A change to any ingress class may change which ingresses are
        // controlled, so every known ingress is reconciled again.
        let known = ctrl.store();
        let ctrl = ctrl
            .watches(classes, watcher::Config::default(), move |_class| {
                known
                    .state()
                    .into_iter()
                    .map(|ingress| ObjectRef::from_obj(&*ingress))
                    .collect::<Vec<_>>()
            })
            .with_config(kube_controller::Config::default().concurrency(reconcile_concurrency))
            .run(controller::reconcile, controller::error_policy, ctx)
            .for_each(|res| async move {
                if let Err(error) = res {
                    tracing::debug!(%error, "Controller error");
                }
            });

        // In-flight reconciles are dropped on shutdown. Finalizers are left in
        // place so that the next instance resumes their work.
        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = ctrl => {}
                    _handle = drain.signaled() => {
                        info!("Shutting down");
                    }
                }
            }
            .instrument(info_span!("ingresses")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the controller to release its shutdown handle before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }

    fn propagator_config(&self) -> Result<Config> {
        ensure!(!self.identifier.is_empty(), "--identifier must not be empty");
        ensure!(
            !self.target_ingress_class.is_empty(),
            "--target-ingress-class must not be empty"
        );
        ensure!(
            !self.target_namespace.is_empty(),
            "--target-namespace must not be empty"
        );
        ensure!(
            self.reconcile_concurrency > 0,
            "--reconcile-concurrency must be positive"
        );

        let issuer = match self.target_issuer.as_deref() {
            None | Some("") => None,
            Some(name) => Some(Issuer {
                name: name.to_string(),
                scope: if self.target_issuer_namespaced {
                    IssuerScope::Namespaced
                } else {
                    IssuerScope::Cluster
                },
            }),
        };

        Ok(Config {
            identifier: self.identifier.clone(),
            ingress_class: self.ingress_class.clone(),
            controller_class: self.controller_class.clone(),
            target_ingress_class: self.target_ingress_class.clone(),
            target_namespace: self.target_namespace.clone(),
            issuer,
            respect_tls: self.respect_tls,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        })
    }
}

/// Builds a client for the target cluster from `kubeconfig`, or from the
/// default client configuration if no kubeconfig is given.
async fn target_client(
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context,
        ..Default::default()
    };
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
        }
        None if options.context.is_some() => kube::Config::from_kubeconfig(&options).await?,
        None => kube::Config::infer().await?,
    };
    kube::Client::try_from(config).context("failed to build target cluster client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ingress-propagator").chain(args.iter().copied()))
            .expect("arguments must parse")
    }

    #[test]
    fn defaults() {
        let config = parse(&["--identifier=edge", "--target-ingress-class=nginx"])
            .propagator_config()
            .expect("config must be valid");
        assert_eq!(config.identifier, "edge");
        assert_eq!(config.ingress_class, "propagated");
        assert_eq!(
            config.controller_class,
            "ingress-propagator.buttah.cloud/controller"
        );
        assert_eq!(config.target_ingress_class, "nginx");
        assert_eq!(config.target_namespace, "default");
        assert_eq!(config.issuer, None);
        assert!(!config.respect_tls);
        assert_eq!(config.retry_backoff, Duration::from_secs(60));
    }

    #[test]
    fn issuer_scope() {
        let cluster = parse(&[
            "--identifier=edge",
            "--target-ingress-class=nginx",
            "--target-issuer=letsencrypt",
        ])
        .propagator_config()
        .expect("config must be valid");
        assert_eq!(
            cluster.issuer,
            Some(Issuer {
                name: "letsencrypt".to_string(),
                scope: IssuerScope::Cluster,
            })
        );

        let namespaced = parse(&[
            "--identifier=edge",
            "--target-ingress-class=nginx",
            "--target-issuer=letsencrypt",
            "--target-issuer-namespaced",
        ])
        .propagator_config()
        .expect("config must be valid");
        assert_eq!(
            namespaced.issuer.map(|i| i.scope),
            Some(IssuerScope::Namespaced)
        );
    }

    #[test]
    fn rejects_empty_identifier() {
        let args = parse(&["--identifier=", "--target-ingress-class=nginx"]);
        assert!(args.propagator_config().is_err());
    }
}
