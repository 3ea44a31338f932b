use crate::{
    config::Config,
    error::Error,
    ownership,
    store::{EventSink, PropagationEvent, SourceApi, StoreError, TargetApi},
    sync, transform,
};
use ingress_propagator_k8s_api::{has_finalizer, Ingress, ResourceExt, FINALIZER};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, info, instrument, warn};

/// Drives a single source ingress towards its desired state in the target
/// cluster.
///
/// The reconciler keeps no state between calls: everything it needs is read
/// from the source ingress, its finalizer and the target namespace.
pub struct Reconciler<S, T, E> {
    config: Arc<Config>,
    source: S,
    target: T,
    events: E,
}

/// How a reconcile concluded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The ingress no longer exists.
    Absent,

    /// The ingress belongs to another controller and was not touched.
    Unmanaged,

    /// The bundle has been published to the target namespace.
    Propagated,

    /// The bundle has been torn down and the finalizer released.
    Unpropagated,

    /// The ingress is being deleted and its bundle was already torn down.
    Released,
}

/// The lifecycle stage of a fetched source ingress.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Unmanaged,
    ManagedActive,
    ManagedDeleting,
    Released,
}

// === impl Reconciler ===

impl<S, T, E> Reconciler<S, T, E>
where
    S: SourceApi,
    T: TargetApi,
    E: EventSink,
{
    pub fn new(config: Arc<Config>, source: S, target: T, events: E) -> Self {
        Self {
            config,
            source,
            target,
            events,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// How long the caller should wait before retrying a failed reconcile.
    pub fn retry_after(&self) -> time::Duration {
        self.config.retry_backoff
    }

    #[instrument(name = "ingress", skip(self))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome, Error> {
        let ingress = match self.source.get_ingress(namespace, name).await {
            Ok(ingress) => ingress,
            Err(StoreError::NotFound) => {
                debug!("Ingress not found");
                return Ok(Outcome::Absent);
            }
            Err(source) => {
                return Err(Error::SourceFetchFailed {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
            }
        };

        let controlled = ownership::is_controlled(&self.config, &self.source, &ingress).await?;
        match State::of(&ingress, controlled) {
            State::Unmanaged => {
                debug!(
                    ingress_class = %self.config.ingress_class,
                    controller_class = %self.config.controller_class,
                    "Ingress is not controlled by this propagator"
                );
                Ok(Outcome::Unmanaged)
            }
            State::Released => {
                debug!("Ingress is being deleted and has already been released");
                Ok(Outcome::Released)
            }
            State::ManagedActive => self.propagate(ingress).await,
            State::ManagedDeleting => self.unpropagate(ingress).await,
        }
    }

    async fn propagate(&self, ingress: Ingress) -> Result<Outcome, Error> {
        // The finalizer must be in place before anything is written to the
        // target cluster.
        let ingress = self.add_finalizer(ingress).await?;

        let propagation = match transform::transform(&self.config, &self.source, &ingress).await {
            Ok(propagation) => propagation,
            Err(error) => {
                warn!(%error, "Failed to compute propagation");
                self.events
                    .publish(
                        &ingress,
                        PropagationEvent::warning(
                            PropagationEvent::PROPAGATION_FAILED,
                            format!("failed to extract propagation from ingress: {error}"),
                        ),
                    )
                    .await;
                return Err(error.into());
            }
        };

        if let Err(error) = sync::apply(&self.target, &propagation).await {
            warn!(%error, "Failed to apply propagation");
            self.events
                .publish(
                    &ingress,
                    PropagationEvent::warning(
                        PropagationEvent::PROPAGATION_FAILED,
                        format!("failed to apply propagation: {error}"),
                    ),
                )
                .await;
            return Err(error);
        }

        self.events
            .publish(
                &ingress,
                PropagationEvent::normal(
                    PropagationEvent::PROPAGATED,
                    "Ingress has been propagated",
                ),
            )
            .await;
        Ok(Outcome::Propagated)
    }

    async fn unpropagate(&self, ingress: Ingress) -> Result<Outcome, Error> {
        let propagation = transform::transform(&self.config, &self.source, &ingress).await?;

        if let Err(error) = sync::remove(&self.target, &propagation).await {
            warn!(%error, "Failed to remove propagation");
            self.events
                .publish(
                    &ingress,
                    PropagationEvent::warning(
                        PropagationEvent::UNPROPAGATION_FAILED,
                        format!("failed to remove propagation: {error}"),
                    ),
                )
                .await;
            return Err(error);
        }

        self.events
            .publish(
                &ingress,
                PropagationEvent::normal(
                    PropagationEvent::UNPROPAGATED,
                    "Ingress has been removed",
                ),
            )
            .await;

        self.remove_finalizer(ingress).await?;
        Ok(Outcome::Unpropagated)
    }

    async fn add_finalizer(&self, mut ingress: Ingress) -> Result<Ingress, Error> {
        if has_finalizer(&ingress, FINALIZER) {
            return Ok(ingress);
        }
        ingress.finalizers_mut().push(FINALIZER.to_string());
        let ingress = self.persist_finalizers(&ingress).await?;
        info!("Added finalizer");
        Ok(ingress)
    }

    async fn remove_finalizer(&self, mut ingress: Ingress) -> Result<(), Error> {
        if !has_finalizer(&ingress, FINALIZER) {
            return Ok(());
        }
        ingress.finalizers_mut().retain(|f| f != FINALIZER);
        self.persist_finalizers(&ingress).await?;
        info!("Removed finalizer");
        Ok(())
    }

    async fn persist_finalizers(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        self.source
            .replace_ingress(ingress)
            .await
            .map_err(|source| Error::FinalizerPersistFailed {
                namespace: ingress.namespace().unwrap_or_default(),
                name: ingress.name_any(),
                source,
            })
    }
}

// === impl State ===

impl State {
    pub fn of(ingress: &Ingress, controlled: bool) -> Self {
        if !controlled {
            return Self::Unmanaged;
        }
        if ingress.metadata.deletion_timestamp.is_none() {
            return Self::ManagedActive;
        }
        if has_finalizer(ingress, FINALIZER) {
            Self::ManagedDeleting
        } else {
            Self::Released
        }
    }
}
