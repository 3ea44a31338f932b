#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Implements the propagator's cluster interfaces against the Kubernetes API.

mod events;
mod source;
mod target;

pub use self::{events::KubeEvents, source::KubeSource, target::KubeTarget};
pub use kube::Client;

use ingress_propagator_core::StoreError;
use std::future::Future;
use tokio::time;

/// Bounds an API call by `timeout`.
///
/// A request that does not complete in time is abandoned and reported as a
/// [`StoreError::Timeout`].
async fn with_timeout<T, F>(timeout: time::Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    match time::timeout(timeout, call).await {
        Ok(res) => res.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}
