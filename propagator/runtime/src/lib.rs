#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_propagator_core as core;
pub use ingress_propagator_k8s_api as k8s;
pub use ingress_propagator_k8s_store as store;

mod args;
mod controller;
mod metrics;

pub use self::{args::Args, metrics::ReconcileMetrics};
