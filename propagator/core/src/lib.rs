#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Propagates ingresses from a source cluster into a target namespace.

pub mod backend;
mod config;
mod error;
pub mod ownership;
mod propagation;
mod reconcile;
pub mod store;
pub mod sync;
pub mod transform;


pub use self::{
    config::{Config, Issuer, IssuerScope},
    error::{Error, TransformError, Unresolved},
    propagation::{Bundle, Propagation},
    reconcile::{Outcome, Reconciler, State},
    store::{
        EventSink, EventType, PropagationEvent, SourceApi, StoreError, TargetApi, TargetKind,
        TargetObject,
    },
};
pub use ingress_propagator_k8s_api as k8s;
