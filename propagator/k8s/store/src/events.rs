use async_trait::async_trait;
use ingress_propagator_core::{EventSink, EventType, PropagationEvent};
use ingress_propagator_k8s_api::{Ingress, Resource, ResourceExt};
use kube::{
    runtime::events::{self, Event, Recorder, Reporter},
    Client,
};
use tokio::time;

/// Records events against source ingresses.
#[derive(Clone)]
pub struct KubeEvents {
    recorder: Recorder,
    timeout: time::Duration,
}

// === impl KubeEvents ===

impl KubeEvents {
    pub fn new(client: Client, controller: impl ToString, timeout: time::Duration) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("HOSTNAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
            timeout,
        }
    }
}

#[async_trait]
impl EventSink for KubeEvents {
    async fn publish(&self, ingress: &Ingress, event: PropagationEvent) {
        let type_ = match event.type_ {
            EventType::Normal => events::EventType::Normal,
            EventType::Warning => events::EventType::Warning,
        };
        let ev = Event {
            type_,
            reason: event.reason.to_string(),
            note: Some(event.note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        let reference = ingress.object_ref(&());
        match time::timeout(self.timeout, self.recorder.publish(&ev, &reference)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(ingress = %ingress.name_any(), reason = %ev.reason, %error, "Failed to publish event")
            }
            Err(_) => {
                tracing::warn!(ingress = %ingress.name_any(), reason = %ev.reason, "Timed out publishing event")
            }
        }
    }
}
