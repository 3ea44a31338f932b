use crate::with_timeout;
use async_trait::async_trait;
use ingress_propagator_core::{SourceApi, StoreError};
use ingress_propagator_k8s_api::{Ingress, IngressClass, ResourceExt, Service};
use kube::{
    api::{ListParams, PostParams},
    Api, Client,
};
use tokio::time;

/// The cluster that declares the ingresses to propagate.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    timeout: time::Duration,
}

// === impl KubeSource ===

impl KubeSource {
    pub fn new(client: Client, timeout: time::Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SourceApi for KubeSource {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, StoreError> {
        let api = Api::<Ingress>::namespaced(self.client.clone(), namespace);
        with_timeout(self.timeout, api.get(name)).await
    }

    async fn replace_ingress(&self, ingress: &Ingress) -> Result<Ingress, StoreError> {
        let namespace = ingress.namespace().unwrap_or_default();
        let api = Api::<Ingress>::namespaced(self.client.clone(), &namespace);
        let params = PostParams::default();
        with_timeout(
            self.timeout,
            api.replace(&ingress.name_any(), &params, ingress),
        )
        .await
    }

    async fn list_ingress_classes(&self) -> Result<Vec<IngressClass>, StoreError> {
        let api = Api::<IngressClass>::all(self.client.clone());
        let list = with_timeout(self.timeout, api.list(&ListParams::default())).await?;
        Ok(list.items)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        let api = Api::<Service>::namespaced(self.client.clone(), namespace);
        with_timeout(self.timeout, api.get(name)).await
    }
}
