use crate::with_timeout;
use async_trait::async_trait;
use ingress_propagator_core::{StoreError, TargetApi, TargetKind, TargetObject};
use ingress_propagator_k8s_api::{Endpoints, Ingress, Selector, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tokio::time;

/// The namespace of the target cluster that receives derived objects.
#[derive(Clone)]
pub struct KubeTarget {
    client: Client,
    namespace: String,
    timeout: time::Duration,
}

// === impl KubeTarget ===

impl KubeTarget {
    pub fn new(client: Client, namespace: impl ToString, timeout: time::Duration) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            timeout,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn create_as<K>(&self, obj: &K) -> Result<TargetObject, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned + Serialize,
        K::DynamicType: Default,
        TargetObject: From<K>,
    {
        let api = self.api::<K>();
        let created = with_timeout(self.timeout, api.create(&PostParams::default(), obj)).await?;
        Ok(created.into())
    }

    async fn replace_as<K>(&self, name: &str, obj: &K) -> Result<TargetObject, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned + Serialize,
        K::DynamicType: Default,
        TargetObject: From<K>,
    {
        let api = self.api::<K>();
        let params = PostParams::default();
        let replaced = with_timeout(self.timeout, api.replace(name, &params, obj)).await?;
        Ok(replaced.into())
    }

    async fn get_as<K>(&self, name: &str) -> Result<TargetObject, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
        TargetObject: From<K>,
    {
        let obj = with_timeout(self.timeout, self.api::<K>().get(name)).await?;
        Ok(obj.into())
    }

    async fn delete_as<K>(&self, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
    {
        let api = self.api::<K>();
        let params = DeleteParams::background();
        with_timeout(self.timeout, api.delete(name, &params)).await?;
        Ok(())
    }

    async fn list_as<K>(&self, selector: &Selector) -> Result<Vec<TargetObject>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + DeserializeOwned,
        K::DynamicType: Default,
        TargetObject: From<K>,
    {
        let params = ListParams::default().labels(&selector.to_string());
        let list = with_timeout(self.timeout, self.api::<K>().list(&params)).await?;
        Ok(list.items.into_iter().map(TargetObject::from).collect())
    }
}

#[async_trait]
impl TargetApi for KubeTarget {
    async fn create(&self, obj: &TargetObject) -> Result<TargetObject, StoreError> {
        match obj {
            TargetObject::Ingress(ingress) => self.create_as(ingress).await,
            TargetObject::Service(svc) => self.create_as(svc).await,
            TargetObject::Endpoints(ep) => self.create_as(ep).await,
        }
    }

    async fn update(&self, obj: &TargetObject) -> Result<TargetObject, StoreError> {
        let name = obj.name();
        match obj {
            TargetObject::Ingress(ingress) => self.replace_as(&name, ingress).await,
            TargetObject::Service(svc) => self.replace_as(&name, svc).await,
            TargetObject::Endpoints(ep) => self.replace_as(&name, ep).await,
        }
    }

    async fn get(&self, kind: TargetKind, name: &str) -> Result<TargetObject, StoreError> {
        match kind {
            TargetKind::Ingress => self.get_as::<Ingress>(name).await,
            TargetKind::Service => self.get_as::<Service>(name).await,
            TargetKind::Endpoints => self.get_as::<Endpoints>(name).await,
        }
    }

    async fn delete(&self, kind: TargetKind, name: &str) -> Result<(), StoreError> {
        match kind {
            TargetKind::Ingress => self.delete_as::<Ingress>(name).await,
            TargetKind::Service => self.delete_as::<Service>(name).await,
            TargetKind::Endpoints => self.delete_as::<Endpoints>(name).await,
        }
    }

    async fn list(
        &self,
        kind: TargetKind,
        selector: &Selector,
    ) -> Result<Vec<TargetObject>, StoreError> {
        match kind {
            TargetKind::Ingress => self.list_as::<Ingress>(selector).await,
            TargetKind::Service => self.list_as::<Service>(selector).await,
            TargetKind::Endpoints => self.list_as::<Endpoints>(selector).await,
        }
    }
}
