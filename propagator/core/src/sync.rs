use crate::{
    error::Error,
    propagation::Propagation,
    store::{StoreError, TargetApi, TargetKind, TargetObject},
};
use ingress_propagator_k8s_api::Labels;
use tracing::{debug, info};

/// Publishes the propagation's bundle to the target namespace.
///
/// The ingress is written first and read back to learn its uid. Only then
/// are the services and endpoints written, each owned by that ingress, so a
/// failed ingress write never leaves orphaned dependents behind.
///
/// Services and endpoints left over from backends the source no longer
/// references are then deleted.
///
/// A deleted propagation has no bundle and is ignored.
pub async fn apply<T>(target: &T, propagation: &Propagation) -> Result<(), Error>
where
    T: TargetApi + ?Sized,
{
    let bundle = match propagation.bundle.as_ref() {
        Some(bundle) => bundle,
        None => return Ok(()),
    };

    let ingress = TargetObject::from(bundle.ingress.clone());
    upsert(target, &ingress).await?;
    let owner = target
        .get(TargetKind::Ingress, &propagation.target_name)
        .await
        .map_err(|source| Error::TargetApplyFailed {
            kind: TargetKind::Ingress,
            name: propagation.target_name.clone(),
            source,
        })?
        .owner_ref()
        .ok_or_else(|| Error::TargetIdentityMissing(propagation.target_name.clone()))?;

    for mut obj in bundle.dependents() {
        obj.meta_mut().owner_references = Some(vec![owner.clone()]);
        upsert(target, &obj).await?;
    }

    // Backends dropped from the source still carry the propagation's labels.
    for kind in [TargetKind::Service, TargetKind::Endpoints] {
        let stale = list(target, kind, propagation)
            .await?
            .into_iter()
            .map(|obj| obj.name())
            .filter(|name| !bundle.contains(kind, name))
            .collect::<Vec<_>>();
        for name in stale {
            delete(target, kind, &name).await?;
        }
    }

    info!(
        ingress = %propagation.target_name,
        services = bundle.services.len(),
        "Applied propagation"
    );
    Ok(())
}

/// Deletes every target object derived from the propagation's source.
///
/// The services and endpoints are found by label rather than by name, and
/// regardless of whether the owner reference has already cascaded. Objects
/// that are already gone are not an error.
pub async fn remove<T>(target: &T, propagation: &Propagation) -> Result<(), Error>
where
    T: TargetApi + ?Sized,
{
    delete(target, TargetKind::Ingress, &propagation.target_name).await?;

    for kind in [TargetKind::Service, TargetKind::Endpoints] {
        for obj in list(target, kind, propagation).await? {
            delete(target, kind, &obj.name()).await?;
        }
    }

    info!(ingress = %propagation.target_name, "Removed propagation");
    Ok(())
}

/// Updates `obj`, creating it if it does not exist yet.
async fn upsert<T>(target: &T, obj: &TargetObject) -> Result<TargetObject, Error>
where
    T: TargetApi + ?Sized,
{
    let res = match target.update(obj).await {
        Err(StoreError::NotFound) => {
            debug!(kind = %obj.kind(), name = %obj.name(), "Creating");
            target.create(obj).await
        }
        res => res,
    };
    res.map_err(|source| Error::TargetApplyFailed {
        kind: obj.kind(),
        name: obj.name(),
        source,
    })
}

async fn list<T>(
    target: &T,
    kind: TargetKind,
    propagation: &Propagation,
) -> Result<Vec<TargetObject>, Error>
where
    T: TargetApi + ?Sized,
{
    let objs = target
        .list(kind, &propagation.selector)
        .await
        .map_err(|source| Error::TargetRemoveFailed {
            kind,
            name: propagation.selector.to_string(),
            source,
        })?;
    // Only objects carrying both propagation labels are ever deleted.
    Ok(objs
        .into_iter()
        .filter(|obj| {
            let labels = Labels::from(obj.meta().labels.clone());
            propagation.selector.matches(&labels)
        })
        .collect())
}

async fn delete<T>(target: &T, kind: TargetKind, name: &str) -> Result<(), Error>
where
    T: TargetApi + ?Sized,
{
    match target.delete(kind, name).await {
        Ok(()) => {
            debug!(%kind, %name, "Deleted");
            Ok(())
        }
        Err(StoreError::NotFound) => Ok(()),
        Err(source) => Err(Error::TargetRemoveFailed {
            kind,
            name: name.to_string(),
            source,
        }),
    }
}
