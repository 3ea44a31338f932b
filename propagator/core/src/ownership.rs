use crate::{config::Config, error::Error, store::SourceApi};
use ingress_propagator_k8s_api::{Ingress, IngressClass, ResourceExt, LEGACY_CLASS_ANNOTATION};

/// Determines whether `ingress` is controlled by this propagator instance.
///
/// The legacy class annotation is honored first so that fleets can migrate
/// to `spec.ingressClassName` without losing their propagations. A class
/// reference is controlled when the referenced `IngressClass` names this
/// instance's controller.
pub async fn is_controlled<S>(
    config: &Config,
    source: &S,
    ingress: &Ingress,
) -> Result<bool, Error>
where
    S: SourceApi + ?Sized,
{
    if let Some(class) = ingress.annotations().get(LEGACY_CLASS_ANNOTATION) {
        if *class == config.ingress_class {
            return Ok(true);
        }
    }

    let class = match ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_deref())
    {
        Some(class) => class,
        None => return Ok(false),
    };

    let classes = match source.list_ingress_classes().await {
        Ok(classes) => classes,
        Err(error) if error.is_not_found() => return Ok(false),
        Err(error) => return Err(Error::OwnershipLookupFailed(error)),
    };

    let controlled = controlled_classes(config, &classes).any(|name| name == class);
    Ok(controlled)
}

/// Names of the ingress classes whose controller is this instance's
/// controller class.
pub fn controlled_classes<'c>(
    config: &'c Config,
    classes: &'c [IngressClass],
) -> impl Iterator<Item = &'c str> + 'c {
    classes
        .iter()
        .filter(move |class| {
            class
                .spec
                .as_ref()
                .and_then(|spec| spec.controller.as_deref())
                == Some(config.controller_class.as_str())
        })
        .filter_map(|class| class.metadata.name.as_deref())
}
