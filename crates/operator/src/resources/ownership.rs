use api_types::Cluster;
use error_stack::Report;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube::ResourceExt;

use super::ResourceError;

/// Mark `child` as controlled by `owner`, so it is garbage collected with the cluster.
///
/// An existing reference to the same owner is replaced.
///
/// # Errors
///
/// - [`ResourceError::Ownership`] if the cluster has no name or UID yet, if the child
///   lives in another namespace, or if another object already controls the child
pub(crate) fn set_controller_reference(
    owner: &Cluster,
    child: &mut ObjectMeta,
) -> Result<(), Report<ResourceError>> {
    let mut owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        Report::new(ResourceError::Ownership {
            message: format!(
                "cluster {:?} has no name or uid",
                owner.meta().name.as_deref().unwrap_or_default()
            ),
        })
    })?;
    owner_ref.block_owner_deletion = Some(true);

    if let (Some(owner_ns), Some(child_ns)) = (owner.namespace(), child.namespace.as_ref()) {
        if &owner_ns != child_ns {
            return Err(Report::new(ResourceError::Ownership {
                message: format!(
                    "cross-namespace owner references are disallowed: \
                     owner in {owner_ns}, object in {child_ns}"
                ),
            }));
        }
    }

    let refs = child.owner_references.get_or_insert_with(Vec::new);
    if let Some(existing) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_ref.uid)
    {
        return Err(Report::new(ResourceError::Ownership {
            message: format!(
                "object is already controlled by {} {}",
                existing.kind, existing.name
            ),
        }));
    }

    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
