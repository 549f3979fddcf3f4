use podtail_types::{ContainerSpec, PodSnapshot};

use crate::matcher::Target;
use crate::options::ControllerOptions;

/// Decide whether `container` of `pod` should be tailed.
///
/// A container is excluded if its pod is not pending or running, if the
/// kubelet has not reported any state for it, if it fails the container name
/// filter, or if the exclusion matcher matches either the pod or the
/// container. Otherwise it is included when the inclusion matcher matches the
/// pod or the container.
pub fn should_include_container(
    options: &ControllerOptions,
    pod: &PodSnapshot,
    container: &ContainerSpec,
) -> bool {
    if !pod.phase.is_active() {
        return false;
    }

    let acknowledged = pod
        .statuses_for(&container.name)
        .any(|status| status.state.is_some());
    if !acknowledged {
        return false;
    }

    if let Some(name) = &options.container_name {
        if name != &container.name {
            return false;
        }
    }

    if options.exclusion.matches(Target::Pod(pod)) {
        return false;
    }

    if !(options.inclusion.matches(Target::Pod(pod))
        || options.inclusion.matches(Target::Container(container)))
    {
        return false;
    }

    !options.exclusion.matches(Target::Container(container))
}
