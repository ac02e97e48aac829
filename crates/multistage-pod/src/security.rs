//! Container execution identity
//!
//! The namespace's security constraints apply to every container in a pod,
//! so once one container needs root, every other container has to be pinned
//! to the namespace UID explicitly.

use k8s_openapi::api::core::v1::{Capabilities, Container, Pod, SELinuxOptions, SecurityContext};

/// Run `privileged` as UID 0 with `capabilities` and `se_linux`, and every
/// other container and init container as non-root `uid`.
///
/// Existing security contexts are replaced.
pub fn partition_security_contexts(
    pod: &mut Pod,
    privileged: &str,
    uid: i64,
    capabilities: &Capabilities,
    se_linux: &SELinuxOptions,
) {
    let Some(spec) = pod.spec.as_mut() else {
        return;
    };

    let assign = |containers: &mut [Container]| {
        for container in containers {
            container.security_context = Some(if container.name == privileged {
                SecurityContext {
                    run_as_user: Some(0),
                    capabilities: Some(capabilities.clone()),
                    se_linux_options: Some(se_linux.clone()),
                    ..Default::default()
                }
            } else {
                SecurityContext {
                    run_as_non_root: Some(true),
                    run_as_user: Some(uid),
                    ..Default::default()
                }
            });
        }
    };

    if let Some(init) = spec.init_containers.as_mut() {
        assign(init);
    }
    assign(&mut spec.containers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn pod() -> Pod {
        Pod {
            spec: Some(PodSpec {
                init_containers: Some(vec![container("cp-entrypoint-wrapper"), container("inject-cli")]),
                containers: vec![container("test"), container("vpn-client")],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn caps() -> Capabilities {
        Capabilities {
            add: Some(vec!["NET_ADMIN".to_string()]),
            drop: Some(vec!["ALL".to_string()]),
        }
    }

    #[test]
    fn every_container_gets_an_identity() {
        let mut pod = pod();
        partition_security_contexts(&mut pod, "vpn-client", 1000, &caps(), &SELinuxOptions::default());

        let spec = pod.spec.unwrap();
        let all: Vec<&Container> = spec
            .init_containers
            .iter()
            .flatten()
            .chain(spec.containers.iter())
            .collect();
        assert_eq!(all.len(), 4);

        let roots: Vec<&str> = all
            .iter()
            .filter(|c| c.security_context.as_ref().unwrap().run_as_user == Some(0))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(roots, vec!["vpn-client"]);

        for c in all.iter().filter(|c| c.name != "vpn-client") {
            let sc = c.security_context.as_ref().unwrap();
            assert_eq!(sc.run_as_non_root, Some(true), "{}", c.name);
            assert_eq!(sc.run_as_user, Some(1000), "{}", c.name);
            assert!(sc.capabilities.is_none());
        }
    }

    #[test]
    fn privileged_init_container_is_supported() {
        let mut pod = pod();
        partition_security_contexts(&mut pod, "inject-cli", 1000, &caps(), &SELinuxOptions::default());
        let spec = pod.spec.unwrap();
        let init = spec.init_containers.unwrap();
        let sc = init[1].security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_user, Some(0));
        assert_eq!(sc.capabilities, Some(caps()));
        assert_eq!(
            spec.containers[1].security_context.as_ref().unwrap().run_as_user,
            Some(1000)
        );
    }

    #[test]
    fn pod_without_spec_is_untouched() {
        let mut pod = Pod::default();
        partition_security_contexts(&mut pod, "vpn-client", 1000, &caps(), &SELinuxOptions::default());
        assert!(pod.spec.is_none());
    }
}
