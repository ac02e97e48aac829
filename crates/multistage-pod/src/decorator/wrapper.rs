//! Entrypoint wrapper and VPN client sidecar

use k8s_openapi::api::core::v1::{Container, EmptyDirVolumeSource, HostPathVolumeSource, Volume};

use multistage_common::crd::VpnConfig;
use multistage_common::CI_REGISTRY_DOMAIN;

use super::pod::{add_mount, mount, StepPod};
use super::{CLUSTER_PROFILE_VOLUME_NAME, VPN_CONTAINER_NAME};
use crate::skeleton::{LOGS_MOUNT_PATH, LOGS_VOLUME_NAME};

const WRAPPER_VOLUME_NAME: &str = "entrypoint-wrapper";
const WRAPPER_DIR: &str = "/tmp/entrypoint-wrapper";
const WRAPPER_BIN: &str = "/tmp/entrypoint-wrapper/entrypoint-wrapper";

const VPN_VOLUME_NAME: &str = "vpn";
const VPN_DIR: &str = "/tmp/vpn";
const VPN_READY_FILE: &str = "/tmp/vpn/up";
const TUN_VOLUME_NAME: &str = "tun";
const TUN_DEVICE: &str = "/dev/net/tun";
const VPN_PROFILE_DIR: &str = "/tmp/profile";

/// Run the primary command through the entrypoint wrapper.
///
/// The wrapper binary is copied into a shared volume by an init container;
/// the primary container's command becomes the wrapper and its original
/// command and arguments move behind the wrapper's mode flags.
pub(crate) fn add_entrypoint_wrapper(
    pod: &mut StepPod,
    vpn: Option<&VpnConfig>,
    skip_kubeconfig: bool,
    observer: bool,
) {
    pod.add_volume(Volume {
        name: WRAPPER_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    });
    pod.add_init_container(Container {
        name: "cp-entrypoint-wrapper".to_string(),
        image: Some(format!(
            "{}/openshift/ci:ci_entrypoint-wrapper_latest",
            CI_REGISTRY_DOMAIN
        )),
        command: Some(vec!["cp".to_string()]),
        args: Some(vec![
            "/bin/entrypoint-wrapper".to_string(),
            WRAPPER_BIN.to_string(),
        ]),
        volume_mounts: Some(vec![mount(WRAPPER_VOLUME_NAME, WRAPPER_DIR)]),
        termination_message_policy: Some("FallbackToLogsOnError".to_string()),
        ..Default::default()
    });

    let container = pod.primary();
    let mut args = Vec::new();
    if let Some(timeout) = vpn.and_then(|v| v.wait_timeout.as_ref()) {
        args.extend([
            "--wait-for-file".to_string(),
            VPN_READY_FILE.to_string(),
            "--wait-timeout".to_string(),
            timeout.clone(),
        ]);
    }
    if skip_kubeconfig {
        args.push("--mode=skip-kubeconfig".to_string());
    }
    if observer {
        args.push("--mode=observer".to_string());
    }
    args.extend(container.command.take().unwrap_or_default());
    args.extend(container.args.take().unwrap_or_default());
    container.args = Some(args);
    container.command = Some(vec![WRAPPER_BIN.to_string()]);
    add_mount(container, mount(WRAPPER_VOLUME_NAME, WRAPPER_DIR));
}

/// Add the VPN client sidecar and the volumes it shares with the step
pub(crate) fn add_vpn_client(pod: &mut StepPod, vpn: &VpnConfig) {
    pod.add_container(Container {
        name: VPN_CONTAINER_NAME.to_string(),
        image: Some(vpn.image.clone()),
        command: Some(vec![
            "bash".to_string(),
            "-c".to_string(),
            vpn.commands.clone(),
        ]),
        working_dir: Some(VPN_PROFILE_DIR.to_string()),
        volume_mounts: Some(vec![
            mount(TUN_VOLUME_NAME, TUN_DEVICE),
            mount(VPN_VOLUME_NAME, VPN_DIR),
            mount(LOGS_VOLUME_NAME, LOGS_MOUNT_PATH),
            mount(CLUSTER_PROFILE_VOLUME_NAME, VPN_PROFILE_DIR),
        ]),
        ..Default::default()
    });
    pod.add_volumes([
        Volume {
            name: VPN_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        Volume {
            name: TUN_VOLUME_NAME.to_string(),
            host_path: Some(HostPathVolumeSource {
                path: TUN_DEVICE.to_string(),
                type_: Some("CharDevice".to_string()),
            }),
            ..Default::default()
        },
    ]);
    pod.add_primary_mount(mount(VPN_VOLUME_NAME, VPN_DIR));
}
