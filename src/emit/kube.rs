//! Kubernetes Pod emitter for `podman kube play`
//!
//! Every service becomes a container of a single Pod. A Pod shares one
//! network namespace and one restart policy, so per-service networking and
//! diverging restart policies are collapsed here with a warning.

use super::{dns_label, Emission};
use crate::compose::{
    Document, MountType, NetworkMode, Protocol, RestartPolicy, Service, DEFAULT_NETWORK,
};
use crate::diagnostics::Diagnostics;
use crate::options::TranslateOptions;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pod {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: PodSpec,
}

#[derive(Serialize)]
struct Metadata {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    restart_policy: Option<PodRestartPolicy>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    host_network: bool,
    containers: Vec<Container>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<PodVolume>,
}

/// Pod-level restart policy, ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
enum PodRestartPolicy {
    Always,
    OnFailure,
    Never,
}

impl From<RestartPolicy> for PodRestartPolicy {
    fn from(policy: RestartPolicy) -> Self {
        match policy {
            RestartPolicy::Always | RestartPolicy::UnlessStopped => PodRestartPolicy::Always,
            RestartPolicy::OnFailure(_) => PodRestartPolicy::OnFailure,
            RestartPolicy::No => PodRestartPolicy::Never,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    name: String,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volume_mounts: Vec<Mount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_context: Option<SecurityContext>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPort {
    container_port: u16,
    host_port: u16,
    #[serde(rename = "hostIP", skip_serializing_if = "Option::is_none")]
    host_ip: Option<String>,
    protocol: &'static str,
}

#[derive(Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Mount {
    name: String,
    mount_path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    read_only: bool,
}

#[derive(Serialize)]
struct SecurityContext {
    privileged: bool,
}

#[derive(Serialize)]
struct PodVolume {
    name: String,
    #[serde(flatten)]
    source: VolumeSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum VolumeSource {
    HostPath(HostPath),
    PersistentVolumeClaim(ClaimRef),
    EmptyDir(EmptyDir),
}

#[derive(Serialize)]
struct HostPath {
    path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRef {
    claim_name: String,
}

#[derive(Serialize)]
struct EmptyDir {}

/// Pod volumes keyed by mount source, so services mounting the same path
/// or named volume share one entry
#[derive(Default)]
struct VolumeTable {
    volumes: Vec<PodVolume>,
    by_source: BTreeMap<(MountType, String), String>,
}

impl VolumeTable {
    fn name_for(&self, mount_type: MountType, source: &str) -> Option<String> {
        self.by_source.get(&(mount_type, source.to_string())).cloned()
    }

    fn insert(&mut self, mount_type: MountType, source: &str, volume: VolumeSource) -> String {
        let prefix = match mount_type {
            MountType::Bind => "host",
            MountType::Volume => "vol",
        };
        let name = unique_label(&format!("{}-{}", prefix, source), |candidate| {
            self.volumes.iter().any(|v| v.name == candidate)
        });
        self.by_source
            .insert((mount_type, source.to_string()), name.clone());
        self.volumes.push(PodVolume {
            name: name.clone(),
            source: volume,
        });
        name
    }
}

/// DNS-1123 label for `name`, suffixed with `-2`, `-3`, ... until `taken` rejects it
fn unique_label(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = dns_label(name);
    let mut label = base.clone();
    let mut n = 2;
    while taken(&label) {
        let suffix = format!("-{}", n);
        let stem = base
            .get(..63 - suffix.len())
            .unwrap_or(&base)
            .trim_end_matches('-');
        label = format!("{}{}", stem, suffix);
        n += 1;
    }
    label
}

/// Render the document as a single Pod manifest
pub fn emit(doc: &Document, options: &TranslateOptions) -> Emission {
    let mut diagnostics = Diagnostics::new();
    let mut table = VolumeTable::default();
    let mut annotations = BTreeMap::new();

    let order = doc
        .start_order()
        .unwrap_or_else(|_| doc.services.iter().map(|s| s.name.clone()).collect());
    let services: Vec<&Service> = order.iter().filter_map(|name| doc.service(name)).collect();

    let mut containers = Vec::new();
    for service in &services {
        let container = container(doc, service, &containers, &mut table, &mut diagnostics);
        containers.push(container);
        for (key, value) in &service.labels {
            match annotations.get(key) {
                Some(existing) if existing != value => diagnostics.warn(format!(
                    "service '{}': label '{}' conflicts with another service's value and was dropped",
                    service.name, key
                )),
                Some(_) => {}
                None => {
                    annotations.insert(key.clone(), value.clone());
                }
            }
        }
    }

    networking(&services, &mut diagnostics);
    let host_network = host_network(&services, &mut diagnostics);
    let restart_policy = restart_policy(&services, &mut diagnostics);

    let project = options.project_for(doc);
    let pod = Pod {
        api_version: "v1",
        kind: "Pod",
        metadata: Metadata {
            name: dns_label(&project),
            annotations,
        },
        spec: PodSpec {
            restart_policy,
            host_network,
            containers,
            volumes: table.volumes,
        },
    };

    let output = serde_yaml::to_string(&pod).unwrap_or_else(|e| {
        diagnostics.error(format!("pod manifest could not be serialized: {}", e));
        String::new()
    });

    Emission::single(&format!("{}.yaml", dns_label(&project)), output, diagnostics)
}

fn container(
    doc: &Document,
    service: &Service,
    taken: &[Container],
    table: &mut VolumeTable,
    diagnostics: &mut Diagnostics,
) -> Container {
    let name = unique_label(&service.name, |candidate| {
        taken.iter().any(|c| c.name == candidate)
    });
    if name != service.name {
        diagnostics.warn(format!(
            "service '{}': container renamed to '{}' to satisfy Kubernetes naming",
            service.name, name
        ));
    }

    if !service.depends_on.is_empty() {
        diagnostics.warn(format!(
            "service '{}': depends_on has no Pod equivalent; containers are listed in dependency order instead",
            service.name
        ));
    }

    let ports = service
        .ports
        .iter()
        .map(|p| ContainerPort {
            container_port: p.container_port,
            host_port: p.host_port,
            host_ip: p.host_ip.clone(),
            protocol: match p.protocol {
                Protocol::Tcp => "TCP",
                Protocol::Udp => "UDP",
            },
        })
        .collect();

    let env = service
        .environment
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();

    let mut volume_mounts = Vec::new();
    let mut relabeled = false;
    for mount in &service.volume_mounts {
        let volume = match table.name_for(mount.mount_type, &mount.source) {
            Some(volume) => volume,
            None => {
                let source =
                    volume_source(doc, service, mount.mount_type, &mount.source, diagnostics);
                table.insert(mount.mount_type, &mount.source, source)
            }
        };

        for option in &mount.options {
            match option.as_str() {
                "ro" | "rw" => {}
                "z" | "Z" => relabeled = true,
                other => diagnostics.warn(format!(
                    "service '{}': mount option '{}' on '{}' has no Kubernetes equivalent and was dropped",
                    service.name, other, mount.target
                )),
            }
        }

        volume_mounts.push(Mount {
            name: volume,
            mount_path: mount.target.clone(),
            read_only: mount.is_read_only(),
        });
    }
    if relabeled {
        diagnostics.warn(format!(
            "service '{}': SELinux relabel options (:z/:Z) have no Kubernetes equivalent and were dropped; relabel the host paths manually",
            service.name
        ));
    }

    Container {
        name,
        image: service.image.clone(),
        command: service.entrypoint.clone(),
        args: service.command.clone(),
        ports,
        env,
        volume_mounts,
        security_context: service
            .privileged
            .then_some(SecurityContext { privileged: true }),
    }
}

fn volume_source(
    doc: &Document,
    service: &Service,
    mount_type: MountType,
    source: &str,
    diagnostics: &mut Diagnostics,
) -> VolumeSource {
    match mount_type {
        MountType::Bind => {
            if !source.starts_with('/') {
                diagnostics.warn(format!(
                    "service '{}': bind source '{}' is relative; hostPath requires an absolute path",
                    service.name, source
                ));
            }
            VolumeSource::HostPath(HostPath {
                path: source.to_string(),
            })
        }
        MountType::Volume => match doc.volumes.get(source) {
            Some(volume) => VolumeSource::PersistentVolumeClaim(ClaimRef {
                claim_name: volume.name.clone(),
            }),
            None => {
                diagnostics.error(format!(
                    "service '{}': volume '{}' is not declared under top-level volumes; emitted as emptyDir, data will not persist",
                    service.name, source
                ));
                VolumeSource::EmptyDir(EmptyDir {})
            }
        },
    }
}

/// A Pod is one network namespace; per-service networks cannot be kept
fn networking(services: &[&Service], diagnostics: &mut Diagnostics) {
    let affected: Vec<&str> = services
        .iter()
        .filter(|s| s.networks.iter().any(|n| n != DEFAULT_NETWORK))
        .map(|s| s.name.as_str())
        .collect();
    if !affected.is_empty() {
        diagnostics.warn(format!(
            "Kubernetes Pod has a single shared network namespace; per-service networks discarded (services: {})",
            affected.join(", ")
        ));
    }

    for service in services {
        if service.network_mode == Some(NetworkMode::None) {
            diagnostics.warn(format!(
                "service '{}': network_mode 'none' cannot isolate one container of a Pod and was dropped",
                service.name
            ));
        }
    }
}

fn host_network(services: &[&Service], diagnostics: &mut Diagnostics) -> bool {
    let host: Vec<&str> = services
        .iter()
        .filter(|s| s.network_mode == Some(NetworkMode::Host))
        .map(|s| s.name.as_str())
        .collect();
    if !host.is_empty() && host.len() < services.len() {
        diagnostics.warn(format!(
            "network_mode 'host' applies to the whole Pod; every container shares the host network (requested by: {})",
            host.join(", ")
        ));
    }
    !host.is_empty()
}

/// Pick the Pod restart policy; the most restrictive requested policy wins
fn restart_policy(
    services: &[&Service],
    diagnostics: &mut Diagnostics,
) -> Option<PodRestartPolicy> {
    let requested: Vec<(&str, PodRestartPolicy)> = services
        .iter()
        .filter_map(|s| s.restart.map(|r| (s.name.as_str(), PodRestartPolicy::from(r))))
        .collect();
    let chosen = requested.iter().map(|(_, p)| *p).max()?;

    let affected: Vec<&str> = requested
        .iter()
        .filter(|(_, p)| *p != chosen)
        .map(|(name, _)| *name)
        .collect();
    if !affected.is_empty() {
        diagnostics.warn(format!(
            "services disagree on restart policy; Pod uses {:?}, overriding services: {}",
            chosen,
            affected.join(", ")
        ));
    }
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeParser;
    use serde_yaml::Value;

    fn emit_yaml(yaml: &str) -> (Value, Emission) {
        let doc = ComposeParser::parse_str(yaml).unwrap().document;
        let emission = emit(&doc, &TranslateOptions::default().project_name("Shop_App"));
        let pod: Value = serde_yaml::from_str(&emission.output).unwrap();
        (pod, emission)
    }

    #[test]
    fn test_pod_shape() {
        let (pod, emission) = emit_yaml(
            r#"
services:
  web:
    image: docker.io/library/nginx:latest
    ports:
      - "8080:80"
      - "127.0.0.1:53:53/udp"
    environment:
      MODE: prod
    entrypoint: ["/docker-entrypoint.sh"]
    command: ["nginx", "-g", "daemon off;"]
    privileged: true
"#,
        );

        assert_eq!(pod["apiVersion"], "v1");
        assert_eq!(pod["kind"], "Pod");
        assert_eq!(pod["metadata"]["name"], "shop-app");
        let web = &pod["spec"]["containers"][0];
        assert_eq!(web["name"], "web");
        assert_eq!(web["ports"][0]["containerPort"], 80);
        assert_eq!(web["ports"][0]["hostPort"], 8080);
        assert_eq!(web["ports"][0]["protocol"], "TCP");
        assert_eq!(web["ports"][1]["hostIP"], "127.0.0.1");
        assert_eq!(web["ports"][1]["protocol"], "UDP");
        assert_eq!(web["env"][0]["name"], "MODE");
        assert_eq!(web["env"][0]["value"], "prod");
        assert_eq!(web["command"][0], "/docker-entrypoint.sh");
        assert_eq!(web["args"][2], "daemon off;");
        assert_eq!(web["securityContext"]["privileged"], true);
        assert!(pod["spec"].get("restartPolicy").is_none());
        assert!(emission.diagnostics.is_empty());
        assert_eq!(emission.files[0].file_name, "shop-app.yaml");
    }

    #[test]
    fn test_volumes() {
        let (pod, emission) = emit_yaml(
            r#"
volumes:
  pgdata: {}
services:
  db:
    image: postgres
    volumes:
      - pgdata:/var/lib/postgresql/data
      - /srv/init:/docker-entrypoint-initdb.d:ro
      - scratch:/tmp/scratch
  backup:
    image: backup
    volumes:
      - pgdata:/data:ro
"#,
        );

        let volumes = pod["spec"]["volumes"].as_sequence().unwrap();
        assert_eq!(volumes.len(), 3);
        assert_eq!(volumes[0]["name"], "vol-pgdata");
        assert_eq!(volumes[0]["persistentVolumeClaim"]["claimName"], "pgdata");
        assert_eq!(volumes[1]["hostPath"]["path"], "/srv/init");
        assert!(volumes[2]["emptyDir"].is_mapping());

        let backup = &pod["spec"]["containers"][1];
        assert_eq!(backup["volumeMounts"][0]["name"], "vol-pgdata");
        assert_eq!(backup["volumeMounts"][0]["readOnly"], true);

        assert_eq!(emission.diagnostics.errors().len(), 1);
        assert!(emission.diagnostics.errors()[0].contains("'scratch'"));
    }

    #[test]
    fn test_networks_dropped_with_warning() {
        let (pod, emission) = emit_yaml(
            r#"
networks:
  front: {}
  back: {}
services:
  web:
    image: web
    networks: [front]
  db:
    image: db
    networks: [back]
"#,
        );

        assert_eq!(pod["spec"]["containers"].as_sequence().unwrap().len(), 2);
        let warnings = emission.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("network"));
        assert!(warnings[0].contains("web, db"));
    }

    #[test]
    fn test_restart_policy_most_restrictive_wins() {
        let (pod, emission) = emit_yaml(
            r#"
services:
  web:
    image: web
    restart: always
  job:
    image: job
    restart: "no"
  worker:
    image: worker
    restart: on-failure
"#,
        );

        assert_eq!(pod["spec"]["restartPolicy"], "Never");
        let warnings = emission.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("web, worker"));
    }

    #[test]
    fn test_dependency_order_and_host_network() {
        let (pod, emission) = emit_yaml(
            r#"
services:
  web:
    image: web
    depends_on: [db]
    network_mode: host
  db:
    image: db
    network_mode: host
"#,
        );

        assert_eq!(pod["spec"]["containers"][0]["name"], "db");
        assert_eq!(pod["spec"]["containers"][1]["name"], "web");
        assert_eq!(pod["spec"]["hostNetwork"], true);
        let warnings = emission.diagnostics.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("depends_on"));
    }

    #[test]
    fn test_label_conflicts() {
        let (pod, emission) = emit_yaml(
            r#"
services:
  a:
    image: a
    labels:
      team: red
  b:
    image: b
    labels:
      team: blue
      tier: back
"#,
        );

        assert_eq!(pod["metadata"]["annotations"]["team"], "red");
        assert_eq!(pod["metadata"]["annotations"]["tier"], "back");
        assert_eq!(emission.diagnostics.warnings().len(), 1);
    }

    #[test]
    fn test_colliding_container_names_get_suffix() {
        let (pod, emission) = emit_yaml(
            r#"
services:
  web_app:
    image: a
  web-app:
    image: b
"#,
        );

        let containers = pod["spec"]["containers"].as_sequence().unwrap();
        assert_eq!(containers[0]["name"], "web-app");
        assert_eq!(containers[1]["name"], "web-app-2");
        let warnings = emission.diagnostics.warnings();
        assert!(warnings.iter().any(|w| w.contains("'web_app'")));
        assert!(warnings.iter().any(|w| w.contains("'web-app-2'")));
    }

    #[test]
    fn test_unique_label_stays_within_limit() {
        let long = "a".repeat(70);
        let label = unique_label(&long, |candidate| !candidate.contains('-'));
        assert_eq!(label.len(), 63);
        assert!(label.ends_with("-2"));
    }
}
