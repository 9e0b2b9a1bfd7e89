//! Quadlet emitter
//!
//! One `.container` unit per service, plus `.network` and `.volume` units
//! for the networks and volumes the project owns. Quadlet derives the
//! systemd service name from the unit file name, so `db.container` runs as
//! `db.service`.

use super::{Emission, OutputFile};
use crate::compose::{
    Document, MountType, NetworkMode, RestartPolicy, Service, VolumeMount, DEFAULT_NETWORK,
};
use crate::diagnostics::Diagnostics;
use crate::options::TranslateOptions;

/// A generated unit file
pub type QuadletUnit = OutputFile;

/// One `[Section]` of a unit file
struct Section {
    name: &'static str,
    entries: Vec<(&'static str, String)>,
}

impl Section {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.entries.push((key, value.into()));
    }
}

/// Unit file made of sections; empty sections are omitted
#[derive(Default)]
struct UnitFile {
    sections: Vec<Section>,
}

impl UnitFile {
    fn push(&mut self, section: Section) {
        if !section.entries.is_empty() {
            self.sections.push(section);
        }
    }

    fn render(&self) -> String {
        let blocks: Vec<String> = self
            .sections
            .iter()
            .map(|section| {
                let mut block = format!("[{}]\n", section.name);
                for (key, value) in &section.entries {
                    block.push_str(&format!("{}={}\n", key, value));
                }
                block
            })
            .collect();
        blocks.join("\n")
    }
}

/// Quote a value for a systemd unit if it contains whitespace or quotes
pub fn quote(value: &str) -> String {
    let escaped = value.replace('%', "%%");
    if escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\')
    {
        format!("\"{}\"", escaped.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        escaped
    }
}

/// Quote a command line; `$` is escaped since systemd expands it in `ExecStart=`
fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| quote(&arg.replace('$', "$$")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Entrypoint=` takes a single executable, or a JSON array for several words
fn entrypoint_value(entrypoint: &[String]) -> String {
    match entrypoint {
        [single] => quote(single),
        words => serde_json::Value::from(words.to_vec())
            .to_string()
            .replace('%', "%%"),
    }
}

/// Generate every unit file for the document
pub fn units(
    doc: &Document,
    options: &TranslateOptions,
    diagnostics: &mut Diagnostics,
) -> Vec<QuadletUnit> {
    let project = options.project_for(doc);
    let mut units = Vec::new();

    for (key, network) in &doc.networks {
        if network.external {
            continue;
        }
        let mut section = Section::new("Network");
        section.set("NetworkName", network.name.as_str());
        section.set("Driver", network.driver.as_str());
        if network.internal {
            section.set("Internal", "true");
        }
        if let Some(subnet) = &network.subnet {
            section.set("Subnet", subnet.as_str());
        }
        if let Some(gateway) = &network.gateway {
            section.set("Gateway", gateway.as_str());
        }
        units.push(unit(format!("{}.network", key), project_unit(&project, key), section));
    }

    for (key, volume) in &doc.volumes {
        if volume.external {
            continue;
        }
        let mut section = Section::new("Volume");
        section.set("VolumeName", volume.name.as_str());
        if volume.driver != "local" {
            section.set("Driver", volume.driver.as_str());
        }
        units.push(unit(format!("{}.volume", key), project_unit(&project, key), section));
    }

    let on_default = doc
        .services
        .iter()
        .filter(|s| s.network_mode.is_none())
        .filter(|s| s.networks.is_empty() || s.networks.iter().any(|n| n == DEFAULT_NETWORK))
        .count();
    if on_default > 1 {
        diagnostics.warn(
            "services on the implicit default network run on Podman's default network, which has no name resolution between containers; declare a network to keep service discovery",
        );
    }

    for service in &doc.services {
        units.push(container_unit(doc, &project, service));
    }

    units
}

fn project_unit(project: &str, name: &str) -> Section {
    let mut section = Section::new("Unit");
    section.set("Description", format!("{} {}", project, name));
    section
}

fn unit(file_name: String, head: Section, body: Section) -> QuadletUnit {
    let mut file = UnitFile::default();
    file.push(head);
    file.push(body);
    QuadletUnit {
        file_name,
        contents: file.render(),
    }
}

fn container_unit(doc: &Document, project: &str, service: &Service) -> QuadletUnit {
    let mut head = project_unit(project, &service.name);
    for dep in &service.depends_on {
        head.set("Requires", format!("{}.service", dep));
        head.set("After", format!("{}.service", dep));
    }

    let mut container = Section::new("Container");
    container.set("ContainerName", service.name.as_str());
    container.set("Image", service.image.as_str());
    if let Some(entrypoint) = &service.entrypoint {
        container.set("Entrypoint", entrypoint_value(entrypoint));
    }
    if let Some(command) = &service.command {
        container.set("Exec", quote_args(command));
    }
    for port in &service.ports {
        container.set("PublishPort", port.to_string());
    }
    for mount in &service.volume_mounts {
        container.set("Volume", quote(&volume_spec(doc, mount)));
    }
    for (key, value) in &service.environment {
        container.set("Environment", quote(&format!("{}={}", key, value)));
    }
    for (key, value) in &service.labels {
        container.set("Label", quote(&format!("{}={}", key, value)));
    }
    match &service.network_mode {
        Some(NetworkMode::Bridge) | None => {
            for network in service.networks.iter().filter(|n| *n != DEFAULT_NETWORK) {
                container.set("Network", network_ref(doc, network));
            }
        }
        Some(mode) => container.set("Network", mode.to_string()),
    }
    if service.privileged {
        container.set("PodmanArgs", "--privileged");
    }

    let mut systemd = Section::new("Service");
    if let Some(policy) = service.restart {
        systemd.set("Restart", systemd_restart(policy));
    }

    let mut install = Section::new("Install");
    install.set("WantedBy", "default.target");

    let mut file = UnitFile::default();
    file.push(head);
    file.push(container);
    file.push(systemd);
    file.push(install);
    QuadletUnit {
        file_name: format!("{}.container", service.name),
        contents: file.render(),
    }
}

/// Project-owned volumes are referenced through their `.volume` unit
fn volume_spec(doc: &Document, mount: &VolumeMount) -> String {
    let source = match (mount.mount_type, doc.volumes.get(&mount.source)) {
        (MountType::Volume, Some(volume)) if volume.external => volume.name.clone(),
        (MountType::Volume, Some(_)) => format!("{}.volume", mount.source),
        _ => mount.source.clone(),
    };
    let mut spec = format!("{}:{}", source, mount.target);
    if !mount.options.is_empty() {
        let options: Vec<&str> = mount.options.iter().map(String::as_str).collect();
        spec.push(':');
        spec.push_str(&options.join(","));
    }
    spec
}

/// Project-owned networks are referenced through their `.network` unit
fn network_ref(doc: &Document, name: &str) -> String {
    match doc.networks.get(name) {
        Some(network) if network.external => network.name.clone(),
        Some(_) => format!("{}.network", name),
        None => name.to_string(),
    }
}

fn systemd_restart(policy: RestartPolicy) -> &'static str {
    match policy {
        RestartPolicy::No => "no",
        RestartPolicy::Always | RestartPolicy::UnlessStopped => "always",
        RestartPolicy::OnFailure(_) => "on-failure",
    }
}

/// Render all units into one artifact, each preceded by a `# ==> file <==` header
pub fn emit(doc: &Document, options: &TranslateOptions) -> Emission {
    let mut diagnostics = Diagnostics::new();
    let files = units(doc, options, &mut diagnostics);
    let output = files
        .iter()
        .map(|unit| format!("# ==> {} <==\n{}", unit.file_name, unit.contents))
        .collect::<Vec<_>>()
        .join("\n");

    Emission {
        output,
        files,
        diagnostics,
    }
}
