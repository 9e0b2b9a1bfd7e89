//! Docker Compose file parser
//!
//! Parsing is two-phase: the text is decoded into a generic YAML value so
//! syntax errors surface with serde_yaml's own message, then the known keys
//! are walked into a [`Document`]. Unsupported directives become warnings.
//! Structural problems (no services, a service without an image, dangling
//! `depends_on`) are collected and reported together as one fatal error.

use super::config::{
    CommandConfig, DependsOnConfig, EnvironmentConfig, LabelsConfig, NetworkConfig,
    NetworksConfig, PortConfig, PortConfigLong, VolumeConfig, VolumeMountConfig, VolumeMountLong,
};
use super::document::{
    Document, MountType, Network, NetworkMode, PortMapping, Protocol, RestartPolicy, Service,
    Volume, VolumeMount, DEFAULT_NETWORK,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Failure, Result, TranslateError};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Short port syntax: `[ip:][host:]container[/protocol]`; IPv6 hosts are bracketed
static PORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:(?P<ip>\d{1,3}(?:\.\d{1,3}){3})|\[(?P<ip6>[0-9A-Fa-f:.]+)\]):)?(?:(?P<host>\d+):)?(?P<container>\d+)(?:/(?P<proto>[A-Za-z]+))?$")
        .expect("port pattern is valid")
});

/// Names usable as service, network and volume keys; they become unit file names
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("name pattern is valid")
});

/// Parsed document with the diagnostics raised while reading it
#[derive(Debug, Clone)]
pub struct Parsed {
    /// Canonical document
    pub document: Document,
    /// Non-fatal diagnostics
    pub diagnostics: Diagnostics,
}

/// Compose file parser
pub struct ComposeParser;

impl ComposeParser {
    /// Parse compose text into a document
    pub fn parse_str(content: &str) -> Result<Parsed, Failure> {
        let root: Value = serde_yaml::from_str(content)
            .map_err(|e| Failure::new(TranslateError::Yaml(e.to_string())))?;

        let mut walker = Walker::default();
        let document = walker.document(root);

        match document {
            Some(document) if walker.errors.is_empty() => {
                tracing::debug!(
                    services = document.services.len(),
                    networks = document.networks.len(),
                    volumes = document.volumes.len(),
                    "compose document parsed"
                );
                Ok(Parsed {
                    document,
                    diagnostics: walker.diagnostics,
                })
            }
            _ => Err(Failure::new(TranslateError::ComposeParse(walker.errors))
                .with_warnings(walker.diagnostics.warnings())),
        }
    }
}

fn invalid_name(kind: &str, name: &str) -> String {
    format!(
        "invalid {} name '{}': must match [a-zA-Z0-9][a-zA-Z0-9_.-]*",
        kind, name
    )
}

/// Walks a generic YAML tree into a [`Document`]
#[derive(Default)]
struct Walker {
    diagnostics: Diagnostics,
    errors: Vec<String>,
}

impl Walker {
    fn document(&mut self, root: Value) -> Option<Document> {
        let root = match root {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => {
                self.errors
                    .push("top level of a compose file must be a mapping".to_string());
                return None;
            }
        };

        let mut doc = Document::default();
        let mut services = None;

        for (key, value) in &root {
            let Some(key) = key.as_str() else {
                self.diagnostics
                    .warn(format!("ignoring non-string top-level key {:?}", key));
                continue;
            };
            match key {
                "version" => doc.version = scalar_string(value),
                "name" => doc.name = scalar_string(value),
                "services" => services = Some(value),
                "networks" => doc.networks = self.networks(value),
                "volumes" => doc.volumes = self.volumes(value),
                extension if extension.starts_with("x-") => {
                    tracing::debug!(key = extension, "skipping compose extension field");
                }
                other => self.diagnostics.warn(format!(
                    "top-level key '{}' is not representable in Podman output and was dropped",
                    other
                )),
            }
        }

        let services = match services {
            Some(Value::Mapping(map)) if !map.is_empty() => map,
            Some(Value::Mapping(_)) | Some(Value::Null) | None => {
                self.errors.push("no services defined".to_string());
                return None;
            }
            Some(_) => {
                self.errors.push("'services' must be a mapping".to_string());
                return None;
            }
        };

        for (key, value) in services {
            let name = match key.as_str() {
                Some(name) if NAME_RE.is_match(name) => name,
                Some(name) => {
                    self.errors.push(invalid_name("service", name));
                    continue;
                }
                None => {
                    self.errors
                        .push(format!("invalid service name {:?}", key));
                    continue;
                }
            };
            if let Some(service) = self.service(name, value, &doc.volumes) {
                doc.services.push(service);
            }
        }

        self.resolve_references(&mut doc);
        Some(doc)
    }

    /// Decode a single key into one of the raw compose shapes
    fn decode<T: DeserializeOwned>(&mut self, owner: &str, key: &str, value: &Value) -> Option<T> {
        match serde_yaml::from_value(value.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                self.diagnostics
                    .warn(format!("{}: invalid '{}' ({}), ignored", owner, key, e));
                None
            }
        }
    }

    fn service(
        &mut self,
        name: &str,
        value: &Value,
        volumes: &BTreeMap<String, Volume>,
    ) -> Option<Service> {
        let map = match value {
            Value::Mapping(map) => map,
            _ => {
                self.errors
                    .push(format!("service '{}' must be a mapping", name));
                return None;
            }
        };

        let owner = format!("service '{}'", name);
        let mut service = Service::new(name, "");
        let mut image = None;

        for (key, value) in map {
            let Some(key) = key.as_str() else {
                self.diagnostics.warn(format!(
                    "service '{}': ignoring non-string key {:?}",
                    name, key
                ));
                continue;
            };
            match key {
                "image" => image = scalar_string(value),
                "ports" => {
                    if let Some(ports) = self.decode::<Vec<PortConfig>>(&owner, key, value) {
                        service.ports = ports
                            .into_iter()
                            .filter_map(|p| self.port(name, p))
                            .collect();
                    }
                }
                "volumes" => {
                    if let Some(mounts) = self.decode::<Vec<VolumeMountConfig>>(&owner, key, value) {
                        service.volume_mounts = mounts
                            .into_iter()
                            .filter_map(|m| self.volume_mount(name, m, volumes))
                            .collect();
                    }
                }
                "environment" => {
                    if let Some(env) = self.decode::<EnvironmentConfig>(&owner, key, value) {
                        service.environment = self.environment(name, env);
                    }
                }
                "labels" => {
                    if let Some(labels) = self.decode::<LabelsConfig>(&owner, key, value) {
                        service.labels = self.labels(name, labels);
                    }
                }
                "restart" => match scalar_string(value).as_deref().map(RestartPolicy::parse) {
                    Some(Some(policy)) => service.restart = Some(policy),
                    _ => self.diagnostics.warn(format!(
                        "service '{}': unknown restart policy {:?}, dropped",
                        name,
                        scalar_string(value).unwrap_or_default()
                    )),
                },
                "network_mode" => match scalar_string(value).as_deref().map(NetworkMode::parse) {
                    Some(Some(mode)) => service.network_mode = Some(mode),
                    _ => self.diagnostics.warn(format!(
                        "service '{}': unsupported network_mode {:?}, dropped",
                        name,
                        scalar_string(value).unwrap_or_default()
                    )),
                },
                "networks" => {
                    if let Some(networks) = self.decode::<NetworksConfig>(&owner, key, value) {
                        service.networks = self.service_networks(name, networks);
                    }
                }
                "privileged" => {
                    if let Some(privileged) = self.decode::<bool>(&owner, key, value) {
                        service.privileged = privileged;
                    }
                }
                "command" => {
                    service.command = self.decode::<CommandConfig>(&owner, key, value)
                        .map(command_args);
                }
                "entrypoint" => {
                    service.entrypoint = self.decode::<CommandConfig>(&owner, key, value)
                        .map(command_args);
                }
                "depends_on" => {
                    if let Some(deps) = self.decode::<DependsOnConfig>(&owner, key, value) {
                        service.depends_on = self.depends_on(name, deps);
                    }
                }
                other => self.diagnostics.warn(format!(
                    "service '{}': directive '{}' is not representable in Podman output and was dropped",
                    name, other
                )),
            }
        }

        match image {
            Some(image) if !image.trim().is_empty() => {
                service.image = image.trim().to_string();
                Some(service)
            }
            _ => {
                self.errors
                    .push(format!("service '{}' has no image", name));
                None
            }
        }
    }

    fn port(&mut self, service: &str, port: PortConfig) -> Option<PortMapping> {
        match port {
            PortConfig::Short(spec) => self.short_port(service, &spec.to_string()),
            PortConfig::Long(long) => self.long_port(service, long),
        }
    }

    fn short_port(&mut self, service: &str, spec: &str) -> Option<PortMapping> {
        let Some(caps) = PORT_RE.captures(spec.trim()) else {
            self.diagnostics.warn(format!(
                "service '{}': malformed port '{}', skipped",
                service, spec
            ));
            return None;
        };

        let protocol = match caps.name("proto").map(|m| m.as_str().parse::<Protocol>()) {
            None => Protocol::Tcp,
            Some(Ok(protocol)) => protocol,
            Some(Err(e)) => {
                self.diagnostics.warn(format!(
                    "service '{}': port '{}' has {}, skipped",
                    service, spec, e
                ));
                return None;
            }
        };

        let container = self.port_number(service, spec, &caps["container"])?;
        let host = match caps.name("host") {
            Some(host) => self.port_number(service, spec, host.as_str())?,
            None => self.same_host_port(service, container),
        };

        Some(PortMapping {
            host_ip: caps
                .name("ip")
                .or_else(|| caps.name("ip6"))
                .map(|m| m.as_str().to_string()),
            host_port: host,
            container_port: container,
            protocol,
        })
    }

    fn long_port(&mut self, service: &str, long: PortConfigLong) -> Option<PortMapping> {
        let spec = format!("target {}", long.target);
        let container = self.port_number(service, &spec, &long.target.to_string())?;
        let host = match long.published {
            Some(published) => self.port_number(service, &spec, &published.to_string())?,
            None => self.same_host_port(service, container),
        };
        let protocol = match long.protocol.as_deref().map(str::parse::<Protocol>) {
            None => Protocol::Tcp,
            Some(Ok(protocol)) => protocol,
            Some(Err(e)) => {
                self.diagnostics.warn(format!(
                    "service '{}': port {} has {}, skipped",
                    service, spec, e
                ));
                return None;
            }
        };
        if long.mode.as_deref().is_some_and(|m| m != "host") {
            self.diagnostics.warn(format!(
                "service '{}': port mode '{}' is swarm-only, published as a host port",
                service,
                long.mode.unwrap_or_default()
            ));
        }

        Some(PortMapping {
            host_ip: long
                .host_ip
                .map(|ip| ip.trim_start_matches('[').trim_end_matches(']').to_string()),
            host_port: host,
            container_port: container,
            protocol,
        })
    }

    fn port_number(&mut self, service: &str, spec: &str, raw: &str) -> Option<u16> {
        match raw.parse::<u16>() {
            Ok(port) if port > 0 => Some(port),
            _ => {
                self.diagnostics.warn(format!(
                    "service '{}': port '{}' is out of range 1-65535, skipped",
                    service, spec
                ));
                None
            }
        }
    }

    fn same_host_port(&mut self, service: &str, container: u16) -> u16 {
        self.diagnostics.warn(format!(
            "service '{}': port {} has no host port, published on the same host port",
            service, container
        ));
        container
    }

    fn volume_mount(
        &mut self,
        service: &str,
        mount: VolumeMountConfig,
        volumes: &BTreeMap<String, Volume>,
    ) -> Option<VolumeMount> {
        match mount {
            VolumeMountConfig::Short(spec) => self.short_volume(service, &spec, volumes),
            VolumeMountConfig::Long(long) => self.long_volume(service, long),
        }
    }

    fn short_volume(
        &mut self,
        service: &str,
        spec: &str,
        volumes: &BTreeMap<String, Volume>,
    ) -> Option<VolumeMount> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (source, target, options) = match parts.as_slice() {
            [_] => {
                self.diagnostics.warn(format!(
                    "service '{}': anonymous volume '{}' is not representable, skipped",
                    service, spec
                ));
                return None;
            }
            [source, target] => (*source, *target, None),
            [source, target, options] => (*source, *target, Some(*options)),
            _ => {
                self.diagnostics.warn(format!(
                    "service '{}': malformed volume '{}', skipped",
                    service, spec
                ));
                return None;
            }
        };

        if source.is_empty() || !target.starts_with('/') {
            self.diagnostics.warn(format!(
                "service '{}': malformed volume '{}', skipped",
                service, spec
            ));
            return None;
        }

        let mount_type = if volumes.contains_key(source) || !looks_like_path(source) {
            MountType::Volume
        } else {
            MountType::Bind
        };

        let mut mount = VolumeMount::new(source, target, mount_type);
        for option in options
            .into_iter()
            .flat_map(|o| o.split(','))
            .map(str::trim)
            .filter(|o| !o.is_empty())
        {
            mount.options.insert(option.to_string());
        }
        Some(mount)
    }

    fn long_volume(&mut self, service: &str, long: VolumeMountLong) -> Option<VolumeMount> {
        let mount_type = match long.mount_type.as_deref() {
            Some("bind") => MountType::Bind,
            Some("volume") | None => MountType::Volume,
            Some(other) => {
                self.diagnostics.warn(format!(
                    "service '{}': mount type '{}' for '{}' is not supported, skipped",
                    service, other, long.target
                ));
                return None;
            }
        };

        let Some(source) = long.source.filter(|s| !s.is_empty()) else {
            self.diagnostics.warn(format!(
                "service '{}': anonymous volume '{}' is not representable, skipped",
                service, long.target
            ));
            return None;
        };

        if !long.target.starts_with('/') {
            self.diagnostics.warn(format!(
                "service '{}': volume target '{}' is not absolute, skipped",
                service, long.target
            ));
            return None;
        }

        let mut mount = VolumeMount::new(&source, &long.target, mount_type);
        if long.read_only == Some(true) {
            mount.options.insert("ro".to_string());
        }
        if let Some(bind) = long.bind {
            if let Some(selinux) = bind.selinux.filter(|s| s == "z" || s == "Z") {
                mount.options.insert(selinux);
            }
            if let Some(propagation) = bind.propagation {
                mount.options.insert(propagation);
            }
        }
        Some(mount)
    }

    fn environment(&mut self, service: &str, env: EnvironmentConfig) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        match env {
            EnvironmentConfig::Map(map) => {
                for (key, value) in map {
                    match value {
                        Some(value) => {
                            result.insert(key, value.to_string());
                        }
                        None => self.unset_variable(service, &key),
                    }
                }
            }
            EnvironmentConfig::Array(items) => {
                for item in items {
                    match item.split_once('=') {
                        Some((key, value)) => {
                            result.insert(key.to_string(), value.to_string());
                        }
                        None => self.unset_variable(service, &item),
                    }
                }
            }
        }
        result
    }

    fn unset_variable(&mut self, service: &str, key: &str) {
        self.diagnostics.warn(format!(
            "service '{}': environment variable '{}' has no value and was dropped",
            service, key
        ));
    }

    fn labels(&mut self, service: &str, labels: LabelsConfig) -> BTreeMap<String, String> {
        match labels {
            LabelsConfig::Map(map) => map.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
            LabelsConfig::Array(items) => {
                let mut result = BTreeMap::new();
                for item in items {
                    match item.split_once('=') {
                        Some((key, value)) => {
                            result.insert(key.to_string(), value.to_string());
                        }
                        None => {
                            result.insert(item, String::new());
                        }
                    }
                }
                tracing::trace!(service, labels = result.len(), "labels decoded from list");
                result
            }
        }
    }

    fn service_networks(&mut self, service: &str, networks: NetworksConfig) -> Vec<String> {
        match networks {
            NetworksConfig::Array(names) => names,
            NetworksConfig::Map(map) => {
                let mut names = Vec::new();
                for (name, config) in map {
                    if config.as_ref().is_some_and(|c| c.is_customized()) {
                        self.diagnostics.warn(format!(
                            "service '{}': aliases and static addresses on network '{}' are not representable and were dropped",
                            service, name
                        ));
                    }
                    names.push(name);
                }
                names
            }
        }
    }

    fn depends_on(&mut self, service: &str, deps: DependsOnConfig) -> Vec<String> {
        match deps {
            DependsOnConfig::Array(names) => names,
            DependsOnConfig::Map(map) => {
                let mut names = Vec::new();
                for (name, condition) in map {
                    if let Some(cond) = condition
                        .condition
                        .filter(|c| c != "service_started")
                    {
                        self.diagnostics.warn(format!(
                            "service '{}': depends_on condition '{}' for '{}' is not representable, only start ordering is kept",
                            service, cond, name
                        ));
                    }
                    names.push(name);
                }
                names
            }
        }
    }

    fn networks(&mut self, value: &Value) -> BTreeMap<String, Network> {
        let Some(configs) =
            self.decode::<BTreeMap<String, Option<NetworkConfig>>>("top-level", "networks", value)
        else {
            return BTreeMap::new();
        };

        configs
            .into_iter()
            .filter(|(key, _)| {
                let valid = NAME_RE.is_match(key);
                if !valid {
                    self.errors.push(invalid_name("network", key));
                }
                valid
            })
            .map(|(key, config)| {
                let config = config.unwrap_or_default();
                let mut network = Network::new(config.name.as_deref().unwrap_or(&key));
                if let Some(driver) = config.driver {
                    network.driver = driver;
                }
                network.internal = config.internal.unwrap_or(false);
                network.external = config.external.is_some_and(|e| e.is_external());
                if let Some(pool) = config.ipam.and_then(|ipam| ipam.config.into_iter().next()) {
                    network.subnet = pool.subnet;
                    network.gateway = pool.gateway;
                }
                (key, network)
            })
            .collect()
    }

    fn volumes(&mut self, value: &Value) -> BTreeMap<String, Volume> {
        let Some(configs) =
            self.decode::<BTreeMap<String, Option<VolumeConfig>>>("top-level", "volumes", value)
        else {
            return BTreeMap::new();
        };

        configs
            .into_iter()
            .filter(|(key, _)| {
                let valid = NAME_RE.is_match(key);
                if !valid {
                    self.errors.push(invalid_name("volume", key));
                }
                valid
            })
            .map(|(key, config)| {
                let config = config.unwrap_or_default();
                let mut volume = Volume::new(config.name.as_deref().unwrap_or(&key));
                if let Some(driver) = config.driver {
                    volume.driver = driver;
                }
                volume.external = config.external.is_some_and(|e| e.is_external());
                (key, volume)
            })
            .collect()
    }

    /// Check cross-service references once every service is known
    fn resolve_references(&mut self, doc: &mut Document) {
        let names: Vec<String> = doc.services.iter().map(|s| s.name.clone()).collect();

        for service in &mut doc.services {
            for dep in &service.depends_on {
                if !names.contains(dep) {
                    self.errors.push(format!(
                        "service '{}' depends on unknown service '{}'",
                        service.name, dep
                    ));
                }
            }

            if service.network_mode.is_some() && !service.networks.is_empty() {
                self.diagnostics.warn(format!(
                    "service '{}': 'networks' cannot be combined with network_mode and was dropped",
                    service.name
                ));
                service.networks.clear();
            }

            let mut resolved: Vec<String> = Vec::new();
            for network in std::mem::take(&mut service.networks) {
                let network = if network == DEFAULT_NETWORK || doc.networks.contains_key(&network) {
                    network
                } else {
                    self.diagnostics.warn(format!(
                        "service '{}' references undeclared network '{}', using the default network",
                        service.name, network
                    ));
                    DEFAULT_NETWORK.to_string()
                };
                if !resolved.contains(&network) {
                    resolved.push(network);
                }
            }
            service.networks = resolved;
        }

        if self.errors.is_empty() {
            if let Err(e) = doc.start_order() {
                self.errors.extend(e.messages());
            }
        }
    }
}

/// Render a scalar value as a string
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether a short-syntax volume source names a host path
fn looks_like_path(source: &str) -> bool {
    source.contains('/') || source.starts_with('.') || source.starts_with('~')
}

fn command_args(command: CommandConfig) -> Vec<String> {
    match command {
        CommandConfig::Shell(s) => split_command(&s),
        CommandConfig::Exec(args) => args,
    }
}

/// Split a shell-form command into arguments, honoring quotes and escapes
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_arg = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Parsed {
        ComposeParser::parse_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
    environment:
      POSTGRES_PASSWORD: secret
"#;

        let parsed = parse(yaml);
        let doc = parsed.document;
        assert_eq!(doc.version.as_deref(), Some("3.8"));
        assert_eq!(doc.services.len(), 2);
        assert_eq!(doc.services[0].name, "web");
        assert_eq!(doc.services[1].name, "db");
        assert_eq!(doc.services[0].ports, vec![PortMapping::new(80, 80)]);
        assert_eq!(doc.services[1].environment["POSTGRES_PASSWORD"], "secret");
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let yaml = r#"
services:
  web:
    ports:
      - "80:80"
"#;

        let failure = ComposeParser::parse_str(yaml).unwrap_err();
        assert_eq!(
            failure.error,
            TranslateError::ComposeParse(vec!["service 'web' has no image".to_string()])
        );
    }

    #[test]
    fn test_missing_images_reported_together() {
        let yaml = r#"
services:
  web:
    build: .
  api:
    image: ""
  db:
    image: postgres
"#;

        let failure = ComposeParser::parse_str(yaml).unwrap_err();
        assert_eq!(failure.error.messages().len(), 2);
        assert!(failure.warnings.iter().any(|w| w.contains("'build'")));
    }

    #[test]
    fn test_names_must_be_file_safe() {
        let yaml = r#"
networks:
  "../net": {}
volumes:
  "data/../x": {}
services:
  "../../etc/evil":
    image: busybox
  ok_name.1:
    image: busybox
"#;

        let failure = ComposeParser::parse_str(yaml).unwrap_err();
        let TranslateError::ComposeParse(errors) = failure.error else {
            panic!("expected a compose parse error");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("network name '../net'"));
        assert!(errors[1].contains("volume name 'data/../x'"));
        assert!(errors[2].contains("service name '../../etc/evil'"));
    }

    #[test]
    fn test_no_services() {
        for yaml in ["services: {}\n", "version: '3'\n", ""] {
            let failure = ComposeParser::parse_str(yaml).unwrap_err();
            assert_eq!(
                failure.error,
                TranslateError::ComposeParse(vec!["no services defined".to_string()])
            );
        }
    }

    #[test]
    fn test_malformed_yaml() {
        let failure = ComposeParser::parse_str("services: [unclosed").unwrap_err();
        assert!(matches!(failure.error, TranslateError::Yaml(_)));
    }

    #[test]
    fn test_unknown_directives_warn() {
        let yaml = r#"
services:
  web:
    image: nginx
    healthcheck:
      test: ["CMD", "true"]
    deploy:
      replicas: 2
secrets:
  token:
    file: ./token
x-common:
  foo: bar
"#;

        let parsed = parse(yaml);
        let warnings = parsed.diagnostics.warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("'secrets'"));
        assert!(warnings[1].contains("'healthcheck'"));
        assert!(warnings[2].contains("'deploy'"));
    }

    #[test]
    fn test_port_syntaxes() {
        let yaml = r#"
services:
  dns:
    image: coredns
    ports:
      - "53:53/udp"
      - "127.0.0.1:8080:80"
      - 9090
      - target: 443
        published: "8443"
      - "8000-8010:8000-8010"
      - "70000:80"
      - "5000:5000/sctp"
"#;

        let parsed = parse(yaml);
        let ports = &parsed.document.services[0].ports;
        assert_eq!(ports.len(), 4);
        assert_eq!(ports[0].protocol, Protocol::Udp);
        assert_eq!(ports[1].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!((ports[1].host_port, ports[1].container_port), (8080, 80));
        assert_eq!((ports[2].host_port, ports[2].container_port), (9090, 9090));
        assert_eq!((ports[3].host_port, ports[3].container_port), (8443, 443));
        // 9090 without host port, the range, the out-of-range port and sctp
        assert_eq!(parsed.diagnostics.warnings().len(), 4);
    }

    #[test]
    fn test_ipv6_host_ports() {
        let yaml = r#"
services:
  dns:
    image: coredns
    ports:
      - "[::1]:8053:53/udp"
      - target: 80
        published: 8080
        host_ip: "::1"
      - target: 443
        published: 8443
        host_ip: "[fe80::1]"
"#;

        let parsed = parse(yaml);
        let ports = &parsed.document.services[0].ports;
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].host_ip.as_deref(), Some("::1"));
        assert_eq!((ports[0].host_port, ports[0].container_port), (8053, 53));
        assert_eq!(ports[1].binding(), "[::1]:8080:80");
        assert_eq!(ports[2].host_ip.as_deref(), Some("fe80::1"));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_volume_kinds() {
        let yaml = r#"
volumes:
  data: {}
services:
  app:
    image: app
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
      - data:/var/lib/data:ro
      - ./config:/etc/app:z
      - cache:/cache
      - /anonymous
      - type: bind
        source: /srv
        target: /srv
        read_only: true
      - type: tmpfs
        target: /tmp
"#;

        let parsed = parse(yaml);
        let mounts = &parsed.document.services[0].volume_mounts;
        assert_eq!(mounts.len(), 5);
        assert_eq!(mounts[0].mount_type, MountType::Bind);
        assert_eq!(mounts[1].mount_type, MountType::Volume);
        assert!(mounts[1].is_read_only());
        assert_eq!(mounts[2].mount_type, MountType::Bind);
        assert!(mounts[2].options.contains("z"));
        assert_eq!(mounts[3].mount_type, MountType::Volume);
        assert_eq!(mounts[4].mount_type, MountType::Bind);
        assert!(mounts[4].is_read_only());
        assert_eq!(parsed.diagnostics.warnings().len(), 2);
    }

    #[test]
    fn test_environment_and_labels_lists() {
        let yaml = r#"
services:
  app:
    image: app
    environment:
      - MODE=prod
      - URL=http://x?a=b
      - FROM_HOST
    labels:
      - traefik.enable=true
"#;

        let parsed = parse(yaml);
        let service = &parsed.document.services[0];
        assert_eq!(service.environment["MODE"], "prod");
        assert_eq!(service.environment["URL"], "http://x?a=b");
        assert!(!service.environment.contains_key("FROM_HOST"));
        assert_eq!(service.labels["traefik.enable"], "true");
        assert_eq!(parsed.diagnostics.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_dependency_is_fatal() {
        let yaml = r#"
services:
  web:
    image: nginx
    depends_on:
      - api
"#;

        let failure = ComposeParser::parse_str(yaml).unwrap_err();
        assert!(failure.to_string().contains("unknown service 'api'"));
    }

    #[test]
    fn test_circular_dependency_is_fatal() {
        let yaml = r#"
services:
  a:
    image: nginx
    depends_on: [b]
  b:
    image: nginx
    depends_on:
      a:
        condition: service_started
"#;

        let failure = ComposeParser::parse_str(yaml).unwrap_err();
        assert!(failure.to_string().contains("circular dependency"));
    }

    #[test]
    fn test_undeclared_network_falls_back_to_default() {
        let yaml = r#"
networks:
  backend: {}
services:
  api:
    image: api
    networks:
      - backend
      - frontend
"#;

        let parsed = parse(yaml);
        assert_eq!(parsed.document.services[0].networks, vec!["backend", "default"]);
        assert!(parsed.diagnostics.warnings()[0].contains("'frontend'"));
    }

    #[test]
    fn test_top_level_network_and_volume() {
        let yaml = r#"
networks:
  backend:
    internal: true
    ipam:
      config:
        - subnet: 10.5.0.0/16
          gateway: 10.5.0.1
  shared:
    external: true
volumes:
  pgdata:
    driver: local
  legacy:
    external:
      name: legacy-data
services:
  db:
    image: postgres
"#;

        let doc = parse(yaml).document;
        let backend = &doc.networks["backend"];
        assert!(backend.internal);
        assert_eq!(backend.subnet.as_deref(), Some("10.5.0.0/16"));
        assert_eq!(backend.gateway.as_deref(), Some("10.5.0.1"));
        assert!(doc.networks["shared"].external);
        assert_eq!(doc.volumes["pgdata"].driver, "local");
        assert!(doc.volumes["legacy"].external);
    }

    #[test]
    fn test_network_mode_and_restart() {
        let yaml = r#"
services:
  db:
    image: postgres
    restart: on-failure:3
  sidecar:
    image: envoy
    network_mode: "service:db"
    restart: sometimes
    privileged: true
    command: envoy -c "/etc/envoy config.yaml"
"#;

        let parsed = parse(yaml);
        let doc = parsed.document;
        assert_eq!(doc.services[0].restart, Some(RestartPolicy::OnFailure(Some(3))));
        let sidecar = &doc.services[1];
        assert_eq!(sidecar.network_mode, Some(NetworkMode::Container("db".to_string())));
        assert_eq!(sidecar.restart, None);
        assert!(sidecar.privileged);
        assert_eq!(
            sidecar.command,
            Some(vec![
                "envoy".to_string(),
                "-c".to_string(),
                "/etc/envoy config.yaml".to_string()
            ])
        );
        assert!(parsed.diagnostics.warnings()[0].contains("restart"));
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("echo hello world"), vec!["echo", "hello", "world"]);
        assert_eq!(split_command("sh -c 'a && b'"), vec!["sh", "-c", "a && b"]);
        assert_eq!(split_command(r#"say "" done"#), vec!["say", "", "done"]);
        assert_eq!(split_command(r"a\ b"), vec!["a b"]);
        assert!(split_command("   ").is_empty());
    }
}
