//! Canonical compose document
//!
//! The parser normalizes every accepted compose syntax into these types.
//! Rules rewrite a [`Document`] by value and emitters only read it.

use crate::error::{Result, TranslateError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Name of the network every service joins when none is listed
pub const DEFAULT_NETWORK: &str = "default";

/// Parsed compose application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Compose file version, informational only
    pub version: Option<String>,
    /// Project name from the top-level `name` key
    pub name: Option<String>,
    /// Services in file order
    pub services: Vec<Service>,
    /// Declared networks
    pub networks: BTreeMap<String, Network>,
    /// Declared volumes
    pub volumes: BTreeMap<String, Volume>,
}

impl Document {
    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Whether a service with this name exists
    pub fn has_service(&self, name: &str) -> bool {
        self.service(name).is_some()
    }

    /// Service names ordered so that every service follows its dependencies
    pub fn start_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for service in &self.services {
            self.topological_sort(&service.name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    fn topological_sort(
        &self,
        service: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if visiting.contains(service) {
            return Err(TranslateError::ComposeParse(vec![format!(
                "circular dependency detected for service '{}'",
                service
            )]));
        }

        visiting.insert(service.to_string());

        if let Some(config) = self.service(service) {
            for dep in &config.depends_on {
                self.topological_sort(dep, visited, visiting, order)?;
            }
        }

        visiting.remove(service);
        visited.insert(service.to_string());
        order.push(service.to_string());

        Ok(())
    }
}

/// Normalized service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Published ports
    pub ports: Vec<PortMapping>,
    /// Bind and named-volume mounts
    pub volume_mounts: Vec<VolumeMount>,
    /// Environment variables
    pub environment: BTreeMap<String, String>,
    /// Networks the service joins
    pub networks: Vec<String>,
    /// Restart policy
    pub restart: Option<RestartPolicy>,
    /// Network mode
    pub network_mode: Option<NetworkMode>,
    /// Privileged mode
    pub privileged: bool,
    /// Command override
    pub command: Option<Vec<String>>,
    /// Entrypoint override
    pub entrypoint: Option<Vec<String>>,
    /// Services this one depends on
    pub depends_on: Vec<String>,
    /// Labels
    pub labels: BTreeMap<String, String>,
}

impl Service {
    /// Create a service with only a name and image set
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            ..Self::default()
        }
    }
}

/// Port protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (default)
    #[default]
    Tcp,
    /// UDP
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unsupported protocol '{}'", other)),
        }
    }
}

/// Host-to-container port mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Host address to bind to
    pub host_ip: Option<String>,
    /// Port on the host
    pub host_port: u16,
    /// Port inside the container
    pub container_port: u16,
    /// Protocol
    pub protocol: Protocol,
}

impl PortMapping {
    /// Create a TCP mapping
    pub fn new(host_port: u16, container_port: u16) -> Self {
        Self {
            host_ip: None,
            host_port,
            container_port,
            protocol: Protocol::Tcp,
        }
    }

    /// `[ip:]host:container`, without the protocol suffix
    ///
    /// IPv6 addresses are bracketed so the colons stay unambiguous.
    pub fn binding(&self) -> String {
        match &self.host_ip {
            Some(ip) if ip.contains(':') => {
                format!("[{}]:{}:{}", ip, self.host_port, self.container_port)
            }
            Some(ip) => format!("{}:{}:{}", ip, self.host_port, self.container_port),
            None => format!("{}:{}", self.host_port, self.container_port),
        }
    }
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.binding(), self.protocol)
    }
}

/// Mount type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    /// Host path bind mount
    Bind,
    /// Named volume
    Volume,
}

impl std::fmt::Display for MountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountType::Bind => write!(f, "bind"),
            MountType::Volume => write!(f, "volume"),
        }
    }
}

/// Volume mount of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path or volume name
    pub source: String,
    /// Absolute path in the container
    pub target: String,
    /// Mount type
    pub mount_type: MountType,
    /// Suffix options such as `ro` or `z`
    pub options: BTreeSet<String>,
}

impl VolumeMount {
    /// Create a mount without options
    pub fn new(source: &str, target: &str, mount_type: MountType) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            mount_type,
            options: BTreeSet::new(),
        }
    }

    /// Add an option
    pub fn option(mut self, option: &str) -> Self {
        self.options.insert(option.to_string());
        self
    }

    /// Whether an SELinux relabel option is already present
    pub fn has_selinux_label(&self) -> bool {
        self.options.contains("z") || self.options.contains("Z")
    }

    /// Whether the mount is read-only
    pub fn is_read_only(&self) -> bool {
        self.options.contains("ro")
    }

    /// `source:target[:opt,opt]`
    pub fn short_syntax(&self) -> String {
        if self.options.is_empty() {
            format!("{}:{}", self.source, self.target)
        } else {
            let options: Vec<&str> = self.options.iter().map(String::as_str).collect();
            format!("{}:{}:{}", self.source, self.target, options.join(","))
        }
    }
}

/// Restart policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart
    No,
    /// Always restart
    Always,
    /// Restart unless explicitly stopped
    UnlessStopped,
    /// Restart on non-zero exit, optionally bounded
    OnFailure(Option<u32>),
}

impl RestartPolicy {
    /// Parse a compose restart token
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "no" | "false" => Some(RestartPolicy::No),
            "always" => Some(RestartPolicy::Always),
            "unless-stopped" => Some(RestartPolicy::UnlessStopped),
            "on-failure" => Some(RestartPolicy::OnFailure(None)),
            other => other
                .strip_prefix("on-failure:")
                .and_then(|n| n.parse().ok())
                .map(|n| RestartPolicy::OnFailure(Some(n))),
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::No => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::UnlessStopped => write!(f, "unless-stopped"),
            RestartPolicy::OnFailure(None) => write!(f, "on-failure"),
            RestartPolicy::OnFailure(Some(n)) => write!(f, "on-failure:{}", n),
        }
    }
}

/// Network mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// Share the host network namespace
    Host,
    /// No networking
    None,
    /// Default bridge
    Bridge,
    /// Join another service's network namespace
    Container(String),
}

impl NetworkMode {
    /// Parse a compose `network_mode` token
    ///
    /// `service:<name>` is accepted as an alias of `container:<name>` since
    /// every service becomes a container named after it.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "host" => Some(NetworkMode::Host),
            "none" => Some(NetworkMode::None),
            "bridge" => Some(NetworkMode::Bridge),
            other => other
                .strip_prefix("container:")
                .or_else(|| other.strip_prefix("service:"))
                .filter(|name| !name.is_empty())
                .map(|name| NetworkMode::Container(name.to_string())),
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkMode::Host => write!(f, "host"),
            NetworkMode::None => write!(f, "none"),
            NetworkMode::Bridge => write!(f, "bridge"),
            NetworkMode::Container(name) => write!(f, "container:{}", name),
        }
    }
}

/// Declared network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Network name
    pub name: String,
    /// Driver
    pub driver: String,
    /// Internal network (no external access)
    pub internal: bool,
    /// Managed outside the project
    pub external: bool,
    /// Subnet in CIDR notation
    pub subnet: Option<String>,
    /// Gateway address
    pub gateway: Option<String>,
}

impl Network {
    /// Create a bridge network
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: "bridge".to_string(),
            internal: false,
            external: false,
            subnet: None,
            gateway: None,
        }
    }
}

/// Declared volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Driver
    pub driver: String,
    /// Managed outside the project
    pub external: bool,
}

impl Volume {
    /// Create a local volume
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: "local".to_string(),
            external: false,
        }
    }
}
