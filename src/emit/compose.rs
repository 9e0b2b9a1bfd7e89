//! Podman Compose emitter
//!
//! Writes the document back as compose YAML. The document model is itself
//! compose-shaped, so nothing is lost here beyond what the parser already
//! reported.

use super::Emission;
use crate::compose::{Document, Network, Protocol, Service, Volume};
use crate::diagnostics::Diagnostics;
use crate::options::TranslateOptions;
use serde::Serialize;
use std::collections::BTreeMap;

/// File name podman-compose picks up by default
pub const COMPOSE_FILE_NAME: &str = "compose.yaml";

#[derive(Serialize)]
struct ComposeFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    services: serde_yaml::Mapping,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    networks: BTreeMap<&'a str, NetworkEntry<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<&'a str, VolumeEntry<'a>>,
}

#[derive(Serialize)]
struct ServiceEntry<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entrypoint: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "is_empty_map")]
    environment: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_mode: Option<String>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    networks: &'a [String],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    privileged: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    depends_on: &'a [String],
    #[serde(skip_serializing_if = "is_empty_map")]
    labels: &'a BTreeMap<String, String>,
}

fn is_empty_map(map: &&BTreeMap<String, String>) -> bool {
    map.is_empty()
}

impl<'a> ServiceEntry<'a> {
    fn new(service: &'a Service) -> Self {
        Self {
            image: &service.image,
            entrypoint: service.entrypoint.as_deref(),
            command: service.command.as_deref(),
            ports: service
                .ports
                .iter()
                .map(|p| match p.protocol {
                    Protocol::Tcp => p.binding(),
                    Protocol::Udp => p.to_string(),
                })
                .collect(),
            volumes: service
                .volume_mounts
                .iter()
                .map(|m| m.short_syntax())
                .collect(),
            environment: &service.environment,
            restart: service.restart.map(|r| r.to_string()),
            network_mode: service.network_mode.as_ref().map(|m| m.to_string()),
            networks: &service.networks,
            privileged: service.privileged,
            depends_on: &service.depends_on,
            labels: &service.labels,
        }
    }
}

#[derive(Serialize)]
struct NetworkEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    driver: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    internal: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipam: Option<Ipam<'a>>,
}

#[derive(Serialize)]
struct Ipam<'a> {
    config: Vec<IpamPool<'a>>,
}

#[derive(Serialize)]
struct IpamPool<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    subnet: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<&'a str>,
}

impl<'a> NetworkEntry<'a> {
    fn new(key: &str, network: &'a Network) -> Self {
        let ipam = (network.subnet.is_some() || network.gateway.is_some()).then(|| Ipam {
            config: vec![IpamPool {
                subnet: network.subnet.as_deref(),
                gateway: network.gateway.as_deref(),
            }],
        });
        Self {
            name: (network.name != key).then_some(network.name.as_str()),
            driver: &network.driver,
            internal: network.internal,
            external: network.external,
            ipam,
        }
    }
}

#[derive(Serialize)]
struct VolumeEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    driver: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    external: bool,
}

impl<'a> VolumeEntry<'a> {
    fn new(key: &str, volume: &'a Volume) -> Self {
        Self {
            name: (volume.name != key).then_some(volume.name.as_str()),
            driver: &volume.driver,
            external: volume.external,
        }
    }
}

/// Render the document as compose YAML
pub fn emit(doc: &Document, _options: &TranslateOptions) -> Emission {
    let mut diagnostics = Diagnostics::new();

    let mut services = serde_yaml::Mapping::new();
    for service in &doc.services {
        match serde_yaml::to_value(ServiceEntry::new(service)) {
            Ok(value) => {
                services.insert(serde_yaml::Value::String(service.name.clone()), value);
            }
            Err(e) => diagnostics.error(format!(
                "service '{}' could not be serialized: {}",
                service.name, e
            )),
        }
    }

    let file = ComposeFile {
        version: doc.version.as_deref(),
        name: doc.name.as_deref(),
        services,
        networks: doc
            .networks
            .iter()
            .map(|(key, n)| (key.as_str(), NetworkEntry::new(key, n)))
            .collect(),
        volumes: doc
            .volumes
            .iter()
            .map(|(key, v)| (key.as_str(), VolumeEntry::new(key, v)))
            .collect(),
    };

    let output = serde_yaml::to_string(&file).unwrap_or_else(|e| {
        diagnostics.error(format!("compose file could not be serialized: {}", e));
        String::new()
    });

    Emission::single(COMPOSE_FILE_NAME, output, diagnostics)
}
