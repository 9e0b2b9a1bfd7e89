//! Output formats
//!
//! Each target is a variant of [`Format`]; dispatch happens in one `match`
//! so adding a target is checked by the compiler.

pub mod compose;
pub mod kube;
pub mod quadlet;

use crate::compose::Document;
use crate::diagnostics::Diagnostics;
use crate::error::TranslateError;
use crate::options::TranslateOptions;
use serde::{Deserialize, Serialize};

/// Translation target
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// Compose YAML for podman-compose
    #[default]
    PodmanCompose,
    /// systemd Quadlet unit files
    Quadlet,
    /// Kubernetes Pod manifest for `podman kube play`
    Kube,
}

impl Format {
    /// Every supported format
    pub const ALL: [Format; 3] = [Format::PodmanCompose, Format::Quadlet, Format::Kube];

    /// Parse an optional selector, defaulting to podman-compose
    pub fn from_selector(selector: Option<&str>) -> Result<Self, TranslateError> {
        selector.map_or(Ok(Format::default()), str::parse)
    }

    /// Whether `on-failure:N` keeps its retry count
    pub fn supports_restart_retry_count(&self) -> bool {
        matches!(self, Format::PodmanCompose)
    }

    /// Whether `unless-stopped` has a direct equivalent
    pub fn supports_unless_stopped(&self) -> bool {
        matches!(self, Format::PodmanCompose)
    }

    /// Serialize a transformed document
    pub fn emit(&self, doc: &Document, options: &TranslateOptions) -> Emission {
        tracing::debug!(format = %self, "emitting");
        match self {
            Format::PodmanCompose => compose::emit(doc, options),
            Format::Quadlet => quadlet::emit(doc, options),
            Format::Kube => kube::emit(doc, options),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::PodmanCompose => write!(f, "podman-compose"),
            Format::Quadlet => write!(f, "quadlet"),
            Format::Kube => write!(f, "kube"),
        }
    }
}

impl std::str::FromStr for Format {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "podman-compose" => Ok(Format::PodmanCompose),
            "quadlet" => Ok(Format::Quadlet),
            "kube" => Ok(Format::Kube),
            other => Err(TranslateError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A file produced by an emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Suggested file name
    pub file_name: String,
    /// File contents
    pub contents: String,
}

/// Emitter result
#[derive(Debug, Clone, Default)]
pub struct Emission {
    /// Combined artifact text
    pub output: String,
    /// The artifact split into the files a deployment would use
    pub files: Vec<OutputFile>,
    /// Representability diagnostics
    pub diagnostics: Diagnostics,
}

impl Emission {
    /// Emission consisting of a single file
    pub fn single(file_name: &str, contents: String, diagnostics: Diagnostics) -> Self {
        Self {
            output: contents.clone(),
            files: vec![OutputFile {
                file_name: file_name.to_string(),
                contents,
            }],
            diagnostics,
        }
    }
}

/// Reduce a name to a DNS-1123 label (lowercase alphanumerics and '-', at most 63 chars)
pub fn dns_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    let label: String = label.trim_matches('-').chars().take(63).collect();
    let label = label.trim_end_matches('-').to_string();
    if label.is_empty() {
        "x".to_string()
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trips_through_str() {
        for format in Format::ALL {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(
            "docker-swarm".parse::<Format>(),
            Err(TranslateError::UnsupportedFormat("docker-swarm".to_string()))
        );
    }

    #[test]
    fn test_default_selector() {
        assert_eq!(Format::from_selector(None).unwrap(), Format::PodmanCompose);
        assert_eq!(Format::from_selector(Some("kube")).unwrap(), Format::Kube);
    }

    #[test]
    fn test_dns_label() {
        assert_eq!(dns_label("My_Service"), "my-service");
        assert_eq!(dns_label("/var/run/podman.sock"), "var-run-podman-sock");
        assert_eq!(dns_label("___"), "x");
        assert_eq!(dns_label(&"a".repeat(80)).len(), 63);
    }
}
