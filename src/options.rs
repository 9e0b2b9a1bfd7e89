//! Translation options

use crate::compose::Document;
use serde::{Deserialize, Serialize};

/// Project name used when neither the caller nor the compose file names one
pub const DEFAULT_PROJECT_NAME: &str = "compose";

/// SELinux relabel policy for bind mounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelinuxLabel {
    /// `:z`, the host path may be shared between containers
    #[default]
    Shared,
    /// `:Z`, the host path is private to one container
    Private,
}

impl SelinuxLabel {
    /// Mount option appended to bind mounts
    pub fn option(&self) -> &'static str {
        match self {
            SelinuxLabel::Shared => "z",
            SelinuxLabel::Private => "Z",
        }
    }
}

/// Caller-controlled translation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Overrides the compose `name`; used for the Pod name and unit descriptions
    pub project_name: Option<String>,
    /// Label appended by the SELinux rule
    pub selinux_label: SelinuxLabel,
}

impl TranslateOptions {
    /// Set the project name
    pub fn project_name(mut self, name: &str) -> Self {
        self.project_name = Some(name.to_string());
        self
    }

    /// Set the SELinux label policy
    pub fn selinux_label(mut self, label: SelinuxLabel) -> Self {
        self.selinux_label = label;
        self
    }

    /// Effective project name for a document
    pub fn project_for(&self, doc: &Document) -> String {
        self.project_name
            .as_deref()
            .or(doc.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_PROJECT_NAME)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_precedence() {
        let mut doc = Document::default();
        assert_eq!(TranslateOptions::default().project_for(&doc), "compose");

        doc.name = Some("shop".to_string());
        assert_eq!(TranslateOptions::default().project_for(&doc), "shop");

        let options = TranslateOptions::default().project_name("override");
        assert_eq!(options.project_for(&doc), "override");
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: TranslateOptions = serde_json::from_str(r#"{"selinux_label":"private"}"#).unwrap();
        assert_eq!(options.selinux_label, SelinuxLabel::Private);
        assert_eq!(options.project_name, None);
        assert_eq!(SelinuxLabel::default().option(), "z");
    }
}
