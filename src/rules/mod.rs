//! Transformation rules
//!
//! Rules rewrite a [`Document`] into something Podman understands. Each rule
//! takes the document by value and hands back the rewritten one together
//! with its own diagnostics, so no rule observes another's edits except
//! through the returned value.
//!
//! The order in [`RuleEngine::with_builtins`] is part of the contract:
//!
//! 1. [`DockerSocketRule`]
//! 2. [`RegistryPrefixRule`]
//! 3. [`SelinuxLabelRule`] - sees the rewritten socket path from (1)
//! 4. [`RestartPolicyRule`]
//! 5. [`NetworkModeRule`]

mod docker_socket;
mod network_mode;
mod registry_prefix;
mod restart_policy;
mod selinux_labels;

pub use docker_socket::{DockerSocketRule, DOCKER_SOCKET, PODMAN_SOCKET};
pub use network_mode::NetworkModeRule;
pub use registry_prefix::RegistryPrefixRule;
pub use restart_policy::RestartPolicyRule;
pub use selinux_labels::SelinuxLabelRule;

use crate::compose::Document;
use crate::diagnostics::Diagnostics;
use crate::emit::Format;
use crate::error::{Failure, Result};
use crate::options::TranslateOptions;

/// Unique identifier for a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub &'static str);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a rule may consult besides the document
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Target format of the translation
    pub format: Format,
    /// Caller options
    pub options: &'a TranslateOptions,
}

/// Output of a single rule
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// Rewritten document
    pub document: Document,
    /// Diagnostics raised by the rule
    pub diagnostics: Diagnostics,
}

impl Rewrite {
    /// Rewrite with no diagnostics
    pub fn clean(document: Document) -> Self {
        Self {
            document,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// A pure document rewrite
///
/// Implementations must be idempotent: applying a rule to its own output
/// changes nothing.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule
    fn id(&self) -> RuleId;

    /// Description of what this rule rewrites
    fn description(&self) -> &str;

    /// Rewrite the document; an error stops the pipeline
    fn apply(&self, doc: Document, ctx: &RuleContext<'_>) -> Result<Rewrite>;
}

/// Ordered list of rules
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Create an engine without rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine with the built-in rules in their fixed order
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(DockerSocketRule));
        engine.register(Box::new(RegistryPrefixRule));
        engine.register(Box::new(SelinuxLabelRule));
        engine.register(Box::new(RestartPolicyRule));
        engine.register(Box::new(NetworkModeRule));
        engine
    }

    /// Append a rule; it runs after every rule registered before it
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Iterate over the rules in application order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Apply every rule in order
    ///
    /// Warnings never stop the run. The first error does, and is returned
    /// together with the warnings gathered up to that point.
    pub fn run(&self, doc: Document, ctx: &RuleContext<'_>) -> Result<Rewrite, Failure> {
        let mut document = doc;
        let mut diagnostics = Diagnostics::new();

        for rule in &self.rules {
            match rule.apply(document, ctx) {
                Ok(rewrite) => {
                    tracing::trace!(
                        rule = %rule.id(),
                        diagnostics = rewrite.diagnostics.len(),
                        "rule applied"
                    );
                    diagnostics.extend(rewrite.diagnostics);
                    document = rewrite.document;
                }
                Err(error) => {
                    tracing::debug!(rule = %rule.id(), %error, "rule failed");
                    return Err(Failure::new(error).with_warnings(diagnostics.warnings()));
                }
            }
        }

        Ok(Rewrite {
            document,
            diagnostics,
        })
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposeParser;

    const MANIFEST: &str = r#"
services:
  web:
    image: nginx:latest
    restart: unless-stopped
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
      - ./html:/usr/share/nginx/html:ro
  worker:
    image: acme/worker
    restart: on-failure:5
    network_mode: "container:web"
"#;

    fn run(format: Format) -> Result<Rewrite, Failure> {
        let doc = ComposeParser::parse_str(MANIFEST).unwrap().document;
        let options = TranslateOptions::default();
        let ctx = RuleContext {
            format,
            options: &options,
        };
        RuleEngine::with_builtins().run(doc, &ctx)
    }

    #[test]
    fn test_builtin_order() {
        let engine = RuleEngine::with_builtins();
        let ids: Vec<String> = engine.iter().map(|rule| rule.id().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "docker-socket",
                "registry-prefix",
                "selinux-labels",
                "restart-policy",
                "network-mode"
            ]
        );
        assert!(engine.iter().all(|rule| !rule.description().is_empty()));
    }

    #[test]
    fn test_engine_is_idempotent() {
        for format in Format::ALL {
            let options = TranslateOptions::default();
            let ctx = RuleContext {
                format,
                options: &options,
            };
            let engine = RuleEngine::with_builtins();
            let once = run(format).unwrap().document;
            let twice = engine.run(once.clone(), &ctx).unwrap().document;
            assert_eq!(once, twice, "rules not idempotent for {}", format);
        }
    }

    #[test]
    fn test_socket_rewrite_is_labeled() {
        let doc = run(Format::Quadlet).unwrap().document;
        let socket = &doc.services[0].volume_mounts[0];
        assert_eq!(socket.source, PODMAN_SOCKET);
        assert!(socket.options.contains("z"));
    }

    #[test]
    fn test_fatal_rule_keeps_earlier_warnings() {
        let yaml = r#"
services:
  app:
    image: app
    restart: on-failure:2
    network_mode: "container:ghost"
"#;
        let doc = ComposeParser::parse_str(yaml).unwrap().document;
        let options = TranslateOptions::default();
        let ctx = RuleContext {
            format: Format::Kube,
            options: &options,
        };

        let failure = RuleEngine::with_builtins().run(doc, &ctx).unwrap_err();
        assert!(failure.to_string().contains("ghost"));
        assert!(failure.warnings.iter().any(|w| w.contains("retry count 2")));
    }
}
