//! Network mode validation.
//!
//! Pre: service names are unique. Post: every `container:<name>` mode
//! names another service of the document. Per-service `networks` lists
//! are left for the emitters.

use super::{Rewrite, Rule, RuleContext, RuleId};
use crate::compose::{Document, NetworkMode};
use crate::error::{Result, TranslateError};

/// Rejects network modes that join a namespace that does not exist
pub struct NetworkModeRule;

impl Rule for NetworkModeRule {
    fn id(&self) -> RuleId {
        RuleId("network-mode")
    }

    fn description(&self) -> &str {
        "Resolves container:<name> network modes against the document"
    }

    fn apply(&self, doc: Document, _ctx: &RuleContext<'_>) -> Result<Rewrite> {
        for service in &doc.services {
            if let Some(NetworkMode::Container(target)) = &service.network_mode {
                if target == &service.name {
                    return Err(TranslateError::UnresolvedReference(format!(
                        "service '{}' cannot join its own network namespace",
                        service.name
                    )));
                }
                if !doc.has_service(target) {
                    return Err(TranslateError::UnresolvedReference(format!(
                        "service '{}' uses network_mode 'container:{}' but no such service exists",
                        service.name, target
                    )));
                }
            }
        }

        Ok(Rewrite::clean(doc))
    }
}
