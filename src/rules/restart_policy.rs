//! Restart policy normalization.
//!
//! Pre: none. Post: the policy of every service is expressible in the
//! target format.

use super::{Rewrite, Rule, RuleContext, RuleId};
use crate::compose::{Document, RestartPolicy};
use crate::diagnostics::Diagnostics;
use crate::error::Result;

/// Downgrades restart policies the target cannot express
pub struct RestartPolicyRule;

impl Rule for RestartPolicyRule {
    fn id(&self) -> RuleId {
        RuleId("restart-policy")
    }

    fn description(&self) -> &str {
        "Normalizes restart policies for the target format"
    }

    fn apply(&self, mut doc: Document, ctx: &RuleContext<'_>) -> Result<Rewrite> {
        let mut diagnostics = Diagnostics::new();

        for service in &mut doc.services {
            match service.restart {
                Some(RestartPolicy::OnFailure(Some(retries)))
                    if !ctx.format.supports_restart_retry_count() =>
                {
                    service.restart = Some(RestartPolicy::OnFailure(None));
                    diagnostics.warn(format!(
                        "service '{}': retry count {} not representable in {} format, dropped",
                        service.name, retries, ctx.format
                    ));
                }
                Some(RestartPolicy::UnlessStopped) if !ctx.format.supports_unless_stopped() => {
                    service.restart = Some(RestartPolicy::Always);
                    diagnostics.warn(format!(
                        "service '{}': restart policy 'unless-stopped' not representable in {} format, using 'always'",
                        service.name, ctx.format
                    ));
                }
                _ => {}
            }
        }

        Ok(Rewrite {
            document: doc,
            diagnostics,
        })
    }
}
