//! SELinux relabeling of bind mounts.
//!
//! Pre: runs after the docker-socket rule so the Podman socket mount is
//! labeled under its final path. Post: every bind mount carries `z` or `Z`.

use super::{Rewrite, Rule, RuleContext, RuleId};
use crate::compose::{Document, MountType};
use crate::error::Result;

/// Adds the configured relabel option to unlabeled bind mounts
pub struct SelinuxLabelRule;

impl Rule for SelinuxLabelRule {
    fn id(&self) -> RuleId {
        RuleId("selinux-labels")
    }

    fn description(&self) -> &str {
        "Appends an SELinux relabel option to bind mounts"
    }

    fn apply(&self, mut doc: Document, ctx: &RuleContext<'_>) -> Result<Rewrite> {
        let label = ctx.options.selinux_label.option();

        for service in &mut doc.services {
            for mount in &mut service.volume_mounts {
                if mount.mount_type == MountType::Bind && !mount.has_selinux_label() {
                    mount.options.insert(label.to_string());
                }
            }
        }

        Ok(Rewrite::clean(doc))
    }
}
