//! Docker socket rewrite.
//!
//! Pre: none. Post: no mount sources `/var/run/docker.sock`.

use super::{Rewrite, Rule, RuleContext, RuleId};
use crate::compose::Document;
use crate::diagnostics::Diagnostics;
use crate::error::Result;

/// Docker daemon socket path
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Rootful Podman API socket path
pub const PODMAN_SOCKET: &str = "/run/podman/podman.sock";

/// Points Docker socket mounts at the Podman API socket
pub struct DockerSocketRule;

impl Rule for DockerSocketRule {
    fn id(&self) -> RuleId {
        RuleId("docker-socket")
    }

    fn description(&self) -> &str {
        "Rewrites Docker socket mounts to the Podman socket"
    }

    fn apply(&self, mut doc: Document, _ctx: &RuleContext<'_>) -> Result<Rewrite> {
        let mut diagnostics = Diagnostics::new();

        for service in &mut doc.services {
            for mount in &mut service.volume_mounts {
                if mount.source == DOCKER_SOCKET {
                    mount.source = PODMAN_SOCKET.to_string();
                    diagnostics.warn(format!(
                        "service '{}': Docker socket mount rewritten to {} (rootless Podman uses $XDG_RUNTIME_DIR/podman/podman.sock)",
                        service.name, PODMAN_SOCKET
                    ));
                }
            }
        }

        Ok(Rewrite {
            document: doc,
            diagnostics,
        })
    }
}
