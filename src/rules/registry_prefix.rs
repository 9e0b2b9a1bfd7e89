//! Registry qualification of image references.
//!
//! Pre: none. Post: single-component images carry `docker.io/library/`.
//! Podman has no implicit Docker Hub default, so short names would go
//! through `unqualified-search-registries` resolution instead.

use super::{Rewrite, Rule, RuleContext, RuleId};
use crate::compose::Document;
use crate::diagnostics::Diagnostics;
use crate::error::Result;

const DOCKER_HUB_LIBRARY: &str = "docker.io/library/";

/// Qualifies official Docker Hub images with their registry
pub struct RegistryPrefixRule;

/// How an image reference is qualified
#[derive(Debug, PartialEq, Eq)]
enum Reference {
    /// Registry host present, or already docker.io
    Qualified,
    /// `user/repo` without a registry host
    Namespaced,
    /// Bare official image name such as `nginx:latest`
    Official,
}

fn classify(image: &str) -> Reference {
    if image.starts_with("docker.io/") {
        return Reference::Qualified;
    }
    match image.split_once('/') {
        None => Reference::Official,
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            Reference::Qualified
        }
        Some(_) => Reference::Namespaced,
    }
}

impl Rule for RegistryPrefixRule {
    fn id(&self) -> RuleId {
        RuleId("registry-prefix")
    }

    fn description(&self) -> &str {
        "Prefixes official Docker Hub images with docker.io/library/"
    }

    fn apply(&self, mut doc: Document, _ctx: &RuleContext<'_>) -> Result<Rewrite> {
        let mut diagnostics = Diagnostics::new();

        for service in &mut doc.services {
            match classify(&service.image) {
                Reference::Official => {
                    service.image = format!("{}{}", DOCKER_HUB_LIBRARY, service.image);
                }
                Reference::Namespaced => diagnostics.warn(format!(
                    "service '{}': image '{}' names no registry and is left as written; Podman resolves it through unqualified-search-registries",
                    service.name, service.image
                )),
                Reference::Qualified => {}
            }
        }

        Ok(Rewrite {
            document: doc,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Service;
    use crate::emit::Format;
    use crate::options::TranslateOptions;

    fn qualify(image: &str) -> (String, usize) {
        let options = TranslateOptions::default();
        let ctx = RuleContext {
            format: Format::Quadlet,
            options: &options,
        };
        let doc = Document {
            services: vec![Service::new("svc", image)],
            ..Default::default()
        };
        let rewrite = RegistryPrefixRule.apply(doc, &ctx).unwrap();
        (
            rewrite.document.services[0].image.clone(),
            rewrite.diagnostics.len(),
        )
    }

    #[test]
    fn test_prefixes_official_images() {
        assert_eq!(qualify("nginx:latest").0, "docker.io/library/nginx:latest");
        assert_eq!(qualify("redis").0, "docker.io/library/redis");
        assert_eq!(
            qualify("alpine@sha256:abc").0,
            "docker.io/library/alpine@sha256:abc"
        );
    }

    #[test]
    fn test_leaves_qualified_images() {
        for image in [
            "ghcr.io/acme/app:1",
            "docker.io/library/nginx:latest",
            "docker.io/acme/app",
            "localhost/app",
            "registry:5000/app",
        ] {
            assert_eq!(qualify(image), (image.to_string(), 0));
        }
    }

    #[test]
    fn test_warns_on_namespaced_images() {
        assert_eq!(qualify("acme/app:2"), ("acme/app:2".to_string(), 1));
    }
}
