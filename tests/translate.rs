//! End-to-end translation behavior

use podshift::compose::ComposeParser;
use podshift::rules::{RuleContext, RuleEngine};
use podshift::{translate, Format, TranslateError, TranslateOptions};
use serde::Deserialize;
use serde_yaml::Value;

#[test]
fn test_compose_output_reparses_to_same_service() {
    let input = r#"
services:
  web:
    image: docker.io/library/nginx:1.25
    ports:
      - "8080:80"
"#;
    let translation = translate(input, "podman-compose").unwrap();
    assert!(translation.errors.is_empty());

    let original = ComposeParser::parse_str(input).unwrap().document;
    let reparsed = ComposeParser::parse_str(translation.output.as_deref().unwrap())
        .unwrap()
        .document;

    let (before, after) = (&original.services[0], &reparsed.services[0]);
    assert_eq!(after.name, "web");
    assert_eq!(after.image, before.image);
    assert_eq!(after.ports, before.ports);
}

#[test]
fn test_rules_are_idempotent() {
    let input = r#"
services:
  app:
    image: redis
    restart: unless-stopped
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
      - ./data:/data
"#;
    let engine = RuleEngine::with_builtins();
    let options = TranslateOptions::default();

    for format in Format::ALL {
        let ctx = RuleContext {
            format,
            options: &options,
        };
        let doc = ComposeParser::parse_str(input).unwrap().document;
        let once = engine.run(doc, &ctx).unwrap().document;
        let twice = engine.run(once.clone(), &ctx).unwrap().document;
        assert_eq!(once, twice, "rules not idempotent for {}", format);
    }
}

#[test]
fn test_missing_image_is_fatal() {
    let input = r#"
services:
  web:
    ports: ["80:80"]
"#;
    for format in Format::ALL {
        let failure = translate(input, &format.to_string()).unwrap_err();
        assert!(matches!(failure.error, TranslateError::ComposeParse(_)));
        assert!(failure.error.to_string().contains("web"));
    }
}

#[test]
fn test_docker_socket_rewritten_for_every_format() {
    let input = r#"
services:
  agent:
    image: portainer/agent:2.19
    volumes:
      - /var/run/docker.sock:/var/run/docker.sock
"#;
    for format in Format::ALL {
        let translation = translate(input, &format.to_string()).unwrap();
        let output = translation.output.unwrap();
        assert!(output.contains("/run/podman/podman.sock"), "{}: {}", format, output);
        assert!(
            translation.warnings.iter().any(|w| w.contains("podman.sock")),
            "{}: no socket warning",
            format
        );
    }
}

#[test]
fn test_registry_prefix() {
    let input = r#"
services:
  web:
    image: nginx:latest
  app:
    image: ghcr.io/acme/app:1
"#;
    let translation = translate(input, "podman-compose").unwrap();
    let output: Value = serde_yaml::from_str(translation.output.as_deref().unwrap()).unwrap();
    assert_eq!(
        output["services"]["web"]["image"].as_str(),
        Some("docker.io/library/nginx:latest")
    );
    assert_eq!(
        output["services"]["app"]["image"].as_str(),
        Some("ghcr.io/acme/app:1")
    );
}

#[test]
fn test_kube_collapses_into_one_pod() {
    let input = r#"
networks:
  front: {}
  back: {}
services:
  web:
    image: docker.io/library/nginx
    networks: [front]
  db:
    image: docker.io/library/postgres
    networks: [back]
"#;
    let translation = translate(input, "kube").unwrap();
    assert!(translation.warnings.iter().any(|w| w.contains("network")));

    let documents: Vec<Value> = serde_yaml::Deserializer::from_str(
        translation.output.as_deref().unwrap(),
    )
    .map(|doc| Value::deserialize(doc).unwrap())
    .collect();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["kind"].as_str(), Some("Pod"));
    assert_eq!(
        documents[0]["spec"]["containers"].as_sequence().unwrap().len(),
        2
    );
}

#[test]
fn test_unknown_format_fails_before_parsing() {
    let failure = translate("services: [unclosed", "docker-swarm").unwrap_err();
    assert_eq!(
        failure.error,
        TranslateError::UnsupportedFormat("docker-swarm".to_string())
    );
    assert!(failure.warnings.is_empty());
}
