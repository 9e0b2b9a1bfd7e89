//! podshift - translate Docker Compose manifests for Podman
//!
//! A compose document goes through a fixed pipeline:
//!
//! - **Parse** into a canonical [`compose::Document`]
//! - **Transform** with an ordered list of [`rules`]
//! - **Emit** one of three targets: Podman Compose YAML, systemd Quadlet
//!   units or a Kubernetes Pod manifest for `podman kube play`
//!
//! Everything that cannot be carried over is reported as a warning or an
//! error in the resulting [`Translation`]; nothing is dropped silently.
//! The engine does no I/O and keeps no state between calls.

pub mod compose;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod options;
pub mod rules;
pub mod translator;

pub use emit::Format;
pub use error::{Failure, Result, TranslateError};
pub use options::{SelinuxLabel, TranslateOptions};
pub use translator::{parse, translate, validate, Translation, Translator, Validation};
