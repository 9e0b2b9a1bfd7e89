//! Docker Compose input
//!
//! Raw compose syntax, the canonical document model and the parser that
//! connects them.

pub mod config;
pub mod document;
pub mod parser;

pub use document::{
    Document, MountType, Network, NetworkMode, PortMapping, Protocol, RestartPolicy, Service,
    Volume, VolumeMount, DEFAULT_NETWORK,
};
pub use parser::{ComposeParser, Parsed};
