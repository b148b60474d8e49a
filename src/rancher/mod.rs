// ABOUTME: Rancher control-plane integration for negotiating an execute session
// Resolves a container pattern to one container and exchanges it for a dialable URL

pub mod client;
pub mod error;
pub mod models;
pub mod operator;
pub mod resolver;

pub use client::RancherClient;
pub use error::ResolveError;
pub use models::{ContainerCandidate, Credentials, ExecRequest, ExecutionGrant, TerminalGeometry};
pub use operator::{Operator, StdioOperator};
pub use resolver::SessionResolver;
