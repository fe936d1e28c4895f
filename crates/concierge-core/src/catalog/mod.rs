//! Domain catalog: the fixed set of support domains, their default model
//! sources, and the per-domain load status tracked by the registry.

mod domain;
mod spec;

pub use domain::{parse_domain, Domain, ParseDomainError};
pub use spec::{ModelSpec, ModelStatus};
