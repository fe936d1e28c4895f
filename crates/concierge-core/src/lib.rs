//! Concierge core: domain model registry, dispatch and decoding.
//!
//! One encoder-decoder model is loaded per support domain at startup. The
//! [`GenerationService`] resolves a domain key against the frozen
//! [`ModelRegistry`] and runs beam search with the fixed
//! [`DecodingConfig`].

pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod generation;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod tokenizer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{parse_domain, Domain, ModelSpec, ModelStatus, ParseDomainError};
pub use config::{EngineConfig, ServerConfig};
pub use device::{ComputeTarget, DeviceKind, DeviceProfile, DeviceSelector};
pub use error::{Error, Result};
pub use generation::DecodingConfig;
pub use models::{HubModelSource, LoadedModel, ModelSource};
pub use registry::{ModelRegistry, RegistryReport};
pub use runtime::{GenerationRequest, GenerationResult, GenerationService};
