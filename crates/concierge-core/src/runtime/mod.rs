//! Request dispatch: domain key to loaded model to generated text.

mod service;
mod types;

pub use service::GenerationService;
pub use types::{GenerationRequest, GenerationResult};
