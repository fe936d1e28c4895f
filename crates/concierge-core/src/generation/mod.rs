//! Decoding: the fixed generation contract and the beam search that runs it.

mod beam;
mod config;
mod ngram;

pub use beam::{beam_search, BeamOutput};
pub use config::DecodingConfig;
pub use ngram::{banned_next_tokens, has_repeated_ngram};
