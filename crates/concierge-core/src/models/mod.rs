//! Model seams and native implementations.
//!
//! The registry and the dispatch service only see the traits defined here:
//! a [`TextCodec`] turning text into token ids and back, a [`Seq2SeqModel`]
//! producing next-token logits, and a [`ModelSource`] that materializes both
//! from an opaque source identifier.

pub mod source;
pub mod t5;

use std::sync::{Mutex, MutexGuard};

use candle_core::Tensor;

use crate::catalog::ModelSpec;
use crate::device::{ComputeTarget, DeviceProfile};
use crate::error::{Error, Result};

pub use source::{HubModelSource, ModelFiles, WeightsFormat};
pub use t5::T5Generator;

/// Text ↔ token-id codec.
pub trait TextCodec: Send + Sync {
    /// Encode `text`, keeping at most `max_tokens` ids. Over-long input is
    /// cut silently; special tokens appended by the codec are kept.
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>>;

    /// Decode ids to display text, dropping special tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Token ids that drive the decoder loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderTokens {
    pub decoder_start: u32,
    pub eos: u32,
}

/// Encoder-decoder model capable of conditional generation.
pub trait Seq2SeqModel: Send {
    fn decoder_tokens(&self) -> DecoderTokens;

    /// Run the encoder over one input sequence.
    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor>;

    /// Logits for the token following each prefix, shape `(prefixes.len(), vocab)`.
    /// All prefixes have the same length.
    fn next_token_logits(&mut self, encoder_output: &Tensor, prefixes: &[Vec<u32>])
        -> Result<Tensor>;
}

/// Resources attached to a registry entry whose status is `Loaded`.
pub struct LoadedModel {
    tokenizer: Box<dyn TextCodec>,
    generator: Mutex<Box<dyn Seq2SeqModel>>,
    compute_target: ComputeTarget,
}

impl LoadedModel {
    pub fn new(
        tokenizer: Box<dyn TextCodec>,
        generator: Box<dyn Seq2SeqModel>,
        compute_target: ComputeTarget,
    ) -> Self {
        Self {
            tokenizer,
            generator: Mutex::new(generator),
            compute_target,
        }
    }

    pub fn tokenizer(&self) -> &dyn TextCodec {
        self.tokenizer.as_ref()
    }

    pub fn compute_target(&self) -> ComputeTarget {
        self.compute_target
    }

    /// Exclusive access to the generator. Generation on one model is
    /// serialized; different models run independently.
    pub fn lock_generator(&self) -> Result<MutexGuard<'_, Box<dyn Seq2SeqModel>>> {
        self.generator
            .lock()
            .map_err(|_| Error::InferenceError("Generator lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("compute_target", &self.compute_target)
            .finish_non_exhaustive()
    }
}

/// Materializes tokenizer and generator for a model spec.
pub trait ModelSource: Send + Sync {
    fn load(&self, spec: &ModelSpec, device: &DeviceProfile) -> Result<LoadedModel>;
}
