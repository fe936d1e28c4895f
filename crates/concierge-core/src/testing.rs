//! Deterministic fakes for registry, service and decoding tests.

use std::collections::HashSet;

use candle_core::{DType, Device, Tensor};

use crate::catalog::{Domain, ModelSpec};
use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::models::{DecoderTokens, LoadedModel, ModelSource, Seq2SeqModel, TextCodec};

pub const PAD: u32 = 0;
pub const EOS: u32 = 1;
const BYTE_OFFSET: u32 = 3;
const VOCAB: usize = 256 + BYTE_OFFSET as usize;

/// Byte-level codec: each byte maps to `byte + 3`, `</s>` is appended.
pub struct ByteCodec;

impl TextCodec for ByteCodec {
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = text.bytes().map(|b| b as u32 + BYTE_OFFSET).collect();
        ids.truncate(max_tokens.saturating_sub(1));
        ids.push(EOS);
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let bytes: Vec<u8> = ids
            .iter()
            .filter(|id| **id >= BYTE_OFFSET)
            .map(|id| (id - BYTE_OFFSET) as u8)
            .collect();
        String::from_utf8(bytes).map_err(|e| Error::TokenizationError(e.to_string()))
    }
}

fn cpu_tensor(rows: Vec<f32>, batch: usize) -> Result<Tensor> {
    Ok(Tensor::from_vec(rows, (batch, VOCAB), &Device::Cpu)?)
}

/// Copies its encoder input: position `i` of the decoder strongly prefers
/// input token `i`, then `</s>` once the input is exhausted.
pub struct EchoModel {
    input: Vec<u32>,
}

impl EchoModel {
    pub fn new() -> Self {
        Self { input: Vec::new() }
    }
}

impl Default for EchoModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Seq2SeqModel for EchoModel {
    fn decoder_tokens(&self) -> DecoderTokens {
        DecoderTokens {
            decoder_start: PAD,
            eos: EOS,
        }
    }

    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor> {
        self.input = input_ids.to_vec();
        Ok(Tensor::zeros((1, input_ids.len().max(1), 4), DType::F32, &Device::Cpu)?)
    }

    fn next_token_logits(
        &mut self,
        _encoder_output: &Tensor,
        prefixes: &[Vec<u32>],
    ) -> Result<Tensor> {
        let mut rows = vec![0f32; prefixes.len() * VOCAB];
        for (i, prefix) in prefixes.iter().enumerate() {
            let position = prefix.len() - 1;
            let target = self.input.get(position).copied().unwrap_or(EOS);
            let row = &mut rows[i * VOCAB..(i + 1) * VOCAB];
            // `</s>` stays unlikely until the input is used up.
            row[EOS as usize] = -100.0;
            row[target as usize] = 10.0;
        }
        cpu_tensor(rows, prefixes.len())
    }
}

/// Always prefers token 5, then 6, then low ids; `</s>` is never likely.
pub struct LoopModel {
    vocab: usize,
}

impl LoopModel {
    pub fn new(vocab: usize) -> Self {
        Self {
            vocab: vocab.min(VOCAB),
        }
    }
}

impl Seq2SeqModel for LoopModel {
    fn decoder_tokens(&self) -> DecoderTokens {
        DecoderTokens {
            decoder_start: PAD,
            eos: EOS,
        }
    }

    fn encode(&mut self, _input_ids: &[u32]) -> Result<Tensor> {
        Ok(Tensor::zeros((1, 1, 4), DType::F32, &Device::Cpu)?)
    }

    fn next_token_logits(
        &mut self,
        _encoder_output: &Tensor,
        prefixes: &[Vec<u32>],
    ) -> Result<Tensor> {
        let mut row = vec![-1000f32; VOCAB];
        for (token, logit) in row.iter_mut().enumerate().take(self.vocab) {
            *logit = -(token as f32) * 0.01;
        }
        row[5] = 10.0;
        row[6] = 9.0;
        row[EOS as usize] = -100.0;
        cpu_tensor(row.repeat(prefixes.len()), prefixes.len())
    }
}

/// Encodes fine, fails on the first decoder step.
pub struct FailingModel;

impl Seq2SeqModel for FailingModel {
    fn decoder_tokens(&self) -> DecoderTokens {
        DecoderTokens {
            decoder_start: PAD,
            eos: EOS,
        }
    }

    fn encode(&mut self, _input_ids: &[u32]) -> Result<Tensor> {
        Ok(Tensor::zeros((1, 1, 4), DType::F32, &Device::Cpu)?)
    }

    fn next_token_logits(
        &mut self,
        _encoder_output: &Tensor,
        _prefixes: &[Vec<u32>],
    ) -> Result<Tensor> {
        Err(Error::InferenceError("device out of memory".to_string()))
    }
}

/// How a [`FakeSource`] behaves for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    Echo,
    BrokenGenerator,
    LoadError,
    LoadPanic,
}

/// Model source serving [`EchoModel`]s, with per-domain overrides.
#[derive(Default)]
pub struct FakeSource {
    load_errors: HashSet<Domain>,
    load_panics: HashSet<Domain>,
    broken: HashSet<Domain>,
    attempts: std::sync::atomic::AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: Domain, behavior: FakeBehavior) -> Self {
        match behavior {
            FakeBehavior::Echo => {}
            FakeBehavior::BrokenGenerator => {
                self.broken.insert(domain);
            }
            FakeBehavior::LoadError => {
                self.load_errors.insert(domain);
            }
            FakeBehavior::LoadPanic => {
                self.load_panics.insert(domain);
            }
        }
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ModelSource for FakeSource {
    fn load(&self, spec: &ModelSpec, device: &DeviceProfile) -> Result<LoadedModel> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.load_panics.contains(&spec.domain) {
            panic!("loader crashed for {}", spec.source);
        }
        if self.load_errors.contains(&spec.domain) {
            return Err(Error::ModelLoadError(format!(
                "{} is not a seq2seq checkpoint",
                spec.source
            )));
        }

        let generator: Box<dyn Seq2SeqModel> = if self.broken.contains(&spec.domain) {
            Box::new(FailingModel)
        } else {
            Box::new(EchoModel::new())
        };
        Ok(LoadedModel::new(
            Box::new(ByteCodec),
            generator,
            device.compute_target(),
        ))
    }
}

/// Specs for every domain with their default sources.
pub fn default_specs() -> Vec<ModelSpec> {
    Domain::all()
        .iter()
        .map(|domain| ModelSpec::new(*domain, domain.default_source()))
        .collect()
}
